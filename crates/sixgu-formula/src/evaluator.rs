//! Formula evaluator
//!
//! Every formula is compiled once into a closure over a [`Runtime`]. Each
//! formula entity has a stack of [`Evaluated`] frames: the global pass pushes
//! one base frame per entity in schedule order, and what-if calls push
//! override frames for their arguments, re-run the affected slice on top,
//! and pop everything again before returning.
//!
//! Containers have no stack of their own; reading one builds its record or
//! array from the current top frames of its children.

use crate::cycles::circular_ids;
use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::operators::{apply_binary, apply_unary};
use crate::resolve::{resolution_error, static_target};
use crate::schedule::Schedule;
use crate::value::{Evaluated, Field, Record, Value};
use ahash::{AHashMap, AHashSet};
use sixgu_core::{BinaryOperator, EntityKind, KeywordArg, Literal, RefId, Term, Workbook};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Evaluation options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How deeply what-if calls may nest
    pub max_call_depth: usize,
    /// Error message for entities on (or depending on) a cycle
    pub circular_message: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 64,
            circular_message: FormulaError::CircularReference.to_string(),
        }
    }
}

/// Values of every entity after a full evaluation pass
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    values: AHashMap<RefId, Evaluated>,
    order: Vec<RefId>,
    circular: AHashSet<RefId>,
}

impl Evaluation {
    /// Final value of an entity
    pub fn get(&self, id: RefId) -> Option<&Evaluated> {
        self.values.get(&id)
    }

    /// Every entity's value, in enumeration order
    pub fn iter(&self) -> impl Iterator<Item = (RefId, &Evaluated)> {
        self.order
            .iter()
            .filter_map(move |id| self.values.get(id).map(|v| (*id, v)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Formula entities on a cycle
    pub fn circular(&self) -> &AHashSet<RefId> {
        &self.circular
    }
}

/// Evaluate every entity of the workbook
///
/// # Example
/// ```rust
/// use sixgu_core::{EntityKind, Placement, Workbook};
/// use sixgu_formula::{evaluate, parse_formula, EngineOptions, Value};
///
/// let mut wb = Workbook::new();
/// let s1 = wb.sheet_by_name("s1").unwrap().id;
/// let x = wb.add_to_sheet(s1, EntityKind::Cell, Some("x"), Placement::at(0, 0)).unwrap();
/// let y = wb.add_to_sheet(s1, EntityKind::Cell, Some("y"), Placement::at(1, 0)).unwrap();
/// wb.set_formula(x, parse_formula(&wb, "20", Some(s1)).formula.unwrap()).unwrap();
/// wb.set_formula(y, parse_formula(&wb, "x * 2 + 2", Some(s1)).formula.unwrap()).unwrap();
///
/// let values = evaluate(&wb, &EngineOptions::default());
/// assert_eq!(values.get(y).unwrap().value(), Some(&Value::Number(42.0)));
/// ```
pub fn evaluate(workbook: &Workbook, options: &EngineOptions) -> Evaluation {
    let graph = DependencyGraph::build(workbook);
    let circular = circular_ids(workbook, &graph);
    let schedule = Schedule::new(&graph, circular);
    let program = Program::compile(workbook, &graph, &schedule, options);
    program.run(workbook)
}

type Thunk = Box<dyn Fn(&mut Runtime<'_>) -> Result<Value, String>>;

fn thunk<F>(f: F) -> Thunk
where
    F: Fn(&mut Runtime<'_>) -> Result<Value, String> + 'static,
{
    Box::new(f)
}

/// What the global pass does for one entity
enum Step {
    Formula(Thunk),
    /// Record or array built from the children
    Container,
    /// Formula that could not be compiled
    Fail(String),
}

/// Compiled what-if call: `callee(param: ..., ...)`
struct Subroutine {
    callee: RefId,
    params: Vec<RefId>,
    /// Formula entities to re-run, in schedule order
    slice: Vec<RefId>,
}

/// Every entity's compiled step
struct Program {
    steps: AHashMap<RefId, Step>,
    order: Vec<RefId>,
    circular: AHashSet<RefId>,
    options: EngineOptions,
}

impl Program {
    fn compile(
        workbook: &Workbook,
        graph: &DependencyGraph,
        schedule: &Schedule,
        options: &EngineOptions,
    ) -> Self {
        let mut compiler = Compiler {
            workbook,
            graph,
            schedule,
            subroutines: AHashMap::new(),
        };
        let mut steps = AHashMap::new();
        for entity in workbook.entities() {
            let step = match &entity.formula {
                Some(formula) => match compiler.compile(formula) {
                    Ok(thunk) => Step::Formula(thunk),
                    Err(e) => Step::Fail(e.to_string()),
                },
                None if entity.is_context() => Step::Container,
                // A formula entity without a formula evaluates to empty
                None => Step::Formula(thunk(|_| Ok(Value::Empty))),
            };
            steps.insert(entity.id, step);
        }
        log::debug!(
            "Compiled {} entities ({} circular, {} call signatures)",
            steps.len(),
            schedule.circular().len(),
            compiler.subroutines.len()
        );
        Self {
            steps,
            order: schedule.order().to_vec(),
            circular: schedule.circular().clone(),
            options: options.clone(),
        }
    }

    fn run(&self, workbook: &Workbook) -> Evaluation {
        let mut runtime = Runtime {
            workbook,
            program: self,
            stacks: AHashMap::new(),
            depth: 0,
        };
        for &id in &self.circular {
            runtime.push(id, Evaluated::Error(self.options.circular_message.clone()));
        }
        for &id in &self.order {
            if matches!(self.steps.get(&id), Some(Step::Container)) {
                continue;
            }
            let frame = runtime.run(id);
            runtime.push(id, frame);
        }

        let unbalanced = runtime.stacks.values().filter(|s| s.len() != 1).count();
        if unbalanced > 0 {
            log::warn!("{} value stacks did not end with a single frame", unbalanced);
        }

        let order = workbook.ids().to_vec();
        let values = order.iter().map(|id| (*id, runtime.read(*id))).collect();
        Evaluation {
            values,
            order,
            circular: self.circular.clone(),
        }
    }
}

struct Compiler<'a> {
    workbook: &'a Workbook,
    graph: &'a DependencyGraph,
    schedule: &'a Schedule,
    subroutines: AHashMap<(RefId, Vec<RefId>), Rc<Subroutine>>,
}

impl Compiler<'_> {
    fn compile(&mut self, term: &Term) -> FormulaResult<Thunk> {
        // A lookup that names an entity reads it like a ref
        if let (Term::Lookup { .. } | Term::LookupIndex { .. }, Some(id)) =
            (term, static_target(self.workbook, term))
        {
            return Ok(thunk(move |rt| rt.read(id).into_result()));
        }
        match term {
            // === Literals ===
            Term::Value(literal) => {
                let value = literal_value(literal);
                Ok(thunk(move |_| Ok(value.clone())))
            }
            Term::Expression(inner) => self.compile(inner),

            // === References ===
            Term::Ref(id) => {
                let id = *id;
                Ok(thunk(move |rt| rt.read(id).into_result()))
            }
            Term::Name(_) | Term::BadFormula { .. } => Err(self.resolution_failure(term)),

            // === Operators ===
            Term::Unary { op, on } => {
                let op = *op;
                let on = self.compile(on)?;
                Ok(thunk(move |rt| apply_unary(op, on(rt)?)))
            }
            Term::Binary { op, left, right } => {
                let op = *op;
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                Ok(thunk(move |rt| {
                    let l = left(rt)?;
                    // Short-circuit
                    match op {
                        BinaryOperator::And if !l.is_truthy() => Ok(l),
                        BinaryOperator::Or if l.is_truthy() => Ok(l),
                        _ => apply_binary(op, l, right(rt)?),
                    }
                }))
            }

            // === Lookups ===
            Term::Lookup { on, name } => {
                if resolution_error(self.workbook, term).is_some() {
                    return Err(self.resolution_failure(term));
                }
                let on = self.compile(on)?;
                let name = name.clone();
                Ok(thunk(move |rt| member(on(rt)?, &name)))
            }
            Term::LookupIndex { on, index } => {
                if resolution_error(self.workbook, term).is_some() {
                    return Err(self.resolution_failure(term));
                }
                let on = self.compile(on)?;
                let index = self.compile(index)?;
                Ok(thunk(move |rt| {
                    let value = on(rt)?;
                    let index = index(rt)?;
                    element(rt, value, index)
                }))
            }
            Term::IndexLookup { on, key_col, index } => self.compile_index_lookup(on, key_col, index),

            Term::Call {
                callee,
                args,
                kwargs,
            } => self.compile_call(callee, args, kwargs),

            // === Structured literals ===
            Term::Array(elements) => {
                let elements = elements
                    .iter()
                    .map(|e| self.compile(e))
                    .collect::<FormulaResult<Vec<_>>>()?;
                Ok(thunk(move |rt| {
                    let mut items = Vec::with_capacity(elements.len());
                    for element in &elements {
                        items.push(Evaluated::Value(element(rt)?));
                    }
                    Ok(Value::Array(items))
                }))
            }
            Term::Object(entries) => {
                let entries = entries
                    .iter()
                    .map(|e| -> FormulaResult<(String, Thunk)> {
                        Ok((e.key.clone(), self.compile(&e.value)?))
                    })
                    .collect::<FormulaResult<Vec<_>>>()?;
                Ok(thunk(move |rt| {
                    let mut members = Vec::with_capacity(entries.len());
                    for (key, value) in &entries {
                        members.push((key.clone(), Evaluated::Value(value(rt)?)));
                    }
                    Ok(Value::Object(members))
                }))
            }
        }
    }

    fn resolution_failure(&self, term: &Term) -> FormulaError {
        FormulaError::Resolution(
            resolution_error(self.workbook, term).unwrap_or_else(|| "Unresolved reference".into()),
        )
    }

    /// `on[key: index]`: the row of `on` whose `key` equals `index`.
    ///
    /// A resolved key column is searched directly; a bare key name is looked
    /// up at runtime in a table record or an array of objects.
    fn compile_index_lookup(&mut self, on: &Term, key_col: &Term, index: &Term) -> FormulaResult<Thunk> {
        let on = self.compile(on)?;
        let index = self.compile(index)?;

        if let Term::Name(key) = key_col {
            let key = key.clone();
            return Ok(thunk(move |rt| {
                let value = on(rt)?;
                let wanted = index(rt)?;
                match &value {
                    Value::Record(record) => {
                        let keys = record
                            .get(&key)
                            .ok_or_else(|| format!("No column \"{}\"", key))?
                            .to_result()?;
                        let position = position_of(&keys, &wanted, &key)?;
                        element(rt, value, Value::Number(position as f64))
                    }
                    Value::Array(rows) => rows
                        .iter()
                        .filter_map(Evaluated::value)
                        .find(|row| {
                            row.get(&key)
                                .and_then(Evaluated::value)
                                .map_or(false, |v| v.deep_eq(&wanted))
                        })
                        .cloned()
                        .ok_or_else(|| format!("No row where {} is {}", key, wanted.describe())),
                    other => Err(format!("Cannot look up rows of {}", other.describe())),
                }
            }));
        }

        let label = match key_col {
            Term::Ref(id) => self
                .workbook
                .entity(*id)
                .and_then(|e| e.name())
                .unwrap_or("key")
                .to_string(),
            Term::Lookup { name, .. } => name.clone(),
            _ => "key".to_string(),
        };
        let keys = self.compile(key_col)?;
        Ok(thunk(move |rt| {
            let keys = keys(rt)?;
            let wanted = index(rt)?;
            let position = position_of(&keys, &wanted, &label)?;
            let value = on(rt)?;
            element(rt, value, Value::Number(position as f64))
        }))
    }

    fn compile_call(&mut self, callee: &Term, args: &[Term], kwargs: &[KeywordArg]) -> FormulaResult<Thunk> {
        let callee = match static_target(self.workbook, callee) {
            Some(id) => id,
            None => {
                let why = resolution_error(self.workbook, callee)
                    .unwrap_or_else(|| "it is not a reference".to_string());
                return Err(FormulaError::Call(format!("Can only call references; {}", why)));
            }
        };
        if !args.is_empty() {
            return Err(FormulaError::Call(
                "Arguments must be named, as in f(x: 1)".to_string(),
            ));
        }

        let mut params = Vec::with_capacity(kwargs.len());
        let mut values = Vec::with_capacity(kwargs.len());
        for kwarg in kwargs {
            let param = match &kwarg.param {
                Term::Ref(id) => *id,
                other => {
                    let why = resolution_error(self.workbook, other)
                        .unwrap_or_else(|| "not a reference".to_string());
                    return Err(FormulaError::Call(format!("Bad parameter: {}", why)));
                }
            };
            match self.workbook.entity(param) {
                Some(entity) if entity.has_formula() => params.push(param),
                Some(entity) => {
                    return Err(FormulaError::Call(format!(
                        "Can only override cells, not a {}",
                        entity.kind
                    )))
                }
                None => return Err(FormulaError::Call(format!("{} does not exist", param))),
            }
            values.push(self.compile(&kwarg.expr)?);
        }

        let subroutine = self.subroutine(callee, params);
        Ok(thunk(move |rt| {
            let mut args = Vec::with_capacity(values.len());
            for value in &values {
                args.push(value(rt)?);
            }
            rt.invoke(&subroutine, args)
        }))
    }

    /// Compiled call for a signature, shared by every call site using it
    fn subroutine(&mut self, callee: RefId, params: Vec<RefId>) -> Rc<Subroutine> {
        let key = (callee, params);
        if let Some(existing) = self.subroutines.get(&key) {
            return Rc::clone(existing);
        }
        let slice: Vec<RefId> = self
            .schedule
            .function_order(self.graph, &key.1, callee)
            .into_iter()
            .filter(|id| self.workbook.entity(*id).map_or(false, |e| e.has_formula()))
            .collect();
        log::debug!(
            "Compiled call to {} overriding {:?}: {} entities to re-run",
            callee,
            key.1,
            slice.len()
        );
        let subroutine = Rc::new(Subroutine {
            callee,
            params: key.1.clone(),
            slice,
        });
        self.subroutines.insert(key, Rc::clone(&subroutine));
        subroutine
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
        Literal::Boolean(b) => Value::Boolean(*b),
    }
}

/// Evaluation state: the workbook, the compiled program and value stacks
struct Runtime<'a> {
    workbook: &'a Workbook,
    program: &'a Program,
    stacks: AHashMap<RefId, Vec<Evaluated>>,
    /// Nesting of what-if calls
    depth: usize,
}

impl<'a> Runtime<'a> {
    fn push(&mut self, id: RefId, frame: Evaluated) {
        self.stacks.entry(id).or_default().push(frame);
    }

    fn pop(&mut self, id: RefId) {
        if let Some(stack) = self.stacks.get_mut(&id) {
            stack.pop();
        }
    }

    /// Current value of an entity
    fn read(&self, id: RefId) -> Evaluated {
        let entity = match self.workbook.entity(id) {
            Some(entity) => entity,
            None => return Evaluated::Error(format!("{} does not exist.", id)),
        };
        match entity.kind {
            EntityKind::Sheet | EntityKind::Table => {
                let fields = self
                    .workbook
                    .children(id)
                    .iter()
                    .filter_map(|child| {
                        let name = self.workbook.entity(*child)?.name()?.to_string();
                        Some(Field {
                            id: *child,
                            name,
                            value: self.read(*child),
                        })
                    })
                    .collect();
                Evaluated::Value(Value::Record(Record {
                    template: id,
                    fields,
                }))
            }
            EntityKind::Array | EntityKind::Column => Evaluated::Value(Value::Array(
                self.workbook
                    .children(id)
                    .iter()
                    .map(|child| self.read(*child))
                    .collect(),
            )),
            EntityKind::Cell | EntityKind::ArrayCell | EntityKind::TableCell => self
                .stacks
                .get(&id)
                .and_then(|stack| stack.last())
                .cloned()
                .unwrap_or_else(|| Evaluated::Error(format!("{} has not been evaluated", id))),
        }
    }

    /// Run an entity's step against the current frames
    fn run(&mut self, id: RefId) -> Evaluated {
        let program = self.program;
        match program.steps.get(&id) {
            Some(Step::Formula(thunk)) => thunk(self).into(),
            Some(Step::Fail(message)) => Evaluated::Error(message.clone()),
            Some(Step::Container) | None => self.read(id),
        }
    }

    /// Run a what-if call
    fn invoke(&mut self, subroutine: &Subroutine, args: Vec<Value>) -> Result<Value, String> {
        if self.depth >= self.program.options.max_call_depth {
            return Err("Maximum call depth exceeded".to_string());
        }
        if self.program.circular.contains(&subroutine.callee) {
            return Err(self.program.options.circular_message.clone());
        }
        log::trace!(
            "Calling {} with {:?} overridden (depth {})",
            subroutine.callee,
            subroutine.params,
            self.depth
        );

        let mut scope = FrameScope::new(self);
        for (param, value) in subroutine.params.iter().zip(args) {
            scope.push(*param, Evaluated::Override(value));
        }
        for &id in &subroutine.slice {
            let frame = scope.run(id);
            scope.push(id, frame);
        }
        let result = if subroutine.params.contains(&subroutine.callee) {
            scope.read(subroutine.callee)
        } else {
            scope.run(subroutine.callee)
        };
        result.into_result()
    }
}

/// Frames pushed during one call; popped in reverse when dropped, however
/// the call ends
struct FrameScope<'r, 'a> {
    runtime: &'r mut Runtime<'a>,
    pushed: Vec<RefId>,
}

impl<'r, 'a> FrameScope<'r, 'a> {
    fn new(runtime: &'r mut Runtime<'a>) -> Self {
        runtime.depth += 1;
        Self {
            runtime,
            pushed: Vec::new(),
        }
    }

    fn push(&mut self, id: RefId, frame: Evaluated) {
        self.runtime.push(id, frame);
        self.pushed.push(id);
    }
}

impl<'a> Deref for FrameScope<'_, 'a> {
    type Target = Runtime<'a>;

    fn deref(&self) -> &Runtime<'a> {
        &*self.runtime
    }
}

impl<'a> DerefMut for FrameScope<'_, 'a> {
    fn deref_mut(&mut self) -> &mut Runtime<'a> {
        &mut *self.runtime
    }
}

impl Drop for FrameScope<'_, '_> {
    fn drop(&mut self) {
        while let Some(id) = self.pushed.pop() {
            self.runtime.pop(id);
        }
        self.runtime.depth -= 1;
    }
}

// === Runtime lookups on values ===

/// `value.name`
fn member(value: Value, name: &str) -> Result<Value, String> {
    match &value {
        Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
        Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::Object(_) | Value::Record(_) => value
            .get(name)
            .ok_or_else(|| format!("No field \"{}\" in {}", name, value.describe()))?
            .to_result(),
        other => Err(format!("Cannot look up \"{}\" on {}", name, other.describe())),
    }
}

/// `value[index]`
fn element(rt: &Runtime<'_>, value: Value, index: Value) -> Result<Value, String> {
    let i = match &index {
        Value::String(key) => return member(value, key),
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => *n as usize,
        other => {
            return Err(format!(
                "Index must be a non-negative integer, got {}",
                other.describe()
            ))
        }
    };
    let out_of_range = |len: usize| format!("Index {} out of range (length {})", i, len);

    match value {
        Value::Array(items) => match items.get(i) {
            Some(item) => item.to_result(),
            None => Err(out_of_range(items.len())),
        },
        Value::String(s) => s
            .chars()
            .nth(i)
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| out_of_range(s.chars().count())),
        Value::Record(record) if is_table(rt, record.template) => table_row(&record, i),
        Value::Record(record) => match record.fields.get(i) {
            Some(field) => field.value.to_result(),
            None => Err(out_of_range(record.fields.len())),
        },
        other => Err(format!("Cannot index into {}", other.describe())),
    }
}

fn is_table(rt: &Runtime<'_>, id: RefId) -> bool {
    rt.workbook
        .entity(id)
        .map_or(false, |e| e.kind == EntityKind::Table)
}

/// Row `i` of a table record as `{column: value, ...}`
fn table_row(record: &Record, i: usize) -> Result<Value, String> {
    let mut rows = 0;
    let mut members = Vec::with_capacity(record.fields.len());
    for field in &record.fields {
        let cell = match &field.value {
            Evaluated::Value(Value::Array(cells)) => {
                rows = rows.max(cells.len());
                cells.get(i).cloned().unwrap_or(Evaluated::Value(Value::Empty))
            }
            other => other.clone(),
        };
        members.push((field.name.clone(), cell));
    }
    if i >= rows {
        return Err(format!("Row {} out of range ({} rows)", i, rows));
    }
    Ok(Value::Object(members))
}

/// Position of the first key equal to `wanted`
fn position_of(keys: &Value, wanted: &Value, label: &str) -> Result<usize, String> {
    match keys {
        Value::Array(items) => items
            .iter()
            .position(|item| item.value().map_or(false, |v| v.deep_eq(wanted)))
            .ok_or_else(|| format!("No row where {} is {}", label, wanted.describe())),
        other => Err(format!("Cannot search {} for {}", other.describe(), label)),
    }
}
