//! Document engine
//!
//! A [`Document`] owns a [`Workbook`] and keeps its stored formulas
//! consistent across structural mutations: after every create, move, rename
//! or delete all formulas are re-resolved, so a name that starts to exist is
//! picked up by formulas that were already waiting for it.
//!
//! # Example
//!
//! ```rust
//! use sixgu::prelude::*;
//!
//! let mut doc = Document::new();
//! let s1 = doc.sheet("s1").unwrap();
//!
//! let a = doc.set_formula(Selection::at(s1, 0, 0), "a: 1 + 2").unwrap().unwrap();
//! let b = doc.set_formula(Selection::at(s1, 1, 0), "b: a + 1").unwrap().unwrap();
//!
//! let values = doc.evaluated_values();
//! assert_eq!(values.get(a).unwrap().value(), Some(&Value::Number(3.0)));
//! assert_eq!(values.get(b).unwrap().value(), Some(&Value::Number(4.0)));
//! assert_eq!(doc.string_formula(b).unwrap(), "b: a + 1");
//! ```

use ahash::AHashSet;
use sixgu_core::{EntityKind, Placement, RefId, Term, Workbook};
use sixgu_formula::{
    evaluate, parse_formula, resolve, rewrite_deleted, unparser, EngineOptions, Evaluated,
    Evaluation, FormulaError, FormulaResult, ParsedFormula, Token,
};

/// Where a formula is being typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// An entity that already exists
    Existing(RefId),
    /// An empty square of a sheet, or a slot of an array, table or column.
    ///
    /// For arrays and columns `y` is the index; for tables `x` picks the
    /// column and `y` the row.
    Location { context: RefId, y: u32, x: u32 },
}

impl Selection {
    pub fn at(context: RefId, y: u32, x: u32) -> Self {
        Selection::Location { context, y, x }
    }
}

/// A workbook together with the options it is evaluated with
#[derive(Debug, Clone)]
pub struct Document {
    workbook: Workbook,
    options: EngineOptions,
}

impl Document {
    /// Create a document with one empty sheet, `s1`
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            workbook: Workbook::new(),
            options,
        }
    }

    /// Wrap an existing workbook, resolving whatever names its formulas
    /// still hold
    pub fn from_workbook(workbook: Workbook, options: EngineOptions) -> FormulaResult<Self> {
        let mut doc = Self { workbook, options };
        doc.rewire()?;
        Ok(doc)
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut EngineOptions {
        &mut self.options
    }

    /// Id of the sheet with this name
    pub fn sheet(&self, name: &str) -> Option<RefId> {
        self.workbook.sheet_by_name(name).map(|s| s.id)
    }

    // === Creation ===

    /// Add a sheet; without a name the first free `s<n>` is used
    pub fn create_sheet(&mut self, name: Option<&str>) -> FormulaResult<RefId> {
        let id = self.workbook.add_sheet(name)?;
        log::debug!("Created sheet {}", id);
        self.rewire()?;
        Ok(id)
    }

    /// Add an empty cell to a sheet
    pub fn create_cell(
        &mut self,
        sheet: RefId,
        name: Option<&str>,
        placement: Placement,
    ) -> FormulaResult<RefId> {
        self.create(sheet, EntityKind::Cell, name, placement)
    }

    /// Add an array with `len` empty elements
    pub fn create_array(
        &mut self,
        sheet: RefId,
        name: Option<&str>,
        placement: Placement,
        len: usize,
    ) -> FormulaResult<RefId> {
        let array = self.create(sheet, EntityKind::Array, name, placement)?;
        for _ in 0..len {
            self.workbook.push_indexed(array)?;
        }
        Ok(array)
    }

    /// Add a table with the given (empty) columns
    pub fn create_table(
        &mut self,
        sheet: RefId,
        name: Option<&str>,
        placement: Placement,
        columns: &[&str],
    ) -> FormulaResult<RefId> {
        let table = self.create(sheet, EntityKind::Table, name, placement)?;
        for column in columns {
            self.workbook.add_column(table, column)?;
        }
        self.rewire()?;
        Ok(table)
    }

    /// Add a column at the end of a table
    pub fn add_column(&mut self, table: RefId, name: &str) -> FormulaResult<RefId> {
        let column = self.workbook.add_column(table, name)?;
        self.rewire()?;
        Ok(column)
    }

    fn create(
        &mut self,
        sheet: RefId,
        kind: EntityKind,
        name: Option<&str>,
        placement: Placement,
    ) -> FormulaResult<RefId> {
        let id = self.workbook.add_to_sheet(sheet, kind, name, placement)?;
        log::debug!("Created {} {} at {}", kind, id, placement);
        self.rewire()?;
        Ok(id)
    }

    // === Formulas ===

    /// Parse formula text as seen from `context`
    pub fn parse_formula(&self, text: &str, context: Option<RefId>) -> ParsedFormula {
        parse_formula(&self.workbook, text, context)
    }

    /// Apply typed formula text to a selection.
    ///
    /// `name: expr` sets both the name and the formula of an existing cell,
    /// `name:` only renames and a bare expression only replaces the formula.
    /// Containers accept only a rename. On an empty location a new entity is
    /// created; an array literal typed on a sheet creates an array with one
    /// element per item.
    ///
    /// Returns the entity that was changed or created, or `None` when there
    /// was nothing to do.
    pub fn set_formula(
        &mut self,
        selection: Selection,
        text: &str,
    ) -> FormulaResult<Option<RefId>> {
        let changed = match selection {
            Selection::Existing(id) => self.set_existing(id, text)?,
            Selection::Location { context, y, x } => self.set_location(context, y, x, text)?,
        };
        if changed.is_some() {
            self.rewire()?;
        }
        Ok(changed)
    }

    fn set_existing(&mut self, id: RefId, text: &str) -> FormulaResult<Option<RefId>> {
        let entity = self.workbook.get(id)?;
        let (kind, has_formula) = (entity.kind, entity.has_formula());
        let parsed = self.parse_formula(text, self.workbook.formula_context(id));
        if parsed.name.is_none() && parsed.formula.is_none() {
            return Ok(None);
        }

        if let Some(name) = &parsed.name {
            if kind.is_named() {
                self.workbook.rename(id, name)?;
            }
        }
        match parsed.formula {
            Some(formula) if has_formula => self.store(id, formula)?,
            Some(_) => log::debug!("Ignoring formula typed on {} {}", kind, id),
            None => {}
        }
        Ok(Some(id))
    }

    fn set_location(
        &mut self,
        context: RefId,
        y: u32,
        x: u32,
        text: &str,
    ) -> FormulaResult<Option<RefId>> {
        let kind = self.workbook.get(context)?.kind;
        let slot = match kind {
            EntityKind::Sheet => context,
            EntityKind::Array | EntityKind::Column => context,
            EntityKind::Table => self
                .workbook
                .children(context)
                .get(x as usize)
                .copied()
                .ok_or(sixgu_core::Error::IndexOutOfBounds {
                    context,
                    index: x as usize,
                    len: self.workbook.children(context).len(),
                })?,
            _ => return Err(sixgu_core::Error::NotAContext(context).into()),
        };

        let parsed = self.parse_formula(text, Some(slot));
        let Some(formula) = parsed.formula else {
            return Ok(None);
        };

        if kind != EntityKind::Sheet {
            let id = self.workbook.insert_indexed(slot, y as usize)?;
            self.store(id, formula)?;
            return Ok(Some(id));
        }

        let name = parsed.name.as_deref();
        let id = match formula {
            Term::Array(elements) => {
                let height = elements.len().max(1) as u32;
                let placement = Placement::at(y, x).resized(height, 1);
                let array =
                    self.workbook
                        .add_to_sheet(context, EntityKind::Array, name, placement)?;
                for element in elements {
                    let cell = self.workbook.push_indexed(array)?;
                    self.store(cell, element)?;
                }
                array
            }
            formula => {
                let placement = Placement::at(y, x);
                let cell = self
                    .workbook
                    .add_to_sheet(context, EntityKind::Cell, name, placement)?;
                self.store(cell, formula)?;
                cell
            }
        };
        Ok(Some(id))
    }

    fn store(&mut self, id: RefId, formula: Term) -> FormulaResult<()> {
        if let Term::BadFormula { text, reason } = &formula {
            log::warn!("Storing bad formula for {}: {:?} ({})", id, text, reason);
        }
        self.workbook.set_formula(id, formula)?;
        Ok(())
    }

    // === Structure ===

    /// Move and/or resize a sheet-level entity, possibly to another sheet
    pub fn move_entity(
        &mut self,
        id: RefId,
        sheet: RefId,
        placement: Placement,
    ) -> FormulaResult<()> {
        self.workbook.move_to(id, sheet, placement)?;
        log::debug!("Moved {} to {} on {}", id, placement, sheet);
        self.rewire()?;
        Ok(())
    }

    /// Delete an entity and everything it contains.
    ///
    /// Formulas that referred to anything deleted are rewritten to lookups
    /// from the nearest surviving container, so they read the same and
    /// resolve again if the name comes back.
    pub fn delete_entity(&mut self, id: RefId) -> FormulaResult<Vec<RefId>> {
        self.rewrite_references_to(id)?;
        let removed = self.workbook.remove(id)?;
        self.finish_delete(removed)
    }

    /// Delete the child at `index` of an array or column; later children
    /// move one place down
    pub fn delete_location(&mut self, context: RefId, index: usize) -> FormulaResult<Vec<RefId>> {
        let id = self
            .workbook
            .child_at(context, index)
            .ok_or(sixgu_core::Error::IndexOutOfBounds {
                context,
                index,
                len: self.workbook.children(context).len(),
            })?;
        self.rewrite_references_to(id)?;
        let removed = self.workbook.remove_at(context, index)?;
        self.finish_delete(removed)
    }

    fn rewrite_references_to(&mut self, id: RefId) -> FormulaResult<()> {
        let doomed: AHashSet<RefId> = self.workbook.descendants(id).into_iter().collect();
        let rewritten: Vec<(RefId, Term)> = self
            .workbook
            .entities()
            .filter(|e| !doomed.contains(&e.id))
            .filter_map(|e| {
                let formula = e.formula.as_ref()?;
                let new = rewrite_deleted(&self.workbook, formula, &doomed);
                (new != *formula).then_some((e.id, new))
            })
            .collect();
        for (id, formula) in rewritten {
            log::debug!("Rewriting references to deleted entities in {}", id);
            self.workbook.set_formula(id, formula)?;
        }
        Ok(())
    }

    fn finish_delete(&mut self, removed: Vec<sixgu_core::Entity>) -> FormulaResult<Vec<RefId>> {
        let ids: Vec<RefId> = removed.into_iter().map(|e| e.id).collect();
        log::debug!("Deleted {:?}", ids);
        self.rewire()?;
        Ok(ids)
    }

    /// Rename a named entity
    pub fn rename(&mut self, id: RefId, name: &str) -> FormulaResult<()> {
        self.workbook.rename(id, name)?;
        self.rewire()?;
        Ok(())
    }

    /// Re-resolve every stored formula against the current structure
    fn rewire(&mut self) -> FormulaResult<()> {
        let updates: Vec<(RefId, Term)> = self
            .workbook
            .entities()
            .filter_map(|e| {
                let formula = e.formula.as_ref()?;
                let resolved = resolve(&self.workbook, formula, self.workbook.formula_context(e.id));
                (resolved != *formula).then_some((e.id, resolved))
            })
            .collect();
        for (id, formula) in updates {
            log::trace!("Rewired {}", id);
            self.workbook.set_formula(id, formula)?;
        }
        Ok(())
    }

    // === Reading ===

    /// Evaluate the whole document
    pub fn evaluated_values(&self) -> Evaluation {
        evaluate(&self.workbook, &self.options)
    }

    /// Current value of one entity
    pub fn value(&self, id: RefId) -> FormulaResult<Evaluated> {
        self.workbook.get(id)?;
        self.evaluated_values()
            .get(id)
            .cloned()
            .ok_or_else(|| FormulaError::Evaluation(format!("No value for {}", id)))
    }

    /// Stored formula as text, prefixed by the entity's name
    pub fn string_formula(&self, id: RefId) -> FormulaResult<String> {
        unparser::string_formula(&self.workbook, id)
    }

    /// Stored formula as display tokens
    pub fn formula_tokens(&self, id: RefId) -> FormulaResult<Vec<Token>> {
        unparser::formula_tokens(&self.workbook, id)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sixgu_formula::Value;

    fn number(doc: &Document, id: RefId) -> Option<f64> {
        match doc.value(id).ok()?.into_result().ok()? {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    #[test]
    fn test_set_formula_on_sheet_creates_cell() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let id = doc.set_formula(Selection::at(s1, 2, 1), "40 + 2").unwrap().unwrap();
        let cell = doc.workbook().get(id).unwrap();
        assert_eq!(cell.kind, EntityKind::Cell);
        assert_eq!(cell.name(), Some("B3"));
        assert_eq!(number(&doc, id), Some(42.0));
    }

    #[test]
    fn test_set_formula_name_only_renames() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let id = doc.set_formula(Selection::at(s1, 0, 0), "x: 5").unwrap().unwrap();
        doc.set_formula(Selection::Existing(id), "y:").unwrap();
        assert_eq!(doc.string_formula(id).unwrap(), "y: 5");
        doc.set_formula(Selection::Existing(id), "6").unwrap();
        assert_eq!(doc.string_formula(id).unwrap(), "y: 6");
        assert_eq!(doc.set_formula(Selection::Existing(id), ":").unwrap(), None);
        assert_eq!(doc.set_formula(Selection::at(s1, 5, 5), ":").unwrap(), None);
    }

    #[test]
    fn test_array_literal_creates_array() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let arr = doc
            .set_formula(Selection::at(s1, 0, 0), "xs: [1, 2, 3]")
            .unwrap()
            .unwrap();
        let wb = doc.workbook();
        assert_eq!(wb.get(arr).unwrap().kind, EntityKind::Array);
        assert_eq!(wb.children(arr).len(), 3);
        assert_eq!(wb.get(arr).unwrap().placement.unwrap().height, 3);

        let second = wb.child_at(arr, 1).unwrap();
        assert_eq!(number(&doc, second), Some(2.0));

        // Typing into the array adds an element at that index
        let inserted = doc.set_formula(Selection::at(arr, 1, 0), "10").unwrap().unwrap();
        assert_eq!(doc.workbook().child_at(arr, 1), Some(inserted));
        assert_eq!(doc.workbook().children(arr).len(), 4);
    }

    #[test]
    fn test_names_wait_for_their_entity() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let b = doc.set_formula(Selection::at(s1, 0, 0), "b: later * 2").unwrap().unwrap();
        assert_eq!(
            doc.value(b).unwrap(),
            Evaluated::Error("\"later\" does not exist.".into())
        );
        doc.set_formula(Selection::at(s1, 1, 0), "later: 21").unwrap();
        assert_eq!(number(&doc, b), Some(42.0));
    }

    #[test]
    fn test_from_workbook_resolves_names() {
        let mut wb = Workbook::new();
        let s1 = wb.sheet_by_name("s1").unwrap().id;
        let x = wb
            .add_to_sheet(s1, EntityKind::Cell, Some("x"), Placement::at(0, 0))
            .unwrap();
        wb.set_formula(x, Term::number(4.0)).unwrap();
        let y = wb
            .add_to_sheet(s1, EntityKind::Cell, Some("y"), Placement::at(1, 0))
            .unwrap();
        wb.set_formula(y, Term::name("x")).unwrap();

        let doc = Document::from_workbook(wb, EngineOptions::default()).unwrap();
        assert_eq!(doc.workbook().get(y).unwrap().formula, Some(Term::Ref(x)));
        assert_eq!(number(&doc, y), Some(4.0));
    }

    #[test]
    fn test_containers_only_rename() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let t = doc
            .create_table(s1, Some("t"), Placement::at(0, 0), &["a"])
            .unwrap();
        doc.set_formula(Selection::Existing(t), "people: 1").unwrap();
        assert_eq!(doc.string_formula(t).unwrap(), "people:");
    }

    #[test]
    fn test_table_location_adds_row() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let t = doc
            .create_table(s1, Some("t"), Placement::at(0, 0), &["name", "age"])
            .unwrap();
        let age = doc.workbook().child_by_name(t, "age").unwrap();
        let cell = doc.set_formula(Selection::at(t, 0, 1), "ignored: 30").unwrap().unwrap();
        let entity = doc.workbook().get(cell).unwrap();
        assert_eq!(entity.kind, EntityKind::TableCell);
        assert_eq!(entity.parent, Some(age));
        assert_eq!(entity.name(), None);
        assert_eq!(doc.string_formula(cell).unwrap(), ": 30");
    }

    #[test]
    fn test_bad_location() {
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let c = doc.set_formula(Selection::at(s1, 0, 0), "1").unwrap().unwrap();
        assert!(doc.set_formula(Selection::at(c, 0, 0), "1").is_err());
        let t = doc.create_table(s1, None, Placement::at(3, 3), &[]).unwrap();
        assert!(doc.set_formula(Selection::at(t, 0, 0), "1").is_err());
    }
}
