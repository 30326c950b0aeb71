//! Name resolution and reference rewriting
//!
//! Stored formulas hold `Ref`s wherever a name could be resolved. These
//! passes move between that form and the name-based form: resolving names
//! after parsing or a rename, turning refs back into lookup chains for
//! display, and rewriting refs to entities that are about to be deleted.

use crate::translate::translate;
use ahash::AHashSet;
use sixgu_core::{Entity, EntityKind, Literal, RefId, Term, Workbook};

/// Resolve every name in `term` that refers to an existing entity, as seen
/// from `context`.
///
/// Named lookups such as `Sheet.cell` keep their shape, with the container
/// resolved; the member is looked up by name whenever the formula is read
/// (see [`static_target`]). Literal indices into arrays and columns
/// (`array[2]`) become refs to the element, so they follow it when siblings
/// move. `Table[key: value].column` becomes the column-level
/// [`Term::IndexLookup`]. Unresolvable names are left as they are; see
/// [`resolution_error`].
pub fn resolve(workbook: &Workbook, term: &Term, context: Option<RefId>) -> Term {
    translate(workbook, term, context, &mut |t, ctx| {
        resolve_term(workbook, t, ctx)
    })
}

fn resolve_term(workbook: &Workbook, term: Term, context: Option<RefId>) -> Term {
    match term {
        Term::Name(name) => match workbook.resolve_name(context, &name) {
            Some(id) => Term::Ref(id),
            None => Term::Name(name),
        },
        Term::Lookup { on, name } => match *on {
            Term::IndexLookup { on, key_col, index } => {
                // `Table[key: value].column` becomes a lookup on the column
                let column = static_target(workbook, &on)
                    .filter(|table| is_kind(workbook, *table, EntityKind::Table))
                    .and_then(|table| workbook.child_by_name(table, &name));
                match column {
                    Some(column) => Term::IndexLookup {
                        on: Box::new(Term::Ref(column)),
                        key_col,
                        index,
                    },
                    None => Term::lookup(Term::IndexLookup { on, key_col, index }, name),
                }
            }
            on => Term::lookup(on, name),
        },
        Term::LookupIndex { on, index } => {
            let child = match (static_target(workbook, &on), literal_index(&index)) {
                (Some(container), Some(i)) => workbook.child_at(container, i),
                _ => None,
            };
            match child {
                Some(child) => Term::Ref(child),
                None => Term::LookupIndex { on, index },
            }
        }
        other => other,
    }
}

/// The entity a resolved term names without evaluating anything: a ref, or
/// a chain of `.name` and literal `[i]` lookups through containers whose
/// members all exist.
pub fn static_target(workbook: &Workbook, term: &Term) -> Option<RefId> {
    match term {
        Term::Ref(id) => workbook.contains(*id).then_some(*id),
        Term::Lookup { on, name } => workbook.child_by_name(static_target(workbook, on)?, name),
        Term::LookupIndex { on, index } => {
            workbook.child_at(static_target(workbook, on)?, literal_index(index)?)
        }
        _ => None,
    }
}

/// Why `term` itself failed to resolve, if it did.
///
/// Only the term's own shape is considered, not its children.
pub fn resolution_error(workbook: &Workbook, term: &Term) -> Option<String> {
    match term {
        Term::Name(name) => Some(format!("\"{}\" does not exist.", name)),
        Term::Lookup { on, name } => {
            let container = workbook.entity(static_target(workbook, on)?)?;
            (container.kind.children_by_name()
                && workbook.child_by_name(container.id, name).is_none())
            .then(|| format!("\"{}.{}\" does not exist.", display_name(container), name))
        }
        Term::LookupIndex { on, index } => {
            let container = workbook.entity(static_target(workbook, on)?)?;
            container.kind.indexed_child()?;
            match &**index {
                Term::Value(Literal::Number(n)) if static_target(workbook, term).is_none() => {
                    Some(format!("\"{}[{}]\" does not exist.", display_name(container), n))
                }
                _ => None,
            }
        }
        Term::BadFormula { reason, .. } => Some(format!("Bad formula: {}", reason)),
        _ => None,
    }
}

/// Whether `term` is a lookup on a container that names no such child
pub fn is_failed_lookup(workbook: &Workbook, term: &Term) -> bool {
    matches!(term, Term::Lookup { .. } | Term::LookupIndex { .. })
        && resolution_error(workbook, term).is_some()
}

/// How `target` can be written from `context`: its name when the name
/// resolves back to it, otherwise a lookup chain from the nearest ancestor
/// that can be named.
pub fn lookup_expression(workbook: &Workbook, context: Option<RefId>, target: RefId) -> Term {
    let mut segments = Vec::new();
    let mut current = target;
    let base = loop {
        let entity = match workbook.entity(current) {
            Some(entity) => entity,
            None => break Term::Ref(current),
        };
        let nameable = entity
            .name()
            .map_or(false, |name| workbook.resolve_name(context, name) == Some(current));
        match entity.parent {
            Some(parent) if !nameable => {
                segments.push(entity);
                current = parent;
            }
            _ => break Term::Ref(current),
        }
    };
    segments.iter().rev().fold(base, |on, entity| segment(on, entity))
}

/// Rewrite refs to `doomed` entities into lookups from their nearest
/// surviving ancestor (or their sheet's name), so the formula reads the same
/// and resolves again if something with that name reappears.
///
/// Must run against the workbook before the entities are removed.
pub fn rewrite_deleted(workbook: &Workbook, term: &Term, doomed: &AHashSet<RefId>) -> Term {
    translate(workbook, term, None, &mut |t, _| match t {
        Term::Ref(id) if doomed.contains(&id) => surviving_lookup(workbook, id, doomed),
        other => other,
    })
}

fn surviving_lookup(workbook: &Workbook, id: RefId, doomed: &AHashSet<RefId>) -> Term {
    let mut segments = Vec::new();
    let mut current = id;
    let base = loop {
        let entity = match workbook.entity(current) {
            Some(entity) => entity,
            None => break Term::Ref(current),
        };
        match entity.parent {
            None => break Term::Name(entity.name().unwrap_or_default().to_string()),
            Some(parent) => {
                segments.push(entity);
                if !doomed.contains(&parent) {
                    break Term::Ref(parent);
                }
                current = parent;
            }
        }
    };
    segments.iter().rev().fold(base, |on, entity| segment(on, entity))
}

/// One step of a lookup chain: `.name` for named entities, `[i]` for
/// indexed ones
fn segment(on: Term, entity: &Entity) -> Term {
    match (entity.name(), entity.index) {
        (Some(name), _) => Term::lookup(on, name),
        (None, Some(index)) => Term::lookup_index(on, Term::number(index as f64)),
        (None, None) => on,
    }
}

/// A literal non-negative integer index
fn literal_index(term: &Term) -> Option<usize> {
    match term {
        Term::Value(Literal::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        _ => None,
    }
}

fn is_kind(workbook: &Workbook, id: RefId, kind: EntityKind) -> bool {
    workbook.entity(id).map_or(false, |e| e.kind == kind)
}

fn display_name(entity: &Entity) -> String {
    match entity.name() {
        Some(name) => name.to_string(),
        None => entity.id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;
    use pretty_assertions::assert_eq;
    use sixgu_core::Placement;

    struct Fixture {
        wb: Workbook,
        s1: RefId,
        foo: RefId,
        bar: RefId,
        x: RefId,
        arr: RefId,
        elems: Vec<RefId>,
        table: RefId,
        name_col: RefId,
        age_col: RefId,
    }

    fn fixture() -> Fixture {
        let mut wb = Workbook::new();
        let s1 = wb.sheet_by_name("s1").unwrap().id;
        let foo = wb.add_sheet(Some("Foo")).unwrap();
        let bar = wb
            .add_to_sheet(foo, EntityKind::Cell, Some("bar"), Placement::at(0, 0))
            .unwrap();
        let x = wb
            .add_to_sheet(s1, EntityKind::Cell, Some("x"), Placement::at(0, 0))
            .unwrap();
        let arr = wb
            .add_to_sheet(s1, EntityKind::Array, Some("arr"), Placement::at(1, 0))
            .unwrap();
        let elems = vec![wb.push_indexed(arr).unwrap(), wb.push_indexed(arr).unwrap()];
        let table = wb
            .add_to_sheet(s1, EntityKind::Table, Some("people"), Placement::at(5, 0))
            .unwrap();
        let name_col = wb.add_column(table, "name").unwrap();
        let age_col = wb.add_column(table, "age").unwrap();
        Fixture {
            wb,
            s1,
            foo,
            bar,
            x,
            arr,
            elems,
            table,
            name_col,
            age_col,
        }
    }

    fn resolved(f: &Fixture, text: &str) -> Term {
        resolve(&f.wb, &parse_text(text).formula.unwrap(), Some(f.s1))
    }

    #[test]
    fn test_resolve_names_and_lookups() {
        let f = fixture();
        assert_eq!(resolved(&f, "x"), Term::Ref(f.x));
        // Named members stay lookups on the resolved container
        let foo_bar = resolved(&f, "Foo.bar");
        assert_eq!(foo_bar, Term::lookup(Term::Ref(f.foo), "bar"));
        assert_eq!(static_target(&f.wb, &foo_bar), Some(f.bar));
        assert_eq!(resolution_error(&f.wb, &foo_bar), None);
        assert_eq!(
            static_target(&f.wb, &resolved(&f, "s1.people.age")),
            Some(f.age_col)
        );
        // Elements become refs
        assert_eq!(resolved(&f, "arr[1]"), Term::Ref(f.elems[1]));
        // Lookups on cell values stay runtime lookups
        assert_eq!(resolved(&f, "x.y"), Term::lookup(Term::Ref(f.x), "y"));
        assert_eq!(resolved(&f, "nope"), Term::name("nope"));
    }

    #[test]
    fn test_resolve_table_index_lookup() {
        let f = fixture();
        assert_eq!(
            resolved(&f, "people[name: \"Fred\"].age"),
            Term::IndexLookup {
                on: Box::new(Term::Ref(f.age_col)),
                key_col: Box::new(Term::Ref(f.name_col)),
                index: Box::new(Term::string("Fred")),
            }
        );
        // Reached through another sheet
        let from_foo = resolve(
            &f.wb,
            &parse_text("s1.people[name: \"Fred\"].age").formula.unwrap(),
            Some(f.foo),
        );
        assert_eq!(
            from_foo,
            Term::IndexLookup {
                on: Box::new(Term::Ref(f.age_col)),
                key_col: Box::new(Term::Ref(f.name_col)),
                index: Box::new(Term::string("Fred")),
            }
        );
        assert_eq!(
            resolved(&f, "people[name: x]"),
            Term::IndexLookup {
                on: Box::new(Term::Ref(f.table)),
                key_col: Box::new(Term::Ref(f.name_col)),
                index: Box::new(Term::Ref(f.x)),
            }
        );
    }

    #[test]
    fn test_resolution_errors() {
        let f = fixture();
        let missing = resolved(&f, "Foo.baz");
        assert_eq!(missing, Term::lookup(Term::Ref(f.foo), "baz"));
        assert_eq!(
            resolution_error(&f.wb, &missing).as_deref(),
            Some("\"Foo.baz\" does not exist.")
        );
        assert!(is_failed_lookup(&f.wb, &missing));
        assert_eq!(
            resolution_error(&f.wb, &Term::name("nope")).as_deref(),
            Some("\"nope\" does not exist.")
        );
        assert_eq!(
            resolution_error(&f.wb, &resolved(&f, "arr[7]")).as_deref(),
            Some("\"arr[7]\" does not exist.")
        );
        assert_eq!(resolution_error(&f.wb, &resolved(&f, "x.y")), None);
    }

    #[test]
    fn test_lookup_expression() {
        let f = fixture();
        // Nameable directly
        assert_eq!(lookup_expression(&f.wb, Some(f.s1), f.x), Term::Ref(f.x));
        // Cells of another sheet go through the sheet
        assert_eq!(
            lookup_expression(&f.wb, Some(f.s1), f.bar),
            Term::lookup(Term::Ref(f.foo), "bar")
        );
        assert_eq!(
            lookup_expression(&f.wb, Some(f.s1), f.elems[1]),
            Term::lookup_index(Term::Ref(f.arr), Term::number(1.0))
        );
        assert_eq!(
            lookup_expression(&f.wb, Some(f.s1), f.age_col),
            Term::lookup(Term::Ref(f.table), "age")
        );
        assert_eq!(
            lookup_expression(&f.wb, Some(f.table), f.age_col),
            Term::Ref(f.age_col)
        );
    }

    #[test]
    fn test_rewrite_deleted() {
        let f = fixture();
        let add = |left: Term, right: Term| Term::Binary {
            op: sixgu_core::BinaryOperator::Add,
            left: Box::new(left),
            right: Box::new(right),
        };
        let term = resolved(&f, "Foo.bar + arr[1] + x");
        assert_eq!(
            term,
            add(
                add(Term::lookup(Term::Ref(f.foo), "bar"), Term::Ref(f.elems[1])),
                Term::Ref(f.x)
            )
        );

        // The lookup already reads by name; the element ref is rewritten
        let doomed: AHashSet<RefId> = [f.bar, f.elems[1]].into_iter().collect();
        assert_eq!(
            rewrite_deleted(&f.wb, &term, &doomed),
            add(
                add(
                    Term::lookup(Term::Ref(f.foo), "bar"),
                    Term::lookup_index(Term::Ref(f.arr), Term::number(1.0))
                ),
                Term::Ref(f.x)
            )
        );

        // A deleted sheet is left as its name
        let doomed: AHashSet<RefId> = f.wb.descendants(f.foo).into_iter().collect();
        assert_eq!(
            rewrite_deleted(&f.wb, &Term::Ref(f.bar), &doomed),
            Term::lookup(Term::name("Foo"), "bar")
        );
    }
}
