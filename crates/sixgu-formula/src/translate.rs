//! Generic bottom-up term tree walker
//!
//! Every pass over a stored formula (name resolution, deletion rewriting,
//! display expansion) is a [`translate`] with a different per-term function.

use crate::resolve::static_target;
use sixgu_core::{KeywordArg, ObjectEntry, RefId, Term, Workbook};

/// Rebuild `term` bottom-up, applying `f` to every leaf and to every
/// compound term after its children have been translated.
///
/// `f` also receives the context id names should be resolved against. It is
/// `context` everywhere except:
/// - keyword parameters of a call, which see the callee's context;
/// - the key column of `on[key: value]`, which sees the table being indexed
///   (and is left alone when `on` is not a table or column).
///
/// Siblings are never dropped or reordered; translating with the identity
/// function returns an equal tree.
pub fn translate<F>(workbook: &Workbook, term: &Term, context: Option<RefId>, f: &mut F) -> Term
where
    F: FnMut(Term, Option<RefId>) -> Term,
{
    let rebuilt = match term {
        Term::Name(_) | Term::Ref(_) | Term::Value(_) | Term::BadFormula { .. } => term.clone(),
        Term::Unary { op, on } => Term::Unary {
            op: *op,
            on: Box::new(translate(workbook, on, context, f)),
        },
        Term::Binary { op, left, right } => Term::Binary {
            op: *op,
            left: Box::new(translate(workbook, left, context, f)),
            right: Box::new(translate(workbook, right, context, f)),
        },
        Term::Lookup { on, name } => Term::Lookup {
            on: Box::new(translate(workbook, on, context, f)),
            name: name.clone(),
        },
        Term::LookupIndex { on, index } => Term::LookupIndex {
            on: Box::new(translate(workbook, on, context, f)),
            index: Box::new(translate(workbook, index, context, f)),
        },
        Term::IndexLookup { on, key_col, index } => {
            let on = translate(workbook, on, context, f);
            let key_col = match table_context(workbook, &on) {
                Some(table) => translate(workbook, key_col, Some(table), f),
                None => (**key_col).clone(),
            };
            Term::IndexLookup {
                on: Box::new(on),
                key_col: Box::new(key_col),
                index: Box::new(translate(workbook, index, context, f)),
            }
        }
        Term::Call {
            callee,
            args,
            kwargs,
        } => {
            let translated_callee = translate(workbook, callee, context, f);
            // Passes that turn refs into something else still need the
            // callee's context, so fall back to the untranslated callee.
            let callee_ref = static_target(workbook, &translated_callee)
                .or_else(|| static_target(workbook, callee));
            let callee_context = callee_ref
                .and_then(|id| callee_context(workbook, id))
                .or(context);
            Term::Call {
                callee: Box::new(translated_callee),
                args: args
                    .iter()
                    .map(|arg| translate(workbook, arg, context, f))
                    .collect(),
                kwargs: kwargs
                    .iter()
                    .map(|kwarg| KeywordArg {
                        param: translate(workbook, &kwarg.param, callee_context, f),
                        expr: translate(workbook, &kwarg.expr, context, f),
                    })
                    .collect(),
            }
        }
        Term::Array(elements) => Term::Array(
            elements
                .iter()
                .map(|e| translate(workbook, e, context, f))
                .collect(),
        ),
        Term::Object(entries) => Term::Object(
            entries
                .iter()
                .map(|entry| ObjectEntry {
                    key: entry.key.clone(),
                    value: translate(workbook, &entry.value, context, f),
                })
                .collect(),
        ),
        Term::Expression(inner) => {
            Term::Expression(Box::new(translate(workbook, inner, context, f)))
        }
    };
    f(rebuilt, context)
}

/// Every term inside `term` (not just leaves), children before parents
pub fn flatten(workbook: &Workbook, term: &Term) -> Vec<Term> {
    let mut all = Vec::new();
    translate(workbook, term, None, &mut |t, _| {
        all.push(t.clone());
        t
    });
    all
}

/// Context the parameters of a call to `callee` are named in: a container
/// names its own children, anything else is named in its parent.
pub fn callee_context(workbook: &Workbook, callee: RefId) -> Option<RefId> {
    let entity = workbook.entity(callee)?;
    if entity.is_context() {
        Some(callee)
    } else {
        entity.parent
    }
}

/// Table whose columns name the key of `on[key: value]`
fn table_context(workbook: &Workbook, on: &Term) -> Option<RefId> {
    use sixgu_core::EntityKind;

    let entity = workbook.entity(static_target(workbook, on)?)?;
    match entity.kind {
        EntityKind::Table => Some(entity.id),
        EntityKind::Column => entity.parent,
        _ => None,
    }
}
