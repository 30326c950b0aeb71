//! # sixgu-formula
//!
//! Formula language and calculation for sixgu.
//!
//! This crate provides:
//! - Lexing and parsing (text → term tree)
//! - Name resolution against a [`Workbook`](sixgu_core::Workbook)
//! - Dependency graph, circular reference detection and scheduling
//! - Evaluation, including what-if calls of one cell with overridden inputs
//! - Unparsing (term tree → display text)
//!
//! ## Example
//!
//! ```rust
//! use sixgu_core::{EntityKind, Placement, Workbook};
//! use sixgu_formula::{evaluate, parse_formula, EngineOptions, Value};
//!
//! let mut wb = Workbook::new();
//! let s1 = wb.sheet_by_name("s1").unwrap().id;
//! let a = wb.add_to_sheet(s1, EntityKind::Cell, Some("a"), Placement::at(0, 0)).unwrap();
//! let b = wb.add_to_sheet(s1, EntityKind::Cell, Some("b"), Placement::at(1, 0)).unwrap();
//!
//! let parsed = parse_formula(&wb, "20", Some(s1));
//! wb.set_formula(a, parsed.formula.unwrap()).unwrap();
//! let parsed = parse_formula(&wb, "a * 2 + 2", Some(s1));
//! wb.set_formula(b, parsed.formula.unwrap()).unwrap();
//!
//! let values = evaluate(&wb, &EngineOptions::default());
//! assert_eq!(values.get(b).unwrap().value(), Some(&Value::Number(42.0)));
//! ```

pub mod cycles;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod operators;
pub mod parser;
pub mod resolve;
pub mod schedule;
pub mod translate;
pub mod unparser;
pub mod value;

pub use cycles::{circular_ids, find_cycles};
pub use dependency::{formula_refs, DependencyGraph, Direction};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EngineOptions, Evaluation};
pub use lexer::{lex, Token};
pub use parser::{parse_formula, parse_text, parse_tokens, ParsedFormula};
pub use resolve::{lookup_expression, resolution_error, resolve, rewrite_deleted, static_target};
pub use schedule::Schedule;
pub use translate::translate;
pub use unparser::{formula_tokens, string_formula, unparse, unparse_tokens};
pub use value::{Evaluated, Field, Record, Value};
