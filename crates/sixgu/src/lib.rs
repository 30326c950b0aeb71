//! # sixgu
//!
//! A spreadsheet engine where cells have names, sheets hold tables and
//! arrays, and any cell can be called like a function with some of its
//! inputs replaced.
//!
//! ## Features
//!
//! - Formulas over named cells, arrays, tables and other sheets
//! - Circular reference detection
//! - What-if calls: `total(price: 12)` evaluates `total` as if `price` were 12
//! - Formulas render back to text from any context
//!
//! ## Example
//!
//! ```rust
//! use sixgu::prelude::*;
//!
//! let mut doc = Document::new();
//! let s1 = doc.sheet("s1").unwrap();
//!
//! doc.set_formula(Selection::at(s1, 0, 0), "price: 10").unwrap();
//! doc.set_formula(Selection::at(s1, 1, 0), "total: price * 1.5").unwrap();
//! let what_if = doc
//!     .set_formula(Selection::at(s1, 2, 0), "total(price: 20)")
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(doc.value(what_if).unwrap(), Evaluated::Value(Value::Number(30.0)));
//! ```

pub mod engine;
pub mod prelude;

pub use engine::{Document, Selection};

// Re-export core types
pub use sixgu_core::{
    default_cell_name, Entity, EntityKind, Error, Placement, RefId, Result, Term, Workbook,
};

// Re-export formula types
pub use sixgu_formula::{
    EngineOptions, Evaluated, Evaluation, FormulaError, FormulaResult, ParsedFormula, Record,
    Token, Value,
};
