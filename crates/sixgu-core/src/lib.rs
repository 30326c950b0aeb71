//! # sixgu-core
//!
//! Core data structures for the sixgu spreadsheet engine.
//!
//! This crate provides the reference model the formula engine works against:
//! - [`Workbook`] - every entity, its containment, names and stored formula
//! - [`Entity`] and [`EntityKind`] - sheets, cells, arrays, tables, columns
//! - [`RefId`] - stable entity identifiers
//! - [`Term`] - the stored term tree of a formula
//!
//! ## Example
//!
//! ```rust
//! use sixgu_core::{EntityKind, Placement, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.sheet_by_name("s1").unwrap().id;
//! let cell = workbook
//!     .add_to_sheet(sheet, EntityKind::Cell, Some("total"), Placement::at(0, 0))
//!     .unwrap();
//!
//! assert_eq!(workbook.resolve_name(Some(sheet), "total"), Some(cell));
//! ```

pub mod entity;
pub mod error;
pub mod id;
pub mod placement;
pub mod term;
pub mod workbook;

// Re-exports for convenience
pub use entity::{is_valid_name, Entity, EntityKind};
pub use error::{Error, Result};
pub use id::RefId;
pub use placement::{column_to_letters, default_cell_name, Placement};
pub use term::{BinaryOperator, KeywordArg, Literal, ObjectEntry, Term, UnaryOperator};
pub use workbook::Workbook;
