//! Prelude module - common imports for sixgu users
//!
//! ```rust
//! use sixgu::prelude::*;
//! ```

pub use crate::{
    // Engine
    Document,
    EngineOptions,
    // Model types
    EntityKind,
    // Values
    Evaluated,
    Evaluation,
    // Errors
    FormulaError,
    FormulaResult,
    Placement,
    RefId,
    Selection,
    Value,
    Workbook,
};
