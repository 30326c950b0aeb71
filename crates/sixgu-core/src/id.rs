//! Stable entity identifiers

use std::fmt;

/// Identifier of one entity in a [`Workbook`](crate::Workbook).
///
/// Ids are allocated monotonically and never reused, so a `Ref` term that
/// survives in a formula always means the same entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefId(pub u32);

impl RefId {
    /// Raw numeric value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
