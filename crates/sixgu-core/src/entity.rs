//! Entities of the reference model

use crate::id::RefId;
use crate::placement::Placement;
use crate::term::Term;
use std::fmt;

/// Kind of an entity, which fixes where it may live and what it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityKind {
    /// Top-level named container of cells, arrays and tables
    Sheet,
    /// Named formula on a sheet
    Cell,
    /// Named, ordered container of array cells on a sheet
    Array,
    /// Unnamed formula inside an array, addressed by index
    ArrayCell,
    /// Named container of columns on a sheet
    Table,
    /// Named column of a table, an ordered container of table cells
    Column,
    /// Unnamed formula inside a column, addressed by row index
    TableCell,
}

impl EntityKind {
    /// Containment height: 1 for sheets, one more per level of nesting.
    pub fn height(self) -> u32 {
        match self {
            EntityKind::Sheet => 1,
            EntityKind::Cell | EntityKind::Array | EntityKind::Table => 2,
            EntityKind::ArrayCell | EntityKind::Column => 3,
            EntityKind::TableCell => 4,
        }
    }

    /// Whether entities of this kind carry a formula
    pub fn has_formula(self) -> bool {
        matches!(
            self,
            EntityKind::Cell | EntityKind::ArrayCell | EntityKind::TableCell
        )
    }

    /// Whether entities of this kind can hold children
    pub fn is_context(self) -> bool {
        matches!(
            self,
            EntityKind::Sheet | EntityKind::Array | EntityKind::Table | EntityKind::Column
        )
    }

    /// Whether children are found by name (as opposed to by index)
    pub fn children_by_name(self) -> bool {
        matches!(self, EntityKind::Sheet | EntityKind::Table)
    }

    /// Whether entities of this kind carry a name
    pub fn is_named(self) -> bool {
        !matches!(self, EntityKind::ArrayCell | EntityKind::TableCell)
    }

    /// Kind of the children this container holds by index
    pub fn indexed_child(self) -> Option<EntityKind> {
        match self {
            EntityKind::Array => Some(EntityKind::ArrayCell),
            EntityKind::Column => Some(EntityKind::TableCell),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Sheet => "sheet",
            EntityKind::Cell => "cell",
            EntityKind::Array => "array",
            EntityKind::ArrayCell => "array cell",
            EntityKind::Table => "table",
            EntityKind::Column => "column",
            EntityKind::TableCell => "table cell",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One uniquely identified node of the workbook
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: RefId,
    pub kind: EntityKind,
    /// Set for sheets, cells, arrays, tables and columns
    pub name: Option<String>,
    /// Structural parent; `None` only for sheets
    pub parent: Option<RefId>,
    /// Position inside an array or column
    pub index: Option<usize>,
    /// Grid position for sheet-level entities
    pub placement: Option<Placement>,
    /// Stored term tree for formula-bearing entities
    pub formula: Option<Term>,
}

impl Entity {
    pub(crate) fn new(id: RefId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            name: None,
            parent: None,
            index: None,
            placement: None,
            formula: None,
        }
    }

    /// Name, if this kind of entity has one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_context(&self) -> bool {
        self.kind.is_context()
    }

    pub fn has_formula(&self) -> bool {
        self.kind.has_formula()
    }
}

/// Check that a name could be typed as an identifier.
///
/// Any non-empty string is accepted: characters that cannot appear in a bare
/// name are escaped with a backslash when the name is rendered back to text.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
}
