//! Workbook type - the entity store and reference model

use crate::entity::{is_valid_name, Entity, EntityKind};
use crate::error::{Error, Result};
use crate::id::RefId;
use crate::placement::{default_cell_name, Placement};
use crate::term::Term;
use ahash::{AHashMap, AHashSet};

/// A workbook: every entity, its containment and its stored formula.
///
/// Enumeration order (the order entities were created in) is kept
/// explicitly, so everything derived from a workbook is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    /// Entities by id
    entities: AHashMap<RefId, Entity>,
    /// Ids in enumeration order
    order: Vec<RefId>,
    /// Context id -> child ids (named containers: creation order,
    /// indexed containers: index order)
    children: AHashMap<RefId, Vec<RefId>>,
    /// Next id to hand out
    next_id: u32,
}

impl Workbook {
    /// Create a new workbook with one sheet named `s1`
    pub fn new() -> Self {
        let mut wb = Self::empty();
        // A fresh workbook cannot have a name clash.
        let _ = wb.add_sheet(None);
        wb
    }

    /// Create an empty workbook with no sheets
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the workbook has no entities
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: RefId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Get an entity by id
    pub fn entity(&self, id: RefId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get an entity by id, failing if it does not exist
    pub fn get(&self, id: RefId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(Error::EntityNotFound(id))
    }

    fn get_mut(&mut self, id: RefId) -> Result<&mut Entity> {
        self.entities.get_mut(&id).ok_or(Error::EntityNotFound(id))
    }

    /// Iterate over all entities in enumeration order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    /// All ids in enumeration order
    pub fn ids(&self) -> &[RefId] {
        &self.order
    }

    /// Iterate over sheets in enumeration order
    pub fn sheets(&self) -> impl Iterator<Item = &Entity> {
        self.entities().filter(|e| e.kind == EntityKind::Sheet)
    }

    /// Get a sheet by name
    pub fn sheet_by_name(&self, name: &str) -> Option<&Entity> {
        self.sheets().find(|s| s.name() == Some(name))
    }

    /// Children of a context, in name-lookup order or index order
    pub fn children(&self, context: RefId) -> &[RefId] {
        self.children
            .get(&context)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Child of `context` with the given name
    pub fn child_by_name(&self, context: RefId, name: &str) -> Option<RefId> {
        let entity = self.entity(context)?;
        if !entity.kind.children_by_name() {
            return None;
        }
        self.children(context)
            .iter()
            .copied()
            .find(|id| self.entity(*id).and_then(Entity::name) == Some(name))
    }

    /// Child of `context` at the given index
    pub fn child_at(&self, context: RefId, index: usize) -> Option<RefId> {
        let entity = self.entity(context)?;
        entity.kind.indexed_child()?;
        self.children(context).get(index).copied()
    }

    /// Structural parent of an entity
    pub fn parent(&self, id: RefId) -> Option<RefId> {
        self.entity(id).and_then(|e| e.parent)
    }

    /// The entity itself followed by each of its ancestors, up to its sheet
    pub fn ancestors(&self, id: RefId) -> Vec<RefId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            if !self.contains(cur) {
                break;
            }
            chain.push(cur);
            current = self.parent(cur);
        }
        chain
    }

    /// Context in which an entity's formula resolves names: its parent
    pub fn formula_context(&self, id: RefId) -> Option<RefId> {
        self.parent(id)
    }

    /// Resolve a bare name as seen from `context`.
    ///
    /// Searches the context's named children, then each enclosing context's,
    /// and finally the sheets.
    pub fn resolve_name(&self, context: Option<RefId>, name: &str) -> Option<RefId> {
        if let Some(context) = context {
            for ctx in self.ancestors(context) {
                if let Some(found) = self.child_by_name(ctx, name) {
                    return Some(found);
                }
            }
        }
        self.sheet_by_name(name).map(|s| s.id)
    }

    /// The entity and every entity it (transitively) contains
    pub fn descendants(&self, id: RefId) -> Vec<RefId> {
        let mut result = vec![id];
        let mut i = 0;
        while i < result.len() {
            result.extend_from_slice(self.children(result[i]));
            i += 1;
        }
        result
    }

    /// Ids of formula-bearing entities, in enumeration order
    pub fn formula_ids(&self) -> impl Iterator<Item = RefId> + '_ {
        self.entities()
            .filter(|e| e.has_formula())
            .map(|e| e.id)
    }

    // === Creation ===

    fn allocate(&mut self, kind: EntityKind) -> Entity {
        let id = RefId(self.next_id);
        self.next_id += 1;
        Entity::new(id, kind)
    }

    fn insert(&mut self, entity: Entity) -> RefId {
        let id = entity.id;
        if let Some(parent) = entity.parent {
            debug_assert_eq!(
                self.entities.get(&parent).map(|p| p.kind.height() + 1),
                Some(entity.kind.height()),
                "{} {} cannot live in {}",
                entity.kind,
                id,
                parent
            );
            let siblings = self.children.entry(parent).or_default();
            match entity.index {
                Some(index) => siblings.insert(index.min(siblings.len()), id),
                None => siblings.push(id),
            }
        }
        self.order.push(id);
        self.entities.insert(id, entity);
        id
    }

    /// Add a sheet. Without a name, the first free `s<n>` is used.
    pub fn add_sheet(&mut self, name: Option<&str>) -> Result<RefId> {
        let name = match name {
            Some(name) => {
                self.validate_name(None, name, None)?;
                name.to_string()
            }
            None => self.generate_sheet_name(),
        };
        let mut sheet = self.allocate(EntityKind::Sheet);
        sheet.name = Some(name);
        Ok(self.insert(sheet))
    }

    /// Add a named child of a sheet (a cell, array or table).
    ///
    /// Without a name the default name for the placement is used.
    pub fn add_to_sheet(
        &mut self,
        sheet: RefId,
        kind: EntityKind,
        name: Option<&str>,
        placement: Placement,
    ) -> Result<RefId> {
        self.expect_kind(sheet, EntityKind::Sheet, "sheet")?;
        if !matches!(
            kind,
            EntityKind::Cell | EntityKind::Array | EntityKind::Table
        ) {
            return Err(Error::other(format!("A {kind} cannot be placed on a sheet")));
        }
        let name = match name {
            Some(name) => {
                self.validate_name(Some(sheet), name, None)?;
                name.to_string()
            }
            None => self.generate_cell_name(sheet, placement),
        };
        let mut entity = self.allocate(kind);
        entity.name = Some(name);
        entity.parent = Some(sheet);
        entity.placement = Some(placement);
        Ok(self.insert(entity))
    }

    /// Add a named column at the end of a table
    pub fn add_column(&mut self, table: RefId, name: &str) -> Result<RefId> {
        self.expect_kind(table, EntityKind::Table, "table")?;
        self.validate_name(Some(table), name, None)?;
        let mut column = self.allocate(EntityKind::Column);
        column.name = Some(name.to_string());
        column.parent = Some(table);
        Ok(self.insert(column))
    }

    /// Insert an unnamed child into an array or column at `index`.
    ///
    /// Children at or after `index` move one place up.
    pub fn insert_indexed(&mut self, context: RefId, index: usize) -> Result<RefId> {
        let kind = self
            .get(context)?
            .kind
            .indexed_child()
            .ok_or(Error::NotAContext(context))?;
        let len = self.children(context).len();
        if index > len {
            return Err(Error::IndexOutOfBounds {
                context,
                index,
                len,
            });
        }
        let mut child = self.allocate(kind);
        child.parent = Some(context);
        child.index = Some(index);
        let id = self.insert(child);
        self.reindex(context);
        Ok(id)
    }

    /// Append an unnamed child to an array or column
    pub fn push_indexed(&mut self, context: RefId) -> Result<RefId> {
        let len = self.children(context).len();
        self.insert_indexed(context, len)
    }

    // === Mutation ===

    /// Rename a named entity
    pub fn rename(&mut self, id: RefId, name: &str) -> Result<()> {
        let entity = self.get(id)?;
        if !entity.kind.is_named() {
            return Err(Error::WrongKind {
                id,
                expected: "named entity",
                actual: entity.kind,
            });
        }
        let parent = entity.parent;
        self.validate_name(parent, name, Some(id))?;
        self.get_mut(id)?.name = Some(name.to_string());
        Ok(())
    }

    /// Replace the stored term tree of a formula-bearing entity
    pub fn set_formula(&mut self, id: RefId, formula: Term) -> Result<()> {
        let entity = self.get_mut(id)?;
        if !entity.has_formula() {
            return Err(Error::WrongKind {
                id,
                expected: "formula-bearing entity",
                actual: entity.kind,
            });
        }
        entity.formula = Some(formula);
        Ok(())
    }

    /// Move and/or resize a sheet-level entity, possibly onto another sheet
    pub fn move_to(&mut self, id: RefId, sheet: RefId, placement: Placement) -> Result<()> {
        self.expect_kind(sheet, EntityKind::Sheet, "sheet")?;
        let entity = self.get(id)?;
        let old_parent = match (entity.parent, entity.placement) {
            (Some(parent), Some(_)) => parent,
            _ => {
                return Err(Error::other(format!(
                    "Can only move/resize things in sheets, not {}",
                    entity.kind
                )))
            }
        };
        if old_parent != sheet {
            let name = entity.name.clone().unwrap_or_default();
            self.validate_name(Some(sheet), &name, Some(id))?;
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.retain(|c| *c != id);
            }
            self.children.entry(sheet).or_default().push(id);
        }
        let entity = self.get_mut(id)?;
        entity.parent = Some(sheet);
        entity.placement = Some(placement);
        Ok(())
    }

    /// Remove an entity and everything it contains.
    ///
    /// Later elements of an array or column move one place down. Returns
    /// the removed entities.
    pub fn remove(&mut self, id: RefId) -> Result<Vec<Entity>> {
        let parent = self.get(id)?.parent;
        let doomed = self.descendants(id);
        let doomed_set: AHashSet<RefId> = doomed.iter().copied().collect();

        if let Some(parent) = parent {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|c| *c != id);
            }
        }
        let indexed = parent
            .and_then(|p| self.entity(p))
            .map_or(false, |p| p.kind.indexed_child().is_some());
        self.order.retain(|c| !doomed_set.contains(c));
        let mut removed = Vec::with_capacity(doomed.len());
        for doomed_id in doomed {
            self.children.remove(&doomed_id);
            if let Some(entity) = self.entities.remove(&doomed_id) {
                removed.push(entity);
            }
        }
        if let Some(parent) = parent.filter(|_| indexed) {
            self.reindex(parent);
        }
        Ok(removed)
    }

    /// Remove the child of an array or column at `index`
    pub fn remove_at(&mut self, context: RefId, index: usize) -> Result<Vec<Entity>> {
        let len = self.children(context).len();
        let id = self
            .child_at(context, index)
            .ok_or(Error::IndexOutOfBounds {
                context,
                index,
                len,
            })?;
        self.remove(id)
    }

    /// Make stored indices match positions in the children list
    fn reindex(&mut self, context: RefId) {
        let children = self.children(context).to_vec();
        for (index, child) in children.into_iter().enumerate() {
            if let Some(entity) = self.entities.get_mut(&child) {
                entity.index = Some(index);
            }
        }
    }

    // === Validation helpers ===

    fn expect_kind(&self, id: RefId, kind: EntityKind, expected: &'static str) -> Result<()> {
        let entity = self.get(id)?;
        if entity.kind != kind {
            return Err(Error::WrongKind {
                id,
                expected,
                actual: entity.kind,
            });
        }
        Ok(())
    }

    /// Check that `name` is usable for a child of `context` (a sheet when
    /// `context` is `None`), ignoring the entity `except`.
    fn validate_name(&self, context: Option<RefId>, name: &str, except: Option<RefId>) -> Result<()> {
        if !is_valid_name(name) {
            return Err(Error::InvalidName(name.to_string()));
        }
        let clash = match context {
            Some(context) => self.child_by_name(context, name),
            None => self.sheet_by_name(name).map(|s| s.id),
        };
        match clash {
            Some(other) if Some(other) != except => Err(Error::DuplicateName {
                name: name.to_string(),
                context: self.describe(context),
            }),
            _ => Ok(()),
        }
    }

    fn describe(&self, context: Option<RefId>) -> String {
        match context.and_then(|c| self.entity(c)) {
            Some(entity) => match entity.name() {
                Some(name) => format!("{} {}", entity.kind, name),
                None => format!("{} {}", entity.kind, entity.id),
            },
            None => "workbook".to_string(),
        }
    }

    /// Generate a unique sheet name
    fn generate_sheet_name(&self) -> String {
        let mut i = 1;
        loop {
            let name = format!("s{}", i);
            if self.sheet_by_name(&name).is_none() {
                return name;
            }
            i += 1;
        }
    }

    /// Default name for a new sheet child, unique within the sheet
    fn generate_cell_name(&self, sheet: RefId, placement: Placement) -> String {
        let base = default_cell_name(placement.y, placement.x);
        if self.child_by_name(sheet, &base).is_none() {
            return base;
        }
        let mut i = 2;
        loop {
            let name = format!("{}_{}", base, i);
            if self.child_by_name(sheet, &name).is_none() {
                return name;
            }
            i += 1;
        }
    }
}
