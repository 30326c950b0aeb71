//! Dependency tracking for formula evaluation

use crate::resolve::{is_failed_lookup, static_target};
use ahash::{AHashMap, AHashSet};
use sixgu_core::{RefId, Term, Workbook};

/// Which way to follow edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From an entity to what it reads
    Dependencies,
    /// From an entity to what reads it
    Dependents,
}

/// Dependency graph over every entity of a workbook
///
/// A formula entity depends on the refs its formula mentions; a container
/// depends on its children. Both directions are kept, and every entity is a
/// node even when it has no edges.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Nodes in enumeration order
    nodes: Vec<RefId>,
    /// Entity → entities it depends on (precedents)
    dependencies: AHashMap<RefId, Vec<RefId>>,
    /// Entity → entities that depend on it (dependents)
    dependents: AHashMap<RefId, Vec<RefId>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for the whole workbook
    pub fn build(workbook: &Workbook) -> Self {
        let mut graph = Self::new();
        for entity in workbook.entities() {
            graph.add_node(entity.id);
        }
        for entity in workbook.entities() {
            let precedents = match &entity.formula {
                Some(formula) => formula_refs(workbook, formula),
                None => workbook.children(entity.id).to_vec(),
            };
            for precedent in precedents {
                if workbook.contains(precedent) {
                    graph.add_dependency(entity.id, precedent);
                }
            }
        }
        log::trace!(
            "Built dependency graph: {} nodes, {} edges",
            graph.nodes.len(),
            graph.dependencies.values().map(Vec::len).sum::<usize>()
        );
        graph
    }

    /// Add a node with no edges; adding an existing node does nothing
    pub fn add_node(&mut self, id: RefId) {
        if !self.dependencies.contains_key(&id) {
            self.nodes.push(id);
            self.dependencies.insert(id, Vec::new());
            self.dependents.insert(id, Vec::new());
        }
    }

    /// Add a dependency: `dependent` depends on `precedent`
    pub fn add_dependency(&mut self, dependent: RefId, precedent: RefId) {
        self.add_node(dependent);
        self.add_node(precedent);
        let precedents = self.dependencies.entry(dependent).or_default();
        if precedents.contains(&precedent) {
            return;
        }
        precedents.push(precedent);
        self.dependents.entry(precedent).or_default().push(dependent);
    }

    /// All nodes, in the order they were added
    pub fn nodes(&self) -> &[RefId] {
        &self.nodes
    }

    /// Entities `id` depends on
    pub fn dependencies(&self, id: RefId) -> &[RefId] {
        self.dependencies.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Entities that depend on `id`
    pub fn dependents(&self, id: RefId) -> &[RefId] {
        self.dependents.get(&id).map_or(&[], Vec::as_slice)
    }

    fn edges(&self, id: RefId, direction: Direction) -> &[RefId] {
        match direction {
            Direction::Dependencies => self.dependencies(id),
            Direction::Dependents => self.dependents(id),
        }
    }

    /// Everything reachable from `sources` following `direction`, not
    /// including the sources themselves
    pub fn closure(&self, sources: &[RefId], direction: Direction) -> AHashSet<RefId> {
        let mut seen: AHashSet<RefId> = AHashSet::new();
        let mut stack: Vec<RefId> = sources.to_vec();
        while let Some(id) = stack.pop() {
            for &next in self.edges(id, direction) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        for source in sources {
            seen.remove(source);
        }
        seen
    }
}

/// Refs a formula reads, deduplicated, in source order.
///
/// A lookup that names an entity (`Sheet.cell`, `table.column`) depends on
/// that entity, not on the containers it passes through. The container of a
/// failed lookup (`Sheet.missing`) is not a dependency either: the formula
/// is an error whatever the container holds.
pub fn formula_refs(workbook: &Workbook, formula: &Term) -> Vec<RefId> {
    let mut refs = Vec::new();
    let mut seen = AHashSet::new();
    collect_refs(workbook, formula, &mut refs, &mut seen);
    refs
}

fn collect_refs(
    workbook: &Workbook,
    term: &Term,
    refs: &mut Vec<RefId>,
    seen: &mut AHashSet<RefId>,
) {
    if let (Term::Lookup { .. } | Term::LookupIndex { .. }, Some(target)) =
        (term, static_target(workbook, term))
    {
        if seen.insert(target) {
            refs.push(target);
        }
        return;
    }
    if is_failed_lookup(workbook, term) {
        if let Term::LookupIndex { index, .. } = term {
            collect_refs(workbook, index, refs, seen);
        }
        return;
    }
    if let Term::Ref(id) = term {
        if seen.insert(*id) {
            refs.push(*id);
        }
    }
    for child in term.children() {
        collect_refs(workbook, child, refs, seen);
    }
}
