//! Evaluation order
//!
//! A global topological order of every non-circular entity (Kahn's
//! algorithm), and the per-call slices what-if calls re-evaluate.

use crate::dependency::{DependencyGraph, Direction};
use ahash::{AHashMap, AHashSet};
use sixgu_core::RefId;
use std::collections::VecDeque;

/// Global evaluation order
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    order: Vec<RefId>,
    positions: AHashMap<RefId, usize>,
    circular: AHashSet<RefId>,
}

impl Schedule {
    /// Order every node of `graph` except the `circular` ones so that each
    /// comes after everything it depends on.
    ///
    /// Ties are broken by graph node order, so the result is deterministic.
    pub fn new(graph: &DependencyGraph, circular: AHashSet<RefId>) -> Self {
        let mut pending: AHashMap<RefId, usize> = AHashMap::new();
        let mut queue = VecDeque::new();

        for &id in graph.nodes() {
            if circular.contains(&id) {
                continue;
            }
            let count = graph
                .dependencies(id)
                .iter()
                .filter(|d| !circular.contains(d))
                .count();
            pending.insert(id, count);
            if count == 0 {
                queue.push_back(id);
            }
        }

        let mut order = Vec::with_capacity(pending.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for &dependent in graph.dependents(id) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != pending.len() {
            log::warn!(
                "{} entities could not be scheduled",
                pending.len() - order.len()
            );
        }

        let positions = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self {
            order,
            positions,
            circular,
        }
    }

    /// Every scheduled entity, dependencies first
    pub fn order(&self) -> &[RefId] {
        &self.order
    }

    /// Position of `id` in the order; `None` for circular entities
    pub fn position(&self, id: RefId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn is_circular(&self, id: RefId) -> bool {
        self.circular.contains(&id)
    }

    pub fn circular(&self) -> &AHashSet<RefId> {
        &self.circular
    }

    /// Entities to re-evaluate, in order, when `args` are overridden and
    /// `result` is read: those downstream of an argument and upstream of the
    /// result. Neither the arguments nor the result are included.
    pub fn function_order(
        &self,
        graph: &DependencyGraph,
        args: &[RefId],
        result: RefId,
    ) -> Vec<RefId> {
        let affected = graph.closure(args, Direction::Dependents);
        let needed = graph.closure(&[result], Direction::Dependencies);
        let mut slice: Vec<(usize, RefId)> = affected
            .intersection(&needed)
            .filter_map(|id| self.position(*id).map(|p| (p, *id)))
            .collect();
        slice.sort_unstable();
        slice.into_iter().map(|(_, id)| id).collect()
    }
}
