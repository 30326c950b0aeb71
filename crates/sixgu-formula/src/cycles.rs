//! Circular reference detection
//!
//! Strongly connected components (Tarjan's algorithm, iterative so deep
//! chains cannot overflow the stack). A component is circular when it has
//! more than one member or its only member depends on itself.

use crate::dependency::DependencyGraph;
use ahash::{AHashMap, AHashSet};
use sixgu_core::{RefId, Workbook};

/// Every cycle of the graph, as the members of its component
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<RefId>> {
    strongly_connected_components(graph)
        .into_iter()
        .filter(|component| match component.as_slice() {
            [single] => graph.dependencies(*single).contains(single),
            _ => true,
        })
        .collect()
}

/// Formula-bearing entities on a cycle.
///
/// Containers only depend on their children, so they are never the cause of
/// a cycle and are left out even when one passes through them.
pub fn circular_ids(workbook: &Workbook, graph: &DependencyGraph) -> AHashSet<RefId> {
    let mut circular = AHashSet::new();
    for component in find_cycles(graph) {
        log::debug!("Circular reference through {:?}", component);
        circular.extend(
            component
                .into_iter()
                .filter(|id| workbook.entity(*id).map_or(false, |e| e.has_formula())),
        );
    }
    circular
}

struct Tarjan<'g> {
    graph: &'g DependencyGraph,
    next_index: usize,
    index: AHashMap<RefId, usize>,
    lowlink: AHashMap<RefId, usize>,
    stack: Vec<RefId>,
    on_stack: AHashSet<RefId>,
    components: Vec<Vec<RefId>>,
}

fn strongly_connected_components(graph: &DependencyGraph) -> Vec<Vec<RefId>> {
    let mut tarjan = Tarjan {
        graph,
        next_index: 0,
        index: AHashMap::new(),
        lowlink: AHashMap::new(),
        stack: Vec::new(),
        on_stack: AHashSet::new(),
        components: Vec::new(),
    };
    for &root in graph.nodes() {
        if !tarjan.index.contains_key(&root) {
            tarjan.visit(root);
        }
    }
    tarjan.components
}

impl Tarjan<'_> {
    fn discover(&mut self, id: RefId) {
        self.index.insert(id, self.next_index);
        self.lowlink.insert(id, self.next_index);
        self.next_index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);
    }

    fn lower(&mut self, id: RefId, to: usize) {
        if let Some(low) = self.lowlink.get_mut(&id) {
            *low = (*low).min(to);
        }
    }

    fn visit(&mut self, root: RefId) {
        // (node, next edge to look at)
        let graph = self.graph;
        let mut calls: Vec<(RefId, usize)> = vec![(root, 0)];
        self.discover(root);

        while let Some(&(v, edge)) = calls.last() {
            let successors = graph.dependencies(v);
            if let Some(&w) = successors.get(edge) {
                if let Some(top) = calls.last_mut() {
                    top.1 += 1;
                }
                if !self.index.contains_key(&w) {
                    self.discover(w);
                    calls.push((w, 0));
                } else if self.on_stack.contains(&w) {
                    let w_index = self.index[&w];
                    self.lower(v, w_index);
                }
                continue;
            }

            calls.pop();
            let v_low = self.lowlink[&v];
            if let Some(&(parent, _)) = calls.last() {
                self.lower(parent, v_low);
            }
            if v_low == self.index[&v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                component.reverse();
                self.components.push(component);
            }
        }
    }
}
