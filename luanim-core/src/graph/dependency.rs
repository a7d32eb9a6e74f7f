//! Dependency Graph
//!
//! The graph decides which derived signals must be revisited after a change
//! and in which order. It ensures that dependencies are always settled before
//! their dependents.
//!
//! # Algorithm
//!
//! 1. When source signals change, mark their direct dependents `Dirty`.
//! 2. Propagate `MaybeDirty` to everything further downstream (BFS).
//! 3. Sort the collected vertices topologically (Kahn's algorithm).
//! 4. The signal graph walks that order: a `Dirty` vertex recomputes, a
//!    `MaybeDirty` vertex is simply marked clean. If a recompute produces a
//!    different value, its direct dependents are promoted to `Dirty`.
//!
//! Every vertex appears at most once in the order, so a change is propagated
//! exactly once regardless of fan-out.

use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};

use super::node::{Vertex, VertexKind};
use crate::reactive::SignalId;

/// Topology of the signal graph: vertices, edges and dirty flags.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    vertices: IndexMap<SignalId, Vertex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, id: SignalId, kind: VertexKind) {
        self.vertices.insert(id, Vertex::new(kind));
    }

    /// Remove a vertex and every edge touching it.
    ///
    /// Former dependents keep running but will fail to read the removed
    /// signal on their next recompute, so they are marked dirty.
    pub fn remove_vertex(&mut self, id: SignalId) {
        if let Some(vertex) = self.vertices.shift_remove(&id) {
            for dep_id in vertex.dependencies() {
                if let Some(dep) = self.vertices.get_mut(dep_id) {
                    dep.remove_dependent(id);
                }
            }

            for dependent_id in vertex.dependents() {
                if let Some(dependent) = self.vertices.get_mut(dependent_id) {
                    dependent.remove_dependency(id);
                    dependent.mark_dirty();
                }
            }
        }
    }

    pub fn get(&self, id: SignalId) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    pub fn get_mut(&mut self, id: SignalId) -> Option<&mut Vertex> {
        self.vertices.get_mut(&id)
    }

    /// Replace the dependency set of `id`.
    ///
    /// Fails without touching any edge if one of the new dependencies is
    /// `id` itself or lies downstream of it; returns the offending signal.
    pub fn set_dependencies(
        &mut self,
        id: SignalId,
        dependencies: &IndexSet<SignalId>,
    ) -> Result<(), SignalId> {
        for &dep in dependencies {
            if dep == id || self.reaches(id, dep) {
                return Err(dep);
            }
        }

        let old = match self.vertices.get_mut(&id) {
            Some(vertex) => vertex.take_dependencies(),
            None => return Ok(()),
        };
        for dep_id in &old {
            if let Some(dep) = self.vertices.get_mut(dep_id) {
                dep.remove_dependent(id);
            }
        }

        for &dep_id in dependencies {
            if let Some(dep) = self.vertices.get_mut(&dep_id) {
                dep.add_dependent(id);
            }
            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.add_dependency(dep_id);
            }
        }
        Ok(())
    }

    /// Whether `to` is reachable from `from` by following dependent edges.
    pub fn reaches(&self, from: SignalId, to: SignalId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(vertex) = self.vertices.get(&id) {
                for &next in vertex.dependents() {
                    if next == to {
                        return true;
                    }
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Mark the given sources as changed and propagate dirty flags.
    ///
    /// Returns the affected vertices in topological order.
    pub fn mark_changed(&mut self, sources: &[SignalId]) -> Vec<SignalId> {
        let mut to_process = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for source_id in sources {
            if let Some(source) = self.vertices.get(source_id) {
                for &dependent_id in source.dependents() {
                    queue.push_back(dependent_id);
                }
            }
        }
        for &dependent_id in &queue {
            if let Some(vertex) = self.vertices.get_mut(&dependent_id) {
                vertex.mark_dirty();
            }
        }

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }

            if let Some(vertex) = self.vertices.get_mut(&id) {
                vertex.mark_maybe_dirty();
                to_process.push(id);

                for &dependent_id in vertex.dependents() {
                    queue.push_back(dependent_id);
                }
            }
        }

        self.topological_sort(to_process)
    }

    /// Promote the direct dependents of `id` to `Dirty`.
    pub fn mark_dependents_dirty(&mut self, id: SignalId) {
        let dependents: Vec<SignalId> = match self.vertices.get(&id) {
            Some(vertex) => vertex.dependents().iter().copied().collect(),
            None => return,
        };
        for dependent_id in dependents {
            if let Some(dependent) = self.vertices.get_mut(&dependent_id) {
                dependent.mark_dirty();
            }
        }
    }

    /// Order `nodes` so that dependencies come before dependents.
    fn topological_sort(&self, nodes: Vec<SignalId>) -> Vec<SignalId> {
        let node_set: HashSet<_> = nodes.iter().copied().collect();
        let mut in_degree: IndexMap<SignalId, usize> = IndexMap::new();
        let mut result = Vec::with_capacity(nodes.len());
        let mut queue = VecDeque::new();

        // Only edges within the node set count.
        for &id in &nodes {
            if let Some(vertex) = self.vertices.get(&id) {
                let degree = vertex
                    .dependencies()
                    .iter()
                    .filter(|d| node_set.contains(d))
                    .count();
                in_degree.insert(id, degree);
                if degree == 0 {
                    queue.push_back(id);
                }
            }
        }

        while let Some(id) = queue.pop_front() {
            result.push(id);

            if let Some(vertex) = self.vertices.get(&id) {
                for dependent_id in vertex.dependents() {
                    if let Some(degree) = in_degree.get_mut(dependent_id) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(*dependent_id);
                        }
                    }
                }
            }
        }

        result
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}
