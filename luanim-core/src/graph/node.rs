//! Graph Vertices
//!
//! This module defines the per-signal bookkeeping that lives in the
//! dependency graph.

use indexmap::IndexSet;

use crate::reactive::SignalId;

/// The kind of vertex in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    /// A source signal. Sources are the roots of the graph: they have
    /// dependents but never dependencies.
    Source,

    /// A derived signal. It has dependencies and may have dependents.
    Derived,
}

/// Dirty state of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The vertex's value is up-to-date.
    Clean,

    /// Something upstream changed, but no direct dependency has been seen to
    /// produce a different value yet.
    MaybeDirty,

    /// A direct dependency changed value. The vertex must recompute.
    Dirty,
}

/// A vertex in the dependency graph.
#[derive(Debug)]
pub struct Vertex {
    kind: VertexKind,

    dirty: DirtyState,

    /// Signals this vertex read during its last successful recompute.
    dependencies: IndexSet<SignalId>,

    /// Signals that read this vertex. Insertion-ordered so propagation is
    /// deterministic.
    dependents: IndexSet<SignalId>,
}

impl Vertex {
    pub fn new(kind: VertexKind) -> Self {
        Self {
            kind,
            dirty: match kind {
                VertexKind::Source => DirtyState::Clean,
                VertexKind::Derived => DirtyState::Dirty,
            },
            dependencies: IndexSet::new(),
            dependents: IndexSet::new(),
        }
    }

    pub fn kind(&self) -> VertexKind {
        self.kind
    }

    pub fn dirty_state(&self) -> DirtyState {
        self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Only a clean vertex is downgraded; a dirty one stays dirty.
    pub fn mark_maybe_dirty(&mut self) {
        if self.dirty == DirtyState::Clean {
            self.dirty = DirtyState::MaybeDirty;
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    pub fn dependencies(&self) -> &IndexSet<SignalId> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &IndexSet<SignalId> {
        &self.dependents
    }

    pub(crate) fn add_dependency(&mut self, id: SignalId) {
        self.dependencies.insert(id);
    }

    pub(crate) fn take_dependencies(&mut self) -> IndexSet<SignalId> {
        std::mem::take(&mut self.dependencies)
    }

    pub(crate) fn add_dependent(&mut self, id: SignalId) {
        self.dependents.insert(id);
    }

    pub(crate) fn remove_dependent(&mut self, id: SignalId) {
        self.dependents.shift_remove(&id);
    }

    pub(crate) fn remove_dependency(&mut self, id: SignalId) {
        self.dependencies.shift_remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_vertex_starts_clean() {
        let vertex = Vertex::new(VertexKind::Source);
        assert_eq!(vertex.kind(), VertexKind::Source);
        assert!(vertex.is_clean());
    }

    #[test]
    fn derived_vertex_starts_dirty() {
        let vertex = Vertex::new(VertexKind::Derived);
        assert_eq!(vertex.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn maybe_dirty_never_downgrades_dirty() {
        let mut vertex = Vertex::new(VertexKind::Derived);

        vertex.mark_maybe_dirty();
        assert_eq!(vertex.dirty_state(), DirtyState::Dirty);

        vertex.mark_clean();
        vertex.mark_maybe_dirty();
        assert_eq!(vertex.dirty_state(), DirtyState::MaybeDirty);

        vertex.mark_dirty();
        assert_eq!(vertex.dirty_state(), DirtyState::Dirty);
    }

    #[test]
    fn edge_sets_ignore_duplicates() {
        let mut vertex = Vertex::new(VertexKind::Derived);
        let dep = SignalId::from_raw(1);

        vertex.add_dependency(dep);
        vertex.add_dependency(dep);
        assert_eq!(vertex.dependencies().len(), 1);

        vertex.remove_dependency(dep);
        assert!(vertex.dependencies().is_empty());
    }
}
