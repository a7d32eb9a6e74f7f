//! Recompute Context
//!
//! The recompute context is handed to every derive closure. Each read made
//! through it is recorded as a dependency of the signal being recomputed;
//! when the closure returns, the collected set replaces the signal's previous
//! dependencies.
//!
//! # Implementation
//!
//! The context is an explicit value rather than ambient state: it borrows the
//! signal graph mutably for the duration of one recompute and is consumed
//! when the recompute finishes. Nested recomputes (a derived signal reading
//! another dirty derived signal) create their own context on top of the same
//! graph borrow, so dependency sets never leak between levels.

use indexmap::IndexSet;

use super::runtime::SignalGraph;
use super::signal::{Readable, SignalId};
use super::value::SignalValue;
use crate::error::{Error, Result};

/// Dependency-collecting view of the signal graph used inside derive
/// closures.
pub struct Recompute<'g> {
    graph: &'g mut SignalGraph,
    owner: SignalId,
    dependencies: IndexSet<SignalId>,
}

impl<'g> Recompute<'g> {
    pub(crate) fn enter(graph: &'g mut SignalGraph, owner: SignalId) -> Self {
        Self {
            graph,
            owner,
            dependencies: IndexSet::new(),
        }
    }

    /// The derived signal being recomputed.
    pub fn owner(&self) -> SignalId {
        self.owner
    }

    /// Read a signal and record it as a dependency.
    pub fn read<T: SignalValue>(&mut self, signal: impl Readable<T>) -> Result<T> {
        let id = signal.signal_id();
        self.dependencies.insert(id);
        self.graph.read_id(id)
    }

    /// Read a named registry entry and record it as a dependency.
    pub fn read_named<T: SignalValue>(&mut self, name: &str) -> Result<T> {
        let id = self
            .graph
            .lookup(name)
            .ok_or_else(|| Error::UnknownInput {
                name: name.to_string(),
            })?;
        self.dependencies.insert(id);
        self.graph.read_id(id)
    }

    /// Read a signal without making it a dependency.
    pub fn untracked<T: SignalValue>(&mut self, signal: impl Readable<T>) -> Result<T> {
        self.graph.read_id(signal.signal_id())
    }

    /// The virtual time the graph was last advanced to.
    pub fn now(&self) -> f64 {
        self.graph.now()
    }

    pub(crate) fn finish(self) -> IndexSet<SignalId> {
        self.dependencies
    }
}
