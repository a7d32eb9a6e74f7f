//! Named-signal registry.
//!
//! The host publishes external data (simulation records, per-entity traits)
//! under string names; scripts and derive closures look them up by name.
//! Insertion order is preserved so listings are stable across runs.

use indexmap::IndexMap;

use super::signal::SignalId;

#[derive(Debug, Default)]
pub struct Registry {
    names: IndexMap<String, SignalId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: SignalId) -> Option<SignalId> {
        self.names.insert(name.into(), id)
    }

    pub fn get(&self, name: &str) -> Option<SignalId> {
        self.names.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<SignalId> {
        self.names.shift_remove(name)
    }

    /// Drop every name bound to `id`.
    pub fn forget(&mut self, id: SignalId) {
        self.names.retain(|_, bound| *bound != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SignalId)> {
        self.names.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
