//! Dependency Graph
//!
//! This module implements the directed acyclic graph that tracks which
//! derived signals read which other signals.
//!
//! # Overview
//!
//! - Vertices represent signals, either sources or derived.
//! - Edges represent dependencies: if A reads B, there is an edge from B to A.
//!
//! When a signal changes, we traverse the graph to find all affected
//! vertices and mark them as dirty. The signal graph then recomputes only the
//! vertices whose inputs actually changed.
//!
//! # Design Decisions
//!
//! 1. The graph is centralized rather than spread over the signals, which
//!    makes topological ordering and cycle detection straightforward.
//!
//! 2. Vertices are indexed by signal id for O(1) lookups; index maps keep
//!    iteration in insertion order so settlement is deterministic.
//!
//! 3. Both forward (dependencies) and reverse (dependents) edges are stored.

mod dependency;
mod node;

pub use dependency::DependencyGraph;
pub use node::{DirtyState, Vertex, VertexKind};
