//! Reactive Primitives
//!
//! This module implements the reactive core of the engine: source signals,
//! derived signals, tweens and the named-input registry. Everything that
//! changes over the course of an animation is a signal.
//!
//! # Concepts
//!
//! ## Source signals
//!
//! A source signal holds a value that scripts write, either immediately or
//! through a tween that runs over virtual time.
//!
//! ## Derived signals
//!
//! A derived signal is a closure over other signals. Its dependencies are
//! discovered by running it: every read made through the [`Recompute`]
//! context is recorded. When any dependency changes, the derived signal is
//! recomputed exactly once per settlement, after all of its own dependencies.
//!
//! ## Inputs
//!
//! The host publishes external data under string names. Published values are
//! ordinary source signals that scripts can only read.
//!
//! # Implementation Notes
//!
//! Signals live in an arena owned by [`SignalGraph`]; handles are plain ids.
//! Dependency tracking uses an explicit context passed to each closure rather
//! than ambient state, so nested recomputes cannot leak dependencies into
//! each other.

mod context;
mod registry;
mod runtime;
mod signal;
mod tween;
mod value;

pub use context::Recompute;
pub use registry::Registry;
pub use runtime::SignalGraph;
pub use signal::{Input, Memo, Prop, Readable, Signal, SignalId};
pub use tween::{Sample, Tween, TIME_EPSILON};
pub use value::{SignalValue, Value, ValueKind};
