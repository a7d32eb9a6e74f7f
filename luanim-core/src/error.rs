//! Error types shared by every layer of the engine.
//!
//! Structural errors (cycles, ownership violations, type mismatches) abort the
//! operation that caused them and travel back to the calling script through
//! `?`. None of them poison the engine: the signal graph and the scene tree
//! are left exactly as they were before the failed operation.

use crate::reactive::{SignalId, ValueKind};
use crate::scene::NodeId;
use crate::scheduler::TaskId;

/// Errors produced by the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A derived signal read itself, directly or through other signals.
    #[error("cyclic dependency detected while recomputing signal {signal}")]
    CyclicDependency { signal: SignalId },

    /// A tweened write targeted a value kind with no interpolation function.
    #[error("signal {signal} has no interpolation for {kind} values")]
    InvalidInterpolation { signal: SignalId, kind: ValueKind },

    /// The node was destroyed and its id no longer refers to anything.
    #[error("node {node} is no longer part of the scene")]
    DetachedNodeReference { node: NodeId },

    /// The child already has a parent; ownership must stay singular.
    #[error("node {child} is already owned by node {parent}")]
    AlreadyOwned { child: NodeId, parent: NodeId },

    /// Attaching would make a node its own ancestor.
    #[error("attaching node {child} under node {parent} would create a cycle")]
    OwnershipCycle { child: NodeId, parent: NodeId },

    #[error("signal {signal} has been disposed")]
    DisposedSignal { signal: SignalId },

    /// A typed handle was used against a signal holding another kind.
    #[error("signal {signal} holds a {found} value, expected {expected}")]
    TypeMismatch {
        signal: SignalId,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A derived property was asked for its writable handle.
    #[error("signal {signal} is derived and cannot be written")]
    NotWritable { signal: SignalId },

    #[error("no input signal named `{name}`")]
    UnknownInput { name: String },

    #[error("invalid duration {duration}: durations must be finite and non-negative")]
    InvalidDuration { duration: f64 },

    /// A task ran longer than the configured budget without suspending.
    #[error("task {task} ran for {elapsed_ms} ms without reaching a suspension point")]
    SchedulerStall { task: TaskId, elapsed_ms: u64 },

    #[error("task {task} was cancelled")]
    Cancelled { task: TaskId },

    /// Application instructions must use the open opcode range.
    #[error("opcode {opcode} is reserved for built-in instructions")]
    ReservedOpcode { opcode: u8 },

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_their_subject() {
        let err = Error::CyclicDependency {
            signal: SignalId::from_raw(7),
        };
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected while recomputing signal #7"
        );

        let err = Error::InvalidInterpolation {
            signal: SignalId::from_raw(2),
            kind: ValueKind::Text,
        };
        assert_eq!(err.to_string(), "signal #2 has no interpolation for text values");
    }
}
