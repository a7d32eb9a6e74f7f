//! Signal Handles
//!
//! Signals live in the [`SignalGraph`](super::SignalGraph) arena; scripts and
//! nodes only hold small `Copy` handles pointing into it. The handle type
//! encodes what a holder may do:
//!
//! - [`Signal<T>`]: a source signal, readable and writable (immediately or
//!   through a tween).
//! - [`Memo<T>`]: a derived signal, read-only, recomputed from its
//!   dependencies.
//! - [`Input<T>`]: a host-published signal, read-only for scripts.
//! - [`Prop<T>`]: a node property, which is either a source or a derived
//!   signal depending on how the node was built.

use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// Stable index of a signal in the arena.
///
/// Ids are never reused, so a handle to a disposed signal can be detected
/// instead of silently aliasing a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u32);

impl SignalId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anything that designates a readable signal of type `T`.
pub trait Readable<T> {
    fn signal_id(&self) -> SignalId;
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            id: SignalId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn from_id(id: SignalId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }

            pub fn id(&self) -> SignalId {
                self.id
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.id).finish()
            }
        }

        impl<T> Readable<T> for $name<T> {
            fn signal_id(&self) -> SignalId {
                self.id
            }
        }
    };
}

handle! {
    /// A writable source signal.
    ///
    /// # Example
    ///
    /// ```rust
    /// use luanim_core::reactive::SignalGraph;
    ///
    /// let mut graph = SignalGraph::new();
    /// let count = graph.create(0.0f32);
    /// graph.set(count, 5.0).unwrap();
    /// assert_eq!(graph.get(&count).unwrap(), 5.0);
    /// ```
    Signal
}

handle! {
    /// A derived signal, recomputed whenever a signal it read changes.
    Memo
}

handle! {
    /// A signal published by the host. Scripts can read it but not write it.
    Input
}

/// A node property: a source signal when seeded from a literal, a derived
/// signal when seeded from a closure.
pub enum Prop<T> {
    Signal(Signal<T>),
    Memo(Memo<T>),
}

impl<T> Prop<T> {
    pub fn id(&self) -> SignalId {
        match self {
            Prop::Signal(s) => s.id(),
            Prop::Memo(m) => m.id(),
        }
    }

    /// The writable handle behind this property, if it has one.
    pub fn signal(&self) -> Result<Signal<T>> {
        match self {
            Prop::Signal(s) => Ok(*s),
            Prop::Memo(m) => Err(Error::NotWritable { signal: m.id() }),
        }
    }
}

impl<T> Clone for Prop<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Prop<T> {}

impl<T> PartialEq for Prop<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<T> fmt::Debug for Prop<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prop::Signal(s) => f.debug_tuple("Prop").field(s).finish(),
            Prop::Memo(m) => f.debug_tuple("Prop").field(m).finish(),
        }
    }
}

impl<T> Readable<T> for Prop<T> {
    fn signal_id(&self) -> SignalId {
        self.id()
    }
}

impl<T> From<Signal<T>> for Prop<T> {
    fn from(signal: Signal<T>) -> Self {
        Prop::Signal(signal)
    }
}

impl<T> From<Memo<T>> for Prop<T> {
    fn from(memo: Memo<T>) -> Self {
        Prop::Memo(memo)
    }
}

impl<T, R: Readable<T>> Readable<T> for &R {
    fn signal_id(&self) -> SignalId {
        (**self).signal_id()
    }
}
