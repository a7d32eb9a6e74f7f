//! Signal Graph
//!
//! The signal graph is the central coordinator that connects source signals,
//! derived signals and tweens. It owns every signal in an arena, manages the
//! dependency graph, and settles dependents when sources change.
//!
//! # How It Works
//!
//! 1. Creating a signal allocates an arena slot and a graph vertex.
//!
//! 2. Deriving a signal evaluates its closure once through a
//!    [`Recompute`] context, which records every read as a dependency.
//!
//! 3. When a source changes (an immediate write, a host publish, or a tween
//!    step), the graph:
//!    a. collects everything downstream and orders it topologically,
//!    b. recomputes each dirty derived signal exactly once,
//!    c. skips derived signals whose inputs turned out not to change.
//!
//! 4. Tweens are resolved in [`SignalGraph::advance_to`], once per tick, in
//!    a single settlement step.

use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, trace, warn};

use super::context::Recompute;
use super::registry::Registry;
use super::signal::{Input, Memo, Readable, Signal, SignalId};
use super::tween::{Sample, Tween};
use super::value::{SignalValue, Value, ValueKind};
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, DirtyState, VertexKind};
use crate::interp::{self, Easing, Interpolator};

type ComputeFn = Rc<dyn Fn(&mut Recompute<'_>) -> Result<Value>>;

enum SlotKind {
    Source {
        interpolate: Option<Interpolator>,
        tween: Option<Tween>,
    },
    Derived {
        compute: ComputeFn,
        computing: bool,
    },
}

struct Slot {
    /// `None` only for a derived signal that has never computed.
    value: Option<Value>,
    kind: SlotKind,
    recomputes: u64,
}

/// Arena of every signal plus the dependency graph linking them.
pub struct SignalGraph {
    slots: Vec<Option<Slot>>,
    topology: DependencyGraph,
    registry: Registry,
    tweening: IndexSet<SignalId>,
    now: f64,
}

impl SignalGraph {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            topology: DependencyGraph::new(),
            registry: Registry::new(),
            tweening: IndexSet::new(),
            now: 0.0,
        }
    }

    /// The virtual time the graph was last advanced to.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of live signals.
    pub fn len(&self) -> usize {
        self.topology.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: SignalId) -> bool {
        self.slot(id).is_ok()
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Create a source signal using the default interpolation for its kind.
    pub fn create<T: SignalValue>(&mut self, initial: T) -> Signal<T> {
        self.create_with(initial, interp::default_for(T::KIND))
    }

    /// Create a source signal with an explicit interpolation function, or
    /// `None` to forbid tweened writes.
    pub fn create_with<T: SignalValue>(
        &mut self,
        initial: T,
        interpolate: Option<Interpolator>,
    ) -> Signal<T> {
        Signal::from_id(self.create_source(initial.into_value(), interpolate))
    }

    pub(crate) fn create_source(
        &mut self,
        initial: Value,
        interpolate: Option<Interpolator>,
    ) -> SignalId {
        let id = self.allocate(Slot {
            value: Some(initial),
            kind: SlotKind::Source {
                interpolate,
                tween: None,
            },
            recomputes: 0,
        });
        self.topology.add_vertex(id, VertexKind::Source);
        id
    }

    /// Create a derived signal.
    ///
    /// The closure runs once immediately to discover its dependencies. If it
    /// fails (including with [`Error::CyclicDependency`]) the signal is not
    /// created and the error is returned.
    pub fn derive<T, F>(&mut self, compute: F) -> Result<Memo<T>>
    where
        T: SignalValue,
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        let id = self.allocate_derived(compute);
        match self.recompute(id) {
            Ok(_) => Ok(Memo::from_id(id)),
            Err(err) => {
                self.dispose(id);
                Err(err)
            }
        }
    }

    /// Create a derived signal reachable through the registry under `name`.
    ///
    /// The name is bound before the first evaluation, so a closure reading
    /// its own name fails with [`Error::CyclicDependency`].
    pub fn derive_named<T, F>(&mut self, name: &str, compute: F) -> Result<Memo<T>>
    where
        T: SignalValue,
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        let id = self.allocate_derived(compute);
        let shadowed = self.registry.insert(name, id);
        match self.recompute(id) {
            Ok(_) => Ok(Memo::from_id(id)),
            Err(err) => {
                self.dispose(id);
                if let Some(previous) = shadowed {
                    self.registry.insert(name, previous);
                }
                Err(err)
            }
        }
    }

    fn allocate_derived<T, F>(&mut self, compute: F) -> SignalId
    where
        T: SignalValue,
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        let compute: ComputeFn = Rc::new(move |cx| compute(cx).map(T::into_value));
        let id = self.allocate(Slot {
            value: None,
            kind: SlotKind::Derived {
                compute,
                computing: false,
            },
            recomputes: 0,
        });
        self.topology.add_vertex(id, VertexKind::Derived);
        id
    }

    fn allocate(&mut self, slot: Slot) -> SignalId {
        let id = SignalId::from_raw(self.slots.len() as u32);
        self.slots.push(Some(slot));
        id
    }

    /// Remove a signal. Dependents become dirty and will report
    /// [`Error::DisposedSignal`] if they still read it.
    pub fn dispose(&mut self, id: SignalId) {
        if let Some(entry) = self.slots.get_mut(id.index()) {
            if entry.take().is_some() {
                self.topology.remove_vertex(id);
                self.tweening.shift_remove(&id);
                self.registry.forget(id);
                trace!(signal = %id, "signal disposed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read the current resolved value of a signal.
    ///
    /// Derived signals that are still dirty (for example after a failed
    /// recompute) are brought up to date first.
    pub fn get<T: SignalValue>(&mut self, signal: impl Readable<T>) -> Result<T> {
        self.read_id(signal.signal_id())
    }

    pub(crate) fn read_id<T: SignalValue>(&mut self, id: SignalId) -> Result<T> {
        let value = self.resolve(id)?;
        T::from_value(&value).ok_or(Error::TypeMismatch {
            signal: id,
            expected: T::KIND,
            found: value.kind(),
        })
    }

    /// Read the dynamic value of a signal.
    pub fn value(&mut self, id: SignalId) -> Result<Value> {
        self.resolve(id)
    }

    pub fn kind_of(&self, id: SignalId) -> Result<ValueKind> {
        let slot = self.slot(id)?;
        match &slot.value {
            Some(value) => Ok(value.kind()),
            None => Err(Error::DisposedSignal { signal: id }),
        }
    }

    fn resolve(&mut self, id: SignalId) -> Result<Value> {
        let clean = self
            .topology
            .get(id)
            .map(|vertex| vertex.dirty_state() == DirtyState::Clean)
            .unwrap_or(false);

        let slot = self.slot(id)?;
        let cached = match (&slot.kind, &slot.value) {
            (SlotKind::Derived { computing: true, .. }, _) => {
                return Err(Error::CyclicDependency { signal: id });
            }
            (SlotKind::Source { .. }, Some(value)) => Some(value.clone()),
            (SlotKind::Derived { .. }, Some(value)) if clean => Some(value.clone()),
            (SlotKind::Derived { .. }, _) => None,
            (SlotKind::Source { .. }, None) => {
                return Err(Error::DisposedSignal { signal: id });
            }
        };

        match cached {
            Some(value) => Ok(value),
            None => self.recompute(id).map(|(value, _)| value),
        }
    }

    /// Re-run a derived signal's closure, replacing its dependency set.
    ///
    /// Returns the new value and whether it differs from the previous one.
    fn recompute(&mut self, id: SignalId) -> Result<(Value, bool)> {
        let compute = match &mut self.slot_mut(id)?.kind {
            SlotKind::Source { .. } => return Err(Error::NotWritable { signal: id }),
            SlotKind::Derived { computing: true, .. } => {
                return Err(Error::CyclicDependency { signal: id });
            }
            SlotKind::Derived { compute, computing } => {
                *computing = true;
                Rc::clone(compute)
            }
        };

        let mut cx = Recompute::enter(self, id);
        let outcome = compute(&mut cx);
        let dependencies = cx.finish();

        if let Ok(slot) = self.slot_mut(id) {
            if let SlotKind::Derived { computing, .. } = &mut slot.kind {
                *computing = false;
            }
        }

        let value = outcome?;
        if self.topology.set_dependencies(id, &dependencies).is_err() {
            return Err(Error::CyclicDependency { signal: id });
        }

        let slot = self.slot_mut(id)?;
        let changed = slot.value.as_ref() != Some(&value);
        slot.value = Some(value.clone());
        slot.recomputes += 1;

        if let Some(vertex) = self.topology.get_mut(id) {
            vertex.mark_clean();
        }
        if changed {
            self.topology.mark_dependents_dirty(id);
        }
        trace!(signal = %id, changed, deps = dependencies.len(), "recomputed");
        Ok((value, changed))
    }

    /// How many times a derived signal has been computed.
    pub fn recompute_count(&self, id: SignalId) -> Option<u64> {
        self.slot(id).ok().map(|slot| slot.recomputes)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a source signal immediately, cancelling any active tween.
    pub fn set<T: SignalValue>(&mut self, signal: Signal<T>, value: T) -> Result<()> {
        self.write_now(signal.id(), value.into_value())
    }

    /// Write a source signal over `duration` seconds of virtual time.
    ///
    /// A zero duration behaves like [`set`](Self::set). On failure the
    /// previous value and any running tween are left untouched.
    pub fn tween<T: SignalValue>(
        &mut self,
        signal: Signal<T>,
        value: T,
        duration: f64,
        easing: Easing,
    ) -> Result<()> {
        self.write(signal.id(), value.into_value(), duration, easing)
    }

    pub(crate) fn write(
        &mut self,
        id: SignalId,
        value: Value,
        duration: f64,
        easing: Easing,
    ) -> Result<()> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(Error::InvalidDuration { duration });
        }
        if duration == 0.0 {
            return self.write_now(id, value);
        }

        let now = self.now;
        let from = self.resolve(id)?;
        check_kind(id, &from, &value)?;

        let slot = self.slot_mut(id)?;
        let SlotKind::Source { interpolate, tween } = &mut slot.kind else {
            return Err(Error::NotWritable { signal: id });
        };
        let invalid = Error::InvalidInterpolation {
            signal: id,
            kind: value.kind(),
        };
        let interpolate = (*interpolate).ok_or_else(|| invalid.clone())?;
        if interpolate(&from, &value, 0.0).is_none() {
            return Err(invalid);
        }

        *tween = Some(Tween {
            from,
            to: value,
            start: now,
            duration,
            easing,
            interpolate,
        });
        self.tweening.insert(id);
        trace!(signal = %id, duration, "tween installed");
        Ok(())
    }

    fn write_now(&mut self, id: SignalId, value: Value) -> Result<()> {
        let slot = self.slot_mut(id)?;
        let SlotKind::Source { tween, .. } = &mut slot.kind else {
            return Err(Error::NotWritable { signal: id });
        };
        if let Some(current) = &slot.value {
            check_kind(id, current, &value)?;
        }
        *tween = None;
        let changed = slot.value.as_ref() != Some(&value);
        slot.value = Some(value);

        self.tweening.shift_remove(&id);
        if changed {
            self.settle(&[id])
        } else {
            Ok(())
        }
    }

    /// Whether a source signal has a tween in flight.
    pub fn is_tweening(&self, id: SignalId) -> bool {
        self.tweening.contains(&id)
    }

    /// Advance the graph's clock and resolve every active tween.
    ///
    /// All tween steps are applied first, then dependents are settled in one
    /// pass. Returns the first recompute failure, if any; the remaining
    /// signals are still settled.
    pub fn advance_to(&mut self, now: f64) -> Result<()> {
        self.now = now;
        if self.tweening.is_empty() {
            return Ok(());
        }

        let mut changed = Vec::new();
        let mut finished = Vec::new();
        for &id in &self.tweening {
            let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::as_mut) else {
                finished.push(id);
                continue;
            };
            let SlotKind::Source {
                tween: Some(active_tween),
                ..
            } = &mut slot.kind
            else {
                finished.push(id);
                continue;
            };

            let value = match active_tween.sample(now) {
                Sample::Running(value) => value,
                Sample::Finished(value) => {
                    finished.push(id);
                    value
                }
            };
            if slot.value.as_ref() != Some(&value) {
                slot.value = Some(value);
                changed.push(id);
            }
        }

        for id in finished {
            self.tweening.shift_remove(&id);
            if let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::as_mut) {
                if let SlotKind::Source { tween, .. } = &mut slot.kind {
                    *tween = None;
                }
            }
        }

        trace!(now, changed = changed.len(), "tweens resolved");
        self.settle(&changed)
    }

    /// Propagate a change through the dependency graph.
    fn settle(&mut self, changed: &[SignalId]) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        let order = self.topology.mark_changed(changed);
        let mut first_error = None;

        for id in order {
            let Some(state) = self.topology.get(id).map(|v| v.dirty_state()) else {
                continue;
            };
            let state = match state {
                DirtyState::MaybeDirty if self.has_stale_dependency(id) => DirtyState::Dirty,
                state => state,
            };
            match state {
                DirtyState::Clean => {}
                DirtyState::MaybeDirty => {
                    if let Some(vertex) = self.topology.get_mut(id) {
                        vertex.mark_clean();
                    }
                }
                DirtyState::Dirty => {
                    if let Err(err) = self.recompute(id) {
                        warn!(signal = %id, error = %err, "derived signal failed to recompute");
                        // Dependents must not keep serving a value derived
                        // from the last good one.
                        self.topology.mark_dependents_dirty(id);
                        first_error.get_or_insert(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn has_stale_dependency(&self, id: SignalId) -> bool {
        let Some(vertex) = self.topology.get(id) else {
            return false;
        };
        vertex.dependencies().iter().any(|&dep| {
            self.topology
                .get(dep)
                .map(|v| v.dirty_state() == DirtyState::Dirty)
                .unwrap_or(false)
        })
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Publish a host value under `name`, creating the signal on first use.
    pub fn publish(&mut self, name: &str, value: Value) -> Result<SignalId> {
        match self.registry.get(name) {
            Some(id) => {
                self.write_now(id, value)?;
                Ok(id)
            }
            None => {
                let interpolate = interp::default_for(value.kind());
                let id = self.create_source(value, interpolate);
                self.registry.insert(name, id);
                debug!(name, signal = %id, "input registered");
                Ok(id)
            }
        }
    }

    /// Bind `name` to an existing signal.
    pub fn register<T: SignalValue>(&mut self, name: &str, signal: impl Readable<T>) -> Result<()> {
        let id = signal.signal_id();
        self.slot(id)?;
        self.registry.insert(name, id);
        Ok(())
    }

    /// Typed read-only handle to a named signal.
    pub fn input<T: SignalValue>(&self, name: &str) -> Result<Input<T>> {
        let id = self.lookup(name).ok_or_else(|| Error::UnknownInput {
            name: name.to_string(),
        })?;
        let found = self.kind_of(id)?;
        if found != T::KIND {
            return Err(Error::TypeMismatch {
                signal: id,
                expected: T::KIND,
                found,
            });
        }
        Ok(Input::from_id(id))
    }

    pub fn lookup(&self, name: &str) -> Option<SignalId> {
        self.registry.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = (&str, SignalId)> {
        self.registry.iter()
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    fn slot(&self, id: SignalId) -> Result<&Slot> {
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(Error::DisposedSignal { signal: id })
    }

    fn slot_mut(&mut self, id: SignalId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(Error::DisposedSignal { signal: id })
    }
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn check_kind(id: SignalId, current: &Value, next: &Value) -> Result<()> {
    if current.kind() == next.kind() {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            signal: id,
            expected: current.kind(),
            found: next.kind(),
        })
    }
}
