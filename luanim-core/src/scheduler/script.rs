//! The handle script procedures drive the engine through.

use std::cell::RefCell;
use std::future::Future;
use std::ops::Add;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::debug;

use super::executor::Executor;
use super::task::{TaskId, TaskState};
use super::time::Sleep;
use crate::engine::World;
use crate::error::Result;
use crate::interp::{Easing, Interpolator};
use crate::reactive::{Input, Memo, Readable, Recompute, Signal, SignalId, SignalValue};
use crate::scene::{NodeBuilder, NodeId, NodeKind, NodeProps};

/// Access to signals, the scene and virtual time from inside a procedure.
///
/// Cloning is cheap; every clone talks to the same engine. The world is only
/// borrowed for the duration of a single call, never across an `.await`.
///
/// # Example
///
/// ```rust
/// use luanim_core::{Engine, EngineConfig, NodeBuilder};
/// use glam::Vec2;
///
/// let mut engine = Engine::new(EngineConfig::default()).unwrap();
/// engine.start(|script| async move {
///     let x = script.signal(0.0f32);
///     script.add(NodeBuilder::circle(10.0).position(Vec2::ZERO).rotation(x))?;
///     script.advance(x, 1.0, 0.5).await?;
///     Ok(())
/// });
/// engine.step().unwrap();
/// ```
#[derive(Clone)]
pub struct Script {
    world: Rc<RefCell<World>>,
    exec: Rc<Executor>,
}

impl Script {
    pub(crate) fn new(world: Rc<RefCell<World>>, exec: Rc<Executor>) -> Self {
        Self { world, exec }
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.exec.now()
    }

    /// The scene root every visible node hangs from.
    pub fn root(&self) -> NodeId {
        self.world.borrow().root
    }

    /// The task currently running, if called from inside one.
    pub fn task(&self) -> Option<TaskId> {
        self.exec.current()
    }

    // ------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------

    pub fn signal<T: SignalValue>(&self, initial: T) -> Signal<T> {
        self.world.borrow_mut().signals.create(initial)
    }

    /// Create a signal with an explicit interpolation function.
    pub fn signal_with<T: SignalValue>(
        &self,
        initial: T,
        interpolate: Option<Interpolator>,
    ) -> Signal<T> {
        self.world
            .borrow_mut()
            .signals
            .create_with(initial, interpolate)
    }

    pub fn derive<T, F>(&self, compute: F) -> Result<Memo<T>>
    where
        T: SignalValue,
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        self.world.borrow_mut().signals.derive(compute)
    }

    pub fn derive_named<T, F>(&self, name: &str, compute: F) -> Result<Memo<T>>
    where
        T: SignalValue,
        F: Fn(&mut Recompute<'_>) -> Result<T> + 'static,
    {
        self.world.borrow_mut().signals.derive_named(name, compute)
    }

    pub fn read<T: SignalValue>(&self, signal: impl Readable<T>) -> Result<T> {
        self.world.borrow_mut().signals.get(signal)
    }

    pub fn set<T: SignalValue>(&self, signal: Signal<T>, value: T) -> Result<()> {
        self.world.borrow_mut().signals.set(signal, value)
    }

    /// Start a tween without waiting for it.
    pub fn tween<T: SignalValue>(
        &self,
        signal: Signal<T>,
        value: T,
        duration: f64,
        easing: Easing,
    ) -> Result<()> {
        self.world
            .borrow_mut()
            .signals
            .tween(signal, value, duration, easing)
    }

    /// Read-only handle to a value published by the host.
    pub fn input<T: SignalValue>(&self, name: &str) -> Result<Input<T>> {
        self.world.borrow().signals.input(name)
    }

    pub fn dispose(&self, signal: SignalId) {
        self.world.borrow_mut().signals.dispose(signal);
    }

    // ------------------------------------------------------------------
    // Scene
    // ------------------------------------------------------------------

    /// Create an orphan node. It is not drawn until attached.
    pub fn create(&self, builder: NodeBuilder) -> Result<NodeId> {
        let world = &mut *self.world.borrow_mut();
        world.scene.create(&mut world.signals, builder)
    }

    /// Create a node and attach it to the root.
    pub fn add(&self, builder: NodeBuilder) -> Result<NodeId> {
        let world = &mut *self.world.borrow_mut();
        let node = world.scene.create(&mut world.signals, builder)?;
        world.scene.attach(world.root, node)?;
        Ok(node)
    }

    pub fn attach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.world.borrow_mut().scene.attach(parent, child)
    }

    pub fn detach(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.world.borrow_mut().scene.detach(parent, child)
    }

    /// Free `node` and its subtree, disposing the signals they own.
    pub fn destroy(&self, node: NodeId) -> Result<()> {
        let world = &mut *self.world.borrow_mut();
        world.scene.destroy(&mut world.signals, node)
    }

    /// Property handles of a node, for reading or animating.
    pub fn props(&self, node: NodeId) -> Result<NodeProps> {
        Ok(*self.world.borrow().scene.node(node)?.props())
    }

    pub fn kind(&self, node: NodeId) -> Result<NodeKind> {
        Ok(self.world.borrow().scene.node(node)?.kind().clone())
    }

    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.world.borrow().scene.children(node)?.to_vec())
    }

    /// Tie `signal`'s lifetime to `node`.
    pub fn adopt(&self, node: NodeId, signal: SignalId) -> Result<()> {
        self.world.borrow_mut().scene.adopt(node, signal)
    }

    /// Width of `text` at `size`, as measured by the host.
    pub fn measure_text(&self, text: &str, size: f32) -> f32 {
        let world = self.world.borrow();
        (world.measure)(text, size)
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Suspend for `seconds` of virtual time.
    ///
    /// Always yields at least once: `wait(0.0)` resumes on the next tick.
    /// Negative or non-finite delays count as zero.
    pub fn wait(&self, seconds: f64) -> Sleep {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        Sleep::new(self.exec.clock().clone(), seconds)
    }

    /// Tween `signal` by `delta` over `duration` seconds, then wait for it.
    pub async fn advance<T>(&self, signal: Signal<T>, delta: T, duration: f64) -> Result<()>
    where
        T: SignalValue + Add<Output = T>,
    {
        {
            let mut world = self.world.borrow_mut();
            let current = world.signals.get(signal)?;
            world
                .signals
                .tween(signal, current + delta, duration, Easing::Linear)?;
        }
        self.wait(duration).await;
        Ok(())
    }

    /// Tween `signal` to `target` with `easing`, then wait for it.
    pub async fn animate<T: SignalValue>(
        &self,
        signal: Signal<T>,
        target: T,
        duration: f64,
        easing: Easing,
    ) -> Result<()> {
        self.tween(signal, target, duration, easing)?;
        self.wait(duration).await;
        Ok(())
    }

    /// Run `procedure` as a child of the current task without suspending.
    ///
    /// The caller's task does not complete until the child has, unless the
    /// returned handle is detached.
    pub fn parallel<F, Fut>(&self, procedure: F) -> TaskHandle
    where
        F: FnOnce(Script) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let future = procedure(self.clone());
        let id = self.exec.spawn(self.exec.current(), Box::pin(future));
        TaskHandle::new(id, self.exec.clone())
    }

    /// Cancel a task and everything it spawned.
    pub fn cancel(&self, task: TaskId) {
        self.exec.cancel(task);
    }
}

/// A spawned task. Awaiting it yields the task's outcome.
///
/// The task's state and outcome stay available while any handle to it is
/// alive; after the last one is dropped a finished task is forgotten.
#[must_use = "dropping a handle does not detach the task; await, detach or cancel it"]
pub struct TaskHandle {
    id: TaskId,
    exec: Rc<Executor>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, exec: Rc<Executor>) -> Self {
        exec.retain(id);
        Self { id, exec }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> Option<TaskState> {
        self.exec.state(self.id)
    }

    pub fn is_finished(&self) -> bool {
        self.state().map(TaskState::is_terminal).unwrap_or(true)
    }

    /// Let the parent complete without waiting for this task.
    pub fn detach(self) {
        debug!(task = %self.id, "task detached");
        self.exec.detach(self.id);
    }

    pub fn cancel(&self) {
        self.exec.cancel(self.id);
    }
}

impl Clone for TaskHandle {
    fn clone(&self) -> Self {
        Self::new(self.id, self.exec.clone())
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.exec.release(self.id);
    }
}

impl Future for TaskHandle {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        match self.exec.join(self.id, cx.waker()) {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
