//! Engine
//!
//! The engine owns everything a scene needs: the signal graph, the node
//! tree, the executor running script procedures, and the configuration.
//!
//! # Tick order
//!
//! Every tick happens at one instant of virtual time and runs the same
//! phases:
//!
//! 1. Active tweens are resolved at the new time and their dependents
//!    settled.
//! 2. The clock advances and wakes every task whose timer is due.
//! 3. Ready tasks resume, oldest first, until each has suspended again.
//! 4. The scene is traversed from the root and one [`Frame`] is emitted.
//!
//! [`step`](Engine::step) moves time forward by one frame at the configured
//! frame rate. The time of frame `n` is computed as `n / frame_rate` rather
//! than accumulated, so long runs do not drift.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use glam::Affine2;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::protocol::{Frame, Renderer};
use crate::reactive::{Readable, SignalGraph, SignalId, SignalValue, Value, TIME_EPSILON};
use crate::scene::{self, monospace_width, NodeBuilder, NodeId, SceneTree, TextMeasure};
use crate::scheduler::{Diagnostics, Executor, Script, TaskHandle, TaskId, TaskState};

/// State shared between the engine and every [`Script`].
pub(crate) struct World {
    pub(crate) signals: SignalGraph,
    pub(crate) scene: SceneTree,
    pub(crate) root: NodeId,
    pub(crate) measure: TextMeasure,
}

/// Drives scripts, signals and the scene one frame at a time.
///
/// # Example
///
/// ```rust
/// use luanim_core::{Engine, EngineConfig, Frame, NodeBuilder};
///
/// let mut engine = Engine::new(EngineConfig::default()).unwrap();
/// engine.start(|script| async move {
///     let radius = script.signal(5.0f32);
///     script.add(NodeBuilder::circle(radius))?;
///     script.advance(radius, 10.0, 1.0).await
/// });
///
/// let mut frames: Vec<Frame> = Vec::new();
/// engine.run(&mut frames, 600).unwrap();
/// assert!(engine.is_complete());
/// assert_eq!(frames.len(), 61);
/// ```
pub struct Engine {
    config: EngineConfig,
    world: Rc<RefCell<World>>,
    exec: Rc<Executor>,
    root_task: Option<TaskHandle>,
    frames: u64,
    time: f64,
    viewport: Affine2,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let mut signals = SignalGraph::new();
        let mut scene = SceneTree::new();
        let root = scene.create(&mut signals, NodeBuilder::group())?;
        let viewport = scene::viewport(config.width as f32, config.height as f32, config.extent);
        let exec = Rc::new(Executor::new(config.stall_policy()));

        debug!(
            width = config.width,
            height = config.height,
            frame_rate = config.frame_rate,
            "engine created"
        );

        Ok(Self {
            world: Rc::new(RefCell::new(World {
                signals,
                scene,
                root,
                measure: Box::new(monospace_width),
            })),
            exec,
            root_task: None,
            frames: 0,
            time: 0.0,
            viewport,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A handle for building the scene or spawning procedures from outside
    /// a task.
    pub fn script(&self) -> Script {
        Script::new(self.world.clone(), self.exec.clone())
    }

    pub fn root(&self) -> NodeId {
        self.world.borrow().root
    }

    /// Spawn the root procedure. The engine is complete once it and its
    /// tracked children have finished.
    ///
    /// Starting another root replaces the tracked one; the previous task
    /// keeps running.
    pub fn start<F, Fut>(&mut self, procedure: F) -> TaskId
    where
        F: FnOnce(Script) -> Fut,
        Fut: Future<Output = Result<()>> + 'static,
    {
        let future = procedure(self.script());
        let id = self.exec.spawn(None, Box::pin(future));
        self.root_task = Some(TaskHandle::new(id, self.exec.clone()));
        id
    }

    /// Virtual time of the last tick.
    pub fn now(&self) -> f64 {
        self.time
    }

    /// Number of frames emitted so far.
    pub fn frame_index(&self) -> u64 {
        self.frames
    }

    /// Advance to the next frame time.
    pub fn step(&mut self) -> Result<Frame> {
        let time = (self.frames as f64 / self.config.frame_rate).max(self.time);
        self.tick_at(time)
    }

    /// Advance virtual time by `dt` seconds and run one tick.
    pub fn tick(&mut self, dt: f64) -> Result<Frame> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidDuration { duration: dt });
        }
        self.tick_at(self.time + dt)
    }

    fn tick_at(&mut self, time: f64) -> Result<Frame> {
        self.time = time;

        if let Err(err) = self.world.borrow_mut().signals.advance_to(time) {
            // Already reported per signal; the failing vertices stay dirty.
            trace!(error = %err, "tween settlement incomplete");
        }
        self.exec.begin_tick(time);
        self.exec.run_ready()?;

        let mut frame = Frame::new(self.frames, time);
        let drawn = {
            let world = &mut *self.world.borrow_mut();
            world
                .scene
                .traverse(&mut world.signals, world.root, self.viewport, &mut frame)?
        };
        trace!(
            frame = self.frames,
            time,
            drawn,
            instructions = frame.len(),
            "frame emitted"
        );
        self.frames += 1;
        Ok(frame)
    }

    /// Step frames up to and including virtual time `until`, handing each
    /// one to `renderer`.
    pub fn run_until(&mut self, until: f64, renderer: &mut dyn Renderer) -> Result<()> {
        loop {
            let next = (self.frames as f64 / self.config.frame_rate).max(self.time);
            if next > until + TIME_EPSILON {
                return Ok(());
            }
            let frame = self.step()?;
            renderer.render(&frame)?;
        }
    }

    /// Step until the root procedure completes or `max_frames` frames have
    /// been rendered. Returns the number of frames rendered.
    ///
    /// A root procedure that fails or is cancelled ends the run with its
    /// error.
    pub fn run(&mut self, renderer: &mut dyn Renderer, max_frames: u64) -> Result<u64> {
        let mut rendered = 0;
        while !self.is_complete() && rendered < max_frames {
            let frame = self.step()?;
            renderer.render(&frame)?;
            rendered += 1;
        }
        if let Some(Err(err)) = self.root_task().and_then(|id| self.exec.outcome(id)) {
            return Err(err);
        }
        debug!(rendered, complete = self.is_complete(), "run finished");
        Ok(rendered)
    }

    /// Whether the root procedure has finished. True when none was started.
    pub fn is_complete(&self) -> bool {
        self.root_task
            .as_ref()
            .and_then(TaskHandle::state)
            .map(TaskState::is_terminal)
            .unwrap_or(true)
    }

    pub fn root_task(&self) -> Option<TaskId> {
        self.root_task.as_ref().map(TaskHandle::id)
    }

    /// State of a task, while it is running or while a handle to it is held.
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.exec.state(id)
    }

    pub fn task_outcome(&self, id: TaskId) -> Option<Result<()>> {
        self.exec.outcome(id)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.exec.diagnostics()
    }

    // ------------------------------------------------------------------
    // Host inputs
    // ------------------------------------------------------------------

    /// Publish a host value under `name`. Dependents settle immediately.
    pub fn publish<T: SignalValue>(&mut self, name: &str, value: T) -> Result<SignalId> {
        self.world
            .borrow_mut()
            .signals
            .publish(name, value.into_value())
    }

    /// Publish every scalar leaf of a JSON document.
    ///
    /// Nested objects are flattened into dotted names, so
    /// `{"player": {"x": 1.5}}` publishes `player.x`. Leaves with no signal
    /// representation are skipped. Returns the number of values published.
    pub fn publish_json(&mut self, json: &serde_json::Value) -> Result<usize> {
        let mut leaves = Vec::new();
        flatten(json, String::new(), &mut leaves);

        let mut world = self.world.borrow_mut();
        let mut published = 0;
        for (name, leaf) in leaves {
            match Value::from_json(leaf) {
                Some(value) => {
                    world.signals.publish(&name, value)?;
                    published += 1;
                }
                None => debug!(name, "skipping JSON value with no signal representation"),
            }
        }
        Ok(published)
    }

    /// Replace the text measurement used by [`Script::measure_text`].
    pub fn set_text_measure<F>(&mut self, measure: F)
    where
        F: Fn(&str, f32) -> f32 + 'static,
    {
        self.world.borrow_mut().measure = Box::new(measure);
    }

    pub fn read<T: SignalValue>(&self, signal: impl Readable<T>) -> Result<T> {
        self.world.borrow_mut().signals.get(signal)
    }
}

fn flatten<'a>(
    json: &'a serde_json::Value,
    prefix: String,
    out: &mut Vec<(String, &'a serde_json::Value)>,
) {
    match json {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(value, name, out);
            }
        }
        leaf if !prefix.is_empty() => out.push((prefix, leaf)),
        _ => {}
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.exec.shutdown();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("time", &self.time)
            .field("frames", &self.frames)
            .field("root_task", &self.root_task())
            .field("exec", &self.exec)
            .finish()
    }
}
