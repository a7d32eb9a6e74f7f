//! Luanim Core
//!
//! This crate provides the runtime of the luanim animation engine.
//! It implements:
//!
//! - Reactive signals with automatic dependency tracking and tweened writes
//! - Interpolation functions and easing curves
//! - A scene graph whose node properties are signals
//! - A cooperative scheduler running script procedures on a virtual clock
//! - A flat draw-instruction protocol consumed by an external renderer
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: dependency DAG with dirty tracking and topological ordering
//! - `reactive`: the signal arena, handles, tweens and the named registry
//! - `interp`: pure interpolation and easing functions
//! - `scene`: node tree, builders, transforms and draw dispatch
//! - `scheduler`: virtual clock, executor and the [`Script`] handle
//! - `protocol`: opcodes, instructions and frames
//! - `engine`: the per-tick driving loop
//!
//! # Example
//!
//! ```rust
//! use luanim_core::{Engine, EngineConfig, Frame, NodeBuilder};
//! use glam::Vec2;
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine.start(|script| async move {
//!     let x = script.signal(-100.0f32);
//!     let dot = NodeBuilder::circle(8.0).position(Vec2::ZERO);
//!     let node = script.add(dot)?;
//!     let position = script.props(node)?.position.signal()?;
//!
//!     // Two animations running side by side.
//!     let slide = script.parallel(move |script| async move {
//!         script.advance(position, Vec2::new(100.0, 0.0), 1.0).await
//!     });
//!     script.advance(x, 200.0, 0.5).await?;
//!     slide.await
//! });
//!
//! let mut frames: Vec<Frame> = Vec::new();
//! engine.run(&mut frames, 1_000).unwrap();
//! assert_eq!(frames.len(), 61);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod interp;
pub mod protocol;
pub mod reactive;
pub mod scene;
pub mod scheduler;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use interp::Easing;
pub use protocol::{Command, Frame, Instruction, Opcode, Renderer};
pub use reactive::{Input, Memo, Prop, Readable, Recompute, Signal, SignalGraph, SignalId};
pub use scene::{Init, NodeBuilder, NodeId, NodeKind, SceneTree};
pub use scheduler::{Script, TaskHandle, TaskId, TaskState};
