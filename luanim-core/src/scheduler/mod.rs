//! Scheduler
//!
//! Script procedures are ordinary Rust futures run cooperatively against a
//! virtual clock. A procedure suspends only where it awaits: a
//! [`Script::wait`], a [`Script::advance`] or a joined [`TaskHandle`].
//!
//! Each engine tick advances the [`Clock`], wakes every task whose timer is
//! due, and lets the [`Executor`] resume ready tasks oldest first until all
//! of them have suspended again.

mod executor;
mod script;
mod task;
mod time;

pub use executor::{Diagnostics, Executor, StallPolicy, StallReport};
pub use script::{Script, TaskHandle};
pub use task::{TaskFuture, TaskId, TaskState};
pub use time::{Clock, Sleep};
