//! Task records.

use std::fmt;
use std::task::Waker;

use futures_util::future::LocalBoxFuture;

use crate::error::{Error, Result};

/// Identifier of a task. Ids increase in creation order, which is also the
/// order ready tasks are resumed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task.
///
/// ```text
/// Pending -> Running -> Suspended -> Running -> ... -> Completed
///                \-------------------------------------> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Spawned, not yet polled.
    Pending,
    /// Being polled right now.
    Running,
    /// Waiting on a timer, a joined task, or its own tracked children.
    Suspended,
    /// Finished, successfully or with an error.
    Completed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

/// A boxed script procedure.
pub type TaskFuture = LocalBoxFuture<'static, Result<()>>;

pub(crate) struct Task {
    pub(crate) state: TaskState,
    pub(crate) parent: Option<TaskId>,
    /// Every task spawned from this one, detached or not.
    pub(crate) children: Vec<TaskId>,
    /// Detached tasks do not hold up their parent's completion.
    pub(crate) detached: bool,
    /// Taken out while the task is being polled.
    pub(crate) future: Option<TaskFuture>,
    /// Result of the procedure itself, kept while tracked children finish.
    pub(crate) body: Option<Result<()>>,
    pub(crate) outcome: Option<Result<()>>,
    pub(crate) joiners: Vec<Waker>,
    /// Live `TaskHandle`s. A finished task is dropped once this reaches zero.
    pub(crate) handles: usize,
}

impl Task {
    pub(crate) fn new(parent: Option<TaskId>, future: TaskFuture) -> Self {
        Self {
            state: TaskState::Pending,
            parent,
            children: Vec::new(),
            detached: false,
            future: Some(future),
            body: None,
            outcome: None,
            joiners: Vec::new(),
            handles: 0,
        }
    }

    /// Mark the task finished and hand back the wakers of its joiners.
    pub(crate) fn settle(&mut self, state: TaskState, outcome: Result<()>) -> Vec<Waker> {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.outcome = Some(outcome);
        self.future = None;
        std::mem::take(&mut self.joiners)
    }

    pub(crate) fn cancelled_outcome(id: TaskId) -> Result<()> {
        Err(Error::Cancelled { task: id })
    }
}
