//! Executor
//!
//! A single-threaded cooperative executor for script procedures.
//!
//! # How It Works
//!
//! Tasks are boxed futures kept in a table keyed by [`TaskId`]. Waking a
//! task puts its id in the ready set; each tick the executor repeatedly pops
//! the smallest ready id and polls that task until nothing is ready. Since
//! ids grow with creation order, ready tasks always resume oldest first, and
//! a task spawned during the tick runs in the same tick once the task that
//! spawned it yields.
//!
//! The task table is never borrowed while a task is being polled: the
//! future is taken out of its record, polled, and put back. A procedure can
//! therefore spawn, cancel or join tasks freely.
//!
//! # Structured completion
//!
//! A task whose procedure has returned still waits for the children it
//! spawned unless they were detached. Cancelling a task cancels its whole
//! subtree and drops the suspended futures along with their timers.
//!
//! A finished task's record is kept only while a `TaskHandle` refers to it.
//! Once the last handle is gone the record is removed and any live children
//! are handed to its parent, so cancelling an ancestor still reaches them.
//!
//! # Stalls
//!
//! Polling cannot be preempted, so stalls are detected after the fact: a
//! poll that overruns the wall-clock budget, or a tick that exceeds its poll
//! budget, is reported. By default this is only a warning; in strict mode
//! it aborts the tick with [`Error::SchedulerStall`].

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use futures_util::task::{waker, ArcWake};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::task::{Task, TaskFuture, TaskId, TaskState};
use super::time::Clock;
use crate::error::{Error, Result};

type ReadySet = Arc<Mutex<BTreeSet<TaskId>>>;

struct TaskWaker {
    id: TaskId,
    ready: ReadySet,
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.ready.lock().insert(arc_self.id);
    }
}

/// Limits used to detect tasks that never yield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StallPolicy {
    /// Wall-clock budget for a single poll.
    pub poll_budget: Duration,
    /// Maximum number of polls in one tick.
    pub max_polls_per_tick: usize,
    /// Turn stall warnings into errors.
    pub strict: bool,
}

impl Default for StallPolicy {
    fn default() -> Self {
        Self {
            poll_budget: Duration::from_millis(50),
            max_polls_per_tick: 10_000,
            strict: false,
        }
    }
}

/// A detected stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallReport {
    pub task: TaskId,
    pub tick: u64,
    pub elapsed_ms: u64,
}

/// Counters describing the executor's work so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub ticks: u64,
    pub polls: u64,
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub stalls: Vec<StallReport>,
}

pub struct Executor {
    tasks: RefCell<BTreeMap<TaskId, Task>>,
    ready: ReadySet,
    clock: Rc<RefCell<Clock>>,
    next_id: Cell<u64>,
    policy: StallPolicy,
    diagnostics: RefCell<Diagnostics>,
}

impl Executor {
    pub fn new(policy: StallPolicy) -> Self {
        Self {
            tasks: RefCell::new(BTreeMap::new()),
            ready: Arc::new(Mutex::new(BTreeSet::new())),
            clock: Rc::new(RefCell::new(Clock::new())),
            next_id: Cell::new(0),
            policy,
            diagnostics: RefCell::new(Diagnostics::default()),
        }
    }

    pub fn clock(&self) -> &Rc<RefCell<Clock>> {
        &self.clock
    }

    pub fn now(&self) -> f64 {
        self.clock.borrow().now()
    }

    /// The task being polled, if any.
    pub fn current(&self) -> Option<TaskId> {
        self.clock.borrow().polling()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.borrow().clone()
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.borrow().get(&id).map(|task| task.state)
    }

    /// Outcome of a finished task.
    pub fn outcome(&self, id: TaskId) -> Option<Result<()>> {
        self.tasks.borrow().get(&id).and_then(|task| task.outcome.clone())
    }

    /// Number of task records held, finished ones included.
    pub fn task_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks
            .borrow()
            .values()
            .all(|task| task.state.is_terminal())
    }

    /// Register a new task. It becomes ready immediately.
    pub fn spawn(&self, parent: Option<TaskId>, future: TaskFuture) -> TaskId {
        let id = TaskId::from_raw(self.next_id.get());
        self.next_id.set(id.raw() + 1);

        {
            let mut tasks = self.tasks.borrow_mut();
            let parent = parent.filter(|p| {
                tasks
                    .get(p)
                    .map(|task| !task.state.is_terminal())
                    .unwrap_or(false)
            });
            if let Some(parent_task) = parent.and_then(|p| tasks.get_mut(&p)) {
                parent_task.children.push(id);
            }
            tasks.insert(id, Task::new(parent, future));
        }

        self.ready.lock().insert(id);
        self.diagnostics.borrow_mut().spawned += 1;
        debug!(task = %id, parent = ?parent, "task spawned");
        id
    }

    /// Count a new handle to `id`.
    pub(crate) fn retain(&self, id: TaskId) {
        if let Some(task) = self.tasks.borrow_mut().get_mut(&id) {
            task.handles += 1;
        }
    }

    /// Drop a handle to `id`, removing the record if it was the last one and
    /// the task has finished.
    pub(crate) fn release(&self, id: TaskId) {
        let unreferenced = match self.tasks.borrow_mut().get_mut(&id) {
            Some(task) => {
                task.handles = task.handles.saturating_sub(1);
                task.handles == 0
            }
            None => false,
        };
        if unreferenced {
            self.reclaim(id);
        }
    }

    /// Remove the record of a finished, unreferenced task.
    fn reclaim(&self, id: TaskId) {
        let mut tasks = self.tasks.borrow_mut();
        let removable = tasks
            .get(&id)
            .map(|task| task.state.is_terminal() && task.handles == 0)
            .unwrap_or(false);
        if !removable {
            return;
        }
        let Some(task) = tasks.remove(&id) else {
            return;
        };

        let orphans: Vec<TaskId> = task
            .children
            .iter()
            .copied()
            .filter(|child| tasks.contains_key(child))
            .collect();
        for child in &orphans {
            if let Some(child) = tasks.get_mut(child) {
                child.parent = task.parent;
            }
        }
        if let Some(parent) = task.parent.and_then(|p| tasks.get_mut(&p)) {
            parent.children.retain(|child| *child != id);
            parent.children.extend(orphans);
        }
        trace!(task = %id, "task record reclaimed");
    }

    /// Stop `id` from holding up its parent's completion.
    pub fn detach(&self, id: TaskId) {
        let parent = {
            let mut tasks = self.tasks.borrow_mut();
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            task.detached = true;
            task.parent
        };
        if let Some(parent) = parent {
            self.try_complete(parent);
        }
    }

    /// Register `waker` to be woken when `id` finishes. Returns the outcome
    /// right away if it already has.
    pub(crate) fn join(&self, id: TaskId, waker: &Waker) -> Option<Result<()>> {
        let mut tasks = self.tasks.borrow_mut();
        let Some(task) = tasks.get_mut(&id) else {
            return Some(Task::cancelled_outcome(id));
        };
        if let Some(outcome) = &task.outcome {
            return Some(outcome.clone());
        }
        if !task.joiners.iter().any(|w| w.will_wake(waker)) {
            task.joiners.push(waker.clone());
        }
        None
    }

    /// Start a tick at virtual time `now` and wake every due timer.
    pub fn begin_tick(&self, now: f64) {
        let due = {
            let mut clock = self.clock.borrow_mut();
            clock.advance_to(now);
            clock.fire_due()
        };
        trace!(now, timers = due.len(), "tick started");
        for waker in due {
            waker.wake();
        }
        self.diagnostics.borrow_mut().ticks += 1;
    }

    /// Poll ready tasks, oldest first, until none are ready.
    pub fn run_ready(&self) -> Result<()> {
        let tick = self.clock.borrow().tick();
        let mut polls = 0usize;

        loop {
            let next = self.ready.lock().pop_first();
            let Some(id) = next else {
                break;
            };

            if polls >= self.policy.max_polls_per_tick {
                // Leave it for the next tick.
                self.ready.lock().insert(id);
                self.report_stall(id, tick, 0)?;
                break;
            }

            let Some(mut future) = self.take_future(id) else {
                continue;
            };
            polls += 1;

            let waker = waker(Arc::new(TaskWaker {
                id,
                ready: Arc::clone(&self.ready),
            }));
            let mut cx = Context::from_waker(&waker);

            self.clock.borrow_mut().set_polling(Some(id));
            let started = Instant::now();
            let poll = future.as_mut().poll(&mut cx);
            let elapsed = started.elapsed();
            self.clock.borrow_mut().set_polling(None);

            match poll {
                Poll::Pending => self.suspend(id, future),
                Poll::Ready(result) => {
                    drop(future);
                    self.finish_body(id, result);
                }
            }

            if elapsed > self.policy.poll_budget {
                self.report_stall(id, tick, elapsed.as_millis() as u64)?;
            }
        }

        self.diagnostics.borrow_mut().polls += polls as u64;
        trace!(tick, polls, "ready tasks drained");
        Ok(())
    }

    fn take_future(&self, id: TaskId) -> Option<TaskFuture> {
        let mut tasks = self.tasks.borrow_mut();
        let task = tasks.get_mut(&id)?;
        if task.state.is_terminal() {
            return None;
        }
        let future = task.future.take()?;
        task.state = TaskState::Running;
        Some(future)
    }

    fn suspend(&self, id: TaskId, future: TaskFuture) {
        let mut tasks = self.tasks.borrow_mut();
        if let Some(task) = tasks.get_mut(&id) {
            if task.state == TaskState::Running {
                task.future = Some(future);
                task.state = TaskState::Suspended;
                return;
            }
        }
        // Cancelled while it was running.
        drop(tasks);
        drop(future);
    }

    fn report_stall(&self, task: TaskId, tick: u64, elapsed_ms: u64) -> Result<()> {
        warn!(
            task = %task,
            tick,
            elapsed_ms,
            "task exceeded its scheduling budget without yielding"
        );
        self.diagnostics.borrow_mut().stalls.push(StallReport {
            task,
            tick,
            elapsed_ms,
        });
        if self.policy.strict {
            Err(Error::SchedulerStall { task, elapsed_ms })
        } else {
            Ok(())
        }
    }

    /// The procedure of `id` returned.
    fn finish_body(&self, id: TaskId, result: Result<()>) {
        let failed = result.is_err();
        let children = {
            let mut tasks = self.tasks.borrow_mut();
            let Some(task) = tasks.get_mut(&id) else {
                return;
            };
            if task.state.is_terminal() {
                return;
            }
            task.body = Some(result);
            task.state = TaskState::Suspended;
            let children = task.children.clone();
            children
                .into_iter()
                .filter(|child| tasks.get(child).map(|c| !c.detached).unwrap_or(false))
                .collect::<Vec<_>>()
        };

        if failed {
            // A failed procedure takes its tracked children down with it.
            for child in children {
                self.cancel(child);
            }
        }
        self.try_complete(id);
    }

    /// Complete `id` if its procedure has returned and every tracked child
    /// has finished, then check its ancestors the same way.
    fn try_complete(&self, id: TaskId) {
        let mut next = Some(id);
        while let Some(id) = next.take() {
            let (wakers, parent) = {
                let mut tasks = self.tasks.borrow_mut();
                let Some(task) = tasks.get(&id) else {
                    break;
                };
                if task.state.is_terminal() || task.body.is_none() {
                    break;
                }
                let waiting = task.children.iter().any(|child| {
                    tasks
                        .get(child)
                        .map(|c| !c.detached && !c.state.is_terminal())
                        .unwrap_or(false)
                });
                if waiting {
                    break;
                }

                let Some(task) = tasks.get_mut(&id) else {
                    break;
                };
                let outcome = task.body.take().unwrap_or(Ok(()));
                self.record_outcome(id, &outcome);
                let wakers = task.settle(TaskState::Completed, outcome);
                (wakers, task.parent.filter(|_| !task.detached))
            };

            for waker in wakers {
                waker.wake();
            }
            self.reclaim(id);
            next = parent;
        }
    }

    fn record_outcome(&self, id: TaskId, outcome: &Result<()>) {
        let mut diagnostics = self.diagnostics.borrow_mut();
        match outcome {
            Ok(()) => {
                diagnostics.completed += 1;
                debug!(task = %id, "task completed");
            }
            Err(err) => {
                diagnostics.failed += 1;
                warn!(task = %id, error = %err, "task failed");
            }
        }
    }

    /// Cancel `id` and every task spawned beneath it.
    ///
    /// Suspended futures are dropped; joiners observe
    /// [`Error::Cancelled`]. Cancelling a finished task does nothing.
    pub fn cancel(&self, id: TaskId) {
        let mut dropped = Vec::new();
        let mut wakers = Vec::new();
        let mut cancelled = Vec::new();

        let parent = {
            let mut tasks = self.tasks.borrow_mut();
            let mut stack = vec![id];
            while let Some(current) = stack.pop() {
                let Some(task) = tasks.get_mut(&current) else {
                    continue;
                };
                stack.extend(task.children.iter().copied());
                if task.state.is_terminal() {
                    continue;
                }
                dropped.extend(task.future.take());
                wakers.extend(task.settle(TaskState::Cancelled, Task::cancelled_outcome(current)));
                self.ready.lock().remove(&current);
                cancelled.push(current);
            }
            tasks
                .get(&id)
                .filter(|task| !task.detached)
                .and_then(|task| task.parent)
        };

        if !cancelled.is_empty() {
            let timers = self.clock.borrow_mut().drop_timers(&cancelled);
            self.diagnostics.borrow_mut().cancelled += cancelled.len() as u64;
            debug!(task = %id, cancelled = cancelled.len(), timers, "task cancelled");
        }
        // Futures may own handles into the executor; drop them unborrowed.
        drop(dropped);
        for waker in wakers {
            waker.wake();
        }
        for task in cancelled {
            self.reclaim(task);
        }
        if let Some(parent) = parent {
            self.try_complete(parent);
        }
    }

    /// Drop every task and timer. Breaks the reference cycles between task
    /// futures and the handles they hold.
    pub fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        self.ready.lock().clear();
        self.clock.borrow_mut().clear();
        drop(tasks);
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.tasks.borrow().len())
            .field("ready", &self.ready.lock().len())
            .field("now", &self.now())
            .finish()
    }
}
