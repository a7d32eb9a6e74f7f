//! Virtual Clock
//!
//! Time only moves when the engine ticks. Tasks suspend on timers; each tick
//! fires every timer whose deadline has been reached, waking its task.
//!
//! A [`Sleep`] always suspends at least once, even for a zero delay: it is
//! armed in one tick and can complete no earlier than the next.
//!
//! Each timer remembers the task that was being polled when it was
//! registered, so a cancelled task's timers can be discarded with it.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use super::task::TaskId;
use crate::reactive::TIME_EPSILON;

struct Timer {
    deadline: f64,
    seq: u64,
    task: Option<TaskId>,
    waker: Waker,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    /// Reversed so the heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .total_cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Virtual time plus the pending timers.
#[derive(Default)]
pub struct Clock {
    now: f64,
    tick: u64,
    seq: u64,
    polling: Option<TaskId>,
    timers: BinaryHeap<Timer>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of ticks so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// The task being polled, if any.
    pub fn polling(&self) -> Option<TaskId> {
        self.polling
    }

    pub(crate) fn set_polling(&mut self, task: Option<TaskId>) {
        self.polling = task;
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.timers.peek().map(|timer| timer.deadline)
    }

    /// Start a new tick at `now`. Time never runs backwards.
    pub(crate) fn advance_to(&mut self, now: f64) {
        self.now = self.now.max(now);
        self.tick += 1;
    }

    pub(crate) fn schedule(&mut self, deadline: f64, waker: Waker) {
        self.seq += 1;
        self.timers.push(Timer {
            deadline,
            seq: self.seq,
            task: self.polling,
            waker,
        });
    }

    /// Discard every timer registered by one of `tasks`. Returns how many
    /// were removed.
    pub(crate) fn drop_timers(&mut self, tasks: &[TaskId]) -> usize {
        let before = self.timers.len();
        self.timers
            .retain(|timer| timer.task.map_or(true, |task| !tasks.contains(&task)));
        before - self.timers.len()
    }

    /// Remove every due timer, returning their wakers in deadline order.
    pub(crate) fn fire_due(&mut self) -> Vec<Waker> {
        let mut due = Vec::new();
        while let Some(timer) = self.timers.peek() {
            if timer.deadline > self.now + TIME_EPSILON {
                break;
            }
            if let Some(timer) = self.timers.pop() {
                due.push(timer.waker);
            }
        }
        due
    }

    pub(crate) fn clear(&mut self) {
        self.timers.clear();
    }
}

/// Future returned by `Script::wait`.
#[must_use = "futures do nothing unless awaited"]
pub struct Sleep {
    clock: Rc<RefCell<Clock>>,
    deadline: f64,
    /// Tick in which the timer was first registered.
    armed_at: Option<u64>,
}

impl Sleep {
    pub(crate) fn new(clock: Rc<RefCell<Clock>>, seconds: f64) -> Self {
        let deadline = clock.borrow().now() + seconds;
        Self {
            clock,
            deadline,
            armed_at: None,
        }
    }

    pub fn deadline(&self) -> f64 {
        self.deadline
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let mut clock = this.clock.borrow_mut();

        if let Some(armed_at) = this.armed_at {
            if clock.tick() > armed_at && clock.now() + TIME_EPSILON >= this.deadline {
                return Poll::Ready(());
            }
        } else {
            this.armed_at = Some(clock.tick());
        }

        clock.schedule(this.deadline, cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::task::noop_waker;

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let mut clock = Clock::new();
        clock.schedule(2.0, noop_waker());
        clock.schedule(1.0, noop_waker());
        clock.schedule(3.0, noop_waker());
        assert_eq!(clock.next_deadline(), Some(1.0));

        clock.advance_to(2.0);
        assert_eq!(clock.fire_due().len(), 2);
        assert_eq!(clock.next_deadline(), Some(3.0));
    }

    #[test]
    fn accumulated_time_reaches_deadlines() {
        let mut clock = Clock::new();
        clock.schedule(1.0, noop_waker());
        let now = (0..60).fold(0.0f64, |acc, _| acc + 1.0 / 60.0);
        clock.advance_to(now);
        assert_eq!(clock.fire_due().len(), 1);
    }

    #[test]
    fn zero_sleep_still_yields_once() {
        let clock = Rc::new(RefCell::new(Clock::new()));
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut sleep = Sleep::new(clock.clone(), 0.0);

        assert_eq!(Pin::new(&mut sleep).poll(&mut cx), Poll::Pending);
        assert_eq!(Pin::new(&mut sleep).poll(&mut cx), Poll::Pending);

        clock.borrow_mut().advance_to(0.0);
        assert_eq!(Pin::new(&mut sleep).poll(&mut cx), Poll::Ready(()));
    }

    #[test]
    fn timers_are_dropped_by_owner() {
        let mut clock = Clock::new();
        clock.set_polling(Some(TaskId::from_raw(1)));
        clock.schedule(5.0, noop_waker());
        clock.schedule(6.0, noop_waker());
        clock.set_polling(Some(TaskId::from_raw(2)));
        clock.schedule(7.0, noop_waker());
        clock.set_polling(None);
        clock.schedule(8.0, noop_waker());

        assert_eq!(clock.drop_timers(&[TaskId::from_raw(1)]), 2);
        assert_eq!(clock.pending_timers(), 2);
        assert_eq!(clock.next_deadline(), Some(7.0));
    }

    #[test]
    fn time_never_runs_backwards() {
        let mut clock = Clock::new();
        clock.advance_to(2.0);
        clock.advance_to(1.0);
        assert_eq!(clock.now(), 2.0);
        assert_eq!(clock.tick(), 2);
    }
}
