//! Scheduler collaborator contract
//!
//! The mutex subsystem does not own tasks, ready queues or the context switch.
//! It consumes the narrow set of operations below from the scheduler, which
//! lets the subsystem run unchanged against the real dispatcher and against a
//! mock in tests.

use crate::{MutexId, Priority, Timeout, WaitResult};
use core::fmt;

/// Stable, dense task index assigned by the scheduler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TaskId(pub u32);

impl TaskId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Operations the mutex subsystem needs from the scheduler.
///
/// # Contract
///
/// 1. `base_priority` is the task's configured baseline and is never changed
///    by the mutex subsystem.
/// 2. `effective_priority` is the dispatch priority; it is only written
///    through `set_effective_priority`, and only by the subsystem while a
///    boost may be outstanding.
/// 3. `suspend` takes the task off the ready queue and arms the wait timer
///    for `Timeout::Ticks`. When the timer fires, the timer machinery must
///    call [`MutexKernel::timeout_expired`](crate::MutexKernel::timeout_expired).
/// 4. `wake` makes a suspended task ready again and cancels its timer. The
///    woken task observes `result` as the return value of its lock request;
///    the subsystem calls `wake` only after it has finished updating all
///    shared state.
pub trait Scheduler {
    /// The task on whose behalf the current request runs.
    fn current_task(&self) -> TaskId;

    /// The task's configured base priority.
    fn base_priority(&self, task: TaskId) -> Priority;

    /// The task's current dispatch priority.
    fn effective_priority(&self, task: TaskId) -> Priority;

    /// Change the task's dispatch priority, re-queueing it if it is ready.
    fn set_effective_priority(&mut self, task: TaskId, priority: Priority);

    /// Block `task` until [`Scheduler::wake`] is called for it.
    fn suspend(&mut self, task: TaskId, timeout: Timeout);

    /// Resume a task previously passed to [`Scheduler::suspend`].
    fn wake(&mut self, task: TaskId, result: WaitResult);

    /// A lock request was refused because it would have closed a blocking
    /// cycle; `task` holds `mutex`, which lies on that cycle.
    ///
    /// Called once per mutex on the cycle, after the cycle was recorded and
    /// before the refused request returns. The default does nothing.
    fn deadlock(&mut self, task: TaskId, mutex: MutexId) {
        let _ = (task, mutex);
    }
}
