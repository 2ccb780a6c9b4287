//! # Priority propagation
//!
//! Keeps every task's effective priority equal to the most urgent of
//!
//! * its base priority,
//! * the ceiling of every ceiling-protocol mutex it holds, and
//! * the effective priority of the most urgent waiter of every mutex it holds.
//!
//! Because a waiter's own effective priority already includes whatever it
//! inherited, this rule carries urgency transitively along a blocking chain
//! `waiter -> mutex -> holder -> mutex -> holder ...`.
//!
//! Both walks below are iterative and bounded by the number of tasks known to
//! the ledger; each task waits on at most one mutex and each mutex has at most
//! one holder, so a chain without a cycle never visits a task twice.

use crate::{MutexKernel, Priority, Scheduler, TaskId};
use log::{trace, warn};

impl<S: Scheduler> MutexKernel<S> {
    /// Raise `task` (and everything it transitively blocks on) to at least
    /// `candidate`. Never lowers a priority.
    pub(crate) fn raise(&mut self, task: TaskId, candidate: Priority) {
        let bound = self.ledger.task_count() + 1;
        let mut cursor = Some(task);
        let mut steps = 0;

        while let Some(task) = cursor {
            if steps > bound {
                warn!("priority boost walk from {task} exceeded {bound} tasks");
                break;
            }
            steps += 1;

            let current = self.scheduler.effective_priority(task);
            if !candidate.is_more_urgent_than(current) {
                break;
            }

            trace!("boost {task}: {current} -> {candidate}");
            self.scheduler.set_effective_priority(task, candidate);
            cursor = self.requeue_waiter(task, candidate);
        }
    }

    /// Bring `task`'s effective priority back in line with what its held
    /// mutexes still justify, then follow the chain while anything changes.
    pub(crate) fn recompute(&mut self, task: TaskId) {
        let bound = self.ledger.task_count() + 1;
        let mut cursor = Some(task);
        let mut steps = 0;

        while let Some(task) = cursor {
            if steps > bound {
                warn!("priority restore walk from {task} exceeded {bound} tasks");
                break;
            }
            steps += 1;

            let target = self.justified_priority(task);
            let current = self.scheduler.effective_priority(task);
            if target == current {
                break;
            }

            trace!("restore {task}: {current} -> {target}");
            self.scheduler.set_effective_priority(task, target);
            cursor = self.requeue_waiter(task, target);
        }
    }

    /// The effective priority `task` is owed right now.
    pub(crate) fn justified_priority(&self, task: TaskId) -> Priority {
        self.ledger
            .held(task)
            .iter()
            .filter_map(|&id| self.mutexes.linked(id).justified_priority())
            .fold(self.scheduler.base_priority(task), Priority::most_urgent)
    }

    /// If `task` is blocked, re-sort it in its wait queue and return the
    /// holder it is blocked on.
    fn requeue_waiter(&mut self, task: TaskId, priority: Priority) -> Option<TaskId> {
        let id = self.ledger.waiting_on(task)?;
        let mutex = self.mutexes.linked_mut(id);
        assert!(
            mutex.wait_queue.reprioritize(task, priority),
            "kernel-mutex: {task} waits on {id} but is not in its queue"
        );
        mutex.holder
    }
}
