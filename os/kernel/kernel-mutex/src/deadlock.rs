//! # Deadlock detection
//!
//! Before a task blocks on a mutex, the detector follows the chain
//! `holder -> mutex it waits on -> that mutex's holder -> ...` starting at the
//! requested mutex. The walk ends when it reaches
//!
//! 1. a task that is not blocked: no cycle, the request may block;
//! 2. the requesting task itself: blocking would close a cycle;
//! 3. more steps than there are tasks: treated as (1) and logged, since it
//!    can only happen if the graph is already corrupt.
//!
//! On a cycle, every mutex on it records the others in its implicated set so
//! the report can be inspected with
//! [`MutexKernel::deadlock_peers`](crate::MutexKernel::deadlock_peers), and
//! the holder of each is announced through
//! [`Scheduler::deadlock`](crate::Scheduler::deadlock).

use crate::{MutexId, MutexKernel, Scheduler, TaskId};
use alloc::vec;
use alloc::vec::Vec;
use log::warn;

impl<S: Scheduler> MutexKernel<S> {
    /// Mutexes on the cycle `caller` would close by blocking on `requested`.
    pub(crate) fn find_cycle(&self, caller: TaskId, requested: MutexId) -> Option<Vec<MutexId>> {
        let bound = self.ledger.task_count() + 1;
        let mut path = vec![requested];
        let mut holder = self.mutexes.linked(requested).holder?;

        for _ in 0..bound {
            if holder == caller {
                return Some(path);
            }
            let next = self.ledger.waiting_on(holder)?;
            path.push(next);
            holder = self.mutexes.linked(next).holder?;
        }

        warn!("deadlock walk from {requested} exceeded {bound} tasks");
        None
    }

    /// Cross-reference every mutex on `cycle` with the others.
    pub(crate) fn report_deadlock(&mut self, caller: TaskId, cycle: &[MutexId]) {
        warn!(
            "deadlock: {caller} would block on {} closing a cycle over {} mutexes",
            cycle[0],
            cycle.len()
        );
        for &id in cycle {
            let mutex = self.mutexes.linked_mut(id);
            mutex.implicated.clear();
            mutex
                .implicated
                .extend(cycle.iter().copied().filter(|&peer| peer != id));
        }

        for &id in cycle {
            if let Some(holder) = self.mutexes.linked(id).holder {
                self.scheduler.deadlock(holder, id);
            }
        }
    }
}
