//! Per-task ownership ledger.
//!
//! For every task the subsystem has seen it records the mutexes the task
//! currently holds and the (single) mutex it is blocked on. Tasks are indexed
//! by their dense [`TaskId`]; the ledger grows on demand.

use crate::{MutexId, TaskId};
use alloc::vec::Vec;

#[derive(Debug, Default)]
pub struct TaskLinks {
    /// Mutexes locked by this task, in no particular order.
    pub held: Vec<MutexId>,
    /// The mutex this task is suspended on, if any.
    pub waiting_on: Option<MutexId>,
}

#[derive(Debug, Default)]
pub struct Ledger {
    tasks: Vec<TaskLinks>,
}

impl Ledger {
    pub const fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Number of task slots known to the ledger.
    ///
    /// Used as the bound for every walk along a blocking chain.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn get(&self, task: TaskId) -> Option<&TaskLinks> {
        self.tasks.get(task.index())
    }

    pub fn entry(&mut self, task: TaskId) -> &mut TaskLinks {
        let idx = task.index();
        if idx >= self.tasks.len() {
            self.tasks.resize_with(idx + 1, TaskLinks::default);
        }
        &mut self.tasks[idx]
    }

    pub fn held(&self, task: TaskId) -> &[MutexId] {
        self.get(task).map_or(&[], |links| links.held.as_slice())
    }

    pub fn waiting_on(&self, task: TaskId) -> Option<MutexId> {
        self.get(task).and_then(|links| links.waiting_on)
    }

    pub fn add_held(&mut self, task: TaskId, mutex: MutexId) {
        let links = self.entry(task);
        debug_assert!(!links.held.contains(&mutex), "{task} already holds {mutex}");
        links.held.push(mutex);
    }

    /// Returns `false` if the task did not hold the mutex.
    pub fn remove_held(&mut self, task: TaskId, mutex: MutexId) -> bool {
        let links = self.entry(task);
        match links.held.iter().position(|m| *m == mutex) {
            Some(pos) => {
                links.held.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn set_waiting(&mut self, task: TaskId, mutex: Option<MutexId>) {
        self.entry(task).waiting_on = mutex;
    }

    /// Reset the task's slot, returning what it still referenced.
    pub fn forget(&mut self, task: TaskId) -> TaskLinks {
        self.tasks
            .get_mut(task.index())
            .map(core::mem::take)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskLinks)> {
        self.tasks
            .iter()
            .enumerate()
            .filter_map(|(idx, links)| Some((TaskId(u32::try_from(idx).ok()?), links)))
    }
}
