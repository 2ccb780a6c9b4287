//! Priority-ordered queue of tasks blocked on one mutex.
//!
//! Entries are kept sorted by the waiter's effective priority, most urgent
//! first. Among equal priorities the arrival order wins: every entry carries
//! the sequence number it was given when it first joined the queue, and a
//! re-prioritised waiter keeps it.

use crate::{Priority, TaskId};
use alloc::collections::VecDeque;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Waiter {
    pub task: TaskId,
    pub priority: Priority,
    seq: u64,
}

impl Waiter {
    /// Sort key: urgency first, then arrival.
    const fn key(&self) -> (u8, u64) {
        (self.priority.value(), self.seq)
    }
}

#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<Waiter>,
    next_seq: u64,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The waiter that would be handed the mutex next.
    pub fn front(&self) -> Option<&Waiter> {
        self.entries.front()
    }

    /// Priority of the most urgent waiter, if any.
    pub fn top_priority(&self) -> Option<Priority> {
        self.front().map(|w| w.priority)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.entries.iter().any(|w| w.task == task)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waiter> {
        self.entries.iter()
    }

    /// Append `task` behind every waiter that is at least as urgent.
    pub fn push(&mut self, task: TaskId, priority: Priority) {
        debug_assert!(!self.contains(task), "{task} queued twice");
        let waiter = Waiter {
            task,
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.insert_sorted(waiter);
    }

    pub fn pop_front(&mut self) -> Option<Waiter> {
        self.entries.pop_front()
    }

    /// Remove `task` from the queue. Returns `false` if it was not queued.
    pub fn remove(&mut self, task: TaskId) -> bool {
        match self.entries.iter().position(|w| w.task == task) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Move `task` to the position matching its new priority.
    ///
    /// Returns `false` if the task is not queued here.
    pub fn reprioritize(&mut self, task: TaskId, priority: Priority) -> bool {
        let Some(pos) = self.entries.iter().position(|w| w.task == task) else {
            return false;
        };
        let Some(mut waiter) = self.entries.remove(pos) else {
            return false;
        };
        waiter.priority = priority;
        self.insert_sorted(waiter);
        true
    }

    /// Drain every waiter, most urgent first.
    pub fn drain(&mut self) -> impl Iterator<Item = Waiter> + '_ {
        self.entries.drain(..)
    }

    fn insert_sorted(&mut self, waiter: Waiter) {
        let key = waiter.key();
        let at = self.entries.partition_point(|w| w.key() <= key);
        self.entries.insert(at, waiter);
    }
}
