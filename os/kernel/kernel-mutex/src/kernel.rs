//! # Mutex kernel context
//!
//! [`MutexKernel`] owns every mutex of one kernel instance, the per-task
//! ownership ledger and the scheduler collaborator. All operations take
//! `&mut self`; callers that share the context between execution contexts
//! wrap it in a [`SharedKernel`](crate::SharedKernel) so every
//! read-modify-write sequence runs inside one critical section.
//!
//! ## Lock state machine
//!
//! ```text
//!               lock (free)                 unlock to 0, queue empty
//!  Unlocked ───────────────► Locked(holder, n) ───────────────────► Unlocked
//!                              │        ▲
//!                              │        │ unlock to 0, queue non-empty:
//!                              └────────┘ Locked(head waiter, 1)
//!
//!  any state ── delete ──► Invalid (terminal; handle reports InvalidObject)
//! ```

use crate::ledger::Ledger;
use crate::mutex::MutexArena;
use crate::{
    MutexConfig, MutexError, MutexId, MutexSlot, Priority, Protocol, Scheduler, TaskId, Timeout,
    WaitResult,
};
use alloc::vec::Vec;
use log::{debug, trace};

/// Successful outcome of [`MutexKernel::lock`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// The caller holds the mutex now (fresh lock or recursive re-lock).
    Locked,
    /// The caller was queued and handed to [`Scheduler::suspend`]. The final
    /// result arrives through [`Scheduler::wake`].
    Suspended,
}

/// The mutex subsystem of one kernel instance.
pub struct MutexKernel<S: Scheduler> {
    config: MutexConfig,
    pub(crate) scheduler: S,
    pub(crate) mutexes: MutexArena,
    pub(crate) ledger: Ledger,
}

impl<S: Scheduler> MutexKernel<S> {
    /// Bring up the mutex subsystem on top of `scheduler`.
    #[must_use]
    pub fn start(config: MutexConfig, scheduler: S) -> Self {
        debug!(
            "mutex subsystem up (recursive: {}, deadlock detection: {})",
            config.recursive(),
            config.deadlock_detection()
        );
        Self {
            config,
            scheduler,
            mutexes: MutexArena::new(),
            ledger: Ledger::new(),
        }
    }

    /// Tear the subsystem down, deleting every live mutex, and hand the
    /// scheduler back.
    ///
    /// Tasks still waiting are woken with [`MutexError::Deleted`].
    #[must_use]
    pub fn stop(mut self) -> S {
        let live: Vec<MutexId> = self.mutexes.ids().collect();
        for id in live {
            self.destroy(id);
        }
        debug!("mutex subsystem down");
        self.scheduler
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> MutexConfig {
        self.config
    }

    #[inline]
    #[must_use]
    pub const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[inline]
    pub const fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Construct a mutex into `slot`.
    ///
    /// The ceiling of [`Protocol::Ceiling`] is the most urgent priority a
    /// task may have and still lock the mutex.
    ///
    /// # Errors
    ///
    /// [`MutexError::InvalidState`] if `slot` still holds a live mutex.
    pub fn create(
        &mut self,
        slot: &mut MutexSlot,
        protocol: Protocol,
    ) -> Result<MutexId, MutexError> {
        if slot.id().is_some_and(|id| self.mutexes.is_live(id)) {
            return Err(MutexError::InvalidState);
        }

        let id = self.mutexes.insert(protocol);
        slot.set(id);
        debug!("created {id} ({protocol:?})");
        Ok(id)
    }

    /// Destroy a mutex.
    ///
    /// Every waiter is woken with [`MutexError::Deleted`]. If the mutex is
    /// held, it is detached from its holder and the holder's priority is
    /// recomputed. Afterwards every copy of `id` is stale.
    ///
    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn delete(&mut self, id: MutexId) -> Result<(), MutexError> {
        self.mutexes.live(id)?;
        self.destroy(id);
        Ok(())
    }

    /// Lock a mutex on behalf of the current task.
    ///
    /// * Free mutex: the caller takes it; under [`Protocol::Ceiling`] its
    ///   effective priority is raised to the ceiling.
    /// * Held by the caller: the lock count is incremented if recursive
    ///   locking is enabled.
    /// * Held by another task: with [`Timeout::Zero`] the call fails at once;
    ///   otherwise the caller is queued by priority, the holder chain inherits
    ///   the caller's priority and the caller is suspended.
    ///
    /// # Errors
    ///
    /// * [`MutexError::InvalidObject`] if `id` is not a live mutex.
    /// * [`MutexError::IllegalUse`] if the caller's base priority is more
    ///   urgent than the ceiling, or on a re-lock with recursion disabled.
    /// * [`MutexError::Timeout`] if the mutex is busy and `timeout` does not
    ///   allow blocking.
    /// * [`MutexError::Deadlock`] if blocking would close a cycle (deadlock
    ///   detection enabled only).
    pub fn lock(&mut self, id: MutexId, timeout: Timeout) -> Result<Acquire, MutexError> {
        let caller = self.scheduler.current_task();
        let mutex = self.mutexes.live(id)?;
        let (protocol, holder) = (mutex.protocol, mutex.holder);

        if let Protocol::Ceiling(ceiling) = protocol
            && self
                .scheduler
                .base_priority(caller)
                .is_more_urgent_than(ceiling)
        {
            return Err(MutexError::IllegalUse);
        }

        match holder {
            None => {
                self.take_ownership(id, caller);
                Ok(Acquire::Locked)
            }
            Some(holder) if holder == caller => {
                if !self.config.recursive() {
                    return Err(MutexError::IllegalUse);
                }
                let mutex = self.mutexes.linked_mut(id);
                mutex.lock_count = mutex
                    .lock_count
                    .checked_add(1)
                    .ok_or(MutexError::IllegalUse)?;
                Ok(Acquire::Locked)
            }
            Some(holder) => {
                if !timeout.may_block() {
                    return Err(MutexError::Timeout);
                }
                if self.config.deadlock_detection()
                    && let Some(cycle) = self.find_cycle(caller, id)
                {
                    self.report_deadlock(caller, &cycle);
                    return Err(MutexError::Deadlock);
                }
                self.block(caller, id, holder, timeout);
                Ok(Acquire::Suspended)
            }
        }
    }

    /// [`MutexKernel::lock`] with [`Timeout::Zero`]; never suspends.
    ///
    /// # Errors
    ///
    /// As for [`MutexKernel::lock`]; a mutex held by another task yields
    /// [`MutexError::Timeout`].
    pub fn lock_polling(&mut self, id: MutexId) -> Result<(), MutexError> {
        // A zero timeout never takes the suspending branch.
        self.lock(id, Timeout::Zero).map(|_| ())
    }

    /// Unlock a mutex held by the current task.
    ///
    /// When the lock count drops to zero the caller's priority falls back to
    /// what its other mutexes still justify, and the most urgent waiter (if
    /// any) becomes the new holder and is woken.
    ///
    /// # Errors
    ///
    /// * [`MutexError::InvalidObject`] if `id` is not a live mutex.
    /// * [`MutexError::IllegalUse`] if the caller does not hold the mutex.
    pub fn unlock(&mut self, id: MutexId) -> Result<(), MutexError> {
        let caller = self.scheduler.current_task();
        if self.mutexes.live(id)?.holder != Some(caller) {
            return Err(MutexError::IllegalUse);
        }

        let mutex = self.mutexes.linked_mut(id);
        mutex.lock_count -= 1;
        if mutex.lock_count > 0 {
            return Ok(());
        }

        self.release(id, caller);
        Ok(())
    }

    /// Timer callback: the wait of `task` ran out.
    ///
    /// Returns `false` if the task was not waiting on a mutex (e.g. it was
    /// handed the mutex in the same tick).
    pub fn timeout_expired(&mut self, task: TaskId) -> bool {
        self.cancel_wait(task, Err(MutexError::Timeout))
    }

    /// Forcibly end the wait of `task`; it is woken with
    /// [`MutexError::Forced`].
    ///
    /// Returns `false` if the task was not waiting on a mutex.
    pub fn release_wait(&mut self, task: TaskId) -> bool {
        self.cancel_wait(task, Err(MutexError::Forced))
    }

    /// Clean up after a terminated task.
    ///
    /// The task leaves any wait queue it is in (without being woken), every
    /// mutex it still holds is unlocked regardless of its lock count and
    /// passed on to the next waiter, and its ledger entry is cleared.
    pub fn task_exited(&mut self, task: TaskId) {
        if let Some(id) = self.ledger.waiting_on(task) {
            self.withdraw(task, id);
        }

        let held: Vec<MutexId> = self.ledger.held(task).to_vec();
        for id in held {
            debug!("{task} exited holding {id}");
            self.release(id, task);
        }

        self.ledger.forget(task);
    }

    #[must_use]
    pub fn is_live(&self, id: MutexId) -> bool {
        self.mutexes.is_live(id)
    }

    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn protocol(&self, id: MutexId) -> Result<Protocol, MutexError> {
        Ok(self.mutexes.live(id)?.protocol)
    }

    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn holder(&self, id: MutexId) -> Result<Option<TaskId>, MutexError> {
        Ok(self.mutexes.live(id)?.holder)
    }

    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn lock_count(&self, id: MutexId) -> Result<u32, MutexError> {
        Ok(self.mutexes.live(id)?.lock_count)
    }

    /// Waiting tasks in hand-over order.
    ///
    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn waiters(&self, id: MutexId) -> Result<Vec<TaskId>, MutexError> {
        Ok(self.mutexes.live(id)?.wait_queue.iter().map(|w| w.task).collect())
    }

    /// Mutexes currently held by `task`, in no particular order.
    #[must_use]
    pub fn held_by(&self, task: TaskId) -> &[MutexId] {
        self.ledger.held(task)
    }

    #[must_use]
    pub fn waiting_on(&self, task: TaskId) -> Option<MutexId> {
        self.ledger.waiting_on(task)
    }

    /// Mutexes reported on the same deadlock cycle as `id`.
    ///
    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn deadlock_peers(&self, id: MutexId) -> Result<&[MutexId], MutexError> {
        Ok(self.mutexes.live(id)?.implicated.as_slice())
    }

    /// Read and clear the deadlock report of `id`.
    ///
    /// # Errors
    ///
    /// [`MutexError::InvalidObject`] if `id` is not a live mutex.
    pub fn take_deadlock_peers(&mut self, id: MutexId) -> Result<Vec<MutexId>, MutexError> {
        self.mutexes.live(id)?;
        Ok(core::mem::take(&mut self.mutexes.linked_mut(id).implicated))
    }

    /// Verify every structural and priority invariant of the subsystem.
    ///
    /// # Panics
    ///
    /// On the first violated invariant; continuing would corrupt scheduling
    /// state.
    pub fn check_invariants(&self) {
        for id in self.mutexes.ids() {
            let mutex = self.mutexes.linked(id);
            assert_eq!(
                mutex.lock_count > 0,
                mutex.holder.is_some(),
                "{id}: lock count {} with holder {:?}",
                mutex.lock_count,
                mutex.holder
            );
            if let Some(holder) = mutex.holder {
                assert!(
                    self.ledger.held(holder).contains(&id),
                    "{id}: holder {holder} does not list it"
                );
            } else {
                assert!(mutex.wait_queue.is_empty(), "{id}: waiters without holder");
            }

            let mut previous: Option<Priority> = None;
            for waiter in mutex.wait_queue.iter() {
                assert_eq!(
                    self.ledger.waiting_on(waiter.task),
                    Some(id),
                    "{id}: queued {} points elsewhere",
                    waiter.task
                );
                assert_eq!(
                    waiter.priority,
                    self.scheduler.effective_priority(waiter.task),
                    "{id}: stale queue priority for {}",
                    waiter.task
                );
                assert!(
                    previous.is_none_or(|p| !waiter.priority.is_more_urgent_than(p)),
                    "{id}: wait queue out of order"
                );
                previous = Some(waiter.priority);
            }
            let queued = mutex.wait_queue.len();
            let distinct = mutex
                .wait_queue
                .iter()
                .filter(|w| mutex.wait_queue.iter().filter(|o| o.task == w.task).count() == 1)
                .count();
            assert_eq!(queued, distinct, "{id}: task queued twice");
        }

        for (task, links) in self.ledger.iter() {
            for &id in &links.held {
                assert_eq!(
                    self.mutexes.get(id).and_then(|m| m.holder),
                    Some(task),
                    "{task} lists {id} it does not hold"
                );
            }
            if let Some(id) = links.waiting_on {
                assert!(
                    self.mutexes.get(id).is_some_and(|m| m.wait_queue.contains(task)),
                    "{task} waits on {id} but is not queued"
                );
            }
            if !links.held.is_empty() {
                assert_eq!(
                    self.scheduler.effective_priority(task),
                    self.justified_priority(task),
                    "{task}: effective priority out of sync with held mutexes"
                );
            }
        }
    }

    fn take_ownership(&mut self, id: MutexId, task: TaskId) {
        let mutex = self.mutexes.linked_mut(id);
        mutex.holder = Some(task);
        mutex.lock_count = 1;
        let owed = mutex.justified_priority();

        self.ledger.add_held(task, id);
        trace!("{task} owns {id}");
        if let Some(priority) = owed {
            self.raise(task, priority);
        }
    }

    fn block(&mut self, caller: TaskId, id: MutexId, holder: TaskId, timeout: Timeout) {
        debug_assert!(
            self.ledger.waiting_on(caller).is_none(),
            "{caller} is already waiting"
        );
        let priority = self.scheduler.effective_priority(caller);
        self.mutexes.linked_mut(id).wait_queue.push(caller, priority);
        self.ledger.set_waiting(caller, Some(id));
        debug!("{caller} blocks on {id} held by {holder} ({timeout:?})");

        self.raise(holder, priority);
        self.scheduler.suspend(caller, timeout);
    }

    /// Drop ownership of `id` completely and pass it to the next waiter.
    fn release(&mut self, id: MutexId, owner: TaskId) {
        let mutex = self.mutexes.linked_mut(id);
        mutex.holder = None;
        mutex.lock_count = 0;
        mutex.implicated.clear();

        assert!(
            self.ledger.remove_held(owner, id),
            "kernel-mutex: {owner} released {id} it did not list"
        );
        self.recompute(owner);

        let Some(next) = self.mutexes.linked_mut(id).wait_queue.pop_front() else {
            trace!("{id} unlocked");
            return;
        };
        self.ledger.set_waiting(next.task, None);
        self.take_ownership(id, next.task);
        trace!("{id} handed from {owner} to {}", next.task);
        self.scheduler.wake(next.task, Ok(()));
    }

    fn cancel_wait(&mut self, task: TaskId, result: WaitResult) -> bool {
        let Some(id) = self.ledger.waiting_on(task) else {
            return false;
        };
        self.withdraw(task, id);
        debug!("{task} stops waiting on {id}: {result:?}");
        self.scheduler.wake(task, result);
        true
    }

    /// Take `task` out of the wait queue of `id` and drop whatever boost it
    /// was lending to the holder chain.
    fn withdraw(&mut self, task: TaskId, id: MutexId) {
        let mutex = self.mutexes.linked_mut(id);
        assert!(
            mutex.wait_queue.remove(task),
            "kernel-mutex: {task} waits on {id} but is not in its queue"
        );
        let holder = mutex.holder;
        self.ledger.set_waiting(task, None);
        if let Some(holder) = holder {
            self.recompute(holder);
        }
    }

    fn destroy(&mut self, id: MutexId) {
        let Some(mut mutex) = self.mutexes.remove(id) else {
            return;
        };

        let waiters: Vec<TaskId> = mutex.wait_queue.drain().map(|w| w.task).collect();
        for &task in &waiters {
            self.ledger.set_waiting(task, None);
        }

        if let Some(holder) = mutex.holder {
            assert!(
                self.ledger.remove_held(holder, id),
                "kernel-mutex: deleted {id} held by {holder} who did not list it"
            );
            self.recompute(holder);
        }

        for other in self.mutexes.objects_mut() {
            other.implicated.retain(|&m| m != id);
        }

        debug!("deleted {id}, waking {} waiters", waiters.len());
        for task in waiters {
            self.scheduler.wake(task, Err(MutexError::Deleted));
        }
    }
}
