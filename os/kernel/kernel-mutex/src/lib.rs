//! # Kernel mutexes
//!
//! Task-owned mutual exclusion for a preemptive, priority-based kernel.
//!
//! A locked mutex belongs to the task that locked it; only that task may
//! unlock it. Ownership lets the kernel bound priority inversion with one of
//! two protocols chosen per mutex:
//!
//! * [`Protocol::Inheritance`]: a holder runs at the priority of its most
//!   urgent waiter, transitively along chains of blocked tasks.
//! * [`Protocol::Ceiling`]: a holder runs at the mutex's ceiling for as long
//!   as it holds it; tasks more urgent than the ceiling may not lock it.
//!
//! Recursive locking and deadlock detection are optional (see
//! [`MutexConfig`]).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ SharedKernel (kernel_sync::Mutex, IRQs masked)       │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ MutexKernel: create / delete / lock / unlock   │  │
//! │  │   ├── deadlock detection (before blocking)     │  │
//! │  │   ├── priority propagation (raise/recompute)   │  │
//! │  │   ├── MutexArena ── WaitQueue per mutex        │  │
//! │  │   └── Ledger: held mutexes + wait state / task │  │
//! │  └──────────────────────┬─────────────────────────┘  │
//! └─────────────────────────┼────────────────────────────┘
//!                           ▼
//!        Scheduler (current task, priorities, suspend/wake)
//! ```
//!
//! Tasks and mutexes reference each other only through [`TaskId`] and
//! [`MutexId`] handles; the [`MutexKernel`] owns all mutex state and the
//! scheduler owns the tasks.
//!
//! ## Blocking
//!
//! The context switch belongs to the scheduler. A lock request that has to
//! wait returns [`Acquire::Suspended`] after handing the caller to
//! [`Scheduler::suspend`]; the outcome the task eventually observes is the
//! [`WaitResult`] passed to [`Scheduler::wake`] by the unlock, delete,
//! timeout or forced release that ends the wait.

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod config;
pub mod critical;
mod deadlock;
mod error;
mod kernel;
mod ledger;
mod mutex;
mod priority;
mod propagation;
mod scheduler;
mod wait_queue;

pub use config::MutexConfig;
pub use critical::{KernelGuard, SharedKernel};
pub use error::{MutexError, WaitResult};
pub use kernel::{Acquire, MutexKernel};
pub use mutex::{MutexId, MutexSlot, Protocol};
pub use priority::{Priority, Timeout};
pub use scheduler::{Scheduler, TaskId};
