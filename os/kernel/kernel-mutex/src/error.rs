/// Result codes reported by the mutex subsystem.
///
/// Every variant is recoverable by the caller. Broken internal invariants are
/// not reported through this type; they halt the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutexError {
    /// The storage handed to `create` still holds a live mutex.
    #[error("storage already holds a live mutex")]
    InvalidState,
    /// The handle does not name a live mutex (never created or deleted).
    #[error("not a live mutex")]
    InvalidObject,
    /// Ceiling exceeded, non-recursive re-lock, or unlock by a non-holder.
    #[error("illegal use of mutex")]
    IllegalUse,
    /// The mutex could not be acquired within the requested time.
    #[error("timed out waiting for mutex")]
    Timeout,
    /// The mutex was deleted while the task was waiting for it.
    #[error("mutex deleted while waiting")]
    Deleted,
    /// Blocking would have closed a cycle of tasks waiting on each other.
    #[error("deadlock detected")]
    Deadlock,
    /// The wait was released forcibly by another part of the kernel.
    #[error("wait released forcibly")]
    Forced,
}

/// Outcome delivered to a suspended task through
/// [`Scheduler::wake`](crate::Scheduler::wake).
pub type WaitResult = Result<(), MutexError>;
