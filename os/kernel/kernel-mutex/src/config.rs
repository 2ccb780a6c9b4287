//! # Mutex subsystem configuration
//!
//! Recursive locking and deadlock detection are optional behaviours of the
//! subsystem. They are selected once, when the [`MutexKernel`](crate::MutexKernel)
//! is started, and are packed into a single feature word.
//!
//! ```
//! use kernel_mutex::MutexConfig;
//!
//! let cfg = MutexConfig::new()
//!     .with_recursive(true)
//!     .with_deadlock_detection(false);
//! assert!(cfg.recursive());
//! assert!(!cfg.deadlock_detection());
//! ```

use bitfield_struct::bitfield;

/// Feature word of the mutex subsystem.
///
/// A zeroed word (`MutexConfig::new()`) disables every optional behaviour;
/// [`MutexConfig::DEFAULT`] enables all of them.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct MutexConfig {
    /// Allow the holder to lock a mutex again (bit 0).
    ///
    /// When clear, a second lock by the holder fails with
    /// [`MutexError::IllegalUse`](crate::MutexError::IllegalUse).
    pub recursive: bool,

    /// Walk the hold/wait graph before every blocking lock (bit 1).
    ///
    /// When set, requests that would close a blocking cycle fail with
    /// [`MutexError::Deadlock`](crate::MutexError::Deadlock) instead of
    /// suspending the caller.
    pub deadlock_detection: bool,

    /// Reserved (bits 2..7).
    #[bits(6)]
    __reserved: u8,
}

impl MutexConfig {
    /// Recursive locking and deadlock detection both enabled.
    pub const DEFAULT: Self = Self::new()
        .with_recursive(true)
        .with_deadlock_detection(true);
}
