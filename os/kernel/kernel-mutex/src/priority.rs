//! Task priorities and wait timeouts.

use core::fmt;

/// A task priority.
///
/// Lower numeric values are **more urgent**: `Priority(0)` is the most urgent
/// priority the kernel knows. Use [`Priority::is_more_urgent_than`] and
/// [`Priority::most_urgent`] instead of comparing the raw values so call sites
/// don't have to remember the direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Priority(pub u8);

impl Priority {
    /// The most urgent priority.
    pub const HIGHEST: Self = Self(0);

    /// The least urgent priority (typically the idle task).
    pub const LOWEST: Self = Self(u8::MAX);

    #[inline]
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns `true` if `self` would be dispatched before `other`.
    #[inline]
    #[must_use]
    pub const fn is_more_urgent_than(self, other: Self) -> bool {
        self.0 < other.0
    }

    /// Returns the more urgent of the two priorities.
    #[inline]
    #[must_use]
    pub const fn most_urgent(self, other: Self) -> Self {
        if other.is_more_urgent_than(self) {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prio {}", self.0)
    }
}

/// How long a lock request may wait for the mutex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Never block; fail with [`MutexError::Timeout`](crate::MutexError::Timeout)
    /// if the mutex is held by another task.
    Zero,
    /// Block for at most the given number of system ticks.
    Ticks(u32),
    /// Block until the mutex is handed over or deleted.
    Infinite,
}

impl Timeout {
    /// Whether a request with this timeout is allowed to suspend the caller.
    ///
    /// `Ticks(0)` is treated like [`Timeout::Zero`].
    #[inline]
    #[must_use]
    pub const fn may_block(self) -> bool {
        !matches!(self, Self::Zero | Self::Ticks(0))
    }
}
