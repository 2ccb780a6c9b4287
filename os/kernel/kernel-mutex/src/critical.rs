//! # Critical section around the mutex subsystem
//!
//! Every mutex operation is a read-modify-write over shared state (admission
//! check, ownership transfer, queue mutation, priority change) that must not
//! interleave with another operation or with interrupt-context code.
//! [`SharedKernel`] keeps a [`MutexKernel`] inside a [`kernel_sync::Mutex`]
//! and hands it out only while that lock is held.
//!
//! On the bare-metal `x86_64` kernel target the section is entered through
//! `Mutex::lock_irq`, so interrupts stay masked until the guard is dropped.
//! Hosted builds (including the tests) take the raw lock only.

use crate::{MutexKernel, Scheduler};
use core::ops::{Deref, DerefMut};
use kernel_sync::{Mutex, RawLock, RawSpin, RawUnlock};

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
type Held<'a, T, R> = kernel_sync::IrqMutex<'a, T, R>;

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
type Held<'a, T, R> = kernel_sync::MutexGuard<'a, T, R>;

/// A [`MutexKernel`] that is only reachable from inside a critical section.
pub struct SharedKernel<S: Scheduler, R = RawSpin> {
    inner: Mutex<MutexKernel<S>, R>,
}

impl<S: Scheduler> SharedKernel<S, RawSpin> {
    #[must_use]
    pub const fn new(kernel: MutexKernel<S>) -> Self {
        Self::from_raw(RawSpin::new(), kernel)
    }
}

impl<S: Scheduler, R> SharedKernel<S, R> {
    pub const fn from_raw(raw: R, kernel: MutexKernel<S>) -> Self {
        Self {
            inner: Mutex::from_raw(raw, kernel),
        }
    }

    /// Direct access when `&mut self` rules out any other context.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut MutexKernel<S> {
        self.inner.get_mut()
    }

    #[must_use]
    pub fn into_inner(self) -> MutexKernel<S> {
        self.inner.into_inner()
    }
}

impl<S: Scheduler, R: RawLock + RawUnlock> SharedKernel<S, R> {
    /// Enter the critical section, waiting if another context is inside.
    #[inline]
    pub fn enter(&self) -> KernelGuard<'_, S, R> {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        let held = self.inner.lock_irq();
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        let held = self.inner.lock();
        KernelGuard { held }
    }

    /// Enter the critical section only if it is free.
    #[inline]
    pub fn try_enter(&self) -> Option<KernelGuard<'_, S, R>> {
        #[cfg(all(target_arch = "x86_64", target_os = "none"))]
        let held = self.inner.try_lock_irq()?;
        #[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
        let held = self.inner.try_lock()?;
        Some(KernelGuard { held })
    }

    /// Run `f` on the kernel inside one critical section.
    #[inline]
    pub fn with<U>(&self, f: impl FnOnce(&mut MutexKernel<S>) -> U) -> U {
        let mut guard = self.enter();
        f(&mut guard)
    }
}

/// Access to the kernel for the duration of one critical section.
///
/// Dropping the guard leaves the section (and unmasks interrupts again on the
/// kernel target if they were enabled on entry).
pub struct KernelGuard<'a, S: Scheduler, R: RawLock + RawUnlock> {
    held: Held<'a, MutexKernel<S>, R>,
}

impl<S: Scheduler, R: RawLock + RawUnlock> Deref for KernelGuard<'_, S, R> {
    type Target = MutexKernel<S>;

    fn deref(&self) -> &MutexKernel<S> {
        &self.held
    }
}

impl<S: Scheduler, R: RawLock + RawUnlock> DerefMut for KernelGuard<'_, S, R> {
    fn deref_mut(&mut self) -> &mut MutexKernel<S> {
        &mut self.held
    }
}
