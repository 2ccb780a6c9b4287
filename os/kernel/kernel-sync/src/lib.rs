//! # Kernel synchronization primitives
//!
//! A [`Mutex`] is generic over its raw lock ([`RawLock`] + [`RawUnlock`]);
//! [`RawSpin`] is the test-and-test-and-set spin lock used throughout the
//! kernel. On `x86_64` the [`irq`] module adds guards that also mask
//! interrupts for the duration of the critical section.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(target_arch = "x86_64")]
pub mod irq;
mod mutex;
mod raw_spin;

#[cfg(target_arch = "x86_64")]
pub use irq::{IrqGuard, IrqMutex};
pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;

pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    ///
    /// Must only be called by the context that acquired the lock.
    unsafe fn raw_unlock(&self);
}
