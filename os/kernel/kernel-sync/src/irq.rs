//! Interrupt masking for critical sections shared with interrupt handlers.
//!
//! Uses `cli/sti` and `pushfq/pop` and therefore targets `x86_64`. These
//! instructions must run where they are legal (ring 0 or a suitable
//! hypervisor context); calling them from user space faults.

use crate::{Mutex, MutexGuard, RawLock, RawUnlock};
use core::ops::{Deref, DerefMut};

/// `RFLAGS.IF`: interrupts enabled.
const IF: u64 = 1 << 9;

/// A mutex guard that also keeps interrupts disabled while held.
///
/// Created by [`Mutex::lock_irq`] or [`Mutex::try_lock_irq`]. Interrupts are
/// disabled before the lock is taken and restored after it is released, so an
/// interrupt handler can never spin on a lock its own CPU holds.
///
/// ```no_run
/// use kernel_sync::{Mutex, RawSpin};
///
/// static M: Mutex<u64, RawSpin> = Mutex::from_raw(RawSpin::new(), 0);
///
/// {
///     let mut g = M.lock_irq();
///     *g += 1;
/// }
/// // mutex released, interrupts restored
/// ```
pub struct IrqMutex<'a, T, R: RawLock + RawUnlock> {
    // Field order is drop order: unlock first, then restore interrupts.
    g: MutexGuard<'a, T, R>,
    _irq: IrqGuard,
}

impl<T, R: RawLock + RawUnlock> Deref for IrqMutex<'_, T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.g
    }
}

impl<T, R: RawLock + RawUnlock> DerefMut for IrqMutex<'_, T, R> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.g
    }
}

impl<T, R: RawLock + RawUnlock> Mutex<T, R> {
    /// Acquires the mutex with interrupts disabled for the guard's lifetime.
    #[inline]
    pub fn lock_irq(&self) -> IrqMutex<'_, T, R> {
        let irq = IrqGuard::new();
        let g = self.lock();
        IrqMutex { g, _irq: irq }
    }

    /// Like [`Mutex::lock_irq`], but gives up if the lock is taken.
    ///
    /// On failure the interrupt state is restored before returning.
    #[inline]
    pub fn try_lock_irq(&self) -> Option<IrqMutex<'_, T, R>> {
        let irq = IrqGuard::new();
        let g = self.try_lock()?;
        Some(IrqMutex { g, _irq: irq })
    }
}

/// Disables hardware interrupts (`cli`).
#[inline]
pub fn cli_stop_interrupts() {
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// Enables hardware interrupts (`sti`).
#[inline]
pub fn sti_enable_interrupts() {
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Returns the current `RFLAGS` value (via `pushfq/pop`).
#[inline]
#[must_use]
pub fn rflags() -> u64 {
    let r: u64;
    unsafe { core::arch::asm!("pushfq; pop {}", out(reg) r, options(nostack, preserves_flags)) }
    r
}

/// Disables interrupts on creation and restores the previous state on drop.
///
/// `sti` is only issued on drop if interrupts were enabled when the guard was
/// created, so guards nest.
pub struct IrqGuard {
    were_enabled: bool,
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl IrqGuard {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        let were_enabled = rflags() & IF != 0;
        if were_enabled {
            cli_stop_interrupts();
        }
        Self { were_enabled }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.were_enabled {
            sti_enable_interrupts();
        }
    }
}
