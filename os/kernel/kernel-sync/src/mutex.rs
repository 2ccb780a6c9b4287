use crate::{RawLock, RawUnlock};
use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// A value that is only reachable while the raw lock `R` is held.
pub struct Mutex<T, R> {
    raw: R,
    cell: UnsafeCell<T>,
    _no_send_sync: PhantomData<*mut ()>, // !Send/!Sync by default; we implement below
}

unsafe impl<T: Send, R: Sync> Sync for Mutex<T, R> {}
unsafe impl<T: Send, R: Send> Send for Mutex<T, R> {}

impl<T, R> Mutex<T, R> {
    pub const fn from_raw(raw: R, value: T) -> Self {
        Self {
            raw,
            cell: UnsafeCell::new(value),
            _no_send_sync: PhantomData,
        }
    }

    /// Mutable access when `&mut self` rules out contention.
    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.cell.get_mut()
    }

    #[inline]
    pub fn into_inner(self) -> T {
        self.cell.into_inner()
    }
}

pub struct MutexGuard<'a, T, R>
where
    R: RawUnlock,
{
    m: &'a Mutex<T, R>,
}

impl<T, R> Deref for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.m.cell.get() }
    }
}

impl<T, R> DerefMut for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.m.cell.get() }
    }
}

impl<T, R> Drop for MutexGuard<'_, T, R>
where
    R: RawUnlock,
{
    fn drop(&mut self) {
        unsafe { self.m.raw.raw_unlock() }
    }
}

impl<T, R> Mutex<T, R>
where
    R: RawLock + RawUnlock,
{
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T, R> {
        self.raw.raw_lock();
        MutexGuard { m: self }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T, R>> {
        // Lazily: a guard built for a failed attempt would unlock on drop.
        self.raw.raw_try_lock().then(|| MutexGuard { m: self })
    }

    /// Closure convenience, built on the guard.
    #[inline]
    pub fn with_lock<U>(&self, f: impl FnOnce(&mut T) -> U) -> U {
        let mut g = self.lock();
        f(&mut g)
    }
}
