//! Advisory lock kinds guarding the context state
//!
//! The context never waits for its lock: every acquisition is a try-lock and
//! contention surfaces as [`Error::Busy`](crate::Error::Busy). Which
//! primitive backs the lock is chosen with the `L` type parameter of
//! [`Fal`](crate::Fal):
//!
//! - [`MutexLock`] - `std::sync::Mutex` (requires `std`)
//! - [`FlagLock`] - a single atomic flag, usable in `no_std` and from
//!   interrupt handlers on targets with compare-and-swap
//! - [`NoLock`] - no cross-context exclusion at all; the context becomes
//!   `!Sync`, so the compiler rules out sharing it

use core::cell::{RefCell, RefMut, UnsafeCell};
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A lock primitive usable by the context
///
/// Implementors are zero-sized markers naming the storage cell and guard.
pub trait LockKind: 'static {
    /// Storage wrapping the protected value
    type Cell<T>;

    /// Access guard; the lock is released when it is dropped
    type Guard<'g, T: 'g>: DerefMut<Target = T>;

    /// Wrap a value
    fn new<T>(value: T) -> Self::Cell<T>;

    /// Acquire the lock without waiting, `None` on contention
    fn try_lock<'g, T: 'g>(cell: &'g Self::Cell<T>) -> Option<Self::Guard<'g, T>>;
}

/// Real mutex backed by `std::sync::Mutex`
///
/// A poisoned mutex is recovered: the state it protects is only ever
/// updated in single assignments, so a panicking holder cannot leave it
/// half-written.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MutexLock;

#[cfg(feature = "std")]
impl LockKind for MutexLock {
    type Cell<T> = std::sync::Mutex<T>;
    type Guard<'g, T: 'g> = std::sync::MutexGuard<'g, T>;

    fn new<T>(value: T) -> Self::Cell<T> {
        std::sync::Mutex::new(value)
    }

    fn try_lock<'g, T: 'g>(cell: &'g Self::Cell<T>) -> Option<Self::Guard<'g, T>> {
        match cell.try_lock() {
            Ok(guard) => Some(guard),
            Err(std::sync::TryLockError::WouldBlock) => None,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => {
                log::warn!("Recovering poisoned context lock");
                Some(poisoned.into_inner())
            }
        }
    }
}

/// Degraded lock built from a single atomic flag
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagLock;

impl LockKind for FlagLock {
    type Cell<T> = FlagCell<T>;
    type Guard<'g, T: 'g> = FlagGuard<'g, T>;

    fn new<T>(value: T) -> Self::Cell<T> {
        FlagCell::new(value)
    }

    fn try_lock<'g, T: 'g>(cell: &'g Self::Cell<T>) -> Option<Self::Guard<'g, T>> {
        cell.try_lock()
    }
}

/// No lock: the context is confined to a single execution context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLock;

impl LockKind for NoLock {
    type Cell<T> = RefCell<T>;
    type Guard<'g, T: 'g> = RefMut<'g, T>;

    fn new<T>(value: T) -> Self::Cell<T> {
        RefCell::new(value)
    }

    fn try_lock<'g, T: 'g>(cell: &'g Self::Cell<T>) -> Option<Self::Guard<'g, T>> {
        cell.try_borrow_mut().ok()
    }
}

/// Value protected by a single non-reentrant flag
pub struct FlagCell<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` only happens through a `FlagGuard`, and at most
// one guard exists at a time because the flag is taken with a
// compare-exchange and only cleared when the guard drops.
unsafe impl<T: Send> Sync for FlagCell<T> {}

impl<T> FlagCell<T> {
    /// Wrap a value
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Take the flag without waiting
    pub fn try_lock(&self) -> Option<FlagGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| FlagGuard { cell: self })
    }

    /// Check whether the flag is currently taken
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Guard returned by [`FlagCell::try_lock`]
pub struct FlagGuard<'g, T> {
    cell: &'g FlagCell<T>,
}

impl<T> Deref for FlagGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the flag is held for the lifetime of the guard.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for FlagGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the flag is held for the lifetime of the guard and the
        // guard is borrowed mutably.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for FlagGuard<'_, T> {
    fn drop(&mut self) {
        self.cell.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise<L: LockKind>() {
        let cell = L::new(0u32);
        {
            let mut guard = L::try_lock(&cell).unwrap();
            *guard += 1;
            assert!(L::try_lock(&cell).is_none());
        }
        let guard = L::try_lock(&cell).unwrap();
        assert_eq!(*guard, 1);
    }

    #[test]
    fn test_flag_lock_contention() {
        exercise::<FlagLock>();
    }

    #[test]
    fn test_no_lock_contention() {
        exercise::<NoLock>();
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_mutex_lock_contention() {
        exercise::<MutexLock>();
    }

    #[test]
    fn test_flag_released_on_drop() {
        let cell = FlagCell::new([0u8; 4]);
        let guard = cell.try_lock().unwrap();
        assert!(cell.is_locked());
        drop(guard);
        assert!(!cell.is_locked());
    }
}
