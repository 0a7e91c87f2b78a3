//! Interchangeable mutual-exclusion strategies for a shared accumulator.
//!
//! Three mechanisms with the same contract (mutual exclusion plus eventual
//! progress) and different cost profiles: a busy-wait spin lock, the plain
//! mutex, and a counting semaphore used in binary mode. The reduction
//! benchmark selects one at configuration time.

use std::cell::UnsafeCell;
use std::fmt;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use clap::ValueEnum;

/// Mutual-exclusion mechanism selected at the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LockStrategy {
    /// Busy-wait on an atomic flag; trades CPU for latency.
    Spin,
    /// Plain mutex; blocks at the OS level under contention.
    Mutex,
    /// Counting semaphore with one permit.
    Semaphore,
}

impl LockStrategy {
    /// Every strategy, in comparison order.
    pub const ALL: [LockStrategy; 3] =
        [LockStrategy::Spin, LockStrategy::Mutex, LockStrategy::Semaphore];

    /// Stable lowercase name for CSV output.
    pub fn name(self) -> &'static str {
        match self {
            LockStrategy::Spin => "spin",
            LockStrategy::Mutex => "mutex",
            LockStrategy::Semaphore => "semaphore",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Test-and-set spin lock protecting a value.
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: the value is only reachable through a guard, and at most one guard
// exists at a time because `locked` is held for the guard's whole life.
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Spin until the flag is acquired, then hand out the guard.
    pub fn lock(&self) -> SpinGuard<'_, T> {
        while self.locked.swap(true, Ordering::Acquire) {
            hint::spin_loop();
        }
        SpinGuard { lock: self }
    }
}

/// RAII guard for [`SpinLock`]; releases the flag on drop.
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard means holding the flag.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, plus &mut self gives unique access to the guard.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Counting semaphore built from a mutex and a condvar.
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut guard = self.permits.lock().expect("semaphore mutex poisoned");
        while *guard == 0 {
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
        *guard -= 1;
    }

    /// Return a permit and wake one waiter.
    pub fn release(&self) {
        let mut guard = self.permits.lock().expect("semaphore mutex poisoned");
        *guard += 1;
        self.available.notify_one();
    }
}

/// Value cell guarded by a one-permit [`Semaphore`].
pub struct SemCell<T> {
    gate: Semaphore,
    value: UnsafeCell<T>,
}

// SAFETY: the single permit admits at most one guard at a time, so the cell
// is never aliased mutably.
unsafe impl<T: Send> Sync for SemCell<T> {}

impl<T> SemCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            gate: Semaphore::new(1),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire the permit and hand out the guard.
    pub fn lock(&self) -> SemGuard<'_, T> {
        self.gate.acquire();
        SemGuard { cell: self }
    }
}

/// RAII guard for [`SemCell`]; returns the permit on drop.
pub struct SemGuard<'a, T> {
    cell: &'a SemCell<T>,
}

impl<T> Deref for SemGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard means holding the permit.
        unsafe { &*self.cell.value.get() }
    }
}

impl<T> DerefMut for SemGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, plus &mut self gives unique access to the guard.
        unsafe { &mut *self.cell.value.get() }
    }
}

impl<T> Drop for SemGuard<'_, T> {
    fn drop(&mut self) {
        self.cell.gate.release();
    }
}

/// Shared f64 accumulator protected by the selected strategy.
pub enum GuardedSum {
    Spin(SpinLock<f64>),
    Mutex(Mutex<f64>),
    Semaphore(SemCell<f64>),
}

impl GuardedSum {
    /// Zero-initialised accumulator under `strategy`.
    pub fn new(strategy: LockStrategy) -> Self {
        match strategy {
            LockStrategy::Spin => GuardedSum::Spin(SpinLock::new(0.0)),
            LockStrategy::Mutex => GuardedSum::Mutex(Mutex::new(0.0)),
            LockStrategy::Semaphore => GuardedSum::Semaphore(SemCell::new(0.0)),
        }
    }

    /// Add `delta` inside the critical section.
    pub fn add(&self, delta: f64) {
        match self {
            GuardedSum::Spin(lock) => *lock.lock() += delta,
            GuardedSum::Mutex(lock) => {
                *lock.lock().expect("sum mutex poisoned") += delta;
            }
            GuardedSum::Semaphore(cell) => *cell.lock() += delta,
        }
    }

    /// Read the current total.
    pub fn value(&self) -> f64 {
        match self {
            GuardedSum::Spin(lock) => *lock.lock(),
            GuardedSum::Mutex(lock) => *lock.lock().expect("sum mutex poisoned"),
            GuardedSum::Semaphore(cell) => *cell.lock(),
        }
    }
}
