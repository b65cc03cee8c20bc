//! Atomic wait/notify shims used for the ring doorbell.
//!
//! The firmware side parks on the ring's write pointer until the host rings
//! the doorbell. Native targets rely on the `atomic-wait` crate (futex-backed
//! where available).

use std::sync::atomic::{AtomicU32, Ordering};

/// Result of attempting to wait on an atomic location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    /// The caller was parked and later woken.
    Ok,
    /// The value no longer matched when the wait was attempted.
    NotEqual,
}

/// Blocks the current caller until the atomic differs from `expected` or a wakeup occurs.
#[inline]
pub fn wait_u32(atomic: &AtomicU32, expected: u32) -> WaitResult {
    if atomic.load(Ordering::Acquire) != expected {
        return WaitResult::NotEqual;
    }
    atomic_wait::wait(atomic, expected);
    WaitResult::Ok
}

/// Wakes at most one waiter parked on `atomic`.
#[inline]
pub fn wake_one(atomic: &AtomicU32) {
    atomic_wait::wake_one(atomic as *const AtomicU32);
}

/// Wakes all waiters parked on `atomic`.
#[inline]
pub fn wake_all(atomic: &AtomicU32) {
    atomic_wait::wake_all(atomic as *const AtomicU32);
}

/// Convenience helper that captures the current value and waits for a change.
#[inline]
pub fn wait_for_change(atomic: &AtomicU32, order: Ordering) -> WaitResult {
    let expected = atomic.load(order);
    wait_u32(atomic, expected)
}
