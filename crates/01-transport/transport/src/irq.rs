//! In-process fence interrupt line.

use crate::hw::{FenceInterrupt, InterruptCallback};
use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fan-out of "fence advanced" notifications to registered callbacks.
///
/// Registration is rare and raising is hot, so the callback list is swapped
/// wholesale and raised without taking a lock.
pub struct FenceIrq {
    callbacks: ArcSwap<Vec<InterruptCallback>>,
    raised: AtomicU64,
}

impl Default for FenceIrq {
    fn default() -> Self {
        Self::new()
    }
}

impl FenceIrq {
    pub fn new() -> Self {
        Self {
            callbacks: ArcSwap::from_pointee(Vec::new()),
            raised: AtomicU64::new(0),
        }
    }

    /// Invokes every registered callback.
    pub fn raise(&self) {
        self.raised.fetch_add(1, Ordering::Relaxed);
        let callbacks = self.callbacks.load();
        for callback in callbacks.iter() {
            callback();
        }
    }

    /// How many times the line has been raised.
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }

    /// Number of registered callbacks.
    pub fn listener_count(&self) -> usize {
        self.callbacks.load().len()
    }
}

impl FenceInterrupt for FenceIrq {
    fn register_fence_interrupt(&self, callback: InterruptCallback) {
        self.callbacks.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(Arc::clone(&callback));
            next
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn raise_reaches_every_listener() {
        let irq = FenceIrq::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            irq.register_fence_interrupt(Arc::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        irq.raise();
        irq.raise();
        assert_eq!(hits.load(Ordering::SeqCst), 6);
        assert_eq!(irq.raised_count(), 2);
        assert_eq!(irq.listener_count(), 3);
    }
}
