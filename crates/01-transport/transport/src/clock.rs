//! GPU clock sources.

use crate::hw::GpuClock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic clock ticking at `ticks_per_second`, anchored at construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    ticks_per_second: u64,
}

impl SystemClock {
    /// Default reference clock of 100 MHz.
    pub const DEFAULT_TICKS_PER_SECOND: u64 = 100_000_000;

    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            origin: Instant::now(),
            ticks_per_second: ticks_per_second.max(1),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TICKS_PER_SECOND)
    }
}

impl GpuClock for SystemClock {
    fn now(&self) -> u64 {
        let elapsed = self.origin.elapsed();
        let ticks = elapsed.as_nanos() * u128::from(self.ticks_per_second) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to; used by tests and the simulator.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            ticks: AtomicU64::new(start),
        }
    }

    /// Advances the clock by `delta` ticks and returns the new value.
    pub fn advance(&self, delta: u64) -> u64 {
        self.ticks.fetch_add(delta, Ordering::SeqCst).wrapping_add(delta)
    }

    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }
}

impl GpuClock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}
