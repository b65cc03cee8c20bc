//! Collaborator interfaces the protocol layer is written against.
//!
//! The physical ring/doorbell, the fence memory mapping, the interrupt
//! controller and the GPU clock are owned by the platform. The driver only
//! talks to them through these traits; this crate ships in-process
//! implementations backed by [`SharedRegion`](crate::SharedRegion).

use crate::{RawFrame, TransportResult};
use std::sync::Arc;

/// Callback invoked whenever the firmware signals that a fence advanced.
pub type InterruptCallback = Arc<dyn Fn() + Send + Sync>;

/// Producer side of the command ring.
///
/// Not thread-safe on its own; callers serialise "build frame + push" behind
/// one lock.
pub trait CommandRing: Send {
    /// Copies one frame into the ring and rings the doorbell.
    fn ring_push(&mut self, frame: &RawFrame) -> TransportResult<()>;

    /// Returns true when at least one frame slot is free.
    fn ring_space_available(&self) -> bool;
}

/// Host view of the shared memory completion fences are written into.
pub trait FenceMemory: Send + Sync {
    /// Reads the current 64-bit value at `addr`.
    fn read_fence(&self, addr: u64) -> TransportResult<u64>;

    /// Clears the slot at `addr` before a command referencing it is submitted.
    fn reset_fence(&self, addr: u64) -> TransportResult<()>;
}

/// Interrupt line raised by the firmware after it writes a completion fence.
pub trait FenceInterrupt: Send + Sync {
    /// Registers `callback` to run on every fence interrupt.
    fn register_fence_interrupt(&self, callback: InterruptCallback);
}

/// Source of GPU clock ticks used to stamp command frames.
pub trait GpuClock: Send + Sync {
    /// Current GPU clock in ticks.
    fn now(&self) -> u64;
}

impl<T: FenceMemory + ?Sized> FenceMemory for Arc<T> {
    fn read_fence(&self, addr: u64) -> TransportResult<u64> {
        (**self).read_fence(addr)
    }

    fn reset_fence(&self, addr: u64) -> TransportResult<()> {
        (**self).reset_fence(addr)
    }
}

impl<T: GpuClock + ?Sized> GpuClock for Arc<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}
