//! Single-producer/single-consumer ring of fixed-size command frames.
//!
//! Layout:
//!
//! ```text
//! +----------------------+-------------------------------------------+
//! | Header (32 bytes)    | Slots (capacity x 256 bytes)              |
//! +----------------------+-------------------------------------------+
//!   capacity | wptr | rptr | closed | magic | reserved
//! ```
//!
//! `wptr` and `rptr` are free-running frame counters; the slot of a counter is
//! `counter % capacity`. The write pointer doubles as the doorbell: the
//! consumer parks on it and the producer wakes it after every commit.

use crate::hw::CommandRing;
use crate::region::SharedRegion;
use crate::wait;
use crate::{RawFrame, TransportError, TransportResult, FRAME_BYTES, FRAME_DWORDS};
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const HEADER_SIZE: usize = size_of::<RingHeader>();
const RING_ALIGNMENT: usize = 64;
const RING_MAGIC: u64 = 0x4D45_5352_494E_4731;

#[repr(C, align(8))]
struct RingHeader {
    capacity_frames: u32,
    wptr: AtomicU32,
    rptr: AtomicU32,
    closed: AtomicU32,
    magic: u64,
    reserved: u64,
}

impl RingHeader {
    fn new(capacity_frames: u32) -> Self {
        Self {
            capacity_frames,
            wptr: AtomicU32::new(0),
            rptr: AtomicU32::new(0),
            closed: AtomicU32::new(0),
            magic: RING_MAGIC,
            reserved: 0,
        }
    }
}

/// Fixed-capacity frame ring living in a [`SharedRegion`].
pub struct FrameRing {
    region: SharedRegion,
    base: NonNull<u8>,
    capacity: u32,
}

// SAFETY: slot memory is only written by the single producer before it
// publishes `wptr` (Release) and only read by the single consumer after it
// observes `wptr` (Acquire); the handles returned by `split` enforce one of each.
unsafe impl Send for FrameRing {}
// SAFETY: see above.
unsafe impl Sync for FrameRing {}

impl FrameRing {
    /// Creates a ring holding up to `capacity_frames` frames.
    pub fn new(capacity_frames: usize) -> TransportResult<Self> {
        if capacity_frames == 0 || capacity_frames > u32::MAX as usize / 2 {
            return Err(TransportError::InvalidCapacity {
                requested: capacity_frames,
                minimum: 1,
            });
        }

        let total = HEADER_SIZE + capacity_frames * FRAME_BYTES;
        let mut region = SharedRegion::zeroed(total, RING_ALIGNMENT)?;
        let base = NonNull::new(region.as_mut_ptr()).ok_or(TransportError::AllocationFailed {
            size: total,
            alignment: RING_ALIGNMENT,
        })?;

        unsafe {
            // SAFETY: the region is at least HEADER_SIZE bytes and 64-byte aligned.
            (base.as_ptr() as *mut RingHeader).write(RingHeader::new(capacity_frames as u32));
        }

        Ok(Self {
            region,
            base,
            capacity: capacity_frames as u32,
        })
    }

    /// Splits the ring into its producer (host) and consumer (firmware) halves.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let ring = Arc::new(self);
        (
            RingProducer {
                ring: Arc::clone(&ring),
            },
            RingConsumer { ring },
        )
    }

    /// Number of frame slots.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Frames written but not yet consumed.
    pub fn len(&self) -> usize {
        let header = self.header();
        let wptr = header.wptr.load(Ordering::Acquire);
        let rptr = header.rptr.load(Ordering::Acquire);
        wptr.wrapping_sub(rptr) as usize
    }

    /// Returns true when no frame is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the ring closed and wakes a parked consumer. Frames already
    /// pushed can still be popped.
    pub fn close(&self) {
        let header = self.header();
        header.closed.store(1, Ordering::Release);
        wait::wake_all(&header.wptr);
    }

    /// Total bytes of shared memory backing the ring.
    pub fn region_len(&self) -> usize {
        self.region.len()
    }

    fn header(&self) -> &RingHeader {
        unsafe {
            // SAFETY: initialised in `new`, lives as long as `self.region`.
            &*(self.base.as_ptr() as *const RingHeader)
        }
    }

    fn slot_ptr(&self, counter: u32) -> *mut u8 {
        let slot = (counter % self.capacity) as usize;
        unsafe {
            // SAFETY: slot < capacity, so the offset stays inside the allocation.
            self.base.as_ptr().add(HEADER_SIZE + slot * FRAME_BYTES)
        }
    }

    fn is_closed(&self) -> bool {
        self.header().closed.load(Ordering::Acquire) != 0
    }
}

/// Host half of a [`FrameRing`].
pub struct RingProducer {
    ring: Arc<FrameRing>,
}

impl RingProducer {
    /// Copies `frame` into the next slot and publishes it.
    pub fn push(&mut self, frame: &RawFrame) -> TransportResult<()> {
        let header = self.ring.header();
        let wptr = header.wptr.load(Ordering::Relaxed);
        let rptr = header.rptr.load(Ordering::Acquire);
        if wptr.wrapping_sub(rptr) >= self.ring.capacity {
            return Err(TransportError::RingFull);
        }

        let slot = self.ring.slot_ptr(wptr);
        for (idx, word) in frame.iter().enumerate() {
            let bytes = word.to_le_bytes();
            unsafe {
                // SAFETY: the slot is FRAME_BYTES long and owned by the producer
                // until `wptr` is published below.
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), slot.add(idx * 4), 4);
            }
        }

        header.wptr.store(wptr.wrapping_add(1), Ordering::Release);
        wait::wake_all(&header.wptr);
        tracing::trace!(wptr = wptr.wrapping_add(1), "doorbell");
        Ok(())
    }

    /// Returns true when another frame fits.
    pub fn has_space(&self) -> bool {
        let header = self.ring.header();
        let wptr = header.wptr.load(Ordering::Relaxed);
        let rptr = header.rptr.load(Ordering::Acquire);
        wptr.wrapping_sub(rptr) < self.ring.capacity
    }

    /// Marks the ring closed and wakes a parked consumer.
    pub fn close(&self) {
        self.ring.close();
    }

    /// Borrow the underlying ring.
    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }
}

impl CommandRing for RingProducer {
    fn ring_push(&mut self, frame: &RawFrame) -> TransportResult<()> {
        self.push(frame)
    }

    fn ring_space_available(&self) -> bool {
        self.has_space()
    }
}

/// Firmware half of a [`FrameRing`].
pub struct RingConsumer {
    ring: Arc<FrameRing>,
}

impl RingConsumer {
    /// Pops the oldest frame, if any.
    pub fn pop(&mut self) -> Option<RawFrame> {
        let header = self.ring.header();
        let rptr = header.rptr.load(Ordering::Relaxed);
        let wptr = header.wptr.load(Ordering::Acquire);
        if rptr == wptr {
            return None;
        }

        let slot = self.ring.slot_ptr(rptr);
        let mut frame = [0u32; FRAME_DWORDS];
        for (idx, word) in frame.iter_mut().enumerate() {
            let mut bytes = [0u8; 4];
            unsafe {
                // SAFETY: the producer published this slot with a Release store
                // observed by the Acquire load above.
                std::ptr::copy_nonoverlapping(slot.add(idx * 4), bytes.as_mut_ptr(), 4);
            }
            *word = u32::from_le_bytes(bytes);
        }

        header.rptr.store(rptr.wrapping_add(1), Ordering::Release);
        Some(frame)
    }

    /// Parks until at least one frame is pending.
    ///
    /// Returns `false` once the producer closed the ring and nothing is left.
    pub fn wait_for_work(&self) -> bool {
        let header = self.ring.header();
        loop {
            let wptr = header.wptr.load(Ordering::Acquire);
            if wptr != header.rptr.load(Ordering::Relaxed) {
                return true;
            }
            if self.ring.is_closed() {
                return false;
            }
            wait::wait_u32(&header.wptr, wptr);
        }
    }

    /// Borrow the underlying ring.
    pub fn ring(&self) -> &FrameRing {
        &self.ring
    }

    /// Shared handle to the ring, e.g. to close it from another thread.
    pub fn shared(&self) -> Arc<FrameRing> {
        Arc::clone(&self.ring)
    }
}
