//! Host-visible completion fence slots.
//!
//! Every slot is one 64-bit word addressed by its GPU address
//! (`base_addr + index * 8`). The firmware writes the expected value on
//! success or an encoded error word on failure; the host resets slots to zero
//! before reusing them.

use crate::hw::FenceMemory;
use crate::{TransportError, TransportResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Width of one fence slot in bytes.
pub const FENCE_SLOT_BYTES: u64 = 8;

/// Array of atomically accessed fence words mapped at a GPU base address.
pub struct FenceRegion {
    base_addr: u64,
    slots: Box<[AtomicU64]>,
}

impl FenceRegion {
    /// Creates `slot_count` zeroed slots starting at `base_addr`.
    pub fn new(base_addr: u64, slot_count: usize) -> TransportResult<Self> {
        if slot_count == 0 {
            return Err(TransportError::InvalidCapacity {
                requested: 0,
                minimum: 1,
            });
        }
        if base_addr == 0 || base_addr % FENCE_SLOT_BYTES != 0 {
            return Err(TransportError::MisalignedFenceAddress { addr: base_addr });
        }
        let slots = (0..slot_count).map(|_| AtomicU64::new(0)).collect();
        Ok(Self { base_addr, slots })
    }

    /// GPU address of the first slot.
    pub fn base_addr(&self) -> u64 {
        self.base_addr
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// GPU address of slot `index`, if it exists.
    pub fn slot_addr(&self, index: usize) -> Option<u64> {
        (index < self.slots.len()).then(|| self.base_addr + index as u64 * FENCE_SLOT_BYTES)
    }

    /// Returns true when `addr` names a slot of this region.
    pub fn contains(&self, addr: u64) -> bool {
        self.slot(addr).is_ok()
    }

    /// Firmware-side store of a completion value.
    pub fn write(&self, addr: u64, value: u64) -> TransportResult<()> {
        self.slot(addr)?.store(value, Ordering::Release);
        Ok(())
    }

    /// Current value of the slot at `addr`.
    pub fn read(&self, addr: u64) -> TransportResult<u64> {
        Ok(self.slot(addr)?.load(Ordering::Acquire))
    }

    /// Host-side arming of a slot before a command referencing it is pushed.
    pub fn reset(&self, addr: u64) -> TransportResult<()> {
        self.write(addr, 0)
    }

    fn slot(&self, addr: u64) -> TransportResult<&AtomicU64> {
        let offset = addr
            .checked_sub(self.base_addr)
            .ok_or(TransportError::UnmappedFenceAddress { addr })?;
        if offset % FENCE_SLOT_BYTES != 0 {
            return Err(TransportError::MisalignedFenceAddress { addr });
        }
        usize::try_from(offset / FENCE_SLOT_BYTES)
            .ok()
            .and_then(|index| self.slots.get(index))
            .ok_or(TransportError::UnmappedFenceAddress { addr })
    }
}

impl FenceMemory for FenceRegion {
    fn read_fence(&self, addr: u64) -> TransportResult<u64> {
        self.read(addr)
    }

    fn reset_fence(&self, addr: u64) -> TransportResult<()> {
        self.reset(addr)
    }
}
