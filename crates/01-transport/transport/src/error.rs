//! Error surface of the transport crate.
//!
//! Kept small: capacity validation, allocation failures, ring backpressure
//! and fence addressing mistakes.

use thiserror::Error;

/// Convenience result alias for fallible transport operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by low-level transport helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Requested capacity is below the minimum or otherwise unusable.
    #[error("capacity {requested} is invalid (minimum {minimum})")]
    InvalidCapacity { requested: usize, minimum: usize },

    /// Allocation of a shared region failed for the given size/alignment pair.
    #[error("failed to allocate shared region of {size} bytes aligned to {alignment}")]
    AllocationFailed { size: usize, alignment: usize },

    /// The command ring has no free frame slot.
    #[error("command ring is full")]
    RingFull,

    /// The GPU address does not fall inside the fence region.
    #[error("fence address {addr:#x} is not mapped")]
    UnmappedFenceAddress { addr: u64 },

    /// The GPU address is inside the region but not on a slot boundary.
    #[error("fence address {addr:#x} is not aligned to an 8-byte slot")]
    MisalignedFenceAddress { addr: u64 },
}
