//! Shared-memory primitives between the host driver and the scheduler firmware.
//!
//! * [`SharedRegion`] – contiguous, aligned memory backing every structure below.
//! * [`FrameRing`] – single-producer/single-consumer ring of fixed 64-dword command frames.
//! * [`FenceRegion`] – host-visible completion fence slots addressed by GPU address.
//! * [`LogRegion`] – memory the firmware appends its event log into.
//! * [`FenceIrq`] – the fence-advanced interrupt line.
//! * [`hw`] – collaborator traits the protocol layer is written against.

mod clock;
mod error;
mod fence;
mod frame_ring;
pub mod hw;
mod irq;
mod log_region;
mod region;
pub mod wait;

pub use clock::{ManualClock, SystemClock};
pub use error::{TransportError, TransportResult};
pub use fence::{FenceRegion, FENCE_SLOT_BYTES};
pub use frame_ring::{FrameRing, RingConsumer, RingProducer};
pub use hw::{CommandRing, FenceInterrupt, FenceMemory, GpuClock, InterruptCallback};
pub use irq::FenceIrq;
pub use log_region::LogRegion;
pub use region::{RegionInit, SharedRegion};

/// Every frame exchanged over the command ring is exactly this many 32-bit words.
pub const FRAME_DWORDS: usize = 64;

/// Byte length of one frame.
pub const FRAME_BYTES: usize = FRAME_DWORDS * 4;

/// Raw frame words as they travel over the ring.
pub type RawFrame = [u32; FRAME_DWORDS];
