use crate::error::SchedulerError;
use mes_abi::{ApiVersion, API_NUMBER_OF_COMMAND_MAX};
use mes_transport::FENCE_SLOT_BYTES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// GPU address of the first fence slot unless configured otherwise.
pub const DEFAULT_FENCE_BASE_ADDR: u64 = 0x0001_0000_0000;

/// Knobs of a [`Scheduler`](crate::Scheduler) instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interface revision frames are encoded for.
    pub api_version: ApiVersion,
    /// Timeout used by [`Pending::wait_default`](crate::Pending::wait_default).
    pub default_timeout: Duration,
    /// Upper bound of one blocking sleep. A lost interrupt then degrades to
    /// polling at this rate. `None` sleeps until notified or timed out.
    pub poll_interval: Option<Duration>,
    /// Number of completion fence slots.
    pub fence_slots: usize,
    /// GPU address of the first fence slot.
    pub fence_base_addr: u64,
    /// Frames the command ring holds.
    pub ring_frames: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::CURRENT,
            default_timeout: Duration::from_secs(2),
            poll_interval: Some(Duration::from_millis(1)),
            fence_slots: API_NUMBER_OF_COMMAND_MAX,
            fence_base_addr: DEFAULT_FENCE_BASE_ADDR,
            ring_frames: 32,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.fence_slots == 0 {
            return Err(SchedulerError::InvalidConfig("fence_slots must be non-zero"));
        }
        if self.ring_frames == 0 {
            return Err(SchedulerError::InvalidConfig("ring_frames must be non-zero"));
        }
        if self.fence_base_addr == 0 || self.fence_base_addr % FENCE_SLOT_BYTES != 0 {
            return Err(SchedulerError::InvalidConfig(
                "fence_base_addr must be a non-null 8-byte aligned address",
            ));
        }
        let span = (self.fence_slots as u64).checked_mul(FENCE_SLOT_BYTES);
        if span
            .and_then(|span| self.fence_base_addr.checked_add(span))
            .is_none()
        {
            return Err(SchedulerError::InvalidConfig(
                "fence slots overflow the address space",
            ));
        }
        if self.poll_interval == Some(Duration::ZERO) {
            return Err(SchedulerError::InvalidConfig(
                "poll_interval of zero would busy-loop",
            ));
        }
        Ok(())
    }
}
