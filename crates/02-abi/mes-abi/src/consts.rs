//! Fixed sizes and limits of the firmware interface.

/// Protocol revision this crate models by default.
pub const MES_API_VERSION: u32 = 0x14;

/// Every command occupies exactly this many 32-bit words on the ring.
pub const API_FRAME_SIZE_IN_DWORDS: usize = 64;

/// Byte length of one frame.
pub const API_FRAME_SIZE_IN_BYTES: usize = API_FRAME_SIZE_IN_DWORDS * 4;

/// Upper bound on commands the firmware keeps in flight.
pub const API_NUMBER_OF_COMMAND_MAX: usize = 32;

/// Size the firmware reserves for its event log.
pub const MES_LOG_BUFFER_SIZE: usize = 0xC000;

pub const MAX_COMPUTE_PIPES: usize = 8;
pub const MAX_GFX_PIPES: usize = 2;
pub const MAX_SDMA_PIPES: usize = 2;

pub const MAX_COMPUTE_HQD_PER_PIPE: usize = 8;
pub const MAX_GFX_HQD_PER_PIPE: usize = 8;
pub const MAX_SDMA_HQD_PER_PIPE: usize = 10;

/// A gang never holds more queues than this.
pub const MAX_QUEUES_IN_A_GANG: usize = 8;

/// Number of hardware IP base segments passed in SET_HW_RSRC.
pub const MES_MAX_HWIP_SEGMENT: usize = 8;

pub const VMID_INVALID: u32 = 0xffff;
pub const MAX_VMID_GCHUB: u32 = 16;
pub const MAX_VMID_MMHUB: u32 = 16;

/// Number of priority bands.
pub const PRIORITY_NUM_LEVELS: usize = 5;

/// Width of the QUERY_SCHEDULER_STATUS payload union.
pub const QUERY_MES_MAX_SIZE_IN_DWORDS: usize = 20;

/// Width of the MISC payload union.
pub const MISC_DATA_MAX_SIZE_IN_DWORDS: usize = 20;

/// Upper bound of `normal_yield_percent`.
pub const NORMAL_YIELD_PERCENT_MAX: u32 = 50;

/// Firmware default for `normal_yield_percent`.
pub const NORMAL_YIELD_PERCENT_DEFAULT: u32 = 10;

/// Byte size of the event log header.
pub const LOG_HEADER_BYTES: usize = 32;

/// Byte size of one event log entry.
pub const LOG_ENTRY_BYTES: usize = 32;
