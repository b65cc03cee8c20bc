use thiserror::Error;

/// Violations of the value ranges the ABI defines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("priority level {0} is not one of the five bands")]
    InvalidPriorityLevel(u32),

    #[error("queue type {0} is not defined")]
    InvalidQueueType(u32),

    #[error("{kind} value {value} is not defined")]
    InvalidEnum { kind: &'static str, value: u32 },

    #[error("value {value:#x} does not fit the {width}-bit field `{field}`")]
    BitfieldOverflow {
        field: &'static str,
        value: u32,
        width: u32,
    },

    #[error("field `{field}` = {value} exceeds its maximum {max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("priority band array needs exactly 5 entries, got {0}")]
    BandCount(usize),
}
