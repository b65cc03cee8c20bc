use mes_abi::{AbiError, ApiVersion, Opcode};
use thiserror::Error;

/// Reasons a command cannot be turned into a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{opcode} needs interface version {} or newer, codec speaks {version}", opcode.min_version())]
    OpcodeUnavailable { opcode: Opcode, version: ApiVersion },

    #[error("field `{field}` does not exist in interface version {version} and must be zero")]
    FieldUnavailable {
        field: &'static str,
        version: ApiVersion,
    },

    #[error("field `{field}` = {value} exceeds its maximum {max}")]
    FieldOutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("payload of opcode {opcode} does not fit in one frame")]
    FrameOverflow { opcode: u8 },

    #[error("opcode {opcode} is known and must use its typed payload")]
    UnrecognizedIsKnown { opcode: u8 },

    #[error(transparent)]
    Abi(#[from] AbiError),
}

/// Reasons a frame is rejected. A rejected frame never yields a partial command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame must be exactly 256 bytes, got {len}")]
    InvalidLength { len: usize },

    #[error("unsupported api type {api_type}")]
    UnsupportedType { api_type: u8 },

    #[error("header {header:#010x} has reserved bits set")]
    MalformedHeader { header: u32 },

    #[error("header size of {dwsize} dwords is outside 1..=64")]
    InvalidSize { dwsize: u8 },

    #[error("{opcode} is not part of interface version {version}")]
    OpcodeUnavailable { opcode: Opcode, version: ApiVersion },

    #[error("{opcode} declares {declared} dwords, layout has {expected}")]
    SizeMismatch {
        opcode: Opcode,
        declared: u8,
        expected: u8,
    },

    #[error("reserved word {word} is not zero")]
    ReservedNotZero { word: usize },

    #[error("invalid field in {opcode}: {source}")]
    InvalidField {
        opcode: Opcode,
        #[source]
        source: AbiError,
    },
}

/// Reasons a log buffer snapshot cannot be parsed at all.
///
/// Individual bad entries never fail a read; they surface as
/// [`LogEvent::Unknown`](mes_abi::LogEvent::Unknown).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("log buffer of {len} bytes is shorter than its header")]
    TooShort { len: usize },
}
