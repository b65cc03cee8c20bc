//! Error surface of the host driver.

use mes_abi::{ErrorCategory, ErrorCode};
use mes_codec::{EncodeError, LogError};
use mes_transport::TransportError;
use std::fmt;
use thiserror::Error;

pub type SchedulerResult<T, E = SchedulerError> = Result<T, E>;

/// What a registry handle names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Keyed by `process_context_addr`.
    Process,
    /// Keyed by `h_context`.
    Gang,
    /// Keyed by `gang_context_addr`.
    GangContext,
    /// Keyed by `h_queue`.
    Queue,
    /// Keyed by doorbell offset.
    Doorbell,
    /// Keyed by `h_sync_object`.
    SyncObject,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleKind::Process => "process",
            HandleKind::Gang => "gang",
            HandleKind::GangContext => "gang context",
            HandleKind::Queue => "queue",
            HandleKind::Doorbell => "doorbell",
            HandleKind::SyncObject => "sync object",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{kind} {handle:#x} is not registered")]
    NotFound { kind: HandleKind, handle: u64 },

    #[error("{kind} {handle:#x} is already registered")]
    DuplicateHandle { kind: HandleKind, handle: u64 },

    #[error("gang {h_context:#x} already holds the maximum number of queues")]
    GangFull { h_context: u64 },

    #[error("{kind} {handle:#x} belongs to {actual:#x}, not {expected:#x}")]
    OwnerMismatch {
        kind: HandleKind,
        handle: u64,
        expected: u64,
        actual: u64,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FenceError {
    #[error("fence address {addr:#x} already belongs to an in-flight command")]
    FenceReuseViolation { addr: u64 },

    #[error("command has no completion fence")]
    NullFence,

    #[error("fence address {addr:#x} is not mapped fence memory")]
    UnmappedFence { addr: u64 },

    #[error("expected fence value {value:#x} is zero or has the error bit set")]
    InvalidExpectedValue { value: u64 },

    #[error("no pending command tracked at {addr:#x} with value {expected:#x}")]
    UnknownPending { addr: u64, expected: u64 },

    #[error("fence {addr:#x} holds {found:#x}, expected {expected:#x} or an error word")]
    UnexpectedValue { addr: u64, expected: u64, found: u64 },

    #[error("fence memory: {0}")]
    Memory(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Fence(#[from] FenceError),

    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("command ring is full")]
    RingFull,

    #[error("every fence slot is in flight")]
    NoFreeFence,

    #[error("firmware reported {category} error {code:#04x} for opcode {opcode} (misc op {misc_op})")]
    Firmware {
        category: ErrorCategory,
        opcode: u8,
        misc_op: u8,
        code: u8,
    },

    #[error("timed out waiting for completion")]
    TimedOut,

    #[error("wait was canceled")]
    Canceled,
}

impl From<TransportError> for SchedulerError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RingFull => SchedulerError::RingFull,
            other => SchedulerError::Transport(other),
        }
    }
}

impl From<ErrorCode> for SchedulerError {
    fn from(code: ErrorCode) -> Self {
        SchedulerError::Firmware {
            category: code.category,
            opcode: code.opcode,
            misc_op: code.misc_op,
            code: code.api_error,
        }
    }
}
