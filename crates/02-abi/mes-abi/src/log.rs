//! Firmware event log format.
//!
//! The buffer is a 32-byte [`LogHeader`] followed by a flat array of 32-byte
//! entries: GPU timestamp (u64), operation tag (u32), reserved (u32) and a
//! 16-byte payload whose meaning depends on the tag.

use crate::consts::{LOG_ENTRY_BYTES, LOG_HEADER_BYTES};
use crate::enums::{ContextState, LogOperation};
use serde::{Deserialize, Serialize};

/// Ring bookkeeping at the start of the log buffer.
///
/// `wraparound_count` is bumped exactly when `first_free_entry_index` wraps
/// past the entry capacity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogHeader {
    pub first_free_entry_index: u32,
    pub wraparound_count: u32,
    pub number_of_entries: u64,
    pub reserved: [u64; 2],
}

impl LogHeader {
    pub fn read(bytes: &[u8; LOG_HEADER_BYTES]) -> Self {
        Self {
            first_free_entry_index: le_u32(&bytes[0..4]),
            wraparound_count: le_u32(&bytes[4..8]),
            number_of_entries: le_u64(&bytes[8..16]),
            reserved: [le_u64(&bytes[16..24]), le_u64(&bytes[24..32])],
        }
    }

    pub fn to_bytes(&self) -> [u8; LOG_HEADER_BYTES] {
        let mut out = [0u8; LOG_HEADER_BYTES];
        out[0..4].copy_from_slice(&self.first_free_entry_index.to_le_bytes());
        out[4..8].copy_from_slice(&self.wraparound_count.to_le_bytes());
        out[8..16].copy_from_slice(&self.number_of_entries.to_le_bytes());
        out[16..24].copy_from_slice(&self.reserved[0].to_le_bytes());
        out[24..32].copy_from_slice(&self.reserved[1].to_le_bytes());
        out
    }
}

/// Raw 32-byte entry as stored in the buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntryRecord {
    pub gpu_time_stamp: u64,
    pub operation_type: u32,
    pub reserved_operation_type_bits: u32,
    pub payload: [u64; 2],
}

impl LogEntryRecord {
    pub fn read(bytes: &[u8; LOG_ENTRY_BYTES]) -> Self {
        Self {
            gpu_time_stamp: le_u64(&bytes[0..8]),
            operation_type: le_u32(&bytes[8..12]),
            reserved_operation_type_bits: le_u32(&bytes[12..16]),
            payload: [le_u64(&bytes[16..24]), le_u64(&bytes[24..32])],
        }
    }

    pub fn to_bytes(&self) -> [u8; LOG_ENTRY_BYTES] {
        let mut out = [0u8; LOG_ENTRY_BYTES];
        out[0..8].copy_from_slice(&self.gpu_time_stamp.to_le_bytes());
        out[8..12].copy_from_slice(&self.operation_type.to_le_bytes());
        out[12..16].copy_from_slice(&self.reserved_operation_type_bits.to_le_bytes());
        out[16..24].copy_from_slice(&self.payload[0].to_le_bytes());
        out[24..32].copy_from_slice(&self.payload[1].to_le_bytes());
        out
    }

    /// Builds the record for `event` stamped with `gpu_time_stamp`.
    pub fn from_event(gpu_time_stamp: u64, event: &LogEvent) -> Self {
        let (operation_type, payload) = event.to_raw();
        Self {
            gpu_time_stamp,
            operation_type,
            reserved_operation_type_bits: 0,
            payload,
        }
    }

    /// Interprets the payload. Tags or payloads that do not make sense come
    /// back as [`LogEvent::Unknown`] with the raw words.
    pub fn event(&self) -> LogEvent {
        LogEvent::from_raw(self.operation_type, self.payload)
    }
}

/// Typed view of one log entry payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LogEvent {
    ContextStateChange { h_context: u64, state: ContextState },
    QueueNewWork { h_queue: u64 },
    QueueUnwaitSyncObject { h_queue: u64, h_sync_object: u64 },
    QueueNoMoreWork { h_queue: u64 },
    QueueWaitSyncObject { h_queue: u64, h_sync_object: u64 },
    Unknown { operation_type: u32, payload: [u64; 2] },
}

impl LogEvent {
    pub fn from_raw(operation_type: u32, payload: [u64; 2]) -> Self {
        let unknown = LogEvent::Unknown {
            operation_type,
            payload,
        };
        let [a, b] = payload;
        match LogOperation::from_raw(operation_type) {
            Some(LogOperation::ContextStateChange) => {
                if b >> 32 != 0 {
                    return unknown;
                }
                match ContextState::from_raw(b as u32) {
                    Some(state) => LogEvent::ContextStateChange {
                        h_context: a,
                        state,
                    },
                    None => unknown,
                }
            }
            Some(LogOperation::QueueNewWork) if b == 0 => LogEvent::QueueNewWork { h_queue: a },
            Some(LogOperation::QueueNoMoreWork) if b == 0 => {
                LogEvent::QueueNoMoreWork { h_queue: a }
            }
            Some(LogOperation::QueueUnwaitSyncObject) => LogEvent::QueueUnwaitSyncObject {
                h_queue: a,
                h_sync_object: b,
            },
            Some(LogOperation::QueueWaitSyncObject) => LogEvent::QueueWaitSyncObject {
                h_queue: a,
                h_sync_object: b,
            },
            _ => unknown,
        }
    }

    pub fn to_raw(&self) -> (u32, [u64; 2]) {
        match *self {
            LogEvent::ContextStateChange { h_context, state } => (
                LogOperation::ContextStateChange.raw(),
                [h_context, u64::from(state.raw())],
            ),
            LogEvent::QueueNewWork { h_queue } => (LogOperation::QueueNewWork.raw(), [h_queue, 0]),
            LogEvent::QueueUnwaitSyncObject {
                h_queue,
                h_sync_object,
            } => (
                LogOperation::QueueUnwaitSyncObject.raw(),
                [h_queue, h_sync_object],
            ),
            LogEvent::QueueNoMoreWork { h_queue } => {
                (LogOperation::QueueNoMoreWork.raw(), [h_queue, 0])
            }
            LogEvent::QueueWaitSyncObject {
                h_queue,
                h_sync_object,
            } => (
                LogOperation::QueueWaitSyncObject.raw(),
                [h_queue, h_sync_object],
            ),
            LogEvent::Unknown {
                operation_type,
                payload,
            } => (operation_type, payload),
        }
    }

    /// Queue handle the event refers to, if any.
    pub fn h_queue(&self) -> Option<u64> {
        match *self {
            LogEvent::QueueNewWork { h_queue }
            | LogEvent::QueueNoMoreWork { h_queue }
            | LogEvent::QueueUnwaitSyncObject { h_queue, .. }
            | LogEvent::QueueWaitSyncObject { h_queue, .. } => Some(h_queue),
            _ => None,
        }
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    u64::from_le_bytes(raw)
}
