//! Data model of the scheduler firmware command ABI.
//!
//! This crate only describes values: frame header, opcode table, enums,
//! bit-field words, priority-band arrays, completion status and error-code
//! encoding, per-opcode command payloads and the event-log format. Turning
//! them into frames lives in `mes-codec`.

mod bands;
mod bits;
mod command;
mod consts;
mod enums;
mod error;
mod header;
mod log;
mod opcode;
mod status;
mod version;

pub use bands::PriorityBands;
pub use bits::{
    ChangeConfigBits, DebugVmidFlags, HwResources1Flags, HwResourcesFlags, QueueFlags,
    QueueQuantumFlags, ReadRegOption, RemoveQueueFlags, ResetFlags, ResumeFlags, SeModeFlags,
    ShaderDebuggerFlags, SuspendFlags,
};
pub use command::{
    AddQueue, AmdLog, ChangeGangPriority, Command, LegacyQueue, MiscCommand, MiscOp,
    PerformYield, QueryRequest, QuerySchedulerStatus, RemoveQueue, Reset, Resume,
    SetDebugVmid, SetGangSubmit, SetHwResources, SetHwResources1, SetLogBuffer,
    SetSchedulingConfig, SetSeMode, ShaderDebugger, Suspend, UpdateRootPageTable,
};
pub use consts::*;
pub use enums::{
    ChangeConfigOption, ContextState, DebugVmidOp, LogOperation, MiscOpcode, PriorityLevel,
    QueryOpcode, QueueType, SeMode, WrmOperation,
};
pub use error::AbiError;
pub use header::{ApiHeader, ApiType};
pub use log::{LogEntryRecord, LogEvent, LogHeader};
pub use opcode::Opcode;
pub use status::{ApiStatus, ErrorCategory, ErrorCode};
pub use version::ApiVersion;
