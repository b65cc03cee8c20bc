//! Frame codec and event log reader for the scheduler firmware ABI.
//!
//! [`FrameCodec`] turns [`Command`](mes_abi::Command)s into 64-dword frames and
//! back, gating opcodes and appended fields on the configured
//! [`ApiVersion`](mes_abi::ApiVersion). [`LogSnapshot`] parses a copy of the
//! firmware log buffer into chronologically ordered entries.

mod codec;
mod error;
mod frame;
mod log;
mod wire;

pub use codec::FrameCodec;
pub use error::{DecodeError, EncodeError, LogError};
pub use frame::Frame;
pub use log::{LogEntry, LogIter, LogSnapshot};
