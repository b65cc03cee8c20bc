//! Host-side driver for the scheduler firmware.
//!
//! [`Scheduler`] is the entry point: it owns the command ring producer, the
//! [`Registry`] of processes, gangs and queues, and the [`FenceTracker`] that
//! turns completion fences into [`Outcome`]s.

mod config;
mod error;
mod fence;
mod registry;
mod scheduler;

pub use config::{SchedulerConfig, DEFAULT_FENCE_BASE_ADDR};
pub use error::{FenceError, HandleKind, RegistryError, SchedulerError, SchedulerResult};
pub use fence::{CancelToken, FenceTracker, Outcome, PendingHandle, Resolution};
pub use registry::{
    Admission, GangEntry, GangQueues, ProcessEntry, QueueEntry, QueueRemoval, Registry,
    RegistryStats, SyncObjectEntry,
};
pub use scheduler::{GangPriority, Pending, Scheduler};
