//! One entry point per opcode family.
//!
//! Every operation validates its request, resolves handles through the
//! [`Registry`], stamps a fresh completion fence and the GPU time, encodes the
//! frame and pushes it. Fence allocation, encoding, the registry effect and the
//! push happen under one lock, so frames reach the ring in the order their
//! fences were handed out. Waiting happens outside that lock on the returned
//! [`Pending`].

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::error::FenceError;
use crate::fence::{CancelToken, FenceTracker, Outcome, PendingHandle, Resolution};
use crate::registry::{Admission, GangEntry, QueueRemoval, Registry};
use mes_abi::{
    AddQueue, AmdLog, ChangeGangPriority, Command, MiscCommand, Opcode, PerformYield,
    PriorityLevel, QueryRequest, QuerySchedulerStatus, QueueQuantumFlags, RemoveQueue,
    RemoveQueueFlags, Reset, Resume, SetDebugVmid, SetGangSubmit, SetHwResources,
    SetHwResources1, SetLogBuffer, SetSchedulingConfig, SetSeMode, Suspend,
    UpdateRootPageTable, NORMAL_YIELD_PERCENT_MAX,
};
use mes_codec::{FrameCodec, LogSnapshot};
use mes_transport::{CommandRing, FenceInterrupt, FenceMemory, GpuClock, FENCE_SLOT_BYTES};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Priority change for one gang.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GangPriority {
    pub level: PriorityLevel,
    pub inprocess_priority: u32,
    pub gang_quantum: u64,
    pub queue_quantum: QueueQuantumFlags,
}

/// Registry change applied together with the push of a frame.
enum Effect {
    None,
    AdmitQueue(AddQueue),
    RetireQueue(u64),
    Priority {
        h_context: u64,
        priority: GangPriority,
        previous: GangPriority,
    },
    Suspended { h_context: Option<u64>, suspended: bool },
    PageTable { process_context_addr: u64, page_table_base_addr: u64 },
}

/// Undo of an [`Effect`] once the firmware rejects the command.
enum Rollback {
    Queue(Admission),
    Priority { h_context: u64, previous: GangPriority },
}

impl Rollback {
    fn apply(self, registry: &Registry) -> SchedulerResult<()> {
        match self {
            Rollback::Queue(admission) => registry.retract(&admission)?,
            Rollback::Priority { h_context, previous } => {
                registry.update_gang(h_context, |gang| store_priority(gang, previous))?
            }
        }
        Ok(())
    }
}

/// What applying an effect left behind to undo it if the push fails.
enum Applied {
    Nothing,
    Queue(Admission),
    Removal(Box<QueueRemoval>),
    Priority { h_context: u64, previous: GangPriority },
}

impl Applied {
    /// Undo owed if the firmware later fails the command. A removal is not
    /// undone: the queue is gone from the host view once REMOVE_QUEUE is
    /// issued.
    fn rollback(&self) -> Option<Rollback> {
        match self {
            Applied::Queue(admission) => Some(Rollback::Queue(admission.clone())),
            Applied::Priority { h_context, previous } => Some(Rollback::Priority {
                h_context: *h_context,
                previous: *previous,
            }),
            Applied::Nothing | Applied::Removal(_) => None,
        }
    }
}

/// Registry undos owed to in-flight commands, keyed by their fence.
///
/// Whoever observes the final outcome first settles the entry: the command's
/// [`Pending`] or [`Scheduler::drain_completed`].
struct Rollbacks {
    registry: Arc<Registry>,
    owed: Mutex<HashMap<PendingHandle, (Opcode, Rollback)>>,
}

impl Rollbacks {
    fn owe(&self, handle: PendingHandle, opcode: Opcode, rollback: Rollback) {
        self.owed.lock().insert(handle, (opcode, rollback));
    }

    fn discard(&self, handle: PendingHandle) {
        self.owed.lock().remove(&handle);
    }

    fn settle(&self, handle: PendingHandle, outcome: Outcome) {
        if !outcome.is_final() {
            return;
        }
        let Some((opcode, rollback)) = self.owed.lock().remove(&handle) else {
            return;
        };
        if !matches!(outcome, Outcome::Failed(_)) {
            return;
        }
        match rollback.apply(&self.registry) {
            Ok(()) => tracing::debug!(opcode = opcode.name(), "registry rolled back"),
            Err(err) => tracing::warn!(opcode = opcode.name(), %err, "rollback skipped"),
        }
    }

    fn len(&self) -> usize {
        self.owed.lock().len()
    }
}

struct Submitter {
    ring: Box<dyn CommandRing>,
    next_slot: usize,
    sequence: u64,
}

pub struct Scheduler {
    config: SchedulerConfig,
    codec: FrameCodec,
    submitter: Mutex<Submitter>,
    registry: Arc<Registry>,
    tracker: Arc<FenceTracker>,
    rollbacks: Arc<Rollbacks>,
    clock: Arc<dyn GpuClock>,
}

impl Scheduler {
    /// Builds a scheduler on top of the platform collaborators and hooks the
    /// fence tracker to `irq`.
    pub fn new<R>(
        config: SchedulerConfig,
        ring: R,
        fences: Arc<dyn FenceMemory>,
        irq: &dyn FenceInterrupt,
        clock: Arc<dyn GpuClock>,
    ) -> SchedulerResult<Self>
    where
        R: CommandRing + 'static,
    {
        config.validate()?;
        let tracker = Arc::new(FenceTracker::new(fences, config.poll_interval));
        tracker.attach(irq);
        tracing::info!(
            version = %config.api_version,
            fence_slots = config.fence_slots,
            "scheduler ready"
        );
        let registry = Arc::new(Registry::new());
        Ok(Self {
            codec: FrameCodec::new(config.api_version),
            submitter: Mutex::new(Submitter {
                ring: Box::new(ring),
                next_slot: 0,
                sequence: 0,
            }),
            rollbacks: Arc::new(Rollbacks {
                registry: Arc::clone(&registry),
                owed: Mutex::new(HashMap::new()),
            }),
            registry,
            tracker,
            clock,
            config,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<FenceTracker> {
        &self.tracker
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.tracker.cancel_token()
    }

    /// In-flight commands whose registry change is undone if they fail.
    pub fn pending_rollbacks(&self) -> usize {
        self.rollbacks.len()
    }

    /// GPU addresses of the configured fence slots.
    pub fn fence_slot_addrs(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.config.fence_slots as u64)
            .map(move |i| self.config.fence_base_addr + i * FENCE_SLOT_BYTES)
    }

    pub fn set_hw_resources(&self, request: SetHwResources) -> SchedulerResult<Pending> {
        self.issue(Command::SetHwResources(request), Effect::None)
    }

    pub fn set_hw_resources_1(&self, request: SetHwResources1) -> SchedulerResult<Pending> {
        self.issue(Command::SetHwResources1(request), Effect::None)
    }

    pub fn set_scheduling_config(&self, request: SetSchedulingConfig) -> SchedulerResult<Pending> {
        if request.normal_yield_percent > NORMAL_YIELD_PERCENT_MAX {
            return Err(SchedulerError::InvalidRequest(
                "normal_yield_percent exceeds 50",
            ));
        }
        self.issue(Command::SetSchedulingConfig(request), Effect::None)
    }

    /// Maps a queue. The process and gang are created on first use; the
    /// queue is registered right away and dropped again if the firmware
    /// rejects the command.
    pub fn add_queue(&self, request: AddQueue) -> SchedulerResult<Pending> {
        if request.h_queue == 0 || request.h_context == 0 {
            return Err(SchedulerError::InvalidRequest(
                "queue and gang handles must be non-zero",
            ));
        }
        if request.process_context_addr == 0 || request.gang_context_addr == 0 {
            return Err(SchedulerError::InvalidRequest(
                "process and gang context addresses must be non-zero",
            ));
        }
        if request.process_va_start > request.process_va_end {
            return Err(SchedulerError::InvalidRequest("process VA range is inverted"));
        }
        self.issue(
            Command::AddQueue(request.clone()),
            Effect::AdmitQueue(request),
        )
    }

    /// Unmaps a queue by handle. The registry forgets it at issuance, and a
    /// second removal of the same handle fails with `NotFound`.
    pub fn remove_queue(&self, h_queue: u64, flags: RemoveQueueFlags) -> SchedulerResult<Pending> {
        let queue = self.registry.queue(h_queue)?;
        let gang = self.registry.gang(queue.h_context)?;
        let request = RemoveQueue {
            doorbell_offset: queue.doorbell_offset,
            gang_context_addr: gang.gang_context_addr,
            flags,
            queue_type: queue.queue_type,
            gang_context_array_index: gang.gang_context_array_index,
            ..RemoveQueue::default()
        };
        self.issue(Command::RemoveQueue(request), Effect::RetireQueue(h_queue))
    }

    pub fn perform_yield(&self) -> SchedulerResult<Pending> {
        self.issue(Command::PerformYield(PerformYield::default()), Effect::None)
    }

    pub fn change_gang_priority(
        &self,
        h_context: u64,
        priority: GangPriority,
    ) -> SchedulerResult<Pending> {
        self.gang_priority(h_context, priority, Command::ChangeGangPriority)
    }

    /// Same frame layout as [`change_gang_priority`](Self::change_gang_priority)
    /// under the SET_GANG_PRIORITY_LEVEL opcode.
    pub fn set_gang_priority_level(
        &self,
        h_context: u64,
        priority: GangPriority,
    ) -> SchedulerResult<Pending> {
        self.gang_priority(h_context, priority, Command::SetGangPriorityLevel)
    }

    fn gang_priority(
        &self,
        h_context: u64,
        priority: GangPriority,
        wrap: fn(ChangeGangPriority) -> Command,
    ) -> SchedulerResult<Pending> {
        let gang = self.registry.gang(h_context)?;
        let doorbell_offset = match gang.queues().first() {
            Some(h_queue) => self.registry.queue(*h_queue)?.doorbell_offset,
            None => 0,
        };
        let request = ChangeGangPriority {
            inprocess_gang_priority: priority.inprocess_priority,
            gang_global_priority_level: priority.level,
            gang_quantum: priority.gang_quantum,
            gang_context_addr: gang.gang_context_addr,
            doorbell_offset,
            gang_context_array_index: gang.gang_context_array_index,
            queue_quantum: priority.queue_quantum,
            ..ChangeGangPriority::default()
        };
        let previous = GangPriority {
            level: gang.priority_level,
            inprocess_priority: gang.inprocess_priority,
            gang_quantum: gang.gang_quantum,
            queue_quantum: priority.queue_quantum,
        };
        self.issue(
            wrap(request),
            Effect::Priority {
                h_context,
                priority,
                previous,
            },
        )
    }

    /// Suspends one gang, named by its context address, or every gang.
    pub fn suspend(&self, mut request: Suspend) -> SchedulerResult<Pending> {
        let gang = self.scope(
            request.flags.suspend_all_gangs(),
            request.gang_context_addr,
            "suspend_all_gangs excludes a gang context",
            "suspend needs a gang context or suspend_all_gangs",
        )?;
        if let Some(gang) = &gang {
            request.gang_context_array_index = gang.gang_context_array_index;
        }
        self.issue(
            Command::Suspend(request),
            Effect::Suspended {
                h_context: gang.map(|gang| gang.h_context),
                suspended: true,
            },
        )
    }

    /// Resumes one gang, named by its context address, or every gang.
    pub fn resume(&self, mut request: Resume) -> SchedulerResult<Pending> {
        let gang = self.scope(
            request.flags.resume_all_gangs(),
            request.gang_context_addr,
            "resume_all_gangs excludes a gang context",
            "resume needs a gang context or resume_all_gangs",
        )?;
        if let Some(gang) = &gang {
            request.gang_context_array_index = gang.gang_context_array_index;
        }
        self.issue(
            Command::Resume(request),
            Effect::Suspended {
                h_context: gang.map(|gang| gang.h_context),
                suspended: false,
            },
        )
    }

    /// Resolves the target of SUSPEND/RESUME: `None` for the global scope.
    fn scope(
        &self,
        all: bool,
        gang_context_addr: u64,
        both: &'static str,
        neither: &'static str,
    ) -> SchedulerResult<Option<GangEntry>> {
        match (all, gang_context_addr) {
            (true, 0) => Ok(None),
            (true, _) => Err(SchedulerError::InvalidRequest(both)),
            (false, 0) => Err(SchedulerError::InvalidRequest(neither)),
            (false, addr) => Ok(Some(self.registry.gang_by_context_addr(addr)?)),
        }
    }

    /// Detects hangs and/or resets queues.
    ///
    /// `hang_detect_only` wins over every reset flag; they are cleared before
    /// the frame is built. A queue-only reset of a scheduled queue must name
    /// a registered doorbell. The legacy path targets queues outside the
    /// scheduler and is not checked against the registry.
    pub fn reset(&self, mut request: Reset) -> SchedulerResult<Pending> {
        if request.flags.hang_detect_only() {
            let detect_only = request
                .flags
                .with_reset_queue_only(false)
                .with_hang_detect_then_reset(false)
                .with_reset_legacy_gfx(false);
            if detect_only != request.flags {
                tracing::debug!(flags = request.flags.bits(), "detect-only suppresses reset");
                request.flags = detect_only;
            }
        }
        if request.flags.reset_queue_only() {
            let queue = self.registry.queue_by_doorbell(request.doorbell_offset)?;
            let gang = self.registry.gang(queue.h_context)?;
            if request.gang_context_addr == 0 {
                request.gang_context_addr = gang.gang_context_addr;
            }
            request.gang_context_array_index = gang.gang_context_array_index;
            request.queue_type = queue.queue_type;
        }
        self.issue(Command::Reset(request), Effect::None)
    }

    pub fn set_log_buffer(&self, request: SetLogBuffer) -> SchedulerResult<Pending> {
        if request.logging_buffer_addr == 0 || request.number_of_entries == 0 {
            return Err(SchedulerError::InvalidRequest(
                "log buffer needs an address and at least one entry",
            ));
        }
        self.issue(Command::SetLogBuffer(request), Effect::None)
    }

    pub fn query_status(&self, request: QueryRequest) -> SchedulerResult<Pending> {
        let command = QuerySchedulerStatus {
            request,
            ..QuerySchedulerStatus::default()
        };
        self.issue(Command::QuerySchedulerStatus(command), Effect::None)
    }

    pub fn set_debug_vmid(&self, request: SetDebugVmid) -> SchedulerResult<Pending> {
        if request.process_va_start > request.process_va_end {
            return Err(SchedulerError::InvalidRequest("process VA range is inverted"));
        }
        self.issue(Command::SetDebugVmid(request), Effect::None)
    }

    pub fn misc(&self, request: MiscCommand) -> SchedulerResult<Pending> {
        self.issue(Command::Misc(request), Effect::None)
    }

    pub fn update_root_page_table(
        &self,
        mut request: UpdateRootPageTable,
    ) -> SchedulerResult<Pending> {
        let process = self.registry.process(request.process_context_addr)?;
        request.process_context_array_index = process.process_context_array_index;
        let effect = Effect::PageTable {
            process_context_addr: request.process_context_addr,
            page_table_base_addr: request.page_table_base_addr,
        };
        self.issue(Command::UpdateRootPageTable(request), effect)
    }

    pub fn amd_log(&self, request: AmdLog) -> SchedulerResult<Pending> {
        self.issue(Command::AmdLog(request), Effect::None)
    }

    pub fn set_se_mode(&self, request: SetSeMode) -> SchedulerResult<Pending> {
        self.issue(Command::SetSeMode(request), Effect::None)
    }

    /// Pairs two registered gangs for joint submission.
    pub fn set_gang_submit(&self, mut request: SetGangSubmit) -> SchedulerResult<Pending> {
        if request.gang_context_addr == request.slave_gang_context_addr {
            return Err(SchedulerError::InvalidRequest(
                "gang submit needs two distinct gangs",
            ));
        }
        let primary = self.registry.gang_by_context_addr(request.gang_context_addr)?;
        let secondary = self
            .registry
            .gang_by_context_addr(request.slave_gang_context_addr)?;
        request.gang_context_array_index = primary.gang_context_array_index;
        request.slave_gang_context_array_index = secondary.gang_context_array_index;
        self.issue(Command::SetGangSubmit(request), Effect::None)
    }

    /// Submits an arbitrary command without registry bookkeeping.
    pub fn submit_command(&self, command: Command) -> SchedulerResult<Pending> {
        self.issue(command, Effect::None)
    }

    /// Parses a copy of the firmware log buffer.
    pub fn read_log(&self, bytes: &[u8]) -> SchedulerResult<LogSnapshot> {
        Ok(LogSnapshot::parse(bytes)?)
    }

    /// Removes completions nobody waited for, freeing their fence slots. A
    /// failed command's registry change is undone here when its `Pending`
    /// was dropped unobserved.
    pub fn drain_completed(&self) -> Vec<(PendingHandle, Resolution)> {
        let drained = self.tracker.drain_completed();
        for (handle, resolution) in &drained {
            match resolution {
                Ok(outcome) => self.rollbacks.settle(*handle, *outcome),
                Err(_) => self.rollbacks.discard(*handle),
            }
        }
        drained
    }

    fn issue(&self, mut command: Command, effect: Effect) -> SchedulerResult<Pending> {
        let opcode = command
            .opcode()
            .ok_or(SchedulerError::InvalidRequest("unrecognized opcode"))?;
        let mut submitter = self.submitter.lock();
        if !submitter.ring.ring_space_available() {
            return Err(SchedulerError::RingFull);
        }
        let fence_addr = self.next_fence(&mut submitter)?;
        submitter.sequence += 1;
        let fence_value = submitter.sequence;

        let status = command
            .api_status_mut()
            .ok_or(SchedulerError::InvalidRequest("command carries no status"))?;
        status.fence_addr = fence_addr;
        status.fence_value = fence_value;
        let status = *status;
        command.set_timestamp(self.clock.now());
        let frame = self.codec.encode(&command)?;

        let handle = self.tracker.submit(&status, opcode.raw())?;
        let applied = match self.apply(effect) {
            Ok(applied) => applied,
            Err(err) => {
                self.tracker.forget(handle);
                return Err(err);
            }
        };
        // Owed before the push so a drain racing the completion finds it.
        if let Some(rollback) = applied.rollback() {
            self.rollbacks.owe(handle, opcode, rollback);
        }
        if let Err(err) = submitter.ring.ring_push(frame.words()) {
            self.tracker.forget(handle);
            self.rollbacks.discard(handle);
            self.undo(applied);
            return Err(err.into());
        }
        drop(submitter);

        tracing::debug!(
            opcode = opcode.name(),
            dwsize = frame.header().dwsize(),
            fence_addr,
            fence_value,
            "frame submitted"
        );
        Ok(Pending {
            handle,
            opcode,
            tracker: Arc::clone(&self.tracker),
            rollbacks: Arc::clone(&self.rollbacks),
            default_timeout: self.config.default_timeout,
            resolved: None,
        })
    }

    fn next_fence(&self, submitter: &mut Submitter) -> SchedulerResult<u64> {
        let slots = self.config.fence_slots;
        for step in 0..slots {
            let index = (submitter.next_slot + step) % slots;
            let addr = self.config.fence_base_addr + index as u64 * FENCE_SLOT_BYTES;
            if !self.tracker.is_in_flight(addr) {
                submitter.next_slot = (index + 1) % slots;
                return Ok(addr);
            }
        }
        Err(SchedulerError::NoFreeFence)
    }

    fn apply(&self, effect: Effect) -> SchedulerResult<Applied> {
        match effect {
            Effect::None => Ok(Applied::Nothing),
            Effect::AdmitQueue(request) => {
                let admission = self.registry.admit_queue(&request)?;
                Ok(Applied::Queue(admission))
            }
            Effect::RetireQueue(h_queue) => {
                let removal = self.registry.unregister_queue(h_queue)?;
                Ok(Applied::Removal(Box::new(removal)))
            }
            Effect::Priority {
                h_context,
                priority,
                previous,
            } => {
                self.registry
                    .update_gang(h_context, |gang| store_priority(gang, priority))?;
                Ok(Applied::Priority {
                    h_context,
                    previous,
                })
            }
            Effect::Suspended {
                h_context: Some(h_context),
                suspended,
            } => {
                self.registry
                    .update_gang(h_context, |gang| gang.suspended = suspended)?;
                Ok(Applied::Nothing)
            }
            Effect::Suspended {
                h_context: None,
                suspended,
            } => {
                self.registry.set_all_suspended(suspended);
                Ok(Applied::Nothing)
            }
            Effect::PageTable {
                process_context_addr,
                page_table_base_addr,
            } => {
                self.registry.update_process(process_context_addr, |process| {
                    process.page_table_base_addr = page_table_base_addr
                })?;
                Ok(Applied::Nothing)
            }
        }
    }

    fn undo(&self, applied: Applied) {
        let result = match applied {
            Applied::Nothing => Ok(()),
            Applied::Queue(admission) => self.registry.retract(&admission),
            Applied::Removal(removal) => self.registry.restore(*removal),
            Applied::Priority {
                h_context,
                previous,
            } => self
                .registry
                .update_gang(h_context, |gang| store_priority(gang, previous)),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "could not undo registry change after failed push");
        }
    }
}

fn store_priority(gang: &mut GangEntry, priority: GangPriority) {
    gang.priority_level = priority.level;
    gang.inprocess_priority = priority.inprocess_priority;
    gang.gang_quantum = priority.gang_quantum;
}

/// A submitted command awaiting its completion fence.
///
/// Dropping a `Pending` does not retract the command; its fence stays tracked
/// until [`Scheduler::drain_completed`] collects it, and any registry change
/// owed to a failure is undone then.
#[must_use = "a submitted command should be waited on"]
pub struct Pending {
    handle: PendingHandle,
    opcode: Opcode,
    tracker: Arc<FenceTracker>,
    rollbacks: Arc<Rollbacks>,
    default_timeout: Duration,
    resolved: Option<Outcome>,
}

impl std::fmt::Debug for Pending {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending")
            .field("opcode", &self.opcode)
            .field("handle", &self.handle)
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl Pending {
    pub fn handle(&self) -> PendingHandle {
        self.handle
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn fence_addr(&self) -> u64 {
        self.handle.fence_addr
    }

    pub fn expected_value(&self) -> u64 {
        self.handle.expected
    }

    /// Checks for completion without blocking.
    pub fn poll(&mut self) -> SchedulerResult<Option<Outcome>> {
        if let Some(outcome) = self.resolved {
            return Ok(Some(outcome));
        }
        match self.tracker.poll(self.handle) {
            Ok(Some(outcome)) => Ok(Some(self.settle(outcome))),
            Ok(None) => Ok(None),
            Err(err) => Err(self.abandon(err)),
        }
    }

    /// Blocks up to `timeout`. `TimedOut` and `Canceled` may be followed by
    /// another wait; final outcomes are remembered.
    pub fn wait(&mut self, timeout: Duration) -> SchedulerResult<Outcome> {
        if let Some(outcome) = self.resolved {
            return Ok(outcome);
        }
        match self.tracker.wait(self.handle, timeout) {
            Ok(outcome) => Ok(self.settle(outcome)),
            Err(err) => Err(self.abandon(err)),
        }
    }

    pub fn wait_cancelable(
        &mut self,
        timeout: Duration,
        token: &CancelToken,
    ) -> SchedulerResult<Outcome> {
        if let Some(outcome) = self.resolved {
            return Ok(outcome);
        }
        match self.tracker.wait_cancelable(self.handle, timeout, token) {
            Ok(outcome) => Ok(self.settle(outcome)),
            Err(err) => Err(self.abandon(err)),
        }
    }

    /// Waits with the scheduler's configured default timeout.
    pub fn wait_default(&mut self) -> SchedulerResult<Outcome> {
        self.wait(self.default_timeout)
    }

    /// Waits and turns anything but success into an error.
    pub fn wait_ok(&mut self, timeout: Duration) -> SchedulerResult<()> {
        match self.wait(timeout)? {
            Outcome::Success => Ok(()),
            Outcome::Failed(code) => Err(code.into()),
            Outcome::TimedOut => Err(SchedulerError::TimedOut),
            Outcome::Canceled => Err(SchedulerError::Canceled),
        }
    }

    fn settle(&mut self, outcome: Outcome) -> Outcome {
        if outcome.is_final() {
            self.resolved = Some(outcome);
            self.rollbacks.settle(self.handle, outcome);
        }
        outcome
    }

    /// The tracker no longer holds this fence, so no undo can be settled
    /// against it.
    fn abandon(&self, err: FenceError) -> SchedulerError {
        self.rollbacks.discard(self.handle);
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_abi::{ErrorCategory, ErrorCode, QueueType, ResetFlags, SuspendFlags};
    use mes_codec::Frame;
    use mes_transport::{FenceIrq, FenceRegion, FrameRing, ManualClock, RingConsumer};

    struct Rig {
        scheduler: Scheduler,
        consumer: RingConsumer,
        fences: Arc<FenceRegion>,
        irq: Arc<FenceIrq>,
    }

    fn rig() -> Rig {
        let config = SchedulerConfig {
            fence_slots: 4,
            ring_frames: 8,
            ..SchedulerConfig::default()
        };
        let (producer, consumer) = FrameRing::new(config.ring_frames).expect("ring").split();
        let fences = Arc::new(
            FenceRegion::new(config.fence_base_addr, config.fence_slots).expect("fences"),
        );
        let irq = Arc::new(FenceIrq::new());
        let scheduler = Scheduler::new(
            config,
            producer,
            fences.clone(),
            irq.as_ref(),
            Arc::new(ManualClock::new(1_000)),
        )
        .expect("scheduler");
        Rig {
            scheduler,
            consumer,
            fences,
            irq,
        }
    }

    impl Rig {
        /// Pops one frame, decodes it and completes its fence with `value`.
        fn complete_next(&mut self, value: impl FnOnce(u64) -> u64) -> Command {
            let words = self.consumer.pop().expect("frame queued");
            let command = self
                .scheduler
                .codec()
                .decode(&Frame::from_words(words))
                .expect("decode");
            let status = *command.api_status().expect("status");
            self.fences
                .write(status.fence_addr, value(status.fence_value))
                .expect("fence");
            self.irq.raise();
            command
        }
    }

    fn add_queue(h_context: u64, h_queue: u64, doorbell: u32) -> AddQueue {
        AddQueue {
            process_id: 3,
            process_context_addr: 0x4000,
            gang_context_addr: 0x5000 + h_context,
            h_context,
            h_queue,
            doorbell_offset: doorbell,
            queue_type: QueueType::Gfx,
            ..AddQueue::default()
        }
    }

    #[test]
    fn stamps_fence_and_timestamp() {
        let mut rig = rig();
        let mut pending = rig.scheduler.perform_yield().expect("yield");
        assert_eq!(pending.expected_value(), 1);
        let command = rig.complete_next(|v| v);
        match command {
            Command::PerformYield(cmd) => {
                assert_eq!(cmd.timestamp, 1_000);
                assert_eq!(cmd.api_status.fence_addr, pending.fence_addr());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            pending.wait(Duration::from_secs(1)).expect("wait"),
            Outcome::Success
        );
        // Final outcomes are remembered.
        assert_eq!(pending.poll().expect("poll"), Some(Outcome::Success));
    }

    #[test]
    fn fence_slots_run_out_and_recycle() {
        let mut rig = rig();
        let mut pendings: Vec<Pending> = (0..4)
            .map(|_| rig.scheduler.perform_yield().expect("yield"))
            .collect();
        assert!(matches!(
            rig.scheduler.perform_yield(),
            Err(SchedulerError::NoFreeFence)
        ));
        rig.complete_next(|v| v);
        pendings[0].wait_ok(Duration::from_secs(1)).expect("first");
        let next = rig.scheduler.perform_yield().expect("slot reclaimed");
        assert_eq!(next.fence_addr(), pendings[0].fence_addr());
        assert_eq!(next.expected_value(), 5);
    }

    #[test]
    fn suspend_rejects_both_scopes() {
        let rig = rig();
        let request = Suspend {
            flags: SuspendFlags::default().with_suspend_all_gangs(true),
            gang_context_addr: 0x5001,
            ..Suspend::default()
        };
        assert!(matches!(
            rig.scheduler.suspend(request),
            Err(SchedulerError::InvalidRequest(_))
        ));
        assert!(rig.consumer.ring().is_empty());
        assert!(matches!(
            rig.scheduler.suspend(Suspend::default()),
            Err(SchedulerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn suspend_single_gang_marks_registry() {
        let mut rig = rig();
        let mut add = rig.scheduler.add_queue(add_queue(1, 0x10, 4)).expect("add");
        rig.complete_next(|v| v);
        add.wait_ok(Duration::from_secs(1)).expect("added");

        let _suspend = rig
            .scheduler
            .suspend(Suspend {
                gang_context_addr: 0x5001,
                ..Suspend::default()
            })
            .expect("suspend");
        assert!(rig.scheduler.registry().gang(1).expect("gang").suspended);
    }

    #[test]
    fn failed_add_queue_is_rolled_back() {
        let mut rig = rig();
        let mut pending = rig.scheduler.add_queue(add_queue(1, 0x10, 4)).expect("add");
        assert!(rig.scheduler.registry().queue(0x10).is_ok());

        let code = ErrorCode::new(ErrorCategory::Scheduling, Opcode::AddQueue.raw(), 0, 0x21);
        rig.complete_next(|_| code.to_fence_value());
        match pending.wait_ok(Duration::from_secs(1)) {
            Err(SchedulerError::Firmware {
                category,
                opcode,
                code,
                ..
            }) => {
                assert_eq!(category, ErrorCategory::Scheduling);
                assert_eq!(opcode, 2);
                assert_eq!(code, 0x21);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(rig.scheduler.registry().queue(0x10).is_err());
        assert!(rig.scheduler.registry().gang(1).is_err());
    }

    #[test]
    fn registry_rejection_consumes_no_fence() {
        let rig = rig();
        let _first = rig.scheduler.add_queue(add_queue(1, 0x10, 4)).expect("add");
        assert!(matches!(
            rig.scheduler.add_queue(add_queue(1, 0x10, 5)),
            Err(SchedulerError::Registry(_))
        ));
        assert_eq!(rig.scheduler.tracker().in_flight(), 1);
        assert_eq!(rig.consumer.ring().len(), 1);
    }

    #[test]
    fn detect_only_reset_clears_reset_bits() {
        let mut rig = rig();
        let flags = ResetFlags::default()
            .with_hang_detect_only(true)
            .with_reset_queue_only(true);
        let _pending = rig
            .scheduler
            .reset(Reset {
                flags,
                doorbell_offset: 77,
                ..Reset::default()
            })
            .expect("reset");
        match rig.complete_next(|v| v) {
            Command::Reset(cmd) => {
                assert!(cmd.flags.hang_detect_only());
                assert!(!cmd.flags.reset_queue_only());
                assert!(!cmd.flags.resets());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn queue_reset_requires_known_doorbell() {
        let rig = rig();
        let request = Reset {
            flags: ResetFlags::default().with_reset_queue_only(true),
            doorbell_offset: 77,
            ..Reset::default()
        };
        assert!(matches!(
            rig.scheduler.reset(request),
            Err(SchedulerError::Registry(_))
        ));
    }

    #[test]
    fn priority_change_is_restored_on_failure() {
        let mut rig = rig();
        let mut add = rig.scheduler.add_queue(add_queue(1, 0x10, 4)).expect("add");
        rig.complete_next(|v| v);
        add.wait_ok(Duration::from_secs(1)).expect("added");

        let mut pending = rig
            .scheduler
            .change_gang_priority(
                1,
                GangPriority {
                    level: PriorityLevel::High,
                    ..GangPriority::default()
                },
            )
            .expect("priority");
        assert_eq!(
            rig.scheduler.registry().gang(1).expect("gang").priority_level,
            PriorityLevel::High
        );
        let code = ErrorCode::new(ErrorCategory::Api, Opcode::ChangeGangPriority.raw(), 0, 1);
        match rig.complete_next(|_| code.to_fence_value()) {
            Command::ChangeGangPriority(cmd) => assert_eq!(cmd.doorbell_offset, 4),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            pending.wait(Duration::from_secs(1)).expect("wait"),
            Outcome::Failed(code)
        );
        assert_eq!(
            rig.scheduler.registry().gang(1).expect("gang").priority_level,
            PriorityLevel::Normal
        );
    }

    #[test]
    fn scheduling_config_yield_is_bounded() {
        let rig = rig();
        let request = SetSchedulingConfig {
            normal_yield_percent: 51,
            ..SetSchedulingConfig::default()
        };
        assert!(matches!(
            rig.scheduler.set_scheduling_config(request),
            Err(SchedulerError::InvalidRequest(_))
        ));
    }

    #[test]
    fn gang_submit_needs_registered_gangs() {
        let rig = rig();
        let _a = rig.scheduler.add_queue(add_queue(1, 0x10, 4)).expect("add");
        let request = SetGangSubmit {
            gang_context_addr: 0x5001,
            slave_gang_context_addr: 0x5002,
            ..SetGangSubmit::default()
        };
        assert!(matches!(
            rig.scheduler.set_gang_submit(request.clone()),
            Err(SchedulerError::Registry(_))
        ));
        let _b = rig.scheduler.add_queue(add_queue(2, 0x20, 5)).expect("add");
        rig.scheduler.set_gang_submit(request).expect("gang submit");
    }
}
