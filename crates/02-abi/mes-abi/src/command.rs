//! Command payloads, one struct per opcode.
//!
//! Field order is the wire order. The header word is not part of the structs;
//! it is derived from the variant and the encoded size.

use crate::bands::PriorityBands;
use crate::bits::*;
use crate::consts::*;
use crate::enums::*;
use crate::opcode::Opcode;
use crate::status::ApiStatus;
use crate::version::ApiVersion;
use serde::{Deserialize, Serialize};

/// SET_HW_RSRC: hardware resources the scheduler may hand out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHwResources {
    pub vmid_mask_mmhub: u32,
    pub vmid_mask_gfxhub: u32,
    pub gds_size: u32,
    pub paging_vmid: u32,
    pub compute_hqd_mask: [u32; MAX_COMPUTE_PIPES],
    pub gfx_hqd_mask: [u32; MAX_GFX_PIPES],
    pub sdma_hqd_mask: [u32; MAX_SDMA_PIPES],
    pub aggregated_doorbells: PriorityBands<u32>,
    pub g_sch_ctx_gpu_mc_ptr: u64,
    pub query_status_fence_gpu_mc_ptr: u64,
    pub gc_base: [u32; MES_MAX_HWIP_SEGMENT],
    pub mmhub_base: [u32; MES_MAX_HWIP_SEGMENT],
    pub osssys_base: [u32; MES_MAX_HWIP_SEGMENT],
    pub api_status: ApiStatus,
    pub flags: HwResourcesFlags,
    pub oversubscription_timer: u32,
    pub doorbell_info: u64,
    pub event_intr_history_gpu_mc_ptr: u64,
    pub timestamp: u64,
    pub os_tdr_timeout_in_sec: u32,
}

/// SET_HW_RSRC_1: debug context and cleaner shader setup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHwResources1 {
    pub api_status: ApiStatus,
    pub timestamp: u64,
    pub flags: HwResources1Flags,
    pub mes_debug_ctx_mc_addr: u64,
    pub mes_debug_ctx_size: u32,
    /// Unit is 100 ms.
    pub mes_kiq_unmap_timeout: u32,
    pub reserved1: u64,
    pub cleaner_shader_fence_mc_addr: u64,
}

/// SET_SCHEDULING_CONFIG: per-band grace periods and quanta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSchedulingConfig {
    /// Grace period when this band preempts another band. Ignored for the
    /// lowest band, which never preempts.
    pub grace_period_other_levels: PriorityBands<u64>,
    /// Quantum for scheduling across processes within a band.
    pub process_quantum_for_level: PriorityBands<u64>,
    /// Grace period for processes preempting each other within a band.
    pub process_grace_period_same_level: PriorityBands<u64>,
    /// GPU share kept for the normal band when starved by higher bands, 0..=50.
    pub normal_yield_percent: u32,
    pub api_status: ApiStatus,
    pub timestamp: u64,
}

impl Default for SetSchedulingConfig {
    fn default() -> Self {
        Self {
            grace_period_other_levels: PriorityBands::default(),
            process_quantum_for_level: PriorityBands::default(),
            process_grace_period_same_level: PriorityBands::default(),
            normal_yield_percent: NORMAL_YIELD_PERCENT_DEFAULT,
            api_status: ApiStatus::default(),
            timestamp: 0,
        }
    }
}

/// ADD_QUEUE: maps a queue, creating its process and gang on first use.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddQueue {
    pub process_id: u32,
    pub page_table_base_addr: u64,
    pub process_va_start: u64,
    pub process_va_end: u64,
    pub process_quantum: u64,
    pub process_context_addr: u64,
    pub gang_quantum: u64,
    pub gang_context_addr: u64,
    pub inprocess_gang_priority: u32,
    pub gang_global_priority_level: PriorityLevel,
    pub doorbell_offset: u32,
    pub mqd_addr: u64,
    pub wptr_addr: u64,
    pub h_context: u64,
    pub h_queue: u64,
    pub queue_type: QueueType,
    pub gds_base: u32,
    /// Shared with `kfd_queue_size`, see [`AddQueue::kfd_queue_size`].
    pub gds_size: u32,
    pub gws_base: u32,
    pub gws_size: u32,
    pub oa_mask: u32,
    pub trap_handler_addr: u64,
    pub vm_context_cntl: u32,
    pub flags: QueueFlags,
    pub api_status: ApiStatus,
    pub tma_addr: u64,
    pub sch_id: u32,
    pub timestamp: u64,
    pub process_context_array_index: u32,
    pub gang_context_array_index: u32,
    /// Legacy kernel queue mapping.
    pub pipe_id: u32,
    pub queue_id: u32,
    /// Present from [`ApiVersion::HW_RESOURCES_1`].
    pub alignment_mode_setting: u32,
}

impl AddQueue {
    /// Compute stacks reuse the GDS size word for the queue size.
    pub fn kfd_queue_size(&self) -> u32 {
        self.gds_size
    }
}

/// REMOVE_QUEUE: unmaps one queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveQueue {
    pub doorbell_offset: u32,
    pub gang_context_addr: u64,
    pub flags: RemoveQueueFlags,
    pub api_status: ApiStatus,
    pub pipe_id: u32,
    pub queue_id: u32,
    pub tf_addr: u64,
    pub tf_data: u32,
    pub queue_type: QueueType,
    pub timestamp: u64,
    pub gang_context_array_index: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformYield {
    pub dummy: u32,
    pub api_status: ApiStatus,
    pub timestamp: u64,
}

/// CHANGE_GANG_PRIORITY and SET_GANG_PRIORITY_LEVEL share this layout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeGangPriority {
    pub inprocess_gang_priority: u32,
    pub gang_global_priority_level: PriorityLevel,
    pub gang_quantum: u64,
    pub gang_context_addr: u64,
    pub api_status: ApiStatus,
    pub doorbell_offset: u32,
    pub timestamp: u64,
    pub gang_context_array_index: u32,
    pub queue_quantum: QueueQuantumFlags,
}

/// SUSPEND: preempts one gang or all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suspend {
    pub flags: SuspendFlags,
    /// Only meaningful when `suspend_all_gangs` is clear.
    pub gang_context_addr: u64,
    /// Secondary fence written once the gang is drained.
    pub suspend_fence_addr: u64,
    pub suspend_fence_value: u32,
    pub api_status: ApiStatus,
    /// Shared word. Carries the firmware `return_value` before
    /// [`ApiVersion::SE_MODE`] and the host-chosen `sch_id` from it on.
    pub sch_id: u32,
    pub doorbell_offset: u32,
    pub timestamp: u64,
    pub legacy_uq_type: QueueType,
    pub legacy_uq_priority_level: PriorityLevel,
    pub gang_context_array_index: u32,
}

impl Suspend {
    /// `sch_id` when `version` gives the shared word that meaning.
    pub fn sch_id_for(&self, version: ApiVersion) -> Option<u32> {
        version.supports(ApiVersion::SE_MODE).then_some(self.sch_id)
    }

    /// Firmware return value when `version` predates `sch_id`.
    pub fn return_value_for(&self, version: ApiVersion) -> Option<u32> {
        (!version.supports(ApiVersion::SE_MODE)).then_some(self.sch_id)
    }
}

/// RESUME: resumes one gang or all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    pub flags: ResumeFlags,
    /// Only meaningful when `resume_all_gangs` is clear.
    pub gang_context_addr: u64,
    pub api_status: ApiStatus,
    pub doorbell_offset: u32,
    pub timestamp: u64,
    pub gang_context_array_index: u32,
}

/// Kernel queue outside the scheduler reset through RESET's legacy path.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyQueue {
    pub pipe_id: u32,
    pub queue_id: u32,
    pub vmid_id: u32,
    pub mqd_mc_addr: u64,
    pub doorbell_offset: u32,
    pub wptr_addr: u64,
}

/// RESET: hang detection and queue reset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reset {
    pub flags: ResetFlags,
    pub gang_context_addr: u64,
    /// Valid with `reset_queue_only`.
    pub doorbell_offset: u32,
    /// Valid with `hang_detect_then_reset`.
    pub doorbell_offset_addr: u64,
    pub queue_type: QueueType,
    /// Valid with `reset_legacy_gfx`.
    pub legacy_lp: LegacyQueue,
    pub legacy_hp: LegacyQueue,
    pub api_status: ApiStatus,
    pub active_vmids: u32,
    pub timestamp: u64,
    pub gang_context_array_index: u32,
    /// Present from [`ApiVersion::GANG_SUBMIT`].
    pub connected_queue_index: u32,
    /// Present from [`ApiVersion::GANG_SUBMIT`].
    pub connected_queue_index_p1: u32,
}

/// SET_LOG_BUFFER: one log buffer per queue type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLogBuffer {
    pub log_type: QueueType,
    pub logging_buffer_addr: u64,
    pub number_of_entries: u32,
    /// Entry index at which the host gets an interrupt.
    pub interrupt_entry: u32,
    pub api_status: ApiStatus,
    pub timestamp: u64,
    pub vmid: u32,
}

/// Sub-request of QUERY_SCHEDULER_STATUS.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryRequest {
    GetCtxArraySize {
        proc_ctx_array_size_addr: u64,
        gang_ctx_array_size_addr: u64,
    },
    CheckHealthy {
        healthy_addr: u64,
    },
    /// Sub-opcode this crate does not know; data kept verbatim.
    Unknown {
        subopcode: u32,
        data: [u32; QUERY_MES_MAX_SIZE_IN_DWORDS],
    },
}

impl QueryRequest {
    pub fn subopcode(&self) -> u32 {
        match self {
            QueryRequest::GetCtxArraySize { .. } => QueryOpcode::GetCtxArraySize.raw(),
            QueryRequest::CheckHealthy { .. } => QueryOpcode::CheckHealthy.raw(),
            QueryRequest::Unknown { subopcode, .. } => *subopcode,
        }
    }
}

impl Default for QueryRequest {
    fn default() -> Self {
        QueryRequest::CheckHealthy { healthy_addr: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySchedulerStatus {
    pub request: QueryRequest,
    pub api_status: ApiStatus,
    pub timestamp: u64,
}

/// SET_DEBUG_VMID: debugger VMID management.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDebugVmid {
    pub api_status: ApiStatus,
    pub flags: DebugVmidFlags,
    pub reserved: u32,
    pub debug_vmid: u32,
    pub process_context_addr: u64,
    pub page_table_base_addr: u64,
    pub process_va_start: u64,
    pub process_va_end: u64,
    pub gds_base: u32,
    pub gds_size: u32,
    pub gws_base: u32,
    pub gws_size: u32,
    pub oa_mask: u32,
    /// Where the firmware stores the acquired vmid.
    pub output_addr: u64,
    pub timestamp: u64,
    pub process_vm_cntl: u32,
    pub queue_type: QueueType,
    pub process_context_array_index: u32,
    /// Present from [`ApiVersion::HW_RESOURCES_1`].
    pub alignment_mode_setting: u32,
}

/// Payload of MISC/SET_SHADER_DEBUGGER.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderDebugger {
    pub process_context_addr: u64,
    pub flags: ShaderDebuggerFlags,
    pub spi_gdbg_per_vmid_cntl: u32,
    pub tcp_watch_cntl: [u32; 4],
    pub trap_en: u32,
}

/// Sub-operation of MISC with its slice of the 20-dword data union.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiscOp {
    WriteReg {
        reg_offset: u32,
        reg_value: u32,
    },
    InvGart {
        inv_range_va_start: u64,
        inv_range_size: u64,
    },
    QueryStatus {
        context_id: u32,
    },
    ReadReg {
        reg_offset: u32,
        buffer_addr: u64,
        option: ReadRegOption,
    },
    WaitRegMem {
        op: WrmOperation,
        reference: u32,
        mask: u32,
        reg_offset1: u32,
        reg_offset2: u32,
    },
    SetShaderDebugger(ShaderDebugger),
    NotifyWorkOnUnmappedQueue {
        queue_sch_level: PriorityLevel,
    },
    NotifyToUnmapProcesses,
    QueryHungEngineId,
    ChangeConfig {
        option: ChangeConfigOption,
        bits: ChangeConfigBits,
        tdr_level: u32,
        tdr_delay: u32,
    },
    LaunchCleanerShader,
    SetupMesDbgext,
    /// Sub-opcode this crate does not know; data kept verbatim.
    Unknown {
        opcode: u32,
        data: [u32; MISC_DATA_MAX_SIZE_IN_DWORDS],
    },
}

impl MiscOp {
    pub fn opcode(&self) -> u32 {
        let known = match self {
            MiscOp::WriteReg { .. } => MiscOpcode::WriteReg,
            MiscOp::InvGart { .. } => MiscOpcode::InvGart,
            MiscOp::QueryStatus { .. } => MiscOpcode::QueryStatus,
            MiscOp::ReadReg { .. } => MiscOpcode::ReadReg,
            MiscOp::WaitRegMem { .. } => MiscOpcode::WaitRegMem,
            MiscOp::SetShaderDebugger(_) => MiscOpcode::SetShaderDebugger,
            MiscOp::NotifyWorkOnUnmappedQueue { .. } => MiscOpcode::NotifyWorkOnUnmappedQueue,
            MiscOp::NotifyToUnmapProcesses => MiscOpcode::NotifyToUnmapProcesses,
            MiscOp::QueryHungEngineId => MiscOpcode::QueryHungEngineId,
            MiscOp::ChangeConfig { .. } => MiscOpcode::ChangeConfig,
            MiscOp::LaunchCleanerShader => MiscOpcode::LaunchCleanerShader,
            MiscOp::SetupMesDbgext => MiscOpcode::SetupMesDbgext,
            MiscOp::Unknown { opcode, .. } => return *opcode,
        };
        known.raw()
    }
}

impl Default for MiscOp {
    fn default() -> Self {
        MiscOp::QueryStatus { context_id: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscCommand {
    pub op: MiscOp,
    pub api_status: ApiStatus,
    pub timestamp: u64,
    pub doorbell_offset: u32,
    pub os_fence: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRootPageTable {
    pub page_table_base_addr: u64,
    pub process_context_addr: u64,
    pub api_status: ApiStatus,
    pub timestamp: u64,
    pub process_context_array_index: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmdLog {
    pub p_buffer_memory: u64,
    pub p_buffer_size_used: u64,
    pub api_status: ApiStatus,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSeMode {
    pub new_se_mode: SeMode,
    /// Fence guarding the context sync packet.
    pub cpg_ctxt_sync_fence_addr: u64,
    pub cpg_ctxt_sync_fence_value: u32,
    pub flags: SeModeFlags,
    pub api_status: ApiStatus,
}

/// SET_GANG_SUBMIT: pairs a primary gang with a secondary one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetGangSubmit {
    pub api_status: ApiStatus,
    pub gang_context_addr: u64,
    pub slave_gang_context_addr: u64,
    pub gang_context_array_index: u32,
    pub slave_gang_context_array_index: u32,
}

/// Every command the host can put on the ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opcode", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    SetHwResources(SetHwResources),
    SetSchedulingConfig(SetSchedulingConfig),
    AddQueue(AddQueue),
    RemoveQueue(RemoveQueue),
    PerformYield(PerformYield),
    SetGangPriorityLevel(ChangeGangPriority),
    Suspend(Suspend),
    Resume(Resume),
    Reset(Reset),
    SetLogBuffer(SetLogBuffer),
    ChangeGangPriority(ChangeGangPriority),
    QuerySchedulerStatus(QuerySchedulerStatus),
    SetDebugVmid(SetDebugVmid),
    Misc(MiscCommand),
    UpdateRootPageTable(UpdateRootPageTable),
    AmdLog(AmdLog),
    SetSeMode(SetSeMode),
    SetGangSubmit(SetGangSubmit),
    SetHwResources1(SetHwResources1),
    /// Opcode outside the known set. `dwords` are the payload words after the
    /// header, as many as the header declared.
    Unrecognized { opcode: u8, dwords: Vec<u32> },
}

macro_rules! for_each_known {
    ($self:expr, $cmd:ident => $body:expr, $unrecognized:expr) => {
        match $self {
            Command::SetHwResources($cmd) => $body,
            Command::SetSchedulingConfig($cmd) => $body,
            Command::AddQueue($cmd) => $body,
            Command::RemoveQueue($cmd) => $body,
            Command::PerformYield($cmd) => $body,
            Command::SetGangPriorityLevel($cmd) => $body,
            Command::Suspend($cmd) => $body,
            Command::Resume($cmd) => $body,
            Command::Reset($cmd) => $body,
            Command::SetLogBuffer($cmd) => $body,
            Command::ChangeGangPriority($cmd) => $body,
            Command::QuerySchedulerStatus($cmd) => $body,
            Command::SetDebugVmid($cmd) => $body,
            Command::Misc($cmd) => $body,
            Command::UpdateRootPageTable($cmd) => $body,
            Command::AmdLog($cmd) => $body,
            Command::SetSeMode($cmd) => $body,
            Command::SetGangSubmit($cmd) => $body,
            Command::SetHwResources1($cmd) => $body,
            Command::Unrecognized { .. } => $unrecognized,
        }
    };
}

impl Command {
    /// Known opcode of this command, `None` for unrecognized ones.
    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            Command::SetHwResources(_) => Opcode::SetHwResources,
            Command::SetSchedulingConfig(_) => Opcode::SetSchedulingConfig,
            Command::AddQueue(_) => Opcode::AddQueue,
            Command::RemoveQueue(_) => Opcode::RemoveQueue,
            Command::PerformYield(_) => Opcode::PerformYield,
            Command::SetGangPriorityLevel(_) => Opcode::SetGangPriorityLevel,
            Command::Suspend(_) => Opcode::Suspend,
            Command::Resume(_) => Opcode::Resume,
            Command::Reset(_) => Opcode::Reset,
            Command::SetLogBuffer(_) => Opcode::SetLogBuffer,
            Command::ChangeGangPriority(_) => Opcode::ChangeGangPriority,
            Command::QuerySchedulerStatus(_) => Opcode::QuerySchedulerStatus,
            Command::SetDebugVmid(_) => Opcode::SetDebugVmid,
            Command::Misc(_) => Opcode::Misc,
            Command::UpdateRootPageTable(_) => Opcode::UpdateRootPageTable,
            Command::AmdLog(_) => Opcode::AmdLog,
            Command::SetSeMode(_) => Opcode::SetSeMode,
            Command::SetGangSubmit(_) => Opcode::SetGangSubmit,
            Command::SetHwResources1(_) => Opcode::SetHwResources1,
            Command::Unrecognized { .. } => return None,
        })
    }

    /// Opcode as it appears in the header.
    pub fn raw_opcode(&self) -> u8 {
        match self {
            Command::Unrecognized { opcode, .. } => *opcode,
            known => known.opcode().map(Opcode::raw).unwrap_or_default(),
        }
    }

    pub fn api_status(&self) -> Option<&ApiStatus> {
        for_each_known!(self, cmd => Some(&cmd.api_status), None)
    }

    pub fn api_status_mut(&mut self) -> Option<&mut ApiStatus> {
        for_each_known!(self, cmd => Some(&mut cmd.api_status), None)
    }

    /// Stamps the frame timestamp, for commands that carry one.
    pub fn set_timestamp(&mut self, ticks: u64) {
        match self {
            Command::SetHwResources(cmd) => cmd.timestamp = ticks,
            Command::SetSchedulingConfig(cmd) => cmd.timestamp = ticks,
            Command::AddQueue(cmd) => cmd.timestamp = ticks,
            Command::RemoveQueue(cmd) => cmd.timestamp = ticks,
            Command::PerformYield(cmd) => cmd.timestamp = ticks,
            Command::SetGangPriorityLevel(cmd) | Command::ChangeGangPriority(cmd) => {
                cmd.timestamp = ticks
            }
            Command::Suspend(cmd) => cmd.timestamp = ticks,
            Command::Resume(cmd) => cmd.timestamp = ticks,
            Command::Reset(cmd) => cmd.timestamp = ticks,
            Command::SetLogBuffer(cmd) => cmd.timestamp = ticks,
            Command::QuerySchedulerStatus(cmd) => cmd.timestamp = ticks,
            Command::SetDebugVmid(cmd) => cmd.timestamp = ticks,
            Command::Misc(cmd) => cmd.timestamp = ticks,
            Command::UpdateRootPageTable(cmd) => cmd.timestamp = ticks,
            Command::AmdLog(cmd) => cmd.timestamp = ticks,
            Command::SetHwResources1(cmd) => cmd.timestamp = ticks,
            Command::SetSeMode(_) | Command::SetGangSubmit(_) | Command::Unrecognized { .. } => {}
        }
    }

    /// Empty payload for `opcode`, used to size frames.
    pub fn default_for(opcode: Opcode) -> Command {
        match opcode {
            Opcode::SetHwResources => Command::SetHwResources(Default::default()),
            Opcode::SetSchedulingConfig => Command::SetSchedulingConfig(Default::default()),
            Opcode::AddQueue => Command::AddQueue(Default::default()),
            Opcode::RemoveQueue => Command::RemoveQueue(Default::default()),
            Opcode::PerformYield => Command::PerformYield(Default::default()),
            Opcode::SetGangPriorityLevel => Command::SetGangPriorityLevel(Default::default()),
            Opcode::Suspend => Command::Suspend(Default::default()),
            Opcode::Resume => Command::Resume(Default::default()),
            Opcode::Reset => Command::Reset(Default::default()),
            Opcode::SetLogBuffer => Command::SetLogBuffer(Default::default()),
            Opcode::ChangeGangPriority => Command::ChangeGangPriority(Default::default()),
            Opcode::QuerySchedulerStatus => Command::QuerySchedulerStatus(Default::default()),
            Opcode::SetDebugVmid => Command::SetDebugVmid(Default::default()),
            Opcode::Misc => Command::Misc(Default::default()),
            Opcode::UpdateRootPageTable => Command::UpdateRootPageTable(Default::default()),
            Opcode::AmdLog => Command::AmdLog(Default::default()),
            Opcode::SetSeMode => Command::SetSeMode(Default::default()),
            Opcode::SetGangSubmit => Command::SetGangSubmit(Default::default()),
            Opcode::SetHwResources1 => Command::SetHwResources1(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_has_a_default_payload() {
        for op in Opcode::ALL {
            let cmd = Command::default_for(op);
            assert_eq!(cmd.opcode(), Some(op));
            assert_eq!(cmd.raw_opcode(), op.raw());
            assert_eq!(cmd.api_status(), Some(&ApiStatus::default()));
        }
    }

    #[test]
    fn gang_priority_opcodes_share_a_payload() {
        let payload = ChangeGangPriority {
            gang_context_addr: 0x4000,
            gang_global_priority_level: PriorityLevel::High,
            ..Default::default()
        };
        let set = Command::SetGangPriorityLevel(payload.clone());
        let change = Command::ChangeGangPriority(payload);
        assert_ne!(set.raw_opcode(), change.raw_opcode());
    }

    #[test]
    fn suspend_shared_word_meaning_depends_on_version() {
        let suspend = Suspend {
            sch_id: 3,
            ..Default::default()
        };
        assert_eq!(suspend.sch_id_for(ApiVersion(0x12)), Some(3));
        assert_eq!(suspend.return_value_for(ApiVersion(0x12)), None);
        assert_eq!(suspend.return_value_for(ApiVersion(0x11)), Some(3));
        assert_eq!(suspend.sch_id_for(ApiVersion(0x11)), None);
    }

    #[test]
    fn unrecognized_commands_have_no_status() {
        let mut cmd = Command::Unrecognized {
            opcode: 12,
            dwords: vec![1, 2],
        };
        assert_eq!(cmd.raw_opcode(), 12);
        assert!(cmd.api_status_mut().is_none());
        cmd.set_timestamp(5);
        assert_eq!(cmd.opcode(), None);
    }

    #[test]
    fn timestamp_is_stamped_into_payload() {
        let mut cmd = Command::default_for(Opcode::Resume);
        cmd.set_timestamp(0x1234);
        match cmd {
            Command::Resume(resume) => assert_eq!(resume.timestamp, 0x1234),
            other => panic!("unexpected {other:?}"),
        }
    }
}
