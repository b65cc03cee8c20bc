use crate::version::ApiVersion;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler API opcodes.
///
/// Value 12 is unassigned; unknown values decode as unrecognized commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    SetHwResources = 0,
    SetSchedulingConfig = 1,
    AddQueue = 2,
    RemoveQueue = 3,
    PerformYield = 4,
    SetGangPriorityLevel = 5,
    Suspend = 6,
    Resume = 7,
    Reset = 8,
    SetLogBuffer = 9,
    ChangeGangPriority = 10,
    QuerySchedulerStatus = 11,
    SetDebugVmid = 13,
    Misc = 14,
    UpdateRootPageTable = 15,
    AmdLog = 16,
    SetSeMode = 17,
    SetGangSubmit = 18,
    SetHwResources1 = 19,
}

impl Opcode {
    pub const ALL: [Opcode; 19] = [
        Opcode::SetHwResources,
        Opcode::SetSchedulingConfig,
        Opcode::AddQueue,
        Opcode::RemoveQueue,
        Opcode::PerformYield,
        Opcode::SetGangPriorityLevel,
        Opcode::Suspend,
        Opcode::Resume,
        Opcode::Reset,
        Opcode::SetLogBuffer,
        Opcode::ChangeGangPriority,
        Opcode::QuerySchedulerStatus,
        Opcode::SetDebugVmid,
        Opcode::Misc,
        Opcode::UpdateRootPageTable,
        Opcode::AmdLog,
        Opcode::SetSeMode,
        Opcode::SetGangSubmit,
        Opcode::SetHwResources1,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.raw() == raw)
    }

    pub const fn raw(self) -> u8 {
        self as u8
    }

    /// Oldest interface revision that understands this opcode.
    pub const fn min_version(self) -> ApiVersion {
        match self {
            Opcode::AmdLog => ApiVersion::AMD_LOG,
            Opcode::SetSeMode => ApiVersion::SE_MODE,
            Opcode::SetGangSubmit => ApiVersion::GANG_SUBMIT,
            Opcode::SetHwResources1 => ApiVersion::HW_RESOURCES_1,
            _ => ApiVersion(0),
        }
    }

    pub fn is_available(self, version: ApiVersion) -> bool {
        version.supports(self.min_version())
    }

    pub const fn name(self) -> &'static str {
        match self {
            Opcode::SetHwResources => "SET_HW_RSRC",
            Opcode::SetSchedulingConfig => "SET_SCHEDULING_CONFIG",
            Opcode::AddQueue => "ADD_QUEUE",
            Opcode::RemoveQueue => "REMOVE_QUEUE",
            Opcode::PerformYield => "PERFORM_YIELD",
            Opcode::SetGangPriorityLevel => "SET_GANG_PRIORITY_LEVEL",
            Opcode::Suspend => "SUSPEND",
            Opcode::Resume => "RESUME",
            Opcode::Reset => "RESET",
            Opcode::SetLogBuffer => "SET_LOG_BUFFER",
            Opcode::ChangeGangPriority => "CHANGE_GANG_PRIORITY",
            Opcode::QuerySchedulerStatus => "QUERY_SCHEDULER_STATUS",
            Opcode::SetDebugVmid => "SET_DEBUG_VMID",
            Opcode::Misc => "MISC",
            Opcode::UpdateRootPageTable => "UPDATE_ROOT_PAGE_TABLE",
            Opcode::AmdLog => "AMD_LOG",
            Opcode::SetSeMode => "SET_SE_MODE",
            Opcode::SetGangSubmit => "SET_GANG_SUBMIT",
            Opcode::SetHwResources1 => "SET_HW_RSRC_1",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
