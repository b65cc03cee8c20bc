//! Enumerations carried as 32-bit words on the wire.

use crate::error::AbiError;
use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident : $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn raw(self) -> u32 {
                self as u32
            }

            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Name used in diagnostics.
            pub const fn kind() -> &'static str {
                $kind
            }
        }
    };
}

macro_rules! generic_try_from {
    ($($name:ident),+ $(,)?) => {
        $(
            impl TryFrom<u32> for $name {
                type Error = AbiError;

                fn try_from(raw: u32) -> Result<Self, AbiError> {
                    $name::from_raw(raw).ok_or(AbiError::InvalidEnum {
                        kind: $name::kind(),
                        value: raw,
                    })
                }
            }
        )+
    };
}

wire_enum! {
    /// Global priority bands, lowest first.
    #[derive(PartialOrd, Ord, Default)]
    pub enum PriorityLevel: "priority level" {
        Low = 0,
        #[default]
        Normal = 1,
        Medium = 2,
        High = 3,
        Realtime = 4,
    }
}

impl PriorityLevel {
    /// Position of the band in a [`PriorityBands`](crate::PriorityBands) array.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for PriorityLevel {
    type Error = AbiError;

    fn try_from(raw: u32) -> Result<Self, AbiError> {
        PriorityLevel::from_raw(raw).ok_or(AbiError::InvalidPriorityLevel(raw))
    }
}

wire_enum! {
    /// Engine a queue feeds.
    #[derive(Default)]
    pub enum QueueType: "queue type" {
        #[default]
        Gfx = 0,
        Compute = 1,
        Sdma = 2,
        /// Scheduler-internal queue.
        Schq = 3,
    }
}

impl TryFrom<u32> for QueueType {
    type Error = AbiError;

    fn try_from(raw: u32) -> Result<Self, AbiError> {
        QueueType::from_raw(raw).ok_or(AbiError::InvalidQueueType(raw))
    }
}

wire_enum! {
    /// Operation requested through SET_DEBUG_VMID.
    #[derive(Default)]
    pub enum DebugVmidOp: "debug vmid operation" {
        #[default]
        Program = 0,
        Allocate = 1,
        Release = 2,
        /// Sets up the debug vmid page table for kernel queues.
        VmSetup = 3,
    }
}

wire_enum! {
    /// Context state recorded in the firmware event log.
    pub enum ContextState: "context state" {
        Idle = 0,
        Running = 1,
        Ready = 2,
        ReadyStandby = 3,
        Invalid = 0xF,
    }
}

wire_enum! {
    /// Event log operation tags.
    pub enum LogOperation: "log operation" {
        ContextStateChange = 0,
        QueueNewWork = 1,
        QueueUnwaitSyncObject = 2,
        QueueNoMoreWork = 3,
        QueueWaitSyncObject = 4,
        Invalid = 0xF,
    }
}

wire_enum! {
    /// Sub-opcodes of QUERY_SCHEDULER_STATUS.
    pub enum QueryOpcode: "query sub-opcode" {
        GetCtxArraySize = 0,
        CheckHealthy = 1,
    }
}

wire_enum! {
    /// Sub-opcodes of MISC.
    pub enum MiscOpcode: "misc sub-opcode" {
        WriteReg = 0,
        InvGart = 1,
        QueryStatus = 2,
        ReadReg = 3,
        WaitRegMem = 4,
        SetShaderDebugger = 5,
        NotifyWorkOnUnmappedQueue = 6,
        NotifyToUnmapProcesses = 7,
        QueryHungEngineId = 8,
        ChangeConfig = 9,
        LaunchCleanerShader = 10,
        SetupMesDbgext = 11,
    }
}

wire_enum! {
    /// Operation of MISC/WAIT_REG_MEM.
    #[derive(Default)]
    pub enum WrmOperation: "wait-reg-mem operation" {
        #[default]
        WaitRegMem = 0,
        WriteWaitWriteReg = 1,
    }
}

wire_enum! {
    /// Option selected by MISC/CHANGE_CONFIG.
    #[derive(Default)]
    pub enum ChangeConfigOption: "change-config option" {
        #[default]
        LimitSingleProcess = 0,
        EnableHwsLoggingBuffer = 1,
        ChangeTdrConfig = 2,
    }
}

wire_enum! {
    /// Shader engine mode applied through SET_SE_MODE.
    #[derive(Default)]
    pub enum SeMode: "se mode" {
        #[default]
        Invalid = 0,
        SingleSe = 1,
        DualSe = 2,
        LowerPower = 3,
    }
}

generic_try_from!(
    DebugVmidOp,
    ContextState,
    LogOperation,
    QueryOpcode,
    MiscOpcode,
    WrmOperation,
    ChangeConfigOption,
    SeMode,
);
