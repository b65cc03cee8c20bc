use crate::consts::MES_API_VERSION;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware interface revision a frame is encoded for.
///
/// Later revisions add opcodes and append fields to existing payloads; a codec
/// configured for an older revision omits both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiVersion(pub u32);

impl ApiVersion {
    pub const CURRENT: ApiVersion = ApiVersion(MES_API_VERSION);

    /// AMD_LOG became available.
    pub const AMD_LOG: ApiVersion = ApiVersion(0x10);
    /// SET_SE_MODE became available; SUSPEND's shared word turned into `sch_id`.
    pub const SE_MODE: ApiVersion = ApiVersion(0x12);
    /// SET_GANG_SUBMIT and RESET's connected queue indices.
    pub const GANG_SUBMIT: ApiVersion = ApiVersion(0x13);
    /// SET_HW_RSRC_1 and the `alignment_mode_setting` words.
    pub const HW_RESOURCES_1: ApiVersion = ApiVersion(0x14);

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// True when this revision is at least `min`.
    pub fn supports(self, min: ApiVersion) -> bool {
        self >= min
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
