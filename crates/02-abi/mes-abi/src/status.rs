//! Completion status and the firmware error word.
//!
//! On success the firmware stores the expected fence value. On failure the low
//! 32 bits are zero and the high 32 bits carry:
//!
//! ```text
//!  31  30..24    23..16    15..8    7..0
//! [E][category][misc op][opcode][api error]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fence address and value the firmware writes on completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApiStatus {
    pub fence_addr: u64,
    pub fence_value: u64,
}

impl ApiStatus {
    pub const fn new(fence_addr: u64, fence_value: u64) -> Self {
        Self {
            fence_addr,
            fence_value,
        }
    }

    /// No completion was requested.
    pub const fn is_null(&self) -> bool {
        self.fence_addr == 0
    }
}

/// Error category of a failed command (7 bits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Api,
    Scheduling,
    Unknown,
    /// Any category value the interface does not name.
    Other(u8),
}

impl ErrorCategory {
    pub const MASK: u8 = 0x7F;

    pub const fn from_raw(raw: u8) -> Self {
        match raw & Self::MASK {
            1 => ErrorCategory::Api,
            2 => ErrorCategory::Scheduling,
            3 => ErrorCategory::Unknown,
            other => ErrorCategory::Other(other),
        }
    }

    pub const fn raw(self) -> u8 {
        match self {
            ErrorCategory::Api => 1,
            ErrorCategory::Scheduling => 2,
            ErrorCategory::Unknown => 3,
            ErrorCategory::Other(raw) => raw & Self::MASK,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Api => f.write_str("api"),
            ErrorCategory::Scheduling => f.write_str("scheduling"),
            ErrorCategory::Unknown => f.write_str("unknown"),
            ErrorCategory::Other(raw) => write!(f, "category {raw}"),
        }
    }
}

const OPCODE_SHIFT: u32 = 8;
const MISC_OP_SHIFT: u32 = 16;
const CATEGORY_SHIFT: u32 = 24;
const ERROR_BIT: u32 = 1 << 31;

/// Decoded firmware error word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode {
    pub api_error: u8,
    pub opcode: u8,
    pub misc_op: u8,
    pub category: ErrorCategory,
}

impl ErrorCode {
    /// Bit 63 of a completion value flags an error word.
    pub const FENCE_ERROR_BIT: u64 = 1 << 63;

    pub const fn new(category: ErrorCategory, opcode: u8, misc_op: u8, api_error: u8) -> Self {
        Self {
            api_error,
            opcode,
            misc_op,
            category,
        }
    }

    /// The 32-bit word, error-present bit included.
    pub const fn to_u32(self) -> u32 {
        self.api_error as u32
            | (self.opcode as u32) << OPCODE_SHIFT
            | (self.misc_op as u32) << MISC_OP_SHIFT
            | (self.category.raw() as u32) << CATEGORY_SHIFT
            | ERROR_BIT
    }

    /// Parses a 32-bit word; `None` when the error-present bit is clear.
    pub const fn from_u32(word: u32) -> Option<Self> {
        if word & ERROR_BIT == 0 {
            return None;
        }
        Some(Self {
            api_error: word as u8,
            opcode: (word >> OPCODE_SHIFT) as u8,
            misc_op: (word >> MISC_OP_SHIFT) as u8,
            category: ErrorCategory::from_raw((word >> CATEGORY_SHIFT) as u8),
        })
    }

    /// Completion value the firmware writes for this error.
    pub const fn to_fence_value(self) -> u64 {
        (self.to_u32() as u64) << 32
    }

    /// Decodes a completion value; `None` unless bit 63 is set.
    pub const fn from_fence_value(value: u64) -> Option<Self> {
        Self::from_u32((value >> 32) as u32)
    }

    /// True for values carrying an error word.
    pub const fn is_error_value(value: u64) -> bool {
        value & Self::FENCE_ERROR_BIT != 0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error {:#04x} on opcode {}",
            self.category, self.api_error, self.opcode
        )?;
        if self.misc_op != 0 {
            write!(f, " (misc op {})", self.misc_op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn matches_firmware_macro() {
        let code = ErrorCode::new(ErrorCategory::Scheduling, 2, 0, 0x11);
        assert_eq!(code.to_fence_value(), 0x8200_0211_0000_0000);
        assert_eq!(ErrorCode::from_fence_value(0x8200_0211_0000_0000), Some(code));
    }

    #[test]
    fn success_values_are_not_errors() {
        assert_eq!(ErrorCode::from_fence_value(1), None);
        assert_eq!(ErrorCode::from_fence_value(0x7FFF_FFFF_FFFF_FFFF), None);
        assert!(!ErrorCode::is_error_value(42));
    }

    #[test]
    fn unnamed_categories_are_kept_apart() {
        let code = ErrorCode::from_fence_value(0x8500_0000_0000_0000).expect("error bit");
        assert_eq!(code.category, ErrorCategory::Other(5));
        assert_ne!(code.category, ErrorCategory::Unknown);
    }

    fn category() -> impl Strategy<Value = ErrorCategory> {
        (0u8..=0x7F).prop_map(ErrorCategory::from_raw)
    }

    proptest! {
        #[test]
        fn error_word_round_trips(cat in category(), opcode: u8, misc_op: u8, api_error: u8) {
            let code = ErrorCode::new(cat, opcode, misc_op, api_error);
            let value = code.to_fence_value();
            prop_assert_eq!(value & 0xFFFF_FFFF, 0);
            prop_assert!(ErrorCode::is_error_value(value));
            prop_assert_eq!(ErrorCode::from_fence_value(value), Some(code));
        }
    }
}
