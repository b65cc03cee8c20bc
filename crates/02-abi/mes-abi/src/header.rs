//! The first word of every frame.
//!
//! Bits `[3:0]` type, `[11:4]` opcode, `[19:12]` size in dwords (header
//! included), `[31:20]` reserved.

use serde::{Deserialize, Serialize};

const TYPE_MASK: u32 = 0xF;
const OPCODE_SHIFT: u32 = 4;
const OPCODE_MASK: u32 = 0xFF;
const DWSIZE_SHIFT: u32 = 12;
const DWSIZE_MASK: u32 = 0xFF;
const RESERVED_SHIFT: u32 = 20;

/// API family a frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApiType {
    Scheduler = 1,
}

impl ApiType {
    pub const fn raw(self) -> u8 {
        self as u8
    }
}

/// Packed frame header word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiHeader(pub u32);

impl ApiHeader {
    /// Builds a header; `opcode` and `dwsize` are truncated to 8 bits.
    pub const fn new(ty: ApiType, opcode: u8, dwsize: u8) -> Self {
        Self(
            (ty as u32 & TYPE_MASK)
                | ((opcode as u32 & OPCODE_MASK) << OPCODE_SHIFT)
                | ((dwsize as u32 & DWSIZE_MASK) << DWSIZE_SHIFT),
        )
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn api_type(self) -> u8 {
        (self.0 & TYPE_MASK) as u8
    }

    pub const fn opcode(self) -> u8 {
        ((self.0 >> OPCODE_SHIFT) & OPCODE_MASK) as u8
    }

    pub const fn dwsize(self) -> u8 {
        ((self.0 >> DWSIZE_SHIFT) & DWSIZE_MASK) as u8
    }

    pub const fn reserved(self) -> u32 {
        self.0 >> RESERVED_SHIFT
    }
}
