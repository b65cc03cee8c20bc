//! Wire form of a frame and the sequential field writer/reader.
//!
//! Fields are packed back to back in declaration order, little-endian, with
//! no padding. 64-bit values occupy two consecutive dwords, low word first.

use crate::error::{DecodeError, EncodeError};
use mes_abi::{
    AbiError, ApiHeader, ApiStatus, ApiType, ApiVersion, Opcode, API_FRAME_SIZE_IN_BYTES,
    API_FRAME_SIZE_IN_DWORDS,
};
use std::fmt;

/// One 64-dword command frame.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame([u32; API_FRAME_SIZE_IN_DWORDS]);

impl Frame {
    pub const fn from_words(words: [u32; API_FRAME_SIZE_IN_DWORDS]) -> Self {
        Self(words)
    }

    pub fn words(&self) -> &[u32; API_FRAME_SIZE_IN_DWORDS] {
        &self.0
    }

    pub fn into_words(self) -> [u32; API_FRAME_SIZE_IN_DWORDS] {
        self.0
    }

    pub fn header(&self) -> ApiHeader {
        ApiHeader::from_bits(self.0[0])
    }

    /// Parses the 256-byte little-endian wire form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != API_FRAME_SIZE_IN_BYTES {
            return Err(DecodeError::InvalidLength { len: bytes.len() });
        }
        let mut words = [0u32; API_FRAME_SIZE_IN_DWORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(Self(words))
    }

    pub fn to_bytes(&self) -> [u8; API_FRAME_SIZE_IN_BYTES] {
        let mut out = [0u8; API_FRAME_SIZE_IN_BYTES];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.0.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self([0; API_FRAME_SIZE_IN_DWORDS])
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        let used = usize::from(header.dwsize()).min(API_FRAME_SIZE_IN_DWORDS);
        let payload: &[u32] = if used > 1 { &self.0[1..used] } else { &[] };
        f.debug_struct("Frame")
            .field("opcode", &header.opcode())
            .field("dwsize", &header.dwsize())
            .field("payload", &payload)
            .finish()
    }
}

/// Appends fields to a frame after the header word.
pub(crate) struct FrameWriter {
    words: [u32; API_FRAME_SIZE_IN_DWORDS],
    pos: usize,
    opcode: u8,
    version: ApiVersion,
    status_offset: Option<usize>,
}

impl FrameWriter {
    pub(crate) fn new(opcode: u8, version: ApiVersion) -> Self {
        Self {
            words: [0; API_FRAME_SIZE_IN_DWORDS],
            pos: 1,
            opcode,
            version,
            status_offset: None,
        }
    }

    pub(crate) fn u32(&mut self, value: u32) -> Result<(), EncodeError> {
        let slot = self
            .words
            .get_mut(self.pos)
            .ok_or(EncodeError::FrameOverflow {
                opcode: self.opcode,
            })?;
        *slot = value;
        self.pos += 1;
        Ok(())
    }

    pub(crate) fn u64(&mut self, value: u64) -> Result<(), EncodeError> {
        self.u32(value as u32)?;
        self.u32((value >> 32) as u32)
    }

    pub(crate) fn u32s(&mut self, values: &[u32]) -> Result<(), EncodeError> {
        values.iter().try_for_each(|v| self.u32(*v))
    }

    pub(crate) fn u64s(&mut self, values: &[u64]) -> Result<(), EncodeError> {
        values.iter().try_for_each(|v| self.u64(*v))
    }

    /// Writes the completion status and remembers where it went.
    pub(crate) fn status(&mut self, status: &ApiStatus) -> Result<(), EncodeError> {
        self.status_offset = Some(self.pos * 4);
        self.u64(status.fence_addr)?;
        self.u64(status.fence_value)
    }

    /// Writes a field introduced in `since`; older versions must leave it zero.
    pub(crate) fn gated_u32(
        &mut self,
        field: &'static str,
        value: u32,
        since: ApiVersion,
    ) -> Result<(), EncodeError> {
        if self.version.supports(since) {
            self.u32(value)
        } else if value != 0 {
            Err(EncodeError::FieldUnavailable {
                field,
                version: self.version,
            })
        } else {
            Ok(())
        }
    }

    /// Runs `body` inside a fixed-width union, zero-filling what it leaves.
    pub(crate) fn union(
        &mut self,
        width: usize,
        body: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        let end = self.pos + width;
        body(self)?;
        if self.pos > end || end > API_FRAME_SIZE_IN_DWORDS {
            return Err(EncodeError::FrameOverflow {
                opcode: self.opcode,
            });
        }
        self.pos = end;
        Ok(())
    }

    /// Seals the frame, returning it with the byte offset of its status.
    pub(crate) fn finish(mut self) -> (Frame, Option<usize>) {
        self.words[0] = ApiHeader::new(ApiType::Scheduler, self.opcode, self.pos as u8).bits();
        (Frame(self.words), self.status_offset)
    }
}

/// Reads fields of one frame payload, never past the declared size.
pub(crate) struct FrameReader<'a> {
    words: &'a [u32; API_FRAME_SIZE_IN_DWORDS],
    pos: usize,
    end: usize,
    opcode: Opcode,
    version: ApiVersion,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(frame: &'a Frame, opcode: Opcode, version: ApiVersion) -> Self {
        Self {
            words: &frame.0,
            pos: 1,
            end: usize::from(frame.header().dwsize()),
            opcode,
            version,
        }
    }

    fn invalid(&self, source: AbiError) -> DecodeError {
        DecodeError::InvalidField {
            opcode: self.opcode,
            source,
        }
    }

    pub(crate) fn u32(&mut self) -> Result<u32, DecodeError> {
        if self.pos >= self.end {
            return Err(DecodeError::SizeMismatch {
                opcode: self.opcode,
                declared: self.end as u8,
                expected: self.pos as u8 + 1,
            });
        }
        let value = self.words[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Reads a word that may not exceed `max`.
    pub(crate) fn bounded_u32(&mut self, field: &'static str, max: u32) -> Result<u32, DecodeError> {
        let value = self.u32()?;
        if value > max {
            return Err(self.invalid(AbiError::OutOfRange {
                field,
                value: u64::from(value),
                max: u64::from(max),
            }));
        }
        Ok(value)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, DecodeError> {
        let lo = self.u32()?;
        let hi = self.u32()?;
        Ok(u64::from(lo) | (u64::from(hi) << 32))
    }

    pub(crate) fn u32s<const N: usize>(&mut self) -> Result<[u32; N], DecodeError> {
        let mut out = [0u32; N];
        for slot in out.iter_mut() {
            *slot = self.u32()?;
        }
        Ok(out)
    }

    pub(crate) fn u64s<const N: usize>(&mut self) -> Result<[u64; N], DecodeError> {
        let mut out = [0u64; N];
        for slot in out.iter_mut() {
            *slot = self.u64()?;
        }
        Ok(out)
    }

    /// Reads a 32-bit enumeration word.
    pub(crate) fn value<T>(&mut self) -> Result<T, DecodeError>
    where
        T: TryFrom<u32, Error = AbiError>,
    {
        let raw = self.u32()?;
        T::try_from(raw).map_err(|err| self.invalid(err))
    }

    pub(crate) fn status(&mut self) -> Result<ApiStatus, DecodeError> {
        Ok(ApiStatus::new(self.u64()?, self.u64()?))
    }

    /// Reads a field introduced in `since`, zero for older versions.
    pub(crate) fn gated_u32(&mut self, since: ApiVersion) -> Result<u32, DecodeError> {
        if self.version.supports(since) {
            self.u32()
        } else {
            Ok(0)
        }
    }

    /// Runs `body` over a fixed-width union; words it does not consume must be zero.
    pub(crate) fn union<T>(
        &mut self,
        width: usize,
        body: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<T, DecodeError> {
        let end = self.pos + width;
        let value = body(self)?;
        if self.pos > end || end > self.end {
            return Err(DecodeError::SizeMismatch {
                opcode: self.opcode,
                declared: self.end as u8,
                expected: end as u8,
            });
        }
        if let Some(offset) = self.words[self.pos..end].iter().position(|w| *w != 0) {
            return Err(DecodeError::ReservedNotZero {
                word: self.pos + offset,
            });
        }
        self.pos = end;
        Ok(value)
    }

    /// Raw words of a union whose variant is unknown.
    pub(crate) fn raw<const N: usize>(&mut self) -> Result<[u32; N], DecodeError> {
        self.u32s::<N>()
    }

    /// Fails unless the payload consumed exactly the declared size.
    pub(crate) fn finish(self) -> Result<(), DecodeError> {
        if self.pos != self.end {
            return Err(DecodeError::SizeMismatch {
                opcode: self.opcode,
                declared: self.end as u8,
                expected: self.pos as u8,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_little_endian() {
        let mut words = [0u32; API_FRAME_SIZE_IN_DWORDS];
        words[0] = 0x0000_8041;
        words[63] = 0xAABB_CCDD;
        let frame = Frame::from_words(words);
        let bytes = frame.to_bytes();
        assert_eq!(&bytes[0..4], &[0x41, 0x80, 0, 0]);
        assert_eq!(&bytes[252..], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(Frame::from_bytes(&bytes), Ok(frame));
        assert_eq!(
            Frame::from_bytes(&bytes[..100]),
            Err(DecodeError::InvalidLength { len: 100 })
        );
    }

    #[test]
    fn writer_packs_without_padding() {
        let mut writer = FrameWriter::new(4, ApiVersion::CURRENT);
        writer.u32(7).expect("u32");
        writer.status(&ApiStatus::new(0x1_0000_2000, 9)).expect("status");
        writer.u64(0xDEAD_BEEF_0000_0001).expect("u64");
        let (frame, status_offset) = writer.finish();
        assert_eq!(status_offset, Some(8));
        assert_eq!(&frame.words()[..8], &[0x8041, 7, 0x2000, 1, 9, 0, 1, 0xDEAD_BEEF]);
    }

    #[test]
    fn writer_rejects_overflow() {
        let mut writer = FrameWriter::new(0, ApiVersion::CURRENT);
        for _ in 0..63 {
            writer.u32(1).expect("fits");
        }
        assert_eq!(writer.u32(1), Err(EncodeError::FrameOverflow { opcode: 0 }));
    }

    #[test]
    fn gated_fields_are_dropped_or_rejected() {
        let mut writer = FrameWriter::new(2, ApiVersion(0x13));
        writer
            .gated_u32("alignment_mode_setting", 0, ApiVersion(0x14))
            .expect("zero is omitted");
        assert_eq!(
            writer.gated_u32("alignment_mode_setting", 1, ApiVersion(0x14)),
            Err(EncodeError::FieldUnavailable {
                field: "alignment_mode_setting",
                version: ApiVersion(0x13)
            })
        );
        let (frame, _) = writer.finish();
        assert_eq!(frame.header().dwsize(), 1);
    }
}
