//! Memory the firmware appends its event log into.
//!
//! The host never interprets the bytes here; it takes a [`LogRegion::snapshot`]
//! and hands it to the log reader.

use crate::region::SharedRegion;
use crate::{TransportError, TransportResult};
use parking_lot::Mutex;

const LOG_ALIGNMENT: usize = 64;

/// Fixed-size byte buffer shared between firmware (writer) and host (reader).
pub struct LogRegion {
    region: Mutex<SharedRegion>,
    len: usize,
}

impl LogRegion {
    /// Allocates a zeroed log buffer of `len` bytes.
    pub fn new(len: usize) -> TransportResult<Self> {
        let region = SharedRegion::zeroed(len, LOG_ALIGNMENT)?;
        Ok(Self {
            region: Mutex::new(region),
            len,
        })
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `bytes` into the buffer at `offset`.
    pub fn write(&self, offset: usize, bytes: &[u8]) -> TransportResult<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= self.len)
            .ok_or(TransportError::InvalidCapacity {
                requested: offset.saturating_add(bytes.len()),
                minimum: self.len,
            })?;
        let mut region = self.region.lock();
        region.as_mut_slice()[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Consistent copy of the whole buffer.
    pub fn snapshot(&self) -> Vec<u8> {
        self.region.lock().as_slice().to_vec()
    }
}
