//! Firmware side of the event log ring.

use crate::error::{SimError, SimResult};
use mes_abi::{LogEntryRecord, LogEvent, LogHeader, LOG_ENTRY_BYTES, LOG_HEADER_BYTES};
use mes_transport::LogRegion;
use std::sync::Arc;

/// Appends entries to a [`LogRegion`], keeping the header's free index and
/// wraparound count current after every write.
pub struct EventLogWriter {
    region: Arc<LogRegion>,
    capacity: u32,
    first_free: u32,
    wraparound: u32,
}

impl EventLogWriter {
    /// Formats `region` as an empty log of `entries` slots.
    pub fn new(region: Arc<LogRegion>, entries: u32) -> SimResult<Self> {
        let needed = (entries as usize)
            .checked_mul(LOG_ENTRY_BYTES)
            .and_then(|bytes| bytes.checked_add(LOG_HEADER_BYTES));
        if entries == 0 || needed.map_or(true, |needed| needed > region.len()) {
            return Err(SimError::LogTooSmall {
                len: region.len(),
                entries,
            });
        }
        let writer = Self {
            region,
            capacity: entries,
            first_free: 0,
            wraparound: 0,
        };
        writer.write_header()?;
        Ok(writer)
    }

    /// Bytes a buffer of `entries` slots occupies.
    pub fn buffer_len(entries: u32) -> usize {
        LOG_HEADER_BYTES + entries as usize * LOG_ENTRY_BYTES
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn region(&self) -> &Arc<LogRegion> {
        &self.region
    }

    pub fn append(&mut self, gpu_time_stamp: u64, event: &LogEvent) -> SimResult<()> {
        let record = LogEntryRecord::from_event(gpu_time_stamp, event);
        self.append_raw(&record)
    }

    /// Writes a record verbatim, malformed tags included.
    pub fn append_raw(&mut self, record: &LogEntryRecord) -> SimResult<()> {
        let offset = LOG_HEADER_BYTES + self.first_free as usize * LOG_ENTRY_BYTES;
        self.region.write(offset, &record.to_bytes())?;
        self.first_free += 1;
        if self.first_free == self.capacity {
            self.first_free = 0;
            self.wraparound = self.wraparound.wrapping_add(1);
        }
        self.write_header()
    }

    fn write_header(&self) -> SimResult<()> {
        let header = LogHeader {
            first_free_entry_index: self.first_free,
            wraparound_count: self.wraparound,
            number_of_entries: u64::from(self.capacity),
            reserved: [0; 2],
        };
        self.region.write(0, &header.to_bytes())?;
        Ok(())
    }
}
