//! Reader for the firmware event log.
//!
//! The firmware appends to the buffer without any host-visible lock, so the
//! reader works on a private copy taken once ([`LogSnapshot::parse`]) and
//! interprets entries lazily from that copy.
//!
//! Chronology: while `wraparound_count` is zero only `0..first_free` holds
//! entries. After a wrap, `first_free..capacity` holds the previous
//! generation (oldest first) and `0..first_free` the current one.

use crate::error::LogError;
use mes_abi::{LogEntryRecord, LogEvent, LogHeader, LOG_ENTRY_BYTES, LOG_HEADER_BYTES};
use serde::Serialize;
use std::ops::Range;

/// One decoded log entry with its position in the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Wraparound generation the entry was written in.
    pub generation: u32,
    /// Slot index inside the entry array.
    pub index: u32,
    pub gpu_time_stamp: u64,
    pub event: LogEvent,
}

impl LogEntry {
    /// Total order key; larger means newer.
    pub fn key(&self) -> (u32, u32) {
        (self.generation, self.index)
    }
}

/// Private copy of a log buffer.
#[derive(Clone, Debug)]
pub struct LogSnapshot {
    header: LogHeader,
    capacity: u32,
    first_free: u32,
    wraparound: u32,
    entries: Vec<u8>,
}

impl LogSnapshot {
    /// Copies `bytes` (header plus entry array) and normalises the header.
    pub fn parse(bytes: &[u8]) -> Result<Self, LogError> {
        let Some((head, rest)) = bytes.split_first_chunk::<LOG_HEADER_BYTES>() else {
            return Err(LogError::TooShort { len: bytes.len() });
        };
        let header = LogHeader::read(head);

        let fits = (rest.len() / LOG_ENTRY_BYTES) as u64;
        let declared = header.number_of_entries;
        if declared > fits {
            tracing::warn!(declared, fits, "log header claims more entries than the buffer holds");
        }
        let capacity = u32::try_from(declared.min(fits)).unwrap_or(u32::MAX);

        let (first_free, wraparound) = if capacity == 0 {
            (0, 0)
        } else {
            let extra = header.first_free_entry_index / capacity;
            if extra > 0 {
                tracing::debug!(
                    first_free = header.first_free_entry_index,
                    capacity,
                    "first free index past capacity, folding into wraparound count"
                );
            }
            (
                header.first_free_entry_index % capacity,
                header.wraparound_count.saturating_add(extra),
            )
        };

        let used = capacity as usize * LOG_ENTRY_BYTES;
        Ok(Self {
            header,
            capacity,
            first_free,
            wraparound,
            entries: rest[..used].to_vec(),
        })
    }

    /// Header as found in the buffer.
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    /// Number of entry slots considered.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Next slot the firmware writes, after folding an out-of-range index.
    pub fn first_free(&self) -> u32 {
        self.first_free
    }

    /// Generation of the newest entries, after folding.
    pub fn wraparound(&self) -> u32 {
        self.wraparound
    }

    /// Number of live entries the reader will yield.
    pub fn len(&self) -> usize {
        if self.wraparound == 0 {
            self.first_free as usize
        } else {
            self.capacity as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest-to-newest iterator. Each call starts over.
    pub fn entries(&self) -> LogIter<'_> {
        let mut passes = Vec::with_capacity(2);
        if self.wraparound > 0 {
            passes.push((self.first_free..self.capacity, self.wraparound - 1));
        }
        passes.push((0..self.first_free, self.wraparound));
        passes.reverse();
        LogIter {
            snapshot: self,
            passes,
            current: None,
        }
    }

    /// Entries strictly newer than `key`, for resuming a previous read.
    pub fn entries_after(&self, key: (u32, u32)) -> impl Iterator<Item = LogEntry> + '_ {
        self.entries().filter(move |entry| entry.key() > key)
    }

    fn record(&self, index: u32) -> LogEntryRecord {
        let start = index as usize * LOG_ENTRY_BYTES;
        let mut raw = [0u8; LOG_ENTRY_BYTES];
        raw.copy_from_slice(&self.entries[start..start + LOG_ENTRY_BYTES]);
        LogEntryRecord::read(&raw)
    }
}

/// Lazy iterator over a [`LogSnapshot`].
pub struct LogIter<'a> {
    snapshot: &'a LogSnapshot,
    /// Remaining passes, last element first.
    passes: Vec<(Range<u32>, u32)>,
    current: Option<(Range<u32>, u32)>,
}

impl Iterator for LogIter<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        loop {
            if let Some((range, generation)) = self.current.as_mut() {
                if let Some(index) = range.next() {
                    let record = self.snapshot.record(index);
                    let event = record.event();
                    if let LogEvent::Unknown { operation_type, .. } = event {
                        tracing::debug!(index, operation_type, "undecodable log entry");
                    }
                    return Some(LogEntry {
                        generation: *generation,
                        index,
                        gpu_time_stamp: record.gpu_time_stamp,
                        event,
                    });
                }
            }
            self.current = Some(self.passes.pop()?);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mes_abi::ContextState;

    fn buffer(header: LogHeader, capacity: usize, tag: impl Fn(usize) -> LogEvent) -> Vec<u8> {
        let mut bytes = header.to_bytes().to_vec();
        for index in 0..capacity {
            let record = LogEntryRecord::from_event(index as u64 * 10, &tag(index));
            bytes.extend_from_slice(&record.to_bytes());
        }
        bytes
    }

    fn header(first_free: u32, wrap: u32, entries: u64) -> LogHeader {
        LogHeader {
            first_free_entry_index: first_free,
            wraparound_count: wrap,
            number_of_entries: entries,
            reserved: [0; 2],
        }
    }

    fn new_work(index: usize) -> LogEvent {
        LogEvent::QueueNewWork {
            h_queue: index as u64,
        }
    }

    #[test]
    fn reconstructs_order_across_wrap() {
        let bytes = buffer(header(5, 2, 10), 10, new_work);
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        let keys: Vec<_> = snapshot.entries().map(|e| e.key()).collect();
        let mut expected: Vec<_> = (5..10).map(|i| (1, i)).collect();
        expected.extend((0..5).map(|i| (2, i)));
        assert_eq!(keys, expected);
        assert_eq!(snapshot.len(), 10);
    }

    #[test]
    fn unwrapped_buffer_reads_prefix() {
        let bytes = buffer(header(3, 0, 8), 8, new_work);
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        let handles: Vec<_> = snapshot
            .entries()
            .filter_map(|e| e.event.h_queue())
            .collect();
        assert_eq!(handles, vec![0, 1, 2]);
    }

    #[test]
    fn restartable_and_resumable() {
        let bytes = buffer(header(2, 1, 4), 4, new_work);
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        let first: Vec<_> = snapshot.entries().collect();
        let second: Vec<_> = snapshot.entries().collect();
        assert_eq!(first, second);
        let tail: Vec<_> = snapshot.entries_after((0, 3)).map(|e| e.key()).collect();
        assert_eq!(tail, vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn index_past_capacity_folds_into_generation() {
        let bytes = buffer(header(12, 0, 10), 10, new_work);
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        let first = snapshot.entries().next().expect("entry");
        assert_eq!(first.key(), (0, 2));
        assert_eq!(snapshot.entries().last().map(|e| e.key()), Some((1, 1)));
    }

    #[test]
    fn corrupt_entry_does_not_abort_read() {
        let mut bytes = buffer(header(3, 0, 3), 3, |i| LogEvent::ContextStateChange {
            h_context: 0xAAA1,
            state: if i == 2 {
                ContextState::Ready
            } else {
                ContextState::Running
            },
        });
        let tag_at = LOG_HEADER_BYTES + LOG_ENTRY_BYTES + 8;
        bytes[tag_at] = 0x7;
        let events: Vec<_> = LogSnapshot::parse(&bytes)
            .expect("parse")
            .entries()
            .map(|e| e.event)
            .collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1],
            LogEvent::Unknown {
                operation_type: 7,
                ..
            }
        ));
        assert_eq!(
            events[2],
            LogEvent::ContextStateChange {
                h_context: 0xAAA1,
                state: ContextState::Ready
            }
        );
    }

    #[test]
    fn short_buffers() {
        assert_eq!(
            LogSnapshot::parse(&[0; 8]).map(|s| s.len()),
            Err(LogError::TooShort { len: 8 })
        );
        let bytes = buffer(header(1, 0, 100), 2, new_work);
        let snapshot = LogSnapshot::parse(&bytes).expect("parse");
        assert_eq!(snapshot.capacity(), 2);
        assert_eq!(snapshot.entries().count(), 1);
        let empty = LogSnapshot::parse(&header(4, 3, 0).to_bytes()).expect("parse");
        assert!(empty.is_empty());
        assert_eq!(empty.entries().count(), 0);
    }
}
