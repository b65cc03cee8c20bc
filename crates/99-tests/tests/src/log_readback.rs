#![cfg(test)]
//! Event log written by the firmware and read back through the scheduler.

use crate::testbed::{add_queue, Testbed, LOG_ENTRIES, START_TICKS};
use mes_abi::{ContextState, LogEvent, RemoveQueueFlags};
use mes_driver::{Outcome, SchedulerError};

fn cycle_queue(bed: &mut Testbed, h_context: u64, h_queue: u64) {
    let mut pending = bed
        .scheduler
        .add_queue(add_queue(h_context, h_queue, h_queue as u32))
        .expect("add");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    let mut pending = bed
        .scheduler
        .remove_queue(h_queue, RemoveQueueFlags::default())
        .expect("remove");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
}

#[test]
fn queue_lifecycle_is_logged_in_order() {
    let mut bed = Testbed::new();
    cycle_queue(&mut bed, 0xAAA1, 0x10);

    let snapshot = bed.read_log();
    assert_eq!(snapshot.capacity(), LOG_ENTRIES);
    let entries: Vec<_> = snapshot.entries().collect();
    assert!(entries
        .iter()
        .all(|entry| entry.gpu_time_stamp == START_TICKS && entry.generation == 0));
    assert_eq!(
        entries.iter().map(|entry| entry.event).collect::<Vec<_>>(),
        vec![
            LogEvent::ContextStateChange {
                h_context: 0xAAA1,
                state: ContextState::Ready
            },
            LogEvent::QueueNewWork { h_queue: 0x10 },
            LogEvent::QueueNoMoreWork { h_queue: 0x10 },
            LogEvent::ContextStateChange {
                h_context: 0xAAA1,
                state: ContextState::Idle
            },
        ]
    );
}

#[test]
fn resumed_reads_only_see_new_entries() {
    let mut bed = Testbed::new();
    cycle_queue(&mut bed, 1, 0x10);
    let seen = bed.read_log().entries().last().expect("entry").key();

    bed.clock.advance(500);
    cycle_queue(&mut bed, 2, 0x20);
    let snapshot = bed.read_log();
    let fresh: Vec<_> = snapshot.entries_after(seen).collect();
    assert_eq!(fresh.len(), 4);
    assert!(fresh
        .iter()
        .all(|entry| entry.gpu_time_stamp == START_TICKS + 500));
    assert_eq!(fresh[1].event.h_queue(), Some(0x20));
}

#[test]
fn wrapped_log_stays_chronological() {
    let mut bed = Testbed::new();
    // Five cycles log twenty entries into sixteen slots.
    for i in 0..5u64 {
        bed.clock.advance(10);
        cycle_queue(&mut bed, i + 1, 0x10 + i);
    }
    let snapshot = bed.read_log();
    assert_eq!(snapshot.wraparound(), 1);
    assert_eq!(snapshot.first_free(), 4);
    assert_eq!(snapshot.len(), LOG_ENTRIES as usize);

    let keys: Vec<_> = snapshot.entries().map(|entry| entry.key()).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);

    let stamps: Vec<u64> = snapshot.entries().map(|entry| entry.gpu_time_stamp).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] <= pair[1]));
    // The oldest surviving entry belongs to the second cycle.
    assert_eq!(stamps[0], START_TICKS + 20);
}

#[test]
fn truncated_dump_is_an_error() {
    let bed = Testbed::new();
    let err = bed.scheduler.read_log(&[0u8; 8]).unwrap_err();
    assert!(matches!(err, SchedulerError::Log(_)));
}
