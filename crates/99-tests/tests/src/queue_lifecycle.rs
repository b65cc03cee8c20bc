#![cfg(test)]
//! Queue mapping through the ring, with registry bookkeeping checked on both
//! sides of each completion.

use crate::testbed::{add_queue, gang_addr, Testbed, PROCESS_ADDR};
use mes_abi::{ErrorCategory, ErrorCode, Opcode, RemoveQueueFlags};
use mes_driver::{
    GangEntry, HandleKind, Outcome, ProcessEntry, RegistryError, SchedulerError,
};
use mes_firmware_sim::Step;

#[test]
fn add_then_remove_twice_reports_not_found() {
    let mut bed = Testbed::new();
    let registry = bed.scheduler.registry().clone();
    registry
        .register_process(ProcessEntry::new(PROCESS_ADDR, 7))
        .expect("process");
    registry
        .register_gang(GangEntry::new(0xAAA1, gang_addr(0xAAA1), PROCESS_ADDR))
        .expect("gang");

    let mut pending = bed
        .scheduler
        .add_queue(add_queue(0xAAA1, 0xBEEF, 0x40))
        .expect("add");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    assert_eq!(registry.gang(0xAAA1).expect("gang").queues(), &[0xBEEF]);
    assert_eq!(registry.queue_by_doorbell(0x40).expect("doorbell").h_queue, 0xBEEF);

    let mut pending = bed
        .scheduler
        .remove_queue(0xBEEF, RemoveQueueFlags::default())
        .expect("remove");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    assert_eq!(registry.stats().queues, 0);

    let err = bed
        .scheduler
        .remove_queue(0xBEEF, RemoveQueueFlags::default())
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Registry(RegistryError::NotFound {
            kind: HandleKind::Queue,
            handle: 0xBEEF
        })
    ));
    // Nothing reached the ring for the refused removal.
    assert!(bed.run().is_empty());
}

#[test]
fn firmware_rejection_unregisters_the_queue() {
    let mut bed = Testbed::new();
    let code = ErrorCode::new(ErrorCategory::Scheduling, Opcode::AddQueue.raw(), 0, 0x11);
    assert!(bed.control.fail_next(Opcode::AddQueue, code));

    let mut pending = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("add");
    // Registered optimistically while the command is in flight.
    assert!(bed.scheduler.registry().queue(0x10).is_ok());
    assert_eq!(bed.complete(&mut pending), Outcome::Failed(code));
    assert!(bed.scheduler.registry().queue(0x10).is_err());
    assert_eq!(bed.scheduler.registry().stats().gangs, 0);

    // The same handles can be mapped again once the failure is settled.
    let mut pending = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("retry");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
}

#[test]
fn failed_add_keeps_a_gang_registered_beforehand() {
    let mut bed = Testbed::new();
    let registry = bed.scheduler.registry().clone();
    registry
        .register_process(ProcessEntry::new(PROCESS_ADDR, 7))
        .expect("process");
    registry
        .register_gang(GangEntry::new(0xAAA1, gang_addr(0xAAA1), PROCESS_ADDR))
        .expect("gang");
    let code = ErrorCode::new(ErrorCategory::Scheduling, Opcode::AddQueue.raw(), 0, 0x11);
    bed.control.fail_next(Opcode::AddQueue, code);

    let mut pending = bed
        .scheduler
        .add_queue(add_queue(0xAAA1, 0xBEEF, 0x40))
        .expect("add");
    assert_eq!(bed.complete(&mut pending), Outcome::Failed(code));

    assert!(registry.queue(0xBEEF).is_err());
    assert!(registry.queue_by_doorbell(0x40).is_err());
    let gang = registry.gang(0xAAA1).expect("gang survives");
    assert!(gang.queues().is_empty());
    assert_eq!(
        registry.gangs_of_process(PROCESS_ADDR).expect("process survives"),
        vec![0xAAA1]
    );
    assert_eq!(bed.scheduler.pending_rollbacks(), 0);
}

#[test]
fn dropped_failed_add_is_rolled_back_when_drained() {
    let mut bed = Testbed::new();
    let code = ErrorCode::new(ErrorCategory::Scheduling, Opcode::AddQueue.raw(), 0, 0x11);
    bed.control.fail_next(Opcode::AddQueue, code);

    let pending = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("add");
    let handle = pending.handle();
    drop(pending);
    bed.run();
    assert_eq!(bed.scheduler.pending_rollbacks(), 1);

    assert_eq!(
        bed.scheduler.drain_completed(),
        vec![(handle, Ok(Outcome::Failed(code)))]
    );
    let registry = bed.scheduler.registry();
    assert!(registry.queue(0x10).is_err());
    assert!(registry.queue_by_doorbell(4).is_err());
    assert_eq!(registry.stats().gangs, 0);
    assert_eq!(bed.scheduler.pending_rollbacks(), 0);

    // Handle and doorbell are free again.
    let mut pending = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("retry");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    assert_eq!(bed.scheduler.pending_rollbacks(), 0);
}

#[test]
fn dropped_successful_add_stays_registered() {
    let mut bed = Testbed::new();
    let handle = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("add")
        .handle();
    bed.run();
    assert_eq!(
        bed.scheduler.drain_completed(),
        vec![(handle, Ok(Outcome::Success))]
    );
    assert!(bed.scheduler.registry().queue(0x10).is_ok());
    assert_eq!(bed.scheduler.pending_rollbacks(), 0);
}

#[test]
fn duplicate_doorbell_never_reaches_the_ring() {
    let mut bed = Testbed::new();
    let mut pending = bed
        .scheduler
        .add_queue(add_queue(1, 0x10, 4))
        .expect("add");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);

    let err = bed
        .scheduler
        .add_queue(add_queue(1, 0x11, 4))
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Registry(RegistryError::DuplicateHandle {
            kind: HandleKind::Doorbell,
            ..
        })
    ));
    assert!(bed.run().is_empty());
    assert_eq!(bed.scheduler.tracker().in_flight(), 0);
}

#[test]
fn gang_priority_follows_the_first_queue_doorbell() {
    let mut bed = Testbed::new();
    for (h_queue, doorbell) in [(0x10, 4), (0x11, 5)] {
        let mut pending = bed
            .scheduler
            .add_queue(add_queue(2, h_queue, doorbell))
            .expect("add");
        assert_eq!(bed.complete(&mut pending), Outcome::Success);
    }

    let priority = mes_driver::GangPriority {
        level: mes_abi::PriorityLevel::High,
        inprocess_priority: 3,
        gang_quantum: 10_000,
        queue_quantum: Default::default(),
    };
    let mut pending = bed
        .scheduler
        .change_gang_priority(2, priority)
        .expect("priority");
    let steps = bed.run();
    assert!(matches!(
        steps.as_slice(),
        [Step::Completed { opcode, .. }] if *opcode == Opcode::ChangeGangPriority.raw()
    ));
    assert_eq!(pending.wait_default().expect("wait"), Outcome::Success);

    let gang = bed.scheduler.registry().gang(2).expect("gang");
    assert_eq!(gang.priority_level, mes_abi::PriorityLevel::High);
    assert_eq!(gang.inprocess_priority, 3);
    assert_eq!(gang.gang_quantum, 10_000);
}
