#![cfg(test)]
//! SUSPEND/RESUME scoping and the secondary suspend fence.

use crate::testbed::{add_queue, gang_addr, Testbed};
use mes_abi::{ContextState, LogEvent, Resume, ResumeFlags, Suspend, SuspendFlags};
use mes_driver::{Outcome, SchedulerError};

fn map_gangs(bed: &mut Testbed, gangs: &[u64]) {
    for (i, &h_context) in gangs.iter().enumerate() {
        let mut pending = bed
            .scheduler
            .add_queue(add_queue(h_context, 0x100 + h_context, i as u32 + 1))
            .expect("add");
        assert_eq!(bed.complete(&mut pending), Outcome::Success);
    }
}

#[test]
fn suspend_all_with_a_gang_address_is_refused() {
    let mut bed = Testbed::new();
    map_gangs(&mut bed, &[1]);
    let err = bed
        .scheduler
        .suspend(Suspend {
            flags: SuspendFlags::default().with_suspend_all_gangs(true),
            gang_context_addr: gang_addr(1),
            ..Suspend::default()
        })
        .unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidRequest(_)));

    let err = bed.scheduler.suspend(Suspend::default()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidRequest(_)));
    assert!(bed.run().is_empty());
    assert!(!bed.scheduler.registry().gang(1).expect("gang").suspended);
}

#[test]
fn suspending_one_gang_writes_the_secondary_fence() {
    let mut bed = Testbed::new();
    map_gangs(&mut bed, &[1, 2]);
    let drained_addr = bed
        .scheduler
        .fence_slot_addrs()
        .last()
        .expect("fence slots");

    let mut pending = bed
        .scheduler
        .suspend(Suspend {
            gang_context_addr: gang_addr(2),
            suspend_fence_addr: drained_addr,
            suspend_fence_value: 0x5D,
            ..Suspend::default()
        })
        .expect("suspend");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    assert_eq!(bed.fences.read(drained_addr).expect("fence"), 0x5D);

    let registry = bed.scheduler.registry();
    assert!(!registry.gang(1).expect("gang 1").suspended);
    assert!(registry.gang(2).expect("gang 2").suspended);

    let last = bed.read_log().entries().last().expect("entry").event;
    assert_eq!(
        last,
        LogEvent::ContextStateChange {
            h_context: 2,
            state: ContextState::Idle
        }
    );
}

#[test]
fn resume_all_clears_every_gang() {
    let mut bed = Testbed::new();
    map_gangs(&mut bed, &[1, 2]);
    let mut pending = bed
        .scheduler
        .suspend(Suspend {
            flags: SuspendFlags::default().with_suspend_all_gangs(true),
            ..Suspend::default()
        })
        .expect("suspend all");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    assert_eq!(
        bed.scheduler
            .registry()
            .gangs_of_process(crate::testbed::PROCESS_ADDR)
            .expect("process")
            .len(),
        2
    );
    assert!(bed.scheduler.registry().gang(1).expect("gang").suspended);

    let mut pending = bed
        .scheduler
        .resume(Resume {
            flags: ResumeFlags::default().with_resume_all_gangs(true),
            ..Resume::default()
        })
        .expect("resume all");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
    for h_context in [1, 2] {
        assert!(!bed.scheduler.registry().gang(h_context).expect("gang").suspended);
    }

    let tail: Vec<LogEvent> = bed
        .read_log()
        .entries()
        .map(|entry| entry.event)
        .skip(4)
        .collect();
    assert_eq!(
        tail,
        vec![
            LogEvent::ContextStateChange {
                h_context: 1,
                state: ContextState::Idle
            },
            LogEvent::ContextStateChange {
                h_context: 2,
                state: ContextState::Idle
            },
            LogEvent::ContextStateChange {
                h_context: 1,
                state: ContextState::Ready
            },
            LogEvent::ContextStateChange {
                h_context: 2,
                state: ContextState::Ready
            },
        ]
    );
}
