#![cfg(test)]
//! Completion fences observed through the tracker while the firmware holds,
//! fails or releases commands.

use crate::testbed::Testbed;
use mes_abi::{ApiStatus, ErrorCategory, ErrorCode, Opcode};
use mes_driver::{FenceError, Outcome, SchedulerError};
use mes_firmware_sim::Step;
use std::thread;
use std::time::Duration;

#[test]
fn zero_timeout_then_late_completion() {
    let mut bed = Testbed::new();
    assert!(bed.control.withhold(Opcode::PerformYield));
    let mut pending = bed.scheduler.perform_yield().expect("yield");
    assert_eq!(
        bed.run(),
        vec![Step::Withheld {
            opcode: Opcode::PerformYield
        }]
    );

    assert_eq!(pending.wait(Duration::ZERO).expect("wait"), Outcome::TimedOut);
    assert_eq!(pending.poll().expect("poll"), None);
    assert!(bed.scheduler.tracker().is_in_flight(pending.fence_addr()));

    assert!(bed.control.release());
    bed.run();
    assert_eq!(
        pending.wait(Duration::from_secs(1)).expect("wait"),
        Outcome::Success
    );
    // Final outcomes are remembered by the handle.
    assert_eq!(pending.wait(Duration::ZERO).expect("again"), Outcome::Success);
    assert_eq!(bed.scheduler.tracker().in_flight(), 0);
}

#[test]
fn fence_reuse_is_refused_while_in_flight() {
    let mut bed = Testbed::new();
    bed.control.withhold(Opcode::PerformYield);
    let mut pending = bed.scheduler.perform_yield().expect("yield");
    bed.run();

    let tracker = bed.scheduler.tracker().clone();
    let reuse = ApiStatus::new(pending.fence_addr(), 99);
    assert_eq!(
        tracker.submit(&reuse, Opcode::PerformYield.raw()),
        Err(FenceError::FenceReuseViolation {
            addr: pending.fence_addr()
        })
    );

    bed.control.release();
    bed.run();
    assert_eq!(pending.wait_default().expect("wait"), Outcome::Success);
    // Once consumed, the slot is free for a new expected value.
    let handle = tracker
        .submit(&reuse, Opcode::PerformYield.raw())
        .expect("slot reusable");
    assert!(tracker.forget(handle));
}

#[test]
fn injected_error_word_round_trips() {
    let mut bed = Testbed::new();
    let code = ErrorCode::new(ErrorCategory::Api, Opcode::PerformYield.raw(), 0, 0x22);
    bed.control.fail_next(Opcode::PerformYield, code);

    let mut pending = bed.scheduler.perform_yield().expect("yield");
    let fence_addr = pending.fence_addr();
    assert_eq!(bed.complete(&mut pending), Outcome::Failed(code));
    assert_eq!(
        bed.fences.read(fence_addr).expect("fence"),
        code.to_fence_value()
    );

    bed.control.fail_next(Opcode::PerformYield, code);
    let mut pending = bed.scheduler.perform_yield().expect("yield");
    bed.run();
    let err = pending.wait_ok(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(
        err,
        SchedulerError::Firmware {
            category: ErrorCategory::Api,
            code: 0x22,
            ..
        }
    ));
}

#[test]
fn unawaited_completions_are_drained() {
    let mut bed = Testbed::new();
    let first = bed.scheduler.perform_yield().expect("first").handle();
    let second = bed.scheduler.perform_yield().expect("second").handle();
    bed.run();

    let mut drained = bed.scheduler.drain_completed();
    drained.sort_by_key(|(handle, _)| handle.expected);
    assert_eq!(
        drained,
        vec![(first, Ok(Outcome::Success)), (second, Ok(Outcome::Success))]
    );
    assert_eq!(bed.scheduler.tracker().in_flight(), 0);
}

#[test]
fn fence_slots_run_out_until_collected() {
    let mut bed = Testbed::new();
    bed.control.withhold(Opcode::PerformYield);
    let mut held: Vec<_> = (0..bed.scheduler.config().fence_slots)
        .map(|_| bed.scheduler.perform_yield().expect("yield"))
        .collect();
    assert!(matches!(
        bed.scheduler.perform_yield(),
        Err(SchedulerError::NoFreeFence)
    ));

    bed.run();
    bed.control.release();
    bed.run();
    for pending in &mut held {
        assert_eq!(pending.wait_default().expect("wait"), Outcome::Success);
    }
    let mut pending = bed.scheduler.perform_yield().expect("slot freed");
    assert_eq!(bed.complete(&mut pending), Outcome::Success);
}

#[test]
fn cancel_wakes_a_blocked_waiter() {
    let mut bed = Testbed::new();
    bed.control.withhold(Opcode::PerformYield);
    let mut pending = bed.scheduler.perform_yield().expect("yield");
    bed.run();

    let token = bed.scheduler.cancel_token();
    let canceler = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            token.cancel();
        })
    };
    let outcome = pending
        .wait_cancelable(Duration::from_secs(10), &token)
        .expect("wait");
    canceler.join().expect("canceler");
    assert_eq!(outcome, Outcome::Canceled);

    // Canceling a wait does not retract the command.
    bed.control.release();
    bed.run();
    assert_eq!(pending.wait_default().expect("wait"), Outcome::Success);
}
