//! Scheduler and simulator wired to the same memory, stepped by hand.

use mes_abi::AddQueue;
use mes_codec::LogSnapshot;
use mes_driver::{Outcome, Pending, Scheduler, SchedulerConfig};
use mes_firmware_sim::{EventLogWriter, FirmwareSim, SimControl, SimParts, Step};
use mes_transport::{FenceIrq, FenceRegion, FrameRing, LogRegion, ManualClock};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const LOG_ENTRIES: u32 = 16;
pub(crate) const START_TICKS: u64 = 1_000;
pub(crate) const PROCESS_ADDR: u64 = 0x8000;

pub(crate) struct Testbed {
    pub scheduler: Scheduler,
    pub sim: FirmwareSim,
    pub control: SimControl,
    pub fences: Arc<FenceRegion>,
    pub log: Arc<LogRegion>,
    pub clock: Arc<ManualClock>,
}

impl Testbed {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig {
            fence_slots: 4,
            ring_frames: 8,
            ..SchedulerConfig::default()
        })
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let (producer, consumer) = FrameRing::new(config.ring_frames).expect("ring").split();
        let fences = Arc::new(
            FenceRegion::new(config.fence_base_addr, config.fence_slots).expect("fences"),
        );
        let irq = Arc::new(FenceIrq::new());
        let clock = Arc::new(ManualClock::new(START_TICKS));
        let log = Arc::new(LogRegion::new(EventLogWriter::buffer_len(LOG_ENTRIES)).expect("log"));
        let (sim, control) = FirmwareSim::new(
            config.api_version,
            SimParts {
                consumer,
                fences: Arc::clone(&fences),
                irq: Arc::clone(&irq),
                log: EventLogWriter::new(Arc::clone(&log), LOG_ENTRIES).expect("writer"),
                clock: clock.clone(),
            },
        );
        let scheduler = Scheduler::new(
            config,
            producer,
            fences.clone(),
            irq.as_ref(),
            clock.clone(),
        )
        .expect("scheduler");
        Self {
            scheduler,
            sim,
            control,
            fences,
            log,
            clock,
        }
    }

    /// Lets the firmware consume everything on the ring.
    pub fn run(&mut self) -> Vec<Step> {
        self.sim.run_until_idle().expect("sim")
    }

    /// Runs the firmware, then collects the outcome of `pending`.
    pub fn complete(&mut self, pending: &mut Pending) -> Outcome {
        self.run();
        pending.wait(Duration::from_secs(1)).expect("wait")
    }

    pub fn read_log(&self) -> LogSnapshot {
        self.scheduler
            .read_log(&self.log.snapshot())
            .expect("log snapshot")
    }
}

/// ADD_QUEUE for `h_queue` in gang `h_context`; gang context addresses are
/// derived from the gang handle.
pub(crate) fn add_queue(h_context: u64, h_queue: u64, doorbell_offset: u32) -> AddQueue {
    AddQueue {
        process_context_addr: PROCESS_ADDR,
        gang_context_addr: gang_addr(h_context),
        h_context,
        h_queue,
        doorbell_offset,
        process_va_end: 0xFFFF_F000,
        ..AddQueue::default()
    }
}

pub(crate) fn gang_addr(h_context: u64) -> u64 {
    0x10_0000 + h_context * 0x100
}
