//! Host-side stand-in for the scheduler firmware.
//!
//! [`FirmwareSim`] drains the command ring, decodes each frame with the same
//! codec the driver uses and acknowledges it: the expected fence value on
//! success, an [`ErrorCode`] word when a fault was injected or the frame did
//! not decode. Queue and gang transitions are appended to the event log. No
//! scheduling policy is modeled.

mod control;
mod error;
mod event_log;

pub use control::{Control, SimControl};
pub use error::{SimError, SimResult};
pub use event_log::EventLogWriter;

use crossbeam_channel::Receiver;
use log::{debug, error, trace, warn};
use mes_abi::{
    ApiStatus, ApiVersion, Command, ContextState, ErrorCategory, ErrorCode, LogEvent, Opcode,
};
use mes_codec::{DecodeError, Frame, FrameCodec};
use mes_transport::{FenceIrq, FenceRegion, FrameRing, GpuClock, RingConsumer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// API error reported for frames that fail to decode.
pub const API_ERROR_INVALID_FRAME: u8 = 0x01;

/// Memory and signal lines the simulator is attached to.
pub struct SimParts {
    pub consumer: RingConsumer,
    pub fences: Arc<FenceRegion>,
    pub irq: Arc<FenceIrq>,
    pub log: EventLogWriter,
    pub clock: Arc<dyn GpuClock>,
}

/// What one [`FirmwareSim::step`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// The ring was empty.
    Idle,
    Completed { opcode: u8, fence_value: u64 },
    Failed { opcode: u8, code: ErrorCode },
    Withheld { opcode: Opcode },
    /// Opcode outside the known set; dropped without completion.
    Unrecognized { opcode: u8 },
    /// The frame did not decode. `status` is set when its fence could still
    /// be located and was failed.
    Rejected {
        error: DecodeError,
        status: Option<ApiStatus>,
    },
}

#[derive(Clone, Copy)]
struct MappedQueue {
    h_queue: u64,
    h_context: u64,
}

pub struct FirmwareSim {
    codec: FrameCodec,
    parts: SimParts,
    control: Receiver<Control>,
    faults: HashMap<Opcode, ErrorCode>,
    withheld_ops: HashSet<Opcode>,
    withheld: Vec<(Opcode, ApiStatus)>,
    doorbells: HashMap<u32, MappedQueue>,
    gang_contexts: HashMap<u64, u64>,
    gang_queues: HashMap<u64, usize>,
    processed: u64,
}

impl FirmwareSim {
    pub fn new(version: ApiVersion, parts: SimParts) -> (Self, SimControl) {
        let (control, rx) = SimControl::channel();
        let sim = Self {
            codec: FrameCodec::new(version),
            parts,
            control: rx,
            faults: HashMap::new(),
            withheld_ops: HashSet::new(),
            withheld: Vec::new(),
            doorbells: HashMap::new(),
            gang_contexts: HashMap::new(),
            gang_queues: HashMap::new(),
            processed: 0,
        };
        (sim, control)
    }

    /// Frames consumed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn log(&self) -> &EventLogWriter {
        &self.parts.log
    }

    /// Applies pending control requests, then handles at most one frame.
    pub fn step(&mut self) -> SimResult<Step> {
        self.apply_controls()?;
        let Some(words) = self.parts.consumer.pop() else {
            return Ok(Step::Idle);
        };
        self.processed += 1;
        let frame = Frame::from_words(words);
        match self.codec.decode(&frame) {
            Ok(command) => self.execute(command),
            Err(error) => self.reject(&frame, error),
        }
    }

    /// Steps until the ring is empty. Returns the non-idle steps.
    pub fn run_until_idle(&mut self) -> SimResult<Vec<Step>> {
        let mut steps = Vec::new();
        loop {
            match self.step()? {
                Step::Idle => return Ok(steps),
                step => steps.push(step),
            }
        }
    }

    /// Moves the simulator onto its own thread. It parks on the ring doorbell
    /// and exits once [`SimThread::stop`] closes the ring. Control requests
    /// take effect when the next frame arrives.
    pub fn spawn(mut self) -> SimResult<SimThread> {
        let ring = self.parts.consumer.shared();
        let handle = thread::Builder::new()
            .name("mes-firmware-sim".into())
            .spawn(move || {
                loop {
                    match self.step() {
                        Ok(Step::Idle) => {
                            if !self.parts.consumer.wait_for_work() {
                                break;
                            }
                        }
                        Ok(step) => trace!("sim step {step:?}"),
                        Err(err) => error!("sim step failed: {err}"),
                    }
                }
                debug!("sim thread exiting after {} frames", self.processed);
                self
            })?;
        Ok(SimThread { ring, handle })
    }

    fn apply_controls(&mut self) -> SimResult<()> {
        while let Ok(control) = self.control.try_recv() {
            debug!("sim control {control:?}");
            match control {
                Control::FailNext { opcode, code } => {
                    self.faults.insert(opcode, code);
                }
                Control::Withhold { opcode } => {
                    self.withheld_ops.insert(opcode);
                }
                Control::Release => {
                    self.withheld_ops.clear();
                    let held = std::mem::take(&mut self.withheld);
                    for (opcode, status) in held {
                        trace!("releasing {opcode}");
                        self.complete(status, status.fence_value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, command: Command) -> SimResult<Step> {
        let Some(opcode) = command.opcode() else {
            // No known status slot, so nothing can be acknowledged.
            warn!("dropping unrecognized opcode {}", command.raw_opcode());
            return Ok(Step::Unrecognized {
                opcode: command.raw_opcode(),
            });
        };
        let Some(status) = command.api_status().copied() else {
            return Ok(Step::Idle);
        };
        if let Some(code) = self.faults.remove(&opcode) {
            warn!("injecting {code} for {opcode}");
            self.complete(status, code.to_fence_value())?;
            return Ok(Step::Failed {
                opcode: opcode.raw(),
                code,
            });
        }
        self.record(&command)?;
        if self.withheld_ops.contains(&opcode) {
            debug!("withholding completion of {opcode}");
            self.withheld.push((opcode, status));
            return Ok(Step::Withheld { opcode });
        }
        self.complete(status, status.fence_value)?;
        Ok(Step::Completed {
            opcode: opcode.raw(),
            fence_value: status.fence_value,
        })
    }

    fn reject(&mut self, frame: &Frame, error: DecodeError) -> SimResult<Step> {
        warn!("rejecting frame: {error}");
        let status = self
            .codec
            .peek_status(frame)
            .filter(|status| self.parts.fences.contains(status.fence_addr));
        if let Some(status) = status {
            let code = ErrorCode::new(
                ErrorCategory::Api,
                frame.header().opcode(),
                0,
                API_ERROR_INVALID_FRAME,
            );
            self.complete(status, code.to_fence_value())?;
        }
        Ok(Step::Rejected { error, status })
    }

    fn complete(&self, status: ApiStatus, value: u64) -> SimResult<()> {
        if status.is_null() {
            return Ok(());
        }
        self.parts.fences.write(status.fence_addr, value)?;
        self.parts.irq.raise();
        Ok(())
    }

    /// Tracks mappings and writes the matching log entries.
    fn record(&mut self, command: &Command) -> SimResult<()> {
        let now = self.parts.clock.now();
        match command {
            Command::AddQueue(cmd) => {
                self.doorbells.insert(
                    cmd.doorbell_offset,
                    MappedQueue {
                        h_queue: cmd.h_queue,
                        h_context: cmd.h_context,
                    },
                );
                self.gang_contexts
                    .insert(cmd.gang_context_addr, cmd.h_context);
                let queues = self.gang_queues.entry(cmd.h_context).or_insert(0);
                *queues += 1;
                if *queues == 1 {
                    self.parts.log.append(
                        now,
                        &LogEvent::ContextStateChange {
                            h_context: cmd.h_context,
                            state: ContextState::Ready,
                        },
                    )?;
                }
                self.parts.log.append(
                    now,
                    &LogEvent::QueueNewWork {
                        h_queue: cmd.h_queue,
                    },
                )?;
            }
            Command::RemoveQueue(cmd) => {
                let Some(queue) = self.doorbells.remove(&cmd.doorbell_offset) else {
                    warn!("remove of unmapped doorbell {:#x}", cmd.doorbell_offset);
                    return Ok(());
                };
                self.parts.log.append(
                    now,
                    &LogEvent::QueueNoMoreWork {
                        h_queue: queue.h_queue,
                    },
                )?;
                let remaining = self.gang_queues.entry(queue.h_context).or_insert(1);
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.gang_queues.remove(&queue.h_context);
                    self.gang_contexts.retain(|_, h| *h != queue.h_context);
                    self.parts.log.append(
                        now,
                        &LogEvent::ContextStateChange {
                            h_context: queue.h_context,
                            state: ContextState::Idle,
                        },
                    )?;
                }
            }
            Command::Suspend(cmd) => {
                self.gang_state(
                    cmd.flags.suspend_all_gangs(),
                    cmd.gang_context_addr,
                    ContextState::Idle,
                    now,
                )?;
                let addr = cmd.suspend_fence_addr;
                if addr != 0 && self.parts.fences.contains(addr) {
                    self.parts
                        .fences
                        .write(addr, u64::from(cmd.suspend_fence_value))?;
                }
            }
            Command::Resume(cmd) => {
                self.gang_state(
                    cmd.flags.resume_all_gangs(),
                    cmd.gang_context_addr,
                    ContextState::Ready,
                    now,
                )?;
            }
            _ => {}
        }
        Ok(())
    }

    fn gang_state(
        &mut self,
        all: bool,
        gang_context_addr: u64,
        state: ContextState,
        now: u64,
    ) -> SimResult<()> {
        let mut gangs: Vec<u64> = if all {
            self.gang_queues.keys().copied().collect()
        } else {
            self.gang_contexts
                .get(&gang_context_addr)
                .copied()
                .into_iter()
                .collect()
        };
        gangs.sort_unstable();
        for h_context in gangs {
            self.parts
                .log
                .append(now, &LogEvent::ContextStateChange { h_context, state })?;
        }
        Ok(())
    }
}

/// A simulator running on its own thread.
pub struct SimThread {
    ring: Arc<FrameRing>,
    handle: JoinHandle<FirmwareSim>,
}

impl SimThread {
    /// Closes the ring, lets the thread drain what is left and hands the
    /// simulator back.
    pub fn stop(self) -> SimResult<FirmwareSim> {
        self.ring.close();
        self.handle.join().map_err(|_| SimError::Panicked)
    }
}
