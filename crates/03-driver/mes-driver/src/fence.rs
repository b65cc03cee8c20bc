//! Completion tracking for submitted commands.
//!
//! Every command carries an [`ApiStatus`]: the firmware writes `fence_value`
//! to `fence_addr` on success, or an error word with bit 63 set on failure.
//! The tracker owns the mapping from fence address to the value it expects,
//! resets the slot on submission, and classifies what it later reads back.
//!
//! Completion is noticed two ways: the fence interrupt reconciles every
//! in-flight entry and wakes waiters, and blocked waiters re-read their own
//! fence at most every `poll_interval`. A completed outcome is kept until a
//! waiter consumes it, so an interrupt that lands between two waits is never
//! lost.

use crate::error::FenceError;
use mes_abi::{ApiStatus, ErrorCode};
use mes_transport::{FenceInterrupt, FenceMemory};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Final state of a tracked command as seen by a waiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed(ErrorCode),
    TimedOut,
    Canceled,
}

impl Outcome {
    /// True for outcomes that end tracking.
    pub fn is_final(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Failed(_))
    }
}

/// Identity of one submission: the fence slot and the value it waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PendingHandle {
    pub fence_addr: u64,
    pub expected: u64,
}

struct Signal {
    epoch: Mutex<u64>,
    cond: Condvar,
}

impl Signal {
    fn notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.cond.notify_all();
    }
}

/// Cooperative cancellation of blocking waits.
#[derive(Clone)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
    signal: Arc<Signal>,
}

impl CancelToken {
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
        self.signal.notify();
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// Final classification of a fence, or why it could not be classified.
pub type Resolution = Result<Outcome, FenceError>;

enum SlotState {
    InFlight,
    Completed(Resolution),
}

struct Slot {
    expected: u64,
    opcode: u8,
    state: SlotState,
}

/// Reads the fence word and decides whether the command finished.
fn classify(addr: u64, expected: u64, value: u64) -> Option<Resolution> {
    if value == expected {
        Some(Ok(Outcome::Success))
    } else if let Some(code) = ErrorCode::from_fence_value(value) {
        Some(Ok(Outcome::Failed(code)))
    } else if value == 0 {
        None
    } else {
        Some(Err(FenceError::UnexpectedValue {
            addr,
            expected,
            found: value,
        }))
    }
}

pub struct FenceTracker {
    memory: Arc<dyn FenceMemory>,
    slots: Mutex<HashMap<u64, Slot>>,
    signal: Arc<Signal>,
    poll_interval: Option<Duration>,
}

impl FenceTracker {
    pub fn new(memory: Arc<dyn FenceMemory>, poll_interval: Option<Duration>) -> Self {
        Self {
            memory,
            slots: Mutex::new(HashMap::new()),
            signal: Arc::new(Signal {
                epoch: Mutex::new(0),
                cond: Condvar::new(),
            }),
            poll_interval,
        }
    }

    /// Hooks the tracker to a completion interrupt. The callback holds a weak
    /// reference, so it becomes a no-op once the tracker is dropped.
    pub fn attach(self: &Arc<Self>, irq: &dyn FenceInterrupt) {
        let weak: Weak<Self> = Arc::downgrade(self);
        irq.register_fence_interrupt(Arc::new(move || {
            if let Some(tracker) = weak.upgrade() {
                tracker.on_interrupt();
            }
        }));
    }

    /// Reconciles all in-flight entries and wakes every waiter.
    pub fn on_interrupt(&self) {
        let completed = self.reconcile_all();
        tracing::trace!(completed, "fence interrupt");
        self.signal.notify();
    }

    pub fn cancel_token(&self) -> CancelToken {
        CancelToken {
            canceled: Arc::new(AtomicBool::new(false)),
            signal: Arc::clone(&self.signal),
        }
    }

    /// Starts tracking `status` for a command with raw opcode `opcode`.
    ///
    /// The fence slot is cleared before the handle is returned, so a value
    /// left over from an earlier command is never mistaken for completion.
    pub fn submit(&self, status: &ApiStatus, opcode: u8) -> Result<PendingHandle, FenceError> {
        if status.fence_addr == 0 {
            return Err(FenceError::NullFence);
        }
        if status.fence_value == 0 || ErrorCode::is_error_value(status.fence_value) {
            return Err(FenceError::InvalidExpectedValue {
                value: status.fence_value,
            });
        }
        let mut slots = self.slots.lock();
        if slots.contains_key(&status.fence_addr) {
            tracing::warn!(addr = status.fence_addr, opcode, "fence address reused while in flight");
            return Err(FenceError::FenceReuseViolation {
                addr: status.fence_addr,
            });
        }
        self.memory
            .reset_fence(status.fence_addr)
            .map_err(|_| FenceError::UnmappedFence {
                addr: status.fence_addr,
            })?;
        slots.insert(
            status.fence_addr,
            Slot {
                expected: status.fence_value,
                opcode,
                state: SlotState::InFlight,
            },
        );
        Ok(PendingHandle {
            fence_addr: status.fence_addr,
            expected: status.fence_value,
        })
    }

    /// Stops tracking a submission that never reached the firmware.
    pub fn forget(&self, handle: PendingHandle) -> bool {
        let mut slots = self.slots.lock();
        let owned = slots
            .get(&handle.fence_addr)
            .is_some_and(|slot| slot.expected == handle.expected);
        if owned {
            slots.remove(&handle.fence_addr);
        }
        owned
    }

    /// Non-blocking check. A final outcome is returned once and ends tracking.
    pub fn poll(&self, handle: PendingHandle) -> Result<Option<Outcome>, FenceError> {
        let mut slots = self.slots.lock();
        let slot = match slots.get_mut(&handle.fence_addr) {
            Some(slot) if slot.expected == handle.expected => slot,
            _ => {
                return Err(FenceError::UnknownPending {
                    addr: handle.fence_addr,
                    expected: handle.expected,
                })
            }
        };
        let resolution = match &slot.state {
            SlotState::Completed(resolution) => resolution.clone(),
            SlotState::InFlight => {
                let value = self.memory.read_fence(handle.fence_addr)?;
                match classify(handle.fence_addr, handle.expected, value) {
                    Some(resolution) => resolution,
                    None => return Ok(None),
                }
            }
        };
        let opcode = slot.opcode;
        slots.remove(&handle.fence_addr);
        drop(slots);
        match &resolution {
            Ok(Outcome::Failed(code)) => {
                tracing::warn!(addr = handle.fence_addr, opcode, error = %code, "command failed")
            }
            Ok(outcome) => tracing::debug!(addr = handle.fence_addr, opcode, ?outcome, "command completed"),
            Err(err) => tracing::error!(addr = handle.fence_addr, opcode, %err, "fence corrupted"),
        }
        resolution.map(Some)
    }

    /// Blocks until the command completes or `timeout` elapses.
    ///
    /// `TimedOut` leaves the entry tracked; a later wait still observes the
    /// completion.
    pub fn wait(&self, handle: PendingHandle, timeout: Duration) -> Result<Outcome, FenceError> {
        self.wait_inner(handle, timeout, None)
    }

    /// Like [`wait`](Self::wait), returning `Canceled` once `token` fires.
    pub fn wait_cancelable(
        &self,
        handle: PendingHandle,
        timeout: Duration,
        token: &CancelToken,
    ) -> Result<Outcome, FenceError> {
        self.wait_inner(handle, timeout, Some(token))
    }

    fn wait_inner(
        &self,
        handle: PendingHandle,
        timeout: Duration,
        token: Option<&CancelToken>,
    ) -> Result<Outcome, FenceError> {
        let deadline = Instant::now().checked_add(timeout);
        // Holding the epoch lock across the check means a notify issued after
        // the fence write cannot slip in before we sleep.
        let mut epoch = self.signal.epoch.lock();
        loop {
            if let Some(outcome) = self.poll(handle)? {
                return Ok(outcome);
            }
            if token.is_some_and(CancelToken::is_canceled) {
                return Ok(Outcome::Canceled);
            }
            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => return Ok(Outcome::TimedOut),
                Some(deadline) => deadline - now,
                None => Duration::MAX,
            };
            let sleep = match self.poll_interval {
                Some(interval) => remaining.min(interval),
                None => remaining,
            };
            self.signal.cond.wait_for(&mut epoch, sleep);
        }
    }

    /// Re-reads every in-flight fence, recording completions without
    /// consuming them. Returns how many entries completed.
    pub fn reconcile_all(&self) -> usize {
        let mut slots = self.slots.lock();
        let mut completed = 0;
        for (addr, slot) in slots.iter_mut() {
            if !matches!(slot.state, SlotState::InFlight) {
                continue;
            }
            let resolution = match self.memory.read_fence(*addr) {
                Ok(value) => classify(*addr, slot.expected, value),
                Err(err) => Some(Err(FenceError::Memory(err))),
            };
            if let Some(resolution) = resolution {
                slot.state = SlotState::Completed(resolution);
                completed += 1;
            }
        }
        completed
    }

    /// Removes and returns every completed entry. Used to reclaim slots whose
    /// waiter went away.
    pub fn drain_completed(&self) -> Vec<(PendingHandle, Resolution)> {
        self.reconcile_all();
        let mut slots = self.slots.lock();
        let done: Vec<u64> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot.state, SlotState::Completed(_)))
            .map(|(addr, _)| *addr)
            .collect();
        done.into_iter()
            .filter_map(|addr| {
                let slot = slots.remove(&addr)?;
                match slot.state {
                    SlotState::Completed(resolution) => Some((
                        PendingHandle {
                            fence_addr: addr,
                            expected: slot.expected,
                        },
                        resolution,
                    )),
                    SlotState::InFlight => None,
                }
            })
            .collect()
    }

    /// True while `fence_addr` is tracked, completed or not.
    pub fn is_in_flight(&self, fence_addr: u64) -> bool {
        self.slots.lock().contains_key(&fence_addr)
    }

    /// Number of tracked entries.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}
