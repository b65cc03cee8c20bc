use crossbeam_channel::{Receiver, Sender};
use mes_abi::{ErrorCode, Opcode};

/// Fault-injection requests, applied before the next frame is processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Complete the next frame with `opcode` using `code` instead of success.
    FailNext { opcode: Opcode, code: ErrorCode },
    /// Leave completions of `opcode` unwritten until [`Control::Release`].
    Withhold { opcode: Opcode },
    /// Acknowledge every withheld frame and stop withholding.
    Release,
}

/// Cloneable sender side of the simulator's control channel.
#[derive(Clone, Debug)]
pub struct SimControl {
    tx: Sender<Control>,
}

impl SimControl {
    pub(crate) fn channel() -> (Self, Receiver<Control>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    /// Queues a request. Returns false once the simulator is gone.
    pub fn send(&self, control: Control) -> bool {
        self.tx.send(control).is_ok()
    }

    pub fn fail_next(&self, opcode: Opcode, code: ErrorCode) -> bool {
        self.send(Control::FailNext { opcode, code })
    }

    pub fn withhold(&self, opcode: Opcode) -> bool {
        self.send(Control::Withhold { opcode })
    }

    pub fn release(&self) -> bool {
        self.send(Control::Release)
    }
}
