//! Process state: call frames, mailbox, the open receive and binary builders.

use std::collections::VecDeque;

use ember_ir::ast::ExceptionClass;
use ember_mir::{BitBuffer, BlockId, FuncId};
use ember_term::Term;

use crate::value::Slots;

/// How a process ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Exit {
    /// The entry function returned.
    Normal(Term),
    /// An exception left the entry function.
    Raised { class: ExceptionClass, reason: Term },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Status {
    #[default]
    Runnable,
    /// Suspended in `receive_wait`.
    Waiting,
    Exited,
}

/// One activation. While a callee runs, the caller's `ip` stays on the
/// call instruction so the result and the handler can be found on return.
#[derive(Clone, Debug)]
pub(crate) struct Frame {
    pub(crate) func: FuncId,
    pub(crate) block: BlockId,
    pub(crate) ip: usize,
    pub(crate) slots: Slots,
}

impl Frame {
    pub(crate) fn new(func: FuncId, entry: BlockId, values: usize) -> Self {
        Frame {
            func,
            block: entry,
            ip: 0,
            slots: Slots::new(values),
        }
    }
}

/// Cursor and deadline of the open receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReceiveState {
    pub(crate) cursor: usize,
    /// Virtual-clock tick at which the receive times out; `None` waits forever.
    pub(crate) deadline: Option<u64>,
}

#[derive(Clone, Debug)]
pub(crate) struct Process {
    pub(crate) id: u64,
    pub(crate) pid: Term,
    pub(crate) frames: Vec<Frame>,
    pub(crate) mailbox: VecDeque<Term>,
    pub(crate) receive: Option<ReceiveState>,
    /// Open builders; a closed one leaves `None` behind so indices stay valid.
    pub(crate) builders: Vec<Option<BitBuffer>>,
    pub(crate) status: Status,
    pub(crate) exit: Option<Exit>,
}

/// Placeholder left in the table while a process runs.
impl Default for Process {
    fn default() -> Self {
        Process {
            id: 0,
            pid: Term::NONE,
            frames: Vec::new(),
            mailbox: VecDeque::new(),
            receive: None,
            builders: Vec::new(),
            status: Status::Runnable,
            exit: None,
        }
    }
}

impl Process {
    pub(crate) fn new(id: u64, pid: Term, entry: Frame) -> Self {
        Process {
            id,
            pid,
            frames: vec![entry],
            ..Process::default()
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.status != Status::Exited
    }

    /// Queue `message`. Returns whether a waiting process became runnable.
    pub(crate) fn deliver(&mut self, message: Term) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.mailbox.push_back(message);
        if self.status == Status::Waiting {
            self.status = Status::Runnable;
            return true;
        }
        false
    }

    pub(crate) fn finish(&mut self, exit: Exit) {
        self.frames.clear();
        self.receive = None;
        self.builders.clear();
        self.status = Status::Exited;
        self.exit = Some(exit);
    }

    /// Deadline of a waiting process, if it has one.
    pub(crate) fn wake_time(&self) -> Option<u64> {
        if self.status == Status::Waiting {
            self.receive.and_then(|r| r.deadline)
        } else {
            None
        }
    }
}
