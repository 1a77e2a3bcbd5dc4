//! Process table, scheduler and the public face of the runtime.

use std::collections::VecDeque;
use std::mem;

use ember_ir::StringInterner;
use ember_mir::FuncId;
use ember_term::{Heap, LiteralId, Term};
use ember_verify::VerifiedModule;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::atoms::Atoms;
use crate::config::RuntimeConfig;
use crate::error::EvalError;
use crate::exec::Step;
use crate::process::{Exit, Frame, Process, Status};
use crate::value::Val;

/// Runs a [`VerifiedModule`] with processes, mailboxes and a round-robin
/// scheduler.
///
/// All processes share one [`Heap`]; terms are immutable, so messages are
/// passed by word. Time is a virtual clock counted in the same unit as
/// `after` timeouts. It only moves when every live process is waiting, and
/// then jumps to the earliest deadline.
pub struct Runtime<'m> {
    pub(crate) module: &'m VerifiedModule,
    pub(crate) names: &'m StringInterner,
    pub(crate) config: RuntimeConfig,
    pub(crate) heap: Heap,
    pub(crate) atoms: Atoms,
    /// Indexed by process number.
    pub(crate) processes: Vec<Process>,
    run_queue: VecDeque<usize>,
    pub(crate) clock: u64,
    reductions: u64,
    /// Boxed literals, materialized once.
    pub(crate) literals: FxHashMap<LiteralId, Term>,
}

/// Why a slice ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slice {
    Preempted,
    Waiting,
    Exited,
}

impl<'m> Runtime<'m> {
    pub fn new(module: &'m VerifiedModule, names: &'m StringInterner) -> Self {
        Self::with_config(module, names, RuntimeConfig::default())
    }

    pub fn with_config(
        module: &'m VerifiedModule,
        names: &'m StringInterner,
        config: RuntimeConfig,
    ) -> Self {
        Runtime {
            module,
            names,
            config,
            heap: Heap::new(),
            atoms: Atoms::new(names),
            processes: Vec::new(),
            run_queue: VecDeque::new(),
            clock: 0,
            reductions: 0,
            literals: FxHashMap::default(),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// For building argument terms.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn atom(&self, text: &str) -> Term {
        Term::atom(self.names.intern(text))
    }

    /// Current virtual time.
    pub fn now(&self) -> u64 {
        self.clock
    }

    /// Reductions executed so far.
    pub fn reductions(&self) -> u64 {
        self.reductions
    }

    pub fn render(&self, term: Term) -> String {
        self.heap.render(term, self.names)
    }

    /// Start a process running the source function `name/args.len()`.
    /// Returns its pid.
    pub fn spawn(&mut self, name: &str, args: &[Term]) -> Result<Term, EvalError> {
        let unknown = || EvalError::UnknownFunction {
            name: name.to_owned(),
            arity: args.len(),
        };
        let arity = u32::try_from(args.len()).map_err(|_| unknown())?;
        let func = self
            .names
            .get(name)
            .and_then(|name| self.module.find(name, arity))
            .ok_or_else(unknown)?;
        let args: Vec<Val> = args.iter().map(|&t| Val::Term(t)).collect();
        self.spawn_function(func, &args)
    }

    pub(crate) fn spawn_function(&mut self, func: FuncId, args: &[Val]) -> Result<Term, EvalError> {
        let frame = self.frame_for(func, args)?;
        let id = self.processes.len() as u64;
        let pid = self.heap.pid(id);
        self.processes.push(Process::new(id, pid, frame));
        self.run_queue.push_back(self.processes.len() - 1);
        debug!(pid = id, function = %func, "spawned process");
        Ok(pid)
    }

    /// A fresh activation of `func` with its entry parameters bound.
    pub(crate) fn frame_for(&self, func: FuncId, args: &[Val]) -> Result<Frame, EvalError> {
        let function = self
            .module
            .function(func)
            .ok_or(EvalError::MissingFunction { function: func })?;
        let mut frame = Frame::new(func, function.entry, function.value_count());
        for (&param, &arg) in function.params.iter().zip(args) {
            frame.slots.set(param, arg);
        }
        Ok(frame)
    }

    fn slot_of(&self, pid: Term) -> Option<usize> {
        let id = self.heap.pid_number(pid)?;
        usize::try_from(id).ok().filter(|&i| i < self.processes.len())
    }

    /// Deliver `message` to `pid` from outside any process. Messages to
    /// exited or unknown pids are dropped.
    pub fn send(&mut self, pid: Term, message: Term) {
        self.deliver(pid, message);
    }

    pub(crate) fn deliver(&mut self, pid: Term, message: Term) {
        let Some(slot) = self.slot_of(pid) else {
            return;
        };
        if self.processes[slot].deliver(message) {
            self.run_queue.push_back(slot);
        }
    }

    /// How `pid` ended; `None` while it is still alive.
    pub fn exit_of(&self, pid: Term) -> Option<Exit> {
        self.slot_of(pid).and_then(|slot| self.processes[slot].exit)
    }

    pub fn is_alive(&self, pid: Term) -> bool {
        self.slot_of(pid).is_some_and(|slot| self.processes[slot].is_alive())
    }

    /// Messages still queued for `pid`, oldest first.
    pub fn mailbox(&self, pid: Term) -> Vec<Term> {
        self.slot_of(pid)
            .map(|slot| self.processes[slot].mailbox.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Run until no process can make progress: every process has exited or
    /// waits for a message with no deadline.
    pub fn run(&mut self) -> Result<(), EvalError> {
        loop {
            while let Some(slot) = self.run_queue.pop_front() {
                let mut process = mem::take(&mut self.processes[slot]);
                let outcome = self.run_slice(&mut process);
                self.processes[slot] = process;
                match outcome? {
                    Slice::Preempted => self.run_queue.push_back(slot),
                    Slice::Waiting => self.processes[slot].status = Status::Waiting,
                    Slice::Exited => {}
                }
            }
            if !self.advance_clock() {
                return Ok(());
            }
        }
    }

    /// Move the clock to the earliest receive deadline and wake whoever
    /// reached it. Returns whether anyone woke.
    fn advance_clock(&mut self) -> bool {
        let Some(next) = self.processes.iter().filter_map(Process::wake_time).min() else {
            return false;
        };
        self.clock = self.clock.max(next);
        trace!(now = self.clock, "clock advanced");
        for (slot, process) in self.processes.iter_mut().enumerate() {
            if process.wake_time().is_some_and(|t| t <= self.clock) {
                process.status = Status::Runnable;
                self.run_queue.push_back(slot);
            }
        }
        true
    }

    /// Spawn `name(args)`, run to quiescence and report how it ended.
    pub fn call(&mut self, name: &str, args: &[Term]) -> Result<Option<Exit>, EvalError> {
        let pid = self.spawn(name, args)?;
        self.run()?;
        Ok(self.exit_of(pid))
    }

    fn run_slice(&mut self, process: &mut Process) -> Result<Slice, EvalError> {
        for _ in 0..self.config.reductions_per_slice {
            if self.reductions >= self.config.max_reductions {
                return Err(EvalError::ReductionLimit {
                    limit: self.config.max_reductions,
                });
            }
            self.reductions += 1;
            match self.step(process)? {
                Step::Continue => {}
                Step::Suspend => return Ok(Slice::Waiting),
                Step::Exited => {
                    debug!(pid = process.id, exit = ?process.exit, "process exited");
                    return Ok(Slice::Exited);
                }
            }
        }
        Ok(Slice::Preempted)
    }
}
