//! One step of a process: an instruction or a terminator.

use ember_ir::ast::ExceptionClass;
use ember_mir::{
    encode_segment, BitBuffer, Block, BlockId, FuncId, Function, Instr, Op, RaiseKind, SpawnTarget,
    Terminator, ValueId,
};
use ember_term::{LiteralId, Term};
use ember_verify::VerifiedModule;
use num_bigint::Sign;
use std::cmp::Ordering;

use crate::bifs;
use crate::error::EvalError;
use crate::process::{Exit, Frame, Process, ReceiveState};
use crate::runtime::Runtime;
use crate::value::{Slots, Val};

/// Result of one step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    /// Blocked in `receive_wait`; the same terminator runs again on wake-up.
    Suspend,
    Exited,
}

/// What an instruction asks of the stepper.
enum Flow {
    Next,
    Call { callee: FuncId, args: Vec<Val> },
    Raise(Term),
}

fn function_of(module: &VerifiedModule, func: FuncId) -> Result<&Function, EvalError> {
    module
        .function(func)
        .ok_or(EvalError::MissingFunction { function: func })
}

fn top(process: &Process) -> Result<&Frame, EvalError> {
    process.frames.last().ok_or(EvalError::NoResource {
        op: "step",
        resource: "frame",
    })
}

fn top_mut(process: &mut Process) -> Result<&mut Frame, EvalError> {
    process.frames.last_mut().ok_or(EvalError::NoResource {
        op: "step",
        resource: "frame",
    })
}

fn shape(value: ValueId, expected: &'static str) -> EvalError {
    EvalError::WrongShape { value, expected }
}

fn builder_of(slots: &Slots, value: ValueId) -> Result<usize, EvalError> {
    match slots.native(value)? {
        Val::Builder(index) => Ok(index),
        _ => Err(shape(value, "binary builder")),
    }
}

fn receive_of<'p>(
    slots: &Slots,
    ctx: ValueId,
    receive: &'p mut Option<ReceiveState>,
    op: &'static str,
) -> Result<&'p mut ReceiveState, EvalError> {
    if slots.native(ctx)? != Val::Receive {
        return Err(shape(ctx, "receive context"));
    }
    receive.as_mut().ok_or(EvalError::NoResource {
        op,
        resource: "receive",
    })
}

impl<'m> Runtime<'m> {
    pub(crate) fn step(&mut self, process: &mut Process) -> Result<Step, EvalError> {
        let Some(frame) = process.frames.last() else {
            return Ok(Step::Exited);
        };
        let (func, block_id, ip) = (frame.func, frame.block, frame.ip);
        let function = function_of(self.module, func)?;
        let block = self.block_of(function, block_id)?;
        match block.instrs.get(ip) {
            Some(instr) => {
                let flow = self.exec_op(process, &instr.op)?;
                self.follow(process, instr, flow)
            }
            None => match &block.terminator {
                Some(term) => self.exec_terminator(process, function, block_id, term),
                None => Err(EvalError::Unreachable {
                    function: self.names.lookup(function.name).to_owned(),
                    block: block_id,
                }),
            },
        }
    }

    fn block_of(&self, function: &'m Function, block: BlockId) -> Result<&'m Block, EvalError> {
        function.block(block).ok_or_else(|| EvalError::MissingBlock {
            function: self.names.lookup(function.name).to_owned(),
            block,
        })
    }

    fn follow(&mut self, process: &mut Process, instr: &Instr, flow: Flow) -> Result<Step, EvalError> {
        match flow {
            Flow::Next => {
                top_mut(process)?.ip += 1;
                Ok(Step::Continue)
            }
            Flow::Call { callee, args } => {
                if process.frames.len() >= self.config.max_call_depth {
                    let exception = self.error(self.atoms.system_limit);
                    return self.throw(process, exception, instr.handler);
                }
                let frame = self.frame_for(callee, &args)?;
                process.frames.push(frame);
                Ok(Step::Continue)
            }
            Flow::Raise(exception) => self.throw(process, exception, instr.handler),
        }
    }

    /// The `{Class, Reason}` term handlers receive.
    pub(crate) fn exception(&mut self, class: ExceptionClass, reason: Term) -> Term {
        let class = self.atoms.class(class);
        self.heap.tuple(&[class, reason])
    }

    fn error(&mut self, reason: Term) -> Term {
        self.exception(ExceptionClass::Error, reason)
    }

    /// `{Tag, Value}` error reason.
    fn tagged_error(&mut self, tag: Term, value: Term) -> Term {
        let reason = self.heap.tuple(&[tag, value]);
        self.error(reason)
    }

    fn exit_for(&self, exception: Term) -> Exit {
        let parts = self.heap.tuple_elements(exception).unwrap_or(&[]);
        match parts {
            [class, reason] => match self.atoms.class_of(*class) {
                Some(class) => Exit::Raised {
                    class,
                    reason: *reason,
                },
                None => Exit::Raised {
                    class: ExceptionClass::Error,
                    reason: exception,
                },
            },
            _ => Exit::Raised {
                class: ExceptionClass::Error,
                reason: exception,
            },
        }
    }

    /// The call instruction a suspended caller frame is parked on.
    fn pending_call(&self, frame: &Frame) -> Result<&'m Instr, EvalError> {
        let function = function_of(self.module, frame.func)?;
        self.block_of(function, frame.block)?
            .instrs
            .get(frame.ip)
            .ok_or_else(|| EvalError::NoPendingCall {
                function: self.names.lookup(function.name).to_owned(),
                block: frame.block,
            })
    }

    /// Continue the top frame at `target`, binding its parameters.
    fn jump(&self, process: &mut Process, target: BlockId, args: &[Val]) -> Result<(), EvalError> {
        let frame = top_mut(process)?;
        let function = function_of(self.module, frame.func)?;
        let block = self.block_of(function, target)?;
        for (&param, &arg) in block.params.iter().zip(args) {
            frame.slots.set(param, arg);
        }
        frame.block = target;
        frame.ip = 0;
        Ok(())
    }

    /// Transfer `exception` to `handler`, or unwind through the callers
    /// until a pending call has one. With no handler left the process exits.
    fn throw(
        &mut self,
        process: &mut Process,
        exception: Term,
        handler: Option<BlockId>,
    ) -> Result<Step, EvalError> {
        if let Some(handler) = handler {
            self.jump(process, handler, &[Val::Term(exception)])?;
            return Ok(Step::Continue);
        }
        process.frames.pop();
        while let Some(frame) = process.frames.last() {
            if let Some(handler) = self.pending_call(frame)?.handler {
                self.jump(process, handler, &[Val::Term(exception)])?;
                return Ok(Step::Continue);
            }
            process.frames.pop();
        }
        let exit = self.exit_for(exception);
        process.finish(exit);
        Ok(Step::Exited)
    }

    fn ret(&self, process: &mut Process, value: Term) -> Result<Step, EvalError> {
        process.frames.pop();
        let Some(frame) = process.frames.last_mut() else {
            process.finish(Exit::Normal(value));
            return Ok(Step::Exited);
        };
        let call = self.pending_call(frame)?;
        if let Some(&dst) = call.op.results().first() {
            frame.slots.set(dst, Val::Term(value));
        }
        frame.ip += 1;
        Ok(Step::Continue)
    }

    pub(crate) fn literal(&mut self, id: LiteralId) -> Term {
        let module = self.module;
        let pool = module.literals();
        if let Some(term) = pool.encode_immediate(id) {
            return term;
        }
        if let Some(&term) = self.literals.get(&id) {
            return term;
        }
        let term = pool.materialize(id, &mut self.heap);
        self.literals.insert(id, term);
        term
    }

    /// Lifted function behind `fun` when it is a closure of `arity`;
    /// otherwise the `badfun` or `badarity` exception.
    fn closure_entry(&mut self, fun: Term, args: &[Val]) -> Result<FuncId, Term> {
        let Some(view) = self.heap.closure_parts(fun) else {
            return Err(self.tagged_error(self.atoms.badfun, fun));
        };
        let function = FuncId::new(view.function);
        if usize::try_from(view.arity).ok() == Some(args.len()) {
            return Ok(function);
        }
        let terms: Vec<Term> = args
            .iter()
            .map(|arg| match arg {
                Val::Term(term) => *term,
                _ => Term::NONE,
            })
            .collect();
        let list = self.heap.list(&terms);
        let pair = self.heap.tuple(&[fun, list]);
        Err(self.tagged_error(self.atoms.badarity, pair))
    }

    fn exec_op(&mut self, process: &mut Process, op: &Op) -> Result<Flow, EvalError> {
        let Process {
            pid,
            frames,
            mailbox,
            receive,
            builders,
            ..
        } = process;
        let slots = &mut frames
            .last_mut()
            .ok_or(EvalError::NoResource {
                op: op.mnemonic(),
                resource: "frame",
            })?
            .slots;

        match op {
            Op::ConstInt { dst, value, .. } => slots.set(*dst, Val::Int(*value)),
            Op::ConstTerm { dst, literal } => {
                let term = self.literal(*literal);
                slots.set(*dst, Val::Term(term));
            }
            Op::TermKindOf { dst, value } => {
                let kind = self.heap.kind_of(slots.term(*value)?);
                slots.set(*dst, Val::Int(i64::from(kind.code())));
            }
            Op::IsKind { dst, value, kind } => {
                let actual = self.heap.kind_of(slots.term(*value)?);
                slots.set(*dst, Val::bool(actual == *kind));
            }
            Op::IsNone { dst, value } => {
                let none = slots.term(*value)?.is_none();
                slots.set(*dst, Val::bool(none));
            }
            Op::UntagInt { dst, value } => {
                let int = slots
                    .term(*value)?
                    .as_small_int()
                    .ok_or_else(|| shape(*value, "small integer"))?;
                slots.set(*dst, Val::Int(int));
            }
            Op::TagInt { dst, value } => {
                let term = self.heap.integer(slots.int(*value)?);
                slots.set(*dst, Val::Term(term));
            }
            Op::TupleArity { dst, tuple } => {
                let len = self
                    .heap
                    .tuple_elements(slots.term(*tuple)?)
                    .map(<[Term]>::len)
                    .ok_or_else(|| shape(*tuple, "tuple"))?;
                slots.set(*dst, Val::Int(i64::try_from(len).unwrap_or(i64::MAX)));
            }
            Op::AtomIndex { dst, atom } => {
                let name = slots
                    .term(*atom)?
                    .as_atom()
                    .ok_or_else(|| shape(*atom, "atom"))?;
                slots.set(*dst, Val::Int(i64::from(name.raw())));
            }
            Op::BoolToTerm { dst, value } => {
                let term = self.atoms.boolean(slots.flag(*value)?);
                slots.set(*dst, Val::Term(term));
            }
            Op::TermToBool { dst, value } => {
                let truth = slots.term(*value)? == self.atoms.true_;
                slots.set(*dst, Val::bool(truth));
            }
            Op::CheckedArith {
                dst,
                overflow,
                op,
                lhs,
                rhs,
            } => {
                let (value, overflowed) = match op.apply(slots.int(*lhs)?, slots.int(*rhs)?) {
                    Some(value) => (value, false),
                    None => (0, true),
                };
                slots.set(*dst, Val::Int(value));
                slots.set(*overflow, Val::bool(overflowed));
            }
            Op::IntCmp {
                dst,
                pred,
                lhs,
                rhs,
            } => {
                let holds = pred.eval(slots.int(*lhs)?, slots.int(*rhs)?);
                slots.set(*dst, Val::bool(holds));
            }
            Op::IntBitwise { dst, op, lhs, rhs } => {
                let value = op.eval(slots.int(*lhs)?, slots.int(*rhs)?);
                slots.set(*dst, Val::Int(value));
            }
            Op::TermEq {
                dst,
                exact,
                lhs,
                rhs,
            } => {
                let (a, b) = (slots.term(*lhs)?, slots.term(*rhs)?);
                let equal = if *exact {
                    self.heap.exact_eq(a, b)
                } else {
                    self.heap.arith_eq(a, b)
                };
                slots.set(*dst, Val::bool(equal));
            }
            Op::TermCompare { dst, lhs, rhs } => {
                let order = match self.heap.compare(slots.term(*lhs)?, slots.term(*rhs)?) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                };
                slots.set(*dst, Val::Int(order));
            }
            Op::RuntimeCall { dst, func, args } => {
                let args = slots.terms(args)?;
                match bifs::apply(&mut self.heap, &self.atoms, *func, &args) {
                    Some(Ok(term)) => slots.set(*dst, Val::Term(term)),
                    Some(Err(fault)) => {
                        let reason = fault.reason(&self.atoms);
                        return Ok(Flow::Raise(self.error(reason)));
                    }
                    None => return Err(EvalError::NotCallable(*func)),
                }
            }
            Op::Call { callee, args, .. } => {
                return Ok(Flow::Call {
                    callee: *callee,
                    args: args.iter().map(|&a| slots.get(a)).collect(),
                });
            }
            Op::CallExternal { .. } => return Ok(Flow::Raise(self.error(self.atoms.undef))),
            Op::MakeTuple { dst, elements } => {
                let elements = slots.terms(elements)?;
                let term = self.heap.tuple(&elements);
                slots.set(*dst, Val::Term(term));
            }
            Op::MakeCons { dst, head, tail } => {
                let term = self.heap.cons(slots.term(*head)?, slots.term(*tail)?);
                slots.set(*dst, Val::Term(term));
            }
            Op::MakeMap { dst, entries } => {
                let entries = entries
                    .iter()
                    .map(|&(k, v)| Ok((slots.term(k)?, slots.term(v)?)))
                    .collect::<Result<Vec<_>, EvalError>>()?;
                let term = self.heap.map(&entries);
                slots.set(*dst, Val::Term(term));
            }
            Op::BinaryInit { dst } => {
                builders.push(Some(BitBuffer::new()));
                slots.set(*dst, Val::Builder(builders.len() - 1));
            }
            Op::BinaryPut {
                builder,
                value,
                size,
                spec,
            } => {
                let index = builder_of(slots, *builder)?;
                let value = slots.term(*value)?;
                let size = size.map(|s| slots.term(s)).transpose()?;
                let buf = builders
                    .get_mut(index)
                    .and_then(Option::as_mut)
                    .ok_or(EvalError::NoResource {
                        op: "binary_put",
                        resource: "binary builder",
                    })?;
                if encode_segment(&self.heap, buf, value, size, *spec).is_err() {
                    builders[index] = None;
                    return Ok(Flow::Raise(self.error(self.atoms.badarg)));
                }
            }
            Op::BinaryFinish { dst, builder } => {
                let index = builder_of(slots, *builder)?;
                let buf = builders
                    .get_mut(index)
                    .and_then(Option::take)
                    .ok_or(EvalError::NoResource {
                        op: "binary_finish",
                        resource: "binary builder",
                    })?;
                let (bytes, bits) = buf.into_parts();
                let term = self.heap.bitstring(&bytes, bits);
                slots.set(*dst, Val::Term(term));
            }
            Op::GetTupleElement { dst, tuple, index } => {
                let term = self
                    .heap
                    .tuple_elements(slots.term(*tuple)?)
                    .and_then(|elements| elements.get(*index as usize))
                    .copied()
                    .ok_or_else(|| shape(*tuple, "tuple"))?;
                slots.set(*dst, Val::Term(term));
            }
            Op::GetHead { dst, cons } | Op::GetTail { dst, cons } => {
                let (head, tail) = self
                    .heap
                    .cons_parts(slots.term(*cons)?)
                    .ok_or_else(|| shape(*cons, "cons cell"))?;
                let part = if matches!(op, Op::GetHead { .. }) { head } else { tail };
                slots.set(*dst, Val::Term(part));
            }
            Op::BinaryMatch {
                dst,
                binary,
                shape: layout,
                sizes,
            } => {
                let binary = slots.term(*binary)?;
                let sizes = slots.terms(sizes)?;
                let state = match layout.decode(&mut self.heap, binary, &sizes) {
                    Some(segments) => self.heap.tuple(&segments),
                    None => Term::NONE,
                };
                slots.set(*dst, Val::Term(state));
            }
            Op::BinarySegment { dst, state, index }
            | Op::GetEnv {
                dst,
                closure: state,
                index,
            } => {
                let term = slots.term(*state)?;
                let fields = match op {
                    Op::GetEnv { .. } => self.heap.closure_parts(term).map(|view| view.env),
                    _ => self.heap.tuple_elements(term),
                };
                let field = fields
                    .and_then(|fields| fields.get(*index as usize))
                    .copied()
                    .ok_or_else(|| shape(*state, "segment tuple or closure"))?;
                slots.set(*dst, Val::Term(field));
            }
            Op::TryEnter { .. } | Op::TryExit => {}
            Op::ExceptionClassTerm { dst, exception } | Op::ExceptionReason { dst, exception } => {
                let index = usize::from(matches!(op, Op::ExceptionReason { .. }));
                let part = self
                    .heap
                    .tuple_elements(slots.term(*exception)?)
                    .and_then(|parts| parts.get(index))
                    .copied()
                    .ok_or_else(|| shape(*exception, "exception"))?;
                slots.set(*dst, Val::Term(part));
            }
            Op::MakeClosure {
                dst,
                function,
                arity,
                env,
            } => {
                let env = slots.terms(env)?;
                let term = self.heap.closure(function.raw(), *arity, &env);
                slots.set(*dst, Val::Term(term));
            }
            Op::ClosureArity { dst, closure } | Op::ClosureFunc { dst, closure } => {
                let view = self
                    .heap
                    .closure_parts(slots.term(*closure)?)
                    .ok_or_else(|| shape(*closure, "closure"))?;
                let val = match op {
                    Op::ClosureArity { .. } => Val::Int(i64::from(view.arity)),
                    _ => Val::Code(FuncId::new(view.function)),
                };
                slots.set(*dst, val);
            }
            Op::CallIndirect {
                func,
                closure,
                args,
                ..
            } => {
                let Val::Code(callee) = slots.native(*func)? else {
                    return Err(shape(*func, "code pointer"));
                };
                let mut call_args = vec![Val::Term(slots.term(*closure)?)];
                call_args.extend(args.iter().map(|&a| slots.get(a)));
                return Ok(Flow::Call {
                    callee,
                    args: call_args,
                });
            }
            Op::Spawn { dst, target, args } => {
                let args: Vec<Val> = args.iter().map(|&a| slots.get(a)).collect();
                let child = match target {
                    SpawnTarget::Direct(func) => self.spawn_function(*func, &args)?,
                    SpawnTarget::Closure(closure) => {
                        let fun = slots.term(*closure)?;
                        match self.closure_entry(fun, &args) {
                            Ok(func) => {
                                let mut entry_args = vec![Val::Term(fun)];
                                entry_args.extend(args);
                                self.spawn_function(func, &entry_args)?
                            }
                            Err(exception) => return Ok(Flow::Raise(exception)),
                        }
                    }
                };
                slots.set(*dst, Val::Term(child));
            }
            Op::Send { dst, to, message } => {
                let (to, message) = (slots.term(*to)?, slots.term(*message)?);
                if self.heap.exact_eq(to, *pid) {
                    mailbox.push_back(message);
                } else {
                    self.deliver(to, message);
                }
                slots.set(*dst, Val::Term(message));
            }
            Op::SelfPid { dst } => slots.set(*dst, Val::Term(*pid)),
            Op::ReceiveStart { dst, timeout } => {
                let timeout = slots.term(*timeout)?;
                let deadline = if timeout == self.atoms.infinity {
                    None
                } else {
                    match self.heap.integer_value(timeout) {
                        Some(after) if after.sign() != Sign::Minus => {
                            let after = u64::try_from(&after).unwrap_or(u64::MAX);
                            Some(self.clock.saturating_add(after))
                        }
                        _ => return Ok(Flow::Raise(self.error(self.atoms.timeout_value))),
                    }
                };
                *receive = Some(ReceiveState {
                    cursor: 0,
                    deadline,
                });
                slots.set(*dst, Val::Receive);
            }
            Op::ReceiveMessage { dst, ctx } => {
                let state = receive_of(slots, *ctx, receive, "receive_message")?;
                let message = mailbox.get(state.cursor).copied().ok_or(EvalError::NoResource {
                    op: "receive_message",
                    resource: "message",
                })?;
                slots.set(*dst, Val::Term(message));
            }
            Op::ReceiveNext { ctx } => {
                receive_of(slots, *ctx, receive, "receive_next")?.cursor += 1;
            }
            Op::ReceiveDone { ctx } => {
                let cursor = receive_of(slots, *ctx, receive, "receive_done")?.cursor;
                mailbox.remove(cursor);
                *receive = None;
            }
        }
        Ok(Flow::Next)
    }

    fn exec_terminator(
        &mut self,
        process: &mut Process,
        function: &'m Function,
        block: BlockId,
        term: &'m Terminator,
    ) -> Result<Step, EvalError> {
        let slots = &top(process)?.slots;
        match term {
            Terminator::Return { value } => {
                let value = slots.term(*value)?;
                self.ret(process, value)
            }
            Terminator::Jump { target, args } => {
                let args: Vec<Val> = args.iter().map(|&a| slots.get(a)).collect();
                self.jump(process, *target, &args)?;
                Ok(Step::Continue)
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let target = if slots.flag(*cond)? { *then_block } else { *else_block };
                self.jump(process, target, &[])?;
                Ok(Step::Continue)
            }
            Terminator::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let value = slots.int(*scrutinee)?;
                let target = cases
                    .iter()
                    .find(|&&(case, _)| case == value)
                    .map_or(*default, |&(_, target)| target);
                self.jump(process, target, &[])?;
                Ok(Step::Continue)
            }
            Terminator::MapLookup {
                map,
                key,
                found,
                absent,
            } => {
                match self.heap.map_get(slots.term(*map)?, slots.term(*key)?) {
                    Some(value) => self.jump(process, *found, &[Val::Term(value)])?,
                    None => self.jump(process, *absent, &[])?,
                }
                Ok(Step::Continue)
            }
            Terminator::ReceiveWait {
                ctx,
                message,
                timeout,
            } => {
                if slots.native(*ctx)? != Val::Receive {
                    return Err(shape(*ctx, "receive context"));
                }
                let state = process.receive.ok_or(EvalError::NoResource {
                    op: "receive_wait",
                    resource: "receive",
                })?;
                if state.cursor < process.mailbox.len() {
                    self.jump(process, *message, &[])?;
                } else if state.deadline.is_some_and(|deadline| deadline <= self.clock) {
                    self.jump(process, *timeout, &[])?;
                } else {
                    return Ok(Step::Suspend);
                }
                Ok(Step::Continue)
            }
            Terminator::Raise { kind, handler } => {
                let exception = match kind {
                    RaiseKind::New { class, reason } => {
                        let reason = slots.term(*reason)?;
                        self.exception(*class, reason)
                    }
                    RaiseKind::Rethrow { exception } => slots.term(*exception)?,
                };
                self.throw(process, exception, *handler)
            }
            Terminator::CatchDispatch {
                exception,
                cases,
                otherwise,
            } => {
                let class = self
                    .heap
                    .tuple_elements(slots.term(*exception)?)
                    .and_then(|parts| parts.first())
                    .and_then(|&atom| self.atoms.class_of(atom));
                let target = cases
                    .iter()
                    .find(|&&(case, _)| Some(case) == class)
                    .map_or(*otherwise, |&(_, target)| target);
                self.jump(process, target, &[])?;
                Ok(Step::Continue)
            }
            Terminator::Unreachable => Err(EvalError::Unreachable {
                function: self.names.lookup(function.name).to_owned(),
                block,
            }),
        }
    }
}
