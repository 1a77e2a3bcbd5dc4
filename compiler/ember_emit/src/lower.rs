//! Per-function walk from MIR to [`MachInstr`]s.

use ember_ir::ast::{Endianness, ExceptionClass, SegmentSpec, SegmentType};
use ember_ir::StringInterner;
use ember_mir::{
    BinaryShape, BlockId, FuncId, Function, Instr, IntPredicate, Op, RaiseKind, RuntimeFn,
    SpawnTarget, Terminator, ValueId,
};
use ember_term::{
    BoxedKind, Header, LiteralPool, Term, TermKind, HEADER_KIND_BITS, NIL_RAW, NONE_RAW,
    TAG_ATOM, TAG_BITS, TAG_LIST, TAG_MASK, TAG_SMALL_INT, WORD_BYTES,
};
use tracing::trace;

use crate::error::EmitError;
use crate::mach::{AluOp, Callee, Label, MachInstr, Operand, Slot};
use crate::moves;
use crate::sink::{BackendSink, FunctionHeader};

/// Reinterpret a term word as a signed immediate.
#[allow(clippy::cast_possible_wrap, reason = "term words are bit patterns")]
pub(crate) const fn word(raw: u64) -> i64 {
    raw as i64
}

/// Byte offset of payload word `index` behind a header.
fn payload(index: u64) -> i32 {
    i32::try_from((index + 1) * WORD_BYTES).unwrap_or(i32::MAX)
}

// Closure layout: header, function index, arity, environment.
const CLOSURE_FUNC: u64 = 0;
const CLOSURE_ARITY: u64 = 1;
const CLOSURE_ENV: u64 = 2;

// Cons cells are untagged by folding the list tag into the offset.
#[allow(clippy::cast_possible_truncation, reason = "tag and word size are tiny")]
const HEAD: i32 = -(TAG_LIST as i32);
#[allow(clippy::cast_possible_truncation, reason = "tag and word size are tiny")]
const TAIL: i32 = WORD_BYTES as i32 - TAG_LIST as i32;

/// Atom words the generated code compares against.
#[derive(Clone, Copy, Debug)]
pub(crate) struct WellKnown {
    true_atom: i64,
    false_atom: i64,
    classes: [(ExceptionClass, i64); 3],
}

impl WellKnown {
    pub(crate) fn new(interner: &StringInterner) -> Self {
        let atom = |s: &str| word(Term::atom(interner.intern(s)).raw());
        WellKnown {
            true_atom: atom("true"),
            false_atom: atom("false"),
            classes: ExceptionClass::ALL.map(|class| (class, atom(class.as_str()))),
        }
    }

    fn class_atom(&self, class: ExceptionClass) -> i64 {
        self.classes
            .iter()
            .find(|(c, _)| *c == class)
            .map_or(0, |(_, atom)| *atom)
    }
}

/// Module-wide state shared by every function's walk.
pub(crate) struct Context<'a> {
    pub names: &'a StringInterner,
    pub literals: &'a LiteralPool,
    pub symbols: Vec<String>,
    pub atoms: WellKnown,
}

/// Pack a segment spec into the immediate `__ember_bs_put` takes:
/// bits 0-1 type, bit 2 signed, bit 3 little-endian, bits 8.. unit.
pub(crate) fn pack_spec(spec: SegmentSpec) -> i64 {
    let ty = match spec.ty {
        SegmentType::Integer => 0,
        SegmentType::Float => 1,
        SegmentType::Binary => 2,
    };
    let signed = i64::from(spec.signed) << 2;
    let little = i64::from(spec.endian == Endianness::Little) << 3;
    ty | signed | little | (i64::from(spec.unit) << 8)
}

pub(crate) fn emit_function(
    cx: &Context<'_>,
    id: FuncId,
    func: &Function,
    sink: &mut dyn BackendSink,
) -> Result<(), EmitError> {
    let symbol = cx.symbols.get(id.index()).cloned().unwrap_or_default();
    let slots = u32::try_from(func.value_count()).map_err(|_| EmitError::TooManySlots {
        function: symbol.clone(),
        count: func.value_count(),
    })?;
    let shapes: Vec<BinaryShape> = func
        .blocks
        .iter()
        .flat_map(|b| &b.instrs)
        .filter_map(|instr| match &instr.op {
            Op::BinaryMatch { shape, .. } => Some(shape.clone()),
            _ => None,
        })
        .collect();

    sink.begin_function(FunctionHeader {
        id,
        symbol: symbol.clone(),
        params: func.params.iter().map(|&p| Slot::of(p)).collect(),
        slots,
        shapes,
    });

    let mut walk = Walk {
        cx,
        func,
        symbol,
        sink,
        next_shape: 0,
    };
    for block in &func.blocks {
        walk.put(MachInstr::Label(label(block.id)));
        for instr in &block.instrs {
            walk.instr(instr);
        }
        if let Some(term) = &block.terminator {
            walk.terminator(term)?;
        }
    }
    walk.sink.end_function();

    trace!(function = %walk.symbol, blocks = func.blocks.len(), "emitted function");
    Ok(())
}

fn label(block: BlockId) -> Label {
    Label(block.raw())
}

fn slot(value: ValueId) -> Slot {
    Slot::of(value)
}

fn imm_u64(value: u64) -> Operand {
    Operand::Imm(word(value))
}

struct Walk<'a, 'cx> {
    cx: &'a Context<'cx>,
    func: &'a Function,
    symbol: String,
    sink: &'a mut dyn BackendSink,
    next_shape: i64,
}

impl Walk<'_, '_> {
    fn put(&mut self, instr: MachInstr) {
        self.sink.instr(instr);
    }

    fn alu(&mut self, dst: ValueId, op: AluOp, lhs: impl Into<Operand>, rhs: Operand) {
        self.put(MachInstr::Alu {
            dst: slot(dst),
            op,
            lhs: lhs.into(),
            rhs,
        });
    }

    fn cmp(&mut self, dst: Slot, pred: IntPredicate, lhs: impl Into<Operand>, rhs: Operand) {
        self.put(MachInstr::Cmp {
            dst,
            pred,
            lhs: lhs.into(),
            rhs,
        });
    }

    fn load(&mut self, dst: Slot, base: ValueId, offset: i32) {
        self.put(MachInstr::Load {
            dst,
            base: slot(base),
            offset,
        });
    }

    fn call(&mut self, dst: Option<ValueId>, callee: Callee, args: Vec<Operand>, handler: Option<BlockId>) {
        self.put(MachInstr::Call {
            dst: dst.map(slot),
            callee,
            args,
            unwind: handler.map(label),
        });
    }

    fn runtime(&mut self, dst: Option<ValueId>, func: RuntimeFn, args: Vec<Operand>, handler: Option<BlockId>) {
        self.call(dst, Callee::Runtime(func), args, handler);
    }

    fn operands(values: &[ValueId]) -> Vec<Operand> {
        values.iter().map(|&v| Operand::from(v)).collect()
    }

    /// Allocate a boxed object of `payload` words behind a header.
    fn alloc_boxed(&mut self, dst: ValueId, header: u64, payload_words: u64) {
        self.runtime(
            Some(dst),
            RuntimeFn::Alloc,
            vec![imm_u64(payload_words + 1)],
            None,
        );
        self.put(MachInstr::Store {
            base: slot(dst),
            offset: 0,
            src: imm_u64(header),
        });
    }

    fn instr(&mut self, instr: &Instr) {
        let handler = instr.handler;
        match &instr.op {
            Op::ConstInt { dst, value, .. } => self.put(MachInstr::LoadImm {
                dst: slot(*dst),
                value: *value,
            }),
            Op::ConstTerm { dst, literal } => match self.cx.literals.encode_immediate(*literal) {
                Some(term) => self.put(MachInstr::LoadImm {
                    dst: slot(*dst),
                    value: word(term.raw()),
                }),
                None => self.put(MachInstr::LoadLiteral {
                    dst: slot(*dst),
                    literal: *literal,
                }),
            },
            Op::TermKindOf { dst, value } => self.put(MachInstr::Classify {
                dst: slot(*dst),
                value: slot(*value),
            }),
            Op::IsKind { dst, value, kind } => self.is_kind(*dst, *value, *kind),
            Op::IsNone { dst, value } => {
                self.cmp(slot(*dst), IntPredicate::Eq, *value, imm_u64(NONE_RAW));
            }
            Op::UntagInt { dst, value } => {
                self.alu(*dst, AluOp::Sar, *value, imm_u64(u64::from(TAG_BITS)));
            }
            Op::TagInt { dst, value } => {
                self.alu(*dst, AluOp::Shl, *value, imm_u64(u64::from(TAG_BITS)));
                self.alu(*dst, AluOp::Or, *dst, imm_u64(TAG_SMALL_INT));
            }
            Op::TupleArity { dst, tuple } => {
                self.load(slot(*dst), *tuple, 0);
                self.alu(*dst, AluOp::Shr, *dst, imm_u64(u64::from(HEADER_KIND_BITS)));
            }
            Op::AtomIndex { dst, atom } => {
                self.alu(*dst, AluOp::Shr, *atom, imm_u64(u64::from(TAG_BITS)));
            }
            Op::BoolToTerm { dst, value } => self.put(MachInstr::Select {
                dst: slot(*dst),
                cond: slot(*value),
                if_true: Operand::Imm(self.cx.atoms.true_atom),
                if_false: Operand::Imm(self.cx.atoms.false_atom),
            }),
            Op::TermToBool { dst, value } => {
                let true_atom = Operand::Imm(self.cx.atoms.true_atom);
                self.cmp(slot(*dst), IntPredicate::Eq, *value, true_atom);
            }
            Op::CheckedArith {
                dst,
                overflow,
                op,
                lhs,
                rhs,
            } => self.put(MachInstr::AluChecked {
                dst: slot(*dst),
                overflow: slot(*overflow),
                op: *op,
                lhs: slot(*lhs),
                rhs: slot(*rhs),
            }),
            Op::IntCmp {
                dst,
                pred,
                lhs,
                rhs,
            } => self.cmp(slot(*dst), *pred, *lhs, Operand::from(*rhs)),
            Op::IntBitwise { dst, op, lhs, rhs } => {
                let op = match op {
                    ember_mir::BitwiseOp::And => AluOp::And,
                    ember_mir::BitwiseOp::Or => AluOp::Or,
                    ember_mir::BitwiseOp::Xor => AluOp::Xor,
                };
                self.alu(*dst, op, *lhs, Operand::from(*rhs));
            }
            Op::TermEq {
                dst,
                exact,
                lhs,
                rhs,
            } => {
                let func = if *exact {
                    RuntimeFn::ExactEqual
                } else {
                    RuntimeFn::Equal
                };
                self.runtime(Some(*dst), func, Self::operands(&[*lhs, *rhs]), None);
            }
            Op::TermCompare { dst, lhs, rhs } => {
                self.runtime(
                    Some(*dst),
                    RuntimeFn::Compare,
                    Self::operands(&[*lhs, *rhs]),
                    None,
                );
            }
            Op::RuntimeCall { dst, func, args } => {
                self.runtime(Some(*dst), *func, Self::operands(args), handler);
            }
            Op::Call { dst, callee, args } => {
                self.call(Some(*dst), Callee::Local(*callee), Self::operands(args), handler);
            }
            Op::CallExternal {
                dst,
                module,
                function,
                args,
            } => {
                let symbol = format!(
                    "{}:{}/{}",
                    self.cx.names.lookup(*module),
                    self.cx.names.lookup(*function),
                    args.len()
                );
                self.call(Some(*dst), Callee::External(symbol), Self::operands(args), handler);
            }
            Op::MakeTuple { dst, elements } => {
                let arity = elements.len() as u64;
                self.alloc_boxed(*dst, Header::new(BoxedKind::Tuple, arity).raw(), arity);
                for (i, &element) in elements.iter().enumerate() {
                    self.put(MachInstr::Store {
                        base: slot(*dst),
                        offset: payload(i as u64),
                        src: element.into(),
                    });
                }
            }
            Op::MakeCons { dst, head, tail } => {
                self.runtime(Some(*dst), RuntimeFn::Alloc, vec![Operand::Imm(2)], None);
                self.put(MachInstr::Store {
                    base: slot(*dst),
                    offset: 0,
                    src: (*head).into(),
                });
                self.put(MachInstr::Store {
                    base: slot(*dst),
                    offset: payload(0),
                    src: (*tail).into(),
                });
                self.alu(*dst, AluOp::Or, *dst, imm_u64(TAG_LIST));
            }
            Op::MakeMap { dst, entries } => {
                let args = entries
                    .iter()
                    .flat_map(|&(k, v)| [Operand::from(k), Operand::from(v)])
                    .collect();
                self.runtime(Some(*dst), RuntimeFn::MakeMap, args, None);
            }
            Op::BinaryInit { dst } => self.runtime(Some(*dst), RuntimeFn::BinaryInit, vec![], None),
            Op::BinaryPut {
                builder,
                value,
                size,
                spec,
            } => {
                let size = size.map_or(imm_u64(NONE_RAW), Operand::from);
                let args = vec![
                    (*builder).into(),
                    (*value).into(),
                    size,
                    Operand::Imm(pack_spec(*spec)),
                ];
                self.runtime(None, RuntimeFn::BinaryPut, args, handler);
            }
            Op::BinaryFinish { dst, builder } => {
                self.runtime(
                    Some(*dst),
                    RuntimeFn::BinaryFinish,
                    vec![(*builder).into()],
                    None,
                );
            }
            Op::GetTupleElement { dst, tuple, index } => {
                self.load(slot(*dst), *tuple, payload(u64::from(*index)));
            }
            Op::GetHead { dst, cons } => self.load(slot(*dst), *cons, HEAD),
            Op::GetTail { dst, cons } => self.load(slot(*dst), *cons, TAIL),
            Op::BinaryMatch {
                dst, binary, sizes, ..
            } => {
                let mut args = vec![Operand::from(*binary), Operand::Imm(self.next_shape)];
                args.extend(sizes.iter().map(|&s| Operand::from(s)));
                self.next_shape += 1;
                self.runtime(Some(*dst), RuntimeFn::BinaryMatch, args, None);
            }
            Op::BinarySegment { dst, state, index } => {
                let args = vec![(*state).into(), Operand::Imm(i64::from(*index))];
                self.runtime(Some(*dst), RuntimeFn::BinarySegment, args, None);
            }
            Op::TryEnter { handler } => {
                self.runtime(
                    None,
                    RuntimeFn::TryEnter,
                    vec![Operand::Label(label(*handler))],
                    None,
                );
            }
            Op::TryExit => self.runtime(None, RuntimeFn::TryExit, vec![], None),
            // Exception terms are `{Class, Reason}` tuples.
            Op::ExceptionClassTerm { dst, exception } => self.load(slot(*dst), *exception, payload(0)),
            Op::ExceptionReason { dst, exception } => self.load(slot(*dst), *exception, payload(1)),
            Op::MakeClosure {
                dst,
                function,
                arity,
                env,
            } => {
                let mut args = vec![Operand::Code(*function), Operand::Imm(i64::from(*arity))];
                args.extend(env.iter().map(|&v| Operand::from(v)));
                self.runtime(Some(*dst), RuntimeFn::MakeClosure, args, None);
            }
            Op::GetEnv {
                dst,
                closure,
                index,
            } => self.load(slot(*dst), *closure, payload(CLOSURE_ENV + u64::from(*index))),
            Op::ClosureArity { dst, closure } => {
                self.load(slot(*dst), *closure, payload(CLOSURE_ARITY));
            }
            Op::ClosureFunc { dst, closure } => {
                self.load(slot(*dst), *closure, payload(CLOSURE_FUNC));
            }
            Op::CallIndirect {
                dst,
                func,
                closure,
                args,
            } => {
                let mut operands = vec![Operand::from(*closure)];
                operands.extend(args.iter().map(|&v| Operand::from(v)));
                self.call(Some(*dst), Callee::Indirect(slot(*func)), operands, handler);
            }
            Op::Spawn { dst, target, args } => match target {
                SpawnTarget::Direct(function) => {
                    let mut operands = vec![Operand::Code(*function)];
                    operands.extend(args.iter().map(|&v| Operand::from(v)));
                    self.runtime(Some(*dst), RuntimeFn::Spawn, operands, None);
                }
                SpawnTarget::Closure(closure) => {
                    let mut operands = vec![Operand::from(*closure)];
                    operands.extend(args.iter().map(|&v| Operand::from(v)));
                    self.runtime(Some(*dst), RuntimeFn::SpawnClosure, operands, handler);
                }
            },
            Op::Send { dst, to, message } => {
                self.runtime(Some(*dst), RuntimeFn::Send, Self::operands(&[*to, *message]), None);
            }
            Op::SelfPid { dst } => self.runtime(Some(*dst), RuntimeFn::SelfPid, vec![], None),
            Op::ReceiveStart { dst, timeout } => {
                self.runtime(
                    Some(*dst),
                    RuntimeFn::ReceiveStart,
                    vec![(*timeout).into()],
                    handler,
                );
            }
            Op::ReceiveMessage { dst, ctx } => {
                self.runtime(Some(*dst), RuntimeFn::ReceiveMessage, vec![(*ctx).into()], None);
            }
            Op::ReceiveNext { ctx } => {
                self.runtime(None, RuntimeFn::ReceiveNext, vec![(*ctx).into()], None);
            }
            Op::ReceiveDone { ctx } => {
                self.runtime(None, RuntimeFn::ReceiveDone, vec![(*ctx).into()], None);
            }
        }
    }

    fn is_kind(&mut self, dst: ValueId, value: ValueId, kind: TermKind) {
        let out = slot(dst);
        match kind {
            TermKind::Nil => self.cmp(out, IntPredicate::Eq, value, imm_u64(NIL_RAW)),
            TermKind::None => self.cmp(out, IntPredicate::Eq, value, imm_u64(NONE_RAW)),
            TermKind::SmallInt | TermKind::Atom | TermKind::Cons => {
                let tag = match kind {
                    TermKind::SmallInt => TAG_SMALL_INT,
                    TermKind::Atom => TAG_ATOM,
                    _ => TAG_LIST,
                };
                self.alu(dst, AluOp::And, value, imm_u64(TAG_MASK));
                self.cmp(out, IntPredicate::Eq, out, imm_u64(tag));
            }
            _ => {
                self.put(MachInstr::Classify {
                    dst: out,
                    value: slot(value),
                });
                self.cmp(out, IntPredicate::Eq, out, Operand::Imm(i64::from(kind.code())));
            }
        }
    }

    fn terminator(&mut self, term: &Terminator) -> Result<(), EmitError> {
        match term {
            Terminator::Return { value } => self.put(MachInstr::Return(slot(*value))),
            Terminator::Jump { target, args } => {
                let params = self
                    .func
                    .block(*target)
                    .map(|b| b.params.as_slice())
                    .unwrap_or_default();
                let pairs: Vec<(Slot, Slot)> = params
                    .iter()
                    .zip(args)
                    .map(|(&p, &a)| (slot(p), slot(a)))
                    .collect();
                for (dst, src) in moves::sequentialize(&pairs) {
                    self.put(MachInstr::Move { dst, src });
                }
                self.put(MachInstr::Jump(label(*target)));
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => self.put(MachInstr::Branch {
                cond: slot(*cond),
                then_label: label(*then_block),
                else_label: label(*else_block),
            }),
            Terminator::Switch {
                scrutinee,
                cases,
                default,
            } => self.put(MachInstr::Switch {
                value: slot(*scrutinee),
                cases: cases.iter().map(|&(v, b)| (v, label(b))).collect(),
                default: label(*default),
            }),
            Terminator::MapLookup {
                map,
                key,
                found,
                absent,
            } => {
                let param = self
                    .func
                    .block(*found)
                    .and_then(|b| b.params.first().copied())
                    .ok_or_else(|| EmitError::MissingLookupParam {
                        function: self.symbol.clone(),
                        block: *found,
                    })?;
                self.runtime(
                    Some(param),
                    RuntimeFn::MapGet,
                    Self::operands(&[*map, *key]),
                    None,
                );
                self.put(MachInstr::Switch {
                    value: slot(param),
                    cases: vec![(word(NONE_RAW), label(*absent))],
                    default: label(*found),
                });
            }
            Terminator::ReceiveWait {
                ctx,
                message,
                timeout,
            } => {
                self.put(MachInstr::Call {
                    dst: Some(Slot::SCRATCH),
                    callee: Callee::Runtime(RuntimeFn::ReceiveWait),
                    args: vec![(*ctx).into()],
                    unwind: None,
                });
                self.put(MachInstr::Branch {
                    cond: Slot::SCRATCH,
                    then_label: label(*message),
                    else_label: label(*timeout),
                });
            }
            Terminator::Raise { kind, handler } => {
                match kind {
                    RaiseKind::New { class, reason } => {
                        let class = Operand::Imm(self.cx.atoms.class_atom(*class));
                        self.runtime(None, RuntimeFn::Raise, vec![class, (*reason).into()], *handler);
                    }
                    RaiseKind::Rethrow { exception } => {
                        self.runtime(None, RuntimeFn::Rethrow, vec![(*exception).into()], *handler);
                    }
                }
                self.put(MachInstr::Trap);
            }
            Terminator::CatchDispatch {
                exception,
                cases,
                otherwise,
            } => {
                self.load(Slot::SCRATCH, *exception, payload(0));
                let cases = cases
                    .iter()
                    .map(|&(class, b)| (self.cx.atoms.class_atom(class), label(b)))
                    .collect();
                self.put(MachInstr::Switch {
                    value: Slot::SCRATCH,
                    cases,
                    default: label(*otherwise),
                });
            }
            Terminator::Unreachable => self.put(MachInstr::Trap),
        }
        Ok(())
    }
}
