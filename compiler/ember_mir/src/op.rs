//! The closed operation catalog.
//!
//! Every [`Op`] variant carries exactly its results, operands and attributes.
//! [`Op::signature`] is the single source of truth for operand classes,
//! result classes and effects; the verifier checks instructions against it
//! and the emitter relies on it.

use bitflags::bitflags;
use ember_term::{LiteralId, SmallArith, TermKind};
use smallvec::{smallvec, SmallVec};

use crate::binary::BinaryShape;
use crate::class::{Expect, IntWidth, ValueClass};
use crate::ids::{BlockId, FuncId, ValueId};
use crate::runtime::RuntimeFn;
use ember_ir::Name;

bitflags! {
    /// Side effects an operation may have.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct OpEffects: u8 {
        /// May transfer control to the exceptional successor.
        const MAY_RAISE = 1;
        /// May suspend the process until a message or timeout arrives.
        const MAY_SUSPEND = 1 << 1;
        /// May allocate on the process heap.
        const ALLOCATES = 1 << 2;
        /// Opens a scoped native resource (defines it).
        const ACQUIRES = 1 << 3;
        /// Closes the scoped native resource given as first operand.
        const RELEASES = 1 << 4;
    }
}

/// Operand classes, result classes and effects of one instruction.
///
/// `operands` lines up with [`Op::operands`], `results` with [`Op::results`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpSignature {
    pub operands: Vec<Expect>,
    pub results: SmallVec<[ValueClass; 2]>,
    pub effects: OpEffects,
}

impl OpSignature {
    fn new(operands: Vec<Expect>, results: SmallVec<[ValueClass; 2]>, effects: OpEffects) -> Self {
        OpSignature {
            operands,
            results,
            effects,
        }
    }

    pub fn arity(&self) -> usize {
        self.operands.len()
    }

    pub fn may_raise(&self) -> bool {
        self.effects.contains(OpEffects::MAY_RAISE)
    }
}

/// Signed integer comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl IntPredicate {
    pub fn eval(self, lhs: i64, rhs: i64) -> bool {
        match self {
            IntPredicate::Eq => lhs == rhs,
            IntPredicate::Ne => lhs != rhs,
            IntPredicate::Lt => lhs < rhs,
            IntPredicate::Le => lhs <= rhs,
            IntPredicate::Gt => lhs > rhs,
            IntPredicate::Ge => lhs >= rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Lt => "lt",
            IntPredicate::Le => "le",
            IntPredicate::Gt => "gt",
            IntPredicate::Ge => "ge",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
}

impl BitwiseOp {
    pub fn eval(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            BitwiseOp::And => lhs & rhs,
            BitwiseOp::Or => lhs | rhs,
            BitwiseOp::Xor => lhs ^ rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BitwiseOp::And => "and",
            BitwiseOp::Or => "or",
            BitwiseOp::Xor => "xor",
        }
    }
}

/// What a `Spawn` starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnTarget {
    /// A module function called with the argument terms.
    Direct(FuncId),
    /// A closure value applied to the argument terms.
    Closure(ValueId),
}

/// A non-terminator operation.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    // Constants
    ConstInt {
        dst: ValueId,
        width: IntWidth,
        value: i64,
    },
    ConstTerm {
        dst: ValueId,
        literal: LiteralId,
    },

    // Term model
    /// `TermKind::code` of `value` as an `i8`.
    TermKindOf {
        dst: ValueId,
        value: ValueId,
    },
    IsKind {
        dst: ValueId,
        value: ValueId,
        kind: TermKind,
    },
    IsNone {
        dst: ValueId,
        value: ValueId,
    },
    /// Small-int payload. `value` must be a small integer.
    UntagInt {
        dst: ValueId,
        value: ValueId,
    },
    /// Small-int term from an `i64` known to be in the small range.
    TagInt {
        dst: ValueId,
        value: ValueId,
    },
    /// Arity of a term known to be a tuple.
    TupleArity {
        dst: ValueId,
        tuple: ValueId,
    },
    /// Interned index of a term known to be an atom.
    AtomIndex {
        dst: ValueId,
        atom: ValueId,
    },
    BoolToTerm {
        dst: ValueId,
        value: ValueId,
    },
    /// `value =:= true`.
    TermToBool {
        dst: ValueId,
        value: ValueId,
    },

    // Arithmetic and comparison
    /// Small-range arithmetic. `overflow` is set when the exact result does
    /// not fit a small integer; `dst` is then unspecified.
    CheckedArith {
        dst: ValueId,
        overflow: ValueId,
        op: SmallArith,
        lhs: ValueId,
        rhs: ValueId,
    },
    IntCmp {
        dst: ValueId,
        pred: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    },
    IntBitwise {
        dst: ValueId,
        op: BitwiseOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// `==` (`exact == false`) or `=:=` (`exact == true`).
    TermEq {
        dst: ValueId,
        exact: bool,
        lhs: ValueId,
        rhs: ValueId,
    },
    /// Total term order: -1, 0 or 1.
    TermCompare {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
    },
    RuntimeCall {
        dst: ValueId,
        func: RuntimeFn,
        args: Vec<ValueId>,
    },

    // Calls
    Call {
        dst: ValueId,
        callee: FuncId,
        args: Vec<ValueId>,
    },
    CallExternal {
        dst: ValueId,
        module: Name,
        function: Name,
        args: Vec<ValueId>,
    },

    // Construction
    MakeTuple {
        dst: ValueId,
        elements: Vec<ValueId>,
    },
    MakeCons {
        dst: ValueId,
        head: ValueId,
        tail: ValueId,
    },
    MakeMap {
        dst: ValueId,
        entries: Vec<(ValueId, ValueId)>,
    },
    /// Open a binary builder.
    BinaryInit {
        dst: ValueId,
    },
    /// Append a segment; raises `badarg` and releases the builder on a bad
    /// value or size.
    BinaryPut {
        builder: ValueId,
        value: ValueId,
        size: Option<ValueId>,
        spec: ember_ir::ast::SegmentSpec,
    },
    /// Close the builder, producing the binary.
    BinaryFinish {
        dst: ValueId,
        builder: ValueId,
    },

    // Destructuring
    /// Zero-based element of a tuple known to have more than `index` elements.
    GetTupleElement {
        dst: ValueId,
        tuple: ValueId,
        index: u32,
    },
    GetHead {
        dst: ValueId,
        cons: ValueId,
    },
    GetTail {
        dst: ValueId,
        cons: ValueId,
    },
    /// Match state for `shape`, or `NONE` when `binary` does not fit it.
    BinaryMatch {
        dst: ValueId,
        binary: ValueId,
        shape: BinaryShape,
        sizes: Vec<ValueId>,
    },
    /// Segment `index` of a successful match state.
    BinarySegment {
        dst: ValueId,
        state: ValueId,
        index: u32,
    },

    // Exception regions
    TryEnter {
        handler: BlockId,
    },
    TryExit,
    ExceptionClassTerm {
        dst: ValueId,
        exception: ValueId,
    },
    ExceptionReason {
        dst: ValueId,
        exception: ValueId,
    },

    // Closures
    MakeClosure {
        dst: ValueId,
        function: FuncId,
        arity: u32,
        env: Vec<ValueId>,
    },
    GetEnv {
        dst: ValueId,
        closure: ValueId,
        index: u32,
    },
    ClosureArity {
        dst: ValueId,
        closure: ValueId,
    },
    ClosureFunc {
        dst: ValueId,
        closure: ValueId,
    },
    /// Call `func` with `closure` as the implicit first argument.
    CallIndirect {
        dst: ValueId,
        func: ValueId,
        closure: ValueId,
        args: Vec<ValueId>,
    },

    // Processes
    Spawn {
        dst: ValueId,
        target: SpawnTarget,
        args: Vec<ValueId>,
    },
    /// Deliver `message` to `to`; `dst` is the message.
    Send {
        dst: ValueId,
        to: ValueId,
        message: ValueId,
    },
    SelfPid {
        dst: ValueId,
    },
    /// Begin a receive; raises `timeout_value` on a bad timeout.
    ReceiveStart {
        dst: ValueId,
        timeout: ValueId,
    },
    /// The message under the receive cursor.
    ReceiveMessage {
        dst: ValueId,
        ctx: ValueId,
    },
    /// Advance the cursor past the current message.
    ReceiveNext {
        ctx: ValueId,
    },
    /// Remove the current message (if any) and end the receive.
    ReceiveDone {
        ctx: ValueId,
    },
}

impl Op {
    /// Values this operation defines.
    pub fn results(&self) -> SmallVec<[ValueId; 2]> {
        match self {
            Op::CheckedArith { dst, overflow, .. } => smallvec![*dst, *overflow],
            Op::BinaryPut { .. }
            | Op::TryEnter { .. }
            | Op::TryExit
            | Op::ReceiveNext { .. }
            | Op::ReceiveDone { .. } => SmallVec::new(),
            Op::ConstInt { dst, .. }
            | Op::ConstTerm { dst, .. }
            | Op::TermKindOf { dst, .. }
            | Op::IsKind { dst, .. }
            | Op::IsNone { dst, .. }
            | Op::UntagInt { dst, .. }
            | Op::TagInt { dst, .. }
            | Op::TupleArity { dst, .. }
            | Op::AtomIndex { dst, .. }
            | Op::BoolToTerm { dst, .. }
            | Op::TermToBool { dst, .. }
            | Op::IntCmp { dst, .. }
            | Op::IntBitwise { dst, .. }
            | Op::TermEq { dst, .. }
            | Op::TermCompare { dst, .. }
            | Op::RuntimeCall { dst, .. }
            | Op::Call { dst, .. }
            | Op::CallExternal { dst, .. }
            | Op::MakeTuple { dst, .. }
            | Op::MakeCons { dst, .. }
            | Op::MakeMap { dst, .. }
            | Op::BinaryInit { dst }
            | Op::BinaryFinish { dst, .. }
            | Op::GetTupleElement { dst, .. }
            | Op::GetHead { dst, .. }
            | Op::GetTail { dst, .. }
            | Op::BinaryMatch { dst, .. }
            | Op::BinarySegment { dst, .. }
            | Op::ExceptionClassTerm { dst, .. }
            | Op::ExceptionReason { dst, .. }
            | Op::MakeClosure { dst, .. }
            | Op::GetEnv { dst, .. }
            | Op::ClosureArity { dst, .. }
            | Op::ClosureFunc { dst, .. }
            | Op::CallIndirect { dst, .. }
            | Op::Spawn { dst, .. }
            | Op::Send { dst, .. }
            | Op::SelfPid { dst }
            | Op::ReceiveStart { dst, .. }
            | Op::ReceiveMessage { dst, .. } => smallvec![*dst],
        }
    }

    /// Values this operation reads, in signature order.
    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Op::ConstInt { .. }
            | Op::ConstTerm { .. }
            | Op::BinaryInit { .. }
            | Op::TryEnter { .. }
            | Op::TryExit
            | Op::SelfPid { .. } => SmallVec::new(),
            Op::TermKindOf { value, .. }
            | Op::IsKind { value, .. }
            | Op::IsNone { value, .. }
            | Op::UntagInt { value, .. }
            | Op::TagInt { value, .. }
            | Op::BoolToTerm { value, .. }
            | Op::TermToBool { value, .. } => smallvec![*value],
            Op::TupleArity { tuple, .. } | Op::GetTupleElement { tuple, .. } => smallvec![*tuple],
            Op::AtomIndex { atom, .. } => smallvec![*atom],
            Op::CheckedArith { lhs, rhs, .. }
            | Op::IntCmp { lhs, rhs, .. }
            | Op::IntBitwise { lhs, rhs, .. }
            | Op::TermEq { lhs, rhs, .. }
            | Op::TermCompare { lhs, rhs, .. } => smallvec![*lhs, *rhs],
            Op::RuntimeCall { args, .. } | Op::Call { args, .. } | Op::CallExternal { args, .. } => {
                args.iter().copied().collect()
            }
            Op::MakeTuple { elements, .. } => elements.iter().copied().collect(),
            Op::MakeCons { head, tail, .. } => smallvec![*head, *tail],
            Op::MakeMap { entries, .. } => entries.iter().flat_map(|&(k, v)| [k, v]).collect(),
            Op::BinaryPut {
                builder,
                value,
                size,
                ..
            } => {
                let mut ops: SmallVec<[ValueId; 4]> = smallvec![*builder, *value];
                ops.extend(*size);
                ops
            }
            Op::BinaryFinish { builder, .. } => smallvec![*builder],
            Op::GetHead { cons, .. } | Op::GetTail { cons, .. } => smallvec![*cons],
            Op::BinaryMatch { binary, sizes, .. } => {
                let mut ops: SmallVec<[ValueId; 4]> = smallvec![*binary];
                ops.extend(sizes.iter().copied());
                ops
            }
            Op::BinarySegment { state, .. } => smallvec![*state],
            Op::ExceptionClassTerm { exception, .. } | Op::ExceptionReason { exception, .. } => {
                smallvec![*exception]
            }
            Op::MakeClosure { env, .. } => env.iter().copied().collect(),
            Op::GetEnv { closure, .. }
            | Op::ClosureArity { closure, .. }
            | Op::ClosureFunc { closure, .. } => smallvec![*closure],
            Op::CallIndirect {
                func,
                closure,
                args,
                ..
            } => {
                let mut ops: SmallVec<[ValueId; 4]> = smallvec![*func, *closure];
                ops.extend(args.iter().copied());
                ops
            }
            Op::Spawn { target, args, .. } => {
                let mut ops = SmallVec::new();
                if let SpawnTarget::Closure(closure) = target {
                    ops.push(*closure);
                }
                ops.extend(args.iter().copied());
                ops
            }
            Op::Send { to, message, .. } => smallvec![*to, *message],
            Op::ReceiveStart { timeout, .. } => smallvec![*timeout],
            Op::ReceiveMessage { ctx, .. } | Op::ReceiveNext { ctx } | Op::ReceiveDone { ctx } => {
                smallvec![*ctx]
            }
        }
    }

    /// Operand classes, result classes and effects.
    pub fn signature(&self) -> OpSignature {
        use Expect as E;
        use OpEffects as Fx;
        use ValueClass as C;

        let term = || smallvec![C::Term];
        let terms = |n: usize| vec![E::TERM; n];

        match self {
            Op::ConstInt { width, .. } => {
                OpSignature::new(vec![], smallvec![C::Int(*width)], Fx::empty())
            }
            Op::ConstTerm { .. } => OpSignature::new(vec![], term(), Fx::empty()),
            Op::TermKindOf { .. } => OpSignature::new(
                vec![E::TERM],
                smallvec![C::Int(IntWidth::I8)],
                Fx::empty(),
            ),
            Op::IsKind { .. } | Op::IsNone { .. } | Op::TermToBool { .. } => {
                OpSignature::new(vec![E::TERM], smallvec![C::BOOL], Fx::empty())
            }
            Op::UntagInt { .. } | Op::TupleArity { .. } | Op::AtomIndex { .. } => {
                OpSignature::new(vec![E::TERM], smallvec![C::I64], Fx::empty())
            }
            Op::TagInt { .. } => OpSignature::new(vec![E::I64], term(), Fx::empty()),
            Op::BoolToTerm { .. } => OpSignature::new(vec![E::BOOL], term(), Fx::empty()),
            Op::CheckedArith { .. } => OpSignature::new(
                vec![E::I64, E::I64],
                smallvec![C::I64, C::BOOL],
                Fx::empty(),
            ),
            Op::IntCmp { .. } => {
                OpSignature::new(vec![E::AnyInt, E::AnyInt], smallvec![C::BOOL], Fx::empty())
            }
            Op::IntBitwise { .. } => {
                OpSignature::new(vec![E::I64, E::I64], smallvec![C::I64], Fx::empty())
            }
            Op::TermEq { .. } => OpSignature::new(terms(2), smallvec![C::BOOL], Fx::empty()),
            Op::TermCompare { .. } => OpSignature::new(terms(2), smallvec![C::I64], Fx::empty()),
            Op::RuntimeCall { func, args, .. } => {
                OpSignature::new(func.params(args.len()), smallvec![func.result()], func.effects())
            }
            Op::Call { args, .. } | Op::CallExternal { args, .. } => OpSignature::new(
                terms(args.len()),
                term(),
                Fx::MAY_RAISE | Fx::ALLOCATES,
            ),
            Op::MakeTuple { elements, .. } => {
                OpSignature::new(terms(elements.len()), term(), Fx::ALLOCATES)
            }
            Op::MakeCons { .. } => OpSignature::new(terms(2), term(), Fx::ALLOCATES),
            Op::MakeMap { entries, .. } => {
                OpSignature::new(terms(entries.len() * 2), term(), Fx::ALLOCATES)
            }
            Op::BinaryInit { .. } => OpSignature::new(
                vec![],
                smallvec![C::Native],
                Fx::ACQUIRES | Fx::ALLOCATES,
            ),
            Op::BinaryPut { size, .. } => {
                let mut operands = vec![E::NATIVE, E::TERM];
                if size.is_some() {
                    operands.push(E::TERM);
                }
                OpSignature::new(operands, SmallVec::new(), Fx::MAY_RAISE)
            }
            Op::BinaryFinish { .. } => {
                OpSignature::new(vec![E::NATIVE], term(), Fx::RELEASES | Fx::ALLOCATES)
            }
            Op::GetTupleElement { .. }
            | Op::GetHead { .. }
            | Op::GetTail { .. }
            | Op::ExceptionClassTerm { .. }
            | Op::ExceptionReason { .. }
            | Op::GetEnv { .. } => OpSignature::new(vec![E::TERM], term(), Fx::empty()),
            Op::BinaryMatch { sizes, .. } => {
                OpSignature::new(terms(1 + sizes.len()), term(), Fx::ALLOCATES)
            }
            Op::BinarySegment { .. } => OpSignature::new(vec![E::TERM], term(), Fx::ALLOCATES),
            Op::TryEnter { .. } | Op::TryExit => {
                OpSignature::new(vec![], SmallVec::new(), Fx::empty())
            }
            Op::MakeClosure { env, .. } => {
                OpSignature::new(terms(env.len()), term(), Fx::ALLOCATES)
            }
            Op::ClosureArity { .. } => {
                OpSignature::new(vec![E::TERM], smallvec![C::I64], Fx::empty())
            }
            Op::ClosureFunc { .. } => {
                OpSignature::new(vec![E::TERM], smallvec![C::Native], Fx::empty())
            }
            Op::CallIndirect { args, .. } => {
                let mut operands = vec![E::NATIVE, E::TERM];
                operands.extend(terms(args.len()));
                OpSignature::new(operands, term(), Fx::MAY_RAISE | Fx::ALLOCATES)
            }
            Op::Spawn { target, args, .. } => match target {
                SpawnTarget::Direct(_) => {
                    OpSignature::new(terms(args.len()), term(), Fx::ALLOCATES)
                }
                SpawnTarget::Closure(_) => OpSignature::new(
                    terms(1 + args.len()),
                    term(),
                    Fx::MAY_RAISE | Fx::ALLOCATES,
                ),
            },
            Op::Send { .. } => OpSignature::new(terms(2), term(), Fx::empty()),
            Op::SelfPid { .. } => OpSignature::new(vec![], term(), Fx::empty()),
            Op::ReceiveStart { .. } => {
                OpSignature::new(vec![E::TERM], smallvec![C::Native], Fx::MAY_RAISE)
            }
            Op::ReceiveMessage { .. } => OpSignature::new(vec![E::NATIVE], term(), Fx::empty()),
            Op::ReceiveNext { .. } | Op::ReceiveDone { .. } => {
                OpSignature::new(vec![E::NATIVE], SmallVec::new(), Fx::empty())
            }
        }
    }

    pub fn may_raise(&self) -> bool {
        self.signature().may_raise()
    }

    /// Block named by the operation itself (the handler of `TryEnter`).
    pub fn block_ref(&self) -> Option<BlockId> {
        match self {
            Op::TryEnter { handler } => Some(*handler),
            _ => None,
        }
    }

    pub(crate) fn block_ref_mut(&mut self) -> Option<&mut BlockId> {
        match self {
            Op::TryEnter { handler } => Some(handler),
            _ => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::ConstInt { .. } => "const_int",
            Op::ConstTerm { .. } => "const_term",
            Op::TermKindOf { .. } => "term_kind_of",
            Op::IsKind { .. } => "is_kind",
            Op::IsNone { .. } => "is_none",
            Op::UntagInt { .. } => "untag_int",
            Op::TagInt { .. } => "tag_int",
            Op::TupleArity { .. } => "tuple_arity",
            Op::AtomIndex { .. } => "atom_index",
            Op::BoolToTerm { .. } => "bool_to_term",
            Op::TermToBool { .. } => "term_to_bool",
            Op::CheckedArith { .. } => "checked_arith",
            Op::IntCmp { .. } => "int_cmp",
            Op::IntBitwise { .. } => "int_bitwise",
            Op::TermEq { exact: true, .. } => "term_exact_eq",
            Op::TermEq { exact: false, .. } => "term_eq",
            Op::TermCompare { .. } => "term_compare",
            Op::RuntimeCall { .. } => "runtime_call",
            Op::Call { .. } => "call",
            Op::CallExternal { .. } => "call_external",
            Op::MakeTuple { .. } => "make_tuple",
            Op::MakeCons { .. } => "make_cons",
            Op::MakeMap { .. } => "make_map",
            Op::BinaryInit { .. } => "binary_init",
            Op::BinaryPut { .. } => "binary_put",
            Op::BinaryFinish { .. } => "binary_finish",
            Op::GetTupleElement { .. } => "get_tuple_element",
            Op::GetHead { .. } => "get_head",
            Op::GetTail { .. } => "get_tail",
            Op::BinaryMatch { .. } => "binary_match",
            Op::BinarySegment { .. } => "binary_segment",
            Op::TryEnter { .. } => "try_enter",
            Op::TryExit => "try_exit",
            Op::ExceptionClassTerm { .. } => "exception_class",
            Op::ExceptionReason { .. } => "exception_reason",
            Op::MakeClosure { .. } => "make_closure",
            Op::GetEnv { .. } => "get_env",
            Op::ClosureArity { .. } => "closure_arity",
            Op::ClosureFunc { .. } => "closure_func",
            Op::CallIndirect { .. } => "call_indirect",
            Op::Spawn { .. } => "spawn",
            Op::Send { .. } => "send",
            Op::SelfPid { .. } => "self",
            Op::ReceiveStart { .. } => "receive_start",
            Op::ReceiveMessage { .. } => "receive_message",
            Op::ReceiveNext { .. } => "receive_next",
            Op::ReceiveDone { .. } => "receive_done",
        }
    }
}
