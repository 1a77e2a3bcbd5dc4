//! Runtime ABI.
//!
//! Each [`RuntimeFn`] is a C-ABI entry point the native runtime exports.
//! Compiled code reaches them either through an explicit `RuntimeCall` in
//! MIR (arbitrary-precision arithmetic, BIFs) or through the emitter's
//! lowering of a higher-level op (`MakeTuple` allocates via `Alloc`, `Send`
//! calls `Send`, ...). Symbol names are stable; renaming one is an ABI break.

use crate::class::{Expect, ValueClass};
use crate::op::OpEffects;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuntimeFn {
    // Memory
    Alloc,

    // Arithmetic fallbacks
    Add,
    Sub,
    Mul,
    IntDiv,
    Rem,
    FloatDiv,
    Negate,
    Band,
    Bor,
    Bxor,
    Bnot,
    Bsl,
    Bsr,

    // Strict boolean operators
    BoolAnd,
    BoolOr,
    BoolXor,
    BoolNot,

    // Comparison
    Compare,
    Equal,
    ExactEqual,

    // Built-in functions
    Element,
    TupleSize,
    Length,
    Hd,
    Tl,
    Abs,
    MapSize,
    ListToTuple,

    // Data
    MakeMap,
    MapGet,
    BinaryInit,
    BinaryPut,
    BinaryFinish,
    BinaryMatch,
    BinarySegment,
    MakeClosure,

    // Processes
    Spawn,
    SpawnClosure,
    Send,
    SelfPid,
    ReceiveStart,
    ReceiveWait,
    ReceiveMessage,
    ReceiveNext,
    ReceiveDone,

    // Exceptions
    Raise,
    Rethrow,
    TryEnter,
    TryExit,

    // Calls
    ApplyClosure,
}

impl RuntimeFn {
    pub const ALL: [RuntimeFn; 51] = [
        RuntimeFn::Alloc,
        RuntimeFn::Add,
        RuntimeFn::Sub,
        RuntimeFn::Mul,
        RuntimeFn::IntDiv,
        RuntimeFn::Rem,
        RuntimeFn::FloatDiv,
        RuntimeFn::Negate,
        RuntimeFn::Band,
        RuntimeFn::Bor,
        RuntimeFn::Bxor,
        RuntimeFn::Bnot,
        RuntimeFn::Bsl,
        RuntimeFn::Bsr,
        RuntimeFn::BoolAnd,
        RuntimeFn::BoolOr,
        RuntimeFn::BoolXor,
        RuntimeFn::BoolNot,
        RuntimeFn::Compare,
        RuntimeFn::Equal,
        RuntimeFn::ExactEqual,
        RuntimeFn::Element,
        RuntimeFn::TupleSize,
        RuntimeFn::Length,
        RuntimeFn::Hd,
        RuntimeFn::Tl,
        RuntimeFn::Abs,
        RuntimeFn::MapSize,
        RuntimeFn::ListToTuple,
        RuntimeFn::MakeMap,
        RuntimeFn::MapGet,
        RuntimeFn::BinaryInit,
        RuntimeFn::BinaryPut,
        RuntimeFn::BinaryFinish,
        RuntimeFn::BinaryMatch,
        RuntimeFn::BinarySegment,
        RuntimeFn::MakeClosure,
        RuntimeFn::Spawn,
        RuntimeFn::SpawnClosure,
        RuntimeFn::Send,
        RuntimeFn::SelfPid,
        RuntimeFn::ReceiveStart,
        RuntimeFn::ReceiveWait,
        RuntimeFn::ReceiveMessage,
        RuntimeFn::ReceiveNext,
        RuntimeFn::ReceiveDone,
        RuntimeFn::Raise,
        RuntimeFn::Rethrow,
        RuntimeFn::TryEnter,
        RuntimeFn::TryExit,
        RuntimeFn::ApplyClosure,
    ];

    /// Exported symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            RuntimeFn::Alloc => "__ember_alloc",
            RuntimeFn::Add => "__ember_add",
            RuntimeFn::Sub => "__ember_sub",
            RuntimeFn::Mul => "__ember_mul",
            RuntimeFn::IntDiv => "__ember_div",
            RuntimeFn::Rem => "__ember_rem",
            RuntimeFn::FloatDiv => "__ember_fdiv",
            RuntimeFn::Negate => "__ember_neg",
            RuntimeFn::Band => "__ember_band",
            RuntimeFn::Bor => "__ember_bor",
            RuntimeFn::Bxor => "__ember_bxor",
            RuntimeFn::Bnot => "__ember_bnot",
            RuntimeFn::Bsl => "__ember_bsl",
            RuntimeFn::Bsr => "__ember_bsr",
            RuntimeFn::BoolAnd => "__ember_and",
            RuntimeFn::BoolOr => "__ember_or",
            RuntimeFn::BoolXor => "__ember_xor",
            RuntimeFn::BoolNot => "__ember_not",
            RuntimeFn::Compare => "__ember_compare",
            RuntimeFn::Equal => "__ember_equal",
            RuntimeFn::ExactEqual => "__ember_exact_equal",
            RuntimeFn::Element => "__ember_element",
            RuntimeFn::TupleSize => "__ember_tuple_size",
            RuntimeFn::Length => "__ember_length",
            RuntimeFn::Hd => "__ember_hd",
            RuntimeFn::Tl => "__ember_tl",
            RuntimeFn::Abs => "__ember_abs",
            RuntimeFn::MapSize => "__ember_map_size",
            RuntimeFn::ListToTuple => "__ember_list_to_tuple",
            RuntimeFn::MakeMap => "__ember_map_new",
            RuntimeFn::MapGet => "__ember_map_get",
            RuntimeFn::BinaryInit => "__ember_bs_init",
            RuntimeFn::BinaryPut => "__ember_bs_put",
            RuntimeFn::BinaryFinish => "__ember_bs_finish",
            RuntimeFn::BinaryMatch => "__ember_bs_match",
            RuntimeFn::BinarySegment => "__ember_bs_get",
            RuntimeFn::MakeClosure => "__ember_closure_new",
            RuntimeFn::Spawn => "__ember_spawn",
            RuntimeFn::SpawnClosure => "__ember_spawn_closure",
            RuntimeFn::Send => "__ember_send",
            RuntimeFn::SelfPid => "__ember_self",
            RuntimeFn::ReceiveStart => "__ember_receive_start",
            RuntimeFn::ReceiveWait => "__ember_receive_wait",
            RuntimeFn::ReceiveMessage => "__ember_receive_message",
            RuntimeFn::ReceiveNext => "__ember_receive_next",
            RuntimeFn::ReceiveDone => "__ember_receive_done",
            RuntimeFn::Raise => "__ember_raise",
            RuntimeFn::Rethrow => "__ember_rethrow",
            RuntimeFn::TryEnter => "__ember_try_enter",
            RuntimeFn::TryExit => "__ember_try_exit",
            RuntimeFn::ApplyClosure => "__ember_apply_closure",
        }
    }

    /// Fixed argument count; `None` for variadic entry points.
    pub const fn arity(self) -> Option<usize> {
        match self {
            RuntimeFn::BinaryInit | RuntimeFn::SelfPid | RuntimeFn::TryExit => Some(0),
            RuntimeFn::Alloc
            | RuntimeFn::Negate
            | RuntimeFn::Bnot
            | RuntimeFn::BoolNot
            | RuntimeFn::TupleSize
            | RuntimeFn::Length
            | RuntimeFn::Hd
            | RuntimeFn::Tl
            | RuntimeFn::Abs
            | RuntimeFn::MapSize
            | RuntimeFn::ListToTuple
            | RuntimeFn::BinaryFinish
            | RuntimeFn::ReceiveStart
            | RuntimeFn::ReceiveWait
            | RuntimeFn::ReceiveMessage
            | RuntimeFn::ReceiveNext
            | RuntimeFn::ReceiveDone
            | RuntimeFn::Rethrow
            | RuntimeFn::TryEnter => Some(1),
            RuntimeFn::Add
            | RuntimeFn::Sub
            | RuntimeFn::Mul
            | RuntimeFn::IntDiv
            | RuntimeFn::Rem
            | RuntimeFn::FloatDiv
            | RuntimeFn::Band
            | RuntimeFn::Bor
            | RuntimeFn::Bxor
            | RuntimeFn::Bsl
            | RuntimeFn::Bsr
            | RuntimeFn::BoolAnd
            | RuntimeFn::BoolOr
            | RuntimeFn::BoolXor
            | RuntimeFn::Compare
            | RuntimeFn::Equal
            | RuntimeFn::ExactEqual
            | RuntimeFn::Element
            | RuntimeFn::MapGet
            | RuntimeFn::BinarySegment
            | RuntimeFn::Send
            | RuntimeFn::Raise => Some(2),
            RuntimeFn::BinaryPut => Some(4),
            RuntimeFn::MakeMap
            | RuntimeFn::BinaryMatch
            | RuntimeFn::MakeClosure
            | RuntimeFn::Spawn
            | RuntimeFn::SpawnClosure
            | RuntimeFn::ApplyClosure => None,
        }
    }

    pub const fn may_raise(self) -> bool {
        matches!(
            self,
            RuntimeFn::Add
                | RuntimeFn::Sub
                | RuntimeFn::Mul
                | RuntimeFn::IntDiv
                | RuntimeFn::Rem
                | RuntimeFn::FloatDiv
                | RuntimeFn::Negate
                | RuntimeFn::Band
                | RuntimeFn::Bor
                | RuntimeFn::Bxor
                | RuntimeFn::Bnot
                | RuntimeFn::Bsl
                | RuntimeFn::Bsr
                | RuntimeFn::BoolAnd
                | RuntimeFn::BoolOr
                | RuntimeFn::BoolXor
                | RuntimeFn::BoolNot
                | RuntimeFn::Element
                | RuntimeFn::TupleSize
                | RuntimeFn::Length
                | RuntimeFn::Hd
                | RuntimeFn::Tl
                | RuntimeFn::Abs
                | RuntimeFn::MapSize
                | RuntimeFn::ListToTuple
                | RuntimeFn::BinaryPut
                | RuntimeFn::SpawnClosure
                | RuntimeFn::ReceiveStart
                | RuntimeFn::Raise
                | RuntimeFn::Rethrow
                | RuntimeFn::ApplyClosure
        )
    }

    /// Class of the returned value.
    pub const fn result(self) -> ValueClass {
        match self {
            RuntimeFn::Alloc
            | RuntimeFn::BinaryInit
            | RuntimeFn::ReceiveStart => ValueClass::Native,
            RuntimeFn::Compare => ValueClass::I64,
            RuntimeFn::Equal | RuntimeFn::ExactEqual | RuntimeFn::ReceiveWait => ValueClass::BOOL,
            _ => ValueClass::Term,
        }
    }

    /// Operand classes for a call with `argc` arguments.
    pub fn params(self, argc: usize) -> Vec<Expect> {
        match self {
            RuntimeFn::Alloc => vec![Expect::I64],
            RuntimeFn::BinaryPut => vec![Expect::NATIVE, Expect::TERM, Expect::TERM, Expect::I64],
            RuntimeFn::BinaryFinish
            | RuntimeFn::ReceiveWait
            | RuntimeFn::ReceiveMessage
            | RuntimeFn::ReceiveNext
            | RuntimeFn::ReceiveDone
            | RuntimeFn::TryEnter => vec![Expect::NATIVE],
            RuntimeFn::Spawn => {
                let mut params = vec![Expect::NATIVE];
                params.extend(std::iter::repeat(Expect::TERM).take(argc.saturating_sub(1)));
                params
            }
            _ => vec![Expect::TERM; self.arity().unwrap_or(argc)],
        }
    }

    pub fn effects(self) -> OpEffects {
        let mut effects = OpEffects::empty();
        if self.may_raise() {
            effects |= OpEffects::MAY_RAISE;
        }
        if matches!(self, RuntimeFn::ReceiveWait) {
            effects |= OpEffects::MAY_SUSPEND;
        }
        if !matches!(
            self,
            RuntimeFn::Compare
                | RuntimeFn::Equal
                | RuntimeFn::ExactEqual
                | RuntimeFn::SelfPid
                | RuntimeFn::Send
                | RuntimeFn::TupleSize
                | RuntimeFn::Length
                | RuntimeFn::MapSize
                | RuntimeFn::MapGet
                | RuntimeFn::ReceiveNext
                | RuntimeFn::ReceiveDone
                | RuntimeFn::TryExit
        ) {
            effects |= OpEffects::ALLOCATES;
        }
        effects
    }

    /// Whether MIR may name this function in a `RuntimeCall`.
    ///
    /// The rest are reached only through the emitter's lowering of dedicated
    /// ops and terminators.
    pub const fn callable_from_mir(self) -> bool {
        matches!(
            self,
            RuntimeFn::Add
                | RuntimeFn::Sub
                | RuntimeFn::Mul
                | RuntimeFn::IntDiv
                | RuntimeFn::Rem
                | RuntimeFn::FloatDiv
                | RuntimeFn::Negate
                | RuntimeFn::Band
                | RuntimeFn::Bor
                | RuntimeFn::Bxor
                | RuntimeFn::Bnot
                | RuntimeFn::Bsl
                | RuntimeFn::Bsr
                | RuntimeFn::BoolAnd
                | RuntimeFn::BoolOr
                | RuntimeFn::BoolXor
                | RuntimeFn::BoolNot
                | RuntimeFn::Element
                | RuntimeFn::TupleSize
                | RuntimeFn::Length
                | RuntimeFn::Hd
                | RuntimeFn::Tl
                | RuntimeFn::Abs
                | RuntimeFn::MapSize
                | RuntimeFn::ListToTuple
        )
    }
}
