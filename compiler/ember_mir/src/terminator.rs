use ember_ir::ast::ExceptionClass;
use smallvec::{smallvec, SmallVec};

use crate::class::Expect;
use crate::ids::{BlockId, ValueId};
use crate::op::OpEffects;

/// What a `Raise` throws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RaiseKind {
    /// A fresh exception of `class` with `reason`.
    New {
        class: ExceptionClass,
        reason: ValueId,
    },
    /// Re-raise an exception term received by a handler.
    Rethrow { exception: ValueId },
}

/// How control leaves a block.
///
/// Successor blocks take no parameters except where noted: `Jump` passes
/// `args` to the target's parameters, `MapLookup`'s `found` block takes the
/// value, and handler blocks take the exception term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminator {
    Return {
        value: ValueId,
    },
    Jump {
        target: BlockId,
        args: Vec<ValueId>,
    },
    /// Branch on an `i1`.
    Branch {
        cond: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Multi-way branch on an integer.
    Switch {
        scrutinee: ValueId,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    /// Look `key` up in `map`; `found` receives the value.
    MapLookup {
        map: ValueId,
        key: ValueId,
        found: BlockId,
        absent: BlockId,
    },
    /// Continue at `message` when the receive cursor holds a message;
    /// otherwise suspend until one arrives or the timeout expires.
    ReceiveWait {
        ctx: ValueId,
        message: BlockId,
        timeout: BlockId,
    },
    /// Raise to `handler`, or out of the function when `None`.
    Raise {
        kind: RaiseKind,
        handler: Option<BlockId>,
    },
    /// Dispatch an exception term on its class.
    CatchDispatch {
        exception: ValueId,
        cases: Vec<(ExceptionClass, BlockId)>,
        otherwise: BlockId,
    },
    Unreachable,
}

impl Terminator {
    /// Normal (non-exceptional) successors, in declaration order.
    pub fn successors(&self) -> SmallVec<[BlockId; 4]> {
        match self {
            Terminator::Return { .. } | Terminator::Raise { .. } | Terminator::Unreachable => {
                SmallVec::new()
            }
            Terminator::Jump { target, .. } => smallvec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => smallvec![*then_block, *else_block],
            Terminator::Switch { cases, default, .. } => {
                let mut targets = SmallVec::with_capacity(cases.len() + 1);
                targets.extend(cases.iter().map(|&(_, b)| b));
                targets.push(*default);
                targets
            }
            Terminator::MapLookup { found, absent, .. } => smallvec![*found, *absent],
            Terminator::ReceiveWait {
                message, timeout, ..
            } => smallvec![*message, *timeout],
            Terminator::CatchDispatch {
                cases, otherwise, ..
            } => {
                let mut targets = SmallVec::with_capacity(cases.len() + 1);
                targets.extend(cases.iter().map(|&(_, b)| b));
                targets.push(*otherwise);
                targets
            }
        }
    }

    /// The handler a `Raise` transfers to.
    pub fn exceptional_successor(&self) -> Option<BlockId> {
        match self {
            Terminator::Raise { handler, .. } => *handler,
            _ => None,
        }
    }

    pub fn operands(&self) -> SmallVec<[ValueId; 4]> {
        match self {
            Terminator::Return { value } => smallvec![*value],
            Terminator::Jump { args, .. } => args.iter().copied().collect(),
            Terminator::Branch { cond, .. } => smallvec![*cond],
            Terminator::Switch { scrutinee, .. } => smallvec![*scrutinee],
            Terminator::MapLookup { map, key, .. } => smallvec![*map, *key],
            Terminator::ReceiveWait { ctx, .. } => smallvec![*ctx],
            Terminator::Raise { kind, .. } => match kind {
                RaiseKind::New { reason, .. } => smallvec![*reason],
                RaiseKind::Rethrow { exception } => smallvec![*exception],
            },
            Terminator::CatchDispatch { exception, .. } => smallvec![*exception],
            Terminator::Unreachable => SmallVec::new(),
        }
    }

    /// Operand requirements, aligned with [`operands`](Self::operands).
    ///
    /// `Jump` arguments are checked against the target's parameters instead.
    pub fn operand_expectations(&self) -> Option<Vec<Expect>> {
        let expect = match self {
            Terminator::Jump { .. } => return None,
            Terminator::Return { .. } | Terminator::Raise { .. } => vec![Expect::TERM],
            Terminator::Branch { .. } => vec![Expect::BOOL],
            Terminator::Switch { .. } => vec![Expect::AnyInt],
            Terminator::MapLookup { .. } => vec![Expect::TERM, Expect::TERM],
            Terminator::ReceiveWait { .. } => vec![Expect::NATIVE],
            Terminator::CatchDispatch { .. } => vec![Expect::TERM],
            Terminator::Unreachable => vec![],
        };
        Some(expect)
    }

    pub fn effects(&self) -> OpEffects {
        match self {
            Terminator::ReceiveWait { .. } => OpEffects::MAY_SUSPEND,
            Terminator::Raise { .. } => OpEffects::MAY_RAISE,
            _ => OpEffects::empty(),
        }
    }

    /// Visit every block this terminator names, the raise handler included.
    pub fn for_each_target_mut(&mut self, mut f: impl FnMut(&mut BlockId)) {
        match self {
            Terminator::Return { .. } | Terminator::Unreachable => {}
            Terminator::Jump { target, .. } => f(target),
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => {
                f(then_block);
                f(else_block);
            }
            Terminator::Switch { cases, default, .. } => {
                for (_, b) in cases {
                    f(b);
                }
                f(default);
            }
            Terminator::MapLookup { found, absent, .. } => {
                f(found);
                f(absent);
            }
            Terminator::ReceiveWait {
                message, timeout, ..
            } => {
                f(message);
                f(timeout);
            }
            Terminator::Raise { handler, .. } => {
                if let Some(h) = handler {
                    f(h);
                }
            }
            Terminator::CatchDispatch {
                cases, otherwise, ..
            } => {
                for (_, b) in cases {
                    f(b);
                }
                f(otherwise);
            }
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Terminator::Return { .. } => "return",
            Terminator::Jump { .. } => "jump",
            Terminator::Branch { .. } => "branch",
            Terminator::Switch { .. } => "switch",
            Terminator::MapLookup { .. } => "map_lookup",
            Terminator::ReceiveWait { .. } => "receive_wait",
            Terminator::Raise { .. } => "raise",
            Terminator::CatchDispatch { .. } => "catch_dispatch",
            Terminator::Unreachable => "unreachable",
        }
    }
}
