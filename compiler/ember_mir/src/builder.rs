//! Incremental construction of MIR functions.
//!
//! Same "position at a block, emit, terminate" discipline as an LLVM
//! `IRBuilder`, with block parameters instead of phi nodes. The builder also
//! tracks the innermost exception handler: every raising op emitted while a
//! handler is set gets it as its exceptional successor.

use ember_ir::ast::ExceptionClass;
use ember_ir::{Name, Span};
use ember_term::{LiteralId, SmallArith, TermKind};

use crate::binary::BinaryShape;
use crate::class::{IntWidth, ValueClass};
use crate::function::{Block, ClosureEnv, Function, FunctionOrigin, Instr, MatchSite};
use crate::graph;
use crate::ids::{BlockId, FuncId, ValueId};
use crate::op::{BitwiseOp, IntPredicate, Op, SpawnTarget};
use crate::runtime::RuntimeFn;
use crate::terminator::{RaiseKind, Terminator};

/// Builder for one MIR function.
///
/// Consumed by [`finish`](FunctionBuilder::finish), which drops blocks no
/// path reaches and renumbers the rest.
pub struct FunctionBuilder {
    name: Name,
    arity: u32,
    span: Span,
    blocks: Vec<Block>,
    current: BlockId,
    params: Vec<ValueId>,
    value_classes: Vec<ValueClass>,
    env: Option<ClosureEnv>,
    origin: FunctionOrigin,
    match_sites: Vec<MatchSite>,
    handler: Option<BlockId>,
    cursor_span: Span,
}

impl FunctionBuilder {
    /// A builder with the entry block allocated and selected.
    pub fn new(name: Name, arity: u32, span: Span) -> Self {
        FunctionBuilder {
            name,
            arity,
            span,
            blocks: vec![Block::new(BlockId::new(0))],
            current: BlockId::new(0),
            params: Vec::new(),
            value_classes: Vec::new(),
            env: None,
            origin: FunctionOrigin::Source,
            match_sites: Vec::new(),
            handler: None,
            cursor_span: span,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn set_origin(&mut self, origin: FunctionOrigin) {
        self.origin = origin;
    }

    pub fn set_env(&mut self, env: ClosureEnv) {
        self.env = Some(env);
    }

    /// Append a function parameter (an entry block parameter).
    pub fn add_param(&mut self, class: ValueClass) -> ValueId {
        let value = self.add_block_param(self.entry_block(), class);
        self.params.push(value);
        value
    }

    // Blocks

    #[inline]
    pub fn entry_block(&self) -> BlockId {
        BlockId::new(0)
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX));
        self.blocks.push(Block::new(id));
        id
    }

    pub fn position_at(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "{block} out of bounds (have {} blocks)",
            self.blocks.len()
        );
        self.current = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current.index()].terminator.is_some()
    }

    pub fn block_params(&self, block: BlockId) -> &[ValueId] {
        &self.blocks[block.index()].params
    }

    // Values

    pub fn fresh_value(&mut self, class: ValueClass) -> ValueId {
        let id = ValueId::new(u32::try_from(self.value_classes.len()).unwrap_or(u32::MAX));
        self.value_classes.push(class);
        id
    }

    pub fn add_block_param(&mut self, block: BlockId, class: ValueClass) -> ValueId {
        let value = self.fresh_value(class);
        self.blocks[block.index()].params.push(value);
        value
    }

    pub fn value_class(&self, value: ValueId) -> Option<ValueClass> {
        self.value_classes.get(value.index()).copied()
    }

    // Context

    /// Source location attached to subsequently emitted instructions.
    pub fn set_span(&mut self, span: Span) -> Span {
        std::mem::replace(&mut self.cursor_span, span)
    }

    /// Handler for subsequently emitted raising operations. Returns the
    /// previous one so callers can restore it.
    pub fn set_handler(&mut self, handler: Option<BlockId>) -> Option<BlockId> {
        std::mem::replace(&mut self.handler, handler)
    }

    #[inline]
    pub fn handler(&self) -> Option<BlockId> {
        self.handler
    }

    pub fn add_match_site(&mut self, site: MatchSite) {
        self.match_sites.push(site);
    }

    // Emission

    /// Append `op` to the current block. Raising ops get the current handler.
    pub fn push(&mut self, op: Op) {
        let handler = if op.may_raise() { self.handler } else { None };
        self.push_instr(Instr {
            op,
            handler,
            span: self.cursor_span,
        });
    }

    pub fn push_instr(&mut self, instr: Instr) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(
            block.terminator.is_none(),
            "emitting into terminated block {}",
            block.id
        );
        block.instrs.push(instr);
    }

    fn def(&mut self, class: ValueClass, make: impl FnOnce(ValueId) -> Op) -> ValueId {
        let dst = self.fresh_value(class);
        self.push(make(dst));
        dst
    }

    pub fn const_int(&mut self, width: IntWidth, value: i64) -> ValueId {
        self.def(ValueClass::Int(width), |dst| Op::ConstInt { dst, width, value })
    }

    pub fn const_term(&mut self, literal: LiteralId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::ConstTerm { dst, literal })
    }

    pub fn term_kind_of(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::Int(IntWidth::I8), |dst| Op::TermKindOf { dst, value })
    }

    pub fn is_kind(&mut self, value: ValueId, kind: TermKind) -> ValueId {
        self.def(ValueClass::BOOL, |dst| Op::IsKind { dst, value, kind })
    }

    pub fn is_none(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::BOOL, |dst| Op::IsNone { dst, value })
    }

    pub fn untag_int(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::UntagInt { dst, value })
    }

    pub fn tag_int(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::TagInt { dst, value })
    }

    pub fn tuple_arity(&mut self, tuple: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::TupleArity { dst, tuple })
    }

    pub fn atom_index(&mut self, atom: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::AtomIndex { dst, atom })
    }

    pub fn bool_to_term(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::BoolToTerm { dst, value })
    }

    pub fn term_to_bool(&mut self, value: ValueId) -> ValueId {
        self.def(ValueClass::BOOL, |dst| Op::TermToBool { dst, value })
    }

    /// Returns `(result, overflow)`.
    pub fn checked_arith(&mut self, op: SmallArith, lhs: ValueId, rhs: ValueId) -> (ValueId, ValueId) {
        let dst = self.fresh_value(ValueClass::I64);
        let overflow = self.fresh_value(ValueClass::BOOL);
        self.push(Op::CheckedArith {
            dst,
            overflow,
            op,
            lhs,
            rhs,
        });
        (dst, overflow)
    }

    pub fn int_cmp(&mut self, pred: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.def(ValueClass::BOOL, |dst| Op::IntCmp {
            dst,
            pred,
            lhs,
            rhs,
        })
    }

    pub fn int_bitwise(&mut self, op: BitwiseOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::IntBitwise { dst, op, lhs, rhs })
    }

    pub fn term_eq(&mut self, lhs: ValueId, rhs: ValueId, exact: bool) -> ValueId {
        self.def(ValueClass::BOOL, |dst| Op::TermEq {
            dst,
            exact,
            lhs,
            rhs,
        })
    }

    pub fn term_compare(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::TermCompare { dst, lhs, rhs })
    }

    pub fn runtime_call(&mut self, func: RuntimeFn, args: Vec<ValueId>) -> ValueId {
        self.def(func.result(), |dst| Op::RuntimeCall { dst, func, args })
    }

    pub fn call(&mut self, callee: FuncId, args: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::Call { dst, callee, args })
    }

    pub fn call_external(&mut self, module: Name, function: Name, args: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::CallExternal {
            dst,
            module,
            function,
            args,
        })
    }

    pub fn make_tuple(&mut self, elements: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::MakeTuple { dst, elements })
    }

    pub fn make_cons(&mut self, head: ValueId, tail: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::MakeCons { dst, head, tail })
    }

    pub fn make_map(&mut self, entries: Vec<(ValueId, ValueId)>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::MakeMap { dst, entries })
    }

    pub fn binary_init(&mut self) -> ValueId {
        self.def(ValueClass::Native, |dst| Op::BinaryInit { dst })
    }

    pub fn binary_put(
        &mut self,
        builder: ValueId,
        value: ValueId,
        size: Option<ValueId>,
        spec: ember_ir::ast::SegmentSpec,
    ) {
        self.push(Op::BinaryPut {
            builder,
            value,
            size,
            spec,
        });
    }

    pub fn binary_finish(&mut self, builder: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::BinaryFinish { dst, builder })
    }

    pub fn get_tuple_element(&mut self, tuple: ValueId, index: u32) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::GetTupleElement { dst, tuple, index })
    }

    pub fn get_head(&mut self, cons: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::GetHead { dst, cons })
    }

    pub fn get_tail(&mut self, cons: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::GetTail { dst, cons })
    }

    pub fn binary_match(&mut self, binary: ValueId, shape: BinaryShape, sizes: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::BinaryMatch {
            dst,
            binary,
            shape,
            sizes,
        })
    }

    pub fn binary_segment(&mut self, state: ValueId, index: u32) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::BinarySegment { dst, state, index })
    }

    pub fn try_enter(&mut self, handler: BlockId) {
        self.push(Op::TryEnter { handler });
    }

    pub fn try_exit(&mut self) {
        self.push(Op::TryExit);
    }

    pub fn exception_class(&mut self, exception: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::ExceptionClassTerm { dst, exception })
    }

    pub fn exception_reason(&mut self, exception: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::ExceptionReason { dst, exception })
    }

    pub fn make_closure(&mut self, function: FuncId, arity: u32, env: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::MakeClosure {
            dst,
            function,
            arity,
            env,
        })
    }

    pub fn get_env(&mut self, closure: ValueId, index: u32) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::GetEnv {
            dst,
            closure,
            index,
        })
    }

    pub fn closure_arity(&mut self, closure: ValueId) -> ValueId {
        self.def(ValueClass::I64, |dst| Op::ClosureArity { dst, closure })
    }

    pub fn closure_func(&mut self, closure: ValueId) -> ValueId {
        self.def(ValueClass::Native, |dst| Op::ClosureFunc { dst, closure })
    }

    pub fn call_indirect(&mut self, func: ValueId, closure: ValueId, args: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::CallIndirect {
            dst,
            func,
            closure,
            args,
        })
    }

    pub fn spawn(&mut self, target: SpawnTarget, args: Vec<ValueId>) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::Spawn { dst, target, args })
    }

    pub fn send(&mut self, to: ValueId, message: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::Send { dst, to, message })
    }

    pub fn self_pid(&mut self) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::SelfPid { dst })
    }

    pub fn receive_start(&mut self, timeout: ValueId) -> ValueId {
        self.def(ValueClass::Native, |dst| Op::ReceiveStart { dst, timeout })
    }

    pub fn receive_message(&mut self, ctx: ValueId) -> ValueId {
        self.def(ValueClass::Term, |dst| Op::ReceiveMessage { dst, ctx })
    }

    pub fn receive_next(&mut self, ctx: ValueId) {
        self.push(Op::ReceiveNext { ctx });
    }

    pub fn receive_done(&mut self, ctx: ValueId) {
        self.push(Op::ReceiveDone { ctx });
    }

    // Terminators

    pub fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            block.id
        );
        block.terminator = Some(terminator);
    }

    pub fn ret(&mut self, value: ValueId) {
        self.terminate(Terminator::Return { value });
    }

    pub fn jump(&mut self, target: BlockId, args: Vec<ValueId>) {
        self.terminate(Terminator::Jump { target, args });
    }

    pub fn branch(&mut self, cond: ValueId, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn switch(&mut self, scrutinee: ValueId, cases: Vec<(i64, BlockId)>, default: BlockId) {
        self.terminate(Terminator::Switch {
            scrutinee,
            cases,
            default,
        });
    }

    pub fn map_lookup(&mut self, map: ValueId, key: ValueId, found: BlockId, absent: BlockId) {
        self.terminate(Terminator::MapLookup {
            map,
            key,
            found,
            absent,
        });
    }

    pub fn receive_wait(&mut self, ctx: ValueId, message: BlockId, timeout: BlockId) {
        self.terminate(Terminator::ReceiveWait {
            ctx,
            message,
            timeout,
        });
    }

    /// Raise a fresh exception to the current handler.
    pub fn raise(&mut self, class: ExceptionClass, reason: ValueId) {
        let handler = self.handler;
        self.terminate(Terminator::Raise {
            kind: RaiseKind::New { class, reason },
            handler,
        });
    }

    /// Re-raise `exception` to the current handler.
    pub fn rethrow(&mut self, exception: ValueId) {
        let handler = self.handler;
        self.terminate(Terminator::Raise {
            kind: RaiseKind::Rethrow { exception },
            handler,
        });
    }

    pub fn catch_dispatch(
        &mut self,
        exception: ValueId,
        cases: Vec<(ExceptionClass, BlockId)>,
        otherwise: BlockId,
    ) {
        self.terminate(Terminator::CatchDispatch {
            exception,
            cases,
            otherwise,
        });
    }

    pub fn unreachable(&mut self) {
        self.terminate(Terminator::Unreachable);
    }

    // Finalization

    /// Produce the function, dropping blocks unreachable from the entry.
    ///
    /// Blocks are renumbered densely in creation order. Value ids are left
    /// alone. Reachable blocks without a terminator are kept as they are for
    /// the verifier to reject.
    pub fn finish(self) -> Function {
        let live = graph::reachable_of(&self.blocks, BlockId::new(0));
        let mut remap: Vec<Option<BlockId>> = vec![None; self.blocks.len()];
        let mut next = 0u32;
        for (i, keep) in live.iter().enumerate() {
            if *keep {
                remap[i] = Some(BlockId::new(next));
                next += 1;
            }
        }
        let dropped = self.blocks.len() - next as usize;
        if dropped > 0 {
            tracing::trace!(function = self.name.raw(), dropped, "pruned unreachable blocks");
        }

        let renumber = |b: &mut BlockId| {
            if let Some(new) = remap.get(b.index()).copied().flatten() {
                *b = new;
            }
        };

        let mut blocks = Vec::with_capacity(next as usize);
        for (i, mut block) in self.blocks.into_iter().enumerate() {
            if !live[i] {
                continue;
            }
            renumber(&mut block.id);
            for instr in &mut block.instrs {
                if let Some(h) = instr.handler.as_mut() {
                    renumber(h);
                }
                if let Some(h) = instr.op.block_ref_mut() {
                    renumber(h);
                }
            }
            if let Some(term) = block.terminator.as_mut() {
                term.for_each_target_mut(renumber);
            }
            blocks.push(block);
        }

        Function {
            name: self.name,
            arity: self.arity,
            params: self.params,
            blocks,
            entry: BlockId::new(0),
            value_classes: self.value_classes,
            env: self.env,
            origin: self.origin,
            match_sites: self.match_sites,
            span: self.span,
        }
    }
}
