//! Operators.
//!
//! `+`, `-` and `*` try the small-integer fast path first: both operands
//! small, `CheckedArith` without overflow, re-tag. Anything else (big
//! integers, floats, non-numbers, overflow) goes to the runtime, which also
//! raises `badarith`. Ordering comparisons get the same treatment with
//! `TermCompare` as the general case.

use ember_ir::ast::{BinaryOp, ExceptionClass, Expr, UnaryOp};
use ember_mir::{BlockId, IntPredicate, IntWidth, RuntimeFn, ValueClass, ValueId};
use ember_term::{SmallArith, TermKind};

use crate::expr::Lowerer;
use crate::SourceError;

impl<'a> Lowerer<'_, 'a> {
    pub(crate) fn lower_binop(
        &mut self,
        op: BinaryOp,
        lhs: &'a Expr,
        rhs: &'a Expr,
    ) -> Result<ValueId, SourceError> {
        match op {
            BinaryOp::AndAlso => return self.short_circuit(lhs, rhs, true),
            BinaryOp::OrElse => return self.short_circuit(lhs, rhs, false),
            _ => {}
        }

        let l = self.lower_expr(lhs)?;
        let r = self.lower_expr(rhs)?;
        let value = match op {
            BinaryOp::Add => self.small_arith(SmallArith::Add, RuntimeFn::Add, l, r),
            BinaryOp::Sub => self.small_arith(SmallArith::Sub, RuntimeFn::Sub, l, r),
            BinaryOp::Mul => self.small_arith(SmallArith::Mul, RuntimeFn::Mul, l, r),
            BinaryOp::FloatDiv => self.builder.runtime_call(RuntimeFn::FloatDiv, vec![l, r]),
            BinaryOp::IntDiv => self.builder.runtime_call(RuntimeFn::IntDiv, vec![l, r]),
            BinaryOp::Rem => self.builder.runtime_call(RuntimeFn::Rem, vec![l, r]),
            BinaryOp::Band => self.builder.runtime_call(RuntimeFn::Band, vec![l, r]),
            BinaryOp::Bor => self.builder.runtime_call(RuntimeFn::Bor, vec![l, r]),
            BinaryOp::Bxor => self.builder.runtime_call(RuntimeFn::Bxor, vec![l, r]),
            BinaryOp::Bsl => self.builder.runtime_call(RuntimeFn::Bsl, vec![l, r]),
            BinaryOp::Bsr => self.builder.runtime_call(RuntimeFn::Bsr, vec![l, r]),
            BinaryOp::And => self.builder.runtime_call(RuntimeFn::BoolAnd, vec![l, r]),
            BinaryOp::Or => self.builder.runtime_call(RuntimeFn::BoolOr, vec![l, r]),
            BinaryOp::Xor => self.builder.runtime_call(RuntimeFn::BoolXor, vec![l, r]),
            BinaryOp::Eq => self.equality(l, r, false, false),
            BinaryOp::Ne => self.equality(l, r, false, true),
            BinaryOp::ExactEq => self.equality(l, r, true, false),
            BinaryOp::ExactNe => self.equality(l, r, true, true),
            BinaryOp::Lt => self.compare(IntPredicate::Lt, l, r),
            BinaryOp::Le => self.compare(IntPredicate::Le, l, r),
            BinaryOp::Gt => self.compare(IntPredicate::Gt, l, r),
            BinaryOp::Ge => self.compare(IntPredicate::Ge, l, r),
            BinaryOp::AndAlso | BinaryOp::OrElse => {
                return Err(SourceError::internal("short-circuit operator reached strict lowering"));
            }
        };
        Ok(value)
    }

    pub(crate) fn lower_unop(&mut self, op: UnaryOp, operand: &'a Expr) -> Result<ValueId, SourceError> {
        let value = self.lower_expr(operand)?;
        Ok(match op {
            // -X is 0 - X, which keeps the fast path.
            UnaryOp::Neg => {
                let zero = self.small_int(0);
                self.small_arith(SmallArith::Sub, RuntimeFn::Sub, zero, value)
            }
            UnaryOp::Not => self.builder.runtime_call(RuntimeFn::BoolNot, vec![value]),
            UnaryOp::Bnot => self.builder.runtime_call(RuntimeFn::Bnot, vec![value]),
        })
    }

    /// Branch to `fast` when both terms are small integers, else to `slow`.
    fn if_both_small(&mut self, l: ValueId, r: ValueId, fast: BlockId, slow: BlockId) {
        let check_rhs = self.builder.new_block();
        let l_small = self.builder.is_kind(l, TermKind::SmallInt);
        self.builder.branch(l_small, check_rhs, slow);
        self.builder.position_at(check_rhs);
        let r_small = self.builder.is_kind(r, TermKind::SmallInt);
        self.builder.branch(r_small, fast, slow);
    }

    fn small_arith(&mut self, op: SmallArith, fallback: RuntimeFn, l: ValueId, r: ValueId) -> ValueId {
        let fast = self.builder.new_block();
        let slow = self.builder.new_block();
        let done = self.builder.new_block();
        let result = self.builder.add_block_param(done, ValueClass::Term);
        self.if_both_small(l, r, fast, slow);

        self.builder.position_at(fast);
        let a = self.builder.untag_int(l);
        let b = self.builder.untag_int(r);
        let (raw, overflow) = self.builder.checked_arith(op, a, b);
        let retag = self.builder.new_block();
        self.builder.branch(overflow, slow, retag);
        self.builder.position_at(retag);
        let tagged = self.builder.tag_int(raw);
        self.builder.jump(done, vec![tagged]);

        self.builder.position_at(slow);
        let general = self.builder.runtime_call(fallback, vec![l, r]);
        self.builder.jump(done, vec![general]);

        self.builder.position_at(done);
        result
    }

    fn compare(&mut self, pred: IntPredicate, l: ValueId, r: ValueId) -> ValueId {
        let fast = self.builder.new_block();
        let slow = self.builder.new_block();
        let done = self.builder.new_block();
        let holds = self.builder.add_block_param(done, ValueClass::BOOL);
        self.if_both_small(l, r, fast, slow);

        self.builder.position_at(fast);
        let a = self.builder.untag_int(l);
        let b = self.builder.untag_int(r);
        let small = self.builder.int_cmp(pred, a, b);
        self.builder.jump(done, vec![small]);

        self.builder.position_at(slow);
        let order = self.builder.term_compare(l, r);
        let zero = self.builder.const_int(IntWidth::I64, 0);
        let general = self.builder.int_cmp(pred, order, zero);
        self.builder.jump(done, vec![general]);

        self.builder.position_at(done);
        self.builder.bool_to_term(holds)
    }

    fn equality(&mut self, l: ValueId, r: ValueId, exact: bool, negate: bool) -> ValueId {
        let mut equal = self.builder.term_eq(l, r, exact);
        if negate {
            let zero = self.builder.const_int(IntWidth::I1, 0);
            equal = self.builder.int_cmp(IntPredicate::Eq, equal, zero);
        }
        self.builder.bool_to_term(equal)
    }

    /// `andalso` (`is_and`) or `orelse`. The right operand is only
    /// evaluated when the left one does not decide the result, and is not
    /// itself checked. A non-boolean left operand raises `{badarg, L}`.
    fn short_circuit(&mut self, lhs: &'a Expr, rhs: &'a Expr, is_and: bool) -> Result<ValueId, SourceError> {
        let l = self.lower_expr(lhs)?;
        let (goes_on, decides) = if is_and { ("true", "false") } else { ("false", "true") };
        let goes_on = self.atom(goes_on);
        let decides = self.atom(decides);

        let eval_rhs = self.builder.new_block();
        let check = self.builder.new_block();
        let short = self.builder.new_block();
        let bad = self.builder.new_block();
        let done = self.builder.new_block();
        let result = self.builder.add_block_param(done, ValueClass::Term);

        let continues = self.builder.term_eq(l, goes_on, true);
        self.builder.branch(continues, eval_rhs, check);

        self.builder.position_at(check);
        let stops = self.builder.term_eq(l, decides, true);
        self.builder.branch(stops, short, bad);

        self.builder.position_at(bad);
        let reason = self.tagged("badarg", l);
        self.builder.raise(ExceptionClass::Error, reason);

        self.builder.position_at(short);
        self.builder.jump(done, vec![l]);

        self.builder.position_at(eval_rhs);
        let r = self.lower_expr(rhs)?;
        if !self.is_dead() {
            self.builder.jump(done, vec![r]);
        }

        self.builder.position_at(done);
        Ok(result)
    }
}
