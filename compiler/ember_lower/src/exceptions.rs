//! `throw`/`error`/`exit` and `try ... of ... catch ... end`.
//!
//! The try body runs inside a region opened by `TryEnter`; every raising
//! operation in it names the region's handler block, which receives the
//! exception term. `of` clauses run after `TryExit`, outside the region.
//! The handler dispatches on the class, matches `Class:Reason` against the
//! catch clauses, and rethrows to the enclosing handler when nothing
//! matches.
//!
//! Variables bound inside a `try` are not visible after it.

use std::borrow::Cow;

use ember_ir::ast::{CatchClass, CatchClause, ExceptionClass, Expr, Pattern, TryExpr};
use ember_mir::{MatchKind, ValueClass, ValueId};
use tracing::trace;

use crate::expr::Lowerer;
use crate::matching::{clause_arms, clause_bodies, Arm, ArmEnd, NoMatch};
use crate::SourceError;

impl<'a> Lowerer<'_, 'a> {
    pub(crate) fn lower_raise(&mut self, class: ExceptionClass, reason: &'a Expr) -> Result<ValueId, SourceError> {
        let reason = self.lower_expr(reason)?;
        self.builder.raise(class, reason);
        Ok(self.continue_unreachable())
    }

    pub(crate) fn lower_try(&mut self, expr: &'a TryExpr) -> Result<ValueId, SourceError> {
        let before = self.scope.clone();
        let handler = self.builder.new_block();
        let exception = self.builder.add_block_param(handler, ValueClass::Term);

        self.builder.try_enter(handler);
        let outer = self.builder.set_handler(Some(handler));
        let body = self.lower_body(&expr.body);
        self.builder.set_handler(outer);
        let body = body?;

        let mut ends = Vec::new();
        if !self.is_dead() {
            self.builder.try_exit();
            if expr.of_clauses.is_empty() {
                ends.push(ArmEnd {
                    block: self.builder.current_block(),
                    value: body,
                    scope: before.clone(),
                });
            } else {
                let no_match = NoMatch::Raise {
                    reason: "try_clause",
                    value: Some(body),
                };
                let entries = self.compile_site(
                    MatchKind::TryOf,
                    expr.span,
                    &clause_arms(&expr.of_clauses),
                    &[body],
                    no_match,
                    false,
                )?;
                ends.extend(self.lower_arms(entries, &clause_bodies(&expr.of_clauses), None)?);
            }
        }

        self.scope = before.clone();
        self.builder.position_at(handler);
        if expr.catch_clauses.is_empty() {
            self.builder.rethrow(exception);
        } else {
            ends.extend(self.lower_catch(&expr.catch_clauses, exception, expr)?);
        }
        Ok(self.merge_arms(before, ends, false))
    }

    /// The handler block: class dispatch, then the catch clauses over
    /// `[Class, Reason]`.
    fn lower_catch(
        &mut self,
        clauses: &'a [CatchClause],
        exception: ValueId,
        expr: &'a TryExpr,
    ) -> Result<Vec<ArmEnd>, SourceError> {
        let admitted: Vec<ExceptionClass> = ExceptionClass::ALL
            .into_iter()
            .filter(|class| clauses.iter().any(|clause| clause.class.admits(*class)))
            .collect();
        trace!(classes = admitted.len(), clauses = clauses.len(), "lowering catch");

        let caught = self.builder.new_block();
        let passed = self.builder.new_block();
        let cases = admitted.into_iter().map(|class| (class, caught)).collect();
        self.builder.catch_dispatch(exception, cases, passed);
        self.builder.position_at(passed);
        self.builder.rethrow(exception);

        self.builder.position_at(caught);
        let class = self.builder.exception_class(exception);
        let reason = self.builder.exception_reason(exception);
        let arms: Vec<Arm<'a>> = clauses
            .iter()
            .map(|clause| Arm {
                patterns: Cow::Owned(vec![self.class_pattern(&clause.class), clause.reason.clone()]),
                guard: clause.guard.as_ref(),
                span: clause.span,
            })
            .collect();
        let entries = self.compile_site(
            MatchKind::Catch,
            expr.span,
            &arms,
            &[class, reason],
            NoMatch::Rethrow { exception },
            false,
        )?;
        let bodies: Vec<&'a [Expr]> = clauses.iter().map(|c| c.body.as_slice()).collect();
        self.lower_arms(entries, &bodies, None)
    }

    fn class_pattern(&self, class: &CatchClass) -> Pattern {
        match class {
            CatchClass::Exact(class) => Pattern::atom(self.module.interner.intern(class.as_str())),
            CatchClass::Var(name) => Pattern::var(*name),
            CatchClass::Any => Pattern::wildcard(),
        }
    }
}
