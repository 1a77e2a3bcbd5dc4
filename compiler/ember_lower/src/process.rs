//! `spawn`, `!` and `receive`.
//!
//! A receive is a loop over the mailbox:
//!
//! ```text
//!   ctx = receive_start(Timeout)
//! wait:
//!   receive_wait ctx, message, timeout
//! message:
//!   M = receive_message(ctx)
//!   <decision tree over M>      no match: receive_next(ctx); jump wait
//! clause_i(vars):
//!   receive_done(ctx)           removes M, later messages keep their order
//!   <body>
//! timeout:
//!   receive_done(ctx)
//!   <after body>                or `unreachable` without an `after`
//! ```

use ember_ir::ast::{After, Clause, Expr, ExprKind};
use ember_ir::Span;
use ember_mir::{MatchKind, SpawnTarget, ValueId};

use crate::expr::Lowerer;
use crate::matching::{clause_arms, clause_bodies, ArmEnd, NoMatch};
use crate::SourceError;

impl<'a> Lowerer<'_, 'a> {
    /// `spawn(Callee, Args)`. A static `fun name/N` of this module spawns
    /// the function directly; anything else spawns a closure value.
    pub(crate) fn lower_spawn(
        &mut self,
        callee: &'a Expr,
        args: &'a [Expr],
    ) -> Result<ValueId, SourceError> {
        if let ExprKind::FunRef { function, arity } = callee.kind {
            if arity as usize == args.len() {
                if let Some(target) = self.module.lookup(function, arity) {
                    let args = self.lower_all(args)?;
                    return Ok(self.builder.spawn(SpawnTarget::Direct(target), args));
                }
            }
        }
        let closure = self.lower_expr(callee)?;
        let args = self.lower_all(args)?;
        Ok(self.builder.spawn(SpawnTarget::Closure(closure), args))
    }

    /// `To ! Message` evaluates to the message.
    pub(crate) fn lower_send(&mut self, to: &'a Expr, message: &'a Expr) -> Result<ValueId, SourceError> {
        let to = self.lower_expr(to)?;
        let message = self.lower_expr(message)?;
        Ok(self.builder.send(to, message))
    }

    pub(crate) fn lower_receive(
        &mut self,
        clauses: &'a [Clause],
        after: Option<&'a After>,
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let timeout = match after {
            Some(after) => self.lower_expr(&after.timeout)?,
            None => self.atom("infinity"),
        };
        let ctx = self.builder.receive_start(timeout);
        let wait = self.builder.new_block();
        let has_message = self.builder.new_block();
        let timed_out = self.builder.new_block();
        self.builder.jump(wait, Vec::new());
        self.builder.position_at(wait);
        self.builder.receive_wait(ctx, has_message, timed_out);

        self.builder.position_at(has_message);
        let message = self.builder.receive_message(ctx);
        let no_match = NoMatch::NextMessage { ctx, wait };
        let entries = self.compile_site(
            MatchKind::Receive,
            span,
            &clause_arms(clauses),
            &[message],
            no_match,
            false,
        )?;
        let before = self.scope.clone();
        let mut ends = self.lower_arms(entries, &clause_bodies(clauses), Some(ctx))?;

        self.builder.position_at(timed_out);
        match after {
            Some(after) => {
                self.builder.receive_done(ctx);
                let value = self.lower_body(&after.body)?;
                if !self.is_dead() {
                    ends.push(ArmEnd {
                        block: self.builder.current_block(),
                        value,
                        scope: std::mem::take(&mut self.scope),
                    });
                }
            }
            None => self.builder.unreachable(),
        }
        Ok(self.merge_arms(before, ends, true))
    }
}
