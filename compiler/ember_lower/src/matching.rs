//! Match sites: function heads, `case`, `if`, `P = E`, and the shared
//! machinery `receive` and `try` build on.
//!
//! A site is flattened against the current scope, compiled to a decision
//! tree and expanded in place. The expansion calls back into the
//! [`Lowerer`] (as its [`MatchSink`]) for guards and for the site's
//! no-match behaviour. Clause bodies are then lowered one by one and joined
//! at a merge block.

use std::borrow::Cow;

use ember_ir::ast::{Clause, ExceptionClass, Expr, Pattern};
use ember_ir::{Name, Span};
use ember_match::{flatten_clause, ClauseEntry, MatchSink};
use ember_mir::{BlockId, FunctionBuilder, MatchKind, ValueClass, ValueId};
use tracing::trace;

use crate::expr::Lowerer;
use crate::scope::{exports, LowerScope};
use crate::SourceError;

/// What happens when no clause of a site matches.
#[derive(Clone, Copy, Debug)]
pub(crate) enum NoMatch {
    /// Raise an `error`: the bare atom `reason`, or `{reason, value}`.
    Raise {
        reason: &'static str,
        value: Option<ValueId>,
    },
    /// Hand an exception no catch clause wants to the outer handler.
    Rethrow { exception: ValueId },
    /// Skip the current message and wait for the next one.
    NextMessage { ctx: ValueId, wait: BlockId },
}

/// State of the site being expanded.
pub(crate) struct Site<'a> {
    guards: Vec<Option<&'a Expr>>,
    no_match: NoMatch,
}

/// One clause as seen by a match site.
pub(crate) struct Arm<'a> {
    pub patterns: Cow<'a, [Pattern]>,
    pub guard: Option<&'a Expr>,
    pub span: Span,
}

impl<'a> Arm<'a> {
    pub(crate) fn of_clause(clause: &'a Clause) -> Self {
        Arm {
            patterns: Cow::Borrowed(&clause.patterns),
            guard: clause.guard.as_ref(),
            span: clause.span,
        }
    }
}

/// Where a lowered clause body fell through to.
pub(crate) struct ArmEnd {
    pub block: BlockId,
    pub value: ValueId,
    pub scope: LowerScope,
}

pub(crate) fn clause_arms(clauses: &[Clause]) -> Vec<Arm<'_>> {
    clauses.iter().map(Arm::of_clause).collect()
}

pub(crate) fn clause_bodies(clauses: &[Clause]) -> Vec<&[Expr]> {
    clauses.iter().map(|c| c.body.as_slice()).collect()
}

impl<'a> Lowerer<'_, 'a> {
    /// Compile and expand a match of `arms` over `scrutinees` at the
    /// current block.
    ///
    /// With `fresh_heads` the patterns ignore the enclosing scope, so a
    /// `fun` parameter shadows a captured variable of the same name.
    pub(crate) fn compile_site(
        &mut self,
        kind: MatchKind,
        span: Span,
        arms: &[Arm<'a>],
        scrutinees: &[ValueId],
        no_match: NoMatch,
        fresh_heads: bool,
    ) -> Result<Vec<Option<ClauseEntry>>, SourceError> {
        let empty = LowerScope::new();
        let scope = if fresh_heads { &empty } else { &self.scope };
        let mut flat = Vec::with_capacity(arms.len());
        for arm in arms {
            flat.push(flatten_clause(
                &arm.patterns,
                arm.guard.is_some(),
                arm.span,
                scope,
                &mut self.module.literals,
            )?);
        }
        let compiled = ember_match::compile(flat, scrutinees.len())?;
        self.builder.add_match_site(compiled.site(kind, span));
        trace!(site = kind.as_str(), clauses = arms.len(), "lowering match site");

        let site = Site {
            guards: arms.iter().map(|arm| arm.guard).collect(),
            no_match,
        };
        let outer = self.site.replace(site);
        let entries = ember_match::emit(&compiled, scrutinees, self);
        self.site = outer;
        entries
    }

    /// Lower the body of every reachable clause.
    ///
    /// Each body starts from the current scope plus the clause's variables.
    /// In a `receive`, a body first consumes the matched message.
    pub(crate) fn lower_arms(
        &mut self,
        entries: Vec<Option<ClauseEntry>>,
        bodies: &[&'a [Expr]],
        receive_ctx: Option<ValueId>,
    ) -> Result<Vec<ArmEnd>, SourceError> {
        let before = self.scope.clone();
        let mut ends = Vec::with_capacity(entries.len());
        for (entry, body) in entries.into_iter().zip(bodies) {
            let Some(entry) = entry else {
                continue;
            };
            self.scope = before.clone();
            for (name, value) in entry.vars {
                self.scope.bind(name, value);
            }
            self.builder.position_at(entry.block);
            if let Some(ctx) = receive_ctx {
                self.builder.receive_done(ctx);
            }
            let value = self.lower_body(body)?;
            if self.is_dead() {
                continue;
            }
            ends.push(ArmEnd {
                block: self.builder.current_block(),
                value,
                scope: std::mem::take(&mut self.scope),
            });
        }
        self.scope = before;
        Ok(ends)
    }

    /// Join arm ends at a fresh block whose first parameter is the result.
    ///
    /// With `export`, variables every arm bound are passed along as further
    /// parameters and stay visible after the construct.
    pub(crate) fn merge_arms(&mut self, before: LowerScope, ends: Vec<ArmEnd>, export: bool) -> ValueId {
        self.scope = before;
        if ends.is_empty() {
            return self.continue_unreachable();
        }
        let exported: Vec<Name> = if export {
            let scopes: Vec<&LowerScope> = ends.iter().map(|end| &end.scope).collect();
            exports(&self.scope, &scopes)
        } else {
            Vec::new()
        };

        let merge = self.builder.new_block();
        let result = self.builder.add_block_param(merge, ValueClass::Term);
        let params: Vec<ValueId> = exported
            .iter()
            .map(|_| self.builder.add_block_param(merge, ValueClass::Term))
            .collect();
        for end in &ends {
            let mut args = Vec::with_capacity(1 + exported.len());
            args.push(end.value);
            args.extend(exported.iter().filter_map(|name| end.scope.lookup(*name)));
            self.builder.position_at(end.block);
            self.builder.jump(merge, args);
        }
        for (name, value) in exported.into_iter().zip(params) {
            self.scope.bind(name, value);
        }
        self.builder.position_at(merge);
        result
    }

    /// Lower the clauses of a function or `fun` over its parameters. Every
    /// body returns; no match raises `function_clause`.
    pub(crate) fn lower_clauses(
        &mut self,
        span: Span,
        clauses: &'a [Clause],
        params: &[ValueId],
        fresh_heads: bool,
    ) -> Result<(), SourceError> {
        let arms = clause_arms(clauses);
        let no_match = NoMatch::Raise {
            reason: "function_clause",
            value: None,
        };
        let entries = self.compile_site(MatchKind::FunctionHead, span, &arms, params, no_match, fresh_heads)?;
        let ends = self.lower_arms(entries, &clause_bodies(clauses), None)?;
        for end in ends {
            self.builder.position_at(end.block);
            self.builder.ret(end.value);
        }
        Ok(())
    }

    pub(crate) fn lower_case(
        &mut self,
        scrutinee: &'a Expr,
        clauses: &'a [Clause],
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let value = self.lower_expr(scrutinee)?;
        let no_match = NoMatch::Raise {
            reason: "case_clause",
            value: Some(value),
        };
        let entries = self.compile_site(MatchKind::Case, span, &clause_arms(clauses), &[value], no_match, false)?;
        let before = self.scope.clone();
        let ends = self.lower_arms(entries, &clause_bodies(clauses), None)?;
        Ok(self.merge_arms(before, ends, true))
    }

    /// `if`: a match over no values where only the guards decide.
    pub(crate) fn lower_if(
        &mut self,
        clauses: &'a [ember_ir::ast::IfClause],
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let arms: Vec<Arm<'a>> = clauses
            .iter()
            .map(|clause| Arm {
                patterns: Cow::Borrowed(&[]),
                guard: Some(&clause.guard),
                span: clause.span,
            })
            .collect();
        let no_match = NoMatch::Raise {
            reason: "if_clause",
            value: None,
        };
        let entries = self.compile_site(MatchKind::If, span, &arms, &[], no_match, false)?;
        let bodies: Vec<&'a [Expr]> = clauses.iter().map(|c| c.body.as_slice()).collect();
        let before = self.scope.clone();
        let ends = self.lower_arms(entries, &bodies, None)?;
        Ok(self.merge_arms(before, ends, true))
    }

    /// `Pattern = Value`. Evaluates to the value; variables bound by the
    /// pattern stay in scope.
    pub(crate) fn lower_match_expr(
        &mut self,
        pattern: &'a Pattern,
        value: &'a Expr,
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let value = self.lower_expr(value)?;
        let arms = [Arm {
            patterns: Cow::Borrowed(std::slice::from_ref(pattern)),
            guard: None,
            span,
        }];
        let no_match = NoMatch::Raise {
            reason: "badmatch",
            value: Some(value),
        };
        let entries = self.compile_site(MatchKind::Match, span, &arms, &[value], no_match, false)?;
        match entries.into_iter().next().flatten() {
            Some(entry) => {
                self.builder.position_at(entry.block);
                for (name, bound) in entry.vars {
                    self.scope.bind(name, bound);
                }
                Ok(value)
            }
            None => Ok(self.continue_unreachable()),
        }
    }
}

impl MatchSink for Lowerer<'_, '_> {
    type Error = SourceError;

    fn builder(&mut self) -> &mut FunctionBuilder {
        &mut self.builder
    }

    fn outer_value(&mut self, name: Name) -> Option<ValueId> {
        self.scope.lookup(name)
    }

    fn emit_guard(
        &mut self,
        clause: usize,
        bindings: &[(Name, ValueId)],
        on_fail: BlockId,
    ) -> Result<(), SourceError> {
        let guard = self
            .site
            .as_ref()
            .and_then(|site| site.guards.get(clause).copied().flatten());
        let Some(guard) = guard else {
            return Err(SourceError::internal(format!("clause {clause} has no guard")));
        };
        self.lower_guard(guard, bindings, on_fail)
    }

    fn emit_no_match(&mut self) -> Result<(), SourceError> {
        let Some(no_match) = self.site.as_ref().map(|site| site.no_match) else {
            return Err(SourceError::internal("no-match outside of a match site"));
        };
        match no_match {
            NoMatch::Raise { reason, value } => {
                let reason = match value {
                    Some(value) => self.tagged(reason, value),
                    None => self.atom(reason),
                };
                self.builder.raise(ExceptionClass::Error, reason);
            }
            NoMatch::Rethrow { exception } => self.builder.rethrow(exception),
            NoMatch::NextMessage { ctx, wait } => {
                self.builder.receive_next(ctx);
                self.builder.jump(wait, Vec::new());
            }
        }
        Ok(())
    }
}
