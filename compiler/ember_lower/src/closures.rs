//! Closure conversion.
//!
//! A `fun` expression is lifted into a module function of its own. The
//! variables it uses from the enclosing scope are copied into an
//! environment by `MakeClosure`; the lifted body receives the closure as an
//! implicit first parameter and reads them back with `GetEnv` on entry.
//!
//! `fun name/N` references go through a per-target trampoline with an empty
//! environment, so every closure value has the same calling convention.

use ember_ir::ast::{CatchClass, Clause, Expr, ExprKind, Pattern, SegmentSize};
use ember_ir::{Name, Span};
use ember_mir::{Capture, ClosureEnv, FunctionBuilder, FunctionOrigin, ValueClass, ValueId};
use ember_stack::ensure_sufficient_stack;
use rustc_hash::FxHashSet;
use tracing::debug;

use crate::expr::Lowerer;
use crate::scope::LowerScope;
use crate::SourceError;

impl<'a> Lowerer<'_, 'a> {
    pub(crate) fn lower_fun(&mut self, clauses: &'a [Clause], span: Span) -> Result<ValueId, SourceError> {
        let Some(first) = clauses.first() else {
            return Err(SourceError::Unsupported {
                what: "fun without clauses",
                span,
            });
        };
        let arity = u32::try_from(first.patterns.len()).map_err(|_| SourceError::Unsupported {
            what: "fun with too many parameters",
            span,
        })?;

        let captured: Vec<(Name, ValueId)> = free_variables(clauses)
            .into_iter()
            .filter_map(|name| self.scope.lookup(name).map(|value| (name, value)))
            .collect();
        let (name, index) = self.module.next_closure_name()?;
        let Some(parent) = self.module.enclosing() else {
            return Err(SourceError::internal("fun outside of any function"));
        };

        let mut builder = FunctionBuilder::new(name, arity, span);
        builder.set_origin(FunctionOrigin::Closure {
            parent: parent.id,
            index,
        });
        builder.set_env(ClosureEnv {
            captures: captured
                .iter()
                .map(|&(name, _)| Capture {
                    name,
                    class: ValueClass::Term,
                })
                .collect(),
        });
        let env = builder.add_param(ValueClass::Term);
        let params: Vec<ValueId> = (0..arity).map(|_| builder.add_param(ValueClass::Term)).collect();
        let mut scope = LowerScope::new();
        for (slot, &(name, _)) in (0u32..).zip(&captured) {
            let value = builder.get_env(env, slot);
            scope.bind(name, value);
        }

        let id = self.module.reserve();
        let mut body = Lowerer::new(&mut *self.module, builder, scope);
        body.lower_clauses(span, clauses, &params, true)?;
        let function = body.finish();
        debug!(
            function = self.module.interner.lookup(name),
            captures = captured.len(),
            blocks = function.blocks.len(),
            "lifted closure"
        );
        self.module.install(id, function);

        let env_values = captured.into_iter().map(|(_, value)| value).collect();
        Ok(self.builder.make_closure(id, arity, env_values))
    }

    pub(crate) fn lower_fun_ref(&mut self, function: Name, arity: u32, span: Span) -> Result<ValueId, SourceError> {
        let Some(target) = self.module.lookup(function, arity) else {
            return Err(SourceError::UnknownFunction {
                name: function,
                arity,
                span,
            });
        };
        let trampoline = self.module.trampoline(target, function, arity);
        Ok(self.builder.make_closure(trampoline, arity, Vec::new()))
    }
}

/// Variables mentioned anywhere inside `clauses`, in order of first
/// occurrence. The caller keeps the ones bound outside.
pub(crate) fn free_variables(clauses: &[Clause]) -> Vec<Name> {
    let mut collector = Collector::default();
    for clause in clauses {
        collector.clause(clause);
    }
    collector.order
}

#[derive(Default)]
struct Collector {
    seen: FxHashSet<Name>,
    order: Vec<Name>,
}

impl Collector {
    fn note(&mut self, name: Name) {
        if self.seen.insert(name) {
            self.order.push(name);
        }
    }

    fn clause(&mut self, clause: &Clause) {
        for pattern in &clause.patterns {
            self.pattern(pattern);
        }
        if let Some(guard) = &clause.guard {
            self.expr(guard);
        }
        self.exprs(&clause.body);
    }

    fn exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        for name in pattern.variables() {
            self.note(name);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        ensure_sufficient_stack(|| self.expr_inner(expr));
    }

    fn expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Nil | ExprKind::FunRef { .. } => {}
            ExprKind::Var(name) => self.note(*name),
            ExprKind::Tuple(elements) | ExprKind::Block(elements) => self.exprs(elements),
            ExprKind::Cons { head, tail } => {
                self.expr(head);
                self.expr(tail);
            }
            ExprKind::List { elements, tail } => {
                self.exprs(elements);
                if let Some(tail) = tail {
                    self.expr(tail);
                }
            }
            ExprKind::Map(entries) => {
                for (key, value) in entries {
                    self.expr(key);
                    self.expr(value);
                }
            }
            ExprKind::Bin(segments) => {
                for segment in segments {
                    self.expr(&segment.value);
                    if let SegmentSize::Var(name) = &segment.size {
                        self.note(*name);
                    }
                }
            }
            ExprKind::BinOp { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::UnOp { operand, .. } => self.expr(operand),
            ExprKind::Match { pattern, value } => {
                self.pattern(pattern);
                self.expr(value);
            }
            ExprKind::Call { args, .. } | ExprKind::RemoteCall { args, .. } => self.exprs(args),
            ExprKind::Apply { callee, args } | ExprKind::Spawn { callee, args } => {
                self.expr(callee);
                self.exprs(args);
            }
            ExprKind::Fun { clauses } => {
                for clause in clauses {
                    self.clause(clause);
                }
            }
            ExprKind::Case { scrutinee, clauses } => {
                self.expr(scrutinee);
                for clause in clauses {
                    self.clause(clause);
                }
            }
            ExprKind::If { clauses } => {
                for clause in clauses {
                    self.expr(&clause.guard);
                    self.exprs(&clause.body);
                }
            }
            ExprKind::Send { to, message } => {
                self.expr(to);
                self.expr(message);
            }
            ExprKind::Receive { clauses, after } => {
                for clause in clauses {
                    self.clause(clause);
                }
                if let Some(after) = after {
                    self.expr(&after.timeout);
                    self.exprs(&after.body);
                }
            }
            ExprKind::Try(try_expr) => {
                self.exprs(&try_expr.body);
                for clause in &try_expr.of_clauses {
                    self.clause(clause);
                }
                for clause in &try_expr.catch_clauses {
                    if let CatchClass::Var(name) = &clause.class {
                        self.note(*name);
                    }
                    self.pattern(&clause.reason);
                    if let Some(guard) = &clause.guard {
                        self.expr(guard);
                    }
                    self.exprs(&clause.body);
                }
            }
            ExprKind::Raise { reason, .. } => self.expr(reason),
        }
    }
}
