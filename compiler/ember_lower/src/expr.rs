//! Expression lowering: the core dispatch from AST to MIR.
//!
//! [`Lowerer`] walks one function's expression tree and emits MIR through
//! its [`FunctionBuilder`]. Every expression lowers to the [`ValueId`]
//! holding its term.
//!
//! Expressions that never complete (`throw`, `error`, a failing match) end
//! their block with a `Raise`. Lowering then continues in a fresh block no
//! edge reaches, so enclosing expressions need no special case; the builder
//! drops those blocks when the function is finished.

use ember_ir::ast::{Expr, ExprKind, Literal};
use ember_ir::Name;
use ember_mir::{BlockId, Function, FunctionBuilder, ValueId};
use ember_stack::ensure_sufficient_stack;
use ember_term::LiteralValue;
use rustc_hash::FxHashSet;

use crate::guards::guard_violation;
use crate::matching::Site;
use crate::module::ModuleCtx;
use crate::scope::LowerScope;
use crate::SourceError;

/// Lowers the body of one MIR function.
pub(crate) struct Lowerer<'m, 'a> {
    pub(crate) module: &'m mut ModuleCtx<'a>,
    pub(crate) builder: FunctionBuilder,
    pub(crate) scope: LowerScope,
    /// Match site being expanded, read by the `MatchSink` callbacks.
    pub(crate) site: Option<Site<'a>>,
    pub(crate) in_guard: bool,
    /// Blocks started after a non-returning expression.
    dead: FxHashSet<BlockId>,
}

impl<'m, 'a> Lowerer<'m, 'a> {
    pub(crate) fn new(module: &'m mut ModuleCtx<'a>, builder: FunctionBuilder, scope: LowerScope) -> Self {
        Lowerer {
            module,
            builder,
            scope,
            site: None,
            in_guard: false,
            dead: FxHashSet::default(),
        }
    }

    pub(crate) fn finish(self) -> Function {
        self.builder.finish()
    }

    /// Lower `expr`, returning the value holding its term.
    pub(crate) fn lower_expr(&mut self, expr: &'a Expr) -> Result<ValueId, SourceError> {
        ensure_sufficient_stack(|| self.lower_expr_inner(expr))
    }

    fn lower_expr_inner(&mut self, expr: &'a Expr) -> Result<ValueId, SourceError> {
        let span = expr.span;
        if self.in_guard {
            if let Some(what) = guard_violation(&expr.kind) {
                return Err(SourceError::IllegalGuard { what, span });
            }
        }
        let previous = self.builder.set_span(span);
        let value = match &expr.kind {
            // Atoms and data
            ExprKind::Literal(literal) => Ok(self.literal(literal)),
            ExprKind::Nil => Ok(self.nil()),
            ExprKind::Var(name) => self.variable(*name, span),
            ExprKind::Tuple(elements) => self.lower_tuple(elements),
            ExprKind::Cons { head, tail } => self.lower_cons(head, tail),
            ExprKind::List { elements, tail } => self.lower_list(elements, tail.as_deref()),
            ExprKind::Map(entries) => self.lower_map(entries),
            ExprKind::Bin(segments) => self.lower_binary(segments, span),

            // Operators
            ExprKind::BinOp { op, lhs, rhs } => self.lower_binop(*op, lhs, rhs),
            ExprKind::UnOp { op, operand } => self.lower_unop(*op, operand),

            // Calls and closures
            ExprKind::Call { function, args } => self.lower_call(*function, args, span),
            ExprKind::RemoteCall {
                module,
                function,
                args,
            } => self.lower_remote_call(*module, *function, args),
            ExprKind::Apply { callee, args } => self.lower_apply(callee, args, span),
            ExprKind::FunRef { function, arity } => self.lower_fun_ref(*function, *arity, span),
            ExprKind::Fun { clauses } => self.lower_fun(clauses, span),

            // Matching and control flow
            ExprKind::Match { pattern, value } => self.lower_match_expr(pattern, value, span),
            ExprKind::Case { scrutinee, clauses } => self.lower_case(scrutinee, clauses, span),
            ExprKind::If { clauses } => self.lower_if(clauses, span),
            ExprKind::Block(body) => self.lower_body(body),

            // Processes
            ExprKind::Spawn { callee, args } => self.lower_spawn(callee, args),
            ExprKind::Send { to, message } => self.lower_send(to, message),
            ExprKind::Receive { clauses, after } => self.lower_receive(clauses, after.as_deref(), span),

            // Exceptions
            ExprKind::Try(try_expr) => self.lower_try(try_expr),
            ExprKind::Raise { class, reason } => self.lower_raise(*class, reason),
        };
        self.builder.set_span(previous);
        value
    }

    /// Lower a clause body or `begin ... end` block; the last expression is
    /// the value.
    pub(crate) fn lower_body(&mut self, body: &'a [Expr]) -> Result<ValueId, SourceError> {
        let mut value = None;
        for expr in body {
            value = Some(self.lower_expr(expr)?);
        }
        match value {
            Some(value) => Ok(value),
            None => Ok(self.nil()),
        }
    }

    /// Lower each expression in order.
    pub(crate) fn lower_all(&mut self, exprs: &'a [Expr]) -> Result<Vec<ValueId>, SourceError> {
        exprs.iter().map(|e| self.lower_expr(e)).collect()
    }

    fn variable(&mut self, name: Name, span: ember_ir::Span) -> Result<ValueId, SourceError> {
        self.scope
            .lookup(name)
            .ok_or(SourceError::UnboundVariable { name, span })
    }

    // Constants

    pub(crate) fn literal(&mut self, literal: &Literal) -> ValueId {
        let id = match literal {
            Literal::Integer(value) => self.module.literals.integer(value),
            Literal::Float(value) => self.module.literals.intern(LiteralValue::float(*value)),
            Literal::Atom(name) => self.module.literals.atom(*name),
        };
        self.builder.const_term(id)
    }

    pub(crate) fn nil(&mut self) -> ValueId {
        let id = self.module.literals.nil();
        self.builder.const_term(id)
    }

    pub(crate) fn atom(&mut self, text: &str) -> ValueId {
        let id = self.module.atom(text);
        self.builder.const_term(id)
    }

    pub(crate) fn small_int(&mut self, value: i64) -> ValueId {
        let id = self.module.literals.int(value);
        self.builder.const_term(id)
    }

    /// `{Tag, Value}`, the shape of most error reasons.
    pub(crate) fn tagged(&mut self, tag: &str, value: ValueId) -> ValueId {
        let tag = self.atom(tag);
        self.builder.make_tuple(vec![tag, value])
    }

    // Unreachable continuations

    /// Continue in a block no edge reaches, after the current block was
    /// terminated by something that does not fall through.
    pub(crate) fn continue_unreachable(&mut self) -> ValueId {
        let block = self.builder.new_block();
        self.dead.insert(block);
        self.builder.position_at(block);
        self.nil()
    }

    /// The current block was started by [`continue_unreachable`](Self::continue_unreachable).
    pub(crate) fn is_dead(&self) -> bool {
        self.dead.contains(&self.builder.current_block())
    }
}
