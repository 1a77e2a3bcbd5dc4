//! Guards.
//!
//! A guard is an expression from a restricted subset: no side effects, no
//! user function calls, no binding. It is lowered like any other expression
//! but with a private exception handler, so anything that raises inside the
//! guard (`hd([])`, a bad `element/2`, a non-boolean `andalso`) simply makes
//! the guard fail.

use ember_ir::ast::{Expr, ExprKind};
use ember_ir::Name;
use ember_mir::{BlockId, ValueClass, ValueId};

use crate::expr::Lowerer;
use crate::SourceError;

/// Why `kind` may not appear in a guard, if it may not.
///
/// Calls are checked where they are resolved, since only BIFs are allowed.
pub(crate) fn guard_violation(kind: &ExprKind) -> Option<&'static str> {
    let what = match kind {
        ExprKind::Match { .. } => "a match",
        ExprKind::RemoteCall { .. } => "a remote call",
        ExprKind::Apply { .. } => "a fun application",
        ExprKind::FunRef { .. } | ExprKind::Fun { .. } => "a fun",
        ExprKind::Case { .. } => "a case expression",
        ExprKind::If { .. } => "an if expression",
        ExprKind::Block(_) => "a block",
        ExprKind::Spawn { .. } => "spawn",
        ExprKind::Send { .. } => "a send",
        ExprKind::Receive { .. } => "a receive",
        ExprKind::Try(_) => "a try expression",
        ExprKind::Raise { .. } => "an explicit raise",
        _ => return None,
    };
    Some(what)
}

impl<'a> Lowerer<'_, 'a> {
    /// Emit `guard` with the clause's `bindings` in scope. Falls through to
    /// a fresh block when the guard is `true`; branches to `on_fail` when it
    /// is anything else or raises.
    pub(crate) fn lower_guard(
        &mut self,
        guard: &'a Expr,
        bindings: &[(Name, ValueId)],
        on_fail: BlockId,
    ) -> Result<(), SourceError> {
        let saved = self.scope.clone();
        for &(name, value) in bindings {
            self.scope.bind(name, value);
        }

        let raised = self.builder.new_block();
        self.builder.add_block_param(raised, ValueClass::Term);
        let outer = self.builder.set_handler(Some(raised));
        let was_guard = std::mem::replace(&mut self.in_guard, true);
        let result = self.lower_expr(guard);
        self.in_guard = was_guard;
        self.builder.set_handler(outer);
        self.scope = saved;
        let value = result?;

        let holds = self.builder.term_to_bool(value);
        let pass = self.builder.new_block();
        self.builder.branch(holds, pass, on_fail);
        self.builder.position_at(raised);
        self.builder.jump(on_fail, Vec::new());
        self.builder.position_at(pass);
        Ok(())
    }
}
