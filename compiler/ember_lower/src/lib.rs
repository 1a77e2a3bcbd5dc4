//! Lowering from the input AST to MIR.
//!
//! [`lower_module`] turns one [`ModuleDef`] into a MIR [`Module`]:
//!
//! - every function definition becomes a MIR function whose clauses are
//!   compiled into a decision tree by `ember_match`
//! - every `fun` expression becomes a lifted closure body plus a
//!   `MakeClosure` at the definition site
//! - `spawn`, `!` and `receive` become process operations; `receive` is the
//!   start/wait/message/next/done loop over the mailbox
//! - `try` opens an exception region whose raising operations all name the
//!   region's handler block
//!
//! Source problems (unbound variables, illegal guards, calls to undefined
//! functions, ...) are reported per function as [`FunctionError`]s. A
//! failing function does not stop its siblings from being lowered, so one
//! run reports every problem in the module.

mod arith;
mod calls;
mod closures;
mod collections;
mod error;
mod exceptions;
mod expr;
mod guards;
mod matching;
mod module;
mod process;
mod scope;

pub use error::{FunctionError, SourceError};

use ember_ir::ast::{FunctionDef, ModuleDef};
use ember_ir::StringInterner;
use ember_mir::{FuncId, FunctionBuilder, Module, ValueClass};
use tracing::debug;

use crate::expr::Lowerer;
use crate::module::{Enclosing, ModuleCtx};
use crate::scope::LowerScope;

/// Lower a whole module.
///
/// Function ids follow definition order; lifted closures and trampolines
/// are appended after the function that created them.
pub fn lower_module<'a>(
    def: &'a ModuleDef,
    interner: &'a StringInterner,
) -> Result<Module, Vec<FunctionError>> {
    let mut ctx = ModuleCtx::new(def.name, interner);
    let mut errors = Vec::new();
    let label = |f: &FunctionDef| format!("{}/{}", interner.lookup(f.name), f.arity);

    let mut declared = Vec::with_capacity(def.functions.len());
    for function in &def.functions {
        match ctx.declare(function.name, function.arity, function.span) {
            Ok(id) => declared.push((id, function)),
            Err(error) => errors.push(FunctionError {
                function: label(function),
                error,
            }),
        }
    }

    for (id, function) in declared {
        if let Err(error) = lower_function(&mut ctx, id, function) {
            debug!(function = %label(function), %error, "function failed to lower");
            errors.push(FunctionError {
                function: label(function),
                error,
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    ctx.finish().map_err(|error| {
        vec![FunctionError {
            function: interner.lookup(def.name).to_owned(),
            error,
        }]
    })
}

fn lower_function<'a>(ctx: &mut ModuleCtx<'a>, id: FuncId, def: &'a FunctionDef) -> Result<(), SourceError> {
    ctx.begin_source_function(Enclosing {
        id,
        name: def.name,
        arity: def.arity,
    });
    let mut builder = FunctionBuilder::new(def.name, def.arity, def.span);
    let params: Vec<_> = (0..def.arity).map(|_| builder.add_param(ValueClass::Term)).collect();

    let mut lowerer = Lowerer::new(&mut *ctx, builder, LowerScope::new());
    lowerer.lower_clauses(def.span, &def.clauses, &params, false)?;
    let function = lowerer.finish();
    debug!(
        function = ctx.interner.lookup(def.name),
        arity = def.arity,
        blocks = function.blocks.len(),
        values = function.value_count(),
        "lowered function"
    );
    ctx.install(id, function);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap to panic on unexpected state")]
mod tests;
