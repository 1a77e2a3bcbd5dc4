//! Backend lowering for Ember.
//!
//! Walks a [`VerifiedModule`] and drives a [`BackendSink`] with
//! [`MachInstr`]s. The walk is mechanical:
//!
//! - value `%n` lives in [`Slot`] `n` and block `bbn` starts at [`Label`] `n`,
//!   so the output depends on nothing but the MIR
//! - operations that need the runtime become calls to their [`RuntimeFn`]
//!   symbol (allocation, send, spawn, the receive protocol, the boxed
//!   arithmetic fallback)
//! - raising operations carry their handler as the call's unwind label
//! - jump arguments become sequential moves into the target's parameters
//!
//! Functions are independent, so [`emit_parallel`] lowers them on the
//! rayon pool and reassembles the result in function order. It produces
//! exactly what [`emit`] sends to a [`CollectingSink`].
//!
//! [`RuntimeFn`]: ember_mir::RuntimeFn

mod error;
mod lower;
mod mach;
mod moves;
mod sink;

pub use error::EmitError;
pub use mach::{AluOp, Callee, Label, MachInstr, Operand, Slot};
pub use sink::{BackendSink, CollectingSink, EmittedFunction, EmittedModule, FunctionHeader};

use ember_ir::StringInterner;
use ember_mir::{FuncId, Function};
use ember_verify::VerifiedModule;
use rayon::prelude::*;
use tracing::debug;

use crate::lower::{Context, WellKnown};

/// `module:name/arity` for every function, in id order.
fn symbols(module: &VerifiedModule, names: &StringInterner) -> Vec<String> {
    let module_name = names.lookup(module.name());
    module
        .functions()
        .iter()
        .map(|f| format!("{module_name}:{}/{}", names.lookup(f.name), f.arity))
        .collect()
}

fn context<'a>(module: &'a VerifiedModule, names: &'a StringInterner) -> Context<'a> {
    Context {
        names,
        literals: module.literals(),
        symbols: symbols(module, names),
        atoms: WellKnown::new(names),
    }
}

fn emit_literals(module: &VerifiedModule, sink: &mut dyn BackendSink) {
    let pool = module.literals();
    for (id, value) in pool.iter() {
        if !pool.is_immediate(id) {
            sink.literal(id, value);
        }
    }
}

/// Lower `module` into `sink`, one function at a time.
pub fn emit(
    module: &VerifiedModule,
    names: &StringInterner,
    sink: &mut dyn BackendSink,
) -> Result<(), EmitError> {
    let cx = context(module, names);
    sink.begin_module(names.lookup(module.name()));
    emit_literals(module, sink);
    for (id, function) in module.iter() {
        lower::emit_function(&cx, id, function, sink)?;
    }
    sink.end_module();
    debug!(
        module = names.lookup(module.name()),
        functions = module.functions().len(),
        "emitted module"
    );
    Ok(())
}

/// [`emit`] into a fresh [`CollectingSink`].
pub fn emit_collected(
    module: &VerifiedModule,
    names: &StringInterner,
) -> Result<EmittedModule, EmitError> {
    let mut sink = CollectingSink::new();
    emit(module, names, &mut sink)?;
    Ok(sink.finish())
}

/// Lower every function of `module` in parallel.
///
/// The result is identical to [`emit_collected`].
pub fn emit_parallel(
    module: &VerifiedModule,
    names: &StringInterner,
) -> Result<EmittedModule, EmitError> {
    let cx = context(module, names);
    let functions: Vec<(FuncId, &Function)> = module.iter().collect();

    let lowered: Vec<EmittedFunction> = functions
        .par_iter()
        .map(|&(id, function)| {
            let mut sink = CollectingSink::new();
            lower::emit_function(&cx, id, function, &mut sink)?;
            Ok(sink.finish().functions)
        })
        .collect::<Result<Vec<_>, EmitError>>()?
        .into_iter()
        .flatten()
        .collect();

    let mut sink = CollectingSink::new();
    sink.begin_module(names.lookup(module.name()));
    emit_literals(module, &mut sink);
    let mut out = sink.finish();
    out.functions = lowered;
    debug!(
        module = %out.name,
        functions = out.functions.len(),
        "emitted module in parallel"
    );
    Ok(out)
}
