//! MIR verification.
//!
//! [`verify`] is the gate between lowering and code generation. It checks
//! every function of a module and, if all of them hold up, seals the module
//! into a [`VerifiedModule`], the only form the emitter and the reference
//! runtime accept.
//!
//! Per function, in order:
//!
//! 1. **Structure**: every block terminated, successors exist, entry has no
//!    predecessors, all blocks reachable
//! 2. **Classes**: operands and results match [`Op::signature`], jump
//!    arguments match block parameters
//! 3. **SSA**: single assignment, every use dominated by its definition
//! 4. **Exceptions**: handler block shape, try-region balance, raising
//!    operations inside a region name a handler
//! 5. **Resources**: no binary builder open across a suspension or at return
//!
//! A failure is a compiler bug and rejects the whole module. Inexhaustive
//! and unreachable clauses are reported as warnings on the sealed module.
//!
//! [`Op::signature`]: ember_mir::Op::signature

mod check;
mod classes;
mod error;
mod regions;
mod resources;
mod sealed;
mod ssa;
mod structure;
mod warnings;

pub use error::{Location, VerificationError};
pub use sealed::VerifiedModule;

use ember_ir::StringLookup;
use ember_mir::{Function, Module};
use tracing::{debug, trace};

use crate::check::Checker;

/// Verify every function of `module`.
///
/// Errors from all functions are returned together.
pub fn verify(module: Module, names: &dyn StringLookup) -> Result<VerifiedModule, Vec<VerificationError>> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for function in &module.functions {
        let label = format!("{}/{}", names.lookup(function.name), function.arity);
        match verify_function(function, &label) {
            Ok(()) => warnings.extend(warnings::collect(function, &label)),
            Err(found) => errors.extend(found),
        }
    }

    if !errors.is_empty() {
        debug!(
            module = names.lookup(module.name),
            errors = errors.len(),
            "module failed verification"
        );
        return Err(errors);
    }
    debug!(
        module = names.lookup(module.name),
        functions = module.functions.len(),
        warnings = warnings.len(),
        "module verified"
    );
    Ok(VerifiedModule::seal(module, warnings))
}

/// Verify one function. `label` names it in errors.
pub fn verify_function(function: &Function, label: &str) -> Result<(), Vec<VerificationError>> {
    let mut c = Checker::new(function, label);
    structure::check(&mut c);
    if c.clean() {
        let defs = ssa::definitions(&mut c);
        classes::check(&mut c);
        if c.clean() {
            ssa::check_uses(&mut c, &defs);
            regions::check(&mut c);
            resources::check(&mut c);
        }
    }
    trace!(
        function = label,
        blocks = function.blocks.len(),
        errors = c.errors.len(),
        "verified function"
    );
    if c.clean() {
        Ok(())
    } else {
        Err(c.errors)
    }
}
