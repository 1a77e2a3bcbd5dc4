use ember_diagnostic::{Diagnostic, DiagnosticQueue, ErrorCode};
use ember_emit::EmittedModule;
use ember_ir::ast::ModuleDef;
use ember_ir::StringInterner;
use ember_verify::VerifiedModule;
use tracing::{debug, debug_span};

use crate::{CompileConfig, CompileError};

/// A module that passed every phase.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub name: String,
    /// Sealed MIR, the input of the backend and of the reference runtime.
    pub verified: VerifiedModule,
    pub emitted: EmittedModule,
    /// Warnings that did not stop the module.
    pub diagnostics: Vec<Diagnostic>,
}

impl Compiled {
    pub fn warning_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }
}

fn failed(module: &str, mut queue: DiagnosticQueue) -> CompileError {
    let guarantee = match queue.error_guaranteed() {
        Some(guarantee) => guarantee,
        None => queue.emit_error(
            Diagnostic::error(ErrorCode::E9001).with_message("phase failed without reporting an error"),
        ),
    };
    CompileError {
        module: module.to_owned(),
        diagnostics: queue.flush(),
        guarantee,
    }
}

/// Lower, verify and emit one module.
pub(crate) fn compile_module(
    interner: &StringInterner,
    config: &CompileConfig,
    def: &ModuleDef,
) -> Result<Compiled, CompileError> {
    let name = interner.lookup(def.name);
    let _span = debug_span!("compile", module = name).entered();
    let mut queue = DiagnosticQueue::with_config(config.diagnostics.clone());

    let mir = match ember_lower::lower_module(def, interner) {
        Ok(mir) => mir,
        Err(errors) => {
            debug!(errors = errors.len(), "lowering failed");
            queue.extend(errors.iter().map(|e| e.to_diagnostic(interner)));
            return Err(failed(name, queue));
        }
    };

    let verified = match ember_verify::verify(mir, interner) {
        Ok(verified) => verified,
        Err(errors) => {
            debug!(errors = errors.len(), "verification failed");
            queue.extend(errors.iter().map(ember_verify::VerificationError::to_diagnostic));
            return Err(failed(name, queue));
        }
    };
    queue.extend(verified.warnings().iter().cloned());
    if queue.has_errors() {
        // Only promoted warnings get here.
        return Err(failed(name, queue));
    }
    if config.dump_mir {
        debug!(mir = %verified.module().display(interner), "verified");
    }

    let emitted = if config.parallel_functions {
        ember_emit::emit_parallel(&verified, interner)
    } else {
        ember_emit::emit_collected(&verified, interner)
    };
    let emitted = match emitted {
        Ok(emitted) => emitted,
        Err(error) => {
            queue.add(
                Diagnostic::error(ErrorCode::E9001)
                    .with_message(error.to_string())
                    .with_note("this is a compiler bug"),
            );
            return Err(failed(name, queue));
        }
    };

    debug!(
        functions = emitted.functions.len(),
        warnings = queue.warning_count(),
        "compiled"
    );
    Ok(Compiled {
        name: name.to_owned(),
        verified,
        emitted,
        diagnostics: queue.flush(),
    })
}
