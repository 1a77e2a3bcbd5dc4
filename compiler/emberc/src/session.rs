use std::io;

use ember_diagnostic::emitter::{tally, DiagnosticEmitter};
use ember_diagnostic::Diagnostic;
use ember_ir::ast::ModuleDef;
use ember_ir::{Name, SharedInterner};

use crate::{parallel, pipeline, CompileConfig, CompileError, Compiled};

/// One build: a shared atom table and the configuration every module is
/// compiled with.
///
/// The AST handed to [`Session::compile`] must have been interned through
/// [`Session::interner`], so atoms compare equal across modules.
#[derive(Clone, Default)]
pub struct Session {
    interner: SharedInterner,
    config: CompileConfig,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CompileConfig) -> Self {
        Session {
            interner: SharedInterner::new(),
            config,
        }
    }

    /// Continue with an atom table that is already populated.
    pub fn with_interner(interner: SharedInterner, config: CompileConfig) -> Self {
        Session { interner, config }
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn intern(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    pub fn compile(&self, def: &ModuleDef) -> Result<Compiled, CompileError> {
        pipeline::compile_module(&self.interner, &self.config, def)
    }

    /// Compile a batch of modules. Results come back in input order.
    pub fn compile_all(&self, defs: &[ModuleDef]) -> Vec<Result<Compiled, CompileError>> {
        parallel::compile_all(self, defs)
    }

    /// Write `diagnostics` and a closing summary line.
    pub fn report(
        &self,
        diagnostics: &[Diagnostic],
        emitter: &mut dyn DiagnosticEmitter,
    ) -> io::Result<()> {
        let (errors, warnings) = tally(diagnostics);
        emitter.emit_all(diagnostics)?;
        emitter.emit_summary(errors, warnings)?;
        emitter.flush()
    }
}
