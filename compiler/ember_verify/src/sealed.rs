use ember_diagnostic::Diagnostic;
use ember_ir::Name;
use ember_mir::{FuncId, Function, Module};
use ember_term::LiteralPool;

/// A module that passed verification.
///
/// The only way to obtain one is [`verify`](crate::verify), and it hands out
/// shared references only, so the functions it holds stay verified.
#[derive(Clone, Debug)]
pub struct VerifiedModule {
    module: Module,
    warnings: Vec<Diagnostic>,
}

impl VerifiedModule {
    pub(crate) fn seal(module: Module, warnings: Vec<Diagnostic>) -> Self {
        VerifiedModule { module, warnings }
    }

    pub fn name(&self) -> Name {
        self.module.name
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn functions(&self) -> &[Function] {
        &self.module.functions
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.module.function(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.module.iter()
    }

    /// Source function `name/arity`.
    pub fn find(&self, name: Name, arity: u32) -> Option<FuncId> {
        self.module.find(name, arity)
    }

    pub fn literals(&self) -> &LiteralPool {
        &self.module.literals
    }

    /// Pattern-match warnings found while verifying.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}
