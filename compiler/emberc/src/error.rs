use ember_diagnostic::{Diagnostic, ErrorGuaranteed};

/// A module that did not make it through the pipeline.
///
/// `diagnostics` holds everything reported before the failing phase gave
/// up, errors and warnings alike, in stable order.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("module {module} failed to compile with {} error(s)", self.error_count())]
pub struct CompileError {
    pub module: String,
    pub diagnostics: Vec<Diagnostic>,
    pub guarantee: ErrorGuaranteed,
}

impl CompileError {
    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}
