//! Per-module diagnostic collection.
//!
//! - Error limit to keep output bounded
//! - Optional warnings-as-errors promotion
//! - Stable ordering: by function, then span, then insertion

use crate::{Diagnostic, ErrorGuaranteed};

/// How a module's queue treats what it is given.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors kept (0 = unlimited).
    pub error_limit: usize,
    /// Report warnings as errors.
    pub warnings_as_errors: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 50,
            warnings_as_errors: false,
        }
    }
}

impl DiagnosticConfig {
    /// No limits (for testing).
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            warnings_as_errors: false,
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    /// Errors dropped because the limit was reached.
    suppressed: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            config,
            ..Self::default()
        }
    }

    /// Record a diagnostic of any severity.
    pub fn add(&mut self, diagnostic: Diagnostic) {
        let diagnostic = if self.config.warnings_as_errors {
            diagnostic.promoted()
        } else {
            diagnostic
        };
        if diagnostic.is_error() {
            if self.limit_reached() {
                self.suppressed += 1;
                return;
            }
            self.error_count += 1;
        } else if diagnostic.is_warning() {
            self.warning_count += 1;
        }
        self.diagnostics.push(diagnostic);
    }

    /// Record an error and return proof that it was recorded.
    pub fn emit_error(&mut self, diagnostic: Diagnostic) -> ErrorGuaranteed {
        debug_assert!(diagnostic.is_error(), "emit_error called with a non-error");
        self.add(diagnostic);
        ErrorGuaranteed::new()
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.add(diagnostic);
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Proof of an error, if one has been recorded.
    pub fn error_guaranteed(&self) -> Option<ErrorGuaranteed> {
        self.has_errors().then(ErrorGuaranteed::new)
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Drain the queue in stable order.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        let mut out = std::mem::take(&mut self.diagnostics);
        out.sort_by(|a, b| {
            a.function
                .cmp(&b.function)
                .then_with(|| a.span.map(|s| s.start).cmp(&b.span.map(|s| s.start)))
        });
        self.error_count = 0;
        self.warning_count = 0;
        self.suppressed = 0;
        out
    }
}

#[cfg(test)]
mod tests;
