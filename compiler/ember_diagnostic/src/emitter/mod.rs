//! Plain-text rendering of diagnostics.

use std::io::{self, Write};

use crate::{Diagnostic, Severity};

/// Trait for emitting diagnostics in some output format.
pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: &Diagnostic) -> io::Result<()>;

    fn emit_all(&mut self, diagnostics: &[Diagnostic]) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.emit(diagnostic)?;
        }
        Ok(())
    }

    fn emit_summary(&mut self, error_count: usize, warning_count: usize) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

#[inline]
fn plural_s(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// One diagnostic per paragraph, uncolored.
pub struct TextEmitter<W: Write> {
    writer: W,
}

impl<W: Write> TextEmitter<W> {
    pub fn new(writer: W) -> Self {
        TextEmitter { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl TextEmitter<io::Stderr> {
    pub fn stderr() -> Self {
        TextEmitter::new(io::stderr())
    }
}

impl<W: Write> DiagnosticEmitter for TextEmitter<W> {
    fn emit(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        writeln!(self.writer, "{diagnostic}")
    }

    fn emit_summary(&mut self, error_count: usize, warning_count: usize) -> io::Result<()> {
        match (error_count, warning_count) {
            (0, 0) => Ok(()),
            (0, w) => writeln!(self.writer, "{w} warning{} emitted", plural_s(w)),
            (e, 0) => writeln!(self.writer, "{e} error{} emitted", plural_s(e)),
            (e, w) => writeln!(
                self.writer,
                "{e} error{} and {w} warning{} emitted",
                plural_s(e),
                plural_s(w)
            ),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Count diagnostics by severity: `(errors, warnings)`.
pub fn tally(diagnostics: &[Diagnostic]) -> (usize, usize) {
    diagnostics.iter().fold((0, 0), |(e, w), d| match d.severity {
        Severity::Error => (e + 1, w),
        Severity::Warning => (e, w + 1),
        Severity::Note => (e, w),
    })
}
