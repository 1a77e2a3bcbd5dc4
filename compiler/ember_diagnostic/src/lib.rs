//! Structured diagnostics.
//!
//! Every phase reports through [`Diagnostic`]: a severity, an [`ErrorCode`],
//! the function it concerns, an optional source span, a message and notes.
//! Warnings never stop compilation; errors abort the function (source
//! errors) or the whole module (verification errors).
//!
//! [`DiagnosticQueue`] collects a module's diagnostics, applies the error
//! limit, and hands back a stable ordering. [`ErrorGuaranteed`] is proof that
//! an error was actually recorded.

mod diagnostic;
pub mod emitter;
mod error_code;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
