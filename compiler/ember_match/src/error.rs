use ember_ir::{Name, Span};

/// Failure to flatten or expand a match.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("clause {clause} has {found} patterns, expected {expected}")]
    ArityMismatch {
        clause: usize,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("binary segment size variable is not bound")]
    UnboundSize { name: Name, span: Span },
    #[error("unsupported pattern: {what}")]
    Unsupported { what: &'static str, span: Span },
    #[error("variable has no value at the match site")]
    MissingOuter { name: Name },
    #[error("internal match compiler error: {0}")]
    Internal(String),
}
