use ember_diagnostic::{Diagnostic, ErrorCode};
use ember_ir::{Name, Span, StringLookup};
use ember_match::MatchError;

/// A problem in the source program found while lowering one function.
///
/// The function is dropped; lowering continues with its siblings and the
/// module fails once every function has been tried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("clause {clause} has {found} patterns, expected {expected}")]
    MismatchedArity {
        clause: usize,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("variable is unbound")]
    UnboundVariable { name: Name, span: Span },
    #[error("{what} is not allowed in a guard")]
    IllegalGuard { what: &'static str, span: Span },
    #[error("binary segment size is unbound")]
    UnboundSize { name: Name, span: Span },
    #[error("call to an undefined function")]
    UnknownFunction { name: Name, arity: u32, span: Span },
    #[error("function is defined more than once")]
    DuplicateFunction { name: Name, arity: u32, span: Span },
    #[error("unsupported: {what}")]
    Unsupported { what: &'static str, span: Span },
    #[error("internal lowering error: {message}")]
    Internal { message: String, span: Span },
}

impl SourceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SourceError::MismatchedArity { .. } => ErrorCode::E1001,
            SourceError::UnboundVariable { .. } => ErrorCode::E1002,
            SourceError::IllegalGuard { .. } => ErrorCode::E1003,
            SourceError::UnboundSize { .. } => ErrorCode::E1004,
            SourceError::UnknownFunction { .. } => ErrorCode::E1005,
            SourceError::Unsupported { .. } => ErrorCode::E1006,
            SourceError::DuplicateFunction { .. } => ErrorCode::E1007,
            SourceError::Internal { .. } => ErrorCode::E9001,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            SourceError::MismatchedArity { span, .. }
            | SourceError::UnboundVariable { span, .. }
            | SourceError::IllegalGuard { span, .. }
            | SourceError::UnboundSize { span, .. }
            | SourceError::UnknownFunction { span, .. }
            | SourceError::DuplicateFunction { span, .. }
            | SourceError::Unsupported { span, .. }
            | SourceError::Internal { span, .. } => *span,
        }
    }

    /// Message with variable and function names spelled out.
    pub fn message(&self, names: &dyn StringLookup) -> String {
        match self {
            SourceError::UnboundVariable { name, .. } => {
                format!("variable '{}' is unbound", names.lookup(*name))
            }
            SourceError::UnboundSize { name, .. } => {
                format!("binary segment size '{}' is unbound", names.lookup(*name))
            }
            SourceError::UnknownFunction { name, arity, .. } => {
                format!("function {}/{arity} undefined", names.lookup(*name))
            }
            SourceError::DuplicateFunction { name, arity, .. } => {
                format!("function {}/{arity} already defined", names.lookup(*name))
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        SourceError::Internal {
            message: message.into(),
            span: Span::DUMMY,
        }
    }
}

impl From<MatchError> for SourceError {
    fn from(error: MatchError) -> Self {
        match error {
            MatchError::ArityMismatch {
                clause,
                expected,
                found,
                span,
            } => SourceError::MismatchedArity {
                clause,
                expected,
                found,
                span,
            },
            MatchError::UnboundSize { name, span } => SourceError::UnboundSize { name, span },
            MatchError::Unsupported { what, span } => SourceError::Unsupported { what, span },
            MatchError::MissingOuter { name } => SourceError::UnboundVariable {
                name,
                span: Span::DUMMY,
            },
            MatchError::Internal(message) => SourceError::internal(message),
        }
    }
}

/// A [`SourceError`] together with the function it was found in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionError {
    /// `name/arity`
    pub function: String,
    pub error: SourceError,
}

impl FunctionError {
    pub fn to_diagnostic(&self, names: &dyn StringLookup) -> Diagnostic {
        Diagnostic::error(self.error.code())
            .with_function(self.function.clone())
            .with_span(self.error.span())
            .with_message(self.error.message(names))
    }
}
