use std::fmt;

use ember_diagnostic::{Diagnostic, ErrorCode};
use ember_ir::Span;
use ember_mir::BlockId;

/// Where in a function a verification error was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Function,
    Block(BlockId),
    Instr { block: BlockId, index: usize },
    Terminator(BlockId),
}

impl Location {
    pub fn block(self) -> Option<BlockId> {
        match self {
            Location::Function => None,
            Location::Block(block) | Location::Terminator(block) | Location::Instr { block, .. } => {
                Some(block)
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Function => f.write_str("function"),
            Location::Block(block) => write!(f, "{block}"),
            Location::Instr { block, index } => write!(f, "{block}[{index}]"),
            Location::Terminator(block) => write!(f, "{block} terminator"),
        }
    }
}

/// MIR that breaks an invariant. Always a compiler bug: lowering produced
/// something the backend must not see.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{function}: {location}: {message}")]
pub struct VerificationError {
    /// `name/arity`
    pub function: String,
    pub location: Location,
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
}

impl VerificationError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code)
            .with_function(self.function.clone())
            .with_span(self.span)
            .with_message(self.message.clone())
            .with_note(format!("at {}", self.location))
            .with_note("this is a compiler bug")
    }
}
