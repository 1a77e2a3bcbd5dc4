use ember_diagnostic::ErrorCode;
use ember_ir::Span;
use ember_mir::Function;

use crate::error::{Location, VerificationError};

/// Error sink for one function.
pub(crate) struct Checker<'f> {
    pub func: &'f Function,
    label: &'f str,
    pub errors: Vec<VerificationError>,
}

impl<'f> Checker<'f> {
    pub fn new(func: &'f Function, label: &'f str) -> Self {
        Checker {
            func,
            label,
            errors: Vec::new(),
        }
    }

    pub fn fail(&mut self, code: ErrorCode, location: Location, message: impl Into<String>) {
        let span = match location {
            Location::Instr { block, index } => self
                .func
                .block(block)
                .and_then(|b| b.instrs.get(index))
                .map_or(Span::DUMMY, |instr| instr.span),
            _ => Span::DUMMY,
        };
        self.errors.push(VerificationError {
            function: self.label.to_owned(),
            location,
            code,
            message: message.into(),
            span,
        });
    }

    pub fn clean(&self) -> bool {
        self.errors.is_empty()
    }
}
