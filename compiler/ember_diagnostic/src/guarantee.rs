/// Proof that at least one error diagnostic was recorded.
///
/// Only [`DiagnosticQueue::emit_error`](crate::DiagnosticQueue::emit_error)
/// constructs it, so a function returning `Err(ErrorGuaranteed)` cannot fail
/// silently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) fn new() -> Self {
        ErrorGuaranteed(())
    }
}
