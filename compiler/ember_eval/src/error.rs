use ember_mir::{BlockId, FuncId, RuntimeFn, ValueClass, ValueId};

/// A failure of the runtime itself, as opposed to an exception raised by
/// the program (those end the process with [`Exit::Raised`]).
///
/// [`Exit::Raised`]: crate::Exit::Raised
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("no function {name}/{arity} in the module")]
    UnknownFunction { name: String, arity: usize },

    #[error("{function} is not a function of the module")]
    MissingFunction { function: FuncId },

    #[error("{function}: block {block} does not exist")]
    MissingBlock { function: String, block: BlockId },

    #[error("ran out of reductions after {limit}")]
    ReductionLimit { limit: u64 },

    #[error("{function}: reached unreachable in {block}")]
    Unreachable { function: String, block: BlockId },

    #[error("{value} does not hold a {expected} value")]
    BadValue { value: ValueId, expected: ValueClass },

    #[error("{value} is not a {expected}")]
    WrongShape {
        value: ValueId,
        expected: &'static str,
    },

    #[error("{function}: no call pending in {block}")]
    NoPendingCall { function: String, block: BlockId },

    #[error("{} cannot be called from MIR", .0.symbol())]
    NotCallable(RuntimeFn),

    #[error("{op} without an open {resource}")]
    NoResource {
        op: &'static str,
        resource: &'static str,
    },
}
