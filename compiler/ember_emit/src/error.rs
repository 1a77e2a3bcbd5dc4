use ember_mir::BlockId;

/// A verified function the emitter still cannot express.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("{function}: {block} is a map lookup target without a parameter")]
    MissingLookupParam { function: String, block: BlockId },

    #[error("{function}: {count} values do not fit the slot range")]
    TooManySlots { function: String, count: usize },
}
