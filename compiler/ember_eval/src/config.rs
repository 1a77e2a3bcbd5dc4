/// Limits of a [`Runtime`](crate::Runtime).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Total reductions across all processes before [`Runtime::run`]
    /// gives up with [`EvalError::ReductionLimit`].
    ///
    /// [`Runtime::run`]: crate::Runtime::run
    /// [`EvalError::ReductionLimit`]: crate::EvalError::ReductionLimit
    pub max_reductions: u64,
    /// Reductions a process runs before it is preempted.
    pub reductions_per_slice: u32,
    /// Frames per process; a call past this raises `system_limit`.
    pub max_call_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_reductions: 10_000_000,
            reductions_per_slice: 2_000,
            max_call_depth: 10_000,
        }
    }
}
