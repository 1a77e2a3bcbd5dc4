use ember_diagnostic::DiagnosticConfig;

/// Knobs for one compilation session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileConfig {
    /// Error limit and warning promotion, applied per module.
    pub diagnostics: DiagnosticConfig,
    /// Compile the modules of a batch in parallel.
    pub parallel_modules: bool,
    /// Emit the functions of each module in parallel.
    pub parallel_functions: bool,
    /// Worker threads for the module pool (0 = one per core).
    pub threads: usize,
    /// Stack size of each pool worker, in bytes.
    pub stack_size: usize,
    /// Log the verified MIR of every module at debug level.
    pub dump_mir: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        CompileConfig {
            diagnostics: DiagnosticConfig::default(),
            parallel_modules: true,
            parallel_functions: false,
            threads: 0,
            // Lowering and pattern compilation recurse on the AST.
            stack_size: 16 * 1024 * 1024,
            dump_mir: false,
        }
    }
}

impl CompileConfig {
    /// Everything on one thread, no error limit.
    pub fn sequential() -> Self {
        CompileConfig {
            diagnostics: DiagnosticConfig::unlimited(),
            parallel_modules: false,
            parallel_functions: false,
            ..Self::default()
        }
    }
}
