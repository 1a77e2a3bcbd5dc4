use ember_ir::ast::ModuleDef;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{CompileError, Compiled, Session};

fn sequential(session: &Session, defs: &[ModuleDef]) -> Vec<Result<Compiled, CompileError>> {
    defs.iter().map(|def| session.compile(def)).collect()
}

/// Compile `defs` on a scoped pool that is torn down before returning.
///
/// Workers share the session's interner and nothing else. If the pool
/// cannot be built the batch runs on the calling thread.
pub(crate) fn compile_all(session: &Session, defs: &[ModuleDef]) -> Vec<Result<Compiled, CompileError>> {
    let config = session.config();
    if !config.parallel_modules || defs.len() < 2 {
        return sequential(session, defs);
    }

    debug!(modules = defs.len(), threads = config.threads, "compiling in parallel");
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .stack_size(config.stack_size)
        .build_scoped(rayon::ThreadBuilder::run, |pool| {
            pool.install(|| defs.par_iter().map(|def| session.compile(def)).collect::<Vec<_>>())
        })
        .unwrap_or_else(|e| {
            warn!("failed to create thread pool ({e}), compiling sequentially");
            sequential(session, defs)
        })
}
