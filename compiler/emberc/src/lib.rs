//! The Ember compiler driver.
//!
//! A [`Session`] owns the atom table every module of a build shares and the
//! [`CompileConfig`] that drives the pipeline. Each module runs through
//!
//! 1. `ember_lower`: AST to MIR, source errors per function
//! 2. `ember_verify`: structural checks, sealing, pattern-match warnings
//! 3. `ember_emit`: machine instructions for the native backend
//!
//! and comes back as a [`Compiled`] module or a [`CompileError`] carrying
//! every diagnostic that stopped it. [`Session::compile_all`] compiles a
//! batch of modules on a scoped rayon pool; modules share nothing but the
//! interner.
//!
//! Set `RUST_LOG=emberc=debug` (or `ember_lower=trace`, ...) after calling
//! [`init_tracing`] to watch the passes.

mod config;
mod error;
mod parallel;
mod pipeline;
mod session;
mod tracing_setup;

pub use config::CompileConfig;
pub use error::CompileError;
pub use pipeline::Compiled;
pub use session::Session;
pub use tracing_setup::init_tracing;
