//! Reference runtime for verified Ember MIR.
//!
//! Interprets a [`VerifiedModule`] directly: SSA values live in per-frame
//! slots, processes own a mailbox and a call stack, and a round-robin
//! scheduler preempts them after a fixed number of reductions. It exists to
//! test the middle-end end to end; native code goes through `ember_emit`.
//!
//! Semantics follow the contracts the emitter's runtime calls promise:
//!
//! - exceptions are `{Class, Reason}` tuples and unwind through each
//!   instruction's handler, then through the callers' pending calls
//! - a receive scans the mailbox with a cursor; `receive_done` removes the
//!   message under it and leaves the others in order
//! - sending to an exited pid drops the message
//! - timeouts run on a virtual clock that only advances when every live
//!   process is waiting
//!
//! [`VerifiedModule`]: ember_verify::VerifiedModule

mod atoms;
mod bifs;
mod config;
mod error;
mod exec;
mod process;
mod runtime;
mod value;

pub use config::RuntimeConfig;
pub use error::EvalError;
pub use process::Exit;
pub use runtime::Runtime;

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap to panic on unexpected state")]
mod tests;
