// Test code uses unwrap/expect for clarity - panics provide good test failure messages
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Whole-pipeline tests.
//!
//! - `diagnostics/` - what a failing or suspicious module reports
//! - `runtime/` - compiled modules run on the reference runtime
//! - `matching/` - compiled clause selection against naive matching
//! - `batch/` - parallel compilation of several modules
//! - `common/` - AST construction helpers

#[path = "phases/common.rs"]
mod common;

#[path = "phases/diagnostics.rs"]
mod diagnostics;

#[path = "phases/runtime.rs"]
mod runtime;

#[path = "phases/matching.rs"]
mod matching;

#[path = "phases/batch.rs"]
mod batch;
