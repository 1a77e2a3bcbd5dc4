//! Shared foundation types for the Ember compiler.
//!
//! - [`Name`] and [`StringInterner`]: compact interned identifiers. The
//!   interner doubles as the session's atom table; every atom literal,
//!   function name and module name is a [`Name`].
//! - [`Span`]: byte-offset source locations carried through lowering into
//!   diagnostics.
//! - [`ast`]: the input tree handed over by the external parser.
//!
//! The interner is owned by the compilation session and passed by reference
//! to every phase. There is no global table, so tests and parallel module
//! compilations stay isolated from one another.

pub mod ast;
mod interner;
mod name;
mod span;

pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use name::Name;
pub use span::Span;
