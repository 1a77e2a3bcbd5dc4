//! Pattern-match compilation.
//!
//! Multi-clause matches (function heads, `case`, `receive`, `catch`, ...)
//! compile to decision trees following Maranget (2008), "Compiling Pattern
//! Matching to Good Decision Trees":
//!
//! 1. [`flatten`]: AST patterns become [`FlatPattern`]s. Repeated and
//!    already-bound variables turn into equality checks run with the guard.
//! 2. [`compile`]: the pattern matrix becomes a [`DecisionArena`] of
//!    [`DecisionNode`]s. Column choice is the leftmost column holding a
//!    non-wildcard pattern, which keeps first-match-wins and guard order.
//! 3. [`Reachability`]: which clauses some input reaches, and whether some
//!    input reaches no clause.
//! 4. [`emit`]: the tree expands into MIR blocks through a [`MatchSink`].
//!    Each clause body gets one block; leaves jump to it with the clause's
//!    variables as arguments.
//!
//! [`reference`] holds two executable semantics over heap terms, a naive
//! top-to-bottom matcher and a tree walker. They agree on every input.

mod compile;
mod emit;
mod error;
mod flatten;
mod pattern;
mod reach;
pub mod reference;
mod tree;

pub use compile::{compile, CompiledMatch};
pub use emit::{emit, ClauseEntry, MatchSink};
pub use error::MatchError;
pub use flatten::{flatten_clause, Scope};
pub use pattern::{Binder, BinaryTest, Ctor, EqOperand, FlatClause, FlatKind, FlatPattern};
pub use reach::Reachability;
pub use tree::{DecisionArena, DecisionNode, Edge, EqCheck, EqRef, NodeId, Path, Step, SwitchTest};
