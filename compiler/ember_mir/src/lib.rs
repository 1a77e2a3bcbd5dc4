//! Ember MIR: the low-level instruction set the middle-end lowers into.
//!
//! MIR is a block-structured SSA form:
//!
//! - **[`Function`]**: parameters, blocks, the class of every value, and
//!   match-site metadata for diagnostics
//! - **[`Block`]**: parameters, sequential [`Instr`]s, one [`Terminator`]
//! - **[`Op`]**: the closed catalog of operations; every variant carries its
//!   operands, results and attributes and exposes an [`OpSignature`]
//! - **[`RuntimeFn`]**: the runtime ABI, one stable `__ember_*` symbol per entry
//!
//! Merges use block parameters instead of phi nodes. Raising operations name
//! their exceptional successor in [`Instr::handler`]; `None` means the
//! exception leaves the function.
//!
//! [`FunctionBuilder`] constructs functions; [`graph`] holds the CFG
//! analyses shared by the match compiler, the verifier and the emitter.

mod binary;
mod builder;
mod class;
mod function;
pub mod graph;
mod ids;
mod module;
mod op;
mod print;
mod runtime;
mod terminator;

pub use binary::{encode_segment, BadSegment, BinaryShape, BitBuffer, SegmentLayout, ShapeSize};
pub use builder::FunctionBuilder;
pub use class::{Expect, IntWidth, ValueClass};
pub use function::{
    Block, Capture, ClauseSite, ClosureEnv, Function, FunctionOrigin, Instr, MatchKind,
    MatchSite,
};
pub use ids::{BlockId, FuncId, ValueId};
pub use module::Module;
pub use op::{BitwiseOp, IntPredicate, Op, OpEffects, OpSignature, SpawnTarget};
pub use print::{FunctionPrinter, ModulePrinter};
pub use runtime::RuntimeFn;
pub use terminator::{RaiseKind, Terminator};
