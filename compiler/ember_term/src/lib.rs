//! Term model: how dynamically-typed values look to generated code.
//!
//! A [`Term`] is one 64-bit word. The low three bits are the primary tag:
//!
//! | bits  | meaning                                   |
//! |-------|-------------------------------------------|
//! | `000` | pointer to a boxed object (never null)    |
//! | `001` | pointer to a cons cell                    |
//! | `010` | small integer, 61-bit signed payload      |
//! | `011` | atom, payload is the interned [`Name`]    |
//! | `100` | other immediates: `NIL`, `NONE`           |
//!
//! Every type test that only needs the primary tag is a mask and compare.
//! Boxed objects start with a [`Header`] word whose low byte is the
//! [`BoxedKind`]; discriminating tuple from map from binary costs exactly one
//! load.
//!
//! Integers outside `MIN_SMALL..=MAX_SMALL` are boxed as arbitrary-precision
//! [`BigInt`]s, one header plus as many 64-bit limbs as the value needs.
//! Compiled arithmetic checks [`SmallArith`] overflow and calls the runtime
//! for the boxed path.
//!
//! [`Heap`] is a reference implementation of the boxed layouts used by the
//! interpreter and by tests; the real collector belongs to the runtime.
//!
//! [`Name`]: ember_ir::Name

mod arith;
mod encoding;
mod header;
mod heap;
mod kind;
mod literal;

pub use arith::{fits_small, SmallArith};
pub use encoding::{
    is_boxed, tag_of, PrimitiveTag, Term, MAX_SMALL, MIN_SMALL, NIL_RAW, NONE_RAW,
    SMALL_INT_BITS, TAG_ATOM, TAG_BITS, TAG_BOXED, TAG_IMMEDIATE, TAG_LIST, TAG_MASK,
    TAG_SMALL_INT, WORD_BYTES,
};
pub use header::{BoxedKind, Header, HEADER_KIND_BITS};
pub use heap::{
    BinaryView, ClosureView, ExpectedShape, Heap, MapView, Number, TypeMismatch, View,
};
pub use kind::TermKind;
pub use literal::{LiteralId, LiteralPool, LiteralValue};
pub use num_bigint::BigInt;
