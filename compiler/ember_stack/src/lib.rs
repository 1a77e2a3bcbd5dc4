//! Stack safety for the recursive passes of the compiler.
//!
//! Pattern compilation, expression lowering and free-variable analysis all
//! recurse over source trees whose depth is controlled by user code. Wrap
//! those recursive calls in [`ensure_sufficient_stack`] so a deeply nested
//! list literal or a long chain of `case` expressions grows the stack instead
//! of overflowing it.
//!
//! On `wasm32` the helper is a passthrough.

/// Headroom one level of lowering or matrix specialization may use.
const HEADROOM: usize = 128 * 1024;

/// Size of each new stack segment.
const SEGMENT: usize = 2 * 1024 * 1024;

/// Call `f` on a fresh stack segment when fewer than [`HEADROOM`] bytes remain.
#[cfg(not(target_arch = "wasm32"))]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(HEADROOM, SEGMENT, f)
}

#[cfg(target_arch = "wasm32")]
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    let _ = (HEADROOM, SEGMENT);
    f()
}
