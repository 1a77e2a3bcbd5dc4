//! Fixed-width fast-path arithmetic on small integers.

use crate::encoding::{MAX_SMALL, MIN_SMALL};

/// Operations with an overflow-checked small-integer fast path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SmallArith {
    Add,
    Sub,
    Mul,
}

impl SmallArith {
    /// Result if it stays inside the small range; `None` means the caller
    /// must take the boxed slow path.
    #[inline]
    pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        let wide = match self {
            SmallArith::Add => lhs.checked_add(rhs),
            SmallArith::Sub => lhs.checked_sub(rhs),
            SmallArith::Mul => lhs.checked_mul(rhs),
        }?;
        fits_small(i128::from(wide)).then_some(wide)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            SmallArith::Add => "add",
            SmallArith::Sub => "sub",
            SmallArith::Mul => "mul",
        }
    }
}

#[inline]
pub fn fits_small(value: i128) -> bool {
    (i128::from(MIN_SMALL)..=i128::from(MAX_SMALL)).contains(&value)
}
