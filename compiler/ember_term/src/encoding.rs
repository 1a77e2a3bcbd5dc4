//! Word layout of immediate terms and pointer tags.

use ember_ir::Name;
use std::fmt;

/// Number of primary tag bits.
pub const TAG_BITS: u32 = 3;
pub const TAG_MASK: u64 = 0b111;

pub const TAG_BOXED: u64 = 0b000;
pub const TAG_LIST: u64 = 0b001;
pub const TAG_SMALL_INT: u64 = 0b010;
pub const TAG_ATOM: u64 = 0b011;
pub const TAG_IMMEDIATE: u64 = 0b100;

/// `[]`
pub const NIL_RAW: u64 = 0b0_100;
/// Compiler-internal "no value" sentinel; never visible to user code.
pub const NONE_RAW: u64 = 0b1_100;

/// Bytes per heap word; boxed and cons pointers are aligned to this.
pub const WORD_BYTES: u64 = 8;

/// Payload width of a small integer.
pub const SMALL_INT_BITS: u32 = 64 - TAG_BITS;
pub const MIN_SMALL: i64 = -(1 << (SMALL_INT_BITS - 1));
pub const MAX_SMALL: i64 = (1 << (SMALL_INT_BITS - 1)) - 1;

/// Primary tag of a term, decidable from the word alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTag {
    Boxed,
    List,
    SmallInt,
    Atom,
    Nil,
    None,
    /// A word no well-formed term has (reserved tag or unknown immediate).
    Invalid,
}

/// A tagged machine word.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Term(u64);

impl Term {
    pub const NIL: Term = Term(NIL_RAW);
    pub const NONE: Term = Term(NONE_RAW);

    #[inline]
    pub const fn from_raw(raw: u64) -> Term {
        Term(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Encode a small integer, or `None` if it needs boxing.
    #[inline]
    #[allow(clippy::cast_sign_loss, reason = "two's complement payload")]
    pub const fn small_int(value: i64) -> Option<Term> {
        if value < MIN_SMALL || value > MAX_SMALL {
            return None;
        }
        Some(Term(((value << TAG_BITS) as u64) | TAG_SMALL_INT))
    }

    #[inline]
    #[allow(clippy::cast_possible_wrap, reason = "two's complement payload")]
    pub const fn as_small_int(self) -> Option<i64> {
        if self.0 & TAG_MASK == TAG_SMALL_INT {
            Some((self.0 as i64) >> TAG_BITS)
        } else {
            None
        }
    }

    #[inline]
    pub const fn atom(name: Name) -> Term {
        Term(((name.raw() as u64) << TAG_BITS) | TAG_ATOM)
    }

    #[inline]
    pub fn as_atom(self) -> Option<Name> {
        if self.0 & TAG_MASK == TAG_ATOM {
            u32::try_from(self.0 >> TAG_BITS).ok().map(Name::from_raw)
        } else {
            None
        }
    }

    /// Pointer term for a boxed object at byte address `addr`.
    #[inline]
    pub const fn from_boxed_addr(addr: u64) -> Term {
        debug_assert!(addr != 0 && addr % WORD_BYTES == 0);
        Term(addr | TAG_BOXED)
    }

    /// Pointer term for a cons cell at byte address `addr`.
    #[inline]
    pub const fn from_list_addr(addr: u64) -> Term {
        debug_assert!(addr != 0 && addr % WORD_BYTES == 0);
        Term(addr | TAG_LIST)
    }

    #[inline]
    pub const fn boxed_addr(self) -> Option<u64> {
        if is_boxed(self) {
            Some(self.0)
        } else {
            None
        }
    }

    #[inline]
    pub const fn list_addr(self) -> Option<u64> {
        if self.0 & TAG_MASK == TAG_LIST {
            Some(self.0 & !TAG_MASK)
        } else {
            None
        }
    }

    #[inline]
    pub const fn is_nil(self) -> bool {
        self.0 == NIL_RAW
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == NONE_RAW
    }
}

/// Primary tag test; never dereferences.
#[inline]
pub const fn tag_of(term: Term) -> PrimitiveTag {
    match term.0 & TAG_MASK {
        TAG_BOXED if term.0 != 0 => PrimitiveTag::Boxed,
        TAG_LIST => PrimitiveTag::List,
        TAG_SMALL_INT => PrimitiveTag::SmallInt,
        TAG_ATOM => PrimitiveTag::Atom,
        TAG_IMMEDIATE if term.0 == NIL_RAW => PrimitiveTag::Nil,
        TAG_IMMEDIATE if term.0 == NONE_RAW => PrimitiveTag::None,
        _ => PrimitiveTag::Invalid,
    }
}

#[inline]
pub const fn is_boxed(term: Term) -> bool {
    term.0 != 0 && term.0 & TAG_MASK == TAG_BOXED
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match tag_of(*self) {
            PrimitiveTag::SmallInt => write!(f, "Term({})", self.as_small_int().unwrap_or(0)),
            PrimitiveTag::Atom => write!(f, "Term(atom#{})", self.0 >> TAG_BITS),
            PrimitiveTag::Nil => f.write_str("Term([])"),
            PrimitiveTag::None => f.write_str("Term(NONE)"),
            PrimitiveTag::Boxed => write!(f, "Term(box@{:#x})", self.0),
            PrimitiveTag::List => write!(f, "Term(cons@{:#x})", self.0 & !TAG_MASK),
            PrimitiveTag::Invalid => write!(f, "Term(invalid {:#x})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_range_bounds() {
        assert_eq!(Term::small_int(MAX_SMALL).and_then(Term::as_small_int), Some(MAX_SMALL));
        assert_eq!(Term::small_int(MIN_SMALL).and_then(Term::as_small_int), Some(MIN_SMALL));
        assert_eq!(Term::small_int(MAX_SMALL + 1), None);
        assert_eq!(Term::small_int(MIN_SMALL - 1), None);
    }

    #[test]
    fn immediates_have_distinct_tags() {
        assert_eq!(tag_of(Term::NIL), PrimitiveTag::Nil);
        assert_eq!(tag_of(Term::NONE), PrimitiveTag::None);
        assert_eq!(tag_of(Term::atom(Name::from_raw(7))), PrimitiveTag::Atom);
        assert_eq!(tag_of(Term::from_boxed_addr(16)), PrimitiveTag::Boxed);
        assert_eq!(tag_of(Term::from_list_addr(16)), PrimitiveTag::List);
        assert_eq!(tag_of(Term::from_raw(0)), PrimitiveTag::Invalid);
        assert_eq!(tag_of(Term::from_raw(0b101)), PrimitiveTag::Invalid);
    }

    #[test]
    fn none_is_not_boxed() {
        assert!(!is_boxed(Term::NONE));
        assert!(!is_boxed(Term::from_raw(0)));
        assert!(is_boxed(Term::from_boxed_addr(8)));
    }

    #[test]
    fn atom_round_trip() {
        let name = Name::pack(9, 12345);
        assert_eq!(Term::atom(name).as_atom(), Some(name));
        assert_eq!(Term::NIL.as_atom(), None);
    }

    #[test]
    fn list_addr_strips_tag() {
        assert_eq!(Term::from_list_addr(64).list_addr(), Some(64));
        assert_eq!(Term::from_boxed_addr(64).list_addr(), None);
    }

    proptest! {
        #[test]
        fn small_int_round_trip(value in MIN_SMALL..=MAX_SMALL) {
            let term = Term::small_int(value);
            prop_assert!(term.is_some());
            let term = term.unwrap_or(Term::NONE);
            prop_assert_eq!(tag_of(term), PrimitiveTag::SmallInt);
            prop_assert_eq!(term.as_small_int(), Some(value));
        }
    }
}
