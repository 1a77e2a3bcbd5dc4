//! Atom identity.

use std::fmt;

/// Index of an atom in the session's [`StringInterner`](crate::StringInterner).
///
/// The low four bits select the table bucket the text hashed into and the
/// remaining 28 bits are its slot inside that bucket. Slot 0 of bucket 0 is
/// the empty string. Atom terms carry `raw()` in their payload, so two atoms
/// are the same atom exactly when their names are equal.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    pub const EMPTY: Name = Name(0);

    pub const BUCKETS: usize = 16;

    pub const MAX_SLOT: u32 = u32::MAX >> Self::BUCKET_BITS;

    const BUCKET_BITS: u32 = 4;

    #[inline]
    pub const fn pack(bucket: u32, slot: u32) -> Self {
        debug_assert!((bucket as usize) < Self::BUCKETS);
        debug_assert!(slot <= Self::MAX_SLOT);
        Name((slot << Self::BUCKET_BITS) | bucket)
    }

    #[inline]
    pub const fn bucket(self) -> usize {
        (self.0 & (Self::BUCKETS as u32 - 1)) as usize
    }

    #[inline]
    pub const fn slot(self) -> usize {
        (self.0 >> Self::BUCKET_BITS) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Rebuild a name from an atom payload. The result only resolves
    /// against the table that produced `raw`.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}.{}", self.bucket(), self.slot())
    }
}
