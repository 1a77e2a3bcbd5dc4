//! Header words of boxed objects.

/// Low bits of a header word holding the kind.
pub const HEADER_KIND_BITS: u32 = 8;

/// Sub-kind of a boxed object, stored in its header.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BoxedKind {
    /// Arity: limb count; payload is the two's complement value in
    /// little-endian 64-bit limbs.
    BigInt = 1,
    /// Arity: 1, the IEEE-754 bits.
    Float = 2,
    /// Arity: element count.
    Tuple = 3,
    /// Arity: entry count; payload alternates key, value.
    Map = 4,
    /// Arity: bit length; payload is packed bytes.
    Binary = 5,
    /// Arity: captured environment length; payload is function index,
    /// arity, then the environment.
    Closure = 6,
    /// Arity: 1, the process number.
    Pid = 7,
}

impl BoxedKind {
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BoxedKind::BigInt),
            2 => Some(BoxedKind::Float),
            3 => Some(BoxedKind::Tuple),
            4 => Some(BoxedKind::Map),
            5 => Some(BoxedKind::Binary),
            6 => Some(BoxedKind::Closure),
            7 => Some(BoxedKind::Pid),
            _ => None,
        }
    }
}

/// First word of every boxed object: `(arity << 8) | kind`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Header(u64);

impl Header {
    #[inline]
    pub const fn new(kind: BoxedKind, arity: u64) -> Header {
        Header((arity << HEADER_KIND_BITS) | kind as u64)
    }

    #[inline]
    pub const fn from_raw(raw: u64) -> Header {
        Header(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation, reason = "masked to the kind byte")]
    pub const fn kind(self) -> Option<BoxedKind> {
        BoxedKind::from_code((self.0 & 0xFF) as u8)
    }

    #[inline]
    pub const fn arity(self) -> u64 {
        self.0 >> HEADER_KIND_BITS
    }
}
