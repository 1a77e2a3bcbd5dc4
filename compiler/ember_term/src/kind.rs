//! Full type classification of a term.

/// What a term is, after at most one header dereference.
///
/// `code()` is the dense discriminant compiled code switches on; it is part
/// of the runtime ABI.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermKind {
    SmallInt,
    BigInt,
    Float,
    Atom,
    Nil,
    Cons,
    Tuple,
    Map,
    Binary,
    Closure,
    Pid,
    None,
}

impl TermKind {
    pub const ALL: [TermKind; 12] = [
        TermKind::SmallInt,
        TermKind::BigInt,
        TermKind::Float,
        TermKind::Atom,
        TermKind::Nil,
        TermKind::Cons,
        TermKind::Tuple,
        TermKind::Map,
        TermKind::Binary,
        TermKind::Closure,
        TermKind::Pid,
        TermKind::None,
    ];

    pub const fn code(self) -> u8 {
        match self {
            TermKind::SmallInt => 0,
            TermKind::BigInt => 1,
            TermKind::Float => 2,
            TermKind::Atom => 3,
            TermKind::Nil => 4,
            TermKind::Cons => 5,
            TermKind::Tuple => 6,
            TermKind::Map => 7,
            TermKind::Binary => 8,
            TermKind::Closure => 9,
            TermKind::Pid => 10,
            TermKind::None => 11,
        }
    }

    pub fn from_code(code: u8) -> Option<TermKind> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub const fn is_number(self) -> bool {
        matches!(self, TermKind::SmallInt | TermKind::BigInt | TermKind::Float)
    }

    pub const fn is_integer(self) -> bool {
        matches!(self, TermKind::SmallInt | TermKind::BigInt)
    }

    pub const fn is_list(self) -> bool {
        matches!(self, TermKind::Nil | TermKind::Cons)
    }

    /// Rank in the standard term order:
    /// number < atom < fun < pid < tuple < map < nil < list < binary.
    pub const fn order_rank(self) -> u8 {
        match self {
            TermKind::SmallInt | TermKind::BigInt | TermKind::Float => 0,
            TermKind::Atom => 1,
            TermKind::Closure => 2,
            TermKind::Pid => 3,
            TermKind::Tuple => 4,
            TermKind::Map => 5,
            TermKind::Nil => 6,
            TermKind::Cons => 7,
            TermKind::Binary => 8,
            TermKind::None => 9,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TermKind::SmallInt => "small_int",
            TermKind::BigInt => "big_int",
            TermKind::Float => "float",
            TermKind::Atom => "atom",
            TermKind::Nil => "nil",
            TermKind::Cons => "cons",
            TermKind::Tuple => "tuple",
            TermKind::Map => "map",
            TermKind::Binary => "binary",
            TermKind::Closure => "closure",
            TermKind::Pid => "pid",
            TermKind::None => "none",
        }
    }
}
