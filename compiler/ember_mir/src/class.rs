use std::fmt;

/// Width of a native integer value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I1,
    I8,
    I32,
    I64,
}

impl IntWidth {
    pub const fn bits(self) -> u32 {
        match self {
            IntWidth::I1 => 1,
            IntWidth::I8 => 8,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
        }
    }

    /// Whether `value` is representable at this width (signed, except `i1`).
    pub fn holds(self, value: i64) -> bool {
        match self {
            IntWidth::I1 => value == 0 || value == 1,
            IntWidth::I8 => i8::try_from(value).is_ok(),
            IntWidth::I32 => i32::try_from(value).is_ok(),
            IntWidth::I64 => true,
        }
    }
}

/// Kind of an SSA value.
///
/// `Term` values are tagged words the collector may scan. `Int` values are
/// untagged machine integers. `Native` values are opaque runtime handles
/// (binary builders, receive contexts, code pointers) never visible to the
/// collector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueClass {
    Term,
    Int(IntWidth),
    Native,
}

impl ValueClass {
    pub const BOOL: ValueClass = ValueClass::Int(IntWidth::I1);
    pub const I64: ValueClass = ValueClass::Int(IntWidth::I64);
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueClass::Term => f.write_str("term"),
            ValueClass::Int(w) => write!(f, "i{}", w.bits()),
            ValueClass::Native => f.write_str("native"),
        }
    }
}

/// Operand requirement in an [`OpSignature`](crate::OpSignature).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expect {
    Exactly(ValueClass),
    AnyInt,
}

impl Expect {
    pub const TERM: Expect = Expect::Exactly(ValueClass::Term);
    pub const BOOL: Expect = Expect::Exactly(ValueClass::BOOL);
    pub const I64: Expect = Expect::Exactly(ValueClass::I64);
    pub const NATIVE: Expect = Expect::Exactly(ValueClass::Native);

    pub fn admits(self, class: ValueClass) -> bool {
        match self {
            Expect::Exactly(expected) => expected == class,
            Expect::AnyInt => matches!(class, ValueClass::Int(_)),
        }
    }
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expect::Exactly(class) => class.fmt(f),
            Expect::AnyInt => f.write_str("int"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_bounds() {
        assert!(IntWidth::I1.holds(1));
        assert!(!IntWidth::I1.holds(2));
        assert!(IntWidth::I8.holds(-128));
        assert!(!IntWidth::I8.holds(128));
        assert!(IntWidth::I64.holds(i64::MIN));
    }

    #[test]
    fn expectations() {
        assert!(Expect::AnyInt.admits(ValueClass::Int(IntWidth::I8)));
        assert!(!Expect::AnyInt.admits(ValueClass::Term));
        assert!(Expect::TERM.admits(ValueClass::Term));
        assert!(!Expect::I64.admits(ValueClass::BOOL));
    }

    #[test]
    fn display() {
        assert_eq!(ValueClass::Term.to_string(), "term");
        assert_eq!(ValueClass::BOOL.to_string(), "i1");
        assert_eq!(ValueClass::Native.to_string(), "native");
        assert_eq!(Expect::AnyInt.to_string(), "int");
    }
}
