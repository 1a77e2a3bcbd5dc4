//! Flattened patterns: the rows of the pattern matrix.
//!
//! Every source pattern reduces to a wildcard, a constructor with
//! sub-patterns, a map with a fixed key set, or a binary with a fixed shape.
//! Variables disappear into [`Binder`]s attached to the node they name.

use ember_ir::{Name, Span};
use ember_mir::BinaryShape;
use ember_term::{LiteralId, TermKind};

/// A mutually exclusive value shape.
///
/// Two different constructors never match the same term, so one `Switch`
/// can test all constructors of a column at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ctor {
    SmallInt(i64),
    /// Integer literal outside the small range.
    BigInt(LiteralId),
    Float(LiteralId),
    Atom(Name),
    Nil,
    Cons,
    Tuple(u32),
}

impl Ctor {
    /// Number of sub-patterns.
    pub fn arity(self) -> usize {
        match self {
            Ctor::Cons => 2,
            Ctor::Tuple(n) => n as usize,
            _ => 0,
        }
    }

    pub fn term_kind(self) -> TermKind {
        match self {
            Ctor::SmallInt(_) => TermKind::SmallInt,
            Ctor::BigInt(_) => TermKind::BigInt,
            Ctor::Float(_) => TermKind::Float,
            Ctor::Atom(_) => TermKind::Atom,
            Ctor::Nil => TermKind::Nil,
            Ctor::Cons => TermKind::Cons,
            Ctor::Tuple(_) => TermKind::Tuple,
        }
    }
}

/// Where an equality check gets its expected value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EqOperand {
    /// A variable bound before the match.
    Outer(Name),
    /// A variable bound earlier in the same clause.
    Local(Name),
}

/// What happens to the value at a pattern node when the clause is selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Binder {
    /// First occurrence of a variable: bind it.
    Named(Name),
    /// Repeated variable: the value must be exactly equal.
    Check(EqOperand),
}

/// Shape test of a binary pattern. Size operands name outer variables.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinaryTest {
    pub shape: BinaryShape,
    pub sizes: Vec<Name>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FlatKind {
    Wild,
    Ctor {
        ctor: Ctor,
        args: Vec<FlatPattern>,
    },
    /// Required keys, sorted, with the pattern for each value.
    Map {
        keys: Vec<LiteralId>,
        values: Vec<FlatPattern>,
    },
    /// One pattern per segment of `test.shape`.
    Binary {
        test: BinaryTest,
        segments: Vec<FlatPattern>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FlatPattern {
    pub binds: Vec<Binder>,
    pub kind: FlatKind,
}

impl FlatPattern {
    pub fn wild() -> Self {
        FlatPattern {
            binds: Vec::new(),
            kind: FlatKind::Wild,
        }
    }

    pub fn ctor(ctor: Ctor, args: Vec<FlatPattern>) -> Self {
        debug_assert_eq!(ctor.arity(), args.len(), "constructor arity mismatch");
        FlatPattern {
            binds: Vec::new(),
            kind: FlatKind::Ctor { ctor, args },
        }
    }

    pub fn is_wild(&self) -> bool {
        matches!(self.kind, FlatKind::Wild)
    }

    #[must_use]
    pub fn with_binder(mut self, binder: Binder) -> Self {
        self.binds.push(binder);
        self
    }
}

/// One clause after flattening.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatClause {
    pub patterns: Vec<FlatPattern>,
    pub has_guard: bool,
    /// Variables the clause binds, in order of first occurrence. These are
    /// the parameters of the clause's body block.
    pub vars: Vec<Name>,
    pub span: Span,
}

impl FlatClause {
    /// Whether selecting the clause needs more than a structural match.
    pub fn is_conditional(&self) -> bool {
        self.has_guard || self.patterns.iter().any(has_check)
    }
}

fn has_check(pattern: &FlatPattern) -> bool {
    pattern.binds.iter().any(|b| matches!(b, Binder::Check(_)))
        || match &pattern.kind {
            FlatKind::Wild => false,
            FlatKind::Ctor { args, .. } => args.iter().any(has_check),
            FlatKind::Map { values, .. } => values.iter().any(has_check),
            FlatKind::Binary { segments, .. } => segments.iter().any(has_check),
        }
}
