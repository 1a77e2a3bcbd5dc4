//! Input tree produced by the external parser.
//!
//! The node kinds are fixed: literals, variables, calls, clause bodies,
//! pattern syntax and the process/closure constructs. Lowering consumes the
//! tree by reference and never mutates it.
//!
//! Nodes are plain owned trees (`Box`/`Vec`). Convenience constructors with
//! [`Span::DUMMY`] exist for generated code and tests.

mod expr;
mod pattern;

pub use expr::{After, CatchClass, CatchClause, Expr, ExprKind, IfClause, TryExpr};
pub use pattern::{Pattern, PatternKind};

use crate::{Name, Span};
use num_bigint::BigInt;
use std::fmt;

/// A compilation unit: a named set of function definitions.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleDef {
    pub name: Name,
    pub functions: Vec<FunctionDef>,
    pub span: Span,
}

/// A named function of fixed arity defined by one or more clauses.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: Name,
    pub arity: u32,
    pub clauses: Vec<Clause>,
    pub span: Span,
}

/// One clause: a pattern per scrutinee, an optional guard, and a body.
///
/// The body is a non-empty sequence; its last expression is the clause value.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Expr>,
    pub body: Vec<Expr>,
    pub span: Span,
}

impl Clause {
    pub fn new(patterns: Vec<Pattern>, guard: Option<Expr>, body: Vec<Expr>) -> Self {
        Clause {
            patterns,
            guard,
            body,
            span: Span::DUMMY,
        }
    }
}

/// Literal values shared by expressions and patterns.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// Any size; the compiler picks the small or boxed encoding.
    Integer(BigInt),
    Float(f64),
    Atom(Name),
}

/// Exception classes carried by raised terms.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionClass {
    Throw,
    Error,
    Exit,
}

impl ExceptionClass {
    pub const ALL: [ExceptionClass; 3] = [
        ExceptionClass::Throw,
        ExceptionClass::Error,
        ExceptionClass::Exit,
    ];

    /// Spelling of the class atom.
    pub fn as_str(self) -> &'static str {
        match self {
            ExceptionClass::Throw => "throw",
            ExceptionClass::Error => "error",
            ExceptionClass::Exit => "exit",
        }
    }

    /// Dense code used by catch dispatch.
    pub fn code(self) -> u8 {
        match self {
            ExceptionClass::Throw => 0,
            ExceptionClass::Error => 1,
            ExceptionClass::Exit => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

impl fmt::Display for ExceptionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// `/`, always produces a float.
    FloatDiv,
    /// `div`
    IntDiv,
    /// `rem`
    Rem,
    Band,
    Bor,
    Bxor,
    Bsl,
    Bsr,
    /// `==`, arithmetic equality.
    Eq,
    /// `/=`
    Ne,
    /// `=:=`
    ExactEq,
    /// `=/=`
    ExactNe,
    Lt,
    /// `=<`
    Le,
    Gt,
    Ge,
    /// Strict `and`: both operands evaluated.
    And,
    /// Strict `or`: both operands evaluated.
    Or,
    Xor,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::FloatDiv => "/",
            BinaryOp::IntDiv => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Band => "band",
            BinaryOp::Bor => "bor",
            BinaryOp::Bxor => "bxor",
            BinaryOp::Bsl => "bsl",
            BinaryOp::Bsr => "bsr",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "/=",
            BinaryOp::ExactEq => "=:=",
            BinaryOp::ExactNe => "=/=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "=<",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::AndAlso => "andalso",
            BinaryOp::OrElse => "orelse",
        }
    }
}

/// Unary operators.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
    Bnot,
}

/// Type of a binary segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Integer,
    Float,
    Binary,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Type specifiers of a binary segment (`/integer-signed-little-unit:8`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SegmentSpec {
    pub ty: SegmentType,
    pub signed: bool,
    pub endian: Endianness,
    /// Bits per size unit.
    pub unit: u32,
}

impl SegmentSpec {
    pub const INTEGER: SegmentSpec = SegmentSpec {
        ty: SegmentType::Integer,
        signed: false,
        endian: Endianness::Big,
        unit: 1,
    };

    pub const FLOAT: SegmentSpec = SegmentSpec {
        ty: SegmentType::Float,
        signed: false,
        endian: Endianness::Big,
        unit: 1,
    };

    pub const BINARY: SegmentSpec = SegmentSpec {
        ty: SegmentType::Binary,
        signed: false,
        endian: Endianness::Big,
        unit: 8,
    };
}

/// Size of a binary segment, in units of [`SegmentSpec::unit`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SegmentSize {
    /// Type default: 8 for integers, 64 for floats, the whole remainder for
    /// binaries.
    Default,
    Literal(u32),
    /// Size held by a bound variable.
    Var(Name),
}

/// One `Value:Size/Spec` segment of a binary expression or pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct BinSegment<T> {
    pub value: T,
    pub size: SegmentSize,
    pub spec: SegmentSpec,
    pub span: Span,
}

impl<T> BinSegment<T> {
    pub fn new(value: T, size: SegmentSize, spec: SegmentSpec) -> Self {
        BinSegment {
            value,
            size,
            spec,
            span: Span::DUMMY,
        }
    }
}

#[cfg(test)]
mod tests;
