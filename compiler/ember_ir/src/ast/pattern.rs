use super::{BinSegment, Literal};
use crate::{Name, Span};
use num_bigint::BigInt;

/// A pattern node.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatternKind {
    /// `_`
    Wildcard,
    /// Binds a fresh variable, or tests equality against an already bound one.
    Var(Name),
    Literal(Literal),
    /// `[]`
    Nil,
    Tuple(Vec<Pattern>),
    Cons {
        head: Box<Pattern>,
        tail: Box<Pattern>,
    },
    /// `[P1, P2 | Tail]`; a missing tail means `[]`.
    List {
        elements: Vec<Pattern>,
        tail: Option<Box<Pattern>>,
    },
    /// `#{Key := Pattern}` with literal keys that must all be present.
    Map(Vec<(Literal, Pattern)>),
    /// `<<Segments>>`
    Bin(Vec<BinSegment<Pattern>>),
    /// `Name = Pattern`
    Alias {
        name: Name,
        pattern: Box<Pattern>,
    },
}

impl Pattern {
    pub fn new(kind: PatternKind, span: Span) -> Self {
        Pattern { kind, span }
    }

    fn dummy(kind: PatternKind) -> Self {
        Pattern {
            kind,
            span: Span::DUMMY,
        }
    }

    pub fn wildcard() -> Self {
        Self::dummy(PatternKind::Wildcard)
    }

    pub fn var(name: Name) -> Self {
        Self::dummy(PatternKind::Var(name))
    }

    pub fn int(value: i64) -> Self {
        Self::integer(BigInt::from(value))
    }

    pub fn integer(value: BigInt) -> Self {
        Self::dummy(PatternKind::Literal(Literal::Integer(value)))
    }

    pub fn float(value: f64) -> Self {
        Self::dummy(PatternKind::Literal(Literal::Float(value)))
    }

    pub fn atom(name: Name) -> Self {
        Self::dummy(PatternKind::Literal(Literal::Atom(name)))
    }

    pub fn nil() -> Self {
        Self::dummy(PatternKind::Nil)
    }

    pub fn tuple(elements: Vec<Pattern>) -> Self {
        Self::dummy(PatternKind::Tuple(elements))
    }

    pub fn cons(head: Pattern, tail: Pattern) -> Self {
        Self::dummy(PatternKind::Cons {
            head: Box::new(head),
            tail: Box::new(tail),
        })
    }

    pub fn list(elements: Vec<Pattern>) -> Self {
        Self::dummy(PatternKind::List {
            elements,
            tail: None,
        })
    }

    pub fn map(entries: Vec<(Literal, Pattern)>) -> Self {
        Self::dummy(PatternKind::Map(entries))
    }

    pub fn bin(segments: Vec<BinSegment<Pattern>>) -> Self {
        Self::dummy(PatternKind::Bin(segments))
    }

    pub fn alias(name: Name, pattern: Pattern) -> Self {
        Self::dummy(PatternKind::Alias {
            name,
            pattern: Box::new(pattern),
        })
    }

    /// Variables this pattern mentions, in left-to-right order of first
    /// occurrence. Includes size variables of binary segments.
    pub fn variables(&self) -> Vec<Name> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<Name>) {
        fn push(name: Name, out: &mut Vec<Name>) {
            if !out.contains(&name) {
                out.push(name);
            }
        }
        match &self.kind {
            PatternKind::Wildcard | PatternKind::Literal(_) | PatternKind::Nil => {}
            PatternKind::Var(name) => push(*name, out),
            PatternKind::Tuple(elements) => {
                for element in elements {
                    element.collect_variables(out);
                }
            }
            PatternKind::Cons { head, tail } => {
                head.collect_variables(out);
                tail.collect_variables(out);
            }
            PatternKind::List { elements, tail } => {
                for element in elements {
                    element.collect_variables(out);
                }
                if let Some(tail) = tail {
                    tail.collect_variables(out);
                }
            }
            PatternKind::Map(entries) => {
                for (_, value) in entries {
                    value.collect_variables(out);
                }
            }
            PatternKind::Bin(segments) => {
                for segment in segments {
                    segment.value.collect_variables(out);
                    if let super::SegmentSize::Var(name) = &segment.size {
                        push(*name, out);
                    }
                }
            }
            PatternKind::Alias { name, pattern } => {
                push(*name, out);
                pattern.collect_variables(out);
            }
        }
    }
}
