//! Flatten source patterns into matrix rows.
//!
//! Lists become cons chains, aliases become binders, and literals become
//! constructors or pooled literal ids. A variable that is already bound,
//! either before the match or earlier in the same clause, becomes an
//! equality check that runs together with the clause guard.

use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;

use ember_ir::ast::{BinSegment, Literal, Pattern, PatternKind, SegmentSize, SegmentType};
use ember_ir::{Name, Span};
use ember_mir::{BinaryShape, SegmentLayout, ShapeSize};
use ember_stack::ensure_sufficient_stack;
use ember_term::{fits_small, LiteralId, LiteralPool, LiteralValue};

use crate::pattern::{Binder, BinaryTest, Ctor, EqOperand, FlatClause, FlatKind, FlatPattern};
use crate::MatchError;

/// Variables bound before the match site.
pub trait Scope {
    fn is_bound(&self, name: Name) -> bool;
}

impl<S: BuildHasher> Scope for HashSet<Name, S> {
    fn is_bound(&self, name: Name) -> bool {
        self.contains(&name)
    }
}

impl<V, S: BuildHasher> Scope for HashMap<Name, V, S> {
    fn is_bound(&self, name: Name) -> bool {
        self.contains_key(&name)
    }
}

/// Flatten the patterns of one clause.
///
/// Literal terms the patterns need (big integers, floats, map keys) are
/// interned into `pool`.
pub fn flatten_clause(
    patterns: &[Pattern],
    has_guard: bool,
    span: Span,
    scope: &dyn Scope,
    pool: &mut LiteralPool,
) -> Result<FlatClause, MatchError> {
    let mut flattener = Flattener {
        scope,
        pool,
        bound: Vec::new(),
    };
    let patterns = patterns
        .iter()
        .map(|p| flattener.flatten(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FlatClause {
        patterns,
        has_guard,
        vars: flattener.bound,
        span,
    })
}

struct Flattener<'a> {
    scope: &'a dyn Scope,
    pool: &'a mut LiteralPool,
    /// Variables bound so far by this clause, in binding order.
    bound: Vec<Name>,
}

impl Flattener<'_> {
    fn binder(&mut self, name: Name) -> Binder {
        if self.scope.is_bound(name) {
            Binder::Check(EqOperand::Outer(name))
        } else if self.bound.contains(&name) {
            Binder::Check(EqOperand::Local(name))
        } else {
            self.bound.push(name);
            Binder::Named(name)
        }
    }

    fn flatten(&mut self, pattern: &Pattern) -> Result<FlatPattern, MatchError> {
        ensure_sufficient_stack(|| self.flatten_inner(pattern))
    }

    fn flatten_inner(&mut self, pattern: &Pattern) -> Result<FlatPattern, MatchError> {
        let span = pattern.span;
        match &pattern.kind {
            PatternKind::Wildcard => Ok(FlatPattern::wild()),
            PatternKind::Var(name) => {
                let binder = self.binder(*name);
                Ok(FlatPattern::wild().with_binder(binder))
            }
            PatternKind::Literal(literal) => Ok(FlatPattern::ctor(self.literal_ctor(literal), Vec::new())),
            PatternKind::Nil => Ok(FlatPattern::ctor(Ctor::Nil, Vec::new())),
            PatternKind::Tuple(elements) => {
                let arity = u32::try_from(elements.len()).map_err(|_| MatchError::Unsupported {
                    what: "tuple pattern too large",
                    span,
                })?;
                let args = elements
                    .iter()
                    .map(|e| self.flatten(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FlatPattern::ctor(Ctor::Tuple(arity), args))
            }
            PatternKind::Cons { head, tail } => {
                let head = self.flatten(head)?;
                let tail = self.flatten(tail)?;
                Ok(FlatPattern::ctor(Ctor::Cons, vec![head, tail]))
            }
            PatternKind::List { elements, tail } => {
                // Flatten left to right so binding order follows the source.
                let heads = elements
                    .iter()
                    .map(|e| self.flatten(e))
                    .collect::<Result<Vec<_>, _>>()?;
                let tail = match tail {
                    Some(tail) => self.flatten(tail)?,
                    None => FlatPattern::ctor(Ctor::Nil, Vec::new()),
                };
                Ok(heads
                    .into_iter()
                    .rev()
                    .fold(tail, |tail, head| FlatPattern::ctor(Ctor::Cons, vec![head, tail])))
            }
            PatternKind::Map(entries) => self.flatten_map(entries, span),
            PatternKind::Bin(segments) => self.flatten_binary(segments, span),
            PatternKind::Alias { name, pattern } => {
                let binder = self.binder(*name);
                Ok(self.flatten(pattern)?.with_binder(binder))
            }
        }
    }

    fn literal_ctor(&mut self, literal: &Literal) -> Ctor {
        match literal {
            Literal::Integer(value) => match i64::try_from(value) {
                Ok(small) if fits_small(i128::from(small)) => Ctor::SmallInt(small),
                _ => Ctor::BigInt(self.pool.integer(value)),
            },
            Literal::Float(value) => Ctor::Float(self.pool.intern(float_literal(*value))),
            Literal::Atom(name) => Ctor::Atom(*name),
        }
    }

    fn literal_id(&mut self, literal: &Literal) -> LiteralId {
        match literal {
            Literal::Integer(value) => self.pool.integer(value),
            Literal::Float(value) => self.pool.intern(float_literal(*value)),
            Literal::Atom(name) => self.pool.atom(*name),
        }
    }

    fn flatten_map(&mut self, entries: &[(Literal, Pattern)], span: Span) -> Result<FlatPattern, MatchError> {
        let mut pairs: Vec<(LiteralId, FlatPattern)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.literal_id(key);
            if pairs.iter().any(|(k, _)| *k == key) {
                return Err(MatchError::Unsupported {
                    what: "repeated key in map pattern",
                    span,
                });
            }
            pairs.push((key, self.flatten(value)?));
        }
        pairs.sort_by_key(|(k, _)| *k);
        let (keys, values) = pairs.into_iter().unzip();
        Ok(FlatPattern {
            binds: Vec::new(),
            kind: FlatKind::Map { keys, values },
        })
    }

    fn flatten_binary(
        &mut self,
        segments: &[BinSegment<Pattern>],
        span: Span,
    ) -> Result<FlatPattern, MatchError> {
        let mut layouts = Vec::with_capacity(segments.len());
        let mut sizes: Vec<Name> = Vec::new();
        let mut values = Vec::with_capacity(segments.len());
        // Variables bound by integer segments of this binary, by segment.
        let mut segment_vars: Vec<(Name, u32)> = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            let is_last = index + 1 == segments.len();
            let size = match &segment.size {
                SegmentSize::Default => {
                    let layout = SegmentLayout::with_default_size(segment.spec);
                    if layout.size == ShapeSize::Rest && !is_last {
                        return Err(MatchError::Unsupported {
                            what: "binary segment without a size before the last segment",
                            span: segment.span,
                        });
                    }
                    layout.size
                }
                SegmentSize::Literal(n) => ShapeSize::Bits(u64::from(*n) * u64::from(segment.spec.unit)),
                SegmentSize::Var(name) => {
                    if self.scope.is_bound(*name) {
                        let slot = match sizes.iter().position(|n| n == name) {
                            Some(slot) => slot,
                            None => {
                                sizes.push(*name);
                                sizes.len() - 1
                            }
                        };
                        ShapeSize::Operand(to_u32(slot, span)?)
                    } else if let Some(&(_, j)) = segment_vars.iter().find(|(n, _)| n == name) {
                        ShapeSize::Segment(j)
                    } else {
                        return Err(MatchError::UnboundSize {
                            name: *name,
                            span: segment.span,
                        });
                    }
                }
            };
            layouts.push(SegmentLayout {
                spec: segment.spec,
                size,
            });

            let value = self.flatten(&segment.value)?;
            if segment.spec.ty == SegmentType::Integer {
                if let (
                    FlatKind::Wild,
                    Some(Binder::Named(name) | Binder::Check(EqOperand::Local(name))),
                ) = (&value.kind, value.binds.first())
                {
                    segment_vars.push((*name, to_u32(index, span)?));
                }
            }
            values.push(value);
        }

        Ok(FlatPattern {
            binds: Vec::new(),
            kind: FlatKind::Binary {
                test: BinaryTest {
                    shape: BinaryShape::new(layouts),
                    sizes,
                },
                segments: values,
            },
        })
    }
}

/// `-0.0` and `0.0` are exactly equal terms, so they share one literal.
fn float_literal(value: f64) -> LiteralValue {
    LiteralValue::float(if value == 0.0 { 0.0 } else { value })
}

fn to_u32(index: usize, span: Span) -> Result<u32, MatchError> {
    u32::try_from(index).map_err(|_| MatchError::Unsupported {
        what: "binary pattern too large",
        span,
    })
}
