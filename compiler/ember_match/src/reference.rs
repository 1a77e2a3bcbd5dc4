//! Executable match semantics over heap terms.
//!
//! [`naive_match`] tries clauses top to bottom and patterns left to right.
//! [`run_tree`] walks a compiled decision tree. Both must pick the same
//! clause with the same bindings for every input; the interpreter and the
//! property tests rely on that.

use ember_ir::Name;
use ember_term::{Heap, LiteralId, LiteralPool, Term, TermKind};
use rustc_hash::FxHashMap;

use crate::compile::CompiledMatch;
use crate::pattern::{Binder, Ctor, EqOperand, FlatClause, FlatKind, FlatPattern};
use crate::tree::{DecisionNode, Edge, EqRef, Path, Step, SwitchTest};

/// Heap and environment a reference match runs against.
pub struct RefContext<'a> {
    pub heap: &'a mut Heap,
    pub literals: &'a LiteralPool,
    /// Variables bound before the match.
    pub outer: &'a FxHashMap<Name, Term>,
}

/// Selected clause and its variables, in the clause's binding order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchOutcome {
    pub clause: usize,
    pub bindings: Vec<(Name, Term)>,
}

impl MatchOutcome {
    /// Same clause and exactly equal bindings.
    pub fn agrees_with(&self, other: &MatchOutcome, heap: &Heap) -> bool {
        self.clause == other.clause
            && self.bindings.len() == other.bindings.len()
            && self
                .bindings
                .iter()
                .zip(&other.bindings)
                .all(|((a, x), (b, y))| a == b && heap.exact_eq(*x, *y))
    }
}

/// Top-to-bottom, left-to-right matching.
///
/// `guard` decides the guard of a clause that matched structurally and
/// passed its equality checks.
pub fn naive_match(
    clauses: &[FlatClause],
    scrutinees: &[Term],
    ctx: &mut RefContext<'_>,
    guard: &mut dyn FnMut(usize, &[(Name, Term)]) -> bool,
) -> Option<MatchOutcome> {
    'clauses: for (index, clause) in clauses.iter().enumerate() {
        if clause.patterns.len() != scrutinees.len() {
            continue;
        }
        let mut binds = Vec::new();
        for (pattern, &term) in clause.patterns.iter().zip(scrutinees) {
            if !match_pattern(pattern, term, ctx, &mut binds) {
                continue 'clauses;
            }
        }

        let named: Vec<(Name, Term)> = binds
            .iter()
            .filter_map(|(b, t)| match b {
                Binder::Named(name) => Some((*name, *t)),
                Binder::Check(_) => None,
            })
            .collect();
        for (binder, term) in &binds {
            let Binder::Check(operand) = binder else {
                continue;
            };
            let expected = match operand {
                EqOperand::Outer(name) => ctx.outer.get(name).copied(),
                EqOperand::Local(name) => lookup(&named, *name),
            };
            match expected {
                Some(expected) if ctx.heap.exact_eq(*term, expected) => {}
                _ => continue 'clauses,
            }
        }

        let bindings = in_order(&clause.vars, &named)?;
        if clause.has_guard && !guard(index, &bindings) {
            continue;
        }
        return Some(MatchOutcome {
            clause: index,
            bindings,
        });
    }
    None
}

fn match_pattern(
    pattern: &FlatPattern,
    term: Term,
    ctx: &mut RefContext<'_>,
    binds: &mut Vec<(Binder, Term)>,
) -> bool {
    binds.extend(pattern.binds.iter().map(|b| (*b, term)));
    match &pattern.kind {
        FlatKind::Wild => true,
        FlatKind::Ctor { ctor, args } => match ctor_parts(*ctor, term, ctx) {
            Some(parts) => args
                .iter()
                .zip(parts)
                .all(|(arg, part)| match_pattern(arg, part, ctx, binds)),
            None => false,
        },
        FlatKind::Map { keys, values } => {
            let Some(found) = map_values(term, keys, ctx) else {
                return false;
            };
            values
                .iter()
                .zip(found)
                .all(|(value, part)| match_pattern(value, part, ctx, binds))
        }
        FlatKind::Binary { test, segments } => {
            let Some(sizes) = test
                .sizes
                .iter()
                .map(|n| ctx.outer.get(n).copied())
                .collect::<Option<Vec<_>>>()
            else {
                return false;
            };
            let Some(parts) = test.shape.decode(ctx.heap, term, &sizes) else {
                return false;
            };
            segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match_pattern(segment, part, ctx, binds))
        }
    }
}

/// Sub-values of `term` if it is built by `ctor`.
fn ctor_parts(ctor: Ctor, term: Term, ctx: &mut RefContext<'_>) -> Option<Vec<Term>> {
    let heap = &mut *ctx.heap;
    match ctor {
        Ctor::SmallInt(n) => (term.as_small_int() == Some(n)).then(Vec::new),
        Ctor::BigInt(id) | Ctor::Float(id) => {
            if heap.kind_of(term) != ctor.term_kind() {
                return None;
            }
            let expected = ctx.literals.materialize(id, heap);
            heap.exact_eq(term, expected).then(Vec::new)
        }
        Ctor::Atom(name) => (term.as_atom() == Some(name)).then(Vec::new),
        Ctor::Nil => term.is_nil().then(Vec::new),
        Ctor::Cons => heap.cons_parts(term).map(|(h, t)| vec![h, t]),
        Ctor::Tuple(n) => heap
            .tuple_elements(term)
            .filter(|elements| elements.len() == n as usize)
            .map(<[Term]>::to_vec),
    }
}

fn map_values(term: Term, keys: &[LiteralId], ctx: &mut RefContext<'_>) -> Option<Vec<Term>> {
    if ctx.heap.kind_of(term) != TermKind::Map {
        return None;
    }
    keys.iter()
        .map(|&key| {
            let key = ctx.literals.materialize(key, ctx.heap);
            ctx.heap.map_get(term, key)
        })
        .collect()
}

fn lookup(bindings: &[(Name, Term)], name: Name) -> Option<Term> {
    bindings.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
}

fn in_order(vars: &[Name], bindings: &[(Name, Term)]) -> Option<Vec<(Name, Term)>> {
    vars.iter()
        .map(|&name| lookup(bindings, name).map(|term| (name, term)))
        .collect()
}

/// Walk the decision tree of `compiled`.
pub fn run_tree(
    compiled: &CompiledMatch,
    scrutinees: &[Term],
    ctx: &mut RefContext<'_>,
    guard: &mut dyn FnMut(usize, &[(Name, Term)]) -> bool,
) -> Option<MatchOutcome> {
    let mut walker = TreeWalker {
        values: FxHashMap::default(),
        states: FxHashMap::default(),
    };
    for (index, &term) in scrutinees.iter().enumerate() {
        walker
            .values
            .insert(Path::root(u32::try_from(index).ok()?), term);
    }

    let mut node = compiled.root;
    loop {
        match compiled.arena.node(node) {
            DecisionNode::Fail => return None,
            DecisionNode::Leaf { clause, bindings } => {
                let values = walker.bind(bindings, ctx)?;
                let vars = &compiled.clauses.get(*clause)?.vars;
                return Some(MatchOutcome {
                    clause: *clause,
                    bindings: in_order(vars, &values)?,
                });
            }
            DecisionNode::Guard {
                clause,
                bindings,
                checks,
                has_guard,
                on_fail,
            } => {
                let values = walker.bind(bindings, ctx)?;
                let mut holds = true;
                for check in checks {
                    let actual = walker.value_at(&check.path, ctx)?;
                    let expected = match &check.against {
                        EqRef::Outer(name) => ctx.outer.get(name).copied(),
                        EqRef::Path(path) => walker.value_at(path, ctx),
                    };
                    if !expected.is_some_and(|e| ctx.heap.exact_eq(actual, e)) {
                        holds = false;
                        break;
                    }
                }
                let ordered = in_order(&compiled.clauses.get(*clause)?.vars, &values)?;
                if holds && (!*has_guard || guard(*clause, &ordered)) {
                    return Some(MatchOutcome {
                        clause: *clause,
                        bindings: ordered,
                    });
                }
                node = *on_fail;
            }
            DecisionNode::Switch {
                path,
                test,
                edges,
                default,
            } => {
                let value = walker.value_at(path, ctx)?;
                node = match test {
                    SwitchTest::Constructor => edges
                        .iter()
                        .find(|(edge, _)| match edge {
                            Edge::Ctor(ctor) => ctor_parts(*ctor, value, ctx).is_some(),
                            Edge::Matched => false,
                        })
                        .map_or(*default, |(_, n)| *n),
                    SwitchTest::MapKeys(keys) => match map_values(value, keys, ctx) {
                        Some(found) => {
                            for (key, term) in keys.iter().zip(found) {
                                walker.values.insert(path.child(Step::MapValue(*key)), term);
                            }
                            matched_edge(edges)?
                        }
                        None => *default,
                    },
                    SwitchTest::Binary(index) => {
                        let test = compiled.arena.binary_test(*index)?;
                        let sizes = test
                            .sizes
                            .iter()
                            .map(|n| ctx.outer.get(n).copied())
                            .collect::<Option<Vec<_>>>();
                        match sizes.and_then(|sizes| test.shape.decode(ctx.heap, value, &sizes)) {
                            Some(parts) => {
                                walker.states.insert(path.child(Step::BinState(*index)), parts);
                                matched_edge(edges)?
                            }
                            None => *default,
                        }
                    }
                };
            }
        }
    }
}

fn matched_edge(edges: &[(Edge, crate::NodeId)]) -> Option<crate::NodeId> {
    edges
        .iter()
        .find(|(edge, _)| *edge == Edge::Matched)
        .map(|(_, n)| *n)
}

struct TreeWalker {
    values: FxHashMap<Path, Term>,
    /// Decoded segments per binary match state.
    states: FxHashMap<Path, Vec<Term>>,
}

impl TreeWalker {
    fn bind(&mut self, bindings: &[(Name, Path)], ctx: &RefContext<'_>) -> Option<Vec<(Name, Term)>> {
        bindings
            .iter()
            .map(|(name, path)| self.value_at(path, ctx).map(|t| (*name, t)))
            .collect()
    }

    fn value_at(&mut self, path: &Path, ctx: &RefContext<'_>) -> Option<Term> {
        if let Some(&term) = self.values.get(path) {
            return Some(term);
        }
        let (parent, step) = path.parent()?;
        let term = match step {
            Step::Element(index) => {
                let base = self.value_at(&parent, ctx)?;
                *ctx.heap.tuple_elements(base)?.get(index as usize)?
            }
            Step::Head => ctx.heap.cons_parts(self.value_at(&parent, ctx)?)?.0,
            Step::Tail => ctx.heap.cons_parts(self.value_at(&parent, ctx)?)?.1,
            Step::Segment(index) => *self.states.get(&parent)?.get(index as usize)?,
            Step::MapValue(_) | Step::BinState(_) => return None,
        };
        self.values.insert(path.clone(), term);
        Some(term)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "tests use unwrap to panic on unexpected state")]
mod tests;
