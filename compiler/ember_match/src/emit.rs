//! Expand a decision tree into MIR blocks.
//!
//! Every reachable clause gets exactly one body block whose parameters are
//! the clause's variables; each leaf that selects the clause jumps there.
//! Sub-values are extracted on first use and cached per path along each
//! branch, so a value is only reused in blocks its definition dominates.

use ember_ir::Name;
use ember_mir::{BlockId, FunctionBuilder, ValueClass, ValueId};
use ember_stack::ensure_sufficient_stack;
use ember_term::{LiteralId, TermKind};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::compile::CompiledMatch;
use crate::pattern::Ctor;
use crate::tree::{DecisionNode, Edge, EqRef, NodeId, Path, Step, SwitchTest};
use crate::MatchError;

/// The lowering context a match expands into.
pub trait MatchSink {
    type Error: From<MatchError>;

    fn builder(&mut self) -> &mut FunctionBuilder;

    /// Value of a variable bound before the match.
    fn outer_value(&mut self, name: Name) -> Option<ValueId>;

    /// Emit the guard of `clause` at the current block.
    ///
    /// `bindings` holds the clause's variables. The guard branches to
    /// `on_fail` when it is false or raises, and leaves the builder at an
    /// open block reached only when it holds.
    fn emit_guard(
        &mut self,
        clause: usize,
        bindings: &[(Name, ValueId)],
        on_fail: BlockId,
    ) -> Result<(), Self::Error>;

    /// Terminate the current block with the site's no-match behaviour.
    fn emit_no_match(&mut self) -> Result<(), Self::Error>;
}

/// Body block of a clause and the block parameters holding its variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClauseEntry {
    pub block: BlockId,
    pub vars: Vec<(Name, ValueId)>,
}

type PathCache = FxHashMap<Path, ValueId>;

/// Expand `compiled` at the builder's current block.
///
/// Returns the body block of every clause some input can select; `None`
/// for unreachable clauses. Bodies are left empty for the caller to lower.
pub fn emit<S: MatchSink>(
    compiled: &CompiledMatch,
    scrutinees: &[ValueId],
    sink: &mut S,
) -> Result<Vec<Option<ClauseEntry>>, S::Error> {
    if scrutinees.len() != compiled.scrutinees {
        return Err(MatchError::Internal(format!(
            "match over {} values given {}",
            compiled.scrutinees,
            scrutinees.len()
        ))
        .into());
    }

    let mut entries = Vec::with_capacity(compiled.clauses.len());
    for (index, clause) in compiled.clauses.iter().enumerate() {
        if !compiled.reach.is_reachable(index) {
            entries.push(None);
            continue;
        }
        let builder = sink.builder();
        let block = builder.new_block();
        let vars = clause
            .vars
            .iter()
            .map(|&name| (name, builder.add_block_param(block, ValueClass::Term)))
            .collect();
        entries.push(Some(ClauseEntry { block, vars }));
    }

    let mut cache = PathCache::default();
    for (index, &value) in scrutinees.iter().enumerate() {
        cache.insert(Path::root(u32::try_from(index).unwrap_or(u32::MAX)), value);
    }

    let mut emitter = Emitter {
        compiled,
        sink,
        entries: &entries,
        no_match: None,
    };
    emitter.node(compiled.root, cache)?;
    if let Some(block) = emitter.no_match {
        emitter.sink.builder().position_at(block);
        emitter.sink.emit_no_match()?;
    }

    trace!(
        clauses = compiled.clauses.len(),
        reachable = entries.iter().filter(|e| e.is_some()).count(),
        "expanded match"
    );
    Ok(entries)
}

struct Emitter<'a, S> {
    compiled: &'a CompiledMatch,
    sink: &'a mut S,
    entries: &'a [Option<ClauseEntry>],
    /// Shared target of every `Fail` node.
    no_match: Option<BlockId>,
}

impl<S: MatchSink> Emitter<'_, S> {
    fn b(&mut self) -> &mut FunctionBuilder {
        self.sink.builder()
    }

    fn node(&mut self, id: NodeId, cache: PathCache) -> Result<(), S::Error> {
        ensure_sufficient_stack(|| self.emit_node(id, cache))
    }

    fn emit_node(&mut self, id: NodeId, mut cache: PathCache) -> Result<(), S::Error> {
        let compiled = self.compiled;
        match compiled.arena.node(id) {
            DecisionNode::Fail => {
                let target = match self.no_match {
                    Some(block) => block,
                    None => {
                        let block = self.b().new_block();
                        self.no_match = Some(block);
                        block
                    }
                };
                self.b().jump(target, Vec::new());
                Ok(())
            }
            DecisionNode::Leaf { clause, bindings } => {
                let values = self.bind(bindings, &mut cache)?;
                self.enter_body(*clause, &values)
            }
            DecisionNode::Guard {
                clause,
                bindings,
                checks,
                has_guard,
                on_fail,
            } => {
                let values = self.bind(bindings, &mut cache)?;
                let fail = self.b().new_block();
                for check in checks {
                    let lhs = self.value_at(&check.path, &mut cache)?;
                    let rhs = match &check.against {
                        EqRef::Outer(name) => self.outer(*name)?,
                        EqRef::Path(path) => self.value_at(path, &mut cache)?,
                    };
                    let b = self.b();
                    let equal = b.term_eq(lhs, rhs, true);
                    let next = b.new_block();
                    b.branch(equal, next, fail);
                    b.position_at(next);
                }
                if *has_guard {
                    self.sink.emit_guard(*clause, &values, fail)?;
                }
                self.enter_body(*clause, &values)?;
                self.b().position_at(fail);
                self.node(*on_fail, cache)
            }
            DecisionNode::Switch {
                path,
                test,
                edges,
                default,
            } => {
                let value = self.value_at(path, &mut cache)?;
                match test {
                    SwitchTest::Constructor => self.switch_ctor(value, edges, *default, cache),
                    SwitchTest::MapKeys(keys) => {
                        let matched = single_edge(edges)?;
                        self.switch_map(path, value, keys, matched, *default, cache)
                    }
                    SwitchTest::Binary(index) => {
                        let matched = single_edge(edges)?;
                        self.switch_binary(path, value, *index, matched, *default, cache)
                    }
                }
            }
        }
    }

    fn bind(
        &mut self,
        bindings: &[(Name, Path)],
        cache: &mut PathCache,
    ) -> Result<Vec<(Name, ValueId)>, S::Error> {
        bindings
            .iter()
            .map(|(name, path)| Ok((*name, self.value_at(path, cache)?)))
            .collect()
    }

    fn enter_body(&mut self, clause: usize, values: &[(Name, ValueId)]) -> Result<(), S::Error> {
        let Some(entry) = self.entries.get(clause).and_then(Option::as_ref) else {
            return Err(MatchError::Internal(format!("clause {clause} has no body block")).into());
        };
        let mut args = Vec::with_capacity(entry.vars.len());
        for (name, _) in &entry.vars {
            let Some(&(_, value)) = values.iter().find(|(n, _)| n == name) else {
                return Err(MatchError::Internal(format!("clause {clause} variable not bound")).into());
            };
            args.push(value);
        }
        let block = entry.block;
        self.b().jump(block, args);
        Ok(())
    }

    fn outer(&mut self, name: Name) -> Result<ValueId, S::Error> {
        self.sink
            .outer_value(name)
            .ok_or_else(|| MatchError::MissingOuter { name }.into())
    }

    /// Value at `path`, extracting it (and any missing parent) on first use.
    fn value_at(&mut self, path: &Path, cache: &mut PathCache) -> Result<ValueId, S::Error> {
        if let Some(&value) = cache.get(path) {
            return Ok(value);
        }
        let Some((parent, step)) = path.parent() else {
            return Err(MatchError::Internal(format!("no value for scrutinee {path}")).into());
        };
        let base = self.value_at(&parent, cache)?;
        let b = self.b();
        let value = match step {
            Step::Element(index) => b.get_tuple_element(base, index),
            Step::Head => b.get_head(base),
            Step::Tail => b.get_tail(base),
            Step::Segment(index) => b.binary_segment(base, index),
            Step::MapValue(_) | Step::BinState(_) => {
                return Err(MatchError::Internal(format!("{path} used before its test")).into());
            }
        };
        cache.insert(path.clone(), value);
        Ok(value)
    }

    fn switch_ctor(
        &mut self,
        value: ValueId,
        edges: &[(Edge, NodeId)],
        default: NodeId,
        cache: PathCache,
    ) -> Result<(), S::Error> {
        // Group constructors by term kind, keeping first-appearance order.
        let mut groups: Vec<(TermKind, Vec<(Ctor, NodeId)>)> = Vec::new();
        for &(edge, node) in edges {
            let Edge::Ctor(ctor) = edge else {
                return Err(MatchError::Internal("constructor switch with a shape edge".into()).into());
            };
            let kind = ctor.term_kind();
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, ctors)) => ctors.push((ctor, node)),
                None => groups.push((kind, vec![(ctor, node)])),
            }
        }

        let b = self.b();
        let default_block = b.new_block();
        let kind_blocks: Vec<BlockId> = groups.iter().map(|_| b.new_block()).collect();
        let discriminant = b.term_kind_of(value);
        let cases = groups
            .iter()
            .zip(&kind_blocks)
            .map(|((kind, _), &block)| (i64::from(kind.code()), block))
            .collect();
        b.switch(discriminant, cases, default_block);

        for ((kind, ctors), block) in groups.into_iter().zip(kind_blocks) {
            self.b().position_at(block);
            self.discriminate(value, kind, &ctors, default_block, &cache)?;
        }

        self.b().position_at(default_block);
        self.node(default, cache)
    }

    /// Tell apart constructors of one term kind.
    fn discriminate(
        &mut self,
        value: ValueId,
        kind: TermKind,
        ctors: &[(Ctor, NodeId)],
        default_block: BlockId,
        cache: &PathCache,
    ) -> Result<(), S::Error> {
        match kind {
            TermKind::Nil | TermKind::Cons => match ctors {
                [(_, node)] => self.node(*node, cache.clone()),
                _ => Err(MatchError::Internal("repeated list constructor".into()).into()),
            },
            TermKind::SmallInt => {
                let key = self.b().untag_int(value);
                let cases = ctors
                    .iter()
                    .map(|(ctor, node)| match ctor {
                        Ctor::SmallInt(n) => (*n, *node),
                        _ => (0, *node),
                    })
                    .collect();
                self.switch_cases(key, cases, default_block, cache)
            }
            TermKind::Atom => {
                let key = self.b().atom_index(value);
                let cases = ctors
                    .iter()
                    .map(|(ctor, node)| match ctor {
                        Ctor::Atom(name) => (i64::from(name.raw()), *node),
                        _ => (0, *node),
                    })
                    .collect();
                self.switch_cases(key, cases, default_block, cache)
            }
            TermKind::Tuple => {
                let key = self.b().tuple_arity(value);
                let cases = ctors
                    .iter()
                    .map(|(ctor, node)| match ctor {
                        Ctor::Tuple(n) => (i64::from(*n), *node),
                        _ => (0, *node),
                    })
                    .collect();
                self.switch_cases(key, cases, default_block, cache)
            }
            TermKind::BigInt | TermKind::Float => {
                for (ctor, node) in ctors {
                    let literal: LiteralId = match ctor {
                        Ctor::BigInt(id) | Ctor::Float(id) => *id,
                        _ => return Err(MatchError::Internal("boxed literal edge without literal".into()).into()),
                    };
                    let b = self.b();
                    let expected = b.const_term(literal);
                    let equal = b.term_eq(value, expected, true);
                    let hit = b.new_block();
                    let next = b.new_block();
                    b.branch(equal, hit, next);
                    b.position_at(hit);
                    self.node(*node, cache.clone())?;
                    self.b().position_at(next);
                }
                self.b().jump(default_block, Vec::new());
                Ok(())
            }
            _ => Err(MatchError::Internal(format!("no constructor of kind {}", kind.name())).into()),
        }
    }

    fn switch_cases(
        &mut self,
        key: ValueId,
        cases: Vec<(i64, NodeId)>,
        default_block: BlockId,
        cache: &PathCache,
    ) -> Result<(), S::Error> {
        let b = self.b();
        let targets: Vec<(i64, BlockId, NodeId)> = cases
            .into_iter()
            .map(|(case, node)| (case, b.new_block(), node))
            .collect();
        b.switch(
            key,
            targets.iter().map(|&(case, block, _)| (case, block)).collect(),
            default_block,
        );
        for (_, block, node) in targets {
            self.b().position_at(block);
            self.node(node, cache.clone())?;
        }
        Ok(())
    }

    fn switch_map(
        &mut self,
        path: &Path,
        value: ValueId,
        keys: &[LiteralId],
        matched: NodeId,
        default: NodeId,
        cache: PathCache,
    ) -> Result<(), S::Error> {
        let b = self.b();
        let fail = b.new_block();
        let lookup = b.new_block();
        let is_map = b.is_kind(value, TermKind::Map);
        b.branch(is_map, lookup, fail);
        b.position_at(lookup);

        let mut success = cache.clone();
        for &key in keys {
            let path = path.child(Step::MapValue(key));
            // Presence is already established on this branch.
            if success.contains_key(&path) {
                continue;
            }
            let b = self.b();
            let key_term = b.const_term(key);
            let found = b.new_block();
            let found_value = b.add_block_param(found, ValueClass::Term);
            b.map_lookup(value, key_term, found, fail);
            b.position_at(found);
            success.insert(path, found_value);
        }
        self.node(matched, success)?;

        self.b().position_at(fail);
        self.node(default, cache)
    }

    fn switch_binary(
        &mut self,
        path: &Path,
        value: ValueId,
        index: u32,
        matched: NodeId,
        default: NodeId,
        cache: PathCache,
    ) -> Result<(), S::Error> {
        let compiled = self.compiled;
        let Some(test) = compiled.arena.binary_test(index) else {
            return Err(MatchError::Internal(format!("unknown binary test {index}")).into());
        };
        let mut sizes = Vec::with_capacity(test.sizes.len());
        for &name in &test.sizes {
            sizes.push(self.outer(name)?);
        }

        let b = self.b();
        let fail = b.new_block();
        let try_match = b.new_block();
        let is_binary = b.is_kind(value, TermKind::Binary);
        b.branch(is_binary, try_match, fail);
        b.position_at(try_match);
        let state = b.binary_match(value, test.shape.clone(), sizes);
        let no_fit = b.is_none(state);
        let fits = b.new_block();
        b.branch(no_fit, fail, fits);
        b.position_at(fits);

        let mut success = cache.clone();
        success.insert(path.child(Step::BinState(index)), state);
        self.node(matched, success)?;

        self.b().position_at(fail);
        self.node(default, cache)
    }
}

fn single_edge(edges: &[(Edge, NodeId)]) -> Result<NodeId, MatchError> {
    match edges {
        [(Edge::Matched, node)] => Ok(*node),
        _ => Err(MatchError::Internal("shape test needs exactly one edge".into())),
    }
}
