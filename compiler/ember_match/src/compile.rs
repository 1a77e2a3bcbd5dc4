//! Decision tree construction via the Maranget (2008) algorithm.
//!
//! Compiles the rows of a pattern matrix into a [`DecisionArena`] by
//! recursively choosing a column, testing the value at its path, and
//! specializing the matrix for each outcome.
//!
//! # Algorithm
//!
//! 1. **Base cases**: empty matrix → `Fail`; first row all wildcards →
//!    `Leaf`, or `Guard` whose failure side is the rest of the matrix
//! 2. **Pick column**: the leftmost column holding a non-wildcard pattern
//! 3. **Pick test**: the top-most non-wildcard pattern of that column
//! 4. **Constructors**: one edge per distinct constructor in order of first
//!    appearance; the default keeps wildcard rows and non-exclusive shapes
//! 5. **Maps and binaries**: one shape per test; the success side exposes
//!    the shape's sub-values as new columns, the failure side keeps every
//!    row of another shape in order
//!
//! The column choice is a pure function of the matrix, so the same clauses
//! always produce the same tree.
//!
//! # References
//!
//! - Maranget (2008) "Compiling Pattern Matching to Good Decision Trees"

use ember_ir::Span;
use ember_mir::{ClauseSite, MatchKind, MatchSite};
use ember_stack::ensure_sufficient_stack;
use ember_term::LiteralId;
use tracing::debug;

use crate::pattern::{Binder, BinaryTest, Ctor, EqOperand, FlatClause, FlatKind, FlatPattern};
use crate::reach::Reachability;
use crate::tree::{DecisionArena, DecisionNode, Edge, EqCheck, EqRef, NodeId, Path, Step, SwitchTest};
use crate::MatchError;

/// A match compiled to a decision tree.
#[derive(Clone, Debug)]
pub struct CompiledMatch {
    pub arena: DecisionArena,
    pub root: NodeId,
    pub clauses: Vec<FlatClause>,
    /// Number of values matched by every clause.
    pub scrutinees: usize,
    pub reach: Reachability,
}

impl CompiledMatch {
    /// Metadata for the verifier's reachability warnings.
    pub fn site(&self, kind: MatchKind, span: Span) -> MatchSite {
        MatchSite {
            kind,
            span,
            clauses: self
                .clauses
                .iter()
                .enumerate()
                .map(|(i, clause)| ClauseSite {
                    span: clause.span,
                    reachable: self.reach.is_reachable(i),
                })
                .collect(),
            fail_reachable: self.reach.fail,
        }
    }
}

/// Compile flattened clauses matching `scrutinees` values each.
pub fn compile(clauses: Vec<FlatClause>, scrutinees: usize) -> Result<CompiledMatch, MatchError> {
    for (index, clause) in clauses.iter().enumerate() {
        if clause.patterns.len() != scrutinees {
            return Err(MatchError::ArityMismatch {
                clause: index,
                expected: scrutinees,
                found: clause.patterns.len(),
                span: clause.span,
            });
        }
    }

    let rows = clauses
        .iter()
        .enumerate()
        .map(|(index, clause)| Row {
            clause: index,
            cols: clause.patterns.clone(),
            binds: Vec::new(),
        })
        .collect();
    let paths = (0..scrutinees)
        .map(|i| Path::root(u32::try_from(i).unwrap_or(u32::MAX)))
        .collect();

    let mut compiler = Compiler {
        arena: DecisionArena::new(),
        clauses: &clauses,
    };
    let root = compiler.compile(rows, paths)?;
    let arena = compiler.arena;
    let reach = Reachability::analyze(&arena, root, clauses.len());

    debug!(
        clauses = clauses.len(),
        nodes = arena.len(),
        reachable_nodes = arena.reachable_count(root),
        exhaustive = !reach.fail,
        "compiled match"
    );

    Ok(CompiledMatch {
        arena,
        root,
        clauses,
        scrutinees,
        reach,
    })
}

/// One row of the pattern matrix.
#[derive(Clone, Debug)]
struct Row {
    clause: usize,
    cols: Vec<FlatPattern>,
    /// Binders of patterns already consumed, with the path of their value.
    binds: Vec<(Binder, Path)>,
}

impl Row {
    /// Remove column `col`, recording its binders at `path`.
    fn take(&mut self, col: usize, path: &Path) -> FlatKind {
        let pattern = self.cols.remove(col);
        self.binds
            .extend(pattern.binds.into_iter().map(|b| (b, path.clone())));
        pattern.kind
    }
}

struct Compiler<'a> {
    arena: DecisionArena,
    clauses: &'a [FlatClause],
}

impl Compiler<'_> {
    fn compile(&mut self, rows: Vec<Row>, paths: Vec<Path>) -> Result<NodeId, MatchError> {
        ensure_sufficient_stack(|| self.compile_matrix(rows, paths))
    }

    fn compile_matrix(&mut self, mut rows: Vec<Row>, paths: Vec<Path>) -> Result<NodeId, MatchError> {
        debug_assert!(
            rows.iter().all(|r| r.cols.len() == paths.len()),
            "column count mismatch"
        );

        // 1. EMPTY MATRIX: nothing left to try.
        if rows.is_empty() {
            return Ok(self.arena.alloc(DecisionNode::Fail));
        }

        // 2. FIRST ROW ALL WILDCARDS: the row matches structurally.
        if rows[0].cols.iter().all(FlatPattern::is_wild) {
            let first = rows.remove(0);
            return self.select(first, rows, paths);
        }

        // 3. PICK COLUMN AND TEST.
        let Some(col) = (0..paths.len()).find(|&c| rows.iter().any(|r| !r.cols[c].is_wild())) else {
            return Err(MatchError::Internal("no column to split on".into()));
        };
        let top = rows
            .iter()
            .map(|r| &r.cols[col].kind)
            .find(|k| !matches!(k, FlatKind::Wild));
        match top {
            Some(FlatKind::Ctor { .. }) => self.switch_ctor(rows, &paths, col),
            Some(FlatKind::Map { keys, .. }) => {
                let keys = keys.clone();
                self.switch_map(rows, &paths, col, keys)
            }
            Some(FlatKind::Binary { test, .. }) => {
                let test = test.clone();
                self.switch_binary(rows, &paths, col, &test)
            }
            Some(FlatKind::Wild) | None => Err(MatchError::Internal("chosen column is all wildcards".into())),
        }
    }

    /// Leaf or guard for a row whose remaining columns are all wildcards.
    fn select(&mut self, mut row: Row, rest: Vec<Row>, paths: Vec<Path>) -> Result<NodeId, MatchError> {
        for (pattern, path) in row.cols.drain(..).zip(&paths) {
            row.binds
                .extend(pattern.binds.into_iter().map(|b| (b, path.clone())));
        }

        let mut bindings = Vec::new();
        for (binder, path) in &row.binds {
            if let Binder::Named(name) = binder {
                bindings.push((*name, path.clone()));
            }
        }
        let mut checks = Vec::new();
        for (binder, path) in &row.binds {
            let Binder::Check(operand) = binder else {
                continue;
            };
            let against = match operand {
                EqOperand::Outer(name) => EqRef::Outer(*name),
                EqOperand::Local(name) => {
                    let Some((_, bound)) = bindings.iter().find(|(n, _)| n == name) else {
                        return Err(MatchError::Internal(
                            "repeated variable has no first binding".into(),
                        ));
                    };
                    EqRef::Path(bound.clone())
                }
            };
            checks.push(EqCheck {
                path: path.clone(),
                against,
            });
        }

        let has_guard = self.clauses.get(row.clause).is_some_and(|c| c.has_guard);
        if !has_guard && checks.is_empty() {
            return Ok(self.arena.alloc(DecisionNode::Leaf {
                clause: row.clause,
                bindings,
            }));
        }

        // The guard may fail: fall through to the rows below, never to an
        // unrelated constructor's subtree.
        let on_fail = self.compile(rest, paths)?;
        Ok(self.arena.alloc(DecisionNode::Guard {
            clause: row.clause,
            bindings,
            checks,
            has_guard,
            on_fail,
        }))
    }

    fn switch_ctor(&mut self, rows: Vec<Row>, paths: &[Path], col: usize) -> Result<NodeId, MatchError> {
        let path = paths[col].clone();

        let mut ctors: Vec<Ctor> = Vec::new();
        for row in &rows {
            if let FlatKind::Ctor { ctor, .. } = &row.cols[col].kind {
                if !ctors.contains(ctor) {
                    ctors.push(*ctor);
                }
            }
        }

        let mut edges = Vec::with_capacity(ctors.len());
        for ctor in ctors {
            let sub_paths = ctor_paths(&path, ctor);
            let spec_paths = replace_column(paths, col, sub_paths);
            let mut spec_rows = Vec::new();
            for row in &rows {
                let matches = match &row.cols[col].kind {
                    FlatKind::Wild => true,
                    FlatKind::Ctor { ctor: c, .. } => *c == ctor,
                    // A constructor value is never a map or a binary.
                    FlatKind::Map { .. } | FlatKind::Binary { .. } => false,
                };
                if !matches {
                    continue;
                }
                let mut row = row.clone();
                let args = match row.take(col, &path) {
                    FlatKind::Ctor { args, .. } => args,
                    _ => vec![FlatPattern::wild(); ctor.arity()],
                };
                row.cols.splice(col..col, args);
                spec_rows.push(row);
            }
            let child = self.compile(spec_rows, spec_paths)?;
            edges.push((Edge::Ctor(ctor), child));
        }

        // Default: the value is none of the listed constructors.
        let keep_column = rows
            .iter()
            .any(|r| matches!(r.cols[col].kind, FlatKind::Map { .. } | FlatKind::Binary { .. }));
        let mut default_rows = Vec::new();
        for mut row in rows {
            match &row.cols[col].kind {
                FlatKind::Ctor { .. } => {}
                FlatKind::Wild if !keep_column => {
                    row.take(col, &path);
                    default_rows.push(row);
                }
                _ => default_rows.push(row),
            }
        }
        let default_paths = if keep_column {
            paths.to_vec()
        } else {
            replace_column(paths, col, Vec::new())
        };
        let default = self.compile(default_rows, default_paths)?;

        Ok(self.arena.alloc(DecisionNode::Switch {
            path,
            test: SwitchTest::Constructor,
            edges,
            default,
        }))
    }

    fn switch_map(
        &mut self,
        rows: Vec<Row>,
        paths: &[Path],
        col: usize,
        keys: Vec<LiteralId>,
    ) -> Result<NodeId, MatchError> {
        let path = paths[col].clone();
        let sub_paths: Vec<Path> = keys.iter().map(|k| path.child(Step::MapValue(*k))).collect();

        let mut success_rows = Vec::new();
        let mut failure_rows = Vec::new();
        for row in rows {
            match &row.cols[col].kind {
                FlatKind::Map { keys: k, .. } if *k == keys => {
                    success_rows.push(expose(row, col, &path, |kind| match kind {
                        FlatKind::Map { values, .. } => values,
                        _ => Vec::new(),
                    }));
                }
                FlatKind::Wild | FlatKind::Map { .. } => {
                    failure_rows.push(row.clone());
                    success_rows.push(pad(row, col, sub_paths.len()));
                }
                FlatKind::Ctor { .. } | FlatKind::Binary { .. } => failure_rows.push(row),
            }
        }

        let success_paths = insert_columns(paths, col, sub_paths);
        let matched = self.compile(success_rows, success_paths)?;
        let default = self.compile(failure_rows, paths.to_vec())?;
        Ok(self.arena.alloc(DecisionNode::Switch {
            path,
            test: SwitchTest::MapKeys(keys),
            edges: vec![(Edge::Matched, matched)],
            default,
        }))
    }

    fn switch_binary(
        &mut self,
        rows: Vec<Row>,
        paths: &[Path],
        col: usize,
        test: &BinaryTest,
    ) -> Result<NodeId, MatchError> {
        let path = paths[col].clone();
        let index = self.arena.intern_binary_test(test);
        let state = path.child(Step::BinState(index));
        let sub_paths: Vec<Path> = (0..test.shape.segments.len())
            .map(|i| state.child(Step::Segment(u32::try_from(i).unwrap_or(u32::MAX))))
            .collect();

        let mut success_rows = Vec::new();
        let mut failure_rows = Vec::new();
        for row in rows {
            match &row.cols[col].kind {
                FlatKind::Binary { test: t, .. } if t == test => {
                    success_rows.push(expose(row, col, &path, |kind| match kind {
                        FlatKind::Binary { segments, .. } => segments,
                        _ => Vec::new(),
                    }));
                }
                FlatKind::Wild | FlatKind::Binary { .. } => {
                    failure_rows.push(row.clone());
                    success_rows.push(pad(row, col, sub_paths.len()));
                }
                FlatKind::Ctor { .. } | FlatKind::Map { .. } => failure_rows.push(row),
            }
        }

        let success_paths = insert_columns(paths, col, sub_paths);
        let matched = self.compile(success_rows, success_paths)?;
        let default = self.compile(failure_rows, paths.to_vec())?;
        Ok(self.arena.alloc(DecisionNode::Switch {
            path,
            test: SwitchTest::Binary(index),
            edges: vec![(Edge::Matched, matched)],
            default,
        }))
    }
}

/// Paths of a constructor's sub-values.
fn ctor_paths(path: &Path, ctor: Ctor) -> Vec<Path> {
    match ctor {
        Ctor::Cons => vec![path.child(Step::Head), path.child(Step::Tail)],
        Ctor::Tuple(n) => (0..n).map(|i| path.child(Step::Element(i))).collect(),
        _ => Vec::new(),
    }
}

/// Consume a tested shape at `col`, leaving a wildcard there and its
/// sub-patterns right after it.
fn expose(mut row: Row, col: usize, path: &Path, parts: impl FnOnce(FlatKind) -> Vec<FlatPattern>) -> Row {
    let kind = row.take(col, path);
    row.cols.insert(col, FlatPattern::wild());
    row.cols.splice(col + 1..col + 1, parts(kind));
    row
}

/// Add `count` wildcard sub-columns after `col`.
fn pad(mut row: Row, col: usize, count: usize) -> Row {
    row.cols
        .splice(col + 1..col + 1, std::iter::repeat_with(FlatPattern::wild).take(count));
    row
}

fn replace_column(paths: &[Path], col: usize, with: Vec<Path>) -> Vec<Path> {
    let mut out = Vec::with_capacity(paths.len() + with.len());
    out.extend_from_slice(&paths[..col]);
    out.extend(with);
    out.extend_from_slice(&paths[col + 1..]);
    out
}

fn insert_columns(paths: &[Path], col: usize, with: Vec<Path>) -> Vec<Path> {
    let mut out = paths.to_vec();
    out.splice(col + 1..col + 1, with);
    out
}
