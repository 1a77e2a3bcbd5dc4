//! Decision tree nodes and the arena that owns them.

use std::fmt;

use ember_ir::Name;
use ember_term::LiteralId;
use smallvec::SmallVec;

use crate::pattern::{BinaryTest, Ctor};

/// Index of a node in its [`DecisionArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One step from a value to a sub-value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    /// Zero-based tuple element.
    Element(u32),
    Head,
    Tail,
    /// Value under a map key known to be present.
    MapValue(LiteralId),
    /// Match state of the binary test with this arena index.
    BinState(u32),
    /// Segment of the match state.
    Segment(u32),
}

/// Location of a sub-value, starting from one of the match's scrutinees.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    pub root: u32,
    pub steps: SmallVec<[Step; 4]>,
}

impl Path {
    pub fn root(index: u32) -> Self {
        Path {
            root: index,
            steps: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn child(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Path {
            root: self.root,
            steps,
        }
    }

    pub fn parent(&self) -> Option<(Path, Step)> {
        let (&last, rest) = self.steps.split_last()?;
        Some((
            Path {
                root: self.root,
                steps: rest.iter().copied().collect(),
            },
            last,
        ))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.root)?;
        for step in &self.steps {
            match step {
                Step::Element(i) => write!(f, ".{i}")?,
                Step::Head => f.write_str(".hd")?,
                Step::Tail => f.write_str(".tl")?,
                Step::MapValue(key) => write!(f, "[{key}]")?,
                Step::BinState(t) => write!(f, ".bin{t}")?,
                Step::Segment(i) => write!(f, ".seg{i}")?,
            }
        }
        Ok(())
    }
}

/// What a `Switch` node tests at its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwitchTest {
    /// Which constructor the value is; one edge per constructor.
    Constructor,
    /// The value is a map holding all of these keys; one `Matched` edge.
    MapKeys(Vec<LiteralId>),
    /// The value matches the binary test with this arena index.
    Binary(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Ctor(Ctor),
    Matched,
}

/// The value a check compares against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EqRef {
    Outer(Name),
    Path(Path),
}

/// Exact equality required before a clause is selected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EqCheck {
    pub path: Path,
    pub against: EqRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionNode {
    /// Clause selected unconditionally.
    Leaf {
        clause: usize,
        bindings: Vec<(Name, Path)>,
    },
    /// Clause selected if its checks hold and its guard (when present)
    /// succeeds; otherwise `on_fail`, compiled from the rows below it.
    Guard {
        clause: usize,
        bindings: Vec<(Name, Path)>,
        checks: Vec<EqCheck>,
        has_guard: bool,
        on_fail: NodeId,
    },
    Switch {
        path: Path,
        test: SwitchTest,
        edges: Vec<(Edge, NodeId)>,
        default: NodeId,
    },
    /// No clause matches.
    Fail,
}

/// Index-addressed storage for a decision tree.
#[derive(Clone, Debug, Default)]
pub struct DecisionArena {
    nodes: Vec<DecisionNode>,
    binary_tests: Vec<BinaryTest>,
}

impl DecisionArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: DecisionNode) -> NodeId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "trees with more than u32::MAX nodes are not representable"
        )]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Node at `id`. Ids come from this arena, so the index is in bounds.
    pub fn node(&self, id: NodeId) -> &DecisionNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of `test`, registering it on first use. Equal tests share an
    /// index, so equal tests on the same path share one match state.
    pub fn intern_binary_test(&mut self, test: &BinaryTest) -> u32 {
        if let Some(index) = self.binary_tests.iter().position(|t| t == test) {
            #[expect(clippy::cast_possible_truncation, reason = "bounded by node count")]
            return index as u32;
        }
        self.binary_tests.push(test.clone());
        #[expect(clippy::cast_possible_truncation, reason = "bounded by node count")]
        let index = (self.binary_tests.len() - 1) as u32;
        index
    }

    pub fn binary_test(&self, index: u32) -> Option<&BinaryTest> {
        self.binary_tests.get(index as usize)
    }

    /// Number of nodes reachable from `root`, counting shared nodes once.
    pub fn reachable_count(&self, root: NodeId) -> usize {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        let mut count = 0;
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            count += 1;
            match self.node(id) {
                DecisionNode::Leaf { .. } | DecisionNode::Fail => {}
                DecisionNode::Guard { on_fail, .. } => stack.push(*on_fail),
                DecisionNode::Switch { edges, default, .. } => {
                    stack.extend(edges.iter().map(|(_, n)| *n));
                    stack.push(*default);
                }
            }
        }
        count
    }
}
