use crate::tree::{DecisionArena, DecisionNode, NodeId};

/// Which clauses some input can select, and whether some input selects none.
///
/// Guards are opaque: both sides of every `Guard` node count as reachable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reachability {
    pub clauses: Vec<bool>,
    /// A `Fail` node is reachable: the match is not exhaustive.
    pub fail: bool,
}

impl Reachability {
    pub fn analyze(arena: &DecisionArena, root: NodeId, clause_count: usize) -> Self {
        let mut reach = Reachability {
            clauses: vec![false; clause_count],
            fail: false,
        };
        let mut seen = vec![false; arena.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            match arena.node(id) {
                DecisionNode::Leaf { clause, .. } => reach.mark(*clause),
                DecisionNode::Guard { clause, on_fail, .. } => {
                    reach.mark(*clause);
                    stack.push(*on_fail);
                }
                DecisionNode::Switch { edges, default, .. } => {
                    stack.extend(edges.iter().map(|(_, n)| *n));
                    stack.push(*default);
                }
                DecisionNode::Fail => reach.fail = true,
            }
        }
        reach
    }

    fn mark(&mut self, clause: usize) {
        if let Some(slot) = self.clauses.get_mut(clause) {
            *slot = true;
        }
    }

    pub fn is_reachable(&self, clause: usize) -> bool {
        self.clauses.get(clause).copied().unwrap_or(false)
    }

    /// Indices of clauses no input can select.
    pub fn unreachable(&self) -> impl Iterator<Item = usize> + '_ {
        self.clauses
            .iter()
            .enumerate()
            .filter(|(_, r)| !**r)
            .map(|(i, _)| i)
    }

    pub fn is_exhaustive(&self) -> bool {
        !self.fail
    }
}
