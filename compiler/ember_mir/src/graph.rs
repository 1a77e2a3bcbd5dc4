//! CFG analyses over MIR functions.
//!
//! Edges come in two flavours. Normal edges are the terminator's
//! successors. Exceptional edges lead to handler blocks: the `handler` of
//! every raising instruction, the handler named by `TryEnter`, and the
//! handler of a `Raise` terminator. Reachability, postorder and dominance
//! consider both, so a handler is dominated by the block that opened its
//! region.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::function::{Block, Function};
use crate::ids::BlockId;

/// Handler blocks `block` can transfer to, without duplicates.
pub fn exceptional_successors(block: &Block) -> SmallVec<[BlockId; 2]> {
    let mut out: SmallVec<[BlockId; 2]> = SmallVec::new();
    let mut push = |b: BlockId| {
        if !out.contains(&b) {
            out.push(b);
        }
    };
    for instr in &block.instrs {
        if let Some(h) = instr.handler {
            push(h);
        }
        if let Some(h) = instr.op.block_ref() {
            push(h);
        }
    }
    if let Some(h) = block.terminator.as_ref().and_then(|t| t.exceptional_successor()) {
        push(h);
    }
    out
}

/// Every successor of `block`, normal edges first, without duplicates.
pub fn successors(block: &Block) -> SmallVec<[BlockId; 4]> {
    let mut out: SmallVec<[BlockId; 4]> = SmallVec::new();
    if let Some(term) = &block.terminator {
        for b in term.successors() {
            if !out.contains(&b) {
                out.push(b);
            }
        }
    }
    for b in exceptional_successors(block) {
        if !out.contains(&b) {
            out.push(b);
        }
    }
    out
}

/// Distinct predecessors of each block, indexed by block index.
pub fn predecessors(func: &Function) -> Vec<Vec<BlockId>> {
    predecessors_of(&func.blocks)
}

pub(crate) fn predecessors_of(blocks: &[Block]) -> Vec<Vec<BlockId>> {
    let n = blocks.len();
    let mut preds: Vec<Vec<BlockId>> = vec![Vec::new(); n];
    for block in blocks {
        let mut seen = FxHashSet::default();
        for succ in successors(block) {
            if succ.index() < n && seen.insert(succ) {
                preds[succ.index()].push(block.id);
            }
        }
    }
    preds
}

/// Postorder from the entry block over reachable blocks.
///
/// Iterative, so deep CFGs do not grow the native stack.
pub fn postorder(func: &Function) -> Vec<BlockId> {
    postorder_of(&func.blocks, func.entry)
}

pub(crate) fn postorder_of(blocks: &[Block], entry: BlockId) -> Vec<BlockId> {
    let n = blocks.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    if entry.index() >= n {
        return order;
    }

    // (block, next successor to visit)
    let mut stack: Vec<(BlockId, SmallVec<[BlockId; 4]>, usize)> = Vec::new();
    visited[entry.index()] = true;
    stack.push((entry, successors(&blocks[entry.index()]), 0));

    while let Some((block, succs, next)) = stack.last_mut() {
        if let Some(&succ) = succs.get(*next) {
            *next += 1;
            if succ.index() < n && !visited[succ.index()] {
                visited[succ.index()] = true;
                let succs = successors(&blocks[succ.index()]);
                stack.push((succ, succs, 0));
            }
        } else {
            order.push(*block);
            stack.pop();
        }
    }
    order
}

pub fn reverse_postorder(func: &Function) -> Vec<BlockId> {
    let mut rpo = postorder(func);
    rpo.reverse();
    rpo
}

/// `result[i]` is true when block `i` is reachable from the entry.
pub fn reachable(func: &Function) -> Vec<bool> {
    reachable_of(&func.blocks, func.entry)
}

pub(crate) fn reachable_of(blocks: &[Block], entry: BlockId) -> Vec<bool> {
    let mut seen = vec![false; blocks.len()];
    for b in postorder_of(blocks, entry) {
        seen[b.index()] = true;
    }
    seen
}

/// Dominator tree (Cooper, Harvey, Kennedy: "A Simple, Fast Dominance
/// Algorithm"). Unreachable blocks have no dominator and dominate nothing.
#[derive(Clone, Debug)]
pub struct DominatorTree {
    /// `idom[entry] == Some(entry)`; `None` for unreachable blocks.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub fn build(func: &Function) -> Self {
        let n = func.blocks.len();
        if n == 0 || func.entry.index() >= n {
            return Self { idom: vec![None; n] };
        }

        let preds = predecessors(func);
        let rpo = reverse_postorder(func);
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, b) in rpo.iter().enumerate() {
            rpo_pos[b.index()] = pos;
        }

        let entry = func.entry.index();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for b in rpo.iter().skip(1) {
                let b = b.index();
                let mut processed = preds[b]
                    .iter()
                    .map(|p| p.index())
                    .filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom =
                    processed.fold(first, |acc, p| Self::intersect(p, acc, &idom, &rpo_pos));
                if idom[b] != Some(new_idom) {
                    idom[b] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    /// Immediate dominator; `None` for the entry and unreachable blocks.
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        let i = block.index();
        match self.idom.get(i).copied().flatten() {
            Some(d) if d != i => Some(BlockId::new(u32::try_from(d).unwrap_or(u32::MAX))),
            _ => None,
        }
    }

    /// Does `a` dominate `b`? A block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let target = a.index();
        let mut current = b.index();
        if self.idom.get(current).copied().flatten().is_none() {
            return false;
        }
        loop {
            if current == target {
                return true;
            }
            match self.idom[current] {
                Some(d) if d != current => current = d,
                _ => return false,
            }
        }
    }

    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}

#[cfg(test)]
mod tests;
