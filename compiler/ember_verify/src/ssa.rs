//! Single assignment and dominance of uses.
//!
//! A value defined by an instruction is not available in a handler reached
//! from the same block by an edge that leaves at or before the definition:
//! the raise happens before the value exists.

use ember_diagnostic::ErrorCode;
use ember_mir::graph::DominatorTree;
use ember_mir::{BlockId, ValueId};
use rustc_hash::FxHashMap;

use crate::check::Checker;
use crate::error::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Def {
    Param(BlockId),
    Instr { block: BlockId, index: usize },
}

pub(crate) type Definitions = Vec<Option<Def>>;

/// Where each value is defined. Reports values defined twice or without a
/// class.
pub(crate) fn definitions(c: &mut Checker<'_>) -> Definitions {
    let func = c.func;
    let mut defs = vec![None; func.value_count()];
    for block in &func.blocks {
        for &param in &block.params {
            define(c, &mut defs, param, Def::Param(block.id), Location::Block(block.id));
        }
        for (index, instr) in block.instrs.iter().enumerate() {
            for result in instr.op.results() {
                let location = Location::Instr {
                    block: block.id,
                    index,
                };
                define(c, &mut defs, result, Def::Instr { block: block.id, index }, location);
            }
        }
    }
    defs
}

fn define(c: &mut Checker<'_>, defs: &mut Definitions, value: ValueId, def: Def, location: Location) {
    match defs.get_mut(value.index()) {
        None => c.fail(
            ErrorCode::E3001,
            location,
            format!("{value} is out of range ({} values)", c.func.value_count()),
        ),
        Some(Some(_)) => c.fail(ErrorCode::E3001, location, format!("{value} is defined more than once")),
        Some(slot @ None) => *slot = Some(def),
    }
}

/// First instruction of each block with an edge to a given handler, keyed
/// by `(handler, block)`.
fn handler_edges(c: &Checker<'_>) -> FxHashMap<(BlockId, BlockId), usize> {
    let mut first = FxHashMap::default();
    for block in &c.func.blocks {
        for (index, instr) in block.instrs.iter().enumerate() {
            for handler in instr.handler.into_iter().chain(instr.op.block_ref()) {
                first.entry((handler, block.id)).or_insert(index);
            }
        }
    }
    first
}

pub(crate) fn check_uses(c: &mut Checker<'_>, defs: &Definitions) {
    let func = c.func;
    let dom = DominatorTree::build(func);
    let edges = handler_edges(c);
    let uses = Uses {
        defs,
        dom: &dom,
        edges: &edges,
    };

    for block in &func.blocks {
        for (index, instr) in block.instrs.iter().enumerate() {
            let location = Location::Instr {
                block: block.id,
                index,
            };
            for operand in instr.op.operands() {
                uses.check(c, operand, block.id, Some(index), location);
            }
        }
        if let Some(term) = &block.terminator {
            for operand in term.operands() {
                uses.check(c, operand, block.id, None, Location::Terminator(block.id));
            }
        }
    }
}

struct Uses<'a> {
    defs: &'a Definitions,
    dom: &'a DominatorTree,
    edges: &'a FxHashMap<(BlockId, BlockId), usize>,
}

impl Uses<'_> {
    /// `position` is the using instruction; `None` is the terminator.
    fn check(
        &self,
        c: &mut Checker<'_>,
        value: ValueId,
        block: BlockId,
        position: Option<usize>,
        location: Location,
    ) {
        let Some(def) = self.defs.get(value.index()).copied().flatten() else {
            c.fail(ErrorCode::E3001, location, format!("{value} is used but never defined"));
            return;
        };
        match def {
            Def::Param(def_block) => {
                if !self.dom.dominates(def_block, block) {
                    c.fail(
                        ErrorCode::E3002,
                        location,
                        format!("{value} (parameter of {def_block}) does not dominate this use"),
                    );
                }
            }
            Def::Instr {
                block: def_block,
                index,
            } if def_block == block => {
                if position.is_some_and(|p| p <= index) {
                    c.fail(ErrorCode::E3002, location, format!("{value} is used before its definition"));
                }
            }
            Def::Instr {
                block: def_block,
                index,
            } => {
                if !self.dom.dominates(def_block, block) {
                    c.fail(
                        ErrorCode::E3002,
                        location,
                        format!("{value} (defined in {def_block}) does not dominate this use"),
                    );
                } else if self.edges.get(&(block, def_block)).is_some_and(|&edge| edge <= index) {
                    c.fail(
                        ErrorCode::E3002,
                        location,
                        format!("{value} is defined in {def_block} after its edge to this handler"),
                    );
                }
            }
        }
    }
}
