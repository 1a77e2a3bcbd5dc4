//! Shape of the CFG: terminators, successor targets, entry, reachability.
//!
//! Later checks index blocks freely, so they only run when this one passes.

use ember_diagnostic::ErrorCode;
use ember_mir::graph;

use crate::check::Checker;
use crate::error::Location;

pub(crate) fn check(c: &mut Checker<'_>) {
    let func = c.func;
    let count = func.blocks.len();
    if count == 0 {
        c.fail(ErrorCode::E3003, Location::Function, "function has no blocks");
        return;
    }
    if func.entry.index() >= count {
        c.fail(
            ErrorCode::E3003,
            Location::Function,
            format!("entry {} does not exist", func.entry),
        );
        return;
    }

    for (index, block) in func.blocks.iter().enumerate() {
        if block.id.index() != index {
            c.fail(
                ErrorCode::E3003,
                Location::Block(block.id),
                format!("block is stored at index {index}"),
            );
        }
        if block.terminator.is_none() {
            c.fail(ErrorCode::E3003, Location::Block(block.id), "block is not terminated");
        }
        for target in graph::successors(block) {
            if target.index() >= count {
                c.fail(
                    ErrorCode::E3003,
                    Location::Terminator(block.id),
                    format!("successor {target} does not exist"),
                );
            }
        }
    }
    if !c.clean() {
        return;
    }

    let entry = &func.blocks[func.entry.index()];
    if entry.params != func.params {
        c.fail(
            ErrorCode::E3009,
            Location::Block(entry.id),
            "entry block parameters differ from the function parameters",
        );
    }
    let preds = graph::predecessors(func);
    if !preds[func.entry.index()].is_empty() {
        c.fail(
            ErrorCode::E3008,
            Location::Block(entry.id),
            "entry block has predecessors",
        );
    }
    for (block, reachable) in func.blocks.iter().zip(graph::reachable(func)) {
        if !reachable {
            c.fail(
                ErrorCode::E3008,
                Location::Block(block.id),
                "block is unreachable from the entry",
            );
        }
    }
}
