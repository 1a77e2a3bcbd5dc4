//! Scoped native resources (binary builders).
//!
//! A resource is opened by an `ACQUIRES` operation and closed by the
//! `RELEASES` operation that takes it as first operand. None may be open
//! where the process can suspend or where the function returns. Exceptional
//! edges carry nothing: the raising operation discards the open resources.

use ember_diagnostic::ErrorCode;
use ember_mir::{graph, Block, OpEffects, Terminator, ValueId};
use rustc_hash::FxHashSet;

use crate::check::Checker;
use crate::error::Location;

type Open = FxHashSet<ValueId>;

pub(crate) fn check(c: &mut Checker<'_>) {
    let func = c.func;
    let order = graph::reverse_postorder(func);
    let mut open_at: Vec<Open> = vec![Open::default(); func.blocks.len()];

    // May-be-open sets only grow, so this terminates.
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &order {
            let block = &func.blocks[id.index()];
            let mut open = open_at[id.index()].clone();
            walk(block, &mut open, &mut |_, _| {});
            for target in block.terminator.iter().flat_map(Terminator::successors) {
                let before = open_at[target.index()].len();
                open_at[target.index()].extend(open.iter().copied());
                changed |= open_at[target.index()].len() != before;
            }
        }
    }

    for &id in &order {
        let block = &func.blocks[id.index()];
        let mut open = open_at[id.index()].clone();
        walk(block, &mut open, &mut |location, message| {
            c.fail(ErrorCode::E3007, location, message);
        });
    }
}

fn walk(block: &Block, open: &mut Open, report: &mut dyn FnMut(Location, String)) {
    for (index, instr) in block.instrs.iter().enumerate() {
        let location = Location::Instr {
            block: block.id,
            index,
        };
        let effects = instr.op.signature().effects;
        if effects.contains(OpEffects::RELEASES) {
            if let Some(&resource) = instr.op.operands().first() {
                if !open.remove(&resource) {
                    report(location, format!("{resource} is released but not open"));
                }
            }
        }
        if effects.contains(OpEffects::MAY_SUSPEND) && !open.is_empty() {
            report(location, format!("{} open across a suspension", describe(open)));
        }
        if effects.contains(OpEffects::ACQUIRES) {
            open.extend(instr.op.results());
        }
    }

    let Some(term) = &block.terminator else {
        return;
    };
    if open.is_empty() {
        return;
    }
    let location = Location::Terminator(block.id);
    match term {
        Terminator::ReceiveWait { .. } => {
            report(location, format!("{} open across a receive wait", describe(open)));
        }
        Terminator::Return { .. } => report(location, format!("{} open at return", describe(open))),
        _ => {}
    }
}

fn describe(open: &Open) -> String {
    let mut values: Vec<ValueId> = open.iter().copied().collect();
    values.sort_unstable();
    let list: Vec<String> = values.iter().map(ToString::to_string).collect();
    list.join(", ")
}
