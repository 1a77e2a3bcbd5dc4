//! Exception handlers and try regions.
//!
//! Handler blocks take the exception term as their only parameter and are
//! entered only through exceptional edges. The stack of open try regions
//! is tracked through the CFG: `TryEnter` pushes its handler, `TryExit`
//! pops, and every block must be entered with the same stack from all of
//! its predecessors. An edge to a try handler closes that region and every
//! region nested in it; an edge to any other handler (a guard's) keeps the
//! stack as it is.

use ember_diagnostic::ErrorCode;
use ember_mir::{graph, BlockId, Function, Op, Terminator, ValueClass};
use rustc_hash::FxHashSet;

use crate::check::Checker;
use crate::error::Location;

pub(crate) fn check(c: &mut Checker<'_>) {
    let func = c.func;
    let mut handlers: Vec<BlockId> = func
        .blocks
        .iter()
        .flat_map(graph::exceptional_successors)
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    handlers.sort_unstable();

    for &handler in &handlers {
        let Some(block) = func.block(handler) else {
            continue;
        };
        let shaped = matches!(
            block.params.as_slice(),
            [exception] if func.value_class(*exception) == Some(ValueClass::Term)
        );
        if !shaped {
            c.fail(
                ErrorCode::E3005,
                Location::Block(handler),
                "handler must take the exception term as its only parameter",
            );
        }
    }
    for block in &func.blocks {
        let Some(term) = &block.terminator else {
            continue;
        };
        for target in term.successors() {
            if handlers.binary_search(&target).is_ok() {
                c.fail(
                    ErrorCode::E3005,
                    Location::Terminator(block.id),
                    format!("{target} is a handler but is reached by a normal edge"),
                );
            }
        }
    }

    Regions::new(func).run(c);
}

struct Regions<'f> {
    func: &'f Function,
    /// Handlers opened by a `TryEnter`.
    try_handlers: FxHashSet<BlockId>,
    /// Open regions on entry to each block, innermost last.
    entry: Vec<Option<Vec<BlockId>>>,
    work: Vec<BlockId>,
}

impl<'f> Regions<'f> {
    fn new(func: &'f Function) -> Self {
        let try_handlers = func
            .blocks
            .iter()
            .flat_map(|b| b.instrs.iter().filter_map(|i| i.op.block_ref()))
            .collect();
        Regions {
            func,
            try_handlers,
            entry: vec![None; func.blocks.len()],
            work: Vec::new(),
        }
    }

    fn run(mut self, c: &mut Checker<'_>) {
        let func = self.func;
        self.entry[func.entry.index()] = Some(Vec::new());
        self.work.push(func.entry);
        while let Some(id) = self.work.pop() {
            let Some(mut stack) = self.entry[id.index()].clone() else {
                continue;
            };
            let block = &func.blocks[id.index()];

            for (index, instr) in block.instrs.iter().enumerate() {
                let location = Location::Instr { block: id, index };
                match &instr.op {
                    Op::TryEnter { handler } => {
                        self.flow(c, location, *handler, stack.clone());
                        stack.push(*handler);
                    }
                    Op::TryExit => {
                        if stack.pop().is_none() {
                            c.fail(ErrorCode::E3006, location, "try_exit outside of a try region");
                        }
                    }
                    _ => {}
                }
                if !instr.op.may_raise() {
                    continue;
                }
                match instr.handler {
                    Some(handler) => self.raise_to(c, location, handler, &stack),
                    None if !stack.is_empty() => c.fail(
                        ErrorCode::E3005,
                        location,
                        format!("{} inside a try region has no handler", instr.op.mnemonic()),
                    ),
                    None => {}
                }
            }

            let Some(term) = &block.terminator else {
                continue;
            };
            let location = Location::Terminator(id);
            match term {
                Terminator::Return { .. } if !stack.is_empty() => {
                    c.fail(ErrorCode::E3006, location, "return inside a try region");
                }
                Terminator::Raise {
                    handler: Some(handler),
                    ..
                } => self.raise_to(c, location, *handler, &stack),
                Terminator::Raise { handler: None, .. } if !stack.is_empty() => {
                    c.fail(ErrorCode::E3005, location, "raise inside a try region has no handler");
                }
                _ => {}
            }
            for target in term.successors() {
                self.flow(c, location, target, stack.clone());
            }
        }
    }

    fn raise_to(&mut self, c: &mut Checker<'_>, location: Location, handler: BlockId, stack: &[BlockId]) {
        if !self.try_handlers.contains(&handler) {
            self.flow(c, location, handler, stack.to_vec());
            return;
        }
        match stack.iter().rposition(|&open| open == handler) {
            Some(depth) => self.flow(c, location, handler, stack[..depth].to_vec()),
            None => c.fail(
                ErrorCode::E3006,
                location,
                format!("raises to {handler}, whose region is not open"),
            ),
        }
    }

    fn flow(&mut self, c: &mut Checker<'_>, location: Location, target: BlockId, stack: Vec<BlockId>) {
        let Some(slot) = self.entry.get_mut(target.index()) else {
            return;
        };
        match slot {
            None => {
                *slot = Some(stack);
                self.work.push(target);
            }
            Some(existing) if *existing != stack => c.fail(
                ErrorCode::E3006,
                location,
                format!("{target} is entered with different open try regions from different predecessors"),
            ),
            Some(_) => {}
        }
    }
}
