//! Operand and result classes against [`Op::signature`], and block
//! arguments against block parameters.

use ember_diagnostic::ErrorCode;
use ember_mir::{Block, BlockId, Expect, Op, Terminator, ValueClass, ValueId};

use crate::check::Checker;
use crate::error::Location;

pub(crate) fn check(c: &mut Checker<'_>) {
    let func = c.func;
    for block in &func.blocks {
        for (index, instr) in block.instrs.iter().enumerate() {
            let location = Location::Instr {
                block: block.id,
                index,
            };
            let mnemonic = instr.op.mnemonic();
            let signature = instr.op.signature();

            let operands = instr.op.operands();
            if operands.len() == signature.arity() {
                for (n, (&value, &expect)) in operands.iter().zip(&signature.operands).enumerate() {
                    expect_class(c, value, expect, location, || format!("operand {n} of {mnemonic}"));
                }
            } else {
                c.fail(
                    ErrorCode::E3004,
                    location,
                    format!(
                        "{mnemonic} takes {} operands, found {}",
                        signature.arity(),
                        operands.len()
                    ),
                );
            }
            for (&value, &class) in instr.op.results().iter().zip(&signature.results) {
                expect_class(c, value, Expect::Exactly(class), location, || {
                    format!("result of {mnemonic}")
                });
            }

            if let Op::RuntimeCall { func: runtime, .. } = &instr.op {
                if !runtime.callable_from_mir() {
                    c.fail(
                        ErrorCode::E3004,
                        location,
                        format!("{} is reserved for the emitter", runtime.symbol()),
                    );
                }
            }
            if instr.handler.is_some() && !signature.may_raise() {
                c.fail(
                    ErrorCode::E3005,
                    location,
                    format!("{mnemonic} cannot raise but names a handler"),
                );
            }
        }

        if let Some(term) = &block.terminator {
            check_terminator(c, block, term);
        }
    }
}

fn check_terminator(c: &mut Checker<'_>, block: &Block, term: &Terminator) {
    let func = c.func;
    let location = Location::Terminator(block.id);
    if let Some(expectations) = term.operand_expectations() {
        for (&value, expect) in term.operands().iter().zip(expectations) {
            expect_class(c, value, expect, location, || "terminator operand".to_owned());
        }
    }

    match term {
        Terminator::Jump { target, args } => jump_args(c, location, *target, args),
        Terminator::MapLookup { found, absent, .. } => {
            if let Some(found) = func.block(*found) {
                let ok = matches!(
                    found.params.as_slice(),
                    [value] if func.value_class(*value) == Some(ValueClass::Term)
                );
                if !ok {
                    c.fail(
                        ErrorCode::E3009,
                        location,
                        format!("{} must take the looked-up value as its only parameter", found.id),
                    );
                }
            }
            no_params(c, location, *absent);
        }
        Terminator::Raise { .. } => {}
        other => {
            for target in other.successors() {
                no_params(c, location, target);
            }
        }
    }
}

fn jump_args(c: &mut Checker<'_>, location: Location, target: BlockId, args: &[ValueId]) {
    let func = c.func;
    let Some(block) = func.block(target) else {
        return;
    };
    if block.params.len() != args.len() {
        c.fail(
            ErrorCode::E3009,
            location,
            format!(
                "{target} takes {} arguments, jump passes {}",
                block.params.len(),
                args.len()
            ),
        );
        return;
    }
    for (n, (&arg, &param)) in args.iter().zip(&block.params).enumerate() {
        let (Some(have), Some(want)) = (func.value_class(arg), func.value_class(param)) else {
            continue;
        };
        if have != want {
            c.fail(
                ErrorCode::E3009,
                location,
                format!("argument {n} to {target} is {have}, parameter is {want}"),
            );
        }
    }
}

fn no_params(c: &mut Checker<'_>, location: Location, target: BlockId) {
    if c.func.block(target).is_some_and(|b| !b.params.is_empty()) {
        c.fail(
            ErrorCode::E3009,
            location,
            format!("{target} has parameters but is not a jump target"),
        );
    }
}

fn expect_class(
    c: &mut Checker<'_>,
    value: ValueId,
    expect: Expect,
    location: Location,
    what: impl FnOnce() -> String,
) {
    match c.func.value_class(value) {
        Some(class) if expect.admits(class) => {}
        Some(class) => c.fail(
            ErrorCode::E3004,
            location,
            format!("{} {value} is {class}, expected {expect}", what()),
        ),
        // Reported by the definition check.
        None => {}
    }
}
