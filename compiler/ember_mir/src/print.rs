//! Textual rendering of MIR for diagnostics, logs and tests.
//!
//! ```text
//! function area/1 {
//! bb0(%0: term):
//!     %1: i1 = is_kind tuple %0
//!     branch %1, bb1, bb2
//! ...
//! }
//! ```

use std::fmt::{self, Write as _};

use ember_ir::StringLookup;

use crate::function::{Block, Function};
use crate::module::Module;
use crate::op::{Op, SpawnTarget};
use crate::terminator::{RaiseKind, Terminator};

/// `Display` adapter for a [`Function`].
pub struct FunctionPrinter<'a> {
    func: &'a Function,
    names: &'a dyn StringLookup,
}

impl<'a> FunctionPrinter<'a> {
    pub fn new(func: &'a Function, names: &'a dyn StringLookup) -> Self {
        FunctionPrinter { func, names }
    }
}

/// `Display` adapter for a [`Module`].
pub struct ModulePrinter<'a> {
    module: &'a Module,
    names: &'a dyn StringLookup,
}

impl<'a> ModulePrinter<'a> {
    pub fn new(module: &'a Module, names: &'a dyn StringLookup) -> Self {
        ModulePrinter { module, names }
    }
}

impl Function {
    pub fn display<'a>(&'a self, names: &'a dyn StringLookup) -> FunctionPrinter<'a> {
        FunctionPrinter::new(self, names)
    }
}

impl Module {
    pub fn display<'a>(&'a self, names: &'a dyn StringLookup) -> ModulePrinter<'a> {
        ModulePrinter::new(self, names)
    }
}

impl fmt::Display for ModulePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.names.lookup(self.module.name))?;
        for (id, func) in self.module.iter() {
            writeln!(f)?;
            writeln!(f, "; {id}")?;
            FunctionPrinter::new(func, self.names).fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for FunctionPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.func;
        writeln!(
            f,
            "function {}/{} {{",
            self.names.lookup(func.name),
            func.arity
        )?;
        for block in &func.blocks {
            self.fmt_block(f, block)?;
        }
        writeln!(f, "}}")
    }
}

impl FunctionPrinter<'_> {
    fn typed(&self, value: crate::ValueId) -> String {
        match self.func.value_class(value) {
            Some(class) => format!("{value}: {class}"),
            None => format!("{value}: ?"),
        }
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, block: &Block) -> fmt::Result {
        let params: Vec<String> = block.params.iter().map(|&p| self.typed(p)).collect();
        if params.is_empty() {
            writeln!(f, "{}:", block.id)?;
        } else {
            writeln!(f, "{}({}):", block.id, params.join(", "))?;
        }
        for instr in &block.instrs {
            let mut line = String::new();
            let results: Vec<String> = instr.op.results().iter().map(|&r| self.typed(r)).collect();
            if !results.is_empty() {
                let _ = write!(line, "{} = ", results.join(", "));
            }
            line.push_str(instr.op.mnemonic());
            let attrs = self.attrs(&instr.op);
            if !attrs.is_empty() {
                line.push(' ');
                line.push_str(&attrs);
            }
            let operands = join(instr.op.operands().iter());
            if !operands.is_empty() {
                line.push(' ');
                line.push_str(&operands);
            }
            if let Some(h) = instr.handler {
                let _ = write!(line, " unwind {h}");
            }
            writeln!(f, "    {line}")?;
        }
        match &block.terminator {
            Some(term) => writeln!(f, "    {}", self.terminator(term)),
            None => writeln!(f, "    <unterminated>"),
        }
    }

    fn attrs(&self, op: &Op) -> String {
        let names = self.names;
        match op {
            Op::ConstInt { width, value, .. } => format!("i{} {value}", width.bits()),
            Op::ConstTerm { literal, .. } => literal.to_string(),
            Op::IsKind { kind, .. } => kind.name().to_owned(),
            Op::CheckedArith { op, .. } => op.as_str().to_owned(),
            Op::IntCmp { pred, .. } => pred.as_str().to_owned(),
            Op::IntBitwise { op, .. } => op.as_str().to_owned(),
            Op::RuntimeCall { func, .. } => func.symbol().to_owned(),
            Op::Call { callee, .. } => callee.to_string(),
            Op::CallExternal {
                module, function, ..
            } => format!("{}:{}", names.lookup(*module), names.lookup(*function)),
            Op::BinaryPut { spec, .. } => format!("{:?}/unit:{}", spec.ty, spec.unit),
            Op::GetTupleElement { index, .. }
            | Op::BinarySegment { index, .. }
            | Op::GetEnv { index, .. } => index.to_string(),
            Op::BinaryMatch { shape, .. } => shape.to_string(),
            Op::TryEnter { handler } => handler.to_string(),
            Op::MakeClosure {
                function, arity, ..
            } => format!("{function}/{arity}"),
            Op::Spawn {
                target: SpawnTarget::Direct(function),
                ..
            } => function.to_string(),
            _ => String::new(),
        }
    }

    fn terminator(&self, term: &Terminator) -> String {
        match term {
            Terminator::Return { value } => format!("return {value}"),
            Terminator::Jump { target, args } => {
                if args.is_empty() {
                    format!("jump {target}")
                } else {
                    format!("jump {target}({})", join(args.iter()))
                }
            }
            Terminator::Branch {
                cond,
                then_block,
                else_block,
            } => format!("branch {cond}, {then_block}, {else_block}"),
            Terminator::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let arms: Vec<String> = cases.iter().map(|(v, b)| format!("{v} => {b}")).collect();
                format!("switch {scrutinee} [{}], default {default}", arms.join(", "))
            }
            Terminator::MapLookup {
                map,
                key,
                found,
                absent,
            } => format!("map_lookup {map}, {key}, found {found}, absent {absent}"),
            Terminator::ReceiveWait {
                ctx,
                message,
                timeout,
            } => format!("receive_wait {ctx}, message {message}, timeout {timeout}"),
            Terminator::Raise { kind, handler } => {
                let mut s = match kind {
                    RaiseKind::New { class, reason } => format!("raise {class} {reason}"),
                    RaiseKind::Rethrow { exception } => format!("rethrow {exception}"),
                };
                if let Some(h) = handler {
                    let _ = write!(s, " unwind {h}");
                }
                s
            }
            Terminator::CatchDispatch {
                exception,
                cases,
                otherwise,
            } => {
                let arms: Vec<String> = cases.iter().map(|(c, b)| format!("{c} => {b}")).collect();
                format!(
                    "catch_dispatch {exception} [{}], otherwise {otherwise}",
                    arms.join(", ")
                )
            }
            Terminator::Unreachable => "unreachable".to_owned(),
        }
    }
}

fn join<'v>(values: impl Iterator<Item = &'v crate::ValueId>) -> String {
    values.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
