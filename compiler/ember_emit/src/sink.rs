//! The backend boundary.

use std::fmt;

use ember_mir::{BinaryShape, FuncId};
use ember_term::{LiteralId, LiteralValue};

use crate::mach::{MachInstr, Slot};

/// What the backend needs before the first instruction of a function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionHeader {
    pub id: FuncId,
    /// `module:name/arity`.
    pub symbol: String,
    /// Slots of the entry block parameters, in calling-convention order.
    pub params: Vec<Slot>,
    /// Number of SSA slots; slots `0..slots` are in use.
    pub slots: u32,
    /// Binary match shapes, referenced by index from `__ember_bs_match`.
    pub shapes: Vec<BinaryShape>,
}

/// Receiver of emitted code.
///
/// Calls arrive in a fixed order: `begin_module`, every boxed literal,
/// then for each function in id order `begin_function`, its instructions
/// and `end_function`, and finally `end_module`.
pub trait BackendSink {
    fn begin_module(&mut self, name: &str);

    /// A literal that does not fit an immediate word.
    fn literal(&mut self, id: LiteralId, value: &LiteralValue);

    fn begin_function(&mut self, header: FunctionHeader);

    fn instr(&mut self, instr: MachInstr);

    fn end_function(&mut self);

    fn end_module(&mut self) {}
}

/// Code of one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmittedFunction {
    pub header: FunctionHeader,
    pub code: Vec<MachInstr>,
}

/// Everything the backend would have received, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmittedModule {
    pub name: String,
    pub literals: Vec<(LiteralId, LiteralValue)>,
    pub functions: Vec<EmittedFunction>,
}

impl EmittedModule {
    pub fn function(&self, symbol: &str) -> Option<&EmittedFunction> {
        self.functions.iter().find(|f| f.header.symbol == symbol)
    }

    pub fn instr_count(&self) -> usize {
        self.functions.iter().map(|f| f.code.len()).sum()
    }

    /// Feed the collected module to another sink.
    pub fn replay(&self, sink: &mut dyn BackendSink) {
        sink.begin_module(&self.name);
        for (id, value) in &self.literals {
            sink.literal(*id, value);
        }
        for function in &self.functions {
            sink.begin_function(function.header.clone());
            for instr in &function.code {
                sink.instr(instr.clone());
            }
            sink.end_function();
        }
        sink.end_module();
    }
}

impl fmt::Display for EmittedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "module {}", self.name)?;
        for (id, value) in &self.literals {
            writeln!(f, "{id} = {value:?}")?;
        }
        for function in &self.functions {
            let header = &function.header;
            writeln!(f)?;
            write!(f, "{} {}(", header.id, header.symbol)?;
            for (i, param) in header.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                param.fmt(f)?;
            }
            writeln!(f, ") slots={}", header.slots)?;
            for instr in &function.code {
                writeln!(f, "{instr}")?;
            }
        }
        Ok(())
    }
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    module: EmittedModule,
    current: Option<EmittedFunction>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> EmittedModule {
        self.module
    }
}

impl BackendSink for CollectingSink {
    fn begin_module(&mut self, name: &str) {
        self.module.name = name.to_owned();
    }

    fn literal(&mut self, id: LiteralId, value: &LiteralValue) {
        self.module.literals.push((id, value.clone()));
    }

    fn begin_function(&mut self, header: FunctionHeader) {
        self.current = Some(EmittedFunction {
            header,
            code: Vec::new(),
        });
    }

    fn instr(&mut self, instr: MachInstr) {
        if let Some(current) = &mut self.current {
            current.code.push(instr);
        }
    }

    fn end_function(&mut self) {
        if let Some(done) = self.current.take() {
            self.module.functions.push(done);
        }
    }
}
