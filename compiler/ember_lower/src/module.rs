//! Module-wide lowering state: function slots, the literal pool, and the
//! functions lowering creates on the side (lifted closures, trampolines).

use ember_ir::{Name, Span, StringInterner};
use ember_mir::{ClosureEnv, FuncId, Function, FunctionBuilder, FunctionOrigin, Module, ValueClass};
use ember_term::{LiteralId, LiteralPool};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::SourceError;

/// The source function whose clauses are being lowered. Closures nested at
/// any depth inside it are named and numbered after it.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Enclosing {
    pub id: FuncId,
    pub name: Name,
    pub arity: u32,
}

pub(crate) struct ModuleCtx<'a> {
    pub interner: &'a StringInterner,
    pub name: Name,
    pub literals: LiteralPool,
    slots: Vec<Option<Function>>,
    index: FxHashMap<(Name, u32), FuncId>,
    trampolines: FxHashMap<FuncId, FuncId>,
    enclosing: Option<Enclosing>,
    next_fun: u32,
}

impl<'a> ModuleCtx<'a> {
    pub fn new(name: Name, interner: &'a StringInterner) -> Self {
        ModuleCtx {
            interner,
            name,
            literals: LiteralPool::new(),
            slots: Vec::new(),
            index: FxHashMap::default(),
            trampolines: FxHashMap::default(),
            enclosing: None,
            next_fun: 0,
        }
    }

    /// Reserve the slot of source function `name/arity`.
    pub fn declare(&mut self, name: Name, arity: u32, span: Span) -> Result<FuncId, SourceError> {
        if self.index.contains_key(&(name, arity)) {
            return Err(SourceError::DuplicateFunction { name, arity, span });
        }
        let id = self.reserve();
        self.index.insert((name, arity), id);
        Ok(id)
    }

    pub fn lookup(&self, name: Name, arity: u32) -> Option<FuncId> {
        self.index.get(&(name, arity)).copied()
    }

    /// A slot for a function built later.
    pub fn reserve(&mut self) -> FuncId {
        let id = FuncId::new(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        self.slots.push(None);
        id
    }

    pub fn install(&mut self, id: FuncId, function: Function) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = Some(function);
        }
    }

    pub fn begin_source_function(&mut self, enclosing: Enclosing) {
        self.enclosing = Some(enclosing);
        self.next_fun = 0;
    }

    pub fn enclosing(&self) -> Option<Enclosing> {
        self.enclosing
    }

    /// Name and index of the next `fun` lifted out of the current source
    /// function: `-{name}/{arity}-fun-{index}-`.
    pub fn next_closure_name(&mut self) -> Result<(Name, u32), SourceError> {
        let Some(enclosing) = self.enclosing else {
            return Err(SourceError::internal("fun outside of any function"));
        };
        let index = self.next_fun;
        self.next_fun += 1;
        let name = format!(
            "-{}/{}-fun-{index}-",
            self.interner.lookup(enclosing.name),
            enclosing.arity
        );
        Ok((self.interner.intern(&name), index))
    }

    pub fn atom(&mut self, text: &str) -> LiteralId {
        let name = self.interner.intern(text);
        self.literals.atom(name)
    }

    /// The adapter that makes `fun name/arity` callable as a closure. One
    /// per target, built on first use.
    pub fn trampoline(&mut self, target: FuncId, name: Name, arity: u32) -> FuncId {
        if let Some(&id) = self.trampolines.get(&target) {
            return id;
        }
        let label = format!("-{}/{arity}-ref-", self.interner.lookup(name));
        let mut builder = FunctionBuilder::new(self.interner.intern(&label), arity, Span::DUMMY);
        builder.set_origin(FunctionOrigin::Trampoline { target });
        builder.set_env(ClosureEnv::default());
        builder.add_param(ValueClass::Term);
        let args = (0..arity).map(|_| builder.add_param(ValueClass::Term)).collect();
        let result = builder.call(target, args);
        builder.ret(result);

        let id = self.reserve();
        self.install(id, builder.finish());
        self.trampolines.insert(target, id);
        trace!(target = target.raw(), trampoline = id.raw(), "built trampoline");
        id
    }

    /// Assemble the module. Every reserved slot must have been filled.
    pub fn finish(self) -> Result<Module, SourceError> {
        let mut module = Module::new(self.name);
        module.literals = self.literals;
        for (index, slot) in self.slots.into_iter().enumerate() {
            let Some(function) = slot else {
                return Err(SourceError::internal(format!("function slot {index} never filled")));
            };
            module.add_function(function);
        }
        Ok(module)
    }
}
