use ember_ir::Name;
use ember_term::{LiteralPool, LiteralValue};

use crate::function::{Function, FunctionOrigin};
use crate::ids::FuncId;

/// A compiled module: functions addressed by [`FuncId`] plus the literal
/// pool their `ConstTerm`s refer to.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: Name,
    pub functions: Vec<Function>,
    pub literals: LiteralPool,
}

impl Module {
    pub fn new(name: Name) -> Self {
        Module {
            name,
            functions: Vec::new(),
            literals: LiteralPool::new(),
        }
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId::new(u32::try_from(self.functions.len()).unwrap_or(u32::MAX));
        self.functions.push(function);
        id
    }

    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId::new(u32::try_from(i).unwrap_or(u32::MAX)), f))
    }

    /// Source function `name/arity`.
    pub fn find(&self, name: Name, arity: u32) -> Option<FuncId> {
        self.iter()
            .find(|(_, f)| f.name == name && f.arity == arity && f.origin == FunctionOrigin::Source)
            .map(|(id, _)| id)
    }

    /// Atoms the module mentions, in interning order.
    pub fn atoms(&self) -> Vec<Name> {
        let mut atoms: Vec<Name> = self
            .literals
            .iter()
            .filter_map(|(_, v)| match v {
                LiteralValue::Atom(name) => Some(*name),
                _ => None,
            })
            .collect();
        atoms.push(self.name);
        atoms.extend(self.functions.iter().map(|f| f.name));
        atoms.sort_by_key(|n| n.raw());
        atoms.dedup();
        atoms
    }
}
