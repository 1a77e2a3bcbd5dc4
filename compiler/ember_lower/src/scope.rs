//! Variable scopes for lowering.
//!
//! Source variables are single-assignment, so a scope only ever grows. Each
//! branch of a `case`, `if` or `receive` lowers in a clone of the scope
//! before it; at the merge, variables bound by every branch are exported
//! through block parameters of the merge block.

use ember_ir::Name;
use ember_mir::ValueId;
use rustc_hash::FxHashMap;

/// Name to SSA value bindings, remembering binding order.
#[derive(Clone, Debug, Default)]
pub struct LowerScope {
    bindings: FxHashMap<Name, ValueId>,
    order: Vec<Name>,
}

impl LowerScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`. Patterns turn already-bound variables into equality
    /// checks, so only `fun` heads rebind a name, shadowing the captured one.
    pub fn bind(&mut self, name: Name, value: ValueId) {
        if self.bindings.insert(name, value).is_none() {
            self.order.push(name);
        }
    }

    pub fn lookup(&self, name: Name) -> Option<ValueId> {
        self.bindings.get(&name).copied()
    }

    pub fn contains(&self, name: Name) -> bool {
        self.bindings.contains_key(&name)
    }

    /// Bindings in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = (Name, ValueId)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.bindings.get(name).map(|v| (*name, *v)))
    }
}

impl ember_match::Scope for LowerScope {
    fn is_bound(&self, name: Name) -> bool {
        self.contains(name)
    }
}

/// Variables every branch binds that `before` does not, in the first
/// branch's binding order.
pub(crate) fn exports(before: &LowerScope, branches: &[&LowerScope]) -> Vec<Name> {
    let Some((first, rest)) = branches.split_first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(name, _)| name)
        .filter(|name| !before.contains(*name) && rest.iter().all(|s| s.contains(*name)))
        .collect()
}
