use ember_mir::{FuncId, ValueClass, ValueId};
use ember_term::Term;

use crate::error::EvalError;

/// Contents of one SSA slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Val {
    /// Not yet defined on this path.
    Undef,
    Term(Term),
    /// Native integer of any width; `i1` is 0 or 1.
    Int(i64),
    /// Open binary builder, an index into the process's builders.
    Builder(usize),
    /// The process's open receive.
    Receive,
    /// Code pointer of a lifted function.
    Code(FuncId),
}

impl Val {
    pub(crate) fn bool(value: bool) -> Val {
        Val::Int(i64::from(value))
    }
}

/// SSA slots of one activation.
#[derive(Clone, Debug)]
pub(crate) struct Slots(Vec<Val>);

impl Slots {
    pub(crate) fn new(count: usize) -> Self {
        Slots(vec![Val::Undef; count])
    }

    pub(crate) fn get(&self, value: ValueId) -> Val {
        self.0.get(value.index()).copied().unwrap_or(Val::Undef)
    }

    pub(crate) fn set(&mut self, value: ValueId, val: Val) {
        if let Some(slot) = self.0.get_mut(value.index()) {
            *slot = val;
        }
    }

    pub(crate) fn term(&self, value: ValueId) -> Result<Term, EvalError> {
        match self.get(value) {
            Val::Term(term) => Ok(term),
            _ => Err(EvalError::BadValue {
                value,
                expected: ValueClass::Term,
            }),
        }
    }

    pub(crate) fn terms(&self, values: &[ValueId]) -> Result<Vec<Term>, EvalError> {
        values.iter().map(|&v| self.term(v)).collect()
    }

    pub(crate) fn int(&self, value: ValueId) -> Result<i64, EvalError> {
        match self.get(value) {
            Val::Int(int) => Ok(int),
            _ => Err(EvalError::BadValue {
                value,
                expected: ValueClass::I64,
            }),
        }
    }

    pub(crate) fn flag(&self, value: ValueId) -> Result<bool, EvalError> {
        self.int(value).map(|v| v != 0)
    }

    pub(crate) fn native(&self, value: ValueId) -> Result<Val, EvalError> {
        match self.get(value) {
            v @ (Val::Builder(_) | Val::Receive | Val::Code(_)) => Ok(v),
            _ => Err(EvalError::BadValue {
                value,
                expected: ValueClass::Native,
            }),
        }
    }
}
