//! Module-level pool of constant terms.
//!
//! Lowering interns every literal the program mentions. Immediates (small
//! integers, atoms, `[]`) encode straight into the instruction stream; the
//! rest become read-only boxed data the backend places in the module image.

use crate::encoding::Term;
use crate::heap::Heap;
use ember_ir::Name;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use std::fmt;

/// Index of a literal in its module's pool.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LiteralId(u32);

impl LiteralId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        LiteralId(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LiteralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lit{}", self.0)
    }
}

/// A constant term. Floats are stored as bits so literals hash and dedupe.
///
/// `BigInt` only holds values outside `i64`; [`LiteralPool::integer`] keeps
/// every other integer in `Int`, so each value has one literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Int(i64),
    BigInt(BigInt),
    Float { bits: u64 },
    Atom(Name),
    Nil,
    Tuple(Vec<LiteralId>),
    Cons { head: LiteralId, tail: LiteralId },
    Binary { bits: u64, bytes: Vec<u8> },
    Map(Vec<(LiteralId, LiteralId)>),
}

impl LiteralValue {
    pub fn float(value: f64) -> Self {
        LiteralValue::Float {
            bits: value.to_bits(),
        }
    }
}

/// Deduplicating literal pool owned by a module.
#[derive(Clone, Debug, Default)]
pub struct LiteralPool {
    values: Vec<LiteralValue>,
    index: FxHashMap<LiteralValue, LiteralId>,
}

impl LiteralPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `value`, returning the existing id for an equal literal.
    pub fn intern(&mut self, value: LiteralValue) -> LiteralId {
        if let Some(&id) = self.index.get(&value) {
            return id;
        }
        let id = LiteralId(u32::try_from(self.values.len()).unwrap_or(u32::MAX));
        self.values.push(value.clone());
        self.index.insert(value, id);
        id
    }

    pub fn int(&mut self, value: i64) -> LiteralId {
        self.intern(LiteralValue::Int(value))
    }

    pub fn integer(&mut self, value: &BigInt) -> LiteralId {
        match i64::try_from(value) {
            Ok(small) => self.int(small),
            Err(_) => self.intern(LiteralValue::BigInt(value.clone())),
        }
    }

    pub fn atom(&mut self, name: Name) -> LiteralId {
        self.intern(LiteralValue::Atom(name))
    }

    pub fn nil(&mut self) -> LiteralId {
        self.intern(LiteralValue::Nil)
    }

    pub fn get(&self, id: LiteralId) -> Option<&LiteralValue> {
        self.values.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LiteralId, &LiteralValue)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (LiteralId(u32::try_from(i).unwrap_or(u32::MAX)), v))
    }

    /// Word encoding when the literal needs no heap data.
    pub fn encode_immediate(&self, id: LiteralId) -> Option<Term> {
        match self.get(id)? {
            LiteralValue::Int(v) => Term::small_int(*v),
            LiteralValue::Atom(name) => Some(Term::atom(*name)),
            LiteralValue::Nil => Some(Term::NIL),
            _ => None,
        }
    }

    pub fn is_immediate(&self, id: LiteralId) -> bool {
        self.encode_immediate(id).is_some()
    }

    /// Build the literal on `heap`. Unknown ids materialize as `NONE`.
    pub fn materialize(&self, id: LiteralId, heap: &mut Heap) -> Term {
        if let Some(term) = self.encode_immediate(id) {
            return term;
        }
        let Some(value) = self.get(id) else {
            return Term::NONE;
        };
        match value {
            LiteralValue::Int(v) => heap.integer(*v),
            LiteralValue::BigInt(v) => heap.integer(v.clone()),
            LiteralValue::Float { bits } => heap.float(f64::from_bits(*bits)),
            LiteralValue::Atom(name) => Term::atom(*name),
            LiteralValue::Nil => Term::NIL,
            LiteralValue::Tuple(elements) => {
                let terms: Vec<Term> = elements.iter().map(|&e| self.materialize(e, heap)).collect();
                heap.tuple(&terms)
            }
            LiteralValue::Cons { head, tail } => {
                let head = self.materialize(*head, heap);
                let tail = self.materialize(*tail, heap);
                heap.cons(head, tail)
            }
            LiteralValue::Binary { bits, bytes } => heap.bitstring(bytes, *bits),
            LiteralValue::Map(entries) => {
                let terms: Vec<(Term, Term)> = entries
                    .iter()
                    .map(|&(k, v)| (self.materialize(k, heap), self.materialize(v, heap)))
                    .collect();
                heap.map(&terms)
            }
        }
    }
}
