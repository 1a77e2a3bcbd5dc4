//! Reference layout of boxed objects.
//!
//! `Heap` is a flat word arena. Byte address `i * WORD_BYTES` is word `i`;
//! word 0 is reserved so no object lives at address zero. The compiler never
//! allocates here; the interpreter and the tests do, and the layouts match
//! what the emitter's inline loads assume (header at offset 0, payload at
//! offset `WORD_BYTES`).

use crate::encoding::{tag_of, PrimitiveTag, Term, WORD_BYTES};
use crate::header::{BoxedKind, Header};
use crate::kind::TermKind;
use ember_ir::StringLookup;
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use std::cmp::Ordering;
use std::fmt::Write as _;

/// Shape a caller expects when unboxing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExpectedShape {
    Tuple,
    Cons,
    Map,
    Binary,
    Float,
    BigInt,
    Closure,
    Pid,
}

impl ExpectedShape {
    pub const fn term_kind(self) -> TermKind {
        match self {
            ExpectedShape::Tuple => TermKind::Tuple,
            ExpectedShape::Cons => TermKind::Cons,
            ExpectedShape::Map => TermKind::Map,
            ExpectedShape::Binary => TermKind::Binary,
            ExpectedShape::Float => TermKind::Float,
            ExpectedShape::BigInt => TermKind::BigInt,
            ExpectedShape::Closure => TermKind::Closure,
            ExpectedShape::Pid => TermKind::Pid,
        }
    }
}

/// Failure of [`Heap::unbox_as`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TypeMismatch {
    #[error("expected {expected:?}, found {found:?}")]
    WrongKind {
        expected: ExpectedShape,
        found: TermKind,
    },
    #[error("term {raw:#x} does not point at a live object")]
    Dangling { raw: u64 },
}

/// Typed, borrowed view of a boxed object or cons cell.
#[derive(Clone, Debug, PartialEq)]
pub enum View<'h> {
    Tuple(&'h [Term]),
    Cons { head: Term, tail: Term },
    Map(MapView<'h>),
    Binary(BinaryView<'h>),
    Float(f64),
    BigInt(BigInt),
    Closure(ClosureView<'h>),
    Pid(u64),
}

/// Map entries in canonical (term-ordered, duplicate-free) key order.
#[derive(Clone, Debug, PartialEq)]
pub struct MapView<'h> {
    entries: &'h [Term],
}

impl<'h> MapView<'h> {
    pub fn len(&self) -> usize {
        self.entries.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Term, Term)> + 'h {
        self.entries.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Packed bit payload of a binary.
#[derive(Clone, Debug, PartialEq)]
pub struct BinaryView<'h> {
    bits: u64,
    words: &'h [Term],
}

impl BinaryView<'_> {
    pub fn bit_len(&self) -> u64 {
        self.bits
    }

    pub fn is_byte_aligned(&self) -> bool {
        self.bits % 8 == 0
    }

    /// Payload bytes; a trailing partial byte keeps its bits in the high end.
    pub fn bytes(&self) -> Vec<u8> {
        let len = usize::try_from(self.bits.div_ceil(8)).unwrap_or(usize::MAX);
        self.words
            .iter()
            .flat_map(|word| word.raw().to_le_bytes())
            .take(len)
            .collect()
    }
}

/// A closure: lifted function index, its user-visible arity, and the
/// captured environment.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosureView<'h> {
    pub function: u32,
    pub arity: u32,
    pub env: &'h [Term],
}

/// Numeric value of an integer or float term.
#[derive(Clone, Debug, PartialEq)]
pub enum Number {
    Int(BigInt),
    Float(f64),
}

impl Number {
    /// Nearest float; integers beyond the float range become infinities.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => v.to_f64().unwrap_or(match v.sign() {
                Sign::Minus => f64::NEG_INFINITY,
                _ => f64::INFINITY,
            }),
            Number::Float(v) => *v,
        }
    }
}

/// Two's complement limbs of `value`, least significant first, with no
/// more limbs than the sign needs.
fn limbs_of(value: &BigInt) -> Vec<u64> {
    let fill = if value.sign() == Sign::Minus { 0xFF } else { 0 };
    value
        .to_signed_bytes_le()
        .chunks(8)
        .map(|chunk| {
            let mut word = [fill; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect()
}

fn from_limbs(limbs: &[Term]) -> BigInt {
    let bytes: Vec<u8> = limbs.iter().flat_map(|limb| limb.raw().to_le_bytes()).collect();
    BigInt::from_signed_bytes_le(&bytes)
}

/// Word arena holding boxed objects and cons cells.
#[derive(Clone, Debug)]
pub struct Heap {
    words: Vec<Term>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "heap indices come from Vec lengths and fit in usize"
)]
fn index_of(addr: u64) -> usize {
    (addr / WORD_BYTES) as usize
}

fn addr_of(index: usize) -> u64 {
    index as u64 * WORD_BYTES
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            words: vec![Term::from_raw(0)],
        }
    }

    /// Words in use, including the reserved null word.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.len() <= 1
    }

    fn push_object(&mut self, header: Header, payload: impl IntoIterator<Item = Term>) -> Term {
        let index = self.words.len();
        self.words.push(Term::from_raw(header.raw()));
        self.words.extend(payload);
        Term::from_boxed_addr(addr_of(index))
    }

    // ── Allocation ──────────────────────────────────────────────

    pub fn tuple(&mut self, elements: &[Term]) -> Term {
        self.push_object(
            Header::new(BoxedKind::Tuple, elements.len() as u64),
            elements.iter().copied(),
        )
    }

    pub fn cons(&mut self, head: Term, tail: Term) -> Term {
        let index = self.words.len();
        self.words.push(head);
        self.words.push(tail);
        Term::from_list_addr(addr_of(index))
    }

    /// Proper list of `elements`.
    pub fn list(&mut self, elements: &[Term]) -> Term {
        self.list_with_tail(elements, Term::NIL)
    }

    pub fn list_with_tail(&mut self, elements: &[Term], tail: Term) -> Term {
        elements
            .iter()
            .rev()
            .fold(tail, |acc, &head| self.cons(head, acc))
    }

    pub fn float(&mut self, value: f64) -> Term {
        self.push_object(
            Header::new(BoxedKind::Float, 1),
            [Term::from_raw(value.to_bits())],
        )
    }

    /// Integer term: immediate when it fits, boxed otherwise.
    pub fn integer(&mut self, value: impl Into<BigInt>) -> Term {
        let value = value.into();
        if let Some(term) = i64::try_from(&value).ok().and_then(Term::small_int) {
            return term;
        }
        let limbs = limbs_of(&value);
        self.push_object(
            Header::new(BoxedKind::BigInt, limbs.len() as u64),
            limbs.into_iter().map(Term::from_raw),
        )
    }

    /// Map term; later entries win on duplicate keys.
    pub fn map(&mut self, entries: &[(Term, Term)]) -> Term {
        let mut canonical: Vec<(Term, Term)> = Vec::with_capacity(entries.len());
        for &(key, value) in entries {
            match canonical.iter_mut().find(|slot| self.exact_eq(slot.0, key)) {
                Some(slot) => slot.1 = value,
                None => canonical.push((key, value)),
            }
        }
        canonical.sort_by(|a, b| self.compare_exact(a.0, b.0));
        self.push_object(
            Header::new(BoxedKind::Map, canonical.len() as u64),
            canonical.into_iter().flat_map(|(k, v)| [k, v]),
        )
    }

    pub fn binary(&mut self, bytes: &[u8]) -> Term {
        self.bitstring(bytes, bytes.len() as u64 * 8)
    }

    /// Bitstring of `bits` bits taken from the front of `bytes`.
    pub fn bitstring(&mut self, bytes: &[u8], bits: u64) -> Term {
        let payload: Vec<Term> = bytes
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                Term::from_raw(u64::from_le_bytes(word))
            })
            .collect();
        self.push_object(Header::new(BoxedKind::Binary, bits), payload)
    }

    pub fn closure(&mut self, function: u32, arity: u32, env: &[Term]) -> Term {
        let prefix = [
            Term::from_raw(u64::from(function)),
            Term::from_raw(u64::from(arity)),
        ];
        self.push_object(
            Header::new(BoxedKind::Closure, env.len() as u64),
            prefix.into_iter().chain(env.iter().copied()),
        )
    }

    pub fn pid(&mut self, id: u64) -> Term {
        self.push_object(Header::new(BoxedKind::Pid, 1), [Term::from_raw(id)])
    }

    // ── Inspection ──────────────────────────────────────────────

    fn header_of(&self, term: Term) -> Option<(usize, Header)> {
        let index = index_of(term.boxed_addr()?);
        let word = self.words.get(index)?;
        Some((index, Header::from_raw(word.raw())))
    }

    /// Classify a term; boxed terms cost one header read.
    pub fn kind_of(&self, term: Term) -> TermKind {
        match tag_of(term) {
            PrimitiveTag::SmallInt => TermKind::SmallInt,
            PrimitiveTag::Atom => TermKind::Atom,
            PrimitiveTag::Nil => TermKind::Nil,
            PrimitiveTag::List => TermKind::Cons,
            PrimitiveTag::None | PrimitiveTag::Invalid => TermKind::None,
            PrimitiveTag::Boxed => match self.header_of(term).and_then(|(_, h)| h.kind()) {
                Some(BoxedKind::BigInt) => TermKind::BigInt,
                Some(BoxedKind::Float) => TermKind::Float,
                Some(BoxedKind::Tuple) => TermKind::Tuple,
                Some(BoxedKind::Map) => TermKind::Map,
                Some(BoxedKind::Binary) => TermKind::Binary,
                Some(BoxedKind::Closure) => TermKind::Closure,
                Some(BoxedKind::Pid) => TermKind::Pid,
                None => TermKind::None,
            },
        }
    }

    /// Typed view of `term`, or why it is not of the expected shape.
    pub fn unbox_as(&self, term: Term, expected: ExpectedShape) -> Result<View<'_>, TypeMismatch> {
        let found = self.kind_of(term);
        if found != expected.term_kind() {
            return Err(TypeMismatch::WrongKind { expected, found });
        }
        let dangling = TypeMismatch::Dangling { raw: term.raw() };

        if expected == ExpectedShape::Cons {
            let index = index_of(term.list_addr().ok_or(dangling.clone())?);
            let cell = self.words.get(index..index + 2).ok_or(dangling)?;
            return Ok(View::Cons {
                head: cell[0],
                tail: cell[1],
            });
        }

        let (index, header) = self.header_of(term).ok_or(dangling.clone())?;
        let arity = usize::try_from(header.arity()).map_err(|_| dangling.clone())?;
        let payload_len = match expected {
            ExpectedShape::Tuple | ExpectedShape::BigInt => arity,
            ExpectedShape::Float | ExpectedShape::Pid => 1,
            ExpectedShape::Map => arity * 2,
            ExpectedShape::Binary => arity.div_ceil(64),
            ExpectedShape::Closure => arity + 2,
            ExpectedShape::Cons => 0,
        };
        let payload = self
            .words
            .get(index + 1..index + 1 + payload_len)
            .ok_or(dangling.clone())?;

        Ok(match expected {
            ExpectedShape::Tuple => View::Tuple(payload),
            ExpectedShape::Map => View::Map(MapView { entries: payload }),
            ExpectedShape::Binary => View::Binary(BinaryView {
                bits: header.arity(),
                words: payload,
            }),
            ExpectedShape::Float => View::Float(f64::from_bits(payload[0].raw())),
            ExpectedShape::BigInt => View::BigInt(from_limbs(payload)),
            ExpectedShape::Closure => View::Closure(ClosureView {
                function: u32::try_from(payload[0].raw()).map_err(|_| dangling.clone())?,
                arity: u32::try_from(payload[1].raw()).map_err(|_| dangling)?,
                env: &payload[2..],
            }),
            ExpectedShape::Pid => View::Pid(payload[0].raw()),
            ExpectedShape::Cons => return Err(dangling),
        })
    }

    pub fn tuple_elements(&self, term: Term) -> Option<&[Term]> {
        match self.unbox_as(term, ExpectedShape::Tuple) {
            Ok(View::Tuple(elements)) => Some(elements),
            _ => None,
        }
    }

    pub fn cons_parts(&self, term: Term) -> Option<(Term, Term)> {
        match self.unbox_as(term, ExpectedShape::Cons) {
            Ok(View::Cons { head, tail }) => Some((head, tail)),
            _ => None,
        }
    }

    pub fn closure_parts(&self, term: Term) -> Option<ClosureView<'_>> {
        match self.unbox_as(term, ExpectedShape::Closure) {
            Ok(View::Closure(view)) => Some(view),
            _ => None,
        }
    }

    pub fn pid_number(&self, term: Term) -> Option<u64> {
        match self.unbox_as(term, ExpectedShape::Pid) {
            Ok(View::Pid(id)) => Some(id),
            _ => None,
        }
    }

    pub fn map_entries(&self, term: Term) -> Option<Vec<(Term, Term)>> {
        match self.unbox_as(term, ExpectedShape::Map) {
            Ok(View::Map(view)) => Some(view.iter().collect()),
            _ => None,
        }
    }

    /// Value under `key` (exact key equality).
    pub fn map_get(&self, map: Term, key: Term) -> Option<Term> {
        match self.unbox_as(map, ExpectedShape::Map) {
            Ok(View::Map(view)) => view
                .iter()
                .find(|&(k, _)| self.exact_eq(k, key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// `(bit length, bytes)` of a binary.
    pub fn binary_data(&self, term: Term) -> Option<(u64, Vec<u8>)> {
        match self.unbox_as(term, ExpectedShape::Binary) {
            Ok(View::Binary(view)) => Some((view.bit_len(), view.bytes())),
            _ => None,
        }
    }

    pub fn integer_value(&self, term: Term) -> Option<BigInt> {
        if let Some(small) = term.as_small_int() {
            return Some(BigInt::from(small));
        }
        match self.unbox_as(term, ExpectedShape::BigInt) {
            Ok(View::BigInt(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer value when it fits an `i64`, for counts, sizes and indices.
    pub fn i64_value(&self, term: Term) -> Option<i64> {
        term.as_small_int()
            .or_else(|| i64::try_from(&self.integer_value(term)?).ok())
    }

    pub fn float_value(&self, term: Term) -> Option<f64> {
        match self.unbox_as(term, ExpectedShape::Float) {
            Ok(View::Float(value)) => Some(value),
            _ => None,
        }
    }

    pub fn number(&self, term: Term) -> Option<Number> {
        self.integer_value(term)
            .map(Number::Int)
            .or_else(|| self.float_value(term).map(Number::Float))
    }

    /// Elements of a proper list, or `None` for improper lists and non-lists.
    pub fn list_elements(&self, mut term: Term) -> Option<Vec<Term>> {
        let mut out = Vec::new();
        loop {
            if term.is_nil() {
                return Some(out);
            }
            let (head, tail) = self.cons_parts(term)?;
            out.push(head);
            term = tail;
        }
    }

    // ── Ordering ────────────────────────────────────────────────

    /// `=:=`: structural equality, `1` differs from `1.0`.
    pub fn exact_eq(&self, a: Term, b: Term) -> bool {
        a == b || self.compare_exact(a, b) == Ordering::Equal
    }

    /// `==`: numbers compare by value.
    pub fn arith_eq(&self, a: Term, b: Term) -> bool {
        a == b || self.compare(a, b) == Ordering::Equal
    }

    /// Standard term order with arithmetic number comparison.
    pub fn compare(&self, a: Term, b: Term) -> Ordering {
        self.compare_terms(a, b, false)
    }

    /// Term order where an integer sorts before an equal float.
    pub fn compare_exact(&self, a: Term, b: Term) -> Ordering {
        self.compare_terms(a, b, true)
    }

    fn compare_terms(&self, mut a: Term, mut b: Term, exact: bool) -> Ordering {
        // Loop over list tails; recurse on everything else.
        loop {
            if a == b {
                return Ordering::Equal;
            }
            let (ka, kb) = (self.kind_of(a), self.kind_of(b));
            if ka.is_number() && kb.is_number() {
                return self.compare_numbers(a, b, exact);
            }
            let by_rank = ka.order_rank().cmp(&kb.order_rank());
            if by_rank != Ordering::Equal {
                return by_rank;
            }
            match ka {
                TermKind::Cons => {
                    let (Some((ha, ta)), Some((hb, tb))) = (self.cons_parts(a), self.cons_parts(b))
                    else {
                        return Ordering::Equal;
                    };
                    let heads = self.compare_terms(ha, hb, exact);
                    if heads != Ordering::Equal {
                        return heads;
                    }
                    a = ta;
                    b = tb;
                }
                _ => return self.compare_same_kind(ka, a, b, exact),
            }
        }
    }

    fn compare_numbers(&self, a: Term, b: Term, exact: bool) -> Ordering {
        match (self.number(a), self.number(b)) {
            (Some(Number::Int(x)), Some(Number::Int(y))) => x.cmp(&y),
            (Some(x), Some(y)) => {
                let ord = x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal);
                if ord == Ordering::Equal && exact {
                    // Same value, different type: integers first.
                    let rank = |n: &Number| u8::from(matches!(n, Number::Float(_)));
                    rank(&x).cmp(&rank(&y))
                } else {
                    ord
                }
            }
            _ => Ordering::Equal,
        }
    }

    fn compare_same_kind(&self, kind: TermKind, a: Term, b: Term, exact: bool) -> Ordering {
        match kind {
            TermKind::Atom => a.raw().cmp(&b.raw()),
            TermKind::Tuple => {
                let (xs, ys) = (
                    self.tuple_elements(a).unwrap_or(&[]),
                    self.tuple_elements(b).unwrap_or(&[]),
                );
                xs.len()
                    .cmp(&ys.len())
                    .then_with(|| self.compare_slices(xs, ys, exact))
            }
            TermKind::Map => {
                let xs = self.map_entries(a).unwrap_or_default();
                let ys = self.map_entries(b).unwrap_or_default();
                xs.len().cmp(&ys.len()).then_with(|| {
                    let (keys_a, values_a): (Vec<Term>, Vec<Term>) = xs.into_iter().unzip();
                    let (keys_b, values_b): (Vec<Term>, Vec<Term>) = ys.into_iter().unzip();
                    self.compare_slices(&keys_a, &keys_b, true)
                        .then_with(|| self.compare_slices(&values_a, &values_b, exact))
                })
            }
            TermKind::Binary => {
                let (Some((bits_a, bytes_a)), Some((bits_b, bytes_b))) =
                    (self.binary_data(a), self.binary_data(b))
                else {
                    return Ordering::Equal;
                };
                bytes_a.cmp(&bytes_b).then(bits_a.cmp(&bits_b))
            }
            TermKind::Closure => {
                let (Some(x), Some(y)) = (self.closure_parts(a), self.closure_parts(b)) else {
                    return Ordering::Equal;
                };
                x.function
                    .cmp(&y.function)
                    .then(x.env.len().cmp(&y.env.len()))
                    .then_with(|| self.compare_slices(x.env, y.env, exact))
            }
            TermKind::Pid => self.pid_number(a).cmp(&self.pid_number(b)),
            _ => Ordering::Equal,
        }
    }

    fn compare_slices(&self, xs: &[Term], ys: &[Term], exact: bool) -> Ordering {
        xs.iter()
            .zip(ys)
            .map(|(&x, &y)| self.compare_terms(x, y, exact))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| xs.len().cmp(&ys.len()))
    }

    // ── Rendering ───────────────────────────────────────────────

    /// Source-like rendering for diagnostics and test output.
    pub fn render(&self, term: Term, atoms: &dyn StringLookup) -> String {
        let mut out = String::new();
        self.render_into(term, atoms, &mut out);
        out
    }

    fn render_into(&self, term: Term, atoms: &dyn StringLookup, out: &mut String) {
        match self.kind_of(term) {
            TermKind::SmallInt | TermKind::BigInt => {
                let _ = write!(out, "{}", self.integer_value(term).unwrap_or_default());
            }
            TermKind::Float => {
                let _ = write!(out, "{:?}", self.float_value(term).unwrap_or(0.0));
            }
            TermKind::Atom => {
                let name = term.as_atom().map_or("", |n| atoms.lookup(n));
                out.push_str(name);
            }
            TermKind::Nil => out.push_str("[]"),
            TermKind::Cons => {
                out.push('[');
                let mut cursor = term;
                let mut first = true;
                while let Some((head, tail)) = self.cons_parts(cursor) {
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    self.render_into(head, atoms, out);
                    cursor = tail;
                }
                if !cursor.is_nil() {
                    out.push('|');
                    self.render_into(cursor, atoms, out);
                }
                out.push(']');
            }
            TermKind::Tuple => {
                out.push('{');
                for (i, element) in self.tuple_elements(term).unwrap_or(&[]).iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.render_into(*element, atoms, out);
                }
                out.push('}');
            }
            TermKind::Map => {
                out.push_str("#{");
                for (i, (key, value)) in self.map_entries(term).unwrap_or_default().into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.render_into(key, atoms, out);
                    out.push_str(" => ");
                    self.render_into(value, atoms, out);
                }
                out.push('}');
            }
            TermKind::Binary => {
                let (bits, bytes) = self.binary_data(term).unwrap_or_default();
                out.push_str("<<");
                let whole = usize::try_from(bits / 8).unwrap_or(0);
                for (i, byte) in bytes.iter().take(whole).enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{byte}");
                }
                if bits % 8 != 0 {
                    if whole > 0 {
                        out.push(',');
                    }
                    let rest = bits % 8;
                    let last = bytes.get(whole).copied().unwrap_or(0) >> (8 - rest);
                    let _ = write!(out, "{last}:{rest}");
                }
                out.push_str(">>");
            }
            TermKind::Closure => {
                let (function, arity) = self
                    .closure_parts(term)
                    .map_or((0, 0), |c| (c.function, c.arity));
                let _ = write!(out, "#Fun<{function}/{arity}>");
            }
            TermKind::Pid => {
                let _ = write!(out, "<0.{}.0>", self.pid_number(term).unwrap_or(0));
            }
            TermKind::None => out.push_str("NONE"),
        }
    }
}

#[cfg(test)]
mod tests;
