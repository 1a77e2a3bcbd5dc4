//! Semantics of the runtime functions MIR may call directly.
//!
//! Integers are exact at any size. A shift whose result would exceed
//! [`MAX_INT_BITS`] raises `system_limit`. Mixed integer and float operands
//! compute in `f64`, and a non-finite float result raises `badarith`.

use ember_mir::RuntimeFn;
use ember_term::{BigInt, Heap, Number, Term};
use num_traits::{Signed, Zero};

use crate::atoms::Atoms;

/// Largest integer, in bits, a shift may produce.
const MAX_INT_BITS: u64 = 1 << 24;

/// Reason atom of an `error` a runtime function raises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fault {
    Badarith,
    Badarg,
    SystemLimit,
}

impl Fault {
    pub(crate) fn reason(self, atoms: &Atoms) -> Term {
        match self {
            Fault::Badarith => atoms.badarith,
            Fault::Badarg => atoms.badarg,
            Fault::SystemLimit => atoms.system_limit,
        }
    }
}

type Outcome = Result<Term, Fault>;

/// Apply `func` to `args`. `None` for functions MIR cannot name.
pub(crate) fn apply(heap: &mut Heap, atoms: &Atoms, func: RuntimeFn, args: &[Term]) -> Option<Outcome> {
    if !func.callable_from_mir() || func.arity() != Some(args.len()) {
        return None;
    }
    let arg = |i: usize| args.get(i).copied().unwrap_or(Term::NONE);
    let (a, b) = (arg(0), arg(1));

    let outcome = match func {
        RuntimeFn::Add => arith(heap, a, b, |x, y| x + y, |x, y| x + y),
        RuntimeFn::Sub => arith(heap, a, b, |x, y| x - y, |x, y| x - y),
        RuntimeFn::Mul => arith(heap, a, b, |x, y| x * y, |x, y| x * y),
        RuntimeFn::IntDiv => integer_division(heap, a, b, |x, y| x / y),
        RuntimeFn::Rem => integer_division(heap, a, b, |x, y| x % y),
        RuntimeFn::FloatDiv => float_div(heap, a, b),
        RuntimeFn::Negate => match heap.number(a) {
            Some(Number::Int(x)) => Ok(heap.integer(-x)),
            Some(Number::Float(x)) => float(heap, -x),
            None => Err(Fault::Badarith),
        },
        RuntimeFn::Band => bitwise(heap, a, b, |x, y| Some(x & y)),
        RuntimeFn::Bor => bitwise(heap, a, b, |x, y| Some(x | y)),
        RuntimeFn::Bxor => bitwise(heap, a, b, |x, y| Some(x ^ y)),
        RuntimeFn::Bsl => bitwise(heap, a, b, shift_left),
        RuntimeFn::Bsr => bitwise(heap, a, b, |x, y| shift_left(x, &-y)),
        RuntimeFn::Bnot => match heap.integer_value(a) {
            Some(x) => Ok(heap.integer(!x)),
            None => Err(Fault::Badarith),
        },
        RuntimeFn::BoolAnd => boolean(atoms, a, b, |x, y| x && y),
        RuntimeFn::BoolOr => boolean(atoms, a, b, |x, y| x || y),
        RuntimeFn::BoolXor => boolean(atoms, a, b, |x, y| x != y),
        RuntimeFn::BoolNot => atoms
            .as_bool(a)
            .map(|x| atoms.boolean(!x))
            .ok_or(Fault::Badarg),
        RuntimeFn::Element => element(heap, a, b),
        RuntimeFn::TupleSize => heap
            .tuple_elements(a)
            .map(<[Term]>::len)
            .ok_or(Fault::Badarg)
            .map(|len| heap.integer(len)),
        RuntimeFn::Length => heap
            .list_elements(a)
            .ok_or(Fault::Badarg)
            .map(|items| heap.integer(items.len())),
        RuntimeFn::Hd => heap.cons_parts(a).map(|(h, _)| h).ok_or(Fault::Badarg),
        RuntimeFn::Tl => heap.cons_parts(a).map(|(_, t)| t).ok_or(Fault::Badarg),
        RuntimeFn::Abs => match heap.number(a) {
            Some(Number::Int(x)) => Ok(heap.integer(x.abs())),
            Some(Number::Float(x)) => float(heap, x.abs()),
            None => Err(Fault::Badarg),
        },
        RuntimeFn::MapSize => heap
            .map_entries(a)
            .ok_or(Fault::Badarg)
            .map(|entries| heap.integer(entries.len())),
        RuntimeFn::ListToTuple => heap
            .list_elements(a)
            .ok_or(Fault::Badarg)
            .map(|items| heap.tuple(&items)),
        _ => return None,
    };
    Some(outcome)
}

fn float(heap: &mut Heap, value: f64) -> Outcome {
    if value.is_finite() {
        Ok(heap.float(value))
    } else {
        Err(Fault::Badarith)
    }
}

fn arith(
    heap: &mut Heap,
    a: Term,
    b: Term,
    int: fn(&BigInt, &BigInt) -> BigInt,
    flt: fn(f64, f64) -> f64,
) -> Outcome {
    match (heap.number(a), heap.number(b)) {
        (Some(Number::Int(x)), Some(Number::Int(y))) => Ok(heap.integer(int(&x, &y))),
        (Some(x), Some(y)) => float(heap, flt(x.as_f64(), y.as_f64())),
        _ => Err(Fault::Badarith),
    }
}

/// `div` and `rem`: integers only, truncating toward zero.
fn integer_division(heap: &mut Heap, a: Term, b: Term, op: fn(&BigInt, &BigInt) -> BigInt) -> Outcome {
    match (heap.integer_value(a), heap.integer_value(b)) {
        (Some(x), Some(y)) if !y.is_zero() => Ok(heap.integer(op(&x, &y))),
        _ => Err(Fault::Badarith),
    }
}

fn float_div(heap: &mut Heap, a: Term, b: Term) -> Outcome {
    match (heap.number(a), heap.number(b)) {
        (Some(x), Some(y)) if y.as_f64() != 0.0 => float(heap, x.as_f64() / y.as_f64()),
        _ => Err(Fault::Badarith),
    }
}

fn bitwise(heap: &mut Heap, a: Term, b: Term, op: fn(&BigInt, &BigInt) -> Option<BigInt>) -> Outcome {
    match (heap.integer_value(a), heap.integer_value(b)) {
        (Some(x), Some(y)) => op(&x, &y).map(|v| heap.integer(v)).ok_or(Fault::SystemLimit),
        _ => Err(Fault::Badarith),
    }
}

/// `x bsl by`; a negative `by` shifts right, rounding toward negative
/// infinity. `None` when the result would be wider than [`MAX_INT_BITS`].
fn shift_left(x: &BigInt, by: &BigInt) -> Option<BigInt> {
    if x.is_zero() {
        return Some(BigInt::zero());
    }
    let amount = u64::try_from(by.magnitude()).unwrap_or(u64::MAX);
    if by.is_negative() {
        // Past the top bit every further step yields the same 0 or -1.
        return Some(x >> amount.min(x.bits() + 1));
    }
    if x.bits().saturating_add(amount) > MAX_INT_BITS {
        return None;
    }
    Some(x << amount)
}

fn boolean(atoms: &Atoms, a: Term, b: Term, op: fn(bool, bool) -> bool) -> Outcome {
    match (atoms.as_bool(a), atoms.as_bool(b)) {
        (Some(x), Some(y)) => Ok(atoms.boolean(op(x, y))),
        _ => Err(Fault::Badarg),
    }
}

/// `element(N, Tuple)` with a one-based `N`.
fn element(heap: &Heap, index: Term, tuple: Term) -> Outcome {
    let elements = heap.tuple_elements(tuple).ok_or(Fault::Badarg)?;
    let index = heap
        .i64_value(index)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(Fault::Badarg)?;
    index
        .checked_sub(1)
        .and_then(|i| elements.get(i))
        .copied()
        .ok_or(Fault::Badarg)
}
