use super::*;
use crate::encoding::{MAX_SMALL, MIN_SMALL};
use ember_ir::StringInterner;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn int(value: i64) -> Term {
    Term::small_int(value).unwrap_or(Term::NONE)
}

#[test]
fn tuple_elements_round_trip() {
    let mut heap = Heap::new();
    let t = heap.tuple(&[int(1), int(2), Term::NIL]);
    assert_eq!(tag_of(t), PrimitiveTag::Boxed);
    assert_eq!(heap.kind_of(t), TermKind::Tuple);
    assert_eq!(heap.tuple_elements(t), Some(&[int(1), int(2), Term::NIL][..]));
}

#[test]
fn unbox_reports_wrong_kind() {
    let mut heap = Heap::new();
    let t = heap.tuple(&[int(1)]);
    assert_eq!(
        heap.unbox_as(t, ExpectedShape::Map),
        Err(TypeMismatch::WrongKind {
            expected: ExpectedShape::Map,
            found: TermKind::Tuple,
        })
    );
    assert_eq!(
        heap.unbox_as(int(3), ExpectedShape::Tuple),
        Err(TypeMismatch::WrongKind {
            expected: ExpectedShape::Tuple,
            found: TermKind::SmallInt,
        })
    );
}

#[test]
fn dangling_pointer_is_none_kind() {
    let heap = Heap::new();
    let bogus = Term::from_boxed_addr(8 * 1000);
    assert_eq!(heap.kind_of(bogus), TermKind::None);
}

#[test]
fn list_round_trip_and_improper_tail() {
    let mut heap = Heap::new();
    let proper = heap.list(&[int(1), int(2)]);
    assert_eq!(heap.list_elements(proper), Some(vec![int(1), int(2)]));
    let improper = heap.list_with_tail(&[int(1)], int(2));
    assert_eq!(heap.list_elements(improper), None);
    assert_eq!(heap.cons_parts(improper), Some((int(1), int(2))));
}

#[test]
fn integers_box_outside_small_range() {
    let mut heap = Heap::new();
    let small = heap.integer(MAX_SMALL);
    assert_eq!(heap.kind_of(small), TermKind::SmallInt);
    let big = heap.integer(i128::from(MAX_SMALL) + 1);
    assert_eq!(heap.kind_of(big), TermKind::BigInt);
    assert_eq!(heap.integer_value(big), Some(BigInt::from(MAX_SMALL) + 1));
    assert_eq!(heap.i64_value(big), Some(MAX_SMALL + 1));
    let negative = heap.integer(i128::from(MIN_SMALL) * 4);
    assert_eq!(heap.integer_value(negative), Some(BigInt::from(MIN_SMALL) * 4));
}

#[test]
fn big_int_header_counts_limbs() {
    let mut heap = Heap::new();
    let huge = BigInt::from(1) << 200u32;
    let term = heap.integer(huge.clone());
    let header = term
        .boxed_addr()
        .map(|addr| Header::from_raw(heap.words[index_of(addr)].raw()));
    assert_eq!(header.and_then(Header::kind), Some(BoxedKind::BigInt));
    // 2^200 plus a clear sign bit is 201 bits: four limbs.
    assert_eq!(header.map(Header::arity), Some(4));
    assert_eq!(heap.integer_value(term), Some(huge.clone()));
    assert_eq!(heap.i64_value(term), None);

    let negative = heap.integer(-huge.clone());
    assert_eq!(heap.integer_value(negative), Some(-huge));
    assert_eq!(heap.render(negative, &StringInterner::new()), format!("-{}", BigInt::from(1) << 200u32));
}

#[test]
fn big_ints_order_by_value() {
    let mut heap = Heap::new();
    let a = heap.integer(BigInt::from(1) << 100u32);
    let b = heap.integer((BigInt::from(1) << 100u32) + 1);
    let c = heap.integer(-(BigInt::from(1) << 100u32));
    assert_eq!(heap.compare(a, b), Ordering::Less);
    assert_eq!(heap.compare(c, int(0)), Ordering::Less);
    let same = heap.integer(BigInt::from(1) << 100u32);
    assert!(heap.exact_eq(a, same));
    let float = heap.float(2f64.powi(100));
    assert!(heap.arith_eq(a, float));
    assert!(!heap.exact_eq(a, float));
}

#[test]
fn map_is_canonical() {
    let mut heap = Heap::new();
    let a = heap.map(&[(int(2), int(20)), (int(1), int(10)), (int(2), int(21))]);
    let b = heap.map(&[(int(1), int(10)), (int(2), int(21))]);
    assert_eq!(heap.map_entries(a), Some(vec![(int(1), int(10)), (int(2), int(21))]));
    assert!(heap.exact_eq(a, b));
    assert_eq!(heap.map_get(a, int(2)), Some(int(21)));
    assert_eq!(heap.map_get(a, int(3)), None);
}

#[test]
fn binary_bytes_and_bits() {
    let mut heap = Heap::new();
    let bin = heap.binary(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert_eq!(heap.binary_data(bin), Some((72, vec![1, 2, 3, 4, 5, 6, 7, 8, 9])));
    let bits = heap.bitstring(&[0b1010_0000], 3);
    assert_eq!(heap.binary_data(bits), Some((3, vec![0b1010_0000])));
}

#[test]
fn closure_view() {
    let mut heap = Heap::new();
    let c = heap.closure(4, 2, &[int(7)]);
    let view = heap.closure_parts(c);
    assert_eq!(
        view,
        Some(ClosureView {
            function: 4,
            arity: 2,
            env: &[int(7)],
        })
    );
}

#[test]
fn exact_and_arithmetic_equality() {
    let mut heap = Heap::new();
    let one_float = heap.float(1.0);
    assert!(heap.arith_eq(int(1), one_float));
    assert!(!heap.exact_eq(int(1), one_float));
    let t1 = heap.tuple(&[int(1), one_float]);
    let t2 = heap.tuple(&[int(1), one_float]);
    assert!(heap.exact_eq(t1, t2));
}

#[test]
fn term_order_across_kinds() {
    let mut heap = Heap::new();
    let interner = StringInterner::new();
    let atom = Term::atom(interner.intern("ok"));
    let tuple = heap.tuple(&[]);
    let list = heap.list(&[int(1)]);
    let bin = heap.binary(&[]);
    let ordered = [int(5), atom, tuple, Term::NIL, list, bin];
    for pair in ordered.windows(2) {
        assert_eq!(heap.compare(pair[0], pair[1]), Ordering::Less);
    }
}

#[test]
fn tuples_compare_by_size_first() {
    let mut heap = Heap::new();
    let short = heap.tuple(&[int(9)]);
    let long = heap.tuple(&[int(1), int(1)]);
    assert_eq!(heap.compare(short, long), Ordering::Less);
}

#[test]
fn render_nested() {
    let mut heap = Heap::new();
    let interner = StringInterner::new();
    let ok = Term::atom(interner.intern("ok"));
    let list = heap.list_with_tail(&[int(1), int(2)], int(3));
    let tuple = heap.tuple(&[ok, list]);
    assert_eq!(heap.render(tuple, &interner), "{ok,[1,2|3]}");
    let bin = heap.binary(&[1, 255]);
    assert_eq!(heap.render(bin, &interner), "<<1,255>>");
}

proptest! {
    #[test]
    fn tuple_element_is_what_was_placed(values in prop::collection::vec(MIN_SMALL..=MAX_SMALL, 0..12)) {
        let mut heap = Heap::new();
        let elements: Vec<Term> = values.iter().map(|&v| int(v)).collect();
        let tuple = heap.tuple(&elements);
        let view = heap.tuple_elements(tuple).map(<[Term]>::to_vec);
        prop_assert_eq!(view, Some(elements.clone()));
        for (i, &v) in values.iter().enumerate() {
            let element = heap.tuple_elements(tuple).and_then(|e| e.get(i).copied());
            prop_assert_eq!(element.and_then(Term::as_small_int), Some(v));
        }
    }

    #[test]
    fn integer_round_trip(value in any::<i64>(), shift in 0u32..300) {
        let mut heap = Heap::new();
        let wide = BigInt::from(value) << shift;
        let term = heap.integer(wide.clone());
        prop_assert_eq!(heap.integer_value(term), Some(wide));
    }
}
