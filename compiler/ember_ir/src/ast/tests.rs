use super::*;
use crate::StringInterner;
use pretty_assertions::assert_eq;

#[test]
fn pattern_variables_in_order_without_duplicates() {
    let interner = StringInterner::new();
    let x = interner.intern("X");
    let y = interner.intern("Y");
    let pattern = Pattern::tuple(vec![
        Pattern::var(x),
        Pattern::cons(Pattern::var(y), Pattern::var(x)),
        Pattern::wildcard(),
    ]);
    assert_eq!(pattern.variables(), vec![x, y]);
}

#[test]
fn pattern_variables_include_alias_and_size() {
    let interner = StringInterner::new();
    let whole = interner.intern("Whole");
    let len = interner.intern("Len");
    let body = interner.intern("Body");
    let pattern = Pattern::alias(
        whole,
        Pattern::bin(vec![
            BinSegment::new(Pattern::var(len), SegmentSize::Literal(8), SegmentSpec::INTEGER),
            BinSegment::new(Pattern::var(body), SegmentSize::Var(len), SegmentSpec::BINARY),
        ]),
    );
    assert_eq!(pattern.variables(), vec![whole, len, body]);
}

#[test]
fn exception_class_codes_round_trip() {
    for class in ExceptionClass::ALL {
        assert_eq!(ExceptionClass::from_code(class.code()), Some(class));
    }
    assert_eq!(ExceptionClass::from_code(7), None);
}

#[test]
fn catch_class_admission() {
    assert!(CatchClass::Exact(ExceptionClass::Throw).admits(ExceptionClass::Throw));
    assert!(!CatchClass::Exact(ExceptionClass::Throw).admits(ExceptionClass::Error));
    assert!(CatchClass::Any.admits(ExceptionClass::Exit));
}

#[test]
fn binary_op_spelling() {
    assert_eq!(BinaryOp::Le.as_str(), "=<");
    assert_eq!(BinaryOp::ExactNe.as_str(), "=/=");
}
