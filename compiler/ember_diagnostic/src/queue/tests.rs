use super::*;
use crate::ErrorCode;
use ember_ir::Span;
use pretty_assertions::assert_eq;

fn error(function: &str, start: u32) -> Diagnostic {
    Diagnostic::error(ErrorCode::E1002)
        .with_message("unbound")
        .with_function(function)
        .with_span(Span::new(start, start + 1))
}

#[test]
fn counts_by_severity() {
    let mut queue = DiagnosticQueue::new();
    queue.add(error("f/0", 1));
    queue.add(Diagnostic::warning(ErrorCode::E2001).with_message("dead clause"));
    assert_eq!(queue.error_count(), 1);
    assert_eq!(queue.warning_count(), 1);
    assert!(queue.has_errors());
    assert!(queue.error_guaranteed().is_some());
}

#[test]
fn error_limit_suppresses_extra_errors() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 2,
        warnings_as_errors: false,
    });
    for i in 0..5 {
        queue.add(error("f/0", i + 1));
    }
    assert_eq!(queue.error_count(), 2);
    assert_eq!(queue.suppressed_count(), 3);
    assert!(queue.limit_reached());
}

#[test]
fn warnings_as_errors_promotes() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig {
        error_limit: 0,
        warnings_as_errors: true,
    });
    queue.add(Diagnostic::warning(ErrorCode::E2002).with_message("may fail"));
    assert_eq!(queue.error_count(), 1);
    assert_eq!(queue.warning_count(), 0);
}

#[test]
fn flush_sorts_by_function_then_span() {
    let mut queue = DiagnosticQueue::with_config(DiagnosticConfig::unlimited());
    queue.add(error("g/1", 5));
    queue.add(error("f/0", 9));
    queue.add(error("f/0", 2));
    let order: Vec<(Option<String>, Option<u32>)> = queue
        .flush()
        .into_iter()
        .map(|d| (d.function, d.span.map(|s| s.start)))
        .collect();
    assert_eq!(
        order,
        vec![
            (Some("f/0".to_owned()), Some(2)),
            (Some("f/0".to_owned()), Some(9)),
            (Some("g/1".to_owned()), Some(5)),
        ]
    );
    assert!(queue.is_empty());
    assert_eq!(queue.error_count(), 0);
}

#[test]
fn emit_error_returns_proof() {
    let mut queue = DiagnosticQueue::new();
    let _proof = queue.emit_error(error("f/0", 1));
    assert_eq!(queue.len(), 1);
}
