//! What the driver reports for modules that fail or look suspicious.

use ember_diagnostic::emitter::TextEmitter;
use ember_diagnostic::{DiagnosticConfig, ErrorCode};
use ember_ir::ast::{Clause, Expr, Pattern};
use emberc::CompileConfig;
use pretty_assertions::assert_eq;

use crate::common::Src;

/// `f() -> X.`
fn unbound(src: &Src, name: &str) -> ember_ir::ast::FunctionDef {
    src.def(name, &[], vec![src.var("X")])
}

/// `pick({ok}) -> yes.`, which has no catch-all head.
fn partial(src: &Src) -> ember_ir::ast::FunctionDef {
    src.func(
        "pick",
        vec![Clause::new(
            vec![Pattern::tuple(vec![src.patom("ok")])],
            None,
            vec![src.atom("yes")],
        )],
    )
}

#[test]
fn unbound_variable_names_its_function() {
    let src = Src::new();
    let error = src.session.compile(&src.module("m", vec![unbound(&src, "f")])).unwrap_err();

    assert_eq!(error.module, "m");
    assert_eq!(error.error_count(), 1);
    let diagnostic = error.errors().next().unwrap();
    assert_eq!(diagnostic.code, ErrorCode::E1002);
    assert_eq!(diagnostic.function.as_deref(), Some("f/0"));
    assert_eq!(diagnostic.message, "variable 'X' is unbound");
}

#[test]
fn every_broken_function_is_reported() {
    let src = Src::new();
    let fine = src.def("fine", &[], vec![src.atom("ok")]);
    let calls_nothing = src.def("g", &[], vec![src.call("missing", vec![])]);
    let def = src.module("m", vec![unbound(&src, "f"), fine, calls_nothing]);
    let error = src.session.compile(&def).unwrap_err();

    let codes: Vec<ErrorCode> = error.errors().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E1002, ErrorCode::E1005]);
}

#[test]
fn error_limit_bounds_the_report() {
    let config = CompileConfig {
        diagnostics: DiagnosticConfig {
            error_limit: 2,
            warnings_as_errors: false,
        },
        ..CompileConfig::sequential()
    };
    let src = Src::with_config(config);
    let broken = ["a", "b", "c", "d"].map(|name| unbound(&src, name)).to_vec();
    let error = src.session.compile(&src.module("m", broken)).unwrap_err();
    assert_eq!(error.error_count(), 2);
}

#[test]
fn inexhaustive_heads_warn_but_compile() {
    let src = Src::new();
    let compiled = src.compile(vec![partial(&src)]);

    assert_eq!(compiled.warning_count(), 1);
    assert_eq!(compiled.diagnostics[0].code, ErrorCode::E2002);
    assert_eq!(compiled.diagnostics[0].function.as_deref(), Some("pick/1"));
    assert_eq!(compiled.emitted.functions.len(), 1);
}

#[test]
fn warnings_as_errors_stop_the_module() {
    let config = CompileConfig {
        diagnostics: DiagnosticConfig {
            error_limit: 0,
            warnings_as_errors: true,
        },
        ..CompileConfig::sequential()
    };
    let src = Src::with_config(config);
    let error = src.session.compile(&src.module("m", vec![partial(&src)])).unwrap_err();
    assert_eq!(error.error_count(), 1);
    assert_eq!(error.diagnostics[0].code, ErrorCode::E2002);
}

#[test]
fn unreachable_clause_is_reported() {
    let src = Src::new();
    let shadowed = src.func(
        "shadowed",
        vec![
            Clause::new(vec![src.pvar("Any")], None, vec![src.atom("first")]),
            Clause::new(vec![Pattern::int(1)], None, vec![src.atom("never")]),
        ],
    );
    let compiled = src.compile(vec![shadowed]);
    let codes: Vec<ErrorCode> = compiled.diagnostics.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E2001]);
    assert!(compiled.diagnostics[0].message.contains("clause 2"));
}

#[test]
fn report_ends_with_a_summary() {
    let src = Src::new();
    let error = src.session.compile(&src.module("m", vec![unbound(&src, "f")])).unwrap_err();
    let mut emitter = TextEmitter::new(Vec::new());
    src.session.report(&error.diagnostics, &mut emitter).unwrap();

    let text = String::from_utf8(emitter.into_inner()).unwrap();
    assert!(text.starts_with("error[E1002] in f/0"));
    assert!(text.ends_with("1 error emitted\n"));
}

#[test]
fn failed_module_displays_its_error_count() {
    let src = Src::new();
    let def = src.module("broken", vec![unbound(&src, "f"), unbound(&src, "g")]);
    let error = src.session.compile(&def).unwrap_err();
    assert_eq!(error.to_string(), "module broken failed to compile with 2 error(s)");
}

#[test]
fn clean_module_has_no_diagnostics() {
    let src = Src::new();
    let pair = src.def("pair", &["A"], vec![Expr::tuple(vec![src.var("A"), src.var("A")])]);
    let compiled = src.compile(vec![pair]);
    assert!(compiled.diagnostics.is_empty());
    assert_eq!(compiled.name, "m");
}
