//! Several modules through one session.

use ember_ir::ast::{BinaryOp, Clause, Expr, FunctionDef, ModuleDef, Pattern};
use emberc::{init_tracing, CompileConfig, Session};
use pretty_assertions::assert_eq;

use crate::common::{int, show, Src};

/// `len([]) -> 0; len([_ | T]) -> 1 + len(T).`
fn len(src: &Src) -> FunctionDef {
    src.func(
        "len",
        vec![
            Clause::new(vec![Pattern::nil()], None, vec![Expr::int(0)]),
            Clause::new(
                vec![Pattern::cons(Pattern::wildcard(), src.pvar("T"))],
                None,
                vec![Expr::binop(BinaryOp::Add, Expr::int(1), src.call("len", vec![src.var("T")]))],
            ),
        ],
    )
}

fn batch(src: &Src) -> Vec<ModuleDef> {
    (0..6)
        .map(|i| {
            let tag = src.def("tag", &[], vec![src.atom(&format!("module_{i}"))]);
            src.module(&format!("m{i}"), vec![len(src), tag])
        })
        .collect()
}

#[test]
fn parallel_batch_matches_sequential() {
    let src = Src::with_config(CompileConfig::default());
    let defs = batch(&src);
    let sequential = Session::with_interner(src.session.interner().clone(), CompileConfig::sequential());

    let parallel: Vec<_> = src.session.compile_all(&defs).into_iter().map(Result::unwrap).collect();
    let serial: Vec<_> = sequential.compile_all(&defs).into_iter().map(Result::unwrap).collect();

    let names: Vec<&str> = parallel.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["m0", "m1", "m2", "m3", "m4", "m5"]);
    for (a, b) in parallel.iter().zip(&serial) {
        assert_eq!(a.emitted, b.emitted);
    }
}

#[test]
fn parallel_functions_emit_identically() {
    let src = Src::new();
    let defs = batch(&src);
    let config = CompileConfig {
        parallel_functions: true,
        ..CompileConfig::sequential()
    };
    let wide = Session::with_interner(src.session.interner().clone(), config);

    let a = src.session.compile(&defs[0]).unwrap();
    let b = wide.compile(&defs[0]).unwrap();
    assert_eq!(a.emitted, b.emitted);
}

#[test]
fn a_failing_module_does_not_stop_its_neighbours() {
    let src = Src::with_config(CompileConfig::default());
    let mut defs = batch(&src);
    defs.insert(2, src.module("bad", vec![src.def("f", &[], vec![src.var("Nope")])]));

    let results = src.session.compile_all(&defs);
    assert_eq!(results.len(), 7);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert_eq!(results[2].as_ref().unwrap_err().module, "bad");
}

#[test]
fn modules_share_atoms_through_the_session() {
    let src = Src::with_config(CompileConfig::default());
    let defs = batch(&src);
    let compiled: Vec<_> = src.session.compile_all(&defs).into_iter().map(Result::unwrap).collect();

    let mut rt = src.runtime(&compiled[3]);
    let exit = rt.call("tag", &[]).unwrap();
    assert_eq!(show(&rt, exit), "module_3");

    let list = rt.heap_mut().list(&[int(1), int(2), int(3)]);
    let exit = rt.call("len", &[list]).unwrap();
    assert_eq!(show(&rt, exit), "3");
}

#[test]
fn tracing_init_answers_the_same_every_time() {
    let first = init_tracing();
    assert_eq!(init_tracing(), first);
}
