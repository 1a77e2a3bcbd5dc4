//! Compiled modules running on the reference runtime.

use ember_ir::ast::{BinaryOp, Clause, ExceptionClass, Expr, Pattern};
use ember_term::BigInt;
use pretty_assertions::assert_eq;

use crate::common::{int, show, Src};

#[test]
fn guard_failure_falls_through_to_the_next_clause() {
    let src = Src::new();
    let pick = src.func(
        "pick",
        vec![
            Clause::new(
                vec![Pattern::tuple(vec![src.pvar("X")])],
                Some(Expr::binop(BinaryOp::Gt, src.var("X"), Expr::int(0))),
                vec![src.atom("a")],
            ),
            Clause::new(vec![Pattern::tuple(vec![src.pvar("X")])], None, vec![src.atom("b")]),
        ],
    );
    let compiled = src.compile(vec![pick]);
    let mut rt = src.runtime(&compiled);

    let zero = rt.heap_mut().tuple(&[int(0)]);
    let exit = rt.call("pick", &[zero]).unwrap();
    assert_eq!(show(&rt, exit), "b");
}

#[test]
fn receive_removes_only_the_matching_message() {
    let src = Src::new();
    let take_m2 = src.def(
        "take_m2",
        &[],
        vec![Expr::receive(
            vec![Clause::new(vec![src.patom("m2")], None, vec![src.atom("got_m2")])],
            None,
        )],
    );
    let compiled = src.compile(vec![take_m2]);
    let mut rt = src.runtime(&compiled);

    let pid = rt.spawn("take_m2", &[]).unwrap();
    let m1 = rt.atom("m1");
    let m2 = rt.atom("m2");
    rt.send(pid, m1);
    rt.send(pid, m2);
    rt.run().unwrap();

    assert_eq!(show(&rt, rt.exit_of(pid)), "got_m2");
    assert_eq!(rt.mailbox(pid), vec![m1]);
}

#[test]
fn send_to_a_terminated_process_neither_raises_nor_blocks() {
    let src = Src::new();
    let quit = src.def("quit", &[], vec![src.atom("ok")]);
    let poke = src.def(
        "poke",
        &["P"],
        vec![Expr::send(src.var("P"), src.atom("hello")), src.atom("sent")],
    );
    let compiled = src.compile(vec![quit, poke]);
    let mut rt = src.runtime(&compiled);

    let dead = rt.spawn("quit", &[]).unwrap();
    rt.run().unwrap();
    assert!(!rt.is_alive(dead));

    let exit = rt.call("poke", &[dead]).unwrap();
    assert_eq!(show(&rt, exit), "sent");
}

#[test]
fn raise_in_a_try_region_binds_the_exception_in_the_handler() {
    let src = Src::new();
    let safe = src.def(
        "safe",
        &[],
        vec![Expr::try_catch(
            vec![Expr::raise(ExceptionClass::Throw, src.atom("oops"))],
            vec![],
            vec![src.catch(
                ExceptionClass::Throw,
                src.pvar("R"),
                vec![Expr::tuple(vec![src.atom("caught"), src.var("R")])],
            )],
        )],
    );
    let compiled = src.compile(vec![safe]);
    let mut rt = src.runtime(&compiled);
    let exit = rt.call("safe", &[]).unwrap();
    assert_eq!(show(&rt, exit), "{caught,oops}");
}

#[test]
fn raise_outside_any_region_propagates_to_the_caller() {
    let src = Src::new();
    let boom = src.def("boom", &[], vec![Expr::raise(ExceptionClass::Error, src.atom("bad"))]);
    let guarded = src.def(
        "guarded",
        &[],
        vec![Expr::try_catch(
            vec![src.call("boom", vec![])],
            vec![],
            vec![src.catch(
                ExceptionClass::Error,
                src.pvar("R"),
                vec![Expr::tuple(vec![src.atom("recovered"), src.var("R")])],
            )],
        )],
    );
    let compiled = src.compile(vec![boom, guarded]);
    let mut rt = src.runtime(&compiled);

    let exit = rt.call("boom", &[]).unwrap();
    assert_eq!(show(&rt, exit), "error:bad");
    let exit = rt.call("guarded", &[]).unwrap();
    assert_eq!(show(&rt, exit), "{recovered,bad}");
}

#[test]
fn closures_and_processes_work_together() {
    let src = Src::new();
    // run(N) -> Parent = self(), spawn(fun(X) -> Parent ! X * 2 end, [N]),
    //           receive V -> V end.
    let run = src.def(
        "run",
        &["N"],
        vec![
            Expr::matches(src.pvar("Parent"), src.call("self", vec![])),
            Expr::spawn(
                Expr::fun(vec![Clause::new(
                    vec![src.pvar("X")],
                    None,
                    vec![Expr::send(
                        src.var("Parent"),
                        Expr::binop(BinaryOp::Mul, src.var("X"), Expr::int(2)),
                    )],
                )]),
                vec![src.var("N")],
            ),
            Expr::receive(vec![Clause::new(vec![src.pvar("V")], None, vec![src.var("V")])], None),
        ],
    );
    let compiled = src.compile(vec![run]);
    let mut rt = src.runtime(&compiled);
    let exit = rt.call("run", &[int(21)]).unwrap();
    assert_eq!(show(&rt, exit), "42");
}

#[test]
fn integer_arithmetic_has_no_width_limit() {
    let src = Src::new();
    let square = src.def(
        "square",
        &["X"],
        vec![Expr::binop(BinaryOp::Mul, src.var("X"), src.var("X"))],
    );
    let googol = src.def(
        "googol_plus",
        &["X"],
        vec![Expr::binop(
            BinaryOp::Add,
            Expr::integer(BigInt::from(10).pow(100)),
            src.var("X"),
        )],
    );
    let compiled = src.compile(vec![square, googol]);
    let mut rt = src.runtime(&compiled);

    let x = rt.heap_mut().integer(BigInt::from(1) << 70u32);
    let exit = rt.call("square", &[x]).unwrap();
    assert_eq!(show(&rt, exit), (BigInt::from(1) << 140u32).to_string());

    let exit = rt.call("googol_plus", &[int(1)]).unwrap();
    assert_eq!(show(&rt, exit), format!("1{}1", "0".repeat(99)));
}
