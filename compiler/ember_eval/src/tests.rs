use super::*;
use ember_ir::ast::{
    BinSegment, BinaryOp, CatchClass, CatchClause, Clause, ExceptionClass, Expr, ExprKind,
    FunctionDef, ModuleDef, Pattern, SegmentSize, SegmentSpec,
};
use ember_ir::{Name, Span, StringInterner};
use ember_mir::{FunctionBuilder, Module, ValueClass};
use ember_term::{Term, MAX_SMALL};
use ember_verify::VerifiedModule;
use pretty_assertions::assert_eq;

struct Src {
    names: StringInterner,
}

impl Src {
    fn new() -> Self {
        Src {
            names: StringInterner::new(),
        }
    }

    fn n(&self, text: &str) -> Name {
        self.names.intern(text)
    }

    fn var(&self, text: &str) -> Expr {
        Expr::var(self.n(text))
    }

    fn pvar(&self, text: &str) -> Pattern {
        Pattern::var(self.n(text))
    }

    fn atom(&self, text: &str) -> Expr {
        Expr::atom(self.n(text))
    }

    fn patom(&self, text: &str) -> Pattern {
        Pattern::atom(self.n(text))
    }

    fn call(&self, name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(self.n(name), args)
    }

    fn func(&self, name: &str, clauses: Vec<Clause>) -> FunctionDef {
        FunctionDef {
            name: self.n(name),
            arity: u32::try_from(clauses[0].patterns.len()).unwrap(),
            clauses,
            span: Span::DUMMY,
        }
    }

    /// Single-clause function without a guard.
    fn def(&self, name: &str, params: &[&str], body: Vec<Expr>) -> FunctionDef {
        let patterns = params.iter().map(|p| self.pvar(p)).collect();
        self.func(name, vec![Clause::new(patterns, None, body)])
    }

    fn catch(&self, class: ExceptionClass, reason: Pattern, body: Vec<Expr>) -> CatchClause {
        CatchClause {
            class: CatchClass::Exact(class),
            reason,
            guard: None,
            body,
            span: Span::DUMMY,
        }
    }

    fn verified(&self, functions: Vec<FunctionDef>) -> VerifiedModule {
        let def = ModuleDef {
            name: self.n("m"),
            functions,
            span: Span::DUMMY,
        };
        let module = ember_lower::lower_module(&def, &self.names).unwrap();
        seal(&self.names, module)
    }
}

fn seal(names: &StringInterner, module: Module) -> VerifiedModule {
    match ember_verify::verify(module, names) {
        Ok(verified) => verified,
        Err(errors) => {
            let report: Vec<String> = errors.iter().map(ToString::to_string).collect();
            panic!("test module failed verification:\n{}", report.join("\n"));
        }
    }
}

fn show(rt: &Runtime<'_>, exit: Option<Exit>) -> String {
    match exit {
        Some(Exit::Normal(value)) => rt.render(value),
        Some(Exit::Raised { class, reason }) => format!("{class}:{}", rt.render(reason)),
        None => "running".to_owned(),
    }
}

fn int(value: i64) -> Term {
    Term::small_int(value).unwrap()
}

// Clause selection

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
    let module = src.verified(vec![pick]);
    let mut rt = Runtime::new(&module, &src.names);

    let zero = rt.heap_mut().tuple(&[int(0)]);
    let exit = rt.call("pick", &[zero]).unwrap();
    assert_eq!(show(&rt, exit), "b");

    let five = rt.heap_mut().tuple(&[int(5)]);
    let exit = rt.call("pick", &[five]).unwrap();
    assert_eq!(show(&rt, exit), "a");
}

#[test]
fn no_matching_head_raises_function_clause() {
    let src = Src::new();
    let only_nil = src.func("only_nil", vec![Clause::new(vec![Pattern::nil()], None, vec![src.atom("ok")])]);
    let module = src.verified(vec![only_nil]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("only_nil", &[int(1)]).unwrap();
    assert!(matches!(exit, Some(Exit::Raised { class: ExceptionClass::Error, .. })));
}

#[test]
fn list_recursion_and_arithmetic() {
    let src = Src::new();
    let sum = src.func(
        "sum",
        vec![
            Clause::new(vec![Pattern::nil()], None, vec![Expr::int(0)]),
            Clause::new(
                vec![Pattern::cons(src.pvar("H"), src.pvar("T"))],
                None,
                vec![Expr::binop(
                    BinaryOp::Add,
                    src.var("H"),
                    src.call("sum", vec![src.var("T")]),
                )],
            ),
        ],
    );
    let module = src.verified(vec![sum]);
    let mut rt = Runtime::new(&module, &src.names);
    let list = rt.heap_mut().list(&[int(1), int(2), int(3), int(4)]);
    let exit = rt.call("sum", &[list]).unwrap();
    assert_eq!(show(&rt, exit), "10");
}

// Arithmetic

#[test]
fn small_overflow_takes_the_runtime_path() {
    let src = Src::new();
    let add = src.def(
        "add",
        &["A", "B"],
        vec![Expr::binop(BinaryOp::Add, src.var("A"), src.var("B"))],
    );
    let module = src.verified(vec![add]);
    let mut rt = Runtime::new(&module, &src.names);

    let exit = rt.call("add", &[int(MAX_SMALL), int(1)]).unwrap();
    assert_eq!(show(&rt, exit), (i128::from(MAX_SMALL) + 1).to_string());

    let nil = Term::NIL;
    let exit = rt.call("add", &[int(1), nil]).unwrap();
    assert_eq!(show(&rt, exit), "error:badarith");
}

#[test]
fn builtins_raise_badarg() {
    let src = Src::new();
    let second = src.def(
        "second",
        &["T"],
        vec![src.call("element", vec![Expr::int(2), src.var("T")])],
    );
    let module = src.verified(vec![second]);
    let mut rt = Runtime::new(&module, &src.names);

    let pair = rt.heap_mut().tuple(&[int(7), int(8)]);
    let exit = rt.call("second", &[pair]).unwrap();
    assert_eq!(show(&rt, exit), "8");

    let single = rt.heap_mut().tuple(&[int(7)]);
    let exit = rt.call("second", &[single]).unwrap();
    assert_eq!(show(&rt, exit), "error:badarg");
}

// Exceptions

#[test]
fn raise_in_a_try_region_reaches_the_handler() {
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
    let module = src.verified(vec![safe]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("safe", &[]).unwrap();
    assert_eq!(show(&rt, exit), "{caught,oops}");
}

#[test]
fn raise_outside_any_region_leaves_the_function() {
    let src = Src::new();
    let boom = src.def("boom", &[], vec![Expr::raise(ExceptionClass::Error, src.atom("bad"))]);
    let outer = src.def(
        "outer",
        &[],
        vec![Expr::try_catch(
            vec![src.call("boom", vec![])],
            vec![],
            vec![src.catch(ExceptionClass::Error, src.pvar("R"), vec![src.var("R")])],
        )],
    );
    let module = src.verified(vec![boom, outer]);
    let mut rt = Runtime::new(&module, &src.names);

    let exit = rt.call("boom", &[]).unwrap();
    assert_eq!(show(&rt, exit), "error:bad");

    // The callee has no handler; the caller's pending call does.
    let exit = rt.call("outer", &[]).unwrap();
    assert_eq!(show(&rt, exit), "bad");
}

#[test]
fn unmatched_class_is_rethrown() {
    let src = Src::new();
    let only_throws = src.def(
        "only_throws",
        &[],
        vec![Expr::try_catch(
            vec![Expr::raise(ExceptionClass::Exit, src.atom("shutdown"))],
            vec![],
            vec![src.catch(ExceptionClass::Throw, Pattern::wildcard(), vec![src.atom("caught")])],
        )],
    );
    let module = src.verified(vec![only_throws]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("only_throws", &[]).unwrap();
    assert_eq!(show(&rt, exit), "exit:shutdown");
}

// Closures

#[test]
fn closures_capture_their_environment() {
    let src = Src::new();
    let scale = src.def(
        "scale",
        &["N"],
        vec![
            Expr::matches(
                src.pvar("F"),
                Expr::fun(vec![Clause::new(
                    vec![src.pvar("K")],
                    None,
                    vec![Expr::binop(BinaryOp::Mul, src.var("K"), src.var("N"))],
                )]),
            ),
            Expr::apply(src.var("F"), vec![Expr::int(7)]),
        ],
    );
    let module = src.verified(vec![scale]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("scale", &[int(6)]).unwrap();
    assert_eq!(show(&rt, exit), "42");
}

#[test]
fn applying_with_the_wrong_arity_raises_badarity() {
    let src = Src::new();
    let misuse = src.def(
        "misuse",
        &[],
        vec![
            Expr::matches(
                src.pvar("F"),
                Expr::fun(vec![Clause::new(vec![src.pvar("K")], None, vec![src.var("K")])]),
            ),
            Expr::apply(src.var("F"), vec![Expr::int(1), Expr::int(2)]),
        ],
    );
    let module = src.verified(vec![misuse]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("misuse", &[]).unwrap();
    let shown = show(&rt, exit);
    assert!(shown.starts_with("error:{badarity,{#Fun<"), "{shown}");
    assert!(shown.ends_with(",[1,2]}}"), "{shown}");
}

// Processes

#[test]
fn receive_removes_only_the_matching_message() {
    let src = Src::new();
    let take_m2 = src.def(
        "take_m2",
        &[],
        vec![Expr::receive(
            vec![Clause::new(
                vec![Pattern::tuple(vec![src.patom("m2"), src.pvar("X")])],
                None,
                vec![src.var("X")],
            )],
            None,
        )],
    );
    let module = src.verified(vec![take_m2]);
    let mut rt = Runtime::new(&module, &src.names);

    let pid = rt.spawn("take_m2", &[]).unwrap();
    let m1 = rt.atom("m1");
    let m2_tag = rt.atom("m2");
    let m2 = rt.heap_mut().tuple(&[m2_tag, int(2)]);
    rt.send(pid, m1);
    rt.send(pid, m2);
    rt.run().unwrap();

    assert_eq!(show(&rt, rt.exit_of(pid)), "2");
    assert_eq!(rt.mailbox(pid), vec![m1]);
}

#[test]
fn receive_blocks_until_a_message_arrives() {
    let src = Src::new();
    let take = src.def(
        "take",
        &[],
        vec![Expr::receive(
            vec![Clause::new(vec![src.pvar("M")], None, vec![src.var("M")])],
            None,
        )],
    );
    let module = src.verified(vec![take]);
    let mut rt = Runtime::new(&module, &src.names);

    let pid = rt.spawn("take", &[]).unwrap();
    rt.run().unwrap();
    assert!(rt.is_alive(pid));
    assert_eq!(rt.exit_of(pid), None);

    let hello = rt.atom("hello");
    rt.send(pid, hello);
    rt.run().unwrap();
    assert_eq!(rt.exit_of(pid), Some(Exit::Normal(hello)));
}

#[test]
fn after_fires_on_the_virtual_clock() {
    let src = Src::new();
    let wait = src.def(
        "wait",
        &[],
        vec![Expr::receive(
            vec![Clause::new(
                vec![Pattern::tuple(vec![src.patom("msg"), src.pvar("M")])],
                None,
                vec![src.var("M")],
            )],
            Some((Expr::int(50), vec![src.atom("timeout")])),
        )],
    );
    let module = src.verified(vec![wait]);
    let mut rt = Runtime::new(&module, &src.names);

    let pid = rt.spawn("wait", &[]).unwrap();
    let noise = rt.atom("noise");
    rt.send(pid, noise);
    rt.run().unwrap();
    assert_eq!(show(&rt, rt.exit_of(pid)), "timeout");
    assert_eq!(rt.now(), 50);
    assert_eq!(rt.mailbox(pid), vec![noise]);
}

#[test]
fn bad_timeout_raises_timeout_value() {
    let src = Src::new();
    let wait = src.def(
        "wait",
        &["T"],
        vec![Expr::receive(
            vec![Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("got")])],
            Some((src.var("T"), vec![src.atom("timeout")])),
        )],
    );
    let module = src.verified(vec![wait]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("wait", &[int(-1)]).unwrap();
    assert_eq!(show(&rt, exit), "error:timeout_value");
    let exit = rt.call("wait", &[int(0)]).unwrap();
    assert_eq!(show(&rt, exit), "timeout");
}

#[test]
fn send_to_an_exited_process_neither_raises_nor_blocks() {
    let src = Src::new();
    let noop = src.def("noop", &[], vec![src.atom("ok")]);
    let poke = src.def(
        "poke",
        &["P"],
        vec![Expr::send(src.var("P"), src.atom("hello")), src.atom("done")],
    );
    let module = src.verified(vec![noop, poke]);
    let mut rt = Runtime::new(&module, &src.names);

    let dead = rt.spawn("noop", &[]).unwrap();
    rt.run().unwrap();
    assert!(!rt.is_alive(dead));

    let exit = rt.call("poke", &[dead]).unwrap();
    assert_eq!(show(&rt, exit), "done");
    assert!(rt.mailbox(dead).is_empty());
}

#[test]
fn spawned_processes_talk_to_each_other() {
    let src = Src::new();
    let echo = src.def(
        "echo",
        &[],
        vec![Expr::receive(
            vec![Clause::new(
                vec![Pattern::tuple(vec![src.pvar("From"), src.pvar("M")])],
                None,
                vec![Expr::send(
                    src.var("From"),
                    Expr::tuple(vec![src.atom("echo"), src.var("M")]),
                )],
            )],
            None,
        )],
    );
    let ping = src.def(
        "ping",
        &[],
        vec![
            Expr::matches(
                src.pvar("P"),
                Expr::spawn(Expr::fun_ref(src.n("echo"), 0), vec![]),
            ),
            Expr::send(
                src.var("P"),
                Expr::tuple(vec![src.call("self", vec![]), src.atom("hi")]),
            ),
            Expr::receive(
                vec![Clause::new(
                    vec![Pattern::tuple(vec![src.patom("echo"), src.pvar("R")])],
                    None,
                    vec![src.var("R")],
                )],
                None,
            ),
        ],
    );
    let module = src.verified(vec![echo, ping]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("ping", &[]).unwrap();
    assert_eq!(show(&rt, exit), "hi");
}

#[test]
fn spawning_a_closure_runs_it_with_its_captures() {
    let src = Src::new();
    let relay = src.def(
        "relay",
        &[],
        vec![
            Expr::matches(src.pvar("Parent"), src.call("self", vec![])),
            Expr::spawn(
                Expr::fun(vec![Clause::new(
                    vec![src.pvar("X")],
                    None,
                    vec![Expr::send(src.var("Parent"), src.var("X"))],
                )]),
                vec![Expr::int(9)],
            ),
            Expr::receive(vec![Clause::new(vec![src.pvar("V")], None, vec![src.var("V")])], None),
        ],
    );
    let module = src.verified(vec![relay]);
    let mut rt = Runtime::new(&module, &src.names);
    let exit = rt.call("relay", &[]).unwrap();
    assert_eq!(show(&rt, exit), "9");
}

// Binaries

#[test]
fn binaries_build_and_match() {
    let src = Src::new();
    let seg = |value, bits| BinSegment::new(value, SegmentSize::Literal(bits), SegmentSpec::INTEGER);
    let pack = src.def(
        "pack",
        &["A", "B"],
        vec![Expr::new(
            ExprKind::Bin(vec![seg(src.var("A"), 8), seg(src.var("B"), 16)]),
            Span::DUMMY,
        )],
    );
    let unpack = src.func(
        "unpack",
        vec![
            Clause::new(
                vec![Pattern::bin(vec![
                    BinSegment::new(src.pvar("X"), SegmentSize::Literal(8), SegmentSpec::INTEGER),
                    BinSegment::new(src.pvar("Y"), SegmentSize::Literal(16), SegmentSpec::INTEGER),
                ])],
                None,
                vec![Expr::tuple(vec![src.var("X"), src.var("Y")])],
            ),
            Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("short")]),
        ],
    );
    let module = src.verified(vec![pack, unpack]);
    let mut rt = Runtime::new(&module, &src.names);

    let Some(Exit::Normal(packed)) = rt.call("pack", &[int(1), int(515)]).unwrap() else {
        panic!("pack did not return");
    };
    assert_eq!(rt.render(packed), "<<1,2,3>>");

    let exit = rt.call("unpack", &[packed]).unwrap();
    assert_eq!(show(&rt, exit), "{1,515}");

    let short = rt.heap_mut().binary(&[1, 2]);
    let exit = rt.call("unpack", &[short]).unwrap();
    assert_eq!(show(&rt, exit), "short");

    let exit = rt.call("pack", &[Term::NIL, int(0)]).unwrap();
    assert_eq!(show(&rt, exit), "error:badarg");
}

// Limits and errors

#[test]
fn runaway_loops_hit_the_reduction_limit() {
    let src = Src::new();
    let spin = src.def("spin", &["N"], vec![src.call("spin", vec![src.var("N")])]);
    let module = src.verified(vec![spin]);
    let config = RuntimeConfig {
        max_reductions: 1_000,
        ..RuntimeConfig::default()
    };
    let mut rt = Runtime::with_config(&module, &src.names, config);
    let err = rt.call("spin", &[int(0)]).unwrap_err();
    assert_eq!(err, EvalError::ReductionLimit { limit: 1_000 });
}

#[test]
fn deep_recursion_raises_system_limit() {
    let src = Src::new();
    let spin = src.def("spin", &["N"], vec![src.call("spin", vec![src.var("N")])]);
    let module = src.verified(vec![spin]);
    let config = RuntimeConfig {
        max_call_depth: 64,
        ..RuntimeConfig::default()
    };
    let mut rt = Runtime::with_config(&module, &src.names, config);
    let exit = rt.call("spin", &[int(0)]).unwrap();
    assert_eq!(show(&rt, exit), "error:system_limit");
}

#[test]
fn unknown_entry_points_are_reported() {
    let src = Src::new();
    let module = src.verified(vec![src.def("f", &[], vec![src.atom("ok")])]);
    let mut rt = Runtime::new(&module, &src.names);
    assert_eq!(
        rt.spawn("f", &[int(1)]),
        Err(EvalError::UnknownFunction {
            name: "f".to_owned(),
            arity: 1
        })
    );
    assert!(rt.spawn("missing", &[]).is_err());
}

#[test]
fn hand_built_mir_runs_without_lowering() {
    let names = StringInterner::new();
    let mut b = FunctionBuilder::new(names.intern("first"), 1, Span::DUMMY);
    let pair = b.add_param(ValueClass::Term);
    let head = b.get_tuple_element(pair, 0);
    b.ret(head);
    let mut module = Module::new(names.intern("m"));
    module.add_function(b.finish());
    let module = seal(&names, module);

    let mut rt = Runtime::new(&module, &names);
    let pair = rt.heap_mut().tuple(&[int(3), int(4)]);
    assert_eq!(rt.call("first", &[pair]).unwrap(), Some(Exit::Normal(int(3))));
    assert!(rt.reductions() > 0);
}
