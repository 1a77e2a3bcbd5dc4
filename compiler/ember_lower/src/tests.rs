use super::*;
use ember_diagnostic::ErrorCode;
use ember_ir::ast::{
    BinaryOp, CatchClass, CatchClause, Clause, ExceptionClass, Expr, ExprKind, FunctionDef, IfClause,
    ModuleDef, Pattern,
};
use ember_ir::{Name, Span, StringInterner};
use ember_mir::{Function, FunctionOrigin, MatchKind, Op, RaiseKind, SpawnTarget, Terminator};
use pretty_assertions::assert_eq;

struct Src {
    interner: StringInterner,
}

impl Src {
    fn new() -> Self {
        Src {
            interner: StringInterner::new(),
        }
    }

    fn n(&self, text: &str) -> Name {
        self.interner.intern(text)
    }

    fn atom(&self, text: &str) -> Expr {
        Expr::atom(self.n(text))
    }

    fn var(&self, text: &str) -> Expr {
        Expr::var(self.n(text))
    }

    fn pvar(&self, text: &str) -> Pattern {
        Pattern::var(self.n(text))
    }

    fn func(&self, name: &str, clauses: Vec<Clause>) -> FunctionDef {
        let arity = clauses.first().map_or(0, |c| c.patterns.len());
        FunctionDef {
            name: self.n(name),
            arity: u32::try_from(arity).unwrap(),
            clauses,
            span: Span::DUMMY,
        }
    }

    fn module(&self, functions: Vec<FunctionDef>) -> ModuleDef {
        ModuleDef {
            name: self.n("m"),
            functions,
            span: Span::DUMMY,
        }
    }

    fn lower(&self, functions: Vec<FunctionDef>) -> Result<Module, Vec<FunctionError>> {
        let def = self.module(functions);
        lower_module(&def, &self.interner)
    }

    fn lower_ok(&self, functions: Vec<FunctionDef>) -> Module {
        match self.lower(functions) {
            Ok(module) => module,
            Err(errors) => panic!("lowering failed: {errors:?}"),
        }
    }

    fn errors(&self, functions: Vec<FunctionDef>) -> Vec<FunctionError> {
        match self.lower(functions) {
            Ok(module) => panic!("expected errors, got\n{}", module.display(&self.interner)),
            Err(errors) => errors,
        }
    }

    fn function<'m>(&self, module: &'m Module, name: &str) -> &'m Function {
        module
            .functions
            .iter()
            .find(|f| f.name == self.n(name))
            .unwrap()
    }
}

fn ops(function: &Function) -> impl Iterator<Item = &Op> {
    function.blocks.iter().flat_map(|b| b.instrs.iter().map(|i| &i.op))
}

fn terminators(function: &Function) -> impl Iterator<Item = &Terminator> {
    function.blocks.iter().filter_map(|b| b.terminator.as_ref())
}

fn count_ops(function: &Function, pred: impl Fn(&Op) -> bool) -> usize {
    ops(function).filter(|op| pred(op)).count()
}

#[test]
fn identity_function_returns_its_parameter() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "id",
        vec![Clause::new(vec![src.pvar("X")], None, vec![src.var("X")])],
    )]);
    assert_eq!(module.functions.len(), 1);
    let id = &module.functions[0];
    assert_eq!(id.params.len(), 1);
    let returns: Vec<_> = terminators(id)
        .filter_map(|t| match t {
            Terminator::Return { value } => Some(*value),
            _ => None,
        })
        .collect();
    assert_eq!(returns.len(), 1);
    assert_eq!(id.match_sites.len(), 1);
    assert_eq!(id.match_sites[0].kind, MatchKind::FunctionHead);
    assert!(!id.match_sites[0].fail_reachable);
}

#[test]
fn inexhaustive_head_raises_function_clause() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "one",
        vec![Clause::new(vec![Pattern::int(1)], None, vec![src.atom("yes")])],
    )]);
    let one = &module.functions[0];
    assert!(one.match_sites[0].fail_reachable);
    let raises = terminators(one)
        .filter(|t| {
            matches!(
                t,
                Terminator::Raise {
                    kind: RaiseKind::New {
                        class: ExceptionClass::Error,
                        ..
                    },
                    handler: None,
                }
            )
        })
        .count();
    assert_eq!(raises, 1);
    assert!(module.atoms().contains(&src.n("function_clause")));
}

#[test]
fn unbound_variable_is_reported_with_its_name() {
    let src = Src::new();
    let errors = src.errors(vec![src.func("f", vec![Clause::new(vec![], None, vec![src.var("Y")])])]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].function, "f/0");
    assert_eq!(
        errors[0].error,
        SourceError::UnboundVariable {
            name: src.n("Y"),
            span: Span::DUMMY
        }
    );
    let diagnostic = errors[0].to_diagnostic(&src.interner);
    assert_eq!(diagnostic.code, ErrorCode::E1002);
    assert!(diagnostic.message.contains("'Y'"));
}

#[test]
fn every_failing_function_is_reported() {
    let src = Src::new();
    let errors = src.errors(vec![
        src.func("a", vec![Clause::new(vec![], None, vec![src.var("Nope")])]),
        src.func("b", vec![Clause::new(vec![], None, vec![src.atom("fine")])]),
        src.func(
            "c",
            vec![Clause::new(vec![], None, vec![Expr::call(src.n("missing"), vec![])])],
        ),
    ]);
    let functions: Vec<&str> = errors.iter().map(|e| e.function.as_str()).collect();
    assert_eq!(functions, vec!["a/0", "c/0"]);
    assert_eq!(errors[1].error.code(), ErrorCode::E1005);
}

#[test]
fn duplicate_definitions_are_rejected() {
    let src = Src::new();
    let body = || vec![Clause::new(vec![], None, vec![src.atom("ok")])];
    let errors = src.errors(vec![src.func("f", body()), src.func("f", body())]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.code(), ErrorCode::E1007);
}

#[test]
fn local_calls_in_guards_are_illegal() {
    let src = Src::new();
    let guard = Expr::call(src.n("helper"), vec![src.var("X")]);
    let errors = src.errors(vec![
        src.func(
            "f",
            vec![Clause::new(vec![src.pvar("X")], Some(guard), vec![src.atom("ok")])],
        ),
        src.func("helper", vec![Clause::new(vec![src.pvar("X")], None, vec![src.atom("true")])]),
    ]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.code(), ErrorCode::E1003);
}

#[test]
fn case_in_guard_is_illegal() {
    let src = Src::new();
    let guard = Expr::case(
        src.var("X"),
        vec![Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("true")])],
    );
    let errors = src.errors(vec![src.func(
        "f",
        vec![Clause::new(vec![src.pvar("X")], Some(guard), vec![src.atom("ok")])],
    )]);
    assert!(matches!(
        errors[0].error,
        SourceError::IllegalGuard {
            what: "a case expression",
            ..
        }
    ));
}

#[test]
fn guard_raises_are_routed_to_the_next_clause() {
    // f(X) when hd(X) =:= 1 -> one; f(_) -> other.
    let src = Src::new();
    let guard = Expr::binop(
        BinaryOp::ExactEq,
        Expr::call(src.n("hd"), vec![src.var("X")]),
        Expr::int(1),
    );
    let module = src.lower_ok(vec![src.func(
        "f",
        vec![
            Clause::new(vec![src.pvar("X")], Some(guard), vec![src.atom("one")]),
            Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("other")]),
        ],
    )]);
    let f = &module.functions[0];
    let hd = f
        .blocks
        .iter()
        .flat_map(|b| &b.instrs)
        .find(|i| matches!(i.op, Op::RuntimeCall { func: ember_mir::RuntimeFn::Hd, .. }))
        .unwrap();
    let handler = f.block(hd.handler.unwrap()).unwrap();
    assert_eq!(handler.params.len(), 1);
    assert!(matches!(handler.terminator, Some(Terminator::Jump { .. })));
}

#[test]
fn type_test_guards_use_kind_checks() {
    let src = Src::new();
    let guard = Expr::call(src.n("is_list"), vec![src.var("X")]);
    let module = src.lower_ok(vec![src.func(
        "f",
        vec![
            Clause::new(vec![src.pvar("X")], Some(guard), vec![src.atom("list")]),
            Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("other")]),
        ],
    )]);
    let f = &module.functions[0];
    assert_eq!(count_ops(f, |op| matches!(op, Op::TermKindOf { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::RuntimeCall { .. })), 0);
}

#[test]
fn closures_are_lifted_with_their_captures() {
    // adder(X) -> fun(Y) -> X + Y end.
    let src = Src::new();
    let fun = Expr::fun(vec![Clause::new(
        vec![src.pvar("Y")],
        None,
        vec![Expr::binop(BinaryOp::Add, src.var("X"), src.var("Y"))],
    )]);
    let module = src.lower_ok(vec![src.func(
        "adder",
        vec![Clause::new(vec![src.pvar("X")], None, vec![fun])],
    )]);
    assert_eq!(module.functions.len(), 2);

    let adder = &module.functions[0];
    let make = ops(adder)
        .find_map(|op| match op {
            Op::MakeClosure {
                function,
                arity,
                env,
                ..
            } => Some((*function, *arity, env.len())),
            _ => None,
        })
        .unwrap();
    assert_eq!(make, (ember_mir::FuncId::new(1), 1, 1));

    let body = src.function(&module, "-adder/1-fun-0-");
    assert_eq!(
        body.origin,
        FunctionOrigin::Closure {
            parent: ember_mir::FuncId::new(0),
            index: 0
        }
    );
    let env = body.env.as_ref().unwrap();
    assert_eq!(env.captures.len(), 1);
    assert_eq!(env.captures[0].name, src.n("X"));
    assert_eq!(body.params.len(), 2);
    assert_eq!(body.arity, 1);
    assert_eq!(count_ops(body, |op| matches!(op, Op::GetEnv { index: 0, .. })), 1);
    assert_eq!(count_ops(body, |op| matches!(op, Op::CheckedArith { .. })), 1);
}

#[test]
fn fun_parameters_shadow_captured_names() {
    // f(X) -> fun(X) -> X end.
    let src = Src::new();
    let fun = Expr::fun(vec![Clause::new(vec![src.pvar("X")], None, vec![src.var("X")])]);
    let module = src.lower_ok(vec![src.func("f", vec![Clause::new(vec![src.pvar("X")], None, vec![fun])])]);
    let body = src.function(&module, "-f/1-fun-0-");
    // The head binds X afresh: no equality check against the capture.
    assert_eq!(count_ops(body, |op| matches!(op, Op::TermEq { .. })), 0);
    assert!(!body.match_sites[0].fail_reachable);
}

#[test]
fn nested_funs_are_numbered_within_their_source_function() {
    let src = Src::new();
    let inner = Expr::fun(vec![Clause::new(vec![], None, vec![src.atom("inner")])]);
    let outer = Expr::fun(vec![Clause::new(vec![], None, vec![inner])]);
    let module = src.lower_ok(vec![src.func("f", vec![Clause::new(vec![], None, vec![outer])])]);
    let names: Vec<&str> = module
        .functions
        .iter()
        .map(|f| src.interner.lookup(f.name))
        .collect();
    assert_eq!(names, vec!["f", "-f/0-fun-0-", "-f/0-fun-1-"]);
}

#[test]
fn fun_references_share_one_trampoline() {
    let src = Src::new();
    let reference = || Expr::fun_ref(src.n("target"), 1);
    let module = src.lower_ok(vec![
        src.func(
            "refs",
            vec![Clause::new(vec![], None, vec![Expr::tuple(vec![reference(), reference()])])],
        ),
        src.func("target", vec![Clause::new(vec![src.pvar("A")], None, vec![src.var("A")])]),
    ]);
    assert_eq!(module.functions.len(), 3);
    let trampoline = src.function(&module, "-target/1-ref-");
    assert_eq!(
        trampoline.origin,
        FunctionOrigin::Trampoline {
            target: ember_mir::FuncId::new(1)
        }
    );
    assert_eq!(trampoline.params.len(), 2);
    assert_eq!(count_ops(trampoline, |op| matches!(op, Op::Call { .. })), 1);
}

#[test]
fn unknown_fun_reference_is_an_error() {
    let src = Src::new();
    let errors = src.errors(vec![src.func(
        "f",
        vec![Clause::new(vec![], None, vec![Expr::fun_ref(src.n("ghost"), 2)])],
    )]);
    assert_eq!(
        errors[0].error,
        SourceError::UnknownFunction {
            name: src.n("ghost"),
            arity: 2,
            span: Span::DUMMY
        }
    );
}

#[test]
fn apply_checks_kind_and_arity() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "call",
        vec![Clause::new(
            vec![src.pvar("F")],
            None,
            vec![Expr::apply(src.var("F"), vec![Expr::int(1)])],
        )],
    )]);
    let f = &module.functions[0];
    assert_eq!(count_ops(f, |op| matches!(op, Op::IsKind { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::ClosureArity { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::CallIndirect { .. })), 1);
    for reason in ["badfun", "badarity"] {
        assert!(module.atoms().contains(&src.n(reason)), "{reason}");
    }
}

#[test]
fn spawning_a_static_reference_is_direct() {
    let src = Src::new();
    let module = src.lower_ok(vec![
        src.func(
            "start",
            vec![Clause::new(
                vec![],
                None,
                vec![Expr::spawn(Expr::fun_ref(src.n("loop"), 1), vec![Expr::int(0)])],
            )],
        ),
        src.func("loop", vec![Clause::new(vec![src.pvar("N")], None, vec![src.var("N")])]),
    ]);
    let start = &module.functions[0];
    let targets: Vec<SpawnTarget> = ops(start)
        .filter_map(|op| match op {
            Op::Spawn { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(targets, vec![SpawnTarget::Direct(ember_mir::FuncId::new(1))]);
    // No trampoline was needed.
    assert_eq!(module.functions.len(), 2);
}

#[test]
fn receive_without_after_never_times_out() {
    // f() -> receive {ok, X} -> X end.
    let src = Src::new();
    let clause = Clause::new(
        vec![Pattern::tuple(vec![Pattern::atom(src.n("ok")), src.pvar("X")])],
        None,
        vec![src.var("X")],
    );
    let module = src.lower_ok(vec![src.func(
        "f",
        vec![Clause::new(vec![], None, vec![Expr::receive(vec![clause], None)])],
    )]);
    let f = &module.functions[0];
    assert_eq!(count_ops(f, |op| matches!(op, Op::ReceiveStart { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::ReceiveMessage { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::ReceiveNext { .. })), 1);
    assert_eq!(count_ops(f, |op| matches!(op, Op::ReceiveDone { .. })), 1);

    let (timeout, waits) = terminators(f)
        .filter_map(|t| match t {
            Terminator::ReceiveWait { timeout, .. } => Some(*timeout),
            _ => None,
        })
        .fold((None, 0), |(_, n), t| (Some(t), n + 1));
    assert_eq!(waits, 1);
    let timeout = f.block(timeout.unwrap()).unwrap();
    assert_eq!(timeout.terminator, Some(Terminator::Unreachable));
    assert!(f.match_sites.iter().any(|s| s.kind == MatchKind::Receive));
}

#[test]
fn receive_after_consumes_nothing_and_runs_the_body() {
    let src = Src::new();
    let after = (Expr::int(0), vec![src.atom("timeout")]);
    let clause = Clause::new(vec![src.pvar("M")], None, vec![src.var("M")]);
    let module = src.lower_ok(vec![src.func(
        "f",
        vec![Clause::new(vec![], None, vec![Expr::receive(vec![clause], Some(after))])],
    )]);
    let f = &module.functions[0];
    // One done per clause body, one on the timeout path.
    assert_eq!(count_ops(f, |op| matches!(op, Op::ReceiveDone { .. })), 2);
    assert!(!terminators(f).any(|t| matches!(t, Terminator::Unreachable)));
}

#[test]
fn try_region_names_its_handler() {
    // f() -> try g() catch throw:R -> R end.
    let src = Src::new();
    let try_expr = Expr::try_catch(
        vec![Expr::call(src.n("g"), vec![])],
        vec![],
        vec![CatchClause {
            class: CatchClass::Exact(ExceptionClass::Throw),
            reason: src.pvar("R"),
            guard: None,
            body: vec![src.var("R")],
            span: Span::DUMMY,
        }],
    );
    let module = src.lower_ok(vec![
        src.func("f", vec![Clause::new(vec![], None, vec![try_expr])]),
        src.func("g", vec![Clause::new(vec![], None, vec![src.atom("ok")])]),
    ]);
    let f = &module.functions[0];
    let handler = ops(f)
        .find_map(|op| match op {
            Op::TryEnter { handler } => Some(*handler),
            _ => None,
        })
        .unwrap();
    let call = f
        .blocks
        .iter()
        .flat_map(|b| &b.instrs)
        .find(|i| matches!(i.op, Op::Call { .. }))
        .unwrap();
    assert_eq!(call.handler, Some(handler));
    assert_eq!(count_ops(f, |op| matches!(op, Op::TryExit)), 1);

    let dispatch = f.block(handler).unwrap().terminator.clone().unwrap();
    let Terminator::CatchDispatch { cases, .. } = dispatch else {
        panic!("handler does not dispatch: {dispatch:?}");
    };
    let classes: Vec<ExceptionClass> = cases.iter().map(|(c, _)| *c).collect();
    assert_eq!(classes, vec![ExceptionClass::Throw]);
    assert!(terminators(f).any(|t| matches!(
        t,
        Terminator::Raise {
            kind: RaiseKind::Rethrow { .. },
            handler: None
        }
    )));
}

#[test]
fn raise_outside_a_try_leaves_the_function() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "boom",
        vec![Clause::new(
            vec![],
            None,
            vec![Expr::raise(ExceptionClass::Exit, src.atom("bye")), src.atom("never")],
        )],
    )]);
    let boom = &module.functions[0];
    assert_eq!(
        terminators(boom)
            .filter(|t| matches!(t, Terminator::Raise { handler: None, .. }))
            .count(),
        1
    );
    // The code after the raise is dropped.
    assert!(!terminators(boom).any(|t| matches!(t, Terminator::Return { .. })));
}

#[test]
fn variables_bound_in_every_case_arm_are_exported() {
    // f(X) -> case X of 1 -> Y = a; _ -> Y = b end, Y.
    let src = Src::new();
    let bind = |v: &str| Expr::matches(src.pvar("Y"), src.atom(v));
    let case = Expr::case(
        src.var("X"),
        vec![
            Clause::new(vec![Pattern::int(1)], None, vec![bind("a")]),
            Clause::new(vec![Pattern::wildcard()], None, vec![bind("b")]),
        ],
    );
    let module = src.lower_ok(vec![src.func(
        "f",
        vec![Clause::new(vec![src.pvar("X")], None, vec![case, src.var("Y")])],
    )]);
    let f = &module.functions[0];
    // The merge block carries the case value and Y.
    assert!(f.blocks.iter().any(|b| b.params.len() == 2));
}

#[test]
fn variables_bound_in_some_arms_are_not_exported() {
    let src = Src::new();
    let case = Expr::case(
        src.var("X"),
        vec![
            Clause::new(vec![Pattern::int(1)], None, vec![Expr::matches(src.pvar("Y"), Expr::int(1))]),
            Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("no")]),
        ],
    );
    let errors = src.errors(vec![src.func(
        "f",
        vec![Clause::new(vec![src.pvar("X")], None, vec![case, src.var("Y")])],
    )]);
    assert_eq!(errors[0].error.code(), ErrorCode::E1002);
}

#[test]
fn try_exports_nothing() {
    let src = Src::new();
    let try_expr = Expr::try_catch(
        vec![Expr::matches(src.pvar("Y"), Expr::int(1))],
        vec![],
        vec![CatchClause {
            class: CatchClass::Any,
            reason: Pattern::wildcard(),
            guard: None,
            body: vec![Expr::matches(src.pvar("Y"), Expr::int(2))],
            span: Span::DUMMY,
        }],
    );
    let errors = src.errors(vec![src.func(
        "f",
        vec![Clause::new(vec![], None, vec![try_expr, src.var("Y")])],
    )]);
    assert_eq!(errors[0].error.code(), ErrorCode::E1002);
}

#[test]
fn if_without_a_true_guard_raises_if_clause() {
    let src = Src::new();
    let if_expr = Expr::new(
        ExprKind::If {
            clauses: vec![IfClause {
                guard: Expr::binop(BinaryOp::Gt, src.var("X"), Expr::int(0)),
                body: vec![src.atom("positive")],
                span: Span::DUMMY,
            }],
        },
        Span::DUMMY,
    );
    let module = src.lower_ok(vec![src.func("f", vec![Clause::new(vec![src.pvar("X")], None, vec![if_expr])])]);
    let f = &module.functions[0];
    let site = f.match_sites.iter().find(|s| s.kind == MatchKind::If).unwrap();
    assert!(site.fail_reachable);
    assert!(module.atoms().contains(&src.n("if_clause")));
}

#[test]
fn addition_has_a_small_integer_fast_path() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "add",
        vec![Clause::new(
            vec![src.pvar("A"), src.pvar("B")],
            None,
            vec![Expr::binop(BinaryOp::Add, src.var("A"), src.var("B"))],
        )],
    )]);
    let add = &module.functions[0];
    assert_eq!(count_ops(add, |op| matches!(op, Op::CheckedArith { .. })), 1);
    assert_eq!(count_ops(add, |op| matches!(op, Op::TagInt { .. })), 1);
    assert_eq!(
        count_ops(add, |op| matches!(
            op,
            Op::RuntimeCall {
                func: ember_mir::RuntimeFn::Add,
                ..
            }
        )),
        1
    );
}

#[test]
fn comparisons_fall_back_to_term_order() {
    let src = Src::new();
    let module = src.lower_ok(vec![src.func(
        "lt",
        vec![Clause::new(
            vec![src.pvar("A"), src.pvar("B")],
            None,
            vec![Expr::binop(BinaryOp::Lt, src.var("A"), src.var("B"))],
        )],
    )]);
    let lt = &module.functions[0];
    assert_eq!(count_ops(lt, |op| matches!(op, Op::IntCmp { .. })), 2);
    assert_eq!(count_ops(lt, |op| matches!(op, Op::TermCompare { .. })), 1);
}

#[test]
fn unbound_binary_size_is_reported() {
    let src = Src::new();
    let bin = Expr::new(
        ExprKind::Bin(vec![ember_ir::ast::BinSegment::new(
            Expr::int(1),
            ember_ir::ast::SegmentSize::Var(src.n("N")),
            ember_ir::ast::SegmentSpec::INTEGER,
        )]),
        Span::DUMMY,
    );
    let errors = src.errors(vec![src.func("f", vec![Clause::new(vec![], None, vec![bin])])]);
    assert_eq!(errors[0].error.code(), ErrorCode::E1004);
}

#[test]
fn free_variables_follow_first_occurrence() {
    let src = Src::new();
    let clauses = vec![Clause::new(
        vec![src.pvar("A")],
        None,
        vec![Expr::tuple(vec![src.var("C"), src.var("B"), src.var("C"), src.var("A")])],
    )];
    assert_eq!(
        closures::free_variables(&clauses),
        vec![src.n("A"), src.n("C"), src.n("B")]
    );
}
