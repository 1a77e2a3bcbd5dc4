//! Calls: local functions, built-in functions, remote calls and closure
//! application.

use ember_ir::ast::{ExceptionClass, Expr, ExprKind};
use ember_ir::{Name, Span};
use ember_mir::{IntPredicate, IntWidth, RuntimeFn, ValueClass, ValueId};
use ember_term::TermKind;

use crate::expr::Lowerer;
use crate::SourceError;

/// A built-in function the compiler expands inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Bif {
    /// `is_*/1`: true when the term is one of the kinds.
    TypeTest(&'static [TermKind]),
    /// `is_function(F, Arity)`
    IsFunctionArity,
    Runtime(RuntimeFn),
    SelfPid,
}

impl Bif {
    /// All of these are allowed in guards.
    fn resolve(name: &str, arity: usize) -> Option<Bif> {
        use TermKind as K;
        let bif = match (name, arity) {
            ("is_integer", 1) => Bif::TypeTest(&[K::SmallInt, K::BigInt]),
            ("is_float", 1) => Bif::TypeTest(&[K::Float]),
            ("is_number", 1) => Bif::TypeTest(&[K::SmallInt, K::BigInt, K::Float]),
            ("is_atom", 1) => Bif::TypeTest(&[K::Atom]),
            ("is_tuple", 1) => Bif::TypeTest(&[K::Tuple]),
            ("is_list", 1) => Bif::TypeTest(&[K::Nil, K::Cons]),
            ("is_map", 1) => Bif::TypeTest(&[K::Map]),
            ("is_binary", 1) => Bif::TypeTest(&[K::Binary]),
            ("is_function", 1) => Bif::TypeTest(&[K::Closure]),
            ("is_pid", 1) => Bif::TypeTest(&[K::Pid]),
            ("is_function", 2) => Bif::IsFunctionArity,
            ("tuple_size", 1) => Bif::Runtime(RuntimeFn::TupleSize),
            ("hd", 1) => Bif::Runtime(RuntimeFn::Hd),
            ("tl", 1) => Bif::Runtime(RuntimeFn::Tl),
            ("element", 2) => Bif::Runtime(RuntimeFn::Element),
            ("length", 1) => Bif::Runtime(RuntimeFn::Length),
            ("abs", 1) => Bif::Runtime(RuntimeFn::Abs),
            ("map_size", 1) => Bif::Runtime(RuntimeFn::MapSize),
            ("list_to_tuple", 1) => Bif::Runtime(RuntimeFn::ListToTuple),
            ("self", 0) => Bif::SelfPid,
            _ => return None,
        };
        Some(bif)
    }
}

impl<'a> Lowerer<'_, 'a> {
    /// `f(Args)`: a function of this module, else a BIF.
    pub(crate) fn lower_call(
        &mut self,
        function: Name,
        args: &'a [Expr],
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let arity = u32::try_from(args.len()).map_err(|_| SourceError::Unsupported {
            what: "call with too many arguments",
            span,
        })?;
        if let Some(callee) = self.module.lookup(function, arity) {
            if self.in_guard {
                return Err(SourceError::IllegalGuard {
                    what: "a call to a local function",
                    span,
                });
            }
            let args = self.lower_all(args)?;
            return Ok(self.builder.call(callee, args));
        }

        let Some(bif) = Bif::resolve(self.module.interner.lookup(function), args.len()) else {
            return Err(SourceError::UnknownFunction {
                name: function,
                arity,
                span,
            });
        };
        let args = self.lower_all(args)?;
        if let Bif::Runtime(func) = bif {
            return Ok(self.builder.runtime_call(func, args));
        }
        match (bif, args.as_slice()) {
            (Bif::TypeTest(kinds), &[value]) => Ok(self.type_test(value, kinds)),
            (Bif::IsFunctionArity, &[fun, arity]) => Ok(self.is_function_of_arity(fun, arity)),
            (Bif::SelfPid, []) => Ok(self.builder.self_pid()),
            _ => Err(SourceError::internal("built-in called with the wrong arity")),
        }
    }

    pub(crate) fn lower_remote_call(
        &mut self,
        module: Name,
        function: Name,
        args: &'a [Expr],
    ) -> Result<ValueId, SourceError> {
        let args = self.lower_all(args)?;
        Ok(self.builder.call_external(module, function, args))
    }

    /// `F(Args)`. A literal `fun name/N` applied to N arguments is a plain
    /// call.
    pub(crate) fn lower_apply(
        &mut self,
        callee: &'a Expr,
        args: &'a [Expr],
        span: Span,
    ) -> Result<ValueId, SourceError> {
        if let ExprKind::FunRef { function, arity } = callee.kind {
            if arity as usize == args.len() {
                if let Some(target) = self.module.lookup(function, arity) {
                    let args = self.lower_all(args)?;
                    return Ok(self.builder.call(target, args));
                }
            }
        }
        let fun = self.lower_expr(callee)?;
        let args = self.lower_all(args)?;
        self.apply_closure(fun, args, span)
    }

    /// Call a closure value: raises `{badfun, F}` for a non-closure and
    /// `{badarity, {F, Args}}` for an arity mismatch.
    pub(crate) fn apply_closure(
        &mut self,
        fun: ValueId,
        args: Vec<ValueId>,
        span: Span,
    ) -> Result<ValueId, SourceError> {
        let arity = i64::try_from(args.len()).map_err(|_| SourceError::Unsupported {
            what: "application with too many arguments",
            span,
        })?;

        let is_fun = self.builder.is_kind(fun, TermKind::Closure);
        let check_arity = self.builder.new_block();
        let bad_fun = self.builder.new_block();
        self.builder.branch(is_fun, check_arity, bad_fun);

        self.builder.position_at(bad_fun);
        let reason = self.tagged("badfun", fun);
        self.builder.raise(ExceptionClass::Error, reason);

        self.builder.position_at(check_arity);
        let actual = self.builder.closure_arity(fun);
        let expected = self.builder.const_int(IntWidth::I64, arity);
        let same = self.builder.int_cmp(IntPredicate::Eq, actual, expected);
        let call = self.builder.new_block();
        let bad_arity = self.builder.new_block();
        self.builder.branch(same, call, bad_arity);

        self.builder.position_at(bad_arity);
        let arg_list = self.list_of(&args);
        let pair = self.builder.make_tuple(vec![fun, arg_list]);
        let reason = self.tagged("badarity", pair);
        self.builder.raise(ExceptionClass::Error, reason);

        self.builder.position_at(call);
        let code = self.builder.closure_func(fun);
        Ok(self.builder.call_indirect(code, fun, args))
    }

    /// Boolean term: `value` is of one of `kinds`.
    fn type_test(&mut self, value: ValueId, kinds: &[TermKind]) -> ValueId {
        if let [kind] = kinds {
            let is = self.builder.is_kind(value, *kind);
            return self.builder.bool_to_term(is);
        }
        let truth = self.atom("true");
        let falsity = self.atom("false");
        let tag = self.builder.term_kind_of(value);
        let yes = self.builder.new_block();
        let no = self.builder.new_block();
        let done = self.builder.new_block();
        let result = self.builder.add_block_param(done, ValueClass::Term);
        let cases = kinds.iter().map(|k| (i64::from(k.code()), yes)).collect();
        self.builder.switch(tag, cases, no);
        self.builder.position_at(yes);
        self.builder.jump(done, vec![truth]);
        self.builder.position_at(no);
        self.builder.jump(done, vec![falsity]);
        self.builder.position_at(done);
        result
    }

    fn is_function_of_arity(&mut self, fun: ValueId, arity: ValueId) -> ValueId {
        let falsity = self.atom("false");
        let is_fun = self.builder.is_kind(fun, TermKind::Closure);
        let check = self.builder.new_block();
        let done = self.builder.new_block();
        let result = self.builder.add_block_param(done, ValueClass::Term);
        let not_fun = self.builder.new_block();
        self.builder.branch(is_fun, check, not_fun);
        self.builder.position_at(not_fun);
        self.builder.jump(done, vec![falsity]);

        self.builder.position_at(check);
        let actual = self.builder.closure_arity(fun);
        let actual = self.builder.tag_int(actual);
        let same = self.builder.term_eq(actual, arity, true);
        let same = self.builder.bool_to_term(same);
        self.builder.jump(done, vec![same]);
        self.builder.position_at(done);
        result
    }
}
