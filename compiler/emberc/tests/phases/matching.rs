//! Clause selection of compiled function heads, run on the reference
//! runtime, against top-to-bottom matching of the same clauses.

use ember_eval::Exit;
use ember_ir::ast::{Clause, Expr, Pattern};
use ember_ir::{Name, Span};
use ember_match::flatten_clause;
use ember_match::reference::{naive_match, RefContext};
use ember_term::{BigInt, Heap, LiteralPool, Term};
use proptest::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::common::Src;

const VARS: [&str; 3] = ["X0", "X1", "X2"];
const ATOMS: [&str; 2] = ["a", "b"];

#[derive(Clone, Debug)]
enum Pat {
    Wild,
    Var(usize),
    Int(i64),
    Big(bool),
    Atom(usize),
    Nil,
    Tuple(Vec<Pat>),
    Cons(Box<Pat>, Box<Pat>),
}

#[derive(Clone, Debug)]
enum Val {
    Int(i64),
    Big(bool),
    Atom(usize),
    Nil,
    Tuple(Vec<Val>),
    Cons(Box<Val>, Box<Val>),
}

fn huge(negative: bool) -> BigInt {
    let value: BigInt = BigInt::from(i64::MAX) * 1000;
    if negative {
        -value
    } else {
        value
    }
}

fn pattern(src: &Src, spec: &Pat) -> Pattern {
    match spec {
        Pat::Wild => Pattern::wildcard(),
        Pat::Var(i) => src.pvar(VARS[*i]),
        Pat::Int(n) => Pattern::int(*n),
        Pat::Big(negative) => Pattern::integer(huge(*negative)),
        Pat::Atom(i) => src.patom(ATOMS[*i]),
        Pat::Nil => Pattern::nil(),
        Pat::Tuple(elements) => Pattern::tuple(elements.iter().map(|e| pattern(src, e)).collect()),
        Pat::Cons(head, tail) => Pattern::cons(pattern(src, head), pattern(src, tail)),
    }
}

fn value(src: &Src, spec: &Val, heap: &mut Heap) -> Term {
    match spec {
        Val::Int(n) => heap.integer(*n),
        Val::Big(negative) => heap.integer(huge(*negative)),
        Val::Atom(i) => Term::atom(src.n(ATOMS[*i])),
        Val::Nil => Term::NIL,
        Val::Tuple(elements) => {
            let elements: Vec<Term> = elements.iter().map(|e| value(src, e, heap)).collect();
            heap.tuple(&elements)
        }
        Val::Cons(head, tail) => {
            let head = value(src, head, heap);
            let tail = value(src, tail, heap);
            heap.cons(head, tail)
        }
    }
}

fn pat_strategy() -> impl Strategy<Value = Pat> {
    let leaf = prop_oneof![
        3 => Just(Pat::Wild),
        3 => (0..3usize).prop_map(Pat::Var),
        2 => (-1i64..2).prop_map(Pat::Int),
        1 => any::<bool>().prop_map(Pat::Big),
        2 => (0..2usize).prop_map(Pat::Atom),
        1 => Just(Pat::Nil),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Pat::Tuple),
            (inner.clone(), inner).prop_map(|(h, t)| Pat::Cons(Box::new(h), Box::new(t))),
        ]
    })
}

fn val_strategy() -> impl Strategy<Value = Val> {
    let leaf = prop_oneof![
        3 => (-1i64..2).prop_map(Val::Int),
        1 => any::<bool>().prop_map(Val::Big),
        2 => (0..2usize).prop_map(Val::Atom),
        1 => Just(Val::Nil),
    ];
    leaf.prop_recursive(2, 8, 2, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Val::Tuple),
            (inner.clone(), inner).prop_map(|(h, t)| Val::Cons(Box::new(h), Box::new(t))),
        ]
    })
}

/// `f(P1, P2) when Guard -> {Index, Bound...}` with the bound variables
/// sorted by name.
fn clause(src: &Src, index: usize, first: &Pat, second: &Pat, guard_holds: bool) -> Clause {
    let patterns = vec![pattern(src, first), pattern(src, second)];
    let mut bound: Vec<Name> = patterns.iter().flat_map(Pattern::variables).collect();
    bound.sort_by_key(|name| name.raw());
    bound.dedup();
    let mut result = vec![Expr::int(i64::try_from(index).unwrap())];
    result.extend(bound.into_iter().map(Expr::var));
    let guard = src.atom(if guard_holds { "true" } else { "false" });
    Clause::new(patterns, Some(guard), vec![Expr::tuple(result)])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn compiled_heads_select_like_naive_matching(
        rows in prop::collection::vec(((pat_strategy(), pat_strategy()), any::<bool>()), 1..5),
        args in (val_strategy(), val_strategy()),
    ) {
        let src = Src::new();
        let clauses: Vec<Clause> = rows
            .iter()
            .enumerate()
            .map(|(i, ((first, second), holds))| clause(&src, i, first, second, *holds))
            .collect();

        let mut pool = LiteralPool::new();
        let no_outer = FxHashSet::<Name>::default();
        let flat: Vec<_> = clauses
            .iter()
            .map(|c| flatten_clause(&c.patterns, true, Span::DUMMY, &no_outer, &mut pool).unwrap())
            .collect();

        let compiled = src.compile(vec![src.func("f", clauses)]);
        let mut rt = src.runtime(&compiled);
        let inputs = [value(&src, &args.0, rt.heap_mut()), value(&src, &args.1, rt.heap_mut())];
        let exit = rt.call("f", &inputs).unwrap();

        let outer = FxHashMap::default();
        let mut guard = |index: usize, _: &[(Name, Term)]| rows[index].1;
        let naive = naive_match(
            &flat,
            &inputs,
            &mut RefContext { heap: rt.heap_mut(), literals: &pool, outer: &outer },
            &mut guard,
        );

        match (naive, exit) {
            (None, Some(Exit::Raised { reason, .. })) => {
                prop_assert_eq!(rt.render(reason), "function_clause");
            }
            (Some(outcome), Some(Exit::Normal(result))) => {
                let heap = rt.heap();
                let fields = heap.tuple_elements(result).unwrap_or(&[]).to_vec();
                let index = i64::try_from(outcome.clause).unwrap();
                prop_assert_eq!(fields.first().copied(), Term::small_int(index));

                let mut expected = outcome.bindings.clone();
                expected.sort_by_key(|(name, _)| name.raw());
                expected.dedup_by_key(|(name, _)| *name);
                prop_assert_eq!(fields.len(), expected.len() + 1);
                for (field, (name, bound)) in fields[1..].iter().zip(&expected) {
                    prop_assert!(heap.exact_eq(*field, *bound), "{:?} differs", name);
                }
            }
            (naive, exit) => prop_assert!(false, "naive {:?}, compiled {:?}", naive, exit),
        }
    }
}

#[test]
fn integers_past_i64_select_their_own_clause() {
    let src = Src::new();
    let classify = src.func(
        "classify",
        vec![
            Clause::new(vec![Pattern::integer(huge(false))], None, vec![src.atom("huge")]),
            Clause::new(vec![Pattern::integer(huge(true))], None, vec![src.atom("negative_huge")]),
            Clause::new(vec![Pattern::wildcard()], None, vec![src.atom("other")]),
        ],
    );
    let compiled = src.compile(vec![classify]);
    let mut rt = src.runtime(&compiled);

    let mut pick = |n: BigInt| {
        let arg = rt.heap_mut().integer(n);
        let exit = rt.call("classify", &[arg]).unwrap();
        crate::common::show(&rt, exit)
    };
    assert_eq!(pick(huge(false)), "huge");
    assert_eq!(pick(huge(true)), "negative_huge");
    assert_eq!(pick(huge(false) + 1), "other");
    assert_eq!(pick(BigInt::from(7)), "other");
}
