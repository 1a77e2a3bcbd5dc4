use super::*;
use crate::{compile, flatten_clause};
use ember_ir::ast::{BinSegment, Literal, Pattern, SegmentSize, SegmentSpec};
use ember_ir::{Span, StringInterner};
use ember_term::BigInt;
use proptest::prelude::*;
use rustc_hash::FxHashSet;

fn beyond_i64() -> BigInt {
    BigInt::from(i64::MAX) * 3
}

/// Names shared by the generated patterns and terms.
struct Names {
    vars: [Name; 3],
    atoms: [Name; 3],
    outer: Name,
    len: Name,
    data: Name,
}

impl Names {
    fn new(interner: &StringInterner) -> Self {
        Names {
            vars: [interner.intern("X0"), interner.intern("X1"), interner.intern("X2")],
            atoms: [interner.intern("a"), interner.intern("b"), interner.intern("c")],
            outer: interner.intern("Outer"),
            len: interner.intern("N"),
            data: interner.intern("D"),
        }
    }

    fn pattern(&self, spec: &PatSpec) -> Pattern {
        match spec {
            PatSpec::Wild => Pattern::wildcard(),
            PatSpec::Var(i) => Pattern::var(self.vars[*i]),
            PatSpec::Outer => Pattern::var(self.outer),
            PatSpec::Int(n) => Pattern::int(*n),
            PatSpec::Big => Pattern::integer(beyond_i64()),
            PatSpec::Float(one) => Pattern::float(if *one { 1.0 } else { 2.5 }),
            PatSpec::Atom(i) => Pattern::atom(self.atoms[*i]),
            PatSpec::Nil => Pattern::nil(),
            PatSpec::Tuple(elements) => Pattern::tuple(elements.iter().map(|e| self.pattern(e)).collect()),
            PatSpec::Cons(head, tail) => Pattern::cons(self.pattern(head), self.pattern(tail)),
            PatSpec::Map(entries) => {
                let mut seen = Vec::new();
                let mut out = Vec::new();
                for (key, value) in entries {
                    if !seen.contains(key) {
                        seen.push(*key);
                        out.push((Literal::Atom(self.atoms[*key]), self.pattern(value)));
                    }
                }
                Pattern::map(out)
            }
            PatSpec::Bin(BinSpec::Byte(value)) => {
                let value = value.map_or_else(|| Pattern::var(self.data), Pattern::int);
                Pattern::bin(vec![BinSegment::new(value, SegmentSize::Literal(8), SegmentSpec::INTEGER)])
            }
            PatSpec::Bin(BinSpec::ByteThenRest) => Pattern::bin(vec![
                BinSegment::new(Pattern::var(self.data), SegmentSize::Literal(8), SegmentSpec::INTEGER),
                BinSegment::new(Pattern::wildcard(), SegmentSize::Default, SegmentSpec::BINARY),
            ]),
            PatSpec::Bin(BinSpec::Prefixed) => Pattern::bin(vec![
                BinSegment::new(Pattern::var(self.len), SegmentSize::Literal(8), SegmentSpec::INTEGER),
                BinSegment::new(Pattern::var(self.data), SegmentSize::Var(self.len), SegmentSpec::BINARY),
            ]),
        }
    }

    fn term(&self, spec: &TermSpec, heap: &mut Heap) -> Term {
        match spec {
            TermSpec::Int(n) => Term::small_int(*n).unwrap(),
            TermSpec::Big => heap.integer(beyond_i64()),
            TermSpec::Float(one) => heap.float(if *one { 1.0 } else { 2.5 }),
            TermSpec::Atom(i) => Term::atom(self.atoms[*i]),
            TermSpec::Nil => Term::NIL,
            TermSpec::Tuple(elements) => {
                let elements: Vec<Term> = elements.iter().map(|e| self.term(e, heap)).collect();
                heap.tuple(&elements)
            }
            TermSpec::Cons(head, tail) => {
                let head = self.term(head, heap);
                let tail = self.term(tail, heap);
                heap.cons(head, tail)
            }
            TermSpec::Map(entries) => {
                let entries: Vec<(Term, Term)> = entries
                    .iter()
                    .map(|(k, v)| (Term::atom(self.atoms[*k]), self.term(v, heap)))
                    .collect();
                heap.map(&entries)
            }
            TermSpec::Bin(bytes) => heap.binary(bytes),
        }
    }
}

#[derive(Clone, Debug)]
enum BinSpec {
    /// `<<V:8>>`, a literal byte or a variable.
    Byte(Option<i64>),
    /// `<<D:8, _/binary>>`
    ByteThenRest,
    /// `<<N:8, D:N/binary>>`
    Prefixed,
}

#[derive(Clone, Debug)]
enum PatSpec {
    Wild,
    Var(usize),
    Outer,
    Int(i64),
    Big,
    Float(bool),
    Atom(usize),
    Nil,
    Tuple(Vec<PatSpec>),
    Cons(Box<PatSpec>, Box<PatSpec>),
    Map(Vec<(usize, PatSpec)>),
    Bin(BinSpec),
}

#[derive(Clone, Debug)]
enum TermSpec {
    Int(i64),
    Big,
    Float(bool),
    Atom(usize),
    Nil,
    Tuple(Vec<TermSpec>),
    Cons(Box<TermSpec>, Box<TermSpec>),
    Map(Vec<(usize, TermSpec)>),
    Bin(Vec<u8>),
}

fn pattern_strategy() -> impl Strategy<Value = PatSpec> {
    let leaf = prop_oneof![
        3 => Just(PatSpec::Wild),
        3 => (0..3usize).prop_map(PatSpec::Var),
        1 => Just(PatSpec::Outer),
        2 => (-1i64..3).prop_map(PatSpec::Int),
        1 => Just(PatSpec::Big),
        1 => any::<bool>().prop_map(PatSpec::Float),
        2 => (0..2usize).prop_map(PatSpec::Atom),
        2 => Just(PatSpec::Nil),
        1 => prop_oneof![
            proptest::option::of(0i64..3).prop_map(BinSpec::Byte),
            Just(BinSpec::ByteThenRest),
            Just(BinSpec::Prefixed),
        ]
        .prop_map(PatSpec::Bin),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(PatSpec::Tuple),
            (inner.clone(), inner.clone()).prop_map(|(h, t)| PatSpec::Cons(Box::new(h), Box::new(t))),
            prop::collection::vec((0..3usize, inner), 0..3).prop_map(PatSpec::Map),
        ]
    })
}

fn term_strategy() -> impl Strategy<Value = TermSpec> {
    let leaf = prop_oneof![
        3 => (-1i64..3).prop_map(TermSpec::Int),
        1 => Just(TermSpec::Big),
        1 => any::<bool>().prop_map(TermSpec::Float),
        2 => (0..3usize).prop_map(TermSpec::Atom),
        2 => Just(TermSpec::Nil),
        1 => prop::collection::vec(0u8..3, 0..4).prop_map(TermSpec::Bin),
    ];
    leaf.prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(TermSpec::Tuple),
            (inner.clone(), inner.clone()).prop_map(|(h, t)| TermSpec::Cons(Box::new(h), Box::new(t))),
            prop::collection::vec((0..3usize, inner), 0..3).prop_map(TermSpec::Map),
        ]
    })
}

/// Guards that pass for some clauses and binding counts and fail for others.
fn oracle(clause: usize, bindings: &[(Name, Term)]) -> bool {
    (clause + bindings.len()) % 2 == 0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn tree_agrees_with_naive_matching(
        rows in prop::collection::vec(((pattern_strategy(), pattern_strategy()), any::<bool>()), 1..5),
        inputs in (term_strategy(), term_strategy()),
    ) {
        let interner = StringInterner::new();
        let names = Names::new(&interner);
        let mut scope = FxHashSet::default();
        scope.insert(names.outer);

        let mut pool = LiteralPool::new();
        let mut clauses = Vec::new();
        for ((first, second), guard) in &rows {
            let patterns = vec![names.pattern(first), names.pattern(second)];
            let Ok(clause) = flatten_clause(&patterns, *guard, Span::DUMMY, &scope, &mut pool) else {
                return Ok(());
            };
            clauses.push(clause);
        }
        let compiled = compile(clauses.clone(), 2).unwrap();

        let mut heap = Heap::new();
        let scrutinees = [names.term(&inputs.0, &mut heap), names.term(&inputs.1, &mut heap)];
        let mut outer = FxHashMap::default();
        outer.insert(names.outer, Term::small_int(1).unwrap());

        let naive = {
            let mut ctx = RefContext { heap: &mut heap, literals: &pool, outer: &outer };
            naive_match(&clauses, &scrutinees, &mut ctx, &mut oracle)
        };
        let tree = {
            let mut ctx = RefContext { heap: &mut heap, literals: &pool, outer: &outer };
            run_tree(&compiled, &scrutinees, &mut ctx, &mut oracle)
        };
        match (&naive, &tree) {
            (None, None) => {}
            (Some(a), Some(b)) => prop_assert!(a.agrees_with(b, &heap), "naive {:?}, tree {:?}", a, b),
            _ => prop_assert!(false, "naive {:?}, tree {:?}", naive, tree),
        }
    }
}

fn run_both(
    rows: &[(Vec<Pattern>, bool)],
    inputs: &[Term],
    heap: &mut Heap,
    guard: &mut dyn FnMut(usize, &[(Name, Term)]) -> bool,
) -> (Option<MatchOutcome>, Option<MatchOutcome>) {
    let mut pool = LiteralPool::new();
    let scope = FxHashSet::<Name>::default();
    let clauses: Vec<FlatClause> = rows
        .iter()
        .map(|(p, g)| flatten_clause(p, *g, Span::DUMMY, &scope, &mut pool).unwrap())
        .collect();
    let compiled = compile(clauses.clone(), inputs.len()).unwrap();
    let outer = FxHashMap::default();
    let naive = naive_match(
        &clauses,
        inputs,
        &mut RefContext { heap, literals: &pool, outer: &outer },
        guard,
    );
    let tree = run_tree(
        &compiled,
        inputs,
        &mut RefContext { heap, literals: &pool, outer: &outer },
        guard,
    );
    (naive, tree)
}

#[test]
fn failed_guard_selects_the_next_matching_clause() {
    let interner = StringInterner::new();
    let x = interner.intern("X");
    let rows = vec![
        (vec![Pattern::tuple(vec![Pattern::var(x)])], true),
        (vec![Pattern::tuple(vec![Pattern::var(x)])], false),
    ];
    let mut heap = Heap::new();
    let zero = Term::small_int(0).unwrap();
    let input = heap.tuple(&[zero]);
    // `when X > 0`
    let mut positive = |_: usize, binds: &[(Name, Term)]| binds[0].1.as_small_int().is_some_and(|n| n > 0);

    let (naive, tree) = run_both(&rows, &[input], &mut heap, &mut positive);
    let expected = MatchOutcome {
        clause: 1,
        bindings: vec![(x, zero)],
    };
    assert_eq!(naive, Some(expected.clone()));
    assert_eq!(tree, Some(expected));
}

#[test]
fn repeated_variables_require_equal_values() {
    let interner = StringInterner::new();
    let x = interner.intern("X");
    let rows = vec![
        (vec![Pattern::var(x), Pattern::var(x)], false),
        (vec![Pattern::wildcard(), Pattern::wildcard()], false),
    ];
    let mut heap = Heap::new();
    let one = Term::small_int(1).unwrap();
    let two = Term::small_int(2).unwrap();
    let mut never = |_: usize, _: &[(Name, Term)]| false;

    let (naive, tree) = run_both(&rows, &[one, one], &mut heap, &mut never);
    assert_eq!(naive.map(|o| o.clause), Some(0));
    assert_eq!(tree.map(|o| o.clause), Some(0));

    let (naive, tree) = run_both(&rows, &[one, two], &mut heap, &mut never);
    assert_eq!(naive.map(|o| o.clause), Some(1));
    assert_eq!(tree.map(|o| o.clause), Some(1));
}

#[test]
fn integers_and_floats_do_not_match_each_other() {
    let rows = vec![(vec![Pattern::float(1.0)], false), (vec![Pattern::int(1)], false)];
    let mut heap = Heap::new();
    let one = Term::small_int(1).unwrap();
    let mut never = |_: usize, _: &[(Name, Term)]| false;
    let (naive, tree) = run_both(&rows, &[one], &mut heap, &mut never);
    assert_eq!(naive.map(|o| o.clause), Some(1));
    assert_eq!(tree.map(|o| o.clause), Some(1));
}

#[test]
fn length_prefixed_binary_binds_its_payload() {
    let interner = StringInterner::new();
    let (n, data) = (interner.intern("N"), interner.intern("Data"));
    let rows = vec![(
        vec![Pattern::bin(vec![
            BinSegment::new(Pattern::var(n), SegmentSize::Literal(8), SegmentSpec::INTEGER),
            BinSegment::new(Pattern::var(data), SegmentSize::Var(n), SegmentSpec::BINARY),
        ])],
        false,
    )];
    let mut heap = Heap::new();
    let input = heap.binary(&[2, 7, 9]);
    let short = heap.binary(&[3, 7, 9]);
    let mut never = |_: usize, _: &[(Name, Term)]| false;

    let (naive, tree) = run_both(&rows, &[input], &mut heap, &mut never);
    let (naive, tree) = (naive.unwrap(), tree.unwrap());
    assert!(naive.agrees_with(&tree, &heap));
    let payload = heap.binary(&[7, 9]);
    assert!(heap.exact_eq(naive.bindings[1].1, payload));

    let (naive, tree) = run_both(&rows, &[short], &mut heap, &mut never);
    assert_eq!(naive, None);
    assert_eq!(tree, None);
}
