use super::{BinSegment, BinaryOp, Clause, ExceptionClass, Literal, Pattern, UnaryOp};
use crate::{Name, Span};
use num_bigint::BigInt;

/// An expression node.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// `[]`
    Nil,
    Var(Name),
    Tuple(Vec<Expr>),
    Cons {
        head: Box<Expr>,
        tail: Box<Expr>,
    },
    /// `[A, B | Tail]`; a missing tail means `[]`.
    List {
        elements: Vec<Expr>,
        tail: Option<Box<Expr>>,
    },
    Map(Vec<(Expr, Expr)>),
    /// `<<Segments>>`
    Bin(Vec<BinSegment<Expr>>),
    BinOp {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    UnOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `Pattern = Value`
    Match {
        pattern: Box<Pattern>,
        value: Box<Expr>,
    },
    /// Call of a local function or a BIF.
    Call {
        function: Name,
        args: Vec<Expr>,
    },
    /// `module:function(Args)`
    RemoteCall {
        module: Name,
        function: Name,
        args: Vec<Expr>,
    },
    /// `Fun(Args)` where `Fun` evaluates to a closure.
    Apply {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `fun name/arity`
    FunRef {
        function: Name,
        arity: u32,
    },
    /// `fun (Patterns) -> Body; ... end`
    Fun {
        clauses: Vec<Clause>,
    },
    Case {
        scrutinee: Box<Expr>,
        clauses: Vec<Clause>,
    },
    If {
        clauses: Vec<IfClause>,
    },
    /// `begin ... end`
    Block(Vec<Expr>),
    /// `spawn(Fun, Args)`; the callee is a `fun` value or a `fun f/N` reference.
    Spawn {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `To ! Message`
    Send {
        to: Box<Expr>,
        message: Box<Expr>,
    },
    Receive {
        clauses: Vec<Clause>,
        after: Option<Box<After>>,
    },
    Try(Box<TryExpr>),
    /// `throw(R)`, `error(R)`, `exit(R)`
    Raise {
        class: ExceptionClass,
        reason: Box<Expr>,
    },
}

/// `Guard -> Body` inside an `if`.
#[derive(Clone, Debug, PartialEq)]
pub struct IfClause {
    pub guard: Expr,
    pub body: Vec<Expr>,
    pub span: Span,
}

/// `after Timeout -> Body` of a receive.
#[derive(Clone, Debug, PartialEq)]
pub struct After {
    pub timeout: Expr,
    pub body: Vec<Expr>,
    pub span: Span,
}

/// `try Body of OfClauses catch CatchClauses end`
#[derive(Clone, Debug, PartialEq)]
pub struct TryExpr {
    pub body: Vec<Expr>,
    pub of_clauses: Vec<Clause>,
    pub catch_clauses: Vec<CatchClause>,
    pub span: Span,
}

/// Class part of a `Class:Reason` catch pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatchClass {
    Exact(ExceptionClass),
    /// `C:Reason` binds the class atom to `C`.
    Var(Name),
    /// `_:Reason`
    Any,
}

/// `Class:Reason when Guard -> Body`
#[derive(Clone, Debug, PartialEq)]
pub struct CatchClause {
    pub class: CatchClass,
    pub reason: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Expr>,
    pub span: Span,
}

impl CatchClass {
    pub fn admits(&self, class: ExceptionClass) -> bool {
        match self {
            CatchClass::Exact(c) => *c == class,
            CatchClass::Var(_) | CatchClass::Any => true,
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    fn dummy(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: Span::DUMMY,
        }
    }

    pub fn int(value: i64) -> Self {
        Self::integer(BigInt::from(value))
    }

    pub fn integer(value: BigInt) -> Self {
        Self::dummy(ExprKind::Literal(Literal::Integer(value)))
    }

    pub fn float(value: f64) -> Self {
        Self::dummy(ExprKind::Literal(Literal::Float(value)))
    }

    pub fn atom(name: Name) -> Self {
        Self::dummy(ExprKind::Literal(Literal::Atom(name)))
    }

    pub fn nil() -> Self {
        Self::dummy(ExprKind::Nil)
    }

    pub fn var(name: Name) -> Self {
        Self::dummy(ExprKind::Var(name))
    }

    pub fn tuple(elements: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::Tuple(elements))
    }

    pub fn list(elements: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::List {
            elements,
            tail: None,
        })
    }

    pub fn cons(head: Expr, tail: Expr) -> Self {
        Self::dummy(ExprKind::Cons {
            head: Box::new(head),
            tail: Box::new(tail),
        })
    }

    pub fn binop(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::dummy(ExprKind::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn call(function: Name, args: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::Call { function, args })
    }

    pub fn remote_call(module: Name, function: Name, args: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::RemoteCall {
            module,
            function,
            args,
        })
    }

    pub fn apply(callee: Expr, args: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::Apply {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn fun(clauses: Vec<Clause>) -> Self {
        Self::dummy(ExprKind::Fun { clauses })
    }

    pub fn fun_ref(function: Name, arity: u32) -> Self {
        Self::dummy(ExprKind::FunRef { function, arity })
    }

    pub fn matches(pattern: Pattern, value: Expr) -> Self {
        Self::dummy(ExprKind::Match {
            pattern: Box::new(pattern),
            value: Box::new(value),
        })
    }

    pub fn case(scrutinee: Expr, clauses: Vec<Clause>) -> Self {
        Self::dummy(ExprKind::Case {
            scrutinee: Box::new(scrutinee),
            clauses,
        })
    }

    pub fn spawn(callee: Expr, args: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::Spawn {
            callee: Box::new(callee),
            args,
        })
    }

    pub fn send(to: Expr, message: Expr) -> Self {
        Self::dummy(ExprKind::Send {
            to: Box::new(to),
            message: Box::new(message),
        })
    }

    pub fn receive(clauses: Vec<Clause>, after: Option<(Expr, Vec<Expr>)>) -> Self {
        Self::dummy(ExprKind::Receive {
            clauses,
            after: after.map(|(timeout, body)| {
                Box::new(After {
                    timeout,
                    body,
                    span: Span::DUMMY,
                })
            }),
        })
    }

    pub fn raise(class: ExceptionClass, reason: Expr) -> Self {
        Self::dummy(ExprKind::Raise {
            class,
            reason: Box::new(reason),
        })
    }

    pub fn try_catch(body: Vec<Expr>, of_clauses: Vec<Clause>, catch_clauses: Vec<CatchClause>) -> Self {
        Self::dummy(ExprKind::Try(Box::new(TryExpr {
            body,
            of_clauses,
            catch_clauses,
            span: Span::DUMMY,
        })))
    }

    pub fn block(body: Vec<Expr>) -> Self {
        Self::dummy(ExprKind::Block(body))
    }
}
