//! AST builders over a [`Session`]'s interner.

use ember_eval::{Exit, Runtime};
use ember_ir::ast::{CatchClass, CatchClause, Clause, ExceptionClass, Expr, FunctionDef, ModuleDef, Pattern};
use ember_ir::{Name, Span};
use ember_term::Term;
use emberc::{CompileConfig, Compiled, Session};

pub struct Src {
    pub session: Session,
}

impl Src {
    pub fn new() -> Self {
        Self::with_config(CompileConfig::sequential())
    }

    pub fn with_config(config: CompileConfig) -> Self {
        Src {
            session: Session::with_config(config),
        }
    }

    pub fn n(&self, text: &str) -> Name {
        self.session.intern(text)
    }

    pub fn var(&self, text: &str) -> Expr {
        Expr::var(self.n(text))
    }

    pub fn pvar(&self, text: &str) -> Pattern {
        Pattern::var(self.n(text))
    }

    pub fn atom(&self, text: &str) -> Expr {
        Expr::atom(self.n(text))
    }

    pub fn patom(&self, text: &str) -> Pattern {
        Pattern::atom(self.n(text))
    }

    pub fn call(&self, name: &str, args: Vec<Expr>) -> Expr {
        Expr::call(self.n(name), args)
    }

    pub fn func(&self, name: &str, clauses: Vec<Clause>) -> FunctionDef {
        FunctionDef {
            name: self.n(name),
            arity: u32::try_from(clauses[0].patterns.len()).unwrap(),
            clauses,
            span: Span::DUMMY,
        }
    }

    /// Single clause, variable parameters, no guard.
    pub fn def(&self, name: &str, params: &[&str], body: Vec<Expr>) -> FunctionDef {
        let patterns = params.iter().map(|p| self.pvar(p)).collect();
        self.func(name, vec![Clause::new(patterns, None, body)])
    }

    pub fn catch(&self, class: ExceptionClass, reason: Pattern, body: Vec<Expr>) -> CatchClause {
        CatchClause {
            class: CatchClass::Exact(class),
            reason,
            guard: None,
            body,
            span: Span::DUMMY,
        }
    }

    pub fn module(&self, name: &str, functions: Vec<FunctionDef>) -> ModuleDef {
        ModuleDef {
            name: self.n(name),
            functions,
            span: Span::DUMMY,
        }
    }

    /// Compile or fail the test with every diagnostic.
    pub fn compile(&self, functions: Vec<FunctionDef>) -> Compiled {
        match self.session.compile(&self.module("m", functions)) {
            Ok(compiled) => compiled,
            Err(error) => {
                let report: Vec<String> = error.diagnostics.iter().map(ToString::to_string).collect();
                panic!("{error}:\n{}", report.join("\n"));
            }
        }
    }

    pub fn runtime<'m>(&'m self, compiled: &'m Compiled) -> Runtime<'m> {
        Runtime::new(&compiled.verified, self.session.interner())
    }
}

pub fn show(rt: &Runtime<'_>, exit: Option<Exit>) -> String {
    match exit {
        Some(Exit::Normal(value)) => rt.render(value),
        Some(Exit::Raised { class, reason }) => format!("{class}:{}", rt.render(reason)),
        None => "running".to_owned(),
    }
}

pub fn int(value: i64) -> Term {
    Term::small_int(value).unwrap()
}
