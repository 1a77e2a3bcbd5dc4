use ember_ir::ast::ExceptionClass;
use ember_ir::StringInterner;
use ember_term::Term;

/// Atoms the runtime produces or inspects, interned once per runtime.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Atoms {
    pub(crate) true_: Term,
    pub(crate) false_: Term,
    pub(crate) infinity: Term,
    pub(crate) badarith: Term,
    pub(crate) badarg: Term,
    pub(crate) badfun: Term,
    pub(crate) badarity: Term,
    pub(crate) undef: Term,
    pub(crate) system_limit: Term,
    pub(crate) timeout_value: Term,
    classes: [Term; 3],
}

impl Atoms {
    pub(crate) fn new(names: &StringInterner) -> Self {
        let atom = |text: &str| Term::atom(names.intern(text));
        Atoms {
            true_: atom("true"),
            false_: atom("false"),
            infinity: atom("infinity"),
            badarith: atom("badarith"),
            badarg: atom("badarg"),
            badfun: atom("badfun"),
            badarity: atom("badarity"),
            undef: atom("undef"),
            system_limit: atom("system_limit"),
            timeout_value: atom("timeout_value"),
            classes: ExceptionClass::ALL.map(|class| atom(class.as_str())),
        }
    }

    pub(crate) fn boolean(&self, value: bool) -> Term {
        if value {
            self.true_
        } else {
            self.false_
        }
    }

    /// `Some(b)` for the atoms `true` and `false`.
    pub(crate) fn as_bool(&self, term: Term) -> Option<bool> {
        if term == self.true_ {
            Some(true)
        } else if term == self.false_ {
            Some(false)
        } else {
            None
        }
    }

    pub(crate) fn class(&self, class: ExceptionClass) -> Term {
        self.classes[usize::from(class.code())]
    }

    pub(crate) fn class_of(&self, atom: Term) -> Option<ExceptionClass> {
        ExceptionClass::ALL
            .into_iter()
            .find(|&class| self.class(class) == atom)
    }
}
