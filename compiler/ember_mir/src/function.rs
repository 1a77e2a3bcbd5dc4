use ember_ir::{Name, Span};

use crate::class::ValueClass;
use crate::ids::{BlockId, FuncId, ValueId};
use crate::op::Op;
use crate::terminator::Terminator;

/// One operation with its exceptional successor and source location.
#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    pub op: Op,
    /// Handler block receiving the exception term when `op` raises.
    /// `None` propagates the exception to the caller.
    pub handler: Option<BlockId>,
    pub span: Span,
}

impl Instr {
    pub fn new(op: Op) -> Self {
        Instr {
            op,
            handler: None,
            span: Span::DUMMY,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub params: Vec<ValueId>,
    pub instrs: Vec<Instr>,
    /// `None` only while under construction; sealed functions always have one.
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Block {
            id,
            params: Vec::new(),
            instrs: Vec::new(),
            terminator: None,
        }
    }
}

/// Where a function came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionOrigin {
    /// Defined in the source module.
    Source,
    /// Body of the `index`th `fun` expression inside `parent`.
    Closure { parent: FuncId, index: u32 },
    /// Adapter behind a `fun name/arity` reference.
    Trampoline { target: FuncId },
}

/// One slot of a closure environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Capture {
    pub name: Name,
    pub class: ValueClass,
}

/// Environment layout of a lifted closure body. The environment is the
/// function's first parameter; slot `i` is read with `GetEnv { index: i }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ClosureEnv {
    pub captures: Vec<Capture>,
}

impl ClosureEnv {
    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// Construct a pattern-matching site came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchKind {
    FunctionHead,
    Case,
    If,
    Match,
    Receive,
    TryOf,
    Catch,
}

impl MatchKind {
    /// Sites whose reachable no-match path deserves a warning.
    pub fn warns_when_inexhaustive(self) -> bool {
        matches!(self, MatchKind::FunctionHead | MatchKind::Case)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::FunctionHead => "function head",
            MatchKind::Case => "case",
            MatchKind::If => "if",
            MatchKind::Match => "match",
            MatchKind::Receive => "receive",
            MatchKind::TryOf => "try",
            MatchKind::Catch => "catch",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClauseSite {
    pub span: Span,
    pub reachable: bool,
}

/// Reachability facts for one compiled match, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MatchSite {
    pub kind: MatchKind,
    pub span: Span,
    pub clauses: Vec<ClauseSite>,
    /// Some input reaches the no-match behaviour.
    pub fail_reachable: bool,
}

impl MatchSite {
    pub fn unreachable_clauses(&self) -> impl Iterator<Item = (usize, &ClauseSite)> {
        self.clauses.iter().enumerate().filter(|(_, c)| !c.reachable)
    }
}

/// A MIR function.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: Name,
    /// Arity visible to callers. Closure bodies take one more parameter,
    /// the environment, in front.
    pub arity: u32,
    /// Entry block parameters.
    pub params: Vec<ValueId>,
    /// `blocks[i].id == BlockId::new(i)`.
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    /// Class of every value, indexed by `ValueId::index()`.
    pub value_classes: Vec<ValueClass>,
    pub env: Option<ClosureEnv>,
    pub origin: FunctionOrigin,
    pub match_sites: Vec<MatchSite>,
    pub span: Span,
}

impl Function {
    pub fn value_class(&self, value: ValueId) -> Option<ValueClass> {
        self.value_classes.get(value.index()).copied()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    pub fn value_count(&self) -> usize {
        self.value_classes.len()
    }

    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    pub fn is_closure_body(&self) -> bool {
        self.env.is_some()
    }
}
