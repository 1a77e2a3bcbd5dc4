//! Machine-level instructions handed to the native backend.

use std::fmt;

use ember_mir::{FuncId, IntPredicate, RuntimeFn, ValueId};
use ember_term::{LiteralId, SmallArith};

/// Storage location of one SSA value.
///
/// `Slot(n)` holds value `%n` of the function for its whole lifetime. The
/// backend's register allocator maps slots to registers or stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u32);

impl Slot {
    /// The single temporary that is not an SSA value. Used to break move
    /// cycles and to hold runtime results consumed by the next branch.
    pub const SCRATCH: Slot = Slot(u32::MAX);

    #[inline]
    pub const fn of(value: ValueId) -> Slot {
        Slot(value.raw())
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_scratch(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_scratch() {
            f.write_str("tmp")
        } else {
            write!(f, "s{}", self.0)
        }
    }
}

/// Branch target; `Label(n)` is MIR block `bbn`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Slot(Slot),
    Imm(i64),
    /// Address of a label, for runtime entries that record a resume point.
    Label(Label),
    /// Entry point of a function in the same module.
    Code(FuncId),
}

impl From<Slot> for Operand {
    fn from(slot: Slot) -> Self {
        Operand::Slot(slot)
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Slot(Slot::of(value))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Slot(slot) => slot.fmt(f),
            Operand::Imm(value) => write!(f, "#{value}"),
            Operand::Label(label) => write!(f, "&{label}"),
            Operand::Code(func) => write!(f, "@{func}"),
        }
    }
}

/// Two-operand integer operations on untagged words.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic shift right.
    Sar,
    /// Logical shift right.
    Shr,
}

impl AluOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::And => "and",
            AluOp::Or => "or",
            AluOp::Xor => "xor",
            AluOp::Shl => "shl",
            AluOp::Sar => "sar",
            AluOp::Shr => "shr",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Callee {
    /// A function of the module being emitted.
    Local(FuncId),
    /// `module:function/arity`, resolved at link time.
    External(String),
    Runtime(RuntimeFn),
    /// Code pointer held in a slot.
    Indirect(Slot),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Local(func) => write!(f, "@{func}"),
            Callee::External(symbol) => write!(f, "@'{symbol}'"),
            Callee::Runtime(runtime) => f.write_str(runtime.symbol()),
            Callee::Indirect(slot) => write!(f, "*{slot}"),
        }
    }
}

/// One backend instruction.
///
/// Memory offsets are in bytes from the slot's raw word, so a tagged
/// pointer is dereferenced with the tag folded into the offset.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MachInstr {
    /// Start of a block.
    Label(Label),
    LoadImm {
        dst: Slot,
        value: i64,
    },
    /// Tagged pointer to a boxed literal in the module's constant image.
    LoadLiteral {
        dst: Slot,
        literal: LiteralId,
    },
    Move {
        dst: Slot,
        src: Slot,
    },
    Alu {
        dst: Slot,
        op: AluOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// Small-integer arithmetic; `overflow` is set to 1 when the result
    /// leaves the small range.
    AluChecked {
        dst: Slot,
        overflow: Slot,
        op: SmallArith,
        lhs: Slot,
        rhs: Slot,
    },
    /// `dst = (lhs pred rhs) ? 1 : 0`.
    Cmp {
        dst: Slot,
        pred: IntPredicate,
        lhs: Operand,
        rhs: Operand,
    },
    Select {
        dst: Slot,
        cond: Slot,
        if_true: Operand,
        if_false: Operand,
    },
    /// `TermKind` code of a term. Expanded by the backend into the primary
    /// tag test and, for boxed terms, one header load.
    Classify {
        dst: Slot,
        value: Slot,
    },
    Load {
        dst: Slot,
        base: Slot,
        offset: i32,
    },
    Store {
        base: Slot,
        offset: i32,
        src: Operand,
    },
    /// A call. When `unwind` is set, an exception raised by the callee
    /// transfers to that label with the exception term in the target
    /// block's single parameter slot.
    Call {
        dst: Option<Slot>,
        callee: Callee,
        args: Vec<Operand>,
        unwind: Option<Label>,
    },
    Jump(Label),
    Branch {
        cond: Slot,
        then_label: Label,
        else_label: Label,
    },
    Switch {
        value: Slot,
        cases: Vec<(i64, Label)>,
        default: Label,
    },
    Return(Slot),
    /// Control never reaches here.
    Trap,
}

impl MachInstr {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            MachInstr::Jump(_)
                | MachInstr::Branch { .. }
                | MachInstr::Switch { .. }
                | MachInstr::Return(_)
                | MachInstr::Trap
        )
    }

    /// Slot this instruction writes, if any.
    pub fn def(&self) -> Option<Slot> {
        match self {
            MachInstr::LoadImm { dst, .. }
            | MachInstr::LoadLiteral { dst, .. }
            | MachInstr::Move { dst, .. }
            | MachInstr::Alu { dst, .. }
            | MachInstr::AluChecked { dst, .. }
            | MachInstr::Cmp { dst, .. }
            | MachInstr::Select { dst, .. }
            | MachInstr::Classify { dst, .. }
            | MachInstr::Load { dst, .. } => Some(*dst),
            MachInstr::Call { dst, .. } => *dst,
            _ => None,
        }
    }
}

impl fmt::Display for MachInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachInstr::Label(label) => write!(f, "{label}:"),
            MachInstr::LoadImm { dst, value } => write!(f, "  {dst} = imm {value}"),
            MachInstr::LoadLiteral { dst, literal } => write!(f, "  {dst} = literal {literal}"),
            MachInstr::Move { dst, src } => write!(f, "  {dst} = mov {src}"),
            MachInstr::Alu { dst, op, lhs, rhs } => {
                write!(f, "  {dst} = {} {lhs}, {rhs}", op.as_str())
            }
            MachInstr::AluChecked {
                dst,
                overflow,
                op,
                lhs,
                rhs,
            } => write!(f, "  {dst}, {overflow} = {}.ovf {lhs}, {rhs}", op.as_str()),
            MachInstr::Cmp { dst, pred, lhs, rhs } => {
                write!(f, "  {dst} = cmp.{} {lhs}, {rhs}", pred.as_str())
            }
            MachInstr::Select {
                dst,
                cond,
                if_true,
                if_false,
            } => write!(f, "  {dst} = select {cond}, {if_true}, {if_false}"),
            MachInstr::Classify { dst, value } => write!(f, "  {dst} = classify {value}"),
            MachInstr::Load { dst, base, offset } => write!(f, "  {dst} = load [{base}{offset:+}]"),
            MachInstr::Store { base, offset, src } => write!(f, "  store [{base}{offset:+}], {src}"),
            MachInstr::Call {
                dst,
                callee,
                args,
                unwind,
            } => {
                f.write_str("  ")?;
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                write!(f, "call {callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    arg.fmt(f)?;
                }
                f.write_str(")")?;
                if let Some(unwind) = unwind {
                    write!(f, " unwind {unwind}")?;
                }
                Ok(())
            }
            MachInstr::Jump(label) => write!(f, "  jmp {label}"),
            MachInstr::Branch {
                cond,
                then_label,
                else_label,
            } => write!(f, "  br {cond}, {then_label}, {else_label}"),
            MachInstr::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "  switch {value} [")?;
                for (value, label) in cases {
                    write!(f, "{value} => {label}, ")?;
                }
                write!(f, "_ => {default}]")
            }
            MachInstr::Return(slot) => write!(f, "  ret {slot}"),
            MachInstr::Trap => f.write_str("  trap"),
        }
    }
}
