use crate::{Label, Reg};
use arrayvec::ArrayVec;

pub mod instr {
    use super::*;

    /// Copy the second operand into the first. At most one operand may be in memory.
    pub fn mov(dest: impl Into<Operand>, src: impl Into<Operand>) -> Instruction {
        Instruction::Mov(dest.into(), src.into())
    }

    /// Store the effective address of the memory operand in the register, without accessing
    /// memory.
    pub fn lea(dest: Reg, address: Mem) -> Instruction {
        Instruction::Lea(dest, address)
    }

    pub fn add(dest: impl Into<Operand>, src: impl Into<Operand>) -> Instruction {
        Instruction::Add(dest.into(), src.into())
    }

    pub fn sub(dest: impl Into<Operand>, src: impl Into<Operand>) -> Instruction {
        Instruction::Sub(dest.into(), src.into())
    }

    /// Signed multiplication, truncating the product to 64 bits.
    pub fn imul(dest: Reg, src: impl Into<Operand>) -> Instruction {
        Instruction::Imul(dest, src.into())
    }

    /// Sign-extend `rax` into `rdx`, preparing the 128 bit dividend for [`idiv`].
    pub fn cqo() -> Instruction {
        Instruction::Cqo
    }

    /// Signed division of `rdx:rax` by the operand. The quotient ends up in `rax` and the
    /// remainder in `rdx`.
    pub fn idiv(divisor: impl Into<Operand>) -> Instruction {
        Instruction::Idiv(divisor.into())
    }

    pub fn cmp(left: impl Into<Operand>, right: impl Into<Operand>) -> Instruction {
        Instruction::Cmp(left.into(), right.into())
    }

    pub fn push(reg: Reg) -> Instruction {
        Instruction::Push(reg)
    }

    pub fn pop(reg: Reg) -> Instruction {
        Instruction::Pop(reg)
    }

    pub fn call(function: Label) -> Instruction {
        Instruction::Call(function)
    }

    /// Jump to the label if the flags set by the last `cmp` satisfy the condition.
    pub fn jcc(cond: Cond, target: Label) -> Instruction {
        Instruction::Jcc(cond, target)
    }

    pub fn jmp(target: Label) -> Instruction {
        Instruction::Jmp(target)
    }

    pub fn ret() -> Instruction {
        Instruction::Ret
    }
}

/// A 64 bit memory operand of the form `[base + disp]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mem {
    pub base: Reg,
    pub disp: i32,
}

impl Mem {
    pub fn new(base: Reg, disp: i32) -> Self {
        Self { base, disp }
    }

    /// Formats the address without the size specifier, as used by `lea`.
    pub fn address(&self) -> impl std::fmt::Display + '_ {
        struct Address<'a>(&'a Mem);

        impl std::fmt::Display for Address<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let Mem { base, disp } = *self.0;
                match disp {
                    0 => write!(f, "[{base}]"),
                    d if d < 0 => write!(f, "[{base} - {}]", -(d as i64)),
                    d => write!(f, "[{base} + {d}]"),
                }
            }
        }

        Address(self)
    }
}

impl std::fmt::Display for Mem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "qword {}", self.address())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    Mem(Mem),
}

impl Operand {
    pub fn as_reg(&self) -> Option<Reg> {
        match self {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        }
    }

    pub fn is_mem(&self) -> bool {
        matches!(self, Operand::Mem(_))
    }

    /// Returns `true` for immediates that don't fit the sign-extended 32 bit immediate field most
    /// instructions have. Only `mov` into a register accepts those.
    pub fn is_wide_imm(&self) -> bool {
        matches!(self, Operand::Imm(imm) if i32::try_from(*imm).is_err())
    }

    /// Returns `true` if reading this operand reads `reg`, either directly or as the base of an
    /// address.
    pub fn reads(&self, reg: Reg) -> bool {
        match self {
            Operand::Reg(r) => *r == reg,
            Operand::Mem(mem) => mem.base == reg,
            Operand::Imm(_) => false,
        }
    }
}

impl From<Reg> for Operand {
    fn from(value: Reg) -> Self {
        Self::Reg(value)
    }
}

impl From<Mem> for Operand {
    fn from(value: Mem) -> Self {
        Self::Mem(value)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Self::Imm(value)
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(reg) => reg.fmt(f),
            Operand::Imm(imm) => imm.fmt(f),
            Operand::Mem(mem) => mem.fmt(f),
        }
    }
}

/// Signed conditions for `jcc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cond {
    E,
    Ne,
    G,
    Ge,
    L,
    Le,
}

impl Cond {
    /// The condition that holds exactly when `self` doesn't.
    pub fn invert(self) -> Self {
        match self {
            Cond::E => Cond::Ne,
            Cond::Ne => Cond::E,
            Cond::G => Cond::Le,
            Cond::Ge => Cond::L,
            Cond::L => Cond::Ge,
            Cond::Le => Cond::G,
        }
    }

    /// Evaluates the condition after `cmp left, right`.
    pub fn holds(self, left: i64, right: i64) -> bool {
        match self {
            Cond::E => left == right,
            Cond::Ne => left != right,
            Cond::G => left > right,
            Cond::Ge => left >= right,
            Cond::L => left < right,
            Cond::Le => left <= right,
        }
    }
}

impl std::fmt::Display for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Cond::E => "e",
            Cond::Ne => "ne",
            Cond::G => "g",
            Cond::Ge => "ge",
            Cond::L => "l",
            Cond::Le => "le",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    // Data movement
    Mov(Operand, Operand),
    Lea(Reg, Mem),
    Push(Reg),
    Pop(Reg),
    // Arithmetic
    Add(Operand, Operand),
    Sub(Operand, Operand),
    Imul(Reg, Operand),
    Cqo,
    Idiv(Operand),
    // Control flow
    Cmp(Operand, Operand),
    Jcc(Cond, Label),
    Jmp(Label),
    Call(Label),
    Ret,
}

impl Instruction {
    /// Returns the registers written by this instruction, `rsp` adjustments of `push`, `pop`,
    /// `call` and `ret` excluded.
    pub fn defs(&self) -> ArrayVec<Reg, 2> {
        let mut defs = ArrayVec::new();
        match self {
            Instruction::Mov(Operand::Reg(reg), _)
            | Instruction::Add(Operand::Reg(reg), _)
            | Instruction::Sub(Operand::Reg(reg), _)
            | Instruction::Lea(reg, _)
            | Instruction::Imul(reg, _)
            | Instruction::Pop(reg) => defs.push(*reg),
            Instruction::Cqo => defs.push(Reg::Rdx),
            Instruction::Idiv(_) => {
                defs.push(Reg::Rax);
                defs.push(Reg::Rdx);
            }
            _ => {}
        }
        defs
    }

    /// Returns the target of a jump, if this is one.
    pub fn jump_target(&self) -> Option<&Label> {
        match self {
            Instruction::Jcc(_, target) | Instruction::Jmp(target) => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Mov(dest, src) => write!(f, "mov {dest}, {src}"),
            Instruction::Lea(dest, address) => write!(f, "lea {dest}, {}", address.address()),
            Instruction::Push(reg) => write!(f, "push {reg}"),
            Instruction::Pop(reg) => write!(f, "pop {reg}"),
            Instruction::Add(dest, src) => write!(f, "add {dest}, {src}"),
            Instruction::Sub(dest, src) => write!(f, "sub {dest}, {src}"),
            Instruction::Imul(dest, src) => write!(f, "imul {dest}, {src}"),
            Instruction::Cqo => f.write_str("cqo"),
            Instruction::Idiv(divisor) => write!(f, "idiv {divisor}"),
            Instruction::Cmp(left, right) => write!(f, "cmp {left}, {right}"),
            Instruction::Jcc(cond, target) => write!(f, "j{cond} {target}"),
            Instruction::Jmp(target) => write!(f, "jmp {target}"),
            Instruction::Call(function) => write!(f, "call {function}"),
            Instruction::Ret => f.write_str("ret"),
        }
    }
}
