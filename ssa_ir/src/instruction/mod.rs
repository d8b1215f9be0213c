#[cfg(test)]
mod test;

mod simplify;

use crate::{regalloc::ColoringPreference, Label, Reg, Type, Value, Variable, FUNC_END};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// Evaluates the operation with wrapping semantics. Returns `None` when dividing by zero or
    /// when the quotient overflows.
    pub fn apply(self, left: i64, right: i64) -> Option<i64> {
        match self {
            BinOp::Add => Some(left.wrapping_add(right)),
            BinOp::Sub => Some(left.wrapping_sub(right)),
            BinOp::Mul => Some(left.wrapping_mul(right)),
            BinOp::Div => left.checked_div(right),
            BinOp::Mod => left.checked_rem(right),
        }
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Mul)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn evaluate(self, left: i64, right: i64) -> bool {
        self.cond().holds(left, right)
    }

    /// The matching signed `jcc` condition.
    pub fn cond(self) -> x86_ir::Cond {
        match self {
            CmpOp::Eq => x86_ir::Cond::E,
            CmpOp::Ne => x86_ir::Cond::Ne,
            CmpOp::Gt => x86_ir::Cond::G,
            CmpOp::Ge => x86_ir::Cond::Ge,
            CmpOp::Lt => x86_ir::Cond::L,
            CmpOp::Le => x86_ir::Cond::Le,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }
}

/// A call argument and the type it is passed as.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub value: Value,
    pub ty: Type,
}

impl Argument {
    pub fn new(value: Value, ty: Type) -> Self {
        Self { value, ty }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::new(value, Type::Int64)
    }
}

impl std::fmt::Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.ty {
            Type::Int64 => write!(f, "{}", self.value),
            _ => write!(f, "{}: {}", self.value, self.ty),
        }
    }
}

/// One item of the flat input of a function: a label starting a block, or an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Label(Label),
    Instruction(Instruction),
}

impl From<Instruction> for Line {
    fn from(value: Instruction) -> Self {
        Line::Instruction(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Definitions
    Assign {
        lhs: Variable,
        rhs: Value,
    },
    /// Like [`Instruction::Assign`], but never folded away by copy propagation.
    Copy {
        lhs: Variable,
        rhs: Value,
    },
    /// A variable that gets its value from outside the function body, e.g. an argument register.
    External {
        lhs: Variable,
        reg: Option<Reg>,
    },
    Binary {
        lhs: Variable,
        op: BinOp,
        left: Value,
        right: Value,
    },
    Coerce {
        lhs: Variable,
        value: Value,
        ty: Type,
    },
    Phi {
        lhs: Variable,
        entries: Vec<(Label, Value)>,
    },
    // Memory
    Load {
        lhs: Variable,
        ty: Type,
        address: Value,
    },
    Store {
        address: Value,
        value: Value,
    },
    StackAlloc {
        lhs: Variable,
        size: u32,
    },
    StackFree {
        size: u32,
    },
    // Calls
    Call {
        function: Arc<str>,
        args: Vec<Argument>,
    },
    AssignCall {
        lhs: Variable,
        ty: Type,
        function: Arc<str>,
        args: Vec<Argument>,
    },
    // Branches
    Jump {
        target: Label,
    },
    CompareJump {
        op: CmpOp,
        left: Value,
        right: Value,
        target: Label,
    },
    /// Jumps to the end of the function, where the epilogue returns `value`.
    Return {
        value: Option<Value>,
    },
}

impl Instruction {
    /// Returns the variable defined by this instruction.
    pub fn def(&self) -> Option<&Variable> {
        match self {
            Instruction::Assign { lhs, .. }
            | Instruction::Copy { lhs, .. }
            | Instruction::External { lhs, .. }
            | Instruction::Binary { lhs, .. }
            | Instruction::Coerce { lhs, .. }
            | Instruction::Phi { lhs, .. }
            | Instruction::Load { lhs, .. }
            | Instruction::StackAlloc { lhs, .. }
            | Instruction::AssignCall { lhs, .. } => Some(lhs),
            Instruction::Store { .. }
            | Instruction::StackFree { .. }
            | Instruction::Call { .. }
            | Instruction::Jump { .. }
            | Instruction::CompareJump { .. }
            | Instruction::Return { .. } => None,
        }
    }

    /// Returns the values read by this instruction, phi entries included.
    pub fn uses(&self) -> Vec<&Value> {
        match self {
            Instruction::Assign { rhs, .. } | Instruction::Copy { rhs, .. } => vec![rhs],
            Instruction::Binary { left, right, .. }
            | Instruction::CompareJump { left, right, .. } => vec![left, right],
            Instruction::Coerce { value, .. } => vec![value],
            Instruction::Phi { entries, .. } => entries.iter().map(|(_, v)| v).collect(),
            Instruction::Load { address, .. } => vec![address],
            Instruction::Store { address, value } => vec![address, value],
            Instruction::Call { args, .. } | Instruction::AssignCall { args, .. } => {
                args.iter().map(|a| &a.value).collect()
            }
            Instruction::Return { value } => value.iter().collect(),
            Instruction::External { .. }
            | Instruction::StackAlloc { .. }
            | Instruction::StackFree { .. }
            | Instruction::Jump { .. } => Vec::new(),
        }
    }

    /// Returns the variables read by this instruction, looking inside composite values.
    pub fn used_vars(&self) -> Vec<&Variable> {
        self.uses().into_iter().flat_map(Value::vars).collect()
    }

    /// Returns a copy of this instruction in which every used variable for which `f` returns a
    /// value is replaced by that value. The defined variable is left untouched.
    pub fn map_values<F>(&self, f: &mut F) -> Instruction
    where
        F: FnMut(&Variable) -> Option<Value>,
    {
        let map_args = |args: &[Argument], f: &mut F| -> Vec<Argument> {
            args.iter()
                .map(|a| Argument::new(a.value.map_vars(f), a.ty.clone()))
                .collect()
        };
        match self {
            Instruction::Assign { lhs, rhs } => Instruction::Assign {
                lhs: lhs.clone(),
                rhs: rhs.map_vars(f),
            },
            Instruction::Copy { lhs, rhs } => Instruction::Copy {
                lhs: lhs.clone(),
                rhs: rhs.map_vars(f),
            },
            Instruction::Binary {
                lhs,
                op,
                left,
                right,
            } => Instruction::Binary {
                lhs: lhs.clone(),
                op: *op,
                left: left.map_vars(f),
                right: right.map_vars(f),
            },
            Instruction::Coerce { lhs, value, ty } => Instruction::Coerce {
                lhs: lhs.clone(),
                value: value.map_vars(f),
                ty: ty.clone(),
            },
            Instruction::Phi { lhs, entries } => Instruction::Phi {
                lhs: lhs.clone(),
                entries: entries
                    .iter()
                    .map(|(label, v)| (label.clone(), v.map_vars(f)))
                    .collect(),
            },
            Instruction::Load { lhs, ty, address } => Instruction::Load {
                lhs: lhs.clone(),
                ty: ty.clone(),
                address: address.map_vars(f),
            },
            Instruction::Store { address, value } => Instruction::Store {
                address: address.map_vars(f),
                value: value.map_vars(f),
            },
            Instruction::Call { function, args } => Instruction::Call {
                function: function.clone(),
                args: map_args(args, f),
            },
            Instruction::AssignCall {
                lhs,
                ty,
                function,
                args,
            } => Instruction::AssignCall {
                lhs: lhs.clone(),
                ty: ty.clone(),
                function: function.clone(),
                args: map_args(args, f),
            },
            Instruction::CompareJump {
                op,
                left,
                right,
                target,
            } => Instruction::CompareJump {
                op: *op,
                left: left.map_vars(f),
                right: right.map_vars(f),
                target: target.clone(),
            },
            Instruction::Return { value } => Instruction::Return {
                value: value.as_ref().map(|v| v.map_vars(f)),
            },
            Instruction::External { .. }
            | Instruction::StackAlloc { .. }
            | Instruction::StackFree { .. }
            | Instruction::Jump { .. } => self.clone(),
        }
    }

    /// Replaces every use of `from` by `to`.
    pub fn substitute(&self, from: &Variable, to: &Value) -> Instruction {
        self.map_values(&mut |var| (var == from).then(|| to.clone()))
    }

    /// Returns a copy of this instruction defining `lhs` instead. Instructions without a
    /// definition are returned unchanged.
    pub fn with_def(&self, lhs: Variable) -> Instruction {
        let mut instr = self.clone();
        match &mut instr {
            Instruction::Assign { lhs: l, .. }
            | Instruction::Copy { lhs: l, .. }
            | Instruction::External { lhs: l, .. }
            | Instruction::Binary { lhs: l, .. }
            | Instruction::Coerce { lhs: l, .. }
            | Instruction::Phi { lhs: l, .. }
            | Instruction::Load { lhs: l, .. }
            | Instruction::StackAlloc { lhs: l, .. }
            | Instruction::AssignCall { lhs: l, .. } => *l = lhs,
            _ => {}
        }
        instr
    }

    /// Returns the label this instruction may branch to. `return` branches to [`FUNC_END`].
    pub fn target(&self) -> Option<Label> {
        match self {
            Instruction::Jump { target } | Instruction::CompareJump { target, .. } => {
                Some(target.clone())
            }
            Instruction::Return { .. } => Some(Label::from(FUNC_END)),
            _ => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. } | Instruction::CompareJump { .. } | Instruction::Return { .. }
        )
    }

    pub fn is_unconditional_branch(&self) -> bool {
        matches!(self, Instruction::Jump { .. } | Instruction::Return { .. })
    }

    /// Returns `true` if removing this instruction has no effect other than its definition
    /// disappearing.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Instruction::Assign { .. }
                | Instruction::Copy { .. }
                | Instruction::External { .. }
                | Instruction::Binary { .. }
                | Instruction::Coerce { .. }
                | Instruction::Load { .. }
                | Instruction::Phi { .. }
        )
    }

    /// Register allocation hints implied by this instruction on its own.
    pub fn coloring_preferences(&self) -> Vec<ColoringPreference> {
        use ColoringPreference::*;

        match self {
            Instruction::Assign { lhs, rhs: Value::Var(rhs) }
            | Instruction::Copy { lhs, rhs: Value::Var(rhs) }
            | Instruction::Coerce {
                lhs,
                value: Value::Var(rhs),
                ..
            } => vec![Coalesce(lhs.clone(), rhs.clone())],
            Instruction::Phi { lhs, entries } => entries
                .iter()
                .filter_map(|(_, v)| v.as_var())
                .filter(|v| *v != lhs)
                .map(|v| Coalesce(lhs.clone(), v.clone()))
                .collect(),
            Instruction::External {
                lhs,
                reg: Some(reg),
            } => vec![Pinned(lhs.clone(), *reg)],
            Instruction::Binary {
                lhs,
                op: op @ (BinOp::Div | BinOp::Mod),
                right,
                ..
            } => {
                let result = if *op == BinOp::Div { Reg::Rax } else { Reg::Rdx };
                let mut preferences = vec![Target(lhs.clone(), result)];
                if let Value::Var(divisor) = right {
                    preferences.push(Avoid(divisor.clone(), Reg::Rax));
                    preferences.push(Avoid(divisor.clone(), Reg::Rdx));
                }
                preferences
            }
            Instruction::AssignCall { lhs, .. } => vec![Target(lhs.clone(), Reg::Rax)],
            Instruction::Return {
                value: Some(Value::Var(var)),
            } => vec![Target(var.clone(), Reg::Rax)],
            _ => Vec::new(),
        }
    }
}

fn write_args(f: &mut std::fmt::Formatter<'_>, function: &str, args: &[Argument]) -> std::fmt::Result {
    write!(f, "call {function}(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

fn write_typed_lhs(f: &mut std::fmt::Formatter<'_>, lhs: &Variable, ty: &Type) -> std::fmt::Result {
    match ty {
        Type::Int64 => write!(f, "{lhs} = "),
        _ => write!(f, "{lhs}: {ty} = "),
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Assign { lhs, rhs } => write!(f, "{lhs} = {rhs}"),
            Instruction::Copy { lhs, rhs } => write!(f, "{lhs} := {rhs}"),
            Instruction::External { lhs, .. } => write!(f, "{lhs} = [externally assigned]"),
            Instruction::Binary {
                lhs,
                op,
                left,
                right,
            } => write!(f, "{lhs} = {left} {} {right}", op.symbol()),
            Instruction::Coerce { lhs, value, ty } => write!(f, "{lhs} = {value} as {ty}"),
            Instruction::Phi { lhs, entries } => {
                write!(f, "{lhs} = phi")?;
                for (i, (label, value)) in entries.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}[{label}, {value}]")?;
                }
                Ok(())
            }
            Instruction::Load { lhs, ty, address } => {
                write_typed_lhs(f, lhs, ty)?;
                write!(f, "load {address}")
            }
            Instruction::Store { address, value } => write!(f, "store {address}, {value}"),
            Instruction::StackAlloc { lhs, size } => write!(f, "{lhs} = stack_alloc({size})"),
            Instruction::StackFree { size } => write!(f, "stack_free({size})"),
            Instruction::Call { function, args } => write_args(f, function, args),
            Instruction::AssignCall {
                lhs,
                ty,
                function,
                args,
            } => {
                write_typed_lhs(f, lhs, ty)?;
                write_args(f, function, args)
            }
            Instruction::Jump { target } => write!(f, "goto {target}"),
            Instruction::CompareJump {
                op,
                left,
                right,
                target,
            } => write!(f, "if ({left} {} {right}) goto {target}", op.symbol()),
            Instruction::Return { value: Some(value) } => write!(f, "return {value}"),
            Instruction::Return { value: None } => f.write_str("return"),
        }
    }
}
