//! Shorthands for writing functions in unit tests.

use crate::{BinOp, Block, Cfg, CmpOp, Instruction, Label, Line, NameGenerator, Value, Variable};

pub fn var(name: &str) -> Variable {
    Variable::new(name)
}

pub fn ver(name: &str, version: u32) -> Variable {
    Variable::with_version(name, version)
}

pub fn label(name: &str) -> Line {
    Line::Label(Label::from(name))
}

pub fn set(lhs: &str, rhs: impl Into<Value>) -> Line {
    Instruction::Assign {
        lhs: var(lhs),
        rhs: rhs.into(),
    }
    .into()
}

pub fn op(lhs: &str, op: BinOp, left: impl Into<Value>, right: impl Into<Value>) -> Line {
    Instruction::Binary {
        lhs: var(lhs),
        op,
        left: left.into(),
        right: right.into(),
    }
    .into()
}

pub fn load(lhs: &str, address: impl Into<Value>) -> Line {
    Instruction::Load {
        lhs: var(lhs),
        ty: crate::Type::Int64,
        address: address.into(),
    }
    .into()
}

pub fn store(address: impl Into<Value>, value: impl Into<Value>) -> Line {
    Instruction::Store {
        address: address.into(),
        value: value.into(),
    }
    .into()
}

pub fn alloc(lhs: &str, size: u32) -> Line {
    Instruction::StackAlloc { lhs: var(lhs), size }.into()
}

pub fn free(size: u32) -> Line {
    Instruction::StackFree { size }.into()
}

pub fn goto(target: &str) -> Line {
    Instruction::Jump {
        target: target.into(),
    }
    .into()
}

pub fn branch(op: CmpOp, left: impl Into<Value>, right: impl Into<Value>, target: &str) -> Line {
    Instruction::CompareJump {
        op,
        left: left.into(),
        right: right.into(),
        target: target.into(),
    }
    .into()
}

pub fn ret(value: impl Into<Value>) -> Line {
    Instruction::Return {
        value: Some(value.into()),
    }
    .into()
}

pub fn build(body: Vec<Line>) -> Cfg {
    Cfg::build(Vec::new(), body, &mut NameGenerator::new()).unwrap()
}

pub fn block<'a>(cfg: &'a Cfg, label: &str) -> &'a Block {
    &cfg[cfg.id_of(&label.into()).unwrap()]
}

/// Renders the instructions of the block labeled `label`.
pub fn render(cfg: &Cfg, label: &str) -> Vec<String> {
    block(cfg, label)
        .instructions
        .iter()
        .map(ToString::to_string)
        .collect()
}
