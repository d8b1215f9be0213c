use super::{BinOp, Instruction};
use crate::{Value, Variable};

impl Instruction {
    /// Algebraic simplification of a single instruction.
    ///
    /// The result can be empty (the instruction has no effect), the instruction itself, or a
    /// simpler replacement. Division and modulo by zero are never folded.
    pub fn simplify(&self) -> Vec<Instruction> {
        match self {
            Instruction::Binary {
                lhs,
                op,
                left,
                right,
            } => match simplify_binary(*op, left, right) {
                Some(rhs) => vec![Instruction::Assign {
                    lhs: lhs.clone(),
                    rhs,
                }],
                None => vec![self.clone()],
            },
            Instruction::CompareJump {
                op,
                left: Value::Int(left),
                right: Value::Int(right),
                target,
            } => {
                if op.evaluate(*left, *right) {
                    vec![Instruction::Jump {
                        target: target.clone(),
                    }]
                } else {
                    Vec::new()
                }
            }
            Instruction::Phi { lhs, entries } => {
                // A phi that refers to itself doesn't contribute a new value along that edge.
                let mut values = entries
                    .iter()
                    .map(|(_, v)| v)
                    .filter(|v| !is_self_reference(v, lhs));
                let Some(first) = values.next() else {
                    return Vec::new();
                };
                if values.all(|v| v == first) {
                    vec![Instruction::Assign {
                        lhs: lhs.clone(),
                        rhs: first.clone(),
                    }]
                } else {
                    vec![self.clone()]
                }
            }
            _ => vec![self.clone()],
        }
    }
}

/// Returns the value `left op right` simplifies to, if any.
fn simplify_binary(op: BinOp, left: &Value, right: &Value) -> Option<Value> {
    use Value::{Int, StackAddr};

    match (op, left, right) {
        (_, Int(a), Int(b)) => op.apply(*a, *b).map(Int),
        // Stack addresses grow downwards from rbp.
        (BinOp::Add, StackAddr(offset), Int(c)) | (BinOp::Add, Int(c), StackAddr(offset)) => {
            offset.checked_sub(*c).map(StackAddr)
        }
        (BinOp::Sub, StackAddr(offset), Int(c)) => offset.checked_add(*c).map(StackAddr),
        (BinOp::Add, x, Int(0)) | (BinOp::Add, Int(0), x) => Some(x.clone()),
        (BinOp::Sub, x, Int(0)) => Some(x.clone()),
        (BinOp::Mul, x, Int(1)) | (BinOp::Mul, Int(1), x) => Some(x.clone()),
        (BinOp::Mul, _, Int(0)) | (BinOp::Mul, Int(0), _) => Some(Int(0)),
        (BinOp::Div, x, Int(1)) => Some(x.clone()),
        (BinOp::Mod, _, Int(1)) => Some(Int(0)),
        _ => None,
    }
}

fn is_self_reference(value: &Value, var: &Variable) -> bool {
    value.as_var() == Some(var)
}
