use super::moves::{self, Source};
use ssa_ir::{BinOp, Instruction, Type, Value, Variable};
use std::sync::Arc;
use x86_ir::{instr, Mem, Operand, Reg};

/// An argument of a call, as far as the calling convention is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Word(Source),
    /// The fields of an aggregate passed by value.
    Composite(Vec<ArgumentValue>),
    /// `words` consecutive words in memory, starting at `start`.
    Memory { start: Mem, words: u32 },
}

impl ArgumentValue {
    /// Flattens the argument into the 8 byte words that are passed.
    fn words(&self, out: &mut Vec<Source>) {
        match self {
            ArgumentValue::Word(source) => out.push(*source),
            ArgumentValue::Composite(fields) => fields.iter().for_each(|f| f.words(out)),
            ArgumentValue::Memory { start, words } => {
                out.extend((0..*words).map(|i| {
                    Source::Operand(Mem::new(start.base, start.disp + 8 * i as i32).into())
                }));
            }
        }
    }
}

/// How arguments travel from caller to callee.
pub trait CallingConvention {
    /// The number of bytes [`push_arguments`](CallingConvention::push_arguments) reserves on the
    /// stack for `args`.
    fn stack_bytes(&self, args: &[ArgumentValue]) -> u32;

    /// Appends the instructions that put `args` where the callee expects them, right before the
    /// `call`. Returns the number of bytes that need to be popped off the stack afterwards.
    fn push_arguments(&self, out: &mut Vec<x86_ir::Instruction>, args: &[ArgumentValue]) -> u32;

    /// Returns the instructions that copy the incoming parameters into stack slots of the callee.
    /// Afterwards every parameter name holds the address of its slot.
    fn pull_arguments(&self, params: &[(Type, Arc<str>)]) -> Vec<Instruction>;
}

/// The System V AMD64 calling convention, restricted to integer words.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemV;

impl SystemV {
    pub const ARGUMENT_REGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];
    /// Distance between `rbp` and the first argument passed on the stack: the saved `rbp` and the
    /// return address sit in between.
    pub const FIRST_STACK_ARGUMENT: i64 = 16;

    fn flatten(args: &[ArgumentValue]) -> Vec<Source> {
        let mut words = Vec::new();
        args.iter().for_each(|arg| arg.words(&mut words));
        words
    }
}

impl CallingConvention for SystemV {
    fn stack_bytes(&self, args: &[ArgumentValue]) -> u32 {
        let words = Self::flatten(args).len();
        8 * words.saturating_sub(Self::ARGUMENT_REGS.len()) as u32
    }

    fn push_arguments(&self, out: &mut Vec<x86_ir::Instruction>, args: &[ArgumentValue]) -> u32 {
        let words = Self::flatten(args);
        let bytes = self.stack_bytes(args);
        if bytes > 0 {
            out.push(instr::sub(Reg::Rsp, bytes as i64));
        }

        let destinations = Self::ARGUMENT_REGS
            .into_iter()
            .map(Operand::Reg)
            .chain((0..).map(|i| Operand::Mem(Mem::new(Reg::Rsp, 8 * i))));
        moves::parallel_move(out, words.into_iter().zip(destinations));
        bytes
    }

    fn pull_arguments(&self, params: &[(Type, Arc<str>)]) -> Vec<Instruction> {
        let mut externals = Vec::new();
        let mut body = Vec::new();
        let mut next_word = 0;

        for (ty, name) in params {
            let param = Variable::new(name.clone());
            body.push(Instruction::StackAlloc {
                lhs: param.clone(),
                size: ty.size(),
            });

            for word in 0..ty.words() {
                let offset = 8 * word as i64;
                let chunk = Variable::new(format!("{name}#{offset}"));
                body.push(Instruction::Binary {
                    lhs: chunk.clone(),
                    op: BinOp::Add,
                    left: param.clone().into(),
                    right: Value::Int(offset),
                });

                let source = match Self::ARGUMENT_REGS.get(next_word) {
                    Some(&reg) => {
                        let var = Variable::new(format!("#{reg}"));
                        externals.push(Instruction::External {
                            lhs: var.clone(),
                            reg: Some(reg),
                        });
                        Value::Var(var)
                    }
                    None => {
                        let k = (next_word - Self::ARGUMENT_REGS.len()) as i64;
                        Value::Frame(Self::FIRST_STACK_ARGUMENT + 8 * k)
                    }
                };
                next_word += 1;

                body.push(Instruction::Store {
                    address: chunk.into(),
                    value: source,
                });
            }
        }

        externals.extend(body);
        externals
    }
}
