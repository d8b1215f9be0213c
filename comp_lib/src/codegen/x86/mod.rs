//! Lowering of colored SSA functions to x86-64.
//!
//! Every instruction is translated on its own, using the register of each variable, the live
//! ranges of the block and the position of the instruction in it. Phis are resolved on the edges
//! that lead to them: a branch to a block with phis first moves the incoming values into place.
//! `r13`, `r14` and `r15` are reserved as scratch registers and never colored.


mod calling_convention;
mod frame;
mod moves;

pub use calling_convention::{ArgumentValue, CallingConvention, SystemV};
pub use frame::Frame;

use crate::{CompileError, CompileResult};
use moves::{Source, CYCLE_SCRATCH, MOVE_SCRATCH};
use ssa_ir::dfa::liveness::LiveRanges;
use ssa_ir::{
    Argument, BinOp, BlockId, Cfg, CmpOp, Instruction, Label, NameGenerator, Type, Value, Variable,
    FUNC_END,
};
use std::collections::{BTreeMap, BTreeSet};
use x86_ir::{instr, Block, Mem, Operand, Reg};

/// Scratch register for operands that can't be used directly, like constant divisors.
const OPERAND_SCRATCH: Reg = Reg::R13;

/// The registers handed out by the register allocator, in order of preference.
pub const COLORS: [Reg; 8] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
    Reg::Rax,
    Reg::R10,
];

/// Turns the label of a block into a label that is local to the function in assembly.
pub fn block_label(label: &Label) -> Label {
    if label.is_local() {
        label.clone()
    } else {
        Label::from(format!(".{label}"))
    }
}

/// Lowers `cfg` to an x86-64 function named `name`.
///
/// `slot_bytes` is the size of the stack slots laid out for the function, `coloring` assigns a
/// register to every variable that is live somewhere. `names` must be the generator the CFG was
/// built with, so fresh labels don't clash with the existing ones.
pub fn lower_function(
    name: &Label,
    cfg: &Cfg,
    slot_bytes: u32,
    ranges: &LiveRanges,
    coloring: &BTreeMap<Variable, Reg>,
    names: &mut NameGenerator,
) -> CompileResult<x86_ir::Function> {
    let mut lowering = FunctionLowering {
        cfg,
        ranges,
        coloring,
        names,
        convention: SystemV,
        blocks: Vec::new(),
    };

    for (id, block) in cfg.blocks() {
        if id == cfg.end_id() {
            continue;
        }
        lowering.start_block(block_label(&block.label));
        for (index, instruction) in block.instructions.iter().enumerate() {
            lowering.lower(id, index, instruction)?;
        }
    }
    let mut blocks = lowering.blocks;

    let frame = Frame::new(slot_bytes, &blocks);
    if let Some(first) = blocks.first_mut() {
        first.instructions.splice(0..0, frame.prologue());
    }
    blocks.push(Block {
        label: Label::from(FUNC_END),
        instructions: frame.epilogue(),
    });

    let mut function = x86_ir::Function::new(name.clone());
    for block in blocks {
        function.push_block(block);
    }
    Ok(function)
}

struct FunctionLowering<'a> {
    cfg: &'a Cfg,
    ranges: &'a LiveRanges,
    coloring: &'a BTreeMap<Variable, Reg>,
    names: &'a mut NameGenerator,
    convention: SystemV,
    /// Instructions are appended to the last block.
    blocks: Vec<Block>,
}

impl FunctionLowering<'_> {
    fn out(&mut self) -> &mut Vec<x86_ir::Instruction> {
        match self.blocks.last_mut() {
            Some(block) => &mut block.instructions,
            None => unreachable!("ICE: instruction lowered before the first block"),
        }
    }

    fn emit(&mut self, instruction: x86_ir::Instruction) {
        self.out().push(instruction);
    }

    fn start_block(&mut self, label: Label) {
        self.blocks.push(Block::new(label));
    }

    fn reg(&self, var: &Variable) -> CompileResult<Reg> {
        self.coloring
            .get(var)
            .copied()
            .ok_or_else(|| CompileError::MissingAssignment(var.clone()))
    }

    /// Returns `true` if the value defined by the instruction at `index` is never used.
    fn is_dead_def(&self, block: BlockId, index: usize, var: &Variable) -> bool {
        if !self.coloring.contains_key(var) {
            return true;
        }
        match self.ranges.get(block, var) {
            Some(range) => range.is_degenerate() && range.first == index,
            None => true,
        }
    }

    /// The registers of the variables other than `except` that hold a value still needed after
    /// the instruction at `index`.
    fn live_across(&self, block: BlockId, index: usize, except: Option<&Variable>) -> BTreeSet<Reg> {
        self.ranges
            .block(block)
            .into_iter()
            .flatten()
            .filter(|(var, range)| Some(*var) != except && range.is_live_across(index))
            .filter_map(|(var, _)| self.coloring.get(var).copied())
            .collect()
    }

    fn source(&self, value: &Value) -> CompileResult<Source> {
        match value {
            Value::Var(var) => Ok(self.reg(var)?.into()),
            Value::Int(i) => Ok((*i).into()),
            Value::StackAddr(offset) => Ok(Source::Address(stack_slot(*offset)?)),
            Value::Frame(offset) => Ok(Operand::Mem(frame_word(*offset)?).into()),
            Value::Float(_) => Err(CompileError::unsupported("float constants")),
            Value::Undefined => Err(CompileError::unsupported("use of an undefined value")),
            Value::Composite(_) => Err(CompileError::unsupported(
                "composite values outside call arguments",
            )),
        }
    }

    /// Returns the memory word at the address `value`. An address that is itself in memory is
    /// loaded into [`OPERAND_SCRATCH`] first.
    fn memory(&mut self, value: &Value) -> CompileResult<Mem> {
        match value {
            Value::Var(var) => Ok(Mem::new(self.reg(var)?, 0)),
            Value::StackAddr(offset) => stack_slot(*offset),
            Value::Frame(offset) => {
                let word = frame_word(*offset)?;
                self.emit(instr::mov(OPERAND_SCRATCH, word));
                Ok(Mem::new(OPERAND_SCRATCH, 0))
            }
            _ => Err(CompileError::unsupported(format!("`{value}` as address"))),
        }
    }

    /// Returns `source` as an operand that may appear as second operand of an arithmetic
    /// instruction, going through [`OPERAND_SCRATCH`] if needed.
    fn plain_operand(&mut self, source: Source) -> Operand {
        match source {
            Source::Operand(operand) if !operand.is_wide_imm() => operand,
            _ => {
                moves::assign(self.out(), OPERAND_SCRATCH.into(), source);
                OPERAND_SCRATCH.into()
            }
        }
    }

    fn lower(&mut self, block: BlockId, index: usize, instruction: &Instruction) -> CompileResult<()> {
        match instruction {
            Instruction::Assign { lhs, rhs }
            | Instruction::Copy { lhs, rhs }
            | Instruction::Coerce {
                lhs, value: rhs, ..
            } => {
                if self.is_dead_def(block, index, lhs) {
                    return Ok(());
                }
                let dest = self.reg(lhs)?;
                let src = self.source(rhs)?;
                moves::assign(self.out(), dest.into(), src);
            }
            Instruction::External { .. } | Instruction::Phi { .. } => {}
            Instruction::Binary {
                lhs,
                op,
                left,
                right,
            } => {
                if self.is_dead_def(block, index, lhs) {
                    return Ok(());
                }
                match op {
                    BinOp::Add | BinOp::Sub | BinOp::Mul => {
                        self.lower_arithmetic(lhs, *op, left, right)?
                    }
                    BinOp::Div | BinOp::Mod => {
                        self.lower_division(block, index, lhs, *op, left, right)?
                    }
                }
            }
            Instruction::Load { lhs, address, .. } => {
                if self.is_dead_def(block, index, lhs) {
                    return Ok(());
                }
                let dest = self.reg(lhs)?;
                let mem = self.memory(address)?;
                self.emit(instr::mov(dest, mem));
            }
            Instruction::Store { address, value } => {
                let src = self.source(value)?;
                let mem = self.memory(address)?;
                moves::assign(self.out(), mem.into(), src);
            }
            Instruction::StackAlloc { .. } | Instruction::StackFree { .. } => {
                return Err(CompileError::unsupported(format!(
                    "`{instruction}` left after the stack frame was laid out"
                )));
            }
            Instruction::Call { function, args } => {
                self.lower_call(block, index, function, args, None)?
            }
            Instruction::AssignCall {
                lhs,
                function,
                args,
                ..
            } => self.lower_call(block, index, function, args, Some(lhs))?,
            Instruction::Jump { target } => {
                let moves = self.phi_moves(block, target)?;
                moves::parallel_move(self.out(), moves);
                self.emit(instr::jmp(block_label(target)));
            }
            Instruction::CompareJump {
                op,
                left,
                right,
                target,
            } => self.lower_compare_jump(block, *op, left, right, target)?,
            Instruction::Return { value } => {
                if let Some(value) = value {
                    let src = self.source(value)?;
                    moves::assign(self.out(), Reg::Rax.into(), src);
                }
                self.emit(instr::jmp(Label::from(FUNC_END)));
            }
        }
        Ok(())
    }

    fn lower_arithmetic(
        &mut self,
        lhs: &Variable,
        op: BinOp,
        left: &Value,
        right: &Value,
    ) -> CompileResult<()> {
        let dest = self.reg(lhs)?;
        let (mut left, mut right) = (self.source(left)?, self.source(right)?);
        if right.reads(dest) && op.is_commutative() {
            std::mem::swap(&mut left, &mut right);
        }

        // `dest = left` would overwrite the right operand.
        let target = match right.reads(dest) && left != Source::from(dest) {
            true => MOVE_SCRATCH,
            false => dest,
        };
        moves::assign(self.out(), target.into(), left);
        let right = self.plain_operand(right);
        self.emit(match op {
            BinOp::Add => instr::add(target, right),
            BinOp::Sub => instr::sub(target, right),
            _ => instr::imul(target, right),
        });
        moves::assign(self.out(), dest.into(), target.into());
        Ok(())
    }

    /// `cqo; idiv` divides `rdx:rax`, leaving the quotient in `rax` and the remainder in `rdx`.
    /// Other values in those registers are parked in `r14` and `r15` meanwhile.
    fn lower_division(
        &mut self,
        block: BlockId,
        index: usize,
        lhs: &Variable,
        op: BinOp,
        left: &Value,
        right: &Value,
    ) -> CompileResult<()> {
        let dest = self.reg(lhs)?;
        let live = self.live_across(block, index, Some(lhs));
        let dividend = self.source(left)?;
        let mut divisor = self.source(right)?;

        let mut restores = Vec::new();
        for (reg, slot) in [(Reg::Rax, CYCLE_SCRATCH), (Reg::Rdx, MOVE_SCRATCH)] {
            let is_live = live.contains(&reg);
            if !is_live && !divisor.reads(reg) {
                continue;
            }
            self.emit(instr::mov(slot, reg));
            if divisor == Source::from(reg) {
                divisor = slot.into();
            }
            if is_live && reg != dest {
                restores.push(instr::mov(reg, slot));
            }
        }

        moves::assign(self.out(), Reg::Rax.into(), dividend);
        self.emit(instr::cqo());
        let divisor = match divisor {
            Source::Operand(operand @ (Operand::Reg(_) | Operand::Mem(_))) => operand,
            _ => {
                moves::assign(self.out(), OPERAND_SCRATCH.into(), divisor);
                OPERAND_SCRATCH.into()
            }
        };
        self.emit(instr::idiv(divisor));

        let result = if op == BinOp::Div { Reg::Rax } else { Reg::Rdx };
        moves::assign(self.out(), dest.into(), result.into());
        self.out().extend(restores);
        Ok(())
    }

    fn lower_call(
        &mut self,
        block: BlockId,
        index: usize,
        function: &str,
        args: &[Argument],
        result: Option<&Variable>,
    ) -> CompileResult<()> {
        let saved: Vec<Reg> = self
            .live_across(block, index, result)
            .into_iter()
            .filter(|reg| !reg.is_callee_saved())
            .collect();
        for &reg in &saved {
            self.emit(instr::push(reg));
        }

        let args = args
            .iter()
            .map(|arg| self.argument(&arg.value, &arg.ty))
            .collect::<CompileResult<Vec<_>>>()?;
        let stack_bytes = self.convention.stack_bytes(&args);
        let padding = match (8 * saved.len() as u32 + stack_bytes) % 16 {
            0 => 0,
            _ => 8,
        };
        if padding > 0 {
            self.emit(instr::sub(Reg::Rsp, padding as i64));
        }
        let convention = self.convention;
        let pushed = convention.push_arguments(self.out(), &args);
        self.emit(instr::call(Label::from(function)));
        if pushed + padding > 0 {
            self.emit(instr::add(Reg::Rsp, (pushed + padding) as i64));
        }

        if let Some(lhs) = result {
            if !self.is_dead_def(block, index, lhs) {
                let dest = self.reg(lhs)?;
                moves::assign(self.out(), dest.into(), Reg::Rax.into());
            }
        }
        for &reg in saved.iter().rev() {
            self.emit(instr::pop(reg));
        }
        Ok(())
    }

    fn argument(&mut self, value: &Value, ty: &Type) -> CompileResult<ArgumentValue> {
        match (value, ty) {
            (Value::Composite(fields), _) => fields
                .iter()
                .map(|field| self.argument(field, &Type::Int64))
                .collect::<CompileResult<_>>()
                .map(ArgumentValue::Composite),
            (_, Type::Blob(_)) => Ok(ArgumentValue::Memory {
                start: self.memory(value)?,
                words: ty.words(),
            }),
            _ => self.source(value).map(ArgumentValue::Word),
        }
    }

    fn lower_compare_jump(
        &mut self,
        block: BlockId,
        op: CmpOp,
        left: &Value,
        right: &Value,
        target: &Label,
    ) -> CompileResult<()> {
        let left = match self.source(left)? {
            Source::Operand(Operand::Reg(reg)) => reg,
            other => {
                moves::assign(self.out(), MOVE_SCRATCH.into(), other);
                MOVE_SCRATCH
            }
        };
        let right = self.source(right)?;
        let right = self.plain_operand(right);
        self.emit(instr::cmp(left, right));

        let moves = self.phi_moves(block, target)?;
        if moves.is_empty() {
            self.emit(instr::jcc(op.cond(), block_label(target)));
            return Ok(());
        }

        // Only the taken edge may run the moves for the phis of `target`.
        let skip = self.names.next_label();
        self.emit(instr::jcc(op.cond().invert(), skip.clone()));
        moves::parallel_move(self.out(), moves);
        self.emit(instr::jmp(block_label(target)));
        self.start_block(skip);
        Ok(())
    }

    /// The moves that give the phis of `target` their value when coming from `block`.
    fn phi_moves(&self, block: BlockId, target: &Label) -> CompileResult<Vec<(Source, Operand)>> {
        let Some(target_id) = self.cfg.id_of(target) else {
            return Ok(Vec::new());
        };
        let from = &self.cfg[block].label;

        let mut moves = Vec::new();
        for instruction in &self.cfg[target_id].instructions {
            let Instruction::Phi { lhs, entries } = instruction else {
                continue;
            };
            let Some(&dest) = self.coloring.get(lhs) else {
                continue;
            };
            if self
                .ranges
                .get(target_id, lhs)
                .map_or(true, |range| range.is_degenerate())
            {
                continue;
            }
            let Some((_, value)) = entries.iter().find(|(label, _)| label == from) else {
                continue;
            };
            let src = match value {
                Value::Undefined => continue,
                Value::Var(var) if !self.coloring.contains_key(var) => continue,
                _ => self.source(value)?,
            };
            moves.push((src, Operand::Reg(dest)));
        }
        Ok(moves)
    }
}

fn displacement(offset: i64) -> CompileResult<i32> {
    i32::try_from(offset)
        .map_err(|_| CompileError::unsupported(format!("stack offset {offset} out of range")))
}

/// The slot at `[rbp - offset]`.
fn stack_slot(offset: i64) -> CompileResult<Mem> {
    Ok(Mem::new(Reg::Rbp, -displacement(offset)?))
}

/// The word at `[rbp + offset]`, in the frame of the caller.
fn frame_word(offset: i64) -> CompileResult<Mem> {
    Ok(Mem::new(Reg::Rbp, displacement(offset)?))
}
