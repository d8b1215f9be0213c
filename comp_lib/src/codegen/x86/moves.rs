//! Moves between registers, memory and immediates, and parallel moves built from them.

use x86_ir::{instr, Instruction, Mem, Operand, Reg};

/// Scratch register for memory-to-memory moves and wide immediates.
pub const MOVE_SCRATCH: Reg = Reg::R15;
/// Scratch register used to break cycles in parallel moves.
pub const CYCLE_SCRATCH: Reg = Reg::R14;

/// Something that can be moved into a register or memory word: an operand, or the address of a
/// memory operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Operand(Operand),
    Address(Mem),
}

impl Source {
    pub fn reads(&self, reg: Reg) -> bool {
        match self {
            Source::Operand(operand) => operand.reads(reg),
            Source::Address(mem) => mem.base == reg,
        }
    }

    /// Returns this source with every read of `from` replaced by a read of `to`.
    fn replace_reg(self, from: Reg, to: Reg) -> Self {
        let rebase = |mem: Mem| match mem.base == from {
            true => Mem::new(to, mem.disp),
            false => mem,
        };
        match self {
            Source::Operand(Operand::Reg(reg)) if reg == from => to.into(),
            Source::Operand(Operand::Mem(mem)) => Operand::Mem(rebase(mem)).into(),
            Source::Address(mem) => Source::Address(rebase(mem)),
            _ => self,
        }
    }
}

impl From<Operand> for Source {
    fn from(value: Operand) -> Self {
        Source::Operand(value)
    }
}

impl From<Reg> for Source {
    fn from(value: Reg) -> Self {
        Source::Operand(value.into())
    }
}

impl From<i64> for Source {
    fn from(value: i64) -> Self {
        Source::Operand(value.into())
    }
}

/// Appends the instructions that copy `src` into `dest`. Nothing is emitted if they're the same.
pub fn assign(out: &mut Vec<Instruction>, dest: Operand, src: Source) {
    match (dest, src) {
        (Operand::Imm(_), _) => unreachable!("ICE: assignment to immediate {dest}"),
        (_, Source::Operand(src)) if src == dest => {}
        (Operand::Reg(reg), Source::Address(mem)) => out.push(instr::lea(reg, mem)),
        (Operand::Mem(_), Source::Address(mem)) => {
            out.push(instr::lea(MOVE_SCRATCH, mem));
            out.push(instr::mov(dest, MOVE_SCRATCH));
        }
        (Operand::Mem(_), Source::Operand(src)) if src.is_mem() || src.is_wide_imm() => {
            out.push(instr::mov(MOVE_SCRATCH, src));
            out.push(instr::mov(dest, MOVE_SCRATCH));
        }
        (_, Source::Operand(src)) => out.push(instr::mov(dest, src)),
    }
}

/// Appends the instructions that perform all `moves` as if they happened at the same time.
///
/// Every destination may appear only once. Moves into destinations no other pending move reads
/// are done first, in order. What remains are cycles between registers, each is broken up by
/// parking one of its values in [`CYCLE_SCRATCH`].
pub fn parallel_move(out: &mut Vec<Instruction>, moves: impl IntoIterator<Item = (Source, Operand)>) {
    let mut pending: Vec<(Source, Operand)> = moves
        .into_iter()
        .filter(|(src, dest)| *src != Source::Operand(*dest))
        .collect();
    debug_assert!(
        pending
            .iter()
            .enumerate()
            .all(|(i, (_, d))| pending[i + 1..].iter().all(|(_, other)| other != d)),
        "a destination appears twice in a parallel move"
    );

    while !pending.is_empty() {
        let is_read_by_others = |i: usize, reg: Reg| {
            pending
                .iter()
                .enumerate()
                .any(|(j, (src, _))| j != i && src.reads(reg))
        };
        let ready = pending.iter().enumerate().position(|(i, (_, dest))| match dest {
            Operand::Reg(reg) => !is_read_by_others(i, *reg),
            _ => true,
        });

        match ready {
            Some(i) => {
                let (src, dest) = pending.remove(i);
                assign(out, dest, src);
            }
            None => {
                // Every destination is still read, so they're all registers.
                let Some(&(_, Operand::Reg(blocked))) = pending.first() else {
                    break;
                };
                out.push(instr::mov(CYCLE_SCRATCH, blocked));
                for (src, _) in &mut pending {
                    *src = src.replace_reg(blocked, CYCLE_SCRATCH);
                }
            }
        }
    }
}
