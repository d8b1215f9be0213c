use x86_ir::{instr, Block, Instruction, Reg};

/// The stack frame of a function:
///
/// ```text
/// [rbp + 16 + 8k]  k-th argument passed on the stack
/// [rbp + 8]        return address
/// [rbp]            saved rbp
/// [rbp - n]        stack slots, n <= size
///                  saved callee-saved registers
/// ```
///
/// `rsp` stays 16 byte aligned between the prologue and the epilogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    size: u32,
    saved: Vec<Reg>,
}

impl Frame {
    /// Builds the frame for a body that needs `slot_bytes` bytes of stack slots. Every callee-saved
    /// register the body writes to gets saved.
    pub fn new(slot_bytes: u32, body: &[Block]) -> Self {
        let saved: Vec<Reg> = Reg::ALL
            .into_iter()
            .filter(|&reg| reg.is_callee_saved() && reg != Reg::Rbp && reg != Reg::Rsp)
            .filter(|&reg| {
                body.iter()
                    .flat_map(|b| &b.instructions)
                    .any(|instr| instr.defs().contains(&reg))
            })
            .collect();
        let pushed = 8 * saved.len() as u32;
        let size = (slot_bytes + pushed).next_multiple_of(16) - pushed;
        log::trace!("frame of {size} bytes, saving {saved:?}");
        Self { size, saved }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn saved_regs(&self) -> &[Reg] {
        &self.saved
    }

    pub fn prologue(&self) -> Vec<Instruction> {
        let mut out = vec![instr::push(Reg::Rbp), instr::mov(Reg::Rbp, Reg::Rsp)];
        if self.size > 0 {
            out.push(instr::sub(Reg::Rsp, self.size as i64));
        }
        out.extend(self.saved.iter().map(|&reg| instr::push(reg)));
        out
    }

    pub fn epilogue(&self) -> Vec<Instruction> {
        let mut out: Vec<Instruction> = self.saved.iter().rev().map(|&reg| instr::pop(reg)).collect();
        out.push(instr::mov(Reg::Rsp, Reg::Rbp));
        out.push(instr::pop(Reg::Rbp));
        out.push(instr::ret());
        out
    }
}
