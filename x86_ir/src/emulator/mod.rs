//! Reference interpreter for [`Root`]s.
//!
//! The emulator executes the instructions of this crate over sixteen 64 bit registers and a flat
//! stack. It only knows about the outcome of the last `cmp`, which is all `jcc` needs for the code
//! the backend generates. Besides calls between functions of the root, `print_int` is provided as
//! a built-in that appends its first argument and a newline to [`Emulator::output`].
//!
//! A few calling convention checks are done on the fly:
//!
//!  - `rsp` must be 16 byte aligned at every `call`.
//!  - Callee-saved registers must have their original value when a function returns.
//!  - Built-ins scramble all caller-saved registers, so values that are live across a call need to
//!    be saved by the caller.


use crate::{Cond, Instruction, Mem, Operand, Reg, Root};
use std::collections::HashMap;
use thiserror::Error;

const STACK_SIZE: usize = 1 << 20;
const STACK_BASE: u64 = 0x7fff_0000_0000;
const RETURN_SENTINEL: i64 = -1;
const DEFAULT_STEP_LIMIT: u64 = 10_000_000;
const ARGUMENT_REGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmulatorError {
    #[error("function `{0}` is not defined")]
    UnknownFunction(String),
    #[error("jump to undefined label `{0}`")]
    UnknownLabel(String),
    #[error("memory access out of bounds at address {0:#x}")]
    OutOfBounds(u64),
    #[error("division by zero")]
    DivideByZero,
    #[error("quotient doesn't fit in 64 bits")]
    DivideOverflow,
    #[error("`call {0}` with a stack pointer that isn't 16 byte aligned")]
    MisalignedCall(String),
    #[error("callee-saved register {0} was not restored")]
    ClobberedRegister(Reg),
    #[error("conditional jump without a preceding `cmp`")]
    MissingFlags,
    #[error("can't write to the immediate operand of `{0}`")]
    InvalidDestination(String),
    #[error("execution ran past the last instruction")]
    FellOffEnd,
    #[error("execution didn't finish within {0} steps")]
    StepLimitExceeded(u64),
    #[error("at most {} register arguments are supported", ARGUMENT_REGS.len())]
    TooManyArguments,
}

pub type EmulatorResult<T> = Result<T, EmulatorError>;

struct Program<'r> {
    code: Vec<&'r Instruction>,
    /// Resolved jump or call target of each instruction, `None` for calls to built-ins.
    targets: Vec<Option<usize>>,
    entries: HashMap<&'r str, usize>,
}

impl<'r> Program<'r> {
    fn load(root: &'r Root) -> EmulatorResult<Self> {
        let mut code = Vec::new();
        let mut entries = HashMap::new();
        let mut labels = HashMap::new();
        for function in root.functions() {
            let name = function.name().as_ref();
            entries.insert(name, code.len());
            for block in function.blocks() {
                labels.insert(qualified(name, block.label.as_ref()), code.len());
                code.extend(block.instructions.iter());
            }
        }

        let mut targets = Vec::with_capacity(code.len());
        for function in root.functions() {
            let name = function.name().as_ref();
            for instr in function.instructions() {
                let target = match instr {
                    Instruction::Jcc(_, label) | Instruction::Jmp(label) => {
                        let qualified = qualified(name, label.as_ref());
                        match labels.get(&qualified) {
                            Some(index) => Some(*index),
                            None => return Err(EmulatorError::UnknownLabel(qualified)),
                        }
                    }
                    Instruction::Call(label) => entries.get(label.as_ref()).copied(),
                    _ => None,
                };
                targets.push(target);
            }
        }

        Ok(Self {
            code,
            targets,
            entries,
        })
    }
}

/// Local labels (starting with a `.`) belong to the function they appear in.
fn qualified(function: &str, label: &str) -> String {
    if label.starts_with('.') {
        format!("{function}{label}")
    } else {
        label.to_owned()
    }
}

pub struct Emulator<'r> {
    program: Program<'r>,
    regs: [i64; 16],
    stack: Vec<u8>,
    flags: Option<(i64, i64)>,
    /// The callee-saved registers at each active call.
    saved: Vec<[i64; 16]>,
    output: String,
    steps: u64,
    step_limit: u64,
}

impl<'r> Emulator<'r> {
    pub fn new(root: &'r Root) -> EmulatorResult<Self> {
        let mut regs = [0; 16];
        for (i, reg) in regs.iter_mut().enumerate() {
            *reg = 0x5eed_0000 + i as i64;
        }
        Ok(Self {
            program: Program::load(root)?,
            regs,
            stack: vec![0; STACK_SIZE],
            flags: None,
            saved: Vec::new(),
            output: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
        })
    }

    pub fn with_step_limit(self, step_limit: u64) -> Self {
        Self { step_limit, ..self }
    }

    /// Everything written by `print_int` so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn reg(&self, reg: Reg) -> i64 {
        self.regs[reg.index()]
    }

    /// Calls `function` with the register arguments `args` and returns the value left in `rax`.
    pub fn call(&mut self, function: &str, args: &[i64]) -> EmulatorResult<i64> {
        if args.len() > ARGUMENT_REGS.len() {
            return Err(EmulatorError::TooManyArguments);
        }
        let Some(&entry) = self.program.entries.get(function) else {
            return Err(EmulatorError::UnknownFunction(function.to_owned()));
        };
        for (reg, arg) in ARGUMENT_REGS.iter().zip(args) {
            self.set_reg(*reg, *arg);
        }

        // Mimic the state right after a `call`: aligned stack minus the return address.
        self.set_reg(Reg::Rsp, (STACK_BASE + STACK_SIZE as u64) as i64);
        self.saved.push(self.regs);
        self.push(RETURN_SENTINEL)?;

        self.execute(entry)?;
        Ok(self.reg(Reg::Rax))
    }

    fn execute(&mut self, mut ip: usize) -> EmulatorResult<()> {
        loop {
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(EmulatorError::StepLimitExceeded(self.step_limit));
            }
            let Some(instr) = self.program.code.get(ip).copied() else {
                return Err(EmulatorError::FellOffEnd);
            };
            let target = self.program.targets[ip];
            ip += 1;

            match instr {
                Instruction::Mov(dest, src) => {
                    let value = self.read(src)?;
                    self.write(dest, value, instr)?;
                }
                Instruction::Lea(dest, mem) => self.set_reg(*dest, address(&self.regs, mem) as i64),
                Instruction::Push(reg) => self.push(self.reg(*reg))?,
                Instruction::Pop(reg) => {
                    let value = self.pop()?;
                    self.set_reg(*reg, value);
                }
                Instruction::Add(dest, src) => {
                    let value = self.read(dest)?.wrapping_add(self.read(src)?);
                    self.write(dest, value, instr)?;
                }
                Instruction::Sub(dest, src) => {
                    let value = self.read(dest)?.wrapping_sub(self.read(src)?);
                    self.write(dest, value, instr)?;
                }
                Instruction::Imul(dest, src) => {
                    let value = self.reg(*dest).wrapping_mul(self.read(src)?);
                    self.set_reg(*dest, value);
                }
                Instruction::Cqo => {
                    let high = if self.reg(Reg::Rax) < 0 { -1 } else { 0 };
                    self.set_reg(Reg::Rdx, high);
                }
                Instruction::Idiv(divisor) => self.idiv(divisor)?,
                Instruction::Cmp(left, right) => {
                    self.flags = Some((self.read(left)?, self.read(right)?));
                }
                Instruction::Jcc(cond, _) => {
                    if self.condition(*cond)? {
                        ip = target.ok_or(EmulatorError::FellOffEnd)?;
                    }
                }
                Instruction::Jmp(_) => ip = target.ok_or(EmulatorError::FellOffEnd)?,
                Instruction::Call(function) => {
                    if self.reg(Reg::Rsp) % 16 != 0 {
                        return Err(EmulatorError::MisalignedCall(function.to_string()));
                    }
                    match target {
                        Some(entry) => {
                            self.saved.push(self.regs);
                            self.push(ip as i64)?;
                            ip = entry;
                        }
                        None => self.call_builtin(function.as_ref())?,
                    }
                }
                Instruction::Ret => {
                    let return_address = self.pop()?;
                    let saved = self.saved.pop().ok_or(EmulatorError::FellOffEnd)?;
                    for reg in Reg::ALL.into_iter().filter(|r| r.is_callee_saved()) {
                        if saved[reg.index()] != self.reg(reg) {
                            return Err(EmulatorError::ClobberedRegister(reg));
                        }
                    }
                    if return_address == RETURN_SENTINEL {
                        return Ok(());
                    }
                    ip = return_address as usize;
                }
            }
        }
    }

    fn call_builtin(&mut self, function: &str) -> EmulatorResult<()> {
        match function {
            "print_int" => {
                let value = self.reg(Reg::Rdi);
                self.output += &format!("{value}\n");
            }
            _ => return Err(EmulatorError::UnknownFunction(function.to_owned())),
        }
        for reg in Reg::ALL.into_iter().filter(|r| !r.is_callee_saved()) {
            self.set_reg(reg, 0x0bad_0000 + reg.index() as i64);
        }
        Ok(())
    }

    fn idiv(&mut self, divisor: &Operand) -> EmulatorResult<()> {
        let divisor = self.read(divisor)? as i128;
        if divisor == 0 {
            return Err(EmulatorError::DivideByZero);
        }
        let dividend =
            ((self.reg(Reg::Rdx) as i128) << 64) | (self.reg(Reg::Rax) as u64 as i128);
        let quotient =
            i64::try_from(dividend / divisor).map_err(|_| EmulatorError::DivideOverflow)?;
        let remainder = (dividend % divisor) as i64;
        self.set_reg(Reg::Rax, quotient);
        self.set_reg(Reg::Rdx, remainder);
        Ok(())
    }

    fn condition(&self, cond: Cond) -> EmulatorResult<bool> {
        let (left, right) = self.flags.ok_or(EmulatorError::MissingFlags)?;
        Ok(cond.holds(left, right))
    }

    fn set_reg(&mut self, reg: Reg, value: i64) {
        self.regs[reg.index()] = value;
    }

    fn read(&self, operand: &Operand) -> EmulatorResult<i64> {
        match operand {
            Operand::Reg(reg) => Ok(self.reg(*reg)),
            Operand::Imm(imm) => Ok(*imm),
            Operand::Mem(mem) => self.load(address(&self.regs, mem)),
        }
    }

    fn write(&mut self, operand: &Operand, value: i64, instr: &Instruction) -> EmulatorResult<()> {
        match operand {
            Operand::Reg(reg) => {
                self.set_reg(*reg, value);
                Ok(())
            }
            Operand::Mem(mem) => self.store(address(&self.regs, mem), value),
            Operand::Imm(_) => Err(EmulatorError::InvalidDestination(instr.to_string())),
        }
    }

    fn push(&mut self, value: i64) -> EmulatorResult<()> {
        let rsp = self.reg(Reg::Rsp).wrapping_sub(8);
        self.set_reg(Reg::Rsp, rsp);
        self.store(rsp as u64, value)
    }

    fn pop(&mut self) -> EmulatorResult<i64> {
        let rsp = self.reg(Reg::Rsp);
        let value = self.load(rsp as u64)?;
        self.set_reg(Reg::Rsp, rsp.wrapping_add(8));
        Ok(value)
    }

    fn slot(&self, address: u64) -> EmulatorResult<usize> {
        address
            .checked_sub(STACK_BASE)
            .map(|offset| offset as usize)
            .filter(|offset| offset + 8 <= self.stack.len())
            .ok_or(EmulatorError::OutOfBounds(address))
    }

    fn load(&self, address: u64) -> EmulatorResult<i64> {
        let offset = self.slot(address)?;
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&self.stack[offset..offset + 8]);
        Ok(i64::from_le_bytes(bytes))
    }

    fn store(&mut self, address: u64, value: i64) -> EmulatorResult<()> {
        let offset = self.slot(address)?;
        self.stack[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}

fn address(regs: &[i64; 16], mem: &Mem) -> u64 {
    (regs[mem.base.index()] as u64).wrapping_add(mem.disp as i64 as u64)
}
