mod function;
mod instruction;
mod label;
mod outputter;
mod reg;

pub mod emulator;

pub use function::{Block, Function, Root};
pub use instruction::{instr, Cond, Instruction, Mem, Operand};
pub use label::Label;
pub use outputter::*;
pub use reg::Reg;
