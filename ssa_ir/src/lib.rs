//! Function-level SSA intermediate representation and the analyses run on it.
//!
//! A function enters as a flat list of [`Line`]s. [`Cfg::build`] splits it into basic blocks,
//! [`passes`] lay out the stack frame and construct SSA form, the [`optimizer`] folds constants
//! and copies, and [`dfa`] and [`regalloc`] compute the register assignment used for lowering.

mod error;
mod function;
mod instruction;
mod name_generator;
mod value;

#[cfg(test)]
mod test_util;

pub mod cfg;
pub mod dfa;
pub mod optimizer;
pub mod passes;
pub mod regalloc;

pub use cfg::{Block, BlockId, Cfg, FUNC_END, FUNC_START};
pub use error::{IrError, IrResult};
pub use function::FunctionDescriptor;
pub use instruction::{Argument, BinOp, CmpOp, Instruction, Line};
pub use name_generator::NameGenerator;
pub use value::{Type, Value, Variable};
pub use x86_ir::{Label, Reg};
