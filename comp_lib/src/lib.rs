//! Driver of the backend: reads functions in textual IR, runs them through the [`ssa_ir`]
//! pipeline and lowers them to x86-64 assembly.

pub mod codegen;
pub mod compile;
pub mod diagnostic;
pub mod parse;

mod error;

pub use error::{CompileError, CompileResult};
