use crate::{Label, Variable};
use thiserror::Error;

/// Violations of the invariants the backend relies on. All of them abort the compilation of the
/// current function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("branch in block `{block}` targets unknown label `{label}`")]
    UnknownLabel { block: Label, label: Label },
    #[error("block `{0}` doesn't end with an unconditional branch")]
    MissingTerminator(Label),
    #[error("`{instruction}` follows a conditional branch in block `{block}`")]
    InstructionAfterBranch { block: Label, instruction: String },
    #[error("label `{0}` is defined more than once")]
    DuplicateLabel(Label),
    #[error("block `{block}` is entered with stack offsets {first} and {second}")]
    InconsistentStackOffset { block: Label, first: u32, second: u32 },
    #[error("`stack_alloc` in block `{0}` grows the stack frame beyond 2 GiB")]
    FrameTooLarge(Label),
    #[error("`stack_free` in block `{0}` releases more than was allocated")]
    UnbalancedStackFree(Label),
    #[error("coloring with {colors} colors failed: {remaining} variables couldn't be simplified")]
    InsufficientColors { colors: usize, remaining: usize },
    #[error("`{first}` and `{second}` conflict but are both pinned to {color}")]
    PinnedConflict {
        first: Variable,
        second: Variable,
        color: String,
    },
}

pub type IrResult<T> = Result<T, IrError>;
