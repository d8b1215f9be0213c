use ssa_ir::{IrError, Label, Variable};
use thiserror::Error;

/// Reasons the backend gives up on a function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Ir(#[from] IrError),
    #[error("`{0}` is used but has no register assigned")]
    MissingAssignment(Variable),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("in function `{function}`: {source}")]
    InFunction {
        function: Label,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub(crate) fn unsupported(what: impl std::fmt::Display) -> Self {
        Self::Unsupported(what.to_string())
    }

    pub(crate) fn in_function(self, function: &Label) -> Self {
        Self::InFunction {
            function: function.clone(),
            source: Box::new(self),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;
