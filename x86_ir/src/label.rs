use std::sync::Arc;

/// A symbolic name for a position in the code, a function or a basic block.
///
/// Labels are shared between the threads that compile functions in parallel, so the name lives in
/// an [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(Arc<str>);

impl Label {
    /// Returns `true` for labels that are local to the enclosing function (they start with a `.`).
    pub fn is_local(&self) -> bool {
        self.0.starts_with('.')
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
