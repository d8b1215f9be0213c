use crate::{Label, Line, Type};
use std::sync::Arc;

/// A function as handed to the backend by a front end.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescriptor {
    pub name: Label,
    pub params: Vec<(Type, Arc<str>)>,
    pub body: Vec<Line>,
}

impl FunctionDescriptor {
    pub fn new(name: Label) -> Self {
        Self {
            name,
            params: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Returns all labels defined in the body.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.body.iter().filter_map(|line| match line {
            Line::Label(label) => Some(label),
            Line::Instruction(_) => None,
        })
    }
}
