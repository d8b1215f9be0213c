
use crate::{Instruction, Label};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub label: Label,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(label: Label) -> Self {
        Self {
            label,
            instructions: Vec::new(),
        }
    }
}

/// A function as a list of labeled blocks, in output order.
///
/// Control may fall through from the end of a block into the next one, so the order of the blocks
/// is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    name: Label,
    blocks: Vec<Block>,
}

impl Function {
    pub fn new(name: Label) -> Self {
        Self {
            name,
            blocks: Vec::new(),
        }
    }

    pub fn name(&self) -> &Label {
        &self.name
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Returns an iterator over all instructions of all blocks in order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks.iter().flat_map(|b| b.instructions.iter())
    }

    /// Returns the names of all functions called from this function.
    pub fn callees(&self) -> impl Iterator<Item = &Label> {
        self.instructions().filter_map(|instr| match instr {
            Instruction::Call(function) => Some(function),
            _ => None,
        })
    }
}

/// A translation unit: a list of functions in the order they should be output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Root {
    functions: Vec<Function>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name().as_ref() == name)
    }

    /// Returns the called functions that aren't defined in this root, sorted by name.
    pub fn external_labels(&self) -> BTreeSet<&Label> {
        self.functions
            .iter()
            .flat_map(|f| f.callees())
            .filter(|callee| self.function(callee.as_ref()).is_none())
            .collect()
    }
}

impl FromIterator<Function> for Root {
    fn from_iter<T: IntoIterator<Item = Function>>(iter: T) -> Self {
        Self {
            functions: iter.into_iter().collect(),
        }
    }
}
