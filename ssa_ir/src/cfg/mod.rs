//! Control-Flow Graph

#[cfg(test)]
mod test;

use crate::{Instruction, IrError, IrResult, Label, Line, NameGenerator};
use generational_arena::{Arena, Index as ArenaIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Label of the synthetic block every function starts in.
pub const FUNC_START: &str = ".func_start";
/// Label of the synthetic block every `return` jumps to. It holds no instructions.
pub const FUNC_END: &str = ".func_end";

#[derive(Debug, Clone)]
pub struct Block {
    pub label: Label,
    pub instructions: Vec<Instruction>,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>,
    /// Names referenced in this block, filled in by SSA construction.
    pub used_names: BTreeSet<Arc<str>>,
    /// Names referenced in this block only, filled in by SSA construction.
    pub local_names: BTreeSet<Arc<str>>,
    /// The version of every non-local name that is live when leaving the block.
    pub exit_versions: BTreeMap<Arc<str>, u32>,
}

impl Block {
    fn new(label: Label, instructions: Vec<Instruction>) -> Self {
        Self {
            label,
            instructions,
            successors: Vec::new(),
            predecessors: Vec::new(),
            used_names: BTreeSet::new(),
            local_names: BTreeSet::new(),
            exit_versions: BTreeMap::new(),
        }
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(ArenaIndex);

/// The basic blocks of one function, kept in program order.
///
/// The first block is always [`FUNC_START`] and the last one is always [`FUNC_END`]. Edges are
/// derived from the branch instructions and must be refreshed with
/// [`recompute_edges`](Cfg::recompute_edges) after branches change.
#[derive(Debug, Clone)]
pub struct Cfg {
    blocks: Arena<Block>,
    order: Vec<BlockId>,
    labels: HashMap<Label, BlockId>,
    start: BlockId,
    end: BlockId,
}

impl Cfg {
    /// Splits `body` into basic blocks.
    ///
    /// `prelude` becomes the body of the [`FUNC_START`] block, which then jumps to the first
    /// block of `body`. If `body` doesn't start with a label, a fresh one is taken from `names`.
    pub fn build(
        prelude: Vec<Instruction>,
        body: Vec<Line>,
        names: &mut NameGenerator,
    ) -> IrResult<Self> {
        names.reserve(FUNC_START);
        names.reserve(FUNC_END);
        for line in &body {
            if let Line::Label(label) = line {
                names.reserve(label.as_ref());
            }
        }

        let mut split: Vec<(Label, Vec<Instruction>)> = Vec::new();
        for line in body {
            match line {
                Line::Label(label) => split.push((label, Vec::new())),
                Line::Instruction(instr) => match split.last_mut() {
                    Some((_, instructions)) => instructions.push(instr),
                    None => split.push((names.next_label(), vec![instr])),
                },
            }
        }

        let first = split
            .first()
            .map_or_else(|| Label::from(FUNC_END), |(label, _)| label.clone());
        let mut start = prelude;
        start.push(Instruction::Jump { target: first });
        split.insert(0, (Label::from(FUNC_START), start));

        let mut blocks = Arena::new();
        let mut order = Vec::new();
        let mut labels = HashMap::new();
        let mut seen = HashSet::new();
        for (label, instructions) in split {
            if !seen.insert(label.as_ref().trim_start_matches('.').to_owned()) {
                return Err(IrError::DuplicateLabel(label));
            }
            let instructions = check_terminated(&label, instructions)?;
            let id = BlockId(blocks.insert(Block::new(label.clone(), instructions)));
            order.push(id);
            labels.insert(label, id);
        }
        let end_label = Label::from(FUNC_END);
        if !seen.insert(FUNC_END.trim_start_matches('.').to_owned()) {
            return Err(IrError::DuplicateLabel(end_label));
        }
        let end = BlockId(blocks.insert(Block::new(end_label.clone(), Vec::new())));
        order.push(end);
        labels.insert(end_label, end);

        let mut cfg = Self {
            start: order[0],
            end,
            blocks,
            order,
            labels,
        };
        cfg.recompute_edges()?;
        Ok(cfg)
    }

    /// Returns the number of blocks, [`FUNC_START`] and [`FUNC_END`] included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn start_id(&self) -> BlockId {
        self.start
    }

    pub fn end_id(&self) -> BlockId {
        self.end
    }

    /// Returns the ids of all blocks in program order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.order.clone()
    }

    /// Returns an iterator over all blocks in program order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.order.iter().map(|&id| (id, &self[id]))
    }

    /// Returns an iterator over the instructions of all blocks in program order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks().flat_map(|(_, block)| &block.instructions)
    }

    pub fn id_of(&self, label: &Label) -> Option<BlockId> {
        self.labels.get(label).copied()
    }

    /// Returns the index of the block in program order.
    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.order.iter().position(|&b| b == id)
    }

    pub fn successor_ids(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self[id].successors.iter().copied()
    }

    pub fn predecessor_ids(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self[id].predecessors.iter().copied()
    }

    /// Re-derives the edges from the branch instructions of every block.
    ///
    /// Instructions following the first unconditional branch of a block are dropped. Successors
    /// are listed in the order their branches appear, predecessors in program order.
    pub fn recompute_edges(&mut self) -> IrResult<()> {
        for &id in &self.order {
            let block = &mut self.blocks[id.0];
            if let Some(pos) = block
                .instructions
                .iter()
                .position(Instruction::is_unconditional_branch)
            {
                block.instructions.truncate(pos + 1);
            }

            let mut successors = Vec::new();
            for target in block.instructions.iter().filter_map(Instruction::target) {
                let Some(&succ) = self.labels.get(&target) else {
                    return Err(IrError::UnknownLabel {
                        block: block.label.clone(),
                        label: target,
                    });
                };
                if !successors.contains(&succ) {
                    successors.push(succ);
                }
            }
            block.successors = successors;
            block.predecessors.clear();
        }

        for i in 0..self.order.len() {
            let id = self.order[i];
            for succ in self[id].successors.clone() {
                self.blocks[succ.0].predecessors.push(id);
            }
        }
        Ok(())
    }

    /// Removes the blocks that can't be reached from [`FUNC_START`] and returns how many were
    /// removed. [`FUNC_END`] is never removed.
    pub fn remove_unreachable(&mut self) -> IrResult<usize> {
        let mut reachable = HashSet::from([self.start, self.end]);
        let mut queue = VecDeque::from([self.start]);
        while let Some(id) = queue.pop_front() {
            for &succ in &self[id].successors {
                if reachable.insert(succ) {
                    queue.push_back(succ);
                }
            }
        }

        let unreachable: Vec<_> = self
            .order
            .iter()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect();
        for &id in &unreachable {
            if let Some(block) = self.blocks.remove(id.0) {
                log::trace!("removing unreachable block `{}`", block.label);
                self.labels.remove(&block.label);
            }
        }
        self.order.retain(|id| reachable.contains(id));
        self.recompute_edges()?;
        Ok(unreachable.len())
    }
}

/// Checks that a block ends in an unconditional branch and that nothing but branches follow its
/// first branch. The end of the function doesn't need a terminator.
fn check_terminated(label: &Label, mut instructions: Vec<Instruction>) -> IrResult<Vec<Instruction>> {
    match instructions
        .iter()
        .position(Instruction::is_unconditional_branch)
    {
        Some(pos) => {
            if pos + 1 < instructions.len() {
                log::trace!(
                    "dropping {} unreachable instructions at the end of `{label}`",
                    instructions.len() - pos - 1
                );
                instructions.truncate(pos + 1);
            }
        }
        None => return Err(IrError::MissingTerminator(label.clone())),
    }

    if let Some(first_branch) = instructions.iter().position(Instruction::is_branch) {
        if let Some(instr) = instructions[first_branch..].iter().find(|i| !i.is_branch()) {
            return Err(IrError::InstructionAfterBranch {
                block: label.clone(),
                instruction: instr.to_string(),
            });
        }
    }
    Ok(instructions)
}

impl std::ops::Index<BlockId> for Cfg {
    type Output = Block;

    fn index(&self, index: BlockId) -> &Self::Output {
        &self.blocks[index.0]
    }
}

impl std::ops::IndexMut<BlockId> for Cfg {
    fn index_mut(&mut self, index: BlockId) -> &mut Self::Output {
        &mut self.blocks[index.0]
    }
}

impl std::fmt::Display for Cfg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (_, block) in self.blocks() {
            writeln!(f, "{}:", block.label)?;
            for instr in &block.instructions {
                writeln!(f, "    {instr}")?;
            }
        }
        Ok(())
    }
}
