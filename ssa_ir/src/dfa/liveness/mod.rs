//! Liveness Analysis
//!
//! A variable is live in a block if it is defined on some path leading into (or inside) the block
//! and used on some path starting in the block. Uses by phis are attributed to the predecessor the
//! value comes from. This over-approximates the precise live sets: a variable that is redefined
//! before every use is still considered live.
//!
//! For every live variable a [`LiveRange`] over the instruction indices of the block is computed.
//! Two variables interfere if their ranges overlap in some block.

#[cfg(test)]
mod test;

use crate::{BlockId, Cfg, Instruction, Variable};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    /// Index of the instruction where the range starts: 0 if the variable is live on entry,
    /// otherwise its definition.
    pub first: usize,
    /// Index of the last use if the variable dies in the block, the number of instructions if it
    /// is live on exit.
    pub last: usize,
    pub is_dead: bool,
}

impl LiveRange {
    /// A degenerate range belongs to a variable that is defined and immediately dead.
    pub fn is_degenerate(&self) -> bool {
        self.first == self.last
    }

    /// Returns `true` if the half-open intervals `[first, last)` overlap. Degenerate ranges never
    /// intersect anything.
    pub fn intersects(&self, other: &LiveRange) -> bool {
        !self.is_degenerate()
            && !other.is_degenerate()
            && self.first < other.last
            && other.first < self.last
    }

    /// Returns `true` if the variable holds a value that is still needed after the instruction at
    /// `index`.
    pub fn is_live_across(&self, index: usize) -> bool {
        !self.is_degenerate() && self.first <= index && index < self.last
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveRanges(BTreeMap<BlockId, BTreeMap<Variable, LiveRange>>);

impl LiveRanges {
    pub fn build_from(cfg: &Cfg) -> Self {
        LiveRangesBuilder::new(cfg).build()
    }

    /// Returns the live ranges of the variables that are live in `block`.
    pub fn block(&self, block: BlockId) -> Option<&BTreeMap<Variable, LiveRange>> {
        self.0.get(&block)
    }

    pub fn get(&self, block: BlockId, var: &Variable) -> Option<&LiveRange> {
        self.0.get(&block)?.get(var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &BTreeMap<Variable, LiveRange>)> {
        self.0.iter().map(|(&id, ranges)| (id, ranges))
    }

    /// Renders the live ranges per block, in program order.
    pub fn render(&self, cfg: &Cfg) -> String {
        let mut out = String::new();
        for (id, block) in cfg.blocks() {
            out.push_str(&format!("{}:\n", block.label));
            for (var, range) in self.0.get(&id).into_iter().flatten() {
                let dead = if range.is_dead { " dead" } else { "" };
                out.push_str(&format!("    {var}: [{}, {}){dead}\n", range.first, range.last));
            }
        }
        out
    }
}

struct LiveRangesBuilder<'a> {
    cfg: &'a Cfg,
    ids: Vec<BlockId>,
    positions: HashMap<BlockId, usize>,
}

impl<'a> LiveRangesBuilder<'a> {
    fn new(cfg: &'a Cfg) -> Self {
        let ids = cfg.block_ids();
        let positions = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        Self {
            cfg,
            ids,
            positions,
        }
    }

    fn build(self) -> LiveRanges {
        let reachable = self.reachability();
        let used = self.used_sets(&reachable);
        let defined = self.defined_sets();
        let live: Vec<BTreeSet<Variable>> = used
            .iter()
            .zip(&defined)
            .map(|(used, defined)| used.intersection(defined).cloned().collect())
            .collect();

        let mut ranges = BTreeMap::new();
        for (i, &id) in self.ids.iter().enumerate() {
            let block_ranges = live[i]
                .iter()
                .map(|var| (var.clone(), self.live_range(id, var, &live)))
                .collect();
            ranges.insert(id, block_ranges);
        }
        LiveRanges(ranges)
    }

    /// Transitive closure of the successor relation, Floyd–Warshall style.
    fn reachability(&self) -> Vec<Vec<bool>> {
        let n = self.ids.len();
        let mut reachable = vec![vec![false; n]; n];
        for (i, &id) in self.ids.iter().enumerate() {
            for succ in self.cfg.successor_ids(id) {
                reachable[i][self.positions[&succ]] = true;
            }
        }
        for k in 0..n {
            for i in 0..n {
                if !reachable[i][k] {
                    continue;
                }
                for j in 0..n {
                    if reachable[k][j] {
                        reachable[i][j] = true;
                    }
                }
            }
        }
        reachable
    }

    /// Variables used in each block or in any block reachable from it.
    fn used_sets(&self, reachable: &[Vec<bool>]) -> Vec<BTreeSet<Variable>> {
        let mut local = vec![BTreeSet::new(); self.ids.len()];
        for (i, (_, block)) in self.cfg.blocks().enumerate() {
            for instr in &block.instructions {
                match instr {
                    Instruction::Phi { entries, .. } => {
                        for (label, value) in entries {
                            let Some(pred) = self.cfg.id_of(label) else {
                                continue;
                            };
                            local[self.positions[&pred]].extend(value.vars().into_iter().cloned());
                        }
                    }
                    _ => local[i].extend(instr.used_vars().into_iter().cloned()),
                }
            }
        }

        let mut used = local.clone();
        for (i, set) in used.iter_mut().enumerate() {
            for (j, reached) in local.iter().enumerate() {
                if reachable[i][j] {
                    set.extend(reached.iter().cloned());
                }
            }
        }
        used
    }

    /// Variables defined in each block or on some path leading into it.
    fn defined_sets(&self) -> Vec<BTreeSet<Variable>> {
        let mut defined: Vec<BTreeSet<Variable>> = self
            .cfg
            .blocks()
            .map(|(_, block)| {
                block
                    .instructions
                    .iter()
                    .filter_map(Instruction::def)
                    .cloned()
                    .collect()
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for (i, &id) in self.ids.iter().enumerate() {
                for pred in self.cfg.predecessor_ids(id) {
                    let p = self.positions[&pred];
                    if p == i {
                        continue;
                    }
                    let missing: Vec<Variable> =
                        defined[p].difference(&defined[i]).cloned().collect();
                    if !missing.is_empty() {
                        defined[i].extend(missing);
                        changed = true;
                    }
                }
            }
        }
        defined
    }

    fn live_range(&self, id: BlockId, var: &Variable, live: &[BTreeSet<Variable>]) -> LiveRange {
        let is_live_in = |block: BlockId| live[self.positions[&block]].contains(var);
        let block = &self.cfg[id];

        let first = if self.cfg.predecessor_ids(id).any(is_live_in) {
            0
        } else {
            block
                .instructions
                .iter()
                .position(|instr| {
                    !matches!(instr, Instruction::Phi { .. }) && instr.def() == Some(var)
                })
                .unwrap_or(0)
        };

        let is_dead = !self.cfg.successor_ids(id).any(is_live_in);
        let last = if is_dead {
            block
                .instructions
                .iter()
                .rposition(|instr| self.uses(id, instr, var))
                .map_or(first, |last| last.max(first))
        } else {
            block.instructions.len()
        };

        LiveRange {
            first,
            last,
            is_dead,
        }
    }

    /// Returns `true` if `instr`, in block `id`, reads `var`. A branch reads the values the phis
    /// of its target take from this block.
    fn uses(&self, id: BlockId, instr: &Instruction, var: &Variable) -> bool {
        if matches!(instr, Instruction::Phi { .. }) {
            return false;
        }
        if instr.used_vars().contains(&var) {
            return true;
        }
        let Some(target) = instr.target().and_then(|label| self.cfg.id_of(&label)) else {
            return false;
        };
        let label = &self.cfg[id].label;
        self.cfg[target].instructions.iter().any(|instr| match instr {
            Instruction::Phi { entries, .. } => entries
                .iter()
                .any(|(from, value)| from == label && value.vars().contains(&var)),
            _ => false,
        })
    }
}
