//! SSA construction.
//!
//! Every block gets a phi for every variable that is referenced in more than one block, whether
//! or not the block needs it. Every use of a non-local variable is thus reached by a definition
//! in its own block. The optimizer removes the phis that turn out to be trivial.

#[cfg(test)]
mod test;

use crate::{BlockId, Cfg, Instruction, Value, Variable};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Hands out strictly increasing versions per variable name, starting at 0.
#[derive(Debug, Default)]
struct Versions {
    next: HashMap<Arc<str>, u32>,
}

impl Versions {
    fn mint(&mut self, name: &Arc<str>) -> Variable {
        let next = self.next.entry(name.clone()).or_insert(0);
        let var = Variable::with_version(name.clone(), *next);
        *next += 1;
        var
    }
}

/// Renames every variable of `cfg` so that each version is defined exactly once, and inserts
/// phis at the start of the blocks. The end of the function is left untouched, it holds no
/// instructions.
pub fn construct_ssa(cfg: &mut Cfg) {
    let ids: Vec<BlockId> = cfg
        .block_ids()
        .into_iter()
        .filter(|&id| id != cfg.end_id())
        .collect();

    let non_local = collect_names(cfg, &ids);
    log::trace!("{} variables are referenced in more than one block", non_local.len());

    let mut versions = Versions::default();
    for &id in &ids {
        rename_block(cfg, id, &non_local, &mut versions);
    }

    for &id in &ids {
        let predecessors: Vec<BlockId> = cfg.predecessor_ids(id).collect();
        let placeholders: Vec<Instruction> =
            cfg[id].instructions.drain(..non_local.len()).collect();
        if predecessors.is_empty() {
            continue;
        }

        let phis: Vec<Instruction> = placeholders
            .into_iter()
            .zip(&non_local)
            .map(|(placeholder, name)| Instruction::Phi {
                lhs: placeholder.def().cloned().unwrap_or_else(|| Variable::new(name.clone())),
                entries: predecessors
                    .iter()
                    .map(|&pred| {
                        let value = match cfg[pred].exit_versions.get(name) {
                            Some(&version) => Variable::with_version(name.clone(), version).into(),
                            None => Value::Undefined,
                        };
                        (cfg[pred].label.clone(), value)
                    })
                    .collect(),
            })
            .collect();
        cfg[id].instructions.splice(0..0, phis);
    }
}

/// Fills in the used and local names of every block and returns the names referenced in more
/// than one block, in order.
fn collect_names(cfg: &mut Cfg, ids: &[BlockId]) -> Vec<Arc<str>> {
    let mut referencing_blocks: BTreeMap<Arc<str>, usize> = BTreeMap::new();
    for &id in ids {
        let names: BTreeSet<Arc<str>> = cfg[id]
            .instructions
            .iter()
            .flat_map(|instr| instr.used_vars().into_iter().chain(instr.def()))
            .map(|var| var.name().clone())
            .collect();
        for name in &names {
            *referencing_blocks.entry(name.clone()).or_default() += 1;
        }
        cfg[id].used_names = names;
    }

    for &id in ids {
        let block = &mut cfg[id];
        block.local_names = block
            .used_names
            .iter()
            .filter(|name| referencing_blocks.get(*name) == Some(&1))
            .cloned()
            .collect();
    }

    referencing_blocks
        .into_iter()
        .filter(|(_, blocks)| *blocks > 1)
        .map(|(name, _)| name)
        .collect()
}

/// Prepends one placeholder definition per non-local name and renames the block from top to
/// bottom.
fn rename_block(cfg: &mut Cfg, id: BlockId, non_local: &[Arc<str>], versions: &mut Versions) {
    let mut live: HashMap<Arc<str>, Variable> = HashMap::new();
    let mut instructions = Vec::with_capacity(non_local.len() + cfg[id].instructions.len());
    for name in non_local {
        let lhs = versions.mint(name);
        live.insert(name.clone(), lhs.clone());
        instructions.push(Instruction::Assign {
            lhs,
            rhs: Value::Undefined,
        });
    }

    for instr in std::mem::take(&mut cfg[id].instructions) {
        let renamed = instr.map_values(&mut |var| {
            let current = live
                .entry(var.name().clone())
                .or_insert_with(|| versions.mint(var.name()));
            Some(current.clone().into())
        });
        let renamed = match renamed.def() {
            Some(def) => {
                let lhs = versions.mint(def.name());
                live.insert(def.name().clone(), lhs.clone());
                renamed.with_def(lhs)
            }
            None => renamed,
        };
        instructions.push(renamed);
    }

    let block = &mut cfg[id];
    block.instructions = instructions;
    block.exit_versions = non_local
        .iter()
        .filter_map(|name| live.get(name).map(|var| (name.clone(), var.version())))
        .collect();
}
