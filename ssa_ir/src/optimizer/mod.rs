//! Fixpoint optimizer.
//!
//! Every round propagates copies and constants, removes definitions nobody uses, simplifies each
//! instruction on its own and finally recomputes which blocks are still reachable. Rounds are
//! repeated until one of them doesn't change anything.

#[cfg(test)]
mod test;

use crate::{Cfg, Instruction, IrResult, Label, Value, Variable};
use std::collections::{HashMap, HashSet};

/// Optimizes `cfg` until nothing changes anymore and returns the number of rounds that were run.
pub fn optimize(cfg: &mut Cfg) -> IrResult<usize> {
    let mut rounds = 0;
    loop {
        rounds += 1;
        let substituted = propagate(cfg);
        let eliminated = eliminate_dead_definitions(cfg);
        let before = cfg.to_string();
        simplify(cfg);
        reconnect(cfg)?;
        let restructured = before != cfg.to_string();

        log::debug!(
            "optimizer round {rounds}: substituted: {substituted}, eliminated: {eliminated}, \
             restructured: {restructured}"
        );
        if !(substituted || eliminated || restructured) {
            break;
        }
    }
    log::trace!("optimized:\n{cfg}");
    Ok(rounds)
}

/// Removes every plain assignment and substitutes its source for all uses of its destination.
/// Returns `true` if there was anything to propagate.
fn propagate(cfg: &mut Cfg) -> bool {
    let mut substitutions: HashMap<Variable, Value> = HashMap::new();
    for instr in cfg.instructions() {
        if let Instruction::Assign { lhs, rhs } = instr {
            let source = resolve(&substitutions, rhs);
            substitutions.insert(lhs.clone(), source);
        }
    }
    if substitutions.is_empty() {
        return false;
    }
    log::trace!("propagating {} assignments", substitutions.len());

    for id in cfg.block_ids() {
        let block = &mut cfg[id];
        block
            .instructions
            .retain(|instr| !matches!(instr, Instruction::Assign { .. }));
        for instr in &mut block.instructions {
            *instr = instr.map_values(&mut |var| {
                substitutions
                    .contains_key(var)
                    .then(|| resolve(&substitutions, &Value::Var(var.clone())))
            });
        }
    }
    true
}

/// Follows substitutions until the value doesn't change anymore. Cycles can only consist of
/// undefined variables, the number of steps is bounded to get out of them.
fn resolve(substitutions: &HashMap<Variable, Value>, value: &Value) -> Value {
    let mut value = value.clone();
    for _ in 0..=substitutions.len() {
        let next = value.map_vars(&mut |var| substitutions.get(var).cloned());
        if next == value {
            break;
        }
        value = next;
    }
    value
}

/// Removes side-effect free definitions of variables that are never used. A phi using its own
/// destination doesn't count as a use.
fn eliminate_dead_definitions(cfg: &mut Cfg) -> bool {
    let mut used: HashSet<Variable> = HashSet::new();
    for instr in cfg.instructions() {
        let def = instr.def();
        let is_phi = matches!(instr, Instruction::Phi { .. });
        for var in instr.used_vars() {
            if !(is_phi && Some(var) == def) {
                used.insert(var.clone());
            }
        }
    }

    let mut changed = false;
    for id in cfg.block_ids() {
        let block = &mut cfg[id];
        let before = block.instructions.len();
        block.instructions.retain(|instr| {
            let dead = instr.is_pure() && instr.def().is_some_and(|def| !used.contains(def));
            if dead {
                log::trace!("removing dead `{instr}`");
            }
            !dead
        });
        changed |= before != block.instructions.len();

        for instr in &mut block.instructions {
            if let Instruction::AssignCall {
                lhs,
                function,
                args,
                ..
            } = instr
            {
                if !used.contains(lhs) {
                    let call = Instruction::Call {
                        function: function.clone(),
                        args: std::mem::take(args),
                    };
                    *instr = call;
                    changed = true;
                }
            }
        }
    }
    changed
}

fn simplify(cfg: &mut Cfg) {
    for id in cfg.block_ids() {
        let block = &mut cfg[id];
        block.instructions = block
            .instructions
            .iter()
            .flat_map(Instruction::simplify)
            .collect();
    }
}

/// Recomputes the edges, drops unreachable blocks and the phi entries of edges that are gone.
fn reconnect(cfg: &mut Cfg) -> IrResult<()> {
    cfg.recompute_edges()?;
    cfg.remove_unreachable()?;
    for id in cfg.block_ids() {
        let predecessors: HashSet<Label> = cfg
            .predecessor_ids(id)
            .map(|pred| cfg[pred].label.clone())
            .collect();
        for instr in &mut cfg[id].instructions {
            if let Instruction::Phi { entries, .. } = instr {
                entries.retain(|(label, _)| predecessors.contains(label));
            }
        }
    }
    Ok(())
}
