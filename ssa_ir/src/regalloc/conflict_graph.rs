use crate::dfa::liveness::LiveRanges;
use crate::Variable;
use std::collections::{BTreeMap, BTreeSet};

/// Undirected graph over the variables that are live somewhere in a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictGraph {
    neighbours: BTreeMap<Variable, BTreeSet<Variable>>,
}

impl ConflictGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two variables conflict if their live ranges intersect in some block.
    pub fn build_from(ranges: &LiveRanges) -> Self {
        let mut graph = Self::new();
        for (_, block) in ranges.iter() {
            let live: Vec<_> = block.iter().collect();
            for (i, (var, range)) in live.iter().enumerate() {
                graph.add_node((*var).clone());
                for (other, other_range) in &live[i + 1..] {
                    if range.intersects(other_range) {
                        graph.add_edge((*var).clone(), (*other).clone());
                    }
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, var: Variable) {
        self.neighbours.entry(var).or_default();
    }

    /// Adds both nodes if needed. Self loops are ignored.
    pub fn add_edge(&mut self, a: Variable, b: Variable) {
        if a == b {
            self.add_node(a);
            return;
        }
        self.neighbours.entry(a.clone()).or_default().insert(b.clone());
        self.neighbours.entry(b).or_default().insert(a);
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.neighbours.contains_key(var)
    }

    pub fn contains_edge(&self, a: &Variable, b: &Variable) -> bool {
        self.neighbours.get(a).is_some_and(|n| n.contains(b))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Variable> {
        self.neighbours.keys()
    }

    pub fn neighbours(&self, var: &Variable) -> impl Iterator<Item = &Variable> {
        self.neighbours.get(var).into_iter().flatten()
    }

    pub fn degree(&self, var: &Variable) -> usize {
        self.neighbours.get(var).map_or(0, BTreeSet::len)
    }

    pub fn len(&self) -> usize {
        self.neighbours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbours.is_empty()
    }
}

impl std::fmt::Display for ConflictGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (var, neighbours) in &self.neighbours {
            write!(f, "{var}:")?;
            for (i, neighbour) in neighbours.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{sep}{neighbour}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
