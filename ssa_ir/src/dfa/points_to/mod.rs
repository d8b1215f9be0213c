//! Inclusion-based (Andersen-style) points-to analysis.
//!
//! Every assigned variable, every stack slot whose address is taken and the heap are abstract
//! objects. Assignments add subset edges between them, loads and stores through a pointer add
//! complex constraints that are resolved into subset edges while solving. The analysis is
//! field-insensitive: pointer arithmetic keeps pointing to the same object.
//!
//! The result is informative only; code generation doesn't depend on it.


use crate::{BinOp, Cfg, Instruction, Value, Variable};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuntimeObject {
    Variable(Variable),
    /// The stack slot at `[rbp - offset]`.
    Stack(i64),
    Heap,
}

impl std::fmt::Display for RuntimeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeObject::Variable(var) => var.fmt(f),
            RuntimeObject::Stack(offset) => write!(f, "stack[rbp - {offset}]"),
            RuntimeObject::Heap => f.write_str("heap"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    points_to: BTreeSet<usize>,
    /// Nodes whose points-to set includes the one of this node.
    subset: BTreeSet<usize>,
    /// Targets of loads through this node.
    loads: BTreeSet<usize>,
    /// Sources of stores through this node.
    stores: BTreeSet<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct PointsTo {
    objects: Vec<RuntimeObject>,
    index: HashMap<RuntimeObject, usize>,
    nodes: Vec<Node>,
}

impl PointsTo {
    pub fn analyze(cfg: &Cfg) -> Self {
        let mut analysis = Self::default();
        for def in cfg.instructions().filter_map(Instruction::def) {
            analysis.node(RuntimeObject::Variable(def.clone()));
        }
        for instr in cfg.instructions() {
            analysis.add_constraints(instr);
        }
        analysis.solve();
        analysis
    }

    /// Returns the objects `object` may point to, in order.
    pub fn points_to(&self, object: &RuntimeObject) -> Vec<&RuntimeObject> {
        let Some(&node) = self.index.get(object) else {
            return Vec::new();
        };
        let objects: BTreeSet<&RuntimeObject> = self.nodes[node]
            .points_to
            .iter()
            .map(|&i| &self.objects[i])
            .collect();
        objects.into_iter().collect()
    }

    /// Returns the index of the node of `object`, creating it if needed.
    fn node(&mut self, object: RuntimeObject) -> usize {
        if let Some(&i) = self.index.get(&object) {
            return i;
        }
        let i = self.objects.len();
        self.objects.push(object.clone());
        self.index.insert(object, i);
        self.nodes.push(Node::default());
        i
    }

    /// Returns the node standing for `value` when it is used as a pointer.
    fn value_node(&mut self, value: &Value) -> Option<usize> {
        match value {
            Value::Var(var) => Some(self.node(RuntimeObject::Variable(var.clone()))),
            Value::StackAddr(offset) => Some(self.node(RuntimeObject::Stack(*offset))),
            _ => None,
        }
    }

    fn add_constraints(&mut self, instr: &Instruction) {
        match instr {
            Instruction::Assign { lhs, rhs }
            | Instruction::Copy { lhs, rhs }
            | Instruction::Coerce {
                lhs, value: rhs, ..
            } => self.add_copy(lhs, rhs),
            Instruction::Phi { lhs, entries } => {
                for (_, value) in entries {
                    self.add_copy(lhs, value);
                }
            }
            Instruction::Binary {
                lhs,
                op: BinOp::Add | BinOp::Sub,
                left,
                right,
            } => {
                self.add_copy(lhs, left);
                self.add_copy(lhs, right);
            }
            Instruction::AssignCall { lhs, ty, .. } if ty.is_pointer() => {
                let x = self.node(RuntimeObject::Variable(lhs.clone()));
                let heap = self.node(RuntimeObject::Heap);
                self.nodes[x].points_to.insert(heap);
            }
            Instruction::Load { lhs, address, .. } => {
                let x = self.node(RuntimeObject::Variable(lhs.clone()));
                match address {
                    Value::Var(var) => {
                        let p = self.node(RuntimeObject::Variable(var.clone()));
                        self.nodes[p].loads.insert(x);
                    }
                    Value::StackAddr(offset) => {
                        let s = self.node(RuntimeObject::Stack(*offset));
                        self.nodes[s].subset.insert(x);
                    }
                    _ => {}
                }
            }
            Instruction::Store { address, value } => match address {
                Value::Var(var) => {
                    if let Value::Var(source) = value {
                        let p = self.node(RuntimeObject::Variable(var.clone()));
                        let q = self.node(RuntimeObject::Variable(source.clone()));
                        self.nodes[p].stores.insert(q);
                    }
                }
                Value::StackAddr(offset) => {
                    let s = self.node(RuntimeObject::Stack(*offset));
                    match value {
                        Value::Var(source) => {
                            let q = self.node(RuntimeObject::Variable(source.clone()));
                            self.nodes[q].subset.insert(s);
                        }
                        Value::StackAddr(target) => {
                            let t = self.node(RuntimeObject::Stack(*target));
                            self.nodes[s].points_to.insert(t);
                        }
                        _ => {}
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    /// `lhs` may point to whatever `value` points to. A stack address points to its slot.
    fn add_copy(&mut self, lhs: &Variable, value: &Value) {
        let x = self.node(RuntimeObject::Variable(lhs.clone()));
        match value {
            Value::Var(var) => {
                let y = self.node(RuntimeObject::Variable(var.clone()));
                self.nodes[y].subset.insert(x);
            }
            Value::StackAddr(_) => {
                if let Some(s) = self.value_node(value) {
                    self.nodes[x].points_to.insert(s);
                }
            }
            Value::Composite(values) => {
                for value in values.iter() {
                    self.add_copy(lhs, value);
                }
            }
            _ => {}
        }
    }

    fn solve(&mut self) {
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| !self.nodes[i].points_to.is_empty())
            .collect();
        let mut in_queue: HashSet<usize> = queue.iter().copied().collect();

        while let Some(v) = queue.pop_front() {
            in_queue.remove(&v);
            let points_to: Vec<usize> = self.nodes[v].points_to.iter().copied().collect();
            let loads: Vec<usize> = self.nodes[v].loads.iter().copied().collect();
            let stores: Vec<usize> = self.nodes[v].stores.iter().copied().collect();

            for &a in &points_to {
                for &x in &loads {
                    if self.nodes[a].subset.insert(x) {
                        enqueue(&mut queue, &mut in_queue, a);
                    }
                }
                for &q in &stores {
                    if self.nodes[q].subset.insert(a) {
                        enqueue(&mut queue, &mut in_queue, q);
                    }
                }
            }

            let successors: Vec<usize> = self.nodes[v].subset.iter().copied().collect();
            for q in successors {
                let before = self.nodes[q].points_to.len();
                self.nodes[q].points_to.extend(points_to.iter().copied());
                if self.nodes[q].points_to.len() != before {
                    enqueue(&mut queue, &mut in_queue, q);
                }
            }
        }
    }
}

fn enqueue(queue: &mut VecDeque<usize>, in_queue: &mut HashSet<usize>, node: usize) {
    if in_queue.insert(node) {
        queue.push_back(node);
    }
}

impl std::fmt::Display for PointsTo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for object in &self.objects {
            let targets = self.points_to(object);
            if targets.is_empty() {
                continue;
            }
            write!(f, "{object} -> {{")?;
            for (i, target) in targets.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{target}")?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}
