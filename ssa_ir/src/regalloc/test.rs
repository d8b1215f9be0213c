use super::*;
use crate::dfa::liveness::LiveRanges;
use crate::test_util::*;
use crate::{BinOp, IrError, Value};
use std::collections::BTreeMap;

fn graph(edges: &[(&str, &str)]) -> ConflictGraph {
    let mut graph = ConflictGraph::new();
    for (a, b) in edges {
        graph.add_edge(var(a), var(b));
    }
    graph
}

fn colors_of<C: Copy>(coloring: &BTreeMap<Variable, C>) -> Vec<(String, C)> {
    coloring
        .iter()
        .map(|(var, color)| (var.to_string(), *color))
        .collect()
}

fn c<C>(var: &str, color: C) -> (String, C) {
    (var.to_owned(), color)
}

#[test]
fn conflicts_from_live_ranges() {
    let cfg = build(vec![
        label("entry"),
        load("a", Value::StackAddr(8)),
        op("b", BinOp::Add, var("a"), 1i64),
        op("c", BinOp::Mul, var("b"), var("a")),
        ret(var("c")),
    ]);
    let graph = ConflictGraph::build_from(&LiveRanges::build_from(&cfg));

    assert_eq!(3, graph.len());
    assert!(graph.contains_edge(&var("a"), &var("b")));
    assert!(graph.contains_edge(&var("b"), &var("a")));
    assert!(!graph.contains_edge(&var("b"), &var("c")));
    assert_eq!("a: b\nb: a\nc:\n", graph.to_string());
}

#[test]
fn self_loops_are_ignored() {
    let graph = graph(&[("a", "a"), ("a", "b")]);
    assert_eq!(1, graph.degree(&var("a")));
    assert!(!graph.contains_edge(&var("a"), &var("a")));
    assert_eq!(0, graph.degree(&var("missing")));
}

#[test]
fn triangle_needs_three_colors() {
    let triangle = graph(&[("a", "b"), ("b", "c"), ("a", "c")]);

    let coloring = color(&triangle, &[0u8, 1, 2], &[]).unwrap();
    assert_eq!(vec![c("a", 2), c("b", 1), c("c", 0)], colors_of(&coloring));

    assert_eq!(
        Err(IrError::InsufficientColors {
            colors: 2,
            remaining: 3
        }),
        color(&triangle, &[0u8, 1], &[])
    );
}

#[test]
fn four_clique_with_three_colors_fails() {
    let clique = graph(&[
        ("a", "b"),
        ("a", "c"),
        ("a", "d"),
        ("b", "c"),
        ("b", "d"),
        ("c", "d"),
    ]);
    assert!(matches!(
        color(&clique, &[0u8, 1, 2], &[]),
        Err(IrError::InsufficientColors { colors: 3, .. })
    ));
}

#[test]
fn simplifies_highest_degree_first() {
    let path = graph(&[("a", "b"), ("b", "c")]);
    let coloring = color(&path, &[0u8, 1], &[]).unwrap();
    assert_eq!(vec![c("a", 0), c("b", 1), c("c", 0)], colors_of(&coloring));
}

#[test]
fn pinned_variables_keep_their_color() {
    let edge = graph(&[("a", "b")]);
    let preferences = [ColoringPreference::Pinned(var("a"), 5u8)];
    let coloring = color(&edge, &[5u8, 6], &preferences).unwrap();
    assert_eq!(vec![c("a", 5), c("b", 6)], colors_of(&coloring));
}

#[test]
fn adjacent_pins_to_the_same_color_fail() {
    let edge = graph(&[("a", "b")]);
    let preferences = [
        ColoringPreference::Pinned(var("a"), Reg::Rdi),
        ColoringPreference::Pinned(var("b"), Reg::Rdi),
    ];
    assert_eq!(
        Err(IrError::PinnedConflict {
            first: var("a"),
            second: var("b"),
            color: "rdi".to_owned()
        }),
        color(&edge, &[Reg::Rdi, Reg::Rsi], &preferences)
    );
}

#[test]
fn honours_soft_preferences() {
    let mut graph = graph(&[("a", "b")]);
    graph.add_node(var("c"));
    graph.add_node(var("d"));
    let preferences = [
        ColoringPreference::Target(var("b"), 1u8),
        ColoringPreference::Coalesce(var("a"), var("c")),
        ColoringPreference::Avoid(var("d"), 0),
    ];

    let coloring = color(&graph, &[0u8, 1, 2], &preferences).unwrap();
    assert_eq!(
        vec![c("a", 0), c("b", 1), c("c", 0), c("d", 1)],
        colors_of(&coloring)
    );
}

#[test]
fn preferences_never_break_conflicts() {
    let edge = graph(&[("a", "b")]);
    let preferences = [
        ColoringPreference::Target(var("a"), Reg::Rax),
        ColoringPreference::Target(var("b"), Reg::Rax),
        ColoringPreference::Coalesce(var("a"), var("b")),
    ];
    let coloring = color(&edge, &[Reg::Rax, Reg::Rcx], &preferences).unwrap();
    assert_ne!(coloring[&var("a")], coloring[&var("b")]);
}
