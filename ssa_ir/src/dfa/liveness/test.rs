use super::*;
use crate::optimizer::optimize;
use crate::passes::construct_ssa;
use crate::test_util::*;
use crate::{BinOp, CmpOp, Value};

fn range(first: usize, last: usize) -> LiveRange {
    LiveRange {
        first,
        last,
        is_dead: true,
    }
}

fn ranges_of(ranges: &LiveRanges, cfg: &Cfg, label: &str) -> Vec<(String, usize, usize, bool)> {
    let id = cfg.id_of(&label.into()).unwrap();
    ranges
        .block(id)
        .unwrap()
        .iter()
        .map(|(var, r)| (var.to_string(), r.first, r.last, r.is_dead))
        .collect()
}

fn t(var: &str, first: usize, last: usize, is_dead: bool) -> (String, usize, usize, bool) {
    (var.to_owned(), first, last, is_dead)
}

#[test]
fn half_open_ranges_intersect() {
    assert!(range(0, 3).intersects(&range(2, 5)));
    assert!(range(2, 5).intersects(&range(0, 3)));
    assert!(!range(0, 1).intersects(&range(1, 3)));
    assert!(!range(1, 3).intersects(&range(0, 1)));
    assert!(!range(2, 2).intersects(&range(0, 5)));
}

#[test]
fn live_across() {
    assert!(range(0, 3).is_live_across(0));
    assert!(range(0, 3).is_live_across(2));
    assert!(!range(0, 3).is_live_across(3));
    assert!(!range(1, 1).is_live_across(1));
}

#[test]
fn ranges_within_a_block() {
    let cfg = build(vec![
        label("entry"),
        load("a", Value::StackAddr(8)),
        op("b", BinOp::Add, var("a"), 1i64),
        op("c", BinOp::Mul, var("b"), var("a")),
        op("unused", BinOp::Sub, var("c"), 1i64),
        ret(var("c")),
    ]);
    let ranges = LiveRanges::build_from(&cfg);

    assert_eq!(
        vec![
            t("a", 0, 2, true),
            t("b", 1, 2, true),
            t("c", 2, 4, true),
        ],
        ranges_of(&ranges, &cfg, "entry")
    );
    assert!(ranges_of(&ranges, &cfg, ".func_start").is_empty());
}

#[test]
fn ranges_in_a_loop() {
    let mut cfg = build(vec![
        label("entry"),
        set("i", 0i64),
        goto("header"),
        label("header"),
        branch(CmpOp::Ge, var("i"), 10i64, "after"),
        goto("body"),
        label("body"),
        op("i", BinOp::Add, var("i"), 1i64),
        goto("header"),
        label("after"),
        ret(var("i")),
    ]);
    construct_ssa(&mut cfg);
    optimize(&mut cfg).unwrap();
    let ranges = LiveRanges::build_from(&cfg);

    assert_eq!(
        vec![t("i.3", 0, 3, false), t("i.5", 0, 3, false)],
        ranges_of(&ranges, &cfg, "header")
    );
    assert_eq!(
        vec![t("i.3", 0, 2, false), t("i.5", 0, 2, false)],
        ranges_of(&ranges, &cfg, "body")
    );
    assert_eq!(vec![t("i.3", 0, 0, true)], ranges_of(&ranges, &cfg, "after"));
    assert!(ranges_of(&ranges, &cfg, "entry").is_empty());
}

#[test]
fn branches_use_phi_sources() {
    let mut cfg = build(vec![
        label("entry"),
        load("x", Value::StackAddr(8)),
        load("y", Value::StackAddr(16)),
        branch(CmpOp::Eq, var("y"), 0i64, "join"),
        goto("other"),
        label("other"),
        set("x", 5i64),
        goto("join"),
        label("join"),
        ret(var("x")),
    ]);
    construct_ssa(&mut cfg);
    optimize(&mut cfg).unwrap();
    assert_eq!(
        vec!["x.5 = phi [entry, x.2], [other, 5]", "return x.5"],
        render(&cfg, "join")
    );

    let ranges = LiveRanges::build_from(&cfg);
    assert_eq!(
        vec![t("x.2", 0, 2, true), t("y", 1, 2, true)],
        ranges_of(&ranges, &cfg, "entry")
    );
    assert_eq!(vec![t("x.5", 0, 1, true)], ranges_of(&ranges, &cfg, "join"));
}
