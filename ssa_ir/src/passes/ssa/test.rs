use super::*;
use crate::test_util::*;
use crate::{BinOp, CmpOp};

#[test]
fn versions_increase_within_a_block() {
    let mut cfg = build(vec![
        label("entry"),
        set("x", 1i64),
        op("x", BinOp::Add, var("x"), 1i64),
        op("x", BinOp::Mul, var("x"), 2i64),
        ret(var("x")),
    ]);
    construct_ssa(&mut cfg);

    assert_eq!(
        vec!["x = 1", "x.1 = x + 1", "x.2 = x.1 * 2", "return x.2"],
        render(&cfg, "entry")
    );
    let entry = block(&cfg, "entry");
    assert!(entry.local_names.contains("x"));
    assert!(entry.exit_versions.is_empty());
}

#[test]
fn merges_branches_with_a_phi() {
    let mut cfg = build(vec![
        label("entry"),
        set("a", 5i64),
        branch(CmpOp::Lt, var("a"), 0i64, "then"),
        goto("else"),
        label("then"),
        set("x", 1i64),
        goto("join"),
        label("else"),
        set("x", 2i64),
        goto("join"),
        label("join"),
        ret(var("x")),
    ]);
    construct_ssa(&mut cfg);

    assert_eq!(
        vec![
            "x.1 = phi [.func_start, x]",
            "a = 5",
            "if (a < 0) goto then",
            "goto else",
        ],
        render(&cfg, "entry")
    );
    assert_eq!(
        vec!["x.2 = phi [entry, x.1]", "x.3 = 1", "goto join"],
        render(&cfg, "then")
    );
    assert_eq!(
        vec!["x.6 = phi [then, x.3], [else, x.5]", "return x.6"],
        render(&cfg, "join")
    );
    assert_eq!(Some(&3), block(&cfg, "then").exit_versions.get("x"));
    assert!(block(&cfg, "join").local_names.is_empty());
}

#[test]
fn merges_loop_carried_values() {
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

    assert_eq!(
        vec![
            "i.3 = phi [entry, i.2], [body, i.5]",
            "if (i.3 >= 10) goto after",
            "goto body",
        ],
        render(&cfg, "header")
    );
    assert_eq!(
        vec!["i.4 = phi [header, i.3]", "i.5 = i.4 + 1", "goto header"],
        render(&cfg, "body")
    );
    assert_eq!(
        vec!["i.6 = phi [header, i.3]", "return i.6"],
        render(&cfg, "after")
    );
}

#[test]
fn drops_placeholders_of_blocks_without_predecessors() {
    let mut cfg = build(vec![
        label("entry"),
        set("x", 1i64),
        goto("exit"),
        label("dead"),
        set("x", 2i64),
        goto("exit"),
        label("exit"),
        ret(var("x")),
    ]);
    construct_ssa(&mut cfg);

    assert_eq!(vec!["x.4 = 2", "goto exit"], render(&cfg, "dead"));
    assert!(block(&cfg, ".func_start")
        .instructions
        .iter()
        .all(|instr| !matches!(instr, Instruction::Phi { .. })));
}

#[test]
fn uses_without_definition_get_a_fresh_version() {
    let mut cfg = build(vec![
        label("entry"),
        op("y", BinOp::Add, var("z"), 1i64),
        set("z", var("y")),
        ret(var("z")),
    ]);
    construct_ssa(&mut cfg);

    assert_eq!(
        vec!["y = z + 1", "z.1 = y", "return z.1"],
        render(&cfg, "entry")
    );
}
