use super::*;
use crate::passes::construct_ssa;
use crate::test_util::*;
use crate::{Argument, BinOp, CmpOp};

fn optimized(body: Vec<crate::Line>) -> Cfg {
    let mut cfg = build(body);
    construct_ssa(&mut cfg);
    optimize(&mut cfg).unwrap();
    cfg
}

#[test]
fn folds_constant_branches() {
    let cfg = optimized(vec![
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

    assert_eq!(
        "\
.func_start:
    goto entry
entry:
    goto else
else:
    goto join
join:
    return 2
.func_end:
",
        cfg.to_string()
    );
}

#[test]
fn keeps_loop_phis() {
    let cfg = optimized(vec![
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

    assert_eq!(
        vec![
            "i.3 = phi [entry, 0], [body, i.5]",
            "if (i.3 >= 10) goto after",
            "goto body",
        ],
        render(&cfg, "header")
    );
    assert_eq!(vec!["i.5 = i.3 + 1", "goto header"], render(&cfg, "body"));
    assert_eq!(vec!["return i.3"], render(&cfg, "after"));
}

#[test]
fn folds_offsets_into_stack_slots() {
    let cfg = optimized(vec![
        label("entry"),
        set("p", Value::StackAddr(16)),
        op("q", BinOp::Add, var("p"), 8i64),
        load("t", var("q")),
        ret(var("t")),
    ]);
    assert_eq!(vec!["t = load [rbp - 8]", "return t"], render(&cfg, "entry"));
}

#[test]
fn never_folds_division_by_zero() {
    let cfg = optimized(vec![
        label("entry"),
        op("x", BinOp::Div, 1i64, 0i64),
        ret(var("x")),
    ]);
    assert_eq!(vec!["x = 1 / 0", "return x"], render(&cfg, "entry"));
}

#[test]
fn copies_are_not_propagated() {
    let copy = Instruction::Copy {
        lhs: var("x"),
        rhs: Value::Int(5),
    };
    let cfg = optimized(vec![label("entry"), copy.into(), ret(var("x"))]);
    assert_eq!(vec!["x := 5", "return x"], render(&cfg, "entry"));
}

#[test]
fn removes_unused_definitions() {
    let call = Instruction::AssignCall {
        lhs: var("r"),
        ty: crate::Type::Int64,
        function: "f".into(),
        args: vec![Argument::from(Value::Int(1))],
    };
    let cfg = optimized(vec![
        label("entry"),
        load("unused", Value::StackAddr(8)),
        call.into(),
        store(Value::StackAddr(8), 3i64),
        ret(0i64),
    ]);
    assert_eq!(
        vec!["call f(1)", "store [rbp - 8], 3", "return 0"],
        render(&cfg, "entry")
    );
}
