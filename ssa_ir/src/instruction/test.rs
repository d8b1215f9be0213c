use super::*;
use crate::regalloc::ColoringPreference;
use vec1::vec1;

fn var(name: &str) -> Variable {
    Variable::new(name)
}

fn v(name: &str, version: u32) -> Variable {
    Variable::with_version(name, version)
}

fn binary(op: BinOp, left: impl Into<Value>, right: impl Into<Value>) -> Instruction {
    Instruction::Binary {
        lhs: var("x"),
        op,
        left: left.into(),
        right: right.into(),
    }
}

fn assign(rhs: impl Into<Value>) -> Vec<Instruction> {
    vec![Instruction::Assign {
        lhs: var("x"),
        rhs: rhs.into(),
    }]
}

#[test]
fn displays_instructions() {
    let cases = [
        (binary(BinOp::Add, var("a"), 1i64), "x = a + 1"),
        (binary(BinOp::Mod, v("a", 2), v("b", 3)), "x = a.2 % b.3"),
        (
            Instruction::Copy {
                lhs: var("x"),
                rhs: Value::Undefined,
            },
            "x := [undefined]",
        ),
        (
            Instruction::External {
                lhs: var("#rdi"),
                reg: Some(Reg::Rdi),
            },
            "#rdi = [externally assigned]",
        ),
        (
            Instruction::Load {
                lhs: var("t"),
                ty: Type::Int64.pointer_to(),
                address: Value::StackAddr(16),
            },
            "t: i64* = load [rbp - 16]",
        ),
        (
            Instruction::Store {
                address: var("p").into(),
                value: Value::Frame(24),
            },
            "store p, qword [rbp + 24]",
        ),
        (
            Instruction::StackAlloc {
                lhs: var("s"),
                size: 8,
            },
            "s = stack_alloc(8)",
        ),
        (Instruction::StackFree { size: 16 }, "stack_free(16)"),
        (
            Instruction::AssignCall {
                lhs: var("r"),
                ty: Type::Int64,
                function: "f".into(),
                args: vec![
                    Value::Int(1).into(),
                    Argument::new(
                        Value::Composite(vec1![var("a").into(), Value::Int(2)]),
                        Type::Blob(16),
                    ),
                ],
            },
            "r = call f(1, {a, 2}: blob(16))",
        ),
        (
            Instruction::Phi {
                lhs: v("x", 3),
                entries: vec![("A".into(), v("x", 1).into()), ("B".into(), v("x", 2).into())],
            },
            "x.3 = phi [A, x.1], [B, x.2]",
        ),
        (
            Instruction::CompareJump {
                op: CmpOp::Le,
                left: var("a").into(),
                right: Value::Int(0),
                target: ".L0".into(),
            },
            "if (a <= 0) goto .L0",
        ),
        (Instruction::Return { value: None }, "return"),
    ];
    for (instr, expected) in cases {
        assert_eq!(expected, instr.to_string());
    }
}

#[test]
fn reports_uses_and_defs() {
    let instr = Instruction::Call {
        function: "f".into(),
        args: vec![
            Value::Composite(vec1![var("a").into(), var("b").into()]).into(),
            Value::from(var("c")).into(),
        ],
    };
    assert_eq!(None, instr.def());
    assert_eq!(vec![&var("a"), &var("b"), &var("c")], instr.used_vars());

    let instr = binary(BinOp::Sub, var("a"), var("a"));
    assert_eq!(Some(&var("x")), instr.def());
    assert_eq!(vec![&var("a"), &var("a")], instr.used_vars());
}

#[test]
fn substitutes_uses_but_not_the_definition() {
    let instr = Instruction::Binary {
        lhs: var("a"),
        op: BinOp::Add,
        left: var("a").into(),
        right: var("b").into(),
    };
    assert_eq!("a = 7 + b", instr.substitute(&var("a"), &7i64.into()).to_string());
}

#[test]
fn return_targets_the_end_of_the_function() {
    let instr = Instruction::Return {
        value: Some(Value::Int(0)),
    };
    assert_eq!(Some(Label::from(FUNC_END)), instr.target());
    assert!(instr.is_unconditional_branch());
}

#[test]
fn folds_constants() {
    assert_eq!(assign(5i64), binary(BinOp::Add, 2i64, 3i64).simplify());
    assert_eq!(assign(-1i64), binary(BinOp::Sub, 2i64, 3i64).simplify());
    assert_eq!(assign(6i64), binary(BinOp::Mul, 2i64, 3i64).simplify());
    assert_eq!(assign(-3i64), binary(BinOp::Div, -7i64, 2i64).simplify());
    assert_eq!(assign(-1i64), binary(BinOp::Mod, -7i64, 2i64).simplify());
    assert_eq!(assign(i64::MIN), binary(BinOp::Add, i64::MAX, 1i64).simplify());
}

#[test]
fn never_folds_division_by_zero() {
    let div = binary(BinOp::Div, 1i64, 0i64);
    assert_eq!(vec![div.clone()], div.simplify());
    let rem = binary(BinOp::Mod, var("a"), 0i64);
    assert_eq!(vec![rem.clone()], rem.simplify());
}

#[test]
fn applies_identities() {
    assert_eq!(assign(var("a")), binary(BinOp::Add, var("a"), 0i64).simplify());
    assert_eq!(assign(var("a")), binary(BinOp::Add, 0i64, var("a")).simplify());
    assert_eq!(assign(var("a")), binary(BinOp::Sub, var("a"), 0i64).simplify());
    assert_eq!(assign(var("a")), binary(BinOp::Mul, 1i64, var("a")).simplify());
    assert_eq!(assign(0i64), binary(BinOp::Mul, var("a"), 0i64).simplify());
    assert_eq!(assign(var("a")), binary(BinOp::Div, var("a"), 1i64).simplify());
    assert_eq!(assign(0i64), binary(BinOp::Mod, var("a"), 1i64).simplify());

    let sub = binary(BinOp::Sub, 0i64, var("a"));
    assert_eq!(vec![sub.clone()], sub.simplify());
}

#[test]
fn folds_offsets_into_stack_addresses() {
    assert_eq!(
        assign(Value::StackAddr(8)),
        binary(BinOp::Add, Value::StackAddr(16), 8i64).simplify()
    );
    assert_eq!(
        assign(Value::StackAddr(24)),
        binary(BinOp::Sub, Value::StackAddr(16), 8i64).simplify()
    );
}

#[test]
fn keeps_stack_offsets_that_overflow() {
    let add = binary(BinOp::Add, Value::StackAddr(8), i64::MIN);
    assert_eq!(vec![add.clone()], add.simplify());
    let sub = binary(BinOp::Sub, Value::StackAddr(8), i64::MAX);
    assert_eq!(vec![sub.clone()], sub.simplify());
}

#[test]
fn folds_constant_comparisons() {
    let jump = |op, left, right| Instruction::CompareJump {
        op,
        left: Value::Int(left),
        right: Value::Int(right),
        target: "L".into(),
    };
    assert_eq!(
        vec![Instruction::Jump { target: "L".into() }],
        jump(CmpOp::Lt, 1, 2).simplify()
    );
    assert!(jump(CmpOp::Gt, 1, 2).simplify().is_empty());
    assert!(jump(CmpOp::Ne, 3, 3).simplify().is_empty());
}

#[test]
fn simplifies_phis() {
    let phi = |entries: Vec<(&str, Value)>| Instruction::Phi {
        lhs: var("x"),
        entries: entries
            .into_iter()
            .map(|(l, v)| (Label::from(l), v))
            .collect(),
    };

    assert!(phi(vec![]).simplify().is_empty());
    assert_eq!(assign(var("y")), phi(vec![("A", var("y").into())]).simplify());
    assert_eq!(
        assign(4i64),
        phi(vec![("A", 4i64.into()), ("B", 4i64.into())]).simplify()
    );
    assert_eq!(
        assign(var("y")),
        phi(vec![("A", var("y").into()), ("B", var("x").into())]).simplify()
    );

    let different = phi(vec![("A", var("y").into()), ("B", var("z").into())]);
    assert_eq!(vec![different.clone()], different.simplify());
}

#[test]
fn hints_register_preferences() {
    let div = Instruction::Binary {
        lhs: var("q"),
        op: BinOp::Div,
        left: var("a").into(),
        right: var("b").into(),
    };
    assert_eq!(
        vec![
            ColoringPreference::Target(var("q"), Reg::Rax),
            ColoringPreference::Avoid(var("b"), Reg::Rax),
            ColoringPreference::Avoid(var("b"), Reg::Rdx),
        ],
        div.coloring_preferences()
    );

    let external = Instruction::External {
        lhs: var("#rsi"),
        reg: Some(Reg::Rsi),
    };
    assert_eq!(
        vec![ColoringPreference::Pinned(var("#rsi"), Reg::Rsi)],
        external.coloring_preferences()
    );
}
