use super::*;
use crate::{CmpOp, Value, Variable};

fn label(name: &str) -> Line {
    Line::Label(Label::from(name))
}

fn goto(target: &str) -> Line {
    Instruction::Jump {
        target: target.into(),
    }
    .into()
}

fn if_lt(left: &str, right: i64, target: &str) -> Line {
    Instruction::CompareJump {
        op: CmpOp::Lt,
        left: Variable::new(left).into(),
        right: Value::Int(right),
        target: target.into(),
    }
    .into()
}

fn ret() -> Line {
    Instruction::Return { value: None }.into()
}

fn set(name: &str, value: i64) -> Line {
    Instruction::Assign {
        lhs: Variable::new(name),
        rhs: Value::Int(value),
    }
    .into()
}

fn build(body: Vec<Line>) -> IrResult<Cfg> {
    Cfg::build(Vec::new(), body, &mut NameGenerator::new())
}

fn labels(cfg: &Cfg, ids: impl Iterator<Item = BlockId>) -> Vec<String> {
    ids.map(|id| cfg[id].label.to_string()).collect()
}

#[test]
fn splits_blocks_at_labels() {
    let cfg = build(vec![
        label("entry"),
        set("a", 1),
        if_lt("a", 2, "then"),
        goto("else"),
        label("then"),
        goto("else"),
        label("else"),
        ret(),
    ])
    .unwrap();

    assert_eq!(5, cfg.len());
    let entry = cfg.id_of(&"entry".into()).unwrap();
    let else_ = cfg.id_of(&"else".into()).unwrap();
    assert_eq!(vec!["then", "else"], labels(&cfg, cfg.successor_ids(entry)));
    assert_eq!(vec!["entry", "then"], labels(&cfg, cfg.predecessor_ids(else_)));
    assert_eq!(vec![FUNC_END], labels(&cfg, cfg.successor_ids(else_)));
    assert_eq!(
        vec![FUNC_START],
        labels(&cfg, cfg.predecessor_ids(entry))
    );
}

#[test]
fn starts_with_the_prelude() {
    let prelude = vec![Instruction::External {
        lhs: Variable::new("#rdi"),
        reg: Some(crate::Reg::Rdi),
    }];
    let cfg = Cfg::build(prelude, vec![set("a", 1), ret()], &mut NameGenerator::new()).unwrap();

    assert_eq!(
        "\
.func_start:
    #rdi = [externally assigned]
    goto .L0
.L0:
    a = 1
    return
.func_end:
",
        cfg.to_string()
    );
}

#[test]
fn empty_body_jumps_to_the_end() {
    let cfg = build(Vec::new()).unwrap();
    assert_eq!(2, cfg.len());
    assert_eq!(
        vec![FUNC_END],
        labels(&cfg, cfg.successor_ids(cfg.start_id()))
    );
}

#[test]
fn requires_a_terminator() {
    assert_eq!(
        Err(IrError::MissingTerminator("a".into())),
        build(vec![label("a"), set("x", 1)]).map(|_| ())
    );
    assert_eq!(
        Err(IrError::MissingTerminator("b".into())),
        build(vec![label("a"), if_lt("x", 1, "b"), ret(), label("b")]).map(|_| ())
    );
}

#[test]
fn rejects_instructions_after_conditional_branches() {
    let result = build(vec![label("a"), if_lt("x", 1, "a"), set("y", 2), ret()]);
    assert_eq!(
        Err(IrError::InstructionAfterBranch {
            block: "a".into(),
            instruction: "y = 2".to_owned(),
        }),
        result.map(|_| ())
    );
}

#[test]
fn drops_instructions_after_unconditional_branches() {
    let cfg = build(vec![label("a"), ret(), set("y", 2), goto("a")]).unwrap();
    let a = cfg.id_of(&"a".into()).unwrap();
    assert_eq!(1, cfg[a].instructions.len());
    assert_eq!(vec![FUNC_START], labels(&cfg, cfg.predecessor_ids(a)));
}

#[test]
fn rejects_unknown_and_duplicate_labels() {
    assert_eq!(
        Err(IrError::UnknownLabel {
            block: "a".into(),
            label: "nowhere".into(),
        }),
        build(vec![label("a"), goto("nowhere")]).map(|_| ())
    );
    assert_eq!(
        Err(IrError::DuplicateLabel("a".into())),
        build(vec![label("a"), ret(), label("a"), ret()]).map(|_| ())
    );
    assert_eq!(
        Err(IrError::DuplicateLabel(".a".into())),
        build(vec![label("a"), ret(), label(".a"), ret()]).map(|_| ())
    );
}

#[test]
fn removes_unreachable_blocks() {
    let mut cfg = build(vec![
        label("a"),
        goto("c"),
        label("b"),
        goto("c"),
        label("c"),
        ret(),
    ])
    .unwrap();
    let c = cfg.id_of(&"c".into()).unwrap();
    assert_eq!(2, cfg.predecessor_ids(c).count());

    assert_eq!(1, cfg.remove_unreachable().unwrap());
    assert_eq!(None, cfg.id_of(&"b".into()));
    assert_eq!(vec!["a"], labels(&cfg, cfg.predecessor_ids(c)));
    assert_eq!(
        vec![FUNC_START, "a", "c", FUNC_END],
        labels(&cfg, cfg.block_ids().into_iter())
    );
}

#[test]
fn keeps_the_end_block() {
    let mut cfg = build(vec![label("a"), goto("a")]).unwrap();
    assert_eq!(0, cfg.remove_unreachable().unwrap());
    assert_eq!(Some(cfg.end_id()), cfg.id_of(&FUNC_END.into()));
    assert_eq!(Some(2), cfg.position(cfg.end_id()));
}
