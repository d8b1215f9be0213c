use super::*;
use crate::{instr, Block, Cond, Function, Label, Mem, Reg, Root};

fn block(label: &str, instructions: Vec<Instruction>) -> Block {
    Block {
        label: label.into(),
        instructions,
    }
}

fn branching_function() -> Function {
    let mut function = Function::new("max".into());
    function.push_block(block(
        ".func_start",
        vec![
            instr::push(Reg::Rbp),
            instr::mov(Reg::Rbp, Reg::Rsp),
            instr::jmp(".entry".into()),
        ],
    ));
    function.push_block(block(
        ".entry",
        vec![
            instr::cmp(Reg::Rdi, Reg::Rsi),
            instr::jcc(Cond::Ge, ".left".into()),
            instr::mov(Reg::Rax, Reg::Rsi),
            instr::jmp(".func_end".into()),
        ],
    ));
    function.push_block(block(
        ".left",
        vec![
            instr::mov(Reg::Rax, Reg::Rdi),
            instr::jmp(".func_end".into()),
        ],
    ));
    function.push_block(block(
        ".func_end",
        vec![
            instr::mov(Reg::Rsp, Reg::Rbp),
            instr::pop(Reg::Rbp),
            instr::ret(),
        ],
    ));
    function
}

#[test]
pub fn outputs_empty_root() {
    let root = Root::new();
    let mut output = String::new();
    AsmOutputter::new(&mut output).write_root(&root).unwrap();
    assert_eq!("section .text\n", output);
}

#[test]
pub fn elides_jumps_to_the_next_block() {
    let mut output = String::new();
    AsmOutputter::new(&mut output)
        .write_function(&branching_function())
        .unwrap();
    assert_eq!(
        "global max
max:
.func_start:
    push rbp
    mov rbp, rsp
.entry:
    cmp rdi, rsi
    jge .left
    mov rax, rsi
    jmp .func_end
.left:
    mov rax, rdi
.func_end:
    mov rsp, rbp
    pop rbp
    ret
",
        output
    );
}

#[test]
pub fn keeps_fallthrough_jumps_when_configured() {
    let mut output = String::new();
    AsmOutputter::new(&mut output)
        .with_config(AsmOutputConfig {
            keep_fallthrough_jumps: true,
            omit_header: false,
        })
        .write_function(&branching_function())
        .unwrap();
    assert!(output.contains("    mov rbp, rsp\n    jmp .entry\n.entry:"));
    assert!(output.contains("    mov rax, rdi\n    jmp .func_end\n.func_end:"));
}

#[test]
pub fn declares_external_functions() {
    let mut function = Function::new("main".into());
    function.push_block(block(
        ".func_start",
        vec![
            instr::mov(Reg::Rdi, 42i64),
            instr::call(Label::from("print_int")),
            instr::ret(),
        ],
    ));
    let root: Root = [function].into_iter().collect();
    let mut output = String::new();
    AsmOutputter::new(&mut output).write_root(&root).unwrap();
    assert_eq!(
        "section .text
extern print_int

global main
main:
.func_start:
    mov rdi, 42
    call print_int
    ret
",
        output
    );
}

#[test]
pub fn formats_memory_operands() {
    let mut output = String::new();
    let mut outputter = AsmOutputter::new(&mut output);
    outputter
        .write_instruction(&instr::mov(Mem::new(Reg::Rbp, -16), Reg::Rax))
        .unwrap();
    outputter
        .write_instruction(&instr::mov(Reg::Rcx, Mem::new(Reg::Rsp, 8)))
        .unwrap();
    outputter
        .write_instruction(&instr::lea(Reg::Rdx, Mem::new(Reg::Rbp, -8)))
        .unwrap();
    outputter
        .write_instruction(&instr::idiv(Mem::new(Reg::Rdi, 0)))
        .unwrap();
    assert_eq!(
        "    mov qword [rbp - 16], rax
    mov rcx, qword [rsp + 8]
    lea rdx, [rbp - 8]
    idiv qword [rdi]
",
        output
    );
}
