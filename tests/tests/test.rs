use std::fs;

use comp_lib::{
    compile::{self, CompileOptsBuilder},
    diagnostic::{AggregateResult, Code, DiagnosticKind},
    parse,
};
use ssa_ir::FunctionDescriptor;
use x86_ir::emulator::Emulator;

include! {concat!(env!("OUT_DIR"), "/tests.rs")}

fn read(file: &str) -> String {
    let source = fs::read(file).unwrap();
    String::from_utf8(source).unwrap()
}

fn print_diagnostics<T>(res: &AggregateResult<T>) {
    for (t, d) in res.diagnostics() {
        match t {
            DiagnosticKind::Rec => println!("Rec: {d:?}"),
            DiagnosticKind::Err => println!("Err: {d:?}"),
        }
    }
}

fn parse_ok(file: &str, source: &str) -> Vec<FunctionDescriptor> {
    let res = parse::parse(source);
    if res.is_err() {
        println!(
            "Expected file `{}` to parse successfully but got the following diagnostics:",
            file
        );
        print_diagnostics(&res);
        println!();
    }
    res.into_value().unwrap()
}

fn output_test(file: &str, expected: &str) {
    let source = read(file);
    let functions = parse_ok(file, &source);

    for optimize in [true, false] {
        let opts = CompileOptsBuilder::new().optimize(optimize).build().unwrap();
        let root = compile::assemble(&functions, &opts).unwrap();
        let mut emulator = Emulator::new(&root).unwrap();
        if let Err(err) = emulator.call("main", &[]) {
            panic!("Running `main` failed (optimized: {optimize}): {err}");
        }

        pretty_assertions::assert_str_eq!(
            emulator.output(),
            expected,
            "The output of the program (left) does not match the expected output (right), optimized: {}",
            optimize
        );
    }
}

fn diagnostics_test(file: &str, expected_codes: Vec<Code>, needs_err: bool) {
    let source = read(file);
    let res = parse::parse(&source);
    if needs_err && !res.is_err() {
        panic!("Expected parsing to fail, but it didn't!");
    }
    if !needs_err && res.is_err() {
        println!("Expected parsing to succeed with only warnings, but it didn't! Here are the diagnostics:");
        print_diagnostics(&res);
        panic!();
    }

    let codes: Vec<Code> = res.diagnostics().map(|(_, d)| *d.code()).collect();
    pretty_assertions::assert_eq!(
        codes,
        expected_codes,
        "The diagnostic codes (left) do not match the expected codes (right)"
    );
}

fn compile_error_test(file: &str, expected: &str) {
    let source = read(file);
    let functions = parse_ok(file, &source);
    let opts = CompileOptsBuilder::new().build().unwrap();
    match compile::compile_program(&functions, &opts) {
        Ok(output) => panic!("Expected compiling to fail, but got:\n{output}"),
        Err(err) => {
            let debug = format!("{err:?}");
            assert!(
                debug.contains(expected),
                "Expected a `{expected}` error, got: {err}"
            );
        }
    }
}
