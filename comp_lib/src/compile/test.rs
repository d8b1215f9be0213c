use super::*;
use crate::parse::parse;
use pretty_assertions::assert_eq;
use ssa_ir::{IrError, Label};

fn functions(source: &str) -> Vec<FunctionDescriptor> {
    parse(source).into_value().unwrap()
}

fn opts(format: OutputFormat) -> CompileOpts {
    CompileOptsBuilder::new().output_format(format).build().unwrap()
}

const ADD: &str = "
fun add(a: i64, b: i64) {
entry:
    x = load a
    y = load b
    s = x + y
    return s
}
";

#[test]
fn builder_checks_register_count() {
    for registers in [0, 9] {
        assert_eq!(
            Err(CompileOptsErr::InvalidRegisterCount(registers)),
            CompileOptsBuilder::new().registers(registers).build().map(|_| ())
        );
    }
    assert!(CompileOptsBuilder::new().registers(1).build().is_ok());
}

#[test]
fn builder_rejects_optimized_output_without_optimizer() {
    let res = CompileOptsBuilder::new()
        .optimize(false)
        .output_format(OutputFormat::OptimizedSsa)
        .build();
    assert_eq!(
        Err(CompileOptsErr::OptimizedWithoutOptimizer(OutputFormat::OptimizedSsa)),
        res.map(|_| ())
    );

    let opts = CompileOptsBuilder::new()
        .optimize(false)
        .output_format(OutputFormat::LiveRanges)
        .build()
        .unwrap();
    assert_eq!(OutputFormat::LiveRanges, opts.output_format());
}

#[test]
fn dumps_are_headed_by_function_names() {
    let source = format!("{ADD}\nfun one() {{\nentry:\n    return 1\n}}\n");
    let dump = compile_program(&functions(&source), &opts(OutputFormat::Ssa)).unwrap();
    assert!(dump.starts_with("function add:\n.func_start:\n"), "{dump}");

    let one = dump.find("function one:\n").unwrap();
    assert!(one > 0);
    assert!(dump[one..].contains("    return 1\n"));
}

#[test]
fn optimizer_removes_plain_assignments() {
    let source = "fun f() {\nentry:\n    x = 1\n    y = x + 2\n    return y\n}\n";
    let assigns_one = |dump: &str| dump.lines().any(|line| line.trim_end().ends_with("= 1"));

    let ssa = compile_program(&functions(source), &opts(OutputFormat::Ssa)).unwrap();
    assert!(assigns_one(&ssa), "{ssa}");

    let optimized = compile_program(&functions(source), &opts(OutputFormat::OptimizedSsa)).unwrap();
    assert!(!assigns_one(&optimized), "{optimized}");
}

#[test]
fn every_format_compiles() {
    let functions = functions(ADD);
    for format in [
        OutputFormat::Ssa,
        OutputFormat::OptimizedSsa,
        OutputFormat::LiveRanges,
        OutputFormat::ConflictGraph,
        OutputFormat::PointsTo,
    ] {
        let artifacts = compile_all(&functions, &opts(format)).unwrap();
        assert!(
            matches!(artifacts.as_slice(), [Artifact::Dump(dump)] if !dump.is_empty()),
            "{format}"
        );
    }

    let artifacts = compile_all(&functions, &opts(OutputFormat::Asm)).unwrap();
    let [Artifact::Asm(add)] = artifacts.as_slice() else {
        panic!("expected one assembled function");
    };
    assert_eq!("add", add.name().as_ref());
}

#[test]
fn assemble_ignores_the_output_format() {
    let root = assemble(&functions(ADD), &opts(OutputFormat::ConflictGraph)).unwrap();
    assert_eq!(1, root.functions().len());
}

#[test]
fn errors_name_their_function() {
    let source = "
fun fine() {
entry:
    return 0
}

fun lost() {
entry:
    goto nowhere
}
";
    let err = compile_program(&functions(source), &opts(OutputFormat::Asm)).unwrap_err();
    assert_eq!(
        CompileError::InFunction {
            function: "lost".into(),
            source: Box::new(CompileError::Ir(IrError::UnknownLabel {
                block: "entry".into(),
                label: "nowhere".into(),
            })),
        },
        err
    );
    assert_eq!(
        "in function `lost`: branch in block `entry` targets unknown label `nowhere`",
        err.to_string()
    );
}

#[test]
fn too_few_registers() {
    let opts = CompileOptsBuilder::new().registers(1).build().unwrap();
    let err = assemble(&functions(ADD), &opts).unwrap_err();
    let CompileError::InFunction { function, source } = err else {
        panic!("expected the function to be named, got {err:?}");
    };
    assert_eq!(Label::from("add"), function);
    assert!(matches!(
        *source,
        CompileError::Ir(IrError::InsufficientColors { colors: 1, .. })
    ));
}

#[test]
fn oversized_frames_are_rejected() {
    let source = "fun main() {\nentry:\n    p = stack_alloc(4294967295)\n    return 0\n}\n";
    let err = assemble(&functions(source), &opts(OutputFormat::Asm)).unwrap_err();
    assert_eq!(
        CompileError::InFunction {
            function: "main".into(),
            source: Box::new(CompileError::Ir(IrError::FrameTooLarge("entry".into()))),
        },
        err
    );
}

#[test]
fn stack_offsets_that_overflow_stay_unfolded() {
    let source = "
fun main() {
entry:
    p = stack_alloc(8)
    q = p + -9223372036854775808
    r = p - 9223372036854775807
    s = q - r
    return s
}
";
    assert!(compile_program(&functions(source), &opts(OutputFormat::OptimizedSsa)).is_ok());
    assert!(assemble(&functions(source), &opts(OutputFormat::Asm)).is_ok());
}
