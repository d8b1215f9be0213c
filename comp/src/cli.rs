use crate::util::PathOrStd;

use comp_lib::compile::{self, CompileOpts, CompileOptsBuilder, CompileOptsErr};

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use codespan_reporting::files::SimpleFile;

use std::{fs::File, io::Read};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// NASM assembly for x86-64 System V
    Asm,
    /// The functions right after SSA construction
    Ssa,
    /// The functions after the optimizer ran
    OptimizedSsa,
    /// The live range of every variable per block
    LiveRanges,
    /// The conflict graph handed to the register allocator
    ConflictGraph,
    /// The points-to sets of every variable
    PointsTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkippablePasses {
    Optimize,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The input file, use `-` for std in.
    #[arg(default_value = "-")]
    input_path: PathOrStd,

    /// The output format. Defaults to asm.
    #[arg(short = 'e', long, value_name = "FORMAT", value_enum)]
    emit: Option<OutputFormat>,

    /// Zero or more passes to skip
    #[arg(long = "skip", value_name = "PASS", value_enum)]
    skips: Vec<SkippablePasses>,

    /// The number of registers the allocator may use, at most 8.
    #[arg(short = 'k', long)]
    registers: Option<usize>,

    /// Compute points-to sets on the optimized functions instead of right after SSA construction.
    #[arg(long)]
    points_to_on_optimized: bool,

    /// The output file, use `-` for std out.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output_path: PathOrStd,
}

pub fn open_input_source(args: &Args) -> anyhow::Result<SimpleFile<String, String>> {
    match &args.input_path {
        PathOrStd::Path(path) => {
            if !path.exists() {
                bail!("Input file `{}` doesn't exist", path.display());
            }
            let mut handle = File::open(path)
                .with_context(|| format!("Failed to open input file `{}`", path.display()))?;
            let mut s = String::new();
            handle
                .read_to_string(&mut s)
                .with_context(|| format!("Failed to read from input file `{}`", path.display()))?;

            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            Ok(SimpleFile::new(name, s))
        }
        PathOrStd::StdStream => {
            let mut handle = std::io::stdin().lock();
            let mut s = String::new();
            handle
                .read_to_string(&mut s)
                .context("Failed to read from stdin")?;

            Ok(SimpleFile::new("stdin stream".to_owned(), s))
        }
    }
}

pub fn extract_compile_opts(args: &Args) -> Result<CompileOpts, CompileOptsErr> {
    let opts = CompileOptsBuilder::new();

    let opts = if let Some(format) = args.emit {
        let format = match format {
            OutputFormat::Asm => compile::OutputFormat::Asm,
            OutputFormat::Ssa => compile::OutputFormat::Ssa,
            OutputFormat::OptimizedSsa => compile::OutputFormat::OptimizedSsa,
            OutputFormat::LiveRanges => compile::OutputFormat::LiveRanges,
            OutputFormat::ConflictGraph => compile::OutputFormat::ConflictGraph,
            OutputFormat::PointsTo => compile::OutputFormat::PointsTo,
        };
        opts.output_format(format)
    } else {
        opts
    };

    let opts = if let Some(registers) = args.registers {
        opts.registers(registers)
    } else {
        opts
    };

    opts.optimize(!args.skips.contains(&SkippablePasses::Optimize))
        .points_to_on_optimized(args.points_to_on_optimized)
        .build()
}

pub fn open_output(args: &Args) -> anyhow::Result<Box<dyn std::io::Write>> {
    match &args.output_path {
        PathOrStd::Path(path) => std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)
            .map(|f| Box::new(f) as Box<dyn std::io::Write>)
            .with_context(|| format!("Failed to open output file `{}`", path.display())),
        PathOrStd::StdStream => Ok(Box::new(std::io::stdout().lock())),
    }
}
