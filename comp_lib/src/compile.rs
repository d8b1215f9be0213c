#[cfg(test)]
mod test;

use crate::codegen::x86::{self, CallingConvention, SystemV};
use crate::{CompileError, CompileResult};
use rayon::prelude::*;
use ssa_ir::dfa::liveness::LiveRanges;
use ssa_ir::dfa::points_to::PointsTo;
use ssa_ir::regalloc::{self, ConflictGraph};
use ssa_ir::{optimizer, passes, Cfg, FunctionDescriptor, NameGenerator};
use x86_ir::{AsmOutputter, Root};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Asm,
    Ssa,
    OptimizedSsa,
    LiveRanges,
    ConflictGraph,
    PointsTo,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputFormat::Asm => "assembly",
            OutputFormat::Ssa => "ssa",
            OutputFormat::OptimizedSsa => "optimized ssa",
            OutputFormat::LiveRanges => "live ranges",
            OutputFormat::ConflictGraph => "conflict graph",
            OutputFormat::PointsTo => "points-to sets",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone)]
pub struct CompileOpts {
    output_format: OutputFormat,
    optimize: bool,
    registers: usize,
    points_to_on_optimized: bool,
}

impl CompileOpts {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptsBuilder {
    output_format: OutputFormat,
    optimize: bool,
    registers: usize,
    points_to_on_optimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOptsErr {
    InvalidRegisterCount(usize),
    OptimizedWithoutOptimizer(OutputFormat),
}

impl std::fmt::Display for CompileOptsErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileOptsErr::InvalidRegisterCount(k) => write!(
                f,
                "Can't allocate with {k} registers, between 1 and {} are available.",
                x86::COLORS.len()
            ),
            CompileOptsErr::OptimizedWithoutOptimizer(format) => {
                write!(f, "Can't output {format} with the optimizer disabled.")
            }
        }
    }
}

impl std::error::Error for CompileOptsErr {}

impl Default for CompileOptsBuilder {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Asm,
            optimize: true,
            registers: x86::COLORS.len(),
            points_to_on_optimized: false,
        }
    }
}

impl CompileOptsBuilder {
    /// Output assembly, optimized and using all registers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Limit the number of registers the allocator may use.
    pub fn registers(mut self, registers: usize) -> Self {
        self.registers = registers;
        self
    }

    /// Run the points-to analysis after the optimizer instead of right after SSA construction.
    pub fn points_to_on_optimized(mut self, points_to_on_optimized: bool) -> Self {
        self.points_to_on_optimized = points_to_on_optimized;
        self
    }

    pub fn build(self) -> Result<CompileOpts, CompileOptsErr> {
        if !(1..=x86::COLORS.len()).contains(&self.registers) {
            return Err(CompileOptsErr::InvalidRegisterCount(self.registers));
        }
        if !self.optimize && self.output_format == OutputFormat::OptimizedSsa {
            return Err(CompileOptsErr::OptimizedWithoutOptimizer(self.output_format));
        }
        Ok(CompileOpts {
            output_format: self.output_format,
            optimize: self.optimize,
            registers: self.registers,
            points_to_on_optimized: self.points_to_on_optimized,
        })
    }
}

/// What compiling a single function produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Asm(x86_ir::Function),
    /// A textual dump of one of the intermediate stages.
    Dump(String),
}

/// Runs `function` through the pipeline, up to the stage `opts` asks to output.
pub fn compile_function(
    function: &FunctionDescriptor,
    opts: &CompileOpts,
) -> CompileResult<Artifact> {
    log::debug!("compiling `{}`", function.name);
    let mut names = NameGenerator::new();
    let prelude = SystemV.pull_arguments(&function.params);
    let mut cfg = Cfg::build(prelude, function.body.clone(), &mut names)?;
    let frame_bytes = passes::layout_stack_frame(&mut cfg)?;
    passes::construct_ssa(&mut cfg);
    log::debug!("ssa form of `{}`:\n{cfg}", function.name);

    match opts.output_format {
        OutputFormat::Ssa => return Ok(Artifact::Dump(cfg.to_string())),
        OutputFormat::PointsTo if !opts.points_to_on_optimized => {
            return Ok(Artifact::Dump(PointsTo::analyze(&cfg).to_string()))
        }
        _ => {}
    }

    if opts.optimize {
        let rounds = optimizer::optimize(&mut cfg)?;
        log::debug!("optimized `{}` in {rounds} rounds", function.name);
    }

    let ranges = LiveRanges::build_from(&cfg);
    log::trace!("live ranges of `{}`:\n{}", function.name, ranges.render(&cfg));
    let graph = ConflictGraph::build_from(&ranges);
    log::trace!("conflict graph of `{}`:\n{graph}", function.name);

    match opts.output_format {
        OutputFormat::OptimizedSsa => return Ok(Artifact::Dump(cfg.to_string())),
        OutputFormat::PointsTo => return Ok(Artifact::Dump(PointsTo::analyze(&cfg).to_string())),
        OutputFormat::LiveRanges => return Ok(Artifact::Dump(ranges.render(&cfg))),
        OutputFormat::ConflictGraph => return Ok(Artifact::Dump(graph.to_string())),
        OutputFormat::Asm | OutputFormat::Ssa => {}
    }

    let preferences: Vec<_> = cfg
        .instructions()
        .flat_map(|instr| instr.coloring_preferences())
        .collect();
    let coloring = regalloc::color(&graph, &x86::COLORS[..opts.registers], &preferences)?;
    for (var, reg) in &coloring {
        log::trace!("{var} -> {reg}");
    }

    let lowered =
        x86::lower_function(&function.name, &cfg, frame_bytes, &ranges, &coloring, &mut names)?;
    Ok(Artifact::Asm(lowered))
}

/// Compiles all `functions` in parallel. The artifacts are in the same order as the functions.
pub fn compile_all(
    functions: &[FunctionDescriptor],
    opts: &CompileOpts,
) -> CompileResult<Vec<Artifact>> {
    functions
        .par_iter()
        .map(|function| {
            compile_function(function, opts).map_err(|err| err.in_function(&function.name))
        })
        .collect()
}

/// Compiles all `functions` to assembly, whatever output format `opts` asks for.
pub fn assemble(functions: &[FunctionDescriptor], opts: &CompileOpts) -> CompileResult<Root> {
    let opts = CompileOpts {
        output_format: OutputFormat::Asm,
        ..opts.clone()
    };
    compile_all(functions, &opts)?
        .into_iter()
        .map(|artifact| match artifact {
            Artifact::Asm(function) => Ok(function),
            Artifact::Dump(_) => unreachable!("ICE: dump while compiling to assembly"),
        })
        .collect()
}

/// Compiles all `functions` and renders the output `opts` asks for.
pub fn compile_program(
    functions: &[FunctionDescriptor],
    opts: &CompileOpts,
) -> CompileResult<String> {
    let mut out = String::new();
    if opts.output_format == OutputFormat::Asm {
        let root = assemble(functions, opts)?;
        AsmOutputter::new(&mut out)
            .write_root(&root)
            .map_err(|_| CompileError::unsupported("formatting the assembly failed"))?;
        return Ok(out);
    }

    for (function, artifact) in functions.iter().zip(compile_all(functions, opts)?) {
        let Artifact::Dump(dump) = artifact else {
            unreachable!("ICE: assembly for output format {}", opts.output_format);
        };
        out.push_str(&format!("function {}:\n{dump}\n", function.name));
    }
    Ok(out)
}
