mod cli;
mod report;
mod util;

use anyhow::{bail, Context, Result};
use clap::Parser;

use comp_lib::{compile, parse};
use std::io::Write;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Args::parse();

    let source = cli::open_input_source(&args)?;
    let compile_opts = cli::extract_compile_opts(&args)?;

    let parsed = parse::parse(source.source());
    if !parsed.is_ok() {
        report::eprint_aggregate(&parsed, &source)?;
    }
    let Some(functions) = parsed.into_value() else {
        bail!("couldn't compile due to the previous errors");
    };
    log::info!(
        "compiling {} functions to {}",
        functions.len(),
        compile_opts.output_format()
    );

    let output = compile::compile_program(&functions, &compile_opts)
        .with_context(|| format!("Failed to compile `{}`", source.name()))?;

    cli::open_output(&args)?
        .write_all(output.as_bytes())
        .with_context(|| "Failed to write to output".to_string())?;

    Ok(())
}
