//! Command line driver.
//!
//! Loads a source file, parses and optimizes it, then runs it natively or
//! through the interpreter. Any fatal condition prints `error: ...` to
//! stderr and exits with status 1.

use bfjit::codegen::{CodegenOptions, TargetArch};
use bfjit::core::{EngineOptions, FatalError, FatalResult, InstructionCounters, DEFAULT_TAPE_CAPACITY};
use bfjit::engine::{self, JitEngine};
use bfjit::interpreter::Interpreter;
use bfjit::ir::{optimize, parse, render};
use bfjit::object_file::write_object;
use bfjit::source::load_source;
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "bfjit", about = "Compile and run tape-language programs")]
struct Cli {
    /// Program source file
    source: PathBuf,

    /// Run with the reference interpreter instead of native code
    #[arg(short = 'i', long)]
    interpret: bool,

    /// Disable the peephole optimizer
    #[arg(short = 'd', long = "no-optimize")]
    no_optimize: bool,

    /// Print the IR and exit
    #[arg(short = 'p', long)]
    print: bool,

    /// Count executed instructions and print the totals to stderr
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Tape size in cells
    #[arg(long, value_name = "CELLS", default_value_t = DEFAULT_TAPE_CAPACITY)]
    tape_size: usize,

    /// Write the generated code as an ELF object to PATH and exit
    #[arg(long, value_name = "PATH")]
    emit_object: Option<PathBuf>,

    /// Architecture for --emit-object (defaults to the host)
    #[arg(long, value_enum, requires = "emit_object")]
    target: Option<Target>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Target {
    X64,
    Arm64,
}

impl From<Target> for TargetArch {
    fn from(target: Target) -> Self {
        match target {
            Target::X64 => TargetArch::X64,
            Target::Arm64 => TargetArch::Arm64,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run(&cli) {
        let _ = io::stdout().flush();
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> FatalResult<()> {
    let source = load_source(&cli.source)?;
    let parsed = parse(&source)?;
    let program = if cli.no_optimize {
        parsed
    } else {
        optimize(&parsed)?
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    if cli.print {
        out.write_all(render(&program).as_bytes())?;
        out.flush()?;
        return Ok(());
    }

    let options = EngineOptions::default()
        .with_tape_capacity(cli.tape_size)
        .with_debug_counters(cli.verbose);

    if let Some(path) = &cli.emit_object {
        let arch = cli
            .target
            .map(TargetArch::from)
            .or_else(TargetArch::host)
            .ok_or(FatalError::UnsupportedHost)?;
        let generated = arch.generate(&program, &CodegenOptions::new(&options, engine::host_calls()))?;
        let bytes = write_object(&generated, arch)?;
        fs::write(path, bytes)
            .map_err(|err| FatalError::ObjectFile(format!("{}: {}", path.display(), err)))?;
        log::info!("wrote {}", path.display());
        return Ok(());
    }

    let counters = if cli.interpret {
        let mut interpreter = Interpreter::new(&program, options)?;
        interpreter.run_to_end(&mut out)?;
        interpreter.counters().copied()
    } else {
        let mut engine = JitEngine::new(&program, options)?;
        engine.run_to_end(&mut out)?;
        engine.counters().copied()
    };
    report(counters);
    Ok(())
}

fn report(counters: Option<InstructionCounters>) {
    if let Some(counters) = counters {
        eprint!("{}", counters);
    }
}
