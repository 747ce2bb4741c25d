//! # Intcode CLI
//!
//! Command-line front end for the Intcode VM.
//!
//! Usage:
//!   intcode run <FILE> [-i N]... [--poke ADDR=VALUE]... [--json]
//!   intcode disasm <FILE>
//!   intcode pipeline <FILE> --seeds a,b,c [--initial N] [--chain] [--json]
//!
//! Examples:
//!   intcode run day9.txt -i 1
//!   intcode run day2.txt --poke 1=12 --poke 2=2
//!   intcode pipeline day7.txt --seeds 9,8,7,6,5
//!   RUST_LOG=intcode_vm=trace intcode run program.txt

use clap::{Parser, Subcommand};
use intcode_error::{Error, Result};
use intcode_vm::{
    disassemble, loader, DisasmLine, HaltReason, Machine, Memory, MemoryConfig, Pipeline,
    PipelineReport, Topology,
};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "intcode")]
#[command(author, version, about = "Run, inspect and chain Intcode programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins if set
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Addresses below this bound are stored contiguously
    #[arg(long, global = true, default_value_t = intcode_vm::memory::DEFAULT_DENSE_LIMIT)]
    dense_limit: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts or runs out of input
    Run {
        /// Path to the comma-separated program
        file: String,

        /// Input value (repeatable, consumed in order)
        #[arg(short, long = "input", allow_negative_numbers = true)]
        inputs: Vec<i64>,

        /// Overwrite memory before running, as ADDR=VALUE (repeatable)
        #[arg(long = "poke", value_parser = parse_poke)]
        pokes: Vec<(u64, i64)>,

        /// Print a JSON report instead of one output per line
        #[arg(long)]
        json: bool,
    },
    /// Print a disassembly listing
    Disasm {
        /// Path to the comma-separated program
        file: String,

        /// Address to start from
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
    /// Run one machine per seed value, wired output to input
    Pipeline {
        /// Path to the comma-separated program
        file: String,

        /// Per-machine configuration value, fed to each machine first
        #[arg(long, required = true, value_delimiter = ',', allow_negative_numbers = true)]
        seeds: Vec<i64>,

        /// Value fed to machine 0 after its seed
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        initial: i64,

        /// Wire a chain instead of a feedback ring
        #[arg(long)]
        chain: bool,

        /// Print a JSON report
        #[arg(long)]
        json: bool,
    },
}

/// Parse an `ADDR=VALUE` memory patch
fn parse_poke(s: &str) -> std::result::Result<(u64, i64), String> {
    let (address, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got '{}'", s))?;
    let address = address
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid address '{}': {}", address, e))?;
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid value '{}': {}", value, e))?;
    Ok((address, value))
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read and parse a program file
fn load_program(path: impl AsRef<Path>, config: MemoryConfig) -> Result<Memory> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::from(e)
            .with_operation("cli::load_program")
            .with_context("path", path.display().to_string())
    })?;
    loader::parse_with_config(&text, config)
        .map_err(|e| e.with_context("path", path.display().to_string()))
}

#[derive(Debug, Serialize)]
struct RunReport {
    halt: HaltReason,
    output: Vec<i64>,
    pc: i64,
    steps: u64,
}

#[derive(Debug, Serialize)]
struct PipelineSummary {
    topology: Topology,
    last_output: Option<i64>,
    #[serde(flatten)]
    report: PipelineReport,
}

/// Load, patch, feed and run a single machine
fn run_file(file: &str, inputs: &[i64], pokes: &[(u64, i64)], config: MemoryConfig) -> Result<RunReport> {
    let memory = load_program(file, config)?;
    let mut machine = Machine::from_memory(memory);
    for (address, value) in pokes {
        machine.memory_mut().set(*address, *value);
    }
    machine.extend_input(inputs.iter().copied());

    let halt = machine.execute()?;
    if halt == HaltReason::WaitingForInput {
        tracing::warn!(pc = machine.pc(), consumed = machine.input_cursor(), "program is waiting for more input");
    }

    Ok(RunReport {
        halt,
        output: machine.output(),
        pc: machine.pc(),
        steps: machine.steps(),
    })
}

fn disasm_file(file: &str, start: u64, config: MemoryConfig) -> Result<Vec<DisasmLine>> {
    let memory = load_program(file, config)?;
    Ok(disassemble(&memory, start))
}

fn pipeline_file(
    file: &str,
    seeds: &[i64],
    initial: i64,
    chain: bool,
    config: MemoryConfig,
) -> Result<PipelineSummary> {
    let memory = load_program(file, config)?;
    let topology = if chain { Topology::Chain } else { Topology::Ring };

    let mut pipeline = Pipeline::new(&memory, seeds.len(), topology)?;
    pipeline.seed_all(seeds)?;
    pipeline.seed(0, initial)?;
    let report = pipeline.run_to_halt()?;

    Ok(PipelineSummary {
        topology,
        last_output: pipeline.last_output(),
        report,
    })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| {
        Error::new(intcode_error::ErrorKind::SerializationFailed, e.to_string())
            .with_operation("cli::print_json")
            .set_source(e)
    })?;
    println!("{}", text);
    Ok(())
}

fn dispatch(command: &Commands, config: MemoryConfig) -> Result<()> {
    match command {
        Commands::Run { file, inputs, pokes, json } => {
            let report = run_file(file, inputs, pokes, config)?;
            if *json {
                return print_json(&report);
            }
            for value in &report.output {
                println!("{}", value);
            }
        }
        Commands::Disasm { file, start } => {
            for line in disasm_file(file, *start, config)? {
                println!("{}", line);
            }
        }
        Commands::Pipeline { file, seeds, initial, chain, json } => {
            let summary = pipeline_file(file, seeds, *initial, *chain, config)?;
            if *json {
                return print_json(&summary);
            }
            match summary.last_output {
                Some(value) => println!("{}", value),
                None => println!("(no output)"),
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match MemoryConfig::with_dense_limit(cli.dense_limit) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = dispatch(&cli.command, config) {
        eprintln!("Error: {}", e);
        if e.kind().is_malformed_program() {
            tracing::debug!("{:?}", e);
        }
        std::process::exit(1);
    }
}
