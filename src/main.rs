use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use flatvm::driver::{assemble_file, disassemble_file, run_file};
use flatvm::memory::DEFAULT_MEMORY_CAPACITY;
use flatvm::report;
use flatvm::vm::VmConfig;

/// Assembler and interpreter for a small flat-memory virtual machine.
#[derive(Parser, Debug)]
#[command(name = "flatvm", version)]
struct Cli {
  /// Log more: -v for progress, -vv for every instruction, -vvv for memory after each one
  #[arg(short, long, action = ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Assemble a source listing into a binary and an XML audit log
  Assemble {
    /// Assembly source, one instruction per line
    input: PathBuf,
    /// Where to write the binary
    binary: PathBuf,
    /// Where to write the XML audit log
    audit: PathBuf,
  },
  /// Execute a binary and write the memory range LOW..HIGH as XML
  Run {
    binary: PathBuf,
    /// Where to write the XML result
    result: PathBuf,
    /// First address of the result range
    low: usize,
    /// One past the last address of the result range
    high: usize,
    /// Number of memory cells
    #[arg(long, default_value_t = DEFAULT_MEMORY_CAPACITY)]
    memory_size: usize,
  },
  /// Print a binary as assembly
  Disassemble {
    binary: PathBuf,
  },
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };
  TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto).ok();
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  #[cfg(feature = "trace_computation")]
  log::info!("Computation tracing ENABLED");

  match cli.command {

    Command::Assemble { input, binary, audit } => {
      let assembled = assemble_file(&input, &binary, &audit)?;
      println!("{}", report::listing_table(&assembled.program));
    }

    Command::Run { binary, result, low, high, memory_size } => {
      let config = VmConfig { memory_capacity: memory_size };
      let cells  = run_file(&binary, &result, low, high, &config)?;
      println!("{}", report::result_table(low, &cells));
    }

    Command::Disassemble { binary } => {
      for instruction in disassemble_file(&binary)? {
        println!("{}", instruction);
      }
    }

  }
  Ok(())
}
