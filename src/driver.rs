//! The file-level operations behind the command line: each reads its inputs, runs the assembler
//! or the interpreter, and writes its outputs only once everything before has succeeded.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::bytecode::{self, Assembled, Instruction};
use crate::memory::Cell;
use crate::report;
use crate::vm::{VmConfig, VM};

/// Assembles `input`, writing the binary to `binary` and the XML audit log to `audit`.
pub fn assemble_file(input: &Path, binary: &Path, audit: &Path) -> Result<Assembled> {
  let text = fs::read_to_string(input)
    .with_context(|| format!("failed to read {}", input.display()))?;
  let assembled = bytecode::assemble(&text)
    .with_context(|| format!("failed to assemble {}", input.display()))?;

  fs::write(binary, &assembled.binary)
    .with_context(|| format!("failed to write {}", binary.display()))?;

  let mut out = BufWriter::new(
    File::create(audit).with_context(|| format!("failed to create {}", audit.display()))?
  );
  report::write_audit(&mut out, &assembled.audit)
    .and_then(|_| out.flush())
    .with_context(|| format!("failed to write {}", audit.display()))?;

  info!("wrote {} and {}", binary.display(), audit.display());
  Ok(assembled)
}

/// Runs the binary at `binary` and writes the cells `low..high` to `result` as XML. Nothing is
/// written if the run faults.
pub fn run_file(
  binary : &Path,
  result : &Path,
  low    : usize,
  high   : usize,
  config : &VmConfig
) -> Result<Vec<Cell>> {
  let program = fs::read(binary)
    .with_context(|| format!("failed to read {}", binary.display()))?;

  let mut machine = VM::new(config);
  let cells = machine
    .run(&program, low, high)
    .with_context(|| format!("failed to run {}", binary.display()))?;
  info!("halted after {} instructions, {} bytes", machine.executed(), machine.cursor());

  let mut out = BufWriter::new(
    File::create(result).with_context(|| format!("failed to create {}", result.display()))?
  );
  report::write_result(&mut out, low, &cells)
    .and_then(|_| out.flush())
    .with_context(|| format!("failed to write {}", result.display()))?;

  Ok(cells)
}

pub fn disassemble_file(binary: &Path) -> Result<Vec<Instruction>> {
  let bytes = fs::read(binary)
    .with_context(|| format!("failed to read {}", binary.display()))?;
  let program = bytecode::decode_program(&bytes)
    .with_context(|| format!("failed to decode {}", binary.display()))?;
  Ok(program)
}
