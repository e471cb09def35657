//! Structures and functions for the flat-memory virtual machine: a fetch-decode-execute loop
//! over a byte stream of instructions, run once from start to end against a fixed-size memory.

use std::fmt::{Display, Formatter};

use log::{debug, trace};
use prettytable::Table;
use thiserror::Error;

use crate::address::Address;
use crate::bytecode::{decode_instruction, DecodeError, Instruction};
use crate::memory::{Cell, Memory, MemoryFault, DEFAULT_MEMORY_CAPACITY};
use crate::report::TABLE_DISPLAY_FORMAT;

/// Settings fixed at construction time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VmConfig {
  /// Number of memory cells.
  pub memory_capacity: usize
}

impl Default for VmConfig {
  fn default() -> VmConfig {
    VmConfig { memory_capacity: DEFAULT_MEMORY_CAPACITY }
  }
}

/**
  The life cycle of a machine:

    Ready -> Running -> Halted
                     -> Faulted

  `Running` lasts while instructions remain in the buffer. `Halted` and `Faulted` are both
  terminal, and only `Halted` produces a result.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum State {
  Ready,
  Running,
  Halted,
  Faulted
}

impl Display for State {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      State::Ready   => write!(f, "Ready"),
      State::Running => write!(f, "Running"),
      State::Halted  => write!(f, "Halted"),
      State::Faulted => write!(f, "Faulted"),
    }
  }
}

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum Fault {
  #[error(transparent)]
  Decode(#[from] DecodeError),
  #[error(transparent)]
  Memory(#[from] MemoryFault),
  #[error("the machine is {0}; only a Ready machine can run a program")]
  NotReady(State),
}

pub struct VM {
  memory : Memory,
  state  : State,

  // Registers //
  cursor       : usize,         // Byte offset of the next instruction, a cursor
  executed     : usize,         // Number of instructions completed
  last_written : Option<usize>, // Most recently written cell
}

/// Integer square root, rounded down. Exact, as every `Cell` is representable in an `f64`.
fn isqrt(value: Cell) -> Cell {
  (value as f64).sqrt() as Cell
}

impl VM {

  pub fn new(config: &VmConfig) -> VM {
    VM {
      memory       : Memory::new(config.memory_capacity),
      state        : State::Ready,
      cursor       : 0,
      executed     : 0,
      last_written : None,
    }
  }

  // region Accessors

  pub fn state(&self) -> State {
    self.state
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn cursor(&self) -> usize {
    self.cursor
  }

  pub fn executed(&self) -> usize {
    self.executed
  }

  // endregion

  // region Display methods

  fn make_memory_table(memory: &Memory, highlight: Option<usize>) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, cell) in memory.non_zero() {
      match Some(i) == highlight {

        true  => {
          table.add_row(row![r->format!("* --> M[{}] =", i), cell]);
        }

        false => {
          table.add_row(row![r->format!("M[{}] =", i), cell]);
        }

      } // end match on highlight
    } // end for
    table
  }

  // endregion

  fn transition(&mut self, state: State) {
    trace!("{} -> {}", self.state, state);
    self.state = state;
  }

  /**
    Executes `program` from its first byte to its last, then returns a copy of the cells
    `low..high`. The machine must be `Ready`; afterwards it is `Halted` or, if any instruction
    or the final range faulted, `Faulted`.
  */
  pub fn run(&mut self, program: &[u8], low: usize, high: usize) -> Result<Vec<Cell>, Fault> {
    if self.state != State::Ready {
      return Err(Fault::NotReady(self.state));
    }

    self.transition(State::Running);
    match self.run_to_end(program, low, high) {

      Ok(result) => {
        self.transition(State::Halted);
        Ok(result)
      }

      Err(fault) => {
        debug!("fault at byte {} after {} instructions: {}", self.cursor, self.executed, fault);
        self.transition(State::Faulted);
        Err(fault)
      }

    }
  }

  fn run_to_end(&mut self, program: &[u8], low: usize, high: usize) -> Result<Vec<Cell>, Fault> {
    while self.cursor < program.len() {
      self.step(program)?;
    }
    Ok(self.memory.slice(low, high)?.to_vec())
  }

  /// Decodes the instruction at the cursor, moves the cursor past it, and executes it.
  fn step(&mut self, program: &[u8]) -> Result<Instruction, Fault> {
    let (instruction, size) = decode_instruction(program, self.cursor)?;
    self.cursor += size;

    self.execute(&instruction)?;
    self.executed += 1;

    #[cfg(feature = "trace_computation")]
    {
      if log::log_enabled!(log::Level::Trace) {
        trace!("{}", self);
      }
    }

    Ok(instruction)
  }

  /**
    Applies one instruction to memory. Every instruction writes exactly one cell, and does so
    only after all of its reads and address checks have succeeded, so a faulting instruction
    leaves memory untouched.
  */
  fn execute(&mut self, instruction: &Instruction) -> Result<(), Fault> {
    let (target, value) =
      match *instruction {

        Instruction::LoadConst { address, value } => {
          let target = Address::from(address);
          self.memory.resolve(target)?;
          debug!("LOAD_CONST: {} <- {}", target, value);
          (target, value as Cell)
        }

        Instruction::WriteMem { target, source } => {
          let target = Address::from(target);
          let source = Address::from(source);
          let value  = self.memory.load(source)?;
          self.memory.resolve(target)?;
          debug!("WRITE_MEM: {} <- {} = {}", target, source, value);
          (target, value)
        }

        Instruction::ReadMem { target, pointer, offset } => {
          let target  = Address::from(target);
          let pointer = Address::from(pointer);
          let source  = Address::from(self.memory.load(pointer)?) + offset;
          let value   = self.memory.load(source)?;
          self.memory.resolve(target)?;
          debug!("READ_MEM: {} <- {} = {} (through {})", target, source, value, pointer);
          (target, value)
        }

        // The destination is `C + D`, not `B`, and `C` is used directly rather than read
        // through as `READ_MEM` does with the same fields.
        Instruction::UnarySqrt { source, base, offset } => {
          let source = Address::from(source);
          let target = Address::from(base) + offset;
          let value  = isqrt(self.memory.load(source)?);
          self.memory.resolve(target)?;
          debug!("UNARY_SQRT: {} <- sqrt({}) = {}", target, source, value);
          (target, value)
        }

      };

    self.memory.store(target, value)?;
    self.last_written = target.to_index(self.memory.capacity());
    Ok(())
  }
}

impl Display for VM {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let m_table = VM::make_memory_table(&self.memory, self.last_written);

    write!(
      f,
      "State: {}\tCursor: {}\tExecuted: {}\n{}",
      self.state, self.cursor, self.executed, m_table
    )
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{assemble, encode_program};

  fn run_text(text: &str, low: usize, high: usize) -> (VM, Result<Vec<Cell>, Fault>) {
    let binary = assemble(text).unwrap().binary;
    let mut vm = VM::new(&VmConfig::default());
    let result = vm.run(&binary, low, high);
    (vm, result)
  }

  #[test]
  fn scenario_a_direct_copy() {
    let (vm, result) = run_text("LOAD_CONST A=94 B=5 C=42\nWRITE_MEM A=88 B=6 C=5", 5, 7);
    assert_eq!(result, Ok(vec![42, 42]));
    assert_eq!(vm.state(), State::Halted);
    assert_eq!(vm.executed(), 2);
    assert_eq!(vm.cursor(), 16);
  }

  #[test]
  fn scenario_b_indirect_read() {
    let text = "LOAD_CONST A=94 B=0 C=16\n\
                LOAD_CONST A=94 B=1 C=0\n\
                READ_MEM A=9 B=2 C=1 D=0";
    let (_, result) = run_text(text, 0, 3);
    assert_eq!(result, Ok(vec![16, 0, 16]));
  }

  #[test]
  fn indirect_read_with_offset() {
    let text = "LOAD_CONST A=94 B=10 C=7\n\
                LOAD_CONST A=94 B=11 C=99\n\
                LOAD_CONST A=94 B=1 C=10\n\
                READ_MEM A=9 B=2 C=1 D=1";
    let (_, result) = run_text(text, 2, 3);
    assert_eq!(result, Ok(vec![99]));
  }

  #[test]
  fn scenario_c_square_root() {
    let (_, result) = run_text("LOAD_CONST A=94 B=3 C=16\nUNARY_SQRT A=34 B=3 C=4 D=0", 3, 5);
    assert_eq!(result, Ok(vec![16, 4]));
  }

  #[test]
  fn square_root_rounds_down_into_offset_destination() {
    let (vm, result) = run_text("LOAD_CONST A=94 B=0 C=65535\nUNARY_SQRT A=34 B=0 C=10 D=5", 15, 16);
    assert_eq!(result, Ok(vec![255]));
    assert_eq!(vm.memory().non_zero().collect::<Vec<_>>(), vec![(0, 65535), (15, 255)]);
  }

  #[test]
  fn isqrt_is_exact() {
    assert_eq!(isqrt(0), 0);
    assert_eq!(isqrt(15), 3);
    assert_eq!(isqrt(16), 4);
    assert_eq!(isqrt(Cell::max_value()), 65535);
    assert_eq!(isqrt(65535 * 65535), 65535);
    assert_eq!(isqrt(65535 * 65535 - 1), 65534);
  }

  #[test]
  fn scenario_d_truncated_stream() {
    let binary = assemble("LOAD_CONST A=94 B=5 C=42\nWRITE_MEM A=88 B=6 C=5").unwrap().binary;
    let mut vm = VM::new(&VmConfig::default());
    let result = vm.run(&binary[..12], 0, 10);
    assert_eq!(
      result,
      Err(Fault::Decode(DecodeError::TruncatedStream { offset: 7, needed: 9, available: 5 }))
    );
    assert_eq!(vm.state(), State::Faulted);
    // The complete first instruction still ran.
    assert_eq!(vm.memory().load(Address::from(5)), Ok(42));
  }

  #[test]
  fn unknown_opcode_faults() {
    let mut vm = VM::new(&VmConfig::default());
    let result = vm.run(&[1, 2, 3], 0, 1);
    assert_eq!(result, Err(Fault::Decode(DecodeError::UnknownOpcode { tag: 1, offset: 0 })));
    assert_eq!(vm.state(), State::Faulted);
  }

  #[test]
  fn empty_program_halts_immediately() {
    let mut vm = VM::new(&VmConfig::default());
    assert_eq!(vm.run(&[], 0, 4), Ok(vec![0, 0, 0, 0]));
    assert_eq!(vm.state(), State::Halted);
    assert_eq!(vm.executed(), 0);
  }

  #[test]
  fn out_of_bounds_write_faults_without_effect() {
    let (vm, result) = run_text("LOAD_CONST A=94 B=0 C=3\nLOAD_CONST A=94 B=1024 C=5", 0, 1);
    assert_eq!(
      result,
      Err(Fault::Memory(MemoryFault::OutOfBounds { address: Address::from(1024), capacity: 1024 }))
    );
    assert_eq!(vm.state(), State::Faulted);
    assert_eq!(vm.executed(), 1);
    assert_eq!(vm.memory().non_zero().collect::<Vec<_>>(), vec![(0, 3)]);
  }

  #[test]
  fn every_resolved_address_is_checked() {
    let faulting = [
      // WRITE_MEM source and target
      "WRITE_MEM A=88 B=0 C=5000",
      "WRITE_MEM A=88 B=5000 C=0",
      // READ_MEM pointer, pointed-to cell plus offset, and target
      "READ_MEM A=9 B=0 C=4096 D=0",
      "LOAD_CONST A=94 B=1 C=1000\nREAD_MEM A=9 B=0 C=1 D=24",
      "READ_MEM A=9 B=1024 C=0 D=0",
      // UNARY_SQRT source and base plus offset
      "UNARY_SQRT A=34 B=1024 C=0 D=0",
      "UNARY_SQRT A=34 B=0 C=1000 D=24",
      "UNARY_SQRT A=34 B=0 C=4294967295 D=65535",
    ];
    for text in &faulting {
      let (vm, result) = run_text(&format!("LOAD_CONST A=94 B=0 C=9\n{}", text), 0, 1);
      match result {
        Err(Fault::Memory(MemoryFault::OutOfBounds { .. })) => {}
        other => panic!("{}: expected a memory fault, got {:?}", text, other)
      }
      assert_eq!(vm.state(), State::Faulted);
      assert_eq!(vm.memory().load(Address::from(0)), Ok(9), "{}", text);
      assert_eq!(vm.memory().load(Address::from(1023)), Ok(0), "{}", text);
    }
  }

  #[test]
  fn result_range_is_checked() {
    let (vm, result) = run_text("LOAD_CONST A=94 B=0 C=1", 1000, 1025);
    assert_eq!(
      result,
      Err(Fault::Memory(MemoryFault::RangeOutOfBounds { low: 1000, high: 1025, capacity: 1024 }))
    );
    assert_eq!(vm.state(), State::Faulted);

    let (_, result) = run_text("LOAD_CONST A=94 B=0 C=1", 1, 0);
    assert!(result.is_err());
  }

  #[test]
  fn capacity_is_configurable() {
    let binary = encode_program(&[Instruction::LoadConst { address: 20, value: 1 }]);

    let mut small = VM::new(&VmConfig { memory_capacity: 16 });
    assert!(small.run(&binary, 0, 1).is_err());

    let mut large = VM::new(&VmConfig { memory_capacity: 32 });
    assert_eq!(large.run(&binary, 20, 21), Ok(vec![1]));
    assert_eq!(large.memory().capacity(), 32);
  }

  #[test]
  fn runs_are_deterministic() {
    let binary = assemble(
      "LOAD_CONST A=94 B=0 C=81\n\
       UNARY_SQRT A=34 B=0 C=1 D=0\n\
       READ_MEM A=9 B=2 C=1 D=0\n\
       WRITE_MEM A=88 B=3 C=2"
    ).unwrap().binary;

    let mut first  = VM::new(&VmConfig::default());
    let mut second = VM::new(&VmConfig::default());
    let a = first.run(&binary, 0, 1024).unwrap();
    let b = second.run(&binary, 0, 1024).unwrap();
    assert_eq!(a, b);
    assert_eq!(first.memory(), second.memory());
    assert_eq!(&a[..4], &[81, 9, 0, 0]);
  }

  #[test]
  fn a_machine_runs_once() {
    let mut vm = VM::new(&VmConfig::default());
    vm.run(&[], 0, 0).unwrap();
    assert_eq!(vm.run(&[], 0, 0), Err(Fault::NotReady(State::Halted)));
  }

  #[test]
  fn display_highlights_last_write() {
    let (vm, _) = run_text("LOAD_CONST A=94 B=2 C=7\nLOAD_CONST A=94 B=4 C=8", 0, 0);
    let text = vm.to_string();
    assert!(text.starts_with("State: Halted"));
    assert!(text.contains("* --> M[4] ="));
    assert!(!text.contains("* --> M[2] ="));
  }
}
