//! The VM's flat memory store.

use thiserror::Error;

use crate::address::Address;
use crate::bytecode::Word;

/// The contents of one memory cell.
pub type Cell = Word;

pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum MemoryFault {
  #[error("memory fault: {address} is outside memory of {capacity} cells")]
  OutOfBounds {
    address  : Address,
    capacity : usize
  },
  #[error("memory fault: range {low}..{high} is outside memory of {capacity} cells")]
  RangeOutOfBounds {
    low      : usize,
    high     : usize,
    capacity : usize
  },
}

/// A fixed-size, zero-initialized array of cells. Addresses outside it fault; nothing wraps
/// and nothing grows.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Memory {
  cells: Vec<Cell>
}

impl Memory {

  pub fn new(capacity: usize) -> Memory {
    Memory {
      cells: vec![0; capacity]
    }
  }

  pub fn capacity(&self) -> usize {
    self.cells.len()
  }

  /// Checks that `address` is in bounds, returning its index.
  pub fn resolve(&self, address: Address) -> Result<usize, MemoryFault> {
    address
      .to_index(self.capacity())
      .ok_or(MemoryFault::OutOfBounds { address, capacity: self.capacity() })
  }

  pub fn load(&self, address: Address) -> Result<Cell, MemoryFault> {
    let idx = self.resolve(address)?;
    Ok(self.cells[idx])
  }

  pub fn store(&mut self, address: Address, value: Cell) -> Result<(), MemoryFault> {
    let idx = self.resolve(address)?;
    self.cells[idx] = value;
    Ok(())
  }

  /// The half open range `low..high` of cells.
  pub fn slice(&self, low: usize, high: usize) -> Result<&[Cell], MemoryFault> {
    if low > high || high > self.capacity() {
      return Err(MemoryFault::RangeOutOfBounds { low, high, capacity: self.capacity() });
    }
    Ok(&self.cells[low..high])
  }

  /// The addresses and values of every cell that is not zero, in address order.
  pub fn non_zero(&self) -> impl Iterator<Item = (usize, Cell)> + '_ {
    self.cells
      .iter()
      .enumerate()
      .filter(|(_, cell)| **cell != 0)
      .map(|(i, cell)| (i, *cell))
  }
}
