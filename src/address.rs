//! A memory address as resolved by the interpreter, with some convenience functions.

use std::ops::Add;
use std::fmt::{Display, Formatter};

use crate::bytecode::Word;

// Wide enough to hold a 32 bit cell value plus a 16 bit offset without wrapping.
pub type AddressNumberType = u64;

/**
  An index into memory. Operands are 32 bits, but an address computed from an operand plus an
  offset (or from a cell's contents plus an offset) can exceed 32 bits, so addresses are kept in
  a wider type and only narrowed once they are known to be in bounds.
*/
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Address(AddressNumberType);

impl Address {
  /// Converts the address to an index into a memory of the given capacity, if it is in bounds.
  pub fn to_index(&self, capacity: usize) -> Option<usize> {
    match self.0 < capacity as AddressNumberType {
      true  => Some(self.0 as usize),
      false => None
    }
  }
}

impl From<Word> for Address {
  fn from(word: Word) -> Address {
    Address(word as AddressNumberType)
  }
}

impl Display for Address{
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "M[{}]", self.0)
  }
}

// Offset an address
impl Add<u16> for Address{
  type Output = Address;
  fn add(self, rhs: u16) -> Address{
    Address(self.0.saturating_add(rhs as AddressNumberType))
  }
}
