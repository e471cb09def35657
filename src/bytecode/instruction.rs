use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::bytecode::binary::layout;
use crate::bytecode::Word;

/**
  Opcodes of the virtual machine.

  This enum is the one and only table relating mnemonics to numeric opcode tags. The `strum`
  derives convert between the variant and its mnemonic, and the `num_enum` derives convert
  between the variant and its tag. Both the assembler and the decoder go through it.

  The tag is stored in the low 7 bits of an instruction's first byte.
*/
#[derive(
StrumDisplay, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,       Eq,       PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum Operation {
  #[strum(serialize = "LOAD_CONST")]
  LoadConst = 94,    // LOAD_CONST A B C   : M[B] <- C
  #[strum(serialize = "WRITE_MEM")]
  WriteMem  = 88,    // WRITE_MEM  A B C   : M[B] <- M[C]
  #[strum(serialize = "READ_MEM")]
  ReadMem   = 9,     // READ_MEM   A B C D : M[B] <- M[M[C] + D]
  #[strum(serialize = "UNARY_SQRT")]
  UnarySqrt = 34,    // UNARY_SQRT A B C D : M[C + D] <- isqrt(M[B])
}

impl Operation{
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }
}

/// Names of the operand fields as they are written in assembly.
#[derive(
StrumDisplay, EnumString, EnumIter,
Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Debug, Hash
)]
pub enum Operand {
  A,
  B,
  C,
  D
}

/**
  Holds the unencoded components of an instruction, one variant per opcode.

  `ReadMem` and `UnarySqrt` share the same operand shape and the same 11 byte encoding even
  though they do unrelated things: `ReadMem` reads through a pointer at `C`, while `UnarySqrt`
  uses `C + D` as a destination. Keep the two in step when touching either layout.
*/
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// `M[B] <- C`
  LoadConst {
    address : Word,
    value   : u16
  },
  /// `M[B] <- M[C]`
  WriteMem {
    target : Word,
    source : Word
  },
  /// `M[B] <- M[M[C] + D]`
  ReadMem {
    target  : Word,
    pointer : Word,
    offset  : u16
  },
  /// `M[C + D] <- isqrt(M[B])`
  UnarySqrt {
    source : Word,
    base   : Word,
    offset : u16
  },
}

impl Instruction {

  pub fn operation(&self) -> Operation {
    match self {
      Instruction::LoadConst { .. } => Operation::LoadConst,
      Instruction::WriteMem  { .. } => Operation::WriteMem,
      Instruction::ReadMem   { .. } => Operation::ReadMem,
      Instruction::UnarySqrt { .. } => Operation::UnarySqrt,
    }
  }

  /// The value of the named operand, or `None` if this instruction has no such operand.
  pub fn operand(&self, operand: Operand) -> Option<Word> {
    if operand == Operand::A {
      return Some(self.operation().code() as Word);
    }

    match (*self, operand) {

      (Instruction::LoadConst { address, .. }, Operand::B) => Some(address),
      (Instruction::LoadConst { value,   .. }, Operand::C) => Some(value as Word),

      (Instruction::WriteMem  { target, .. },  Operand::B) => Some(target),
      (Instruction::WriteMem  { source, .. },  Operand::C) => Some(source),

      (Instruction::ReadMem   { target,  .. }, Operand::B) => Some(target),
      (Instruction::ReadMem   { pointer, .. }, Operand::C) => Some(pointer),
      (Instruction::ReadMem   { offset,  .. }, Operand::D) => Some(offset as Word),

      (Instruction::UnarySqrt { source, .. },  Operand::B) => Some(source),
      (Instruction::UnarySqrt { base,   .. },  Operand::C) => Some(base),
      (Instruction::UnarySqrt { offset, .. },  Operand::D) => Some(offset as Word),

      _ => None

    }
  }

  /**
    Builds an instruction of the given operation, asking `value_of` for each operand it needs.
    Values wider than the operand's field are truncated. `A` is never requested, since it is
    implied by `operation`.
  */
  pub fn from_operands<F>(operation: Operation, mut value_of: F) -> Instruction
    where F: FnMut(Operand) -> Word
  {
    match operation {

      Operation::LoadConst => Instruction::LoadConst {
        address : value_of(Operand::B),
        value   : value_of(Operand::C) as u16,
      },

      Operation::WriteMem  => Instruction::WriteMem {
        target : value_of(Operand::B),
        source : value_of(Operand::C),
      },

      Operation::ReadMem   => Instruction::ReadMem {
        target  : value_of(Operand::B),
        pointer : value_of(Operand::C),
        offset  : value_of(Operand::D) as u16,
      },

      Operation::UnarySqrt => Instruction::UnarySqrt {
        source : value_of(Operand::B),
        base   : value_of(Operand::C),
        offset : value_of(Operand::D) as u16,
      },

    }
  }

  /// The operands in layout order, paired with their values.
  pub fn operands(&self) -> Vec<(Operand, Word)> {
    layout(self.operation())
      .iter()
      .filter_map(|field| self.operand(field.operand).map(|value| (field.operand, value)))
      .collect()
  }
}

/// Writes the instruction in assembly syntax, so that the output reassembles to the same bytes.
impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.operation())?;
    for (operand, value) in self.operands() {
      write!(f, " {}={}", operand, value)?;
    }
    Ok(())
  }
}


#[cfg(test)]
mod tests {
  use std::convert::TryFrom;
  use std::str::FromStr;

  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn mnemonic_and_tag_agree() {
    let table: Vec<(String, u8)> =
      Operation::iter().map(|op| (op.to_string(), op.code())).collect();
    assert_eq!(
      table,
      vec![
        ("LOAD_CONST".to_string(), 94),
        ("WRITE_MEM".to_string(),  88),
        ("READ_MEM".to_string(),   9),
        ("UNARY_SQRT".to_string(), 34)
      ]
    );

    for op in Operation::iter() {
      assert_eq!(Operation::from_str(&op.to_string()), Ok(op));
      assert_eq!(Operation::try_from(op.code()).ok(), Some(op));
    }
  }

  #[test]
  fn unknown_tag_and_mnemonic() {
    assert!(Operation::try_from(0u8).is_err());
    assert!(Operation::try_from(95u8).is_err());
    assert!(Operation::from_str("HALT").is_err());
    assert!(Operation::from_str("load_const").is_err());
  }

  #[test]
  fn operand_lookup() {
    let i = Instruction::ReadMem { target: 2, pointer: 1, offset: 7 };
    assert_eq!(i.operand(Operand::A), Some(9));
    assert_eq!(i.operand(Operand::B), Some(2));
    assert_eq!(i.operand(Operand::C), Some(1));
    assert_eq!(i.operand(Operand::D), Some(7));

    let j = Instruction::LoadConst { address: 5, value: 42 };
    assert_eq!(j.operand(Operand::D), None);
  }

  #[test]
  fn from_operands_truncates() {
    let i = Instruction::from_operands(Operation::LoadConst, |operand| match operand {
      Operand::B => 3,
      _          => 0x1_0010,
    });
    assert_eq!(i, Instruction::LoadConst { address: 3, value: 0x10 });
  }

  #[test]
  fn display_is_assembly() {
    let i = Instruction::UnarySqrt { source: 3, base: 4, offset: 0 };
    assert_eq!(i.to_string(), "UNARY_SQRT A=34 B=3 C=4 D=0");
    let j = Instruction::WriteMem { target: 6, source: 5 };
    assert_eq!(j.to_string(), "WRITE_MEM A=88 B=6 C=5");
  }
}
