/*!
  This module is responsible for the encoding and decoding of binary instructions.

  Each opcode has a layout: a list of fields giving the operand stored there, its byte offset
  within the instruction, its width in bytes, and how many of those bits are significant. Both
  `encode_instruction` and `decode_instruction` walk the same layout, so the two directions
  cannot disagree about where a field lives.

*/
use std::convert::TryFrom;

use thiserror::Error;

use super::{Instruction, Operand, Operation};

// If you change this you must also change the field widths in the layouts below.
pub type Word = u32;

/// Mask selecting the opcode tag out of an instruction's first byte.
pub const OPCODE_MASK: u8 = 0x7F;

/// A fixed-width little-endian operand field within an encoded instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
  pub operand : Operand,
  /// Byte offset from the start of the instruction.
  pub offset  : usize,
  /// Width in bytes.
  pub width   : usize,
  /// Significant bits. Equal to `8 * width` except for the opcode field.
  pub bits    : u32,
}

impl Field {
  const fn new(operand: Operand, offset: usize, width: usize) -> Field {
    Field { operand, offset, width, bits: 8 * width as u32 }
  }

  pub fn mask(&self) -> Word {
    match self.bits {
      bits if bits >= Word::BITS => Word::max_value(),
      bits => (1 << bits) - 1
    }
  }

  /// The byte range this field occupies within its instruction.
  pub fn span(&self) -> std::ops::Range<usize> {
    self.offset..self.offset + self.width
  }

  /// Writes `value`, truncated to the field, into `bytes`, which holds one whole instruction.
  fn write(&self, bytes: &mut [u8], value: Word) {
    let le = (value & self.mask()).to_le_bytes();
    bytes[self.span()].copy_from_slice(&le[..self.width]);
  }

  /// Reads the field out of `bytes`, which holds one whole instruction.
  fn read(&self, bytes: &[u8]) -> Word {
    let mut le = [0u8; 4];
    le[..self.width].copy_from_slice(&bytes[self.span()]);
    Word::from_le_bytes(le) & self.mask()
  }
}

// [OpCode:7 + 1 reserved bit]
const OPCODE_FIELD: Field = Field { operand: Operand::A, offset: 0, width: 1, bits: 7 };

// [A:8][B:32][C:16]
static LOAD_CONST_LAYOUT: [Field; 3] = [
  OPCODE_FIELD,
  Field::new(Operand::B, 1, 4),
  Field::new(Operand::C, 5, 2),
];

// [A:8][B:32][C:32]
static WRITE_MEM_LAYOUT: [Field; 3] = [
  OPCODE_FIELD,
  Field::new(Operand::B, 1, 4),
  Field::new(Operand::C, 5, 4),
];

// [A:8][B:32][C:32][D:16]
// Shared by `READ_MEM` and `UNARY_SQRT`.
static ADDRESS_ADDRESS_OFFSET_LAYOUT: [Field; 4] = [
  OPCODE_FIELD,
  Field::new(Operand::B, 1, 4),
  Field::new(Operand::C, 5, 4),
  Field::new(Operand::D, 9, 2),
];

/// The operand fields of the given opcode, in byte order.
pub fn layout(operation: Operation) -> &'static [Field] {
  match operation {
    Operation::LoadConst => &LOAD_CONST_LAYOUT,
    Operation::WriteMem  => &WRITE_MEM_LAYOUT,
    Operation::ReadMem
    | Operation::UnarySqrt => &ADDRESS_ADDRESS_OFFSET_LAYOUT,
  }
}

/// Returns the size in BYTES of an instruction for the corresponding opcode.
pub fn instruction_size(operation: Operation) -> usize {
  layout(operation)
    .iter()
    .map(|field| field.offset + field.width)
    .max()
    .unwrap_or(0)
}

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
  #[error("unknown opcode {tag} at byte {offset}")]
  UnknownOpcode {
    tag    : u8,
    offset : usize
  },
  #[error(
    "truncated stream: instruction at byte {offset} needs {needed} bytes but only {available} remain"
  )]
  TruncatedStream {
    offset    : usize,
    needed    : usize,
    available : usize
  },
}

/// Encodes the instruction into exactly `instruction_size(instruction.operation())` bytes.
pub fn encode_instruction(instruction: &Instruction) -> Vec<u8> {
  let operation = instruction.operation();
  let mut bytes = vec![0u8; instruction_size(operation)];

  for field in layout(operation) {
    if let Some(value) = instruction.operand(field.operand) {
      field.write(&mut bytes, value);
    }
  }

  bytes
}

/// Encodes a whole program, concatenating the instructions with no padding between them.
pub fn encode_program(program: &[Instruction]) -> Vec<u8> {
  program.iter().flat_map(encode_instruction).collect()
}

/**
  Decodes the instruction starting at `cursor`, returning it together with the number of bytes
  it occupies. Only the opcode byte and the bytes its layout declares are read.
*/
pub fn decode_instruction(bytes: &[u8], cursor: usize) -> Result<(Instruction, usize), DecodeError> {
  let available = bytes.len().saturating_sub(cursor);

  let first = match bytes.get(cursor) {
    Some(byte) => *byte,
    None => {
      return Err(DecodeError::TruncatedStream { offset: cursor, needed: 1, available });
    }
  };

  let tag = first & OPCODE_MASK;
  let operation = Operation::try_from(tag)
    .map_err(|_| DecodeError::UnknownOpcode { tag, offset: cursor })?;

  let size = instruction_size(operation);
  if available < size {
    return Err(DecodeError::TruncatedStream { offset: cursor, needed: size, available });
  }

  let window = &bytes[cursor..cursor + size];
  let fields = layout(operation);
  let instruction = Instruction::from_operands(operation, |operand| {
    fields
      .iter()
      .find(|field| field.operand == operand)
      .map_or(0, |field| field.read(window))
  });

  Ok((instruction, size))
}

/// Decodes an entire binary artifact front to back.
pub fn decode_program(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
  let mut program = Vec::new();
  let mut cursor  = 0;

  while cursor < bytes.len() {
    let (instruction, size) = decode_instruction(bytes, cursor)?;
    program.push(instruction);
    cursor += size;
  }

  Ok(program)
}
