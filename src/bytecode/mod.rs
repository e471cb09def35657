/*!

  The VM's instructions are a byte stream with no header, footer, alignment, or delimiters.
  An instruction starts with one opcode byte, whose low 7 bits are the opcode tag, followed by
  its operand fields. All fields are unsigned, fixed-width, and little-endian. Addresses are
  32 bits wide and index memory cells, not bytes.

    Opcode      Tag   Layout                      Size
    LOAD_CONST   94   [A:8][B:32][C:16]            7
    WRITE_MEM    88   [A:8][B:32][C:32]            9
    READ_MEM      9   [A:8][B:32][C:32][D:16]     11
    UNARY_SQRT   34   [A:8][B:32][C:32][D:16]     11

  The tag alone determines how many bytes follow, so a decoder looks at one byte, then knows
  exactly how much more to consume.

  One design decision that needed to be made is whether to store the arguments of the
  instruction as data members of enum variants, with one variant per opcode, or to keep a
  uniform "opcode plus four words" record. Programs here are short and are decoded once, so the
  per-opcode variants win: they give each operand a meaningful name in the interpreter, and the
  declarative layouts in `binary` connect those names back to the positions in the encoding.

*/

mod assembly;
mod binary;
mod instruction;

pub use assembly::{
  assemble, parse_assembly, Assembled, AssemblyError, AuditRecord, ParseErrorKind,
  ParsedInstruction
};
pub use binary::{
  decode_instruction, decode_program, encode_instruction, encode_program, instruction_size,
  layout, DecodeError, Field, Word, OPCODE_MASK
};
pub use instruction::{Instruction, Operand, Operation};
