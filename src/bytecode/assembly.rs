/*!
  The human readable textual form of bytecode is called assembly. This module parses assembly
  into `Instruction`s, using the `strum` derives of `Operation` and `Operand` to recognize names
  and `nom` to split lines and operands.

  A line is a mnemonic followed by `key=value` operands separated by whitespace, in any order:

    LOAD_CONST A=94 B=5 C=42
    WRITE_MEM  C=5 B=6 A=88
*/

use std::str::FromStr;

use nom::{
  bytes::complete::is_not,
  character::complete::{
    char as one_char,
    digit1,
    one_of,
    space0,
    space1
  },
  combinator::{all_consuming, map_res, opt, recognize, rest},
  multi::separated_list,
  sequence::{delimited, pair, separated_pair},
  IResult
};
use thiserror::Error;

use super::binary::{encode_instruction, layout, Field, Word};
use super::{Instruction, Operand, Operation};

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum AssemblyError {
  #[error("parse error on line {line}: {kind}")]
  ParseError {
    line : usize,
    kind : ParseErrorKind
  },
  #[error("unknown opcode on line {line}: {mnemonic} is not an operation")]
  UnknownOpcode {
    line     : usize,
    mnemonic : String
  },
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseErrorKind {
  #[error("the line has no tokens")]
  EmptyLine,
  #[error("operand `{0}` is not of the form key=value")]
  MissingEquals(String),
  #[error("operand {operand} has a value that is not an integer: `{text}`")]
  InvalidInteger {
    operand : String,
    text    : String
  },
  #[error("`{0}` is not an operand name")]
  UnknownOperand(String),
  #[error("{operation} does not take operand {operand}")]
  UnexpectedOperand {
    operation : Operation,
    operand   : Operand
  },
  #[error("operand {0} is given more than once")]
  DuplicateOperand(Operand),
  #[error("{operation} requires operand {operand}")]
  MissingOperand {
    operation : Operation,
    operand   : Operand
  },
  #[error("operand {operand}={value} does not fit in {bits} bits")]
  OutOfRange {
    operand : Operand,
    value   : i64,
    bits    : u32
  },
  #[error("operand A={value} does not match the {operation} opcode {code}")]
  OpcodeMismatch {
    operation : Operation,
    value     : i64,
    code      : u8
  },
}

/// One assembled line: the instruction and the operands exactly as they were written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedInstruction {
  pub line        : usize,
  pub instruction : Instruction,
  pub operands    : Vec<(Operand, i64)>,
}

/// The audit trail entry for one instruction: its index in the program and its operands in
/// source order with their values as written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AuditRecord {
  pub index    : usize,
  pub operands : Vec<(Operand, i64)>,
}

/// The output of the assembler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assembled {
  pub program : Vec<Instruction>,
  pub binary  : Vec<u8>,
  pub audit   : Vec<AuditRecord>,
}

// region Parsers

fn tokens_p(line: &str) -> IResult<&str, Vec<&str>> {
  all_consuming(
    delimited(space0, separated_list(space1, is_not(" \t")), space0)
  )(line)
}

fn operand_p(token: &str) -> IResult<&str, (&str, &str)> {
  all_consuming(separated_pair(is_not("="), one_char('='), rest))(token)
}

fn integer_p(text: &str) -> IResult<&str, i64> {
  all_consuming(
    map_res(recognize(pair(opt(one_of("+-")), digit1)), i64::from_str)
  )(text)
}

// endregion

/// Whether `value` fits `field` as either a signed or an unsigned number.
fn fits(field: &Field, value: i64) -> bool {
  let low  = -(1i64 << (field.bits - 1));
  let high = 1i64 << field.bits;
  low <= value && value < high
}

/// Two's complement truncation of `value` to the width of `field`.
fn truncate(field: &Field, value: i64) -> Word {
  (value as Word) & field.mask()
}

fn parse_line(line: usize, text: &str) -> Result<ParsedInstruction, AssemblyError> {
  let error = |kind: ParseErrorKind| AssemblyError::ParseError { line, kind };

  let tokens = match tokens_p(text) {
    Ok((_, tokens)) => tokens,
    Err(_e)         => vec![]
  };

  let (mnemonic, operand_tokens) = match tokens.split_first() {
    Some(split) => split,
    None        => return Err(error(ParseErrorKind::EmptyLine))
  };

  let operation = Operation::from_str(mnemonic).map_err(|_| {
    AssemblyError::UnknownOpcode { line, mnemonic: mnemonic.to_string() }
  })?;
  let fields = layout(operation);

  let mut operands: Vec<(Operand, i64)> = Vec::with_capacity(operand_tokens.len());
  let mut words   : Vec<(Operand, Word)> = Vec::with_capacity(operand_tokens.len());

  for token in operand_tokens {
    let (key, value_text) = match operand_p(token) {
      Ok((_, pair)) => pair,
      Err(_e)       => return Err(error(ParseErrorKind::MissingEquals(token.to_string())))
    };

    let value = match integer_p(value_text) {
      Ok((_, value)) => value,
      Err(_e)        => {
        return Err(error(ParseErrorKind::InvalidInteger {
          operand : key.to_string(),
          text    : value_text.to_string()
        }));
      }
    };

    let operand = Operand::from_str(key)
      .map_err(|_| error(ParseErrorKind::UnknownOperand(key.to_string())))?;

    let field = fields
      .iter()
      .find(|field| field.operand == operand)
      .ok_or_else(|| error(ParseErrorKind::UnexpectedOperand { operation, operand }))?;

    if operands.iter().any(|(seen, _)| *seen == operand) {
      return Err(error(ParseErrorKind::DuplicateOperand(operand)));
    }

    if !fits(field, value) {
      return Err(error(ParseErrorKind::OutOfRange { operand, value, bits: field.bits }));
    }

    operands.push((operand, value));
    words.push((operand, truncate(field, value)));
  } // end for

  for field in fields {
    if !operands.iter().any(|(seen, _)| *seen == field.operand) {
      return Err(error(ParseErrorKind::MissingOperand { operation, operand: field.operand }));
    }
  }

  let word_of = |operand: Operand| -> Word {
    words
      .iter()
      .find(|(seen, _)| *seen == operand)
      .map_or(0, |(_, word)| *word)
  };

  if word_of(Operand::A) != operation.code() as Word {
    let value = operands
      .iter()
      .find(|(seen, _)| *seen == Operand::A)
      .map_or(0, |(_, value)| *value);
    return Err(error(ParseErrorKind::OpcodeMismatch { operation, value, code: operation.code() }));
  }

  Ok(ParsedInstruction {
    line,
    instruction: Instruction::from_operands(operation, word_of),
    operands
  })
}

/**
  Parses a whole program, one instruction per line. Blank lines before the first instruction and
  after the last are ignored; a blank line between instructions is an error, and so is a source
  with no instruction at all (reported on line 1). Line numbers in errors count from 1.
*/
pub fn parse_assembly(text: &str) -> Result<Vec<ParsedInstruction>, AssemblyError> {
  let lines: Vec<&str> = text.lines().collect();
  let is_blank = |line: &&str| line.trim().is_empty();

  let (first, last) =
    match (lines.iter().position(|l| !is_blank(l)), lines.iter().rposition(|l| !is_blank(l))) {
      (Some(first), Some(last)) => (first, last),
      _ => return Err(AssemblyError::ParseError { line: 1, kind: ParseErrorKind::EmptyLine })
    };

  lines[first..=last]
    .iter()
    .enumerate()
    .map(|(i, line)| parse_line(first + i + 1, line))
    .collect()
}

/// Parses and encodes `text`, producing the binary artifact and its audit trail.
pub fn assemble(text: &str) -> Result<Assembled, AssemblyError> {
  let parsed = parse_assembly(text)?;

  let mut program = Vec::with_capacity(parsed.len());
  let mut binary  = Vec::new();
  let mut audit   = Vec::with_capacity(parsed.len());

  for (index, ParsedInstruction { line, instruction, operands }) in parsed.into_iter().enumerate() {
    log::debug!("line {}: {}", line, instruction);
    binary.extend(encode_instruction(&instruction));
    program.push(instruction);
    audit.push(AuditRecord { index, operands });
  }

  log::info!("assembled {} instructions into {} bytes", program.len(), binary.len());

  Ok(Assembled { program, binary, audit })
}
