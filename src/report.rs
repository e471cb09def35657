/*!
  Output for people and for other tools: the assembler's audit trail and the interpreter's result
  range as XML documents, and listings as formatted tables.

  The XML documents have the shapes

    <log>
      <instruction id="0"><A>94</A><B>5</B><C>42</C></instruction>
    </log>

    <result>
      <memory address="5">42</memory>
    </result>

  Element names and values are operand names and integers, so nothing needs escaping.
*/

use std::io::{self, Write};

use prettytable::{format as TableFormat, Table};

use crate::bytecode::{encode_instruction, AuditRecord, Instruction};
use crate::memory::Cell;

lazy_static! {
  pub static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// Writes the audit trail: one `instruction` element per record, operands in source order.
pub fn write_audit<W: Write>(out: &mut W, audit: &[AuditRecord]) -> io::Result<()> {
  writeln!(out, "<log>")?;
  for record in audit {
    write!(out, "  <instruction id=\"{}\">", record.index)?;
    for (operand, value) in &record.operands {
      write!(out, "<{0}>{1}</{0}>", operand, value)?;
    }
    writeln!(out, "</instruction>")?;
  }
  writeln!(out, "</log>")
}

/// Writes the cells of a result range. `low` is the address of `cells[0]`.
pub fn write_result<W: Write>(out: &mut W, low: usize, cells: &[Cell]) -> io::Result<()> {
  writeln!(out, "<result>")?;
  for (i, value) in cells.iter().enumerate() {
    writeln!(out, "  <memory address=\"{}\">{}</memory>", low + i, value)?;
  }
  writeln!(out, "</result>")
}

/// A table of each instruction with its byte offset and encoding.
pub fn listing_table(program: &[Instruction]) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"#", ubr->"Offset", ubl->"Instruction", ubl->"Bytes"]);

  let mut offset = 0;
  for (i, instruction) in program.iter().enumerate() {
    let bytes = encode_instruction(instruction);
    table.add_row(row![r->i, r->offset, instruction, format!("{:?}", bytes)]);
    offset += bytes.len();
  }
  table
}

/// A table of the cells of a result range. `low` is the address of `cells[0]`.
pub fn result_table(low: usize, cells: &[Cell]) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Address", ubl->"Value"]);

  for (i, value) in cells.iter().enumerate() {
    table.add_row(row![r->format!("M[{}] =", low + i), value]);
  }
  table
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::assemble;

  fn to_string<F>(write: F) -> String
    where F: FnOnce(&mut Vec<u8>) -> io::Result<()>
  {
    let mut buffer = Vec::new();
    write(&mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
  }

  #[test]
  fn audit_xml() {
    let audit = assemble("LOAD_CONST C=-1 A=94 B=5\nWRITE_MEM A=88 B=6 C=5").unwrap().audit;
    let xml = to_string(|out| write_audit(out, &audit));
    assert_eq!(
      xml,
      "<log>\n\
       \x20 <instruction id=\"0\"><C>-1</C><A>94</A><B>5</B></instruction>\n\
       \x20 <instruction id=\"1\"><A>88</A><B>6</B><C>5</C></instruction>\n\
       </log>\n"
    );
  }

  #[test]
  fn empty_audit_xml() {
    assert_eq!(to_string(|out| write_audit(out, &[])), "<log>\n</log>\n");
  }

  #[test]
  fn result_xml_uses_absolute_addresses() {
    let xml = to_string(|out| write_result(out, 5, &[42, 42]));
    assert_eq!(
      xml,
      "<result>\n\
       \x20 <memory address=\"5\">42</memory>\n\
       \x20 <memory address=\"6\">42</memory>\n\
       </result>\n"
    );
  }

  #[test]
  fn listing_shows_offsets_and_bytes() {
    let program = assemble("LOAD_CONST A=94 B=5 C=42\nWRITE_MEM A=88 B=6 C=5").unwrap().program;
    let text = listing_table(&program).to_string();
    assert!(text.contains("LOAD_CONST A=94 B=5 C=42"));
    assert!(text.contains("[94, 5, 0, 0, 0, 42, 0]"));
    assert!(text.contains("[88, 6, 0, 0, 0, 5, 0, 0, 0]"));
  }

  #[test]
  fn result_table_rows() {
    let text = result_table(3, &[16, 4]).to_string();
    assert!(text.contains("M[3] ="));
    assert!(text.contains("M[4] ="));
  }
}
