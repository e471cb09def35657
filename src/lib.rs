/*!
  A toolchain for a small virtual machine with a flat, fixed-size integer memory.

  The assembler (`bytecode::assemble`) turns a line-oriented listing into a byte stream, and the
  interpreter (`vm::VM`) decodes that stream and executes it once, start to end. Both sides go
  through the same codec in `bytecode`, so they cannot disagree about what a byte means.

  ```
  use flatvm::bytecode::assemble;
  use flatvm::vm::{VmConfig, VM};

  let assembled = assemble("LOAD_CONST A=94 B=3 C=16\nUNARY_SQRT A=34 B=3 C=4 D=0").unwrap();
  let mut machine = VM::new(&VmConfig::default());
  assert_eq!(machine.run(&assembled.binary, 3, 5).unwrap(), vec![16, 4]);
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod bytecode;
pub mod driver;
pub mod memory;
pub mod report;
pub mod vm;
