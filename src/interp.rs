//! TAC interpreter: executes the instruction list against a value store.
//!
//! Execution is sequential and deterministic. A program counter walks the
//! list; a label-to-index map is built once up front so branches are O(1).
//! `display` appends to an output buffer, `give` halts immediately with its
//! value, and falling off the end of the list is a normal finish. Output
//! produced before a runtime error is kept and returned with the failure.

use crate::error::{Diagnostic, RuntimeError};
use crate::tac::{Instr, LabelId, Operand};
use crate::value::{Value, eval_binary};
use std::collections::HashMap;

/// The result of a successful run: the ordered output lines and the value
/// `give` halted with, if any. The give value is recorded, never printed.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
  pub output: Vec<String>,
  pub give_value: Option<Value>,
}

/// A failed run: the diagnostic plus whatever output was emitted before it.
/// Compile-stage failures carry no output.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
  pub diagnostic: Diagnostic,
  pub output: Vec<String>,
}

impl From<Diagnostic> for Failure {
  fn from(diagnostic: Diagnostic) -> Self {
    Self {
      diagnostic,
      output: Vec::new(),
    }
  }
}

/// Execute an instruction list.
pub fn execute(code: &[Instr]) -> Result<Execution, Failure> {
  let mut machine = Machine::new(code);
  match machine.run() {
    Ok(give_value) => Ok(Execution {
      output: machine.output,
      give_value,
    }),
    Err(err) => Err(Failure {
      diagnostic: Diagnostic::runtime(err),
      output: machine.output,
    }),
  }
}

struct Machine<'a> {
  code: &'a [Instr],
  labels: HashMap<LabelId, usize>,
  names: HashMap<String, Value>,
  temps: Vec<Option<Value>>,
  output: Vec<String>,
}

impl<'a> Machine<'a> {
  fn new(code: &'a [Instr]) -> Self {
    let labels = code
      .iter()
      .enumerate()
      .filter_map(|(index, instr)| match instr {
        Instr::Label { id } => Some((*id, index)),
        _ => None,
      })
      .collect();
    Self {
      code,
      labels,
      names: HashMap::new(),
      temps: Vec::new(),
      output: Vec::new(),
    }
  }

  fn run(&mut self) -> Result<Option<Value>, RuntimeError> {
    let mut pc = 0;
    while let Some(instr) = self.code.get(pc) {
      match instr {
        Instr::Copy { dst, src } => {
          let value = self.read(src)?;
          self.write(dst, value);
        }
        Instr::Bin { op, dst, lhs, rhs } => {
          let a = self.read(lhs)?;
          let b = self.read(rhs)?;
          let value = eval_binary(*op, &a, &b)?;
          self.write(dst, value);
        }
        Instr::Display { value } => {
          let value = self.read(value)?;
          self.output.push(value.to_string());
        }
        Instr::Give { value } => {
          let value = self.read(value)?;
          return Ok(Some(value));
        }
        Instr::Label { .. } => {}
        Instr::Goto { target } => {
          pc = self.jump(*target);
          continue;
        }
        Instr::IfFalse { cond, target } => {
          let value = self.read(cond)?;
          if value == Value::Int(0) {
            pc = self.jump(*target);
            continue;
          }
        }
        Instr::IfNeqConst {
          value,
          literal,
          target,
        } => {
          let value = self.read(value)?;
          let literal = self.read(literal)?;
          if value != literal {
            pc = self.jump(*target);
            continue;
          }
        }
      }
      pc += 1;
    }
    Ok(None)
  }

  fn jump(&self, target: LabelId) -> usize {
    // every branch target exists as a label in the same list
    self
      .labels
      .get(&target)
      .copied()
      .expect("branch target is a known label")
  }

  fn read(&self, operand: &Operand) -> Result<Value, RuntimeError> {
    match operand {
      Operand::IntConst(value) => Ok(Value::Int(*value)),
      Operand::StrConst(text) => Ok(Value::Str(text.clone())),
      Operand::Name(name) => {
        self
          .names
          .get(name)
          .cloned()
          .ok_or_else(|| RuntimeError::TypeErrorAtRuntime {
            detail: format!("variable '{name}' read before assignment"),
          })
      }
      Operand::Temp(index) => self
        .temps
        .get(*index)
        .and_then(Clone::clone)
        .ok_or_else(|| RuntimeError::TypeErrorAtRuntime {
          detail: format!("temporary t{index} read before assignment"),
        }),
    }
  }

  fn write(&mut self, dst: &Operand, value: Value) {
    match dst {
      Operand::Name(name) => {
        self.names.insert(name.clone(), value);
      }
      Operand::Temp(index) => {
        if *index >= self.temps.len() {
          self.temps.resize(*index + 1, None);
        }
        self.temps[*index] = Some(value);
      }
      _ => unreachable!("constants are never assignment targets"),
    }
  }
}
