//! Fixed-point TAC optimizer.
//!
//! Three rule families run until none of them fires: constant folding
//! through the runtime's own operator semantics, a short list of algebraic
//! identities, and removal of code strictly between an unconditional
//! transfer (`give`, `goto`) and the next label. Labels are never pruned
//! and temporaries are never renumbered, so jump targets stay valid.
//!
//! Folding must not change observable behavior: an instruction whose
//! evaluation would raise a runtime error (`1 % 0`, a negative repeat) is
//! left in place for the interpreter to fail on.

use crate::tac::{BinKind, Instr, Operand};
use crate::value::{Value, eval_binary};
use tracing::trace;

pub fn optimize(mut code: Vec<Instr>) -> Vec<Instr> {
  loop {
    let mut changed = simplify_instrs(&mut code);
    changed |= remove_dead_code(&mut code);
    if !changed {
      return code;
    }
  }
}

fn simplify_instrs(code: &mut [Instr]) -> bool {
  let mut changed = false;
  for instr in code.iter_mut() {
    let replacement = match instr {
      Instr::Bin { op, dst, lhs, rhs } => simplify(*op, lhs, rhs).map(|src| Instr::Copy {
        dst: dst.clone(),
        src,
      }),
      _ => None,
    };
    if let Some(copy) = replacement {
      trace!(from = %instr, to = %copy, "rewrote instruction");
      *instr = copy;
      changed = true;
    }
  }
  changed
}

/// Replacement source operand for `lhs op rhs`, or `None` when no rule
/// applies.
fn simplify(op: BinKind, lhs: &Operand, rhs: &Operand) -> Option<Operand> {
  // constant folding, with the exact runtime semantics
  if let (Some(a), Some(b)) = (as_const(lhs), as_const(rhs)) {
    return match eval_binary(op, &a, &b) {
      Ok(value) => Some(const_operand(value)),
      Err(_) => None,
    };
  }

  match op {
    BinKind::Add => {
      if is_int_const(rhs, 0) {
        return Some(lhs.clone());
      }
      if is_int_const(lhs, 0) {
        return Some(rhs.clone());
      }
      None
    }
    BinKind::Mul => {
      if is_int_const(rhs, 1) {
        return Some(lhs.clone());
      }
      if is_int_const(lhs, 1) {
        return Some(rhs.clone());
      }
      if is_int_const(rhs, 0) || is_int_const(lhs, 0) {
        return Some(Operand::IntConst(0));
      }
      None
    }
    BinKind::Repeat => {
      // the constant side, if any, is the count: the analyzer typed the
      // other side as the string
      if is_int_const(lhs, 0) || is_int_const(rhs, 0) {
        return Some(Operand::StrConst(String::new()));
      }
      if is_int_const(rhs, 1) {
        return Some(lhs.clone());
      }
      if is_int_const(lhs, 1) {
        return Some(rhs.clone());
      }
      None
    }
    // `"" ~ x` only simplifies when `x` is constant, which the fold above
    // already covers: operands are untyped here, and copying a non-constant
    // `x` would forward an int where the analyzer promised a string
    _ => None,
  }
}

fn remove_dead_code(code: &mut Vec<Instr>) -> bool {
  let mut kept = Vec::with_capacity(code.len());
  let mut changed = false;
  let mut dead = false;
  for instr in code.drain(..) {
    match instr {
      Instr::Label { .. } => {
        dead = false;
        kept.push(instr);
      }
      _ if dead => {
        trace!(instr = %instr, "removed unreachable instruction");
        changed = true;
      }
      Instr::Goto { .. } | Instr::Give { .. } => {
        kept.push(instr);
        dead = true;
      }
      _ => kept.push(instr),
    }
  }
  *code = kept;
  changed
}

fn as_const(operand: &Operand) -> Option<Value> {
  match operand {
    Operand::IntConst(value) => Some(Value::Int(*value)),
    Operand::StrConst(text) => Some(Value::Str(text.clone())),
    _ => None,
  }
}

fn const_operand(value: Value) -> Operand {
  match value {
    Value::Int(value) => Operand::IntConst(value),
    Value::Str(text) => Operand::StrConst(text),
  }
}

fn is_int_const(operand: &Operand, expected: i64) -> bool {
  matches!(operand, Operand::IntConst(value) if *value == expected)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp(index: usize) -> Operand {
    Operand::Temp(index)
  }

  fn name(text: &str) -> Operand {
    Operand::Name(text.to_string())
  }

  fn bin(op: BinKind, dst: Operand, lhs: Operand, rhs: Operand) -> Instr {
    Instr::Bin { op, dst, lhs, rhs }
  }

  #[test]
  fn folds_constant_arithmetic_and_comparisons() {
    let code = optimize(vec![
      bin(BinKind::Add, temp(0), Operand::IntConst(2), Operand::IntConst(3)),
      bin(BinKind::CmpLt, temp(1), Operand::IntConst(1), Operand::IntConst(2)),
    ]);
    assert_eq!(
      code,
      vec![
        Instr::Copy {
          dst: temp(0),
          src: Operand::IntConst(5)
        },
        Instr::Copy {
          dst: temp(1),
          src: Operand::IntConst(1)
        },
      ]
    );
  }

  #[test]
  fn folds_constant_stitch_and_repeat() {
    let code = optimize(vec![
      bin(
        BinKind::Stitch,
        temp(0),
        Operand::StrConst("ID=".to_string()),
        Operand::IntConst(1),
      ),
      bin(
        BinKind::Repeat,
        temp(1),
        Operand::StrConst("ab".to_string()),
        Operand::IntConst(2),
      ),
    ]);
    assert_eq!(
      code,
      vec![
        Instr::Copy {
          dst: temp(0),
          src: Operand::StrConst("ID=1".to_string())
        },
        Instr::Copy {
          dst: temp(1),
          src: Operand::StrConst("abab".to_string())
        },
      ]
    );
  }

  #[test]
  fn never_folds_an_instruction_that_would_error() {
    let division = bin(BinKind::Mod, temp(0), Operand::IntConst(1), Operand::IntConst(0));
    let repeat = bin(
      BinKind::Repeat,
      temp(1),
      Operand::StrConst("hi".to_string()),
      Operand::IntConst(-2),
    );
    let code = optimize(vec![division.clone(), repeat.clone()]);
    assert_eq!(code, vec![division, repeat]);
  }

  #[test]
  fn applies_additive_and_multiplicative_identities() {
    let code = optimize(vec![
      bin(BinKind::Add, temp(0), name("x"), Operand::IntConst(0)),
      bin(BinKind::Mul, temp(1), name("x"), Operand::IntConst(1)),
      bin(BinKind::Mul, temp(2), name("x"), Operand::IntConst(0)),
    ]);
    assert_eq!(
      code,
      vec![
        Instr::Copy {
          dst: temp(0),
          src: name("x")
        },
        Instr::Copy {
          dst: temp(1),
          src: name("x")
        },
        Instr::Copy {
          dst: temp(2),
          src: Operand::IntConst(0)
        },
      ]
    );
  }

  #[test]
  fn applies_repeat_identities() {
    let code = optimize(vec![
      bin(BinKind::Repeat, temp(0), name("s"), Operand::IntConst(0)),
      bin(BinKind::Repeat, temp(1), name("s"), Operand::IntConst(1)),
    ]);
    assert_eq!(
      code,
      vec![
        Instr::Copy {
          dst: temp(0),
          src: Operand::StrConst(String::new())
        },
        Instr::Copy {
          dst: temp(1),
          src: name("s")
        },
      ]
    );
  }

  #[test]
  fn drops_code_between_a_transfer_and_the_next_label() {
    let code = optimize(vec![
      Instr::Give {
        value: Operand::IntConst(1),
      },
      Instr::Display {
        value: Operand::IntConst(2),
      },
      Instr::Goto { target: 0 },
      Instr::Label { id: 0 },
      Instr::Display {
        value: Operand::IntConst(3),
      },
    ]);
    assert_eq!(
      code,
      vec![
        Instr::Give {
          value: Operand::IntConst(1)
        },
        Instr::Label { id: 0 },
        Instr::Display {
          value: Operand::IntConst(3)
        },
      ]
    );
  }

  #[test]
  fn labels_survive_even_when_unreachable() {
    let code = optimize(vec![
      Instr::Goto { target: 1 },
      Instr::Label { id: 0 },
      Instr::Label { id: 1 },
    ]);
    assert_eq!(code.len(), 3, "labels must never be pruned");
  }
}
