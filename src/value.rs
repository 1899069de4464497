//! Runtime values and the operator semantics shared by the constant folder
//! and the interpreter.
//!
//! Keeping a single implementation of every operator guarantees that
//! folding a constant instruction is observationally identical to executing
//! it: the optimizer and the interpreter both call [`eval_binary`].

use crate::error::RuntimeError;
use crate::tac::BinKind;
use std::fmt;

/// A runtime value: a 64-bit signed integer or a string. Nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Int(i64),
  Str(String),
}

impl Value {
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Int(_) => "int",
      Value::Str(_) => "string",
    }
  }
}

/// The text form used by `display` and by stitch coercion: integers render
/// as base-10 decimals, strings as themselves.
impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Int(value) => value.fmt(f),
      Value::Str(text) => f.write_str(text),
    }
  }
}

/// Apply a lowered binary operator to two values.
///
/// Arithmetic is wrapping 64-bit signed. `%` and `/` by zero and negative
/// repeat counts surface as runtime errors; type confusion can only mean a
/// semantic-analysis bug and is reported as such.
pub fn eval_binary(op: BinKind, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
  match op {
    BinKind::Add | BinKind::Sub | BinKind::Mul | BinKind::Div | BinKind::Mod => {
      let (Value::Int(a), Value::Int(b)) = (lhs, rhs) else {
        return Err(type_error(op, lhs, rhs));
      };
      let value = match op {
        BinKind::Add => a.wrapping_add(*b),
        BinKind::Sub => a.wrapping_sub(*b),
        BinKind::Mul => a.wrapping_mul(*b),
        BinKind::Div if *b == 0 => return Err(RuntimeError::DivideByZero),
        BinKind::Div => a.wrapping_div(*b),
        BinKind::Mod if *b == 0 => return Err(RuntimeError::DivideByZero),
        BinKind::Mod => a.wrapping_rem(*b),
        _ => unreachable!(),
      };
      Ok(Value::Int(value))
    }
    BinKind::Stitch => Ok(Value::Str(format!("{lhs}{rhs}"))),
    BinKind::Repeat => match (lhs, rhs) {
      (Value::Str(text), Value::Int(count)) | (Value::Int(count), Value::Str(text)) => {
        if *count < 0 {
          return Err(RuntimeError::NegativeRepeat);
        }
        Ok(Value::Str(text.repeat(*count as usize)))
      }
      _ => Err(type_error(op, lhs, rhs)),
    },
    BinKind::CmpEq
    | BinKind::CmpNe
    | BinKind::CmpLt
    | BinKind::CmpLe
    | BinKind::CmpGt
    | BinKind::CmpGe => {
      let (Value::Int(a), Value::Int(b)) = (lhs, rhs) else {
        return Err(type_error(op, lhs, rhs));
      };
      let holds = match op {
        BinKind::CmpEq => a == b,
        BinKind::CmpNe => a != b,
        BinKind::CmpLt => a < b,
        BinKind::CmpLe => a <= b,
        BinKind::CmpGt => a > b,
        BinKind::CmpGe => a >= b,
        _ => unreachable!(),
      };
      Ok(Value::Int(holds as i64))
    }
  }
}

fn type_error(op: BinKind, lhs: &Value, rhs: &Value) -> RuntimeError {
  RuntimeError::TypeErrorAtRuntime {
    detail: format!(
      "unsupported operand types for '{op}': {} and {}",
      lhs.type_name(),
      rhs.type_name()
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stitch_coerces_integers_to_decimal_text() {
    let id = eval_binary(BinKind::Stitch, &Value::Str("ID=".to_string()), &Value::Int(12));
    assert_eq!(id, Ok(Value::Str("ID=12".to_string())));
    let n = eval_binary(BinKind::Stitch, &Value::Int(-3), &Value::Int(4));
    assert_eq!(n, Ok(Value::Str("-34".to_string())));
  }

  #[test]
  fn repeat_accepts_the_string_on_either_side() {
    let star = Value::Str("*".to_string());
    assert_eq!(
      eval_binary(BinKind::Repeat, &star, &Value::Int(3)),
      Ok(Value::Str("***".to_string()))
    );
    assert_eq!(
      eval_binary(BinKind::Repeat, &Value::Int(2), &Value::Str("Yo".to_string())),
      Ok(Value::Str("YoYo".to_string()))
    );
    assert_eq!(
      eval_binary(BinKind::Repeat, &star, &Value::Int(0)),
      Ok(Value::Str(String::new()))
    );
  }

  #[test]
  fn negative_repeat_counts_are_a_runtime_error() {
    assert_eq!(
      eval_binary(BinKind::Repeat, &Value::Str("hi".to_string()), &Value::Int(-2)),
      Err(RuntimeError::NegativeRepeat)
    );
  }

  #[test]
  fn division_and_modulo_by_zero_are_runtime_errors() {
    assert_eq!(
      eval_binary(BinKind::Mod, &Value::Int(1), &Value::Int(0)),
      Err(RuntimeError::DivideByZero)
    );
    assert_eq!(
      eval_binary(BinKind::Div, &Value::Int(7), &Value::Int(0)),
      Err(RuntimeError::DivideByZero)
    );
    assert_eq!(
      eval_binary(BinKind::Div, &Value::Int(7), &Value::Int(2)),
      Ok(Value::Int(3))
    );
  }

  #[test]
  fn comparisons_yield_zero_or_one() {
    assert_eq!(
      eval_binary(BinKind::CmpLe, &Value::Int(2), &Value::Int(2)),
      Ok(Value::Int(1))
    );
    assert_eq!(
      eval_binary(BinKind::CmpGt, &Value::Int(2), &Value::Int(5)),
      Ok(Value::Int(0))
    );
  }
}
