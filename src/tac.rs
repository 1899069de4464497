//! Three-address code: the flat instruction list the typed AST lowers to.
//!
//! Operands are uniform across all instructions. Temporaries are numbered
//! from zero per program and assigned exactly once; the optimizer may
//! delete an instruction but never renumbers what remains. Every jump
//! target refers to a `Label` present in the same list.

use std::fmt;

pub type LabelId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
  Temp(usize),
  Name(String),
  IntConst(i64),
  StrConst(String),
}

impl Operand {
  pub fn is_temp(&self) -> bool {
    matches!(self, Operand::Temp(_))
  }
}

impl fmt::Display for Operand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operand::Temp(index) => write!(f, "t{index}"),
      Operand::Name(name) => f.write_str(name),
      Operand::IntConst(value) => value.fmt(f),
      Operand::StrConst(text) => write!(f, "{text:?}"),
    }
  }
}

/// Binary operations at the TAC level.
///
/// `Mul` is integer multiplication only: lowering resolves the overloaded
/// source-level `*` into `Mul` or `Repeat` using the types the analyzer
/// attached, so the instruction set itself is unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinKind {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  Stitch,
  Repeat,
  CmpEq,
  CmpNe,
  CmpLt,
  CmpLe,
  CmpGt,
  CmpGe,
}

impl fmt::Display for BinKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let symbol = match self {
      BinKind::Add => "+",
      BinKind::Sub => "-",
      BinKind::Mul | BinKind::Repeat => "*",
      BinKind::Div => "/",
      BinKind::Mod => "%",
      BinKind::Stitch => "~",
      BinKind::CmpEq => "==",
      BinKind::CmpNe => "!=",
      BinKind::CmpLt => "<",
      BinKind::CmpLe => "<=",
      BinKind::CmpGt => ">",
      BinKind::CmpGe => ">=",
    };
    f.write_str(symbol)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
  Copy {
    dst: Operand,
    src: Operand,
  },
  Bin {
    op: BinKind,
    dst: Operand,
    lhs: Operand,
    rhs: Operand,
  },
  Display {
    value: Operand,
  },
  Give {
    value: Operand,
  },
  Label {
    id: LabelId,
  },
  Goto {
    target: LabelId,
  },
  IfFalse {
    cond: Operand,
    target: LabelId,
  },
  IfNeqConst {
    value: Operand,
    literal: Operand,
    target: LabelId,
  },
}

impl fmt::Display for Instr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Instr::Copy { dst, src } => write!(f, "{dst} = {src}"),
      Instr::Bin { op, dst, lhs, rhs } => write!(f, "{dst} = {lhs} {op} {rhs}"),
      Instr::Display { value } => write!(f, "display {value}"),
      Instr::Give { value } => write!(f, "give {value}"),
      Instr::Label { id } => write!(f, "L{id}:"),
      Instr::Goto { target } => write!(f, "goto L{target}"),
      Instr::IfFalse { cond, target } => write!(f, "if_false {cond} goto L{target}"),
      Instr::IfNeqConst {
        value,
        literal,
        target,
      } => write!(f, "if {value} != {literal} goto L{target}"),
    }
  }
}

/// Render the instruction list one instruction per line, as seen in test
/// expectations and trace logs.
pub fn dump(code: &[Instr]) -> String {
  code
    .iter()
    .map(Instr::to_string)
    .collect::<Vec<_>>()
    .join("\n")
}
