//! Lowering: flattens the typed AST into three-address code.
//!
//! Expressions lower post-order, each binary node into a fresh temporary;
//! literals become constant operands without emitting anything. Statement
//! templates place labels so that every `check` runs exactly one branch,
//! every `loop` tests `var <= end` before each iteration, and every
//! `choose` falls through a chain of `if != literal` dispatches into the
//! default body.
//!
//! Lowering cannot fail: it only runs on programs the analyzer accepted.

use crate::parser::{BinOp, CaseLit, Expr, ExprKind, Stmt};
use crate::tac::{BinKind, Instr, LabelId, Operand};
use crate::ty::Ty;
use std::collections::HashMap;

/// Lower a type-checked program into a TAC instruction list.
pub fn generate(program: &[Stmt]) -> Vec<Instr> {
  let mut lowerer = Lowerer::new();
  lowerer.lower_stmts(program);
  lowerer.code
}

struct Lowerer {
  code: Vec<Instr>,
  next_temp: usize,
  next_label: usize,
  /// Source name to store key, innermost scope last. A loop variable that
  /// shadows a visible binding gets a renamed key so the outer binding's
  /// store slot survives the loop untouched.
  scopes: Vec<HashMap<String, String>>,
  renames: usize,
}

impl Lowerer {
  fn new() -> Self {
    Self {
      code: Vec::new(),
      next_temp: 0,
      next_label: 0,
      scopes: vec![HashMap::new()],
      renames: 0,
    }
  }

  fn emit(&mut self, instr: Instr) {
    self.code.push(instr);
  }

  fn new_temp(&mut self) -> Operand {
    let temp = Operand::Temp(self.next_temp);
    self.next_temp += 1;
    temp
  }

  fn new_label(&mut self) -> LabelId {
    let label = self.next_label;
    self.next_label += 1;
    label
  }

  /// Materialize an operand into a temporary unless it already is one.
  /// Loop bounds and `choose` subjects go through this so they are
  /// evaluated exactly once.
  fn into_temp(&mut self, operand: Operand) -> Operand {
    if operand.is_temp() {
      return operand;
    }
    let temp = self.new_temp();
    self.emit(Instr::Copy {
      dst: temp.clone(),
      src: operand,
    });
    temp
  }

  fn resolve(&self, name: &str) -> Option<String> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).cloned())
  }

  /// Store key for an assignment target: the visible binding's key, or a
  /// fresh program-level binding under the variable's own name.
  fn target_key(&mut self, name: &str) -> String {
    if let Some(key) = self.resolve(name) {
      return key;
    }
    self
      .scopes
      .last_mut()
      .expect("program scope always present")
      .insert(name.to_string(), name.to_string());
    name.to_string()
  }

  /// Open the loop body scope and pick the loop variable's store key,
  /// renaming it when it would shadow a visible binding.
  fn push_loop_scope(&mut self, var: &str) -> String {
    let key = if self.resolve(var).is_some() {
      self.renames += 1;
      format!("{var}.{}", self.renames)
    } else {
      var.to_string()
    };
    let mut scope = HashMap::new();
    scope.insert(var.to_string(), key.clone());
    self.scopes.push(scope);
    key
  }

  fn lower_stmts(&mut self, stmts: &[Stmt]) {
    for stmt in stmts {
      self.lower_stmt(stmt);
    }
  }

  fn lower_stmt(&mut self, stmt: &Stmt) {
    match stmt {
      Stmt::Assign { name, expr, .. } => {
        let src = self.lower_expr(expr);
        let key = self.target_key(name);
        self.emit(Instr::Copy {
          dst: Operand::Name(key),
          src,
        });
      }
      Stmt::Display { expr, .. } => {
        let value = self.lower_expr(expr);
        self.emit(Instr::Display { value });
      }
      Stmt::Give { expr, .. } => {
        let value = self.lower_expr(expr);
        self.emit(Instr::Give { value });
      }
      Stmt::Check {
        cond,
        then_body,
        else_body,
        ..
      } => {
        let cond = self.lower_expr(cond);
        let l_else = self.new_label();
        let l_end = self.new_label();
        self.emit(Instr::IfFalse {
          cond,
          target: l_else,
        });
        self.lower_stmts(then_body);
        self.emit(Instr::Goto { target: l_end });
        self.emit(Instr::Label { id: l_else });
        self.lower_stmts(else_body);
        self.emit(Instr::Label { id: l_end });
      }
      Stmt::Loop {
        var,
        start,
        end,
        body,
        ..
      } => {
        let start = self.lower_expr(start);
        let start = self.into_temp(start);
        let end = self.lower_expr(end);
        let end = self.into_temp(end);

        let var_op = Operand::Name(self.push_loop_scope(var));
        self.emit(Instr::Copy {
          dst: var_op.clone(),
          src: start,
        });

        let l_head = self.new_label();
        let l_done = self.new_label();
        self.emit(Instr::Label { id: l_head });
        let cond = self.new_temp();
        self.emit(Instr::Bin {
          op: BinKind::CmpLe,
          dst: cond.clone(),
          lhs: var_op.clone(),
          rhs: end,
        });
        self.emit(Instr::IfFalse {
          cond,
          target: l_done,
        });
        self.lower_stmts(body);
        self.emit(Instr::Bin {
          op: BinKind::Add,
          dst: var_op.clone(),
          lhs: var_op,
          rhs: Operand::IntConst(1),
        });
        self.emit(Instr::Goto { target: l_head });
        self.emit(Instr::Label { id: l_done });
        self.scopes.pop();
      }
      Stmt::Choose {
        subject,
        cases,
        default_body,
        ..
      } => {
        let subject = self.lower_expr(subject);
        let subject = self.into_temp(subject);
        let l_end = self.new_label();
        for case in cases {
          let l_next = self.new_label();
          let literal = match &case.literal {
            CaseLit::Int(value) => Operand::IntConst(*value),
            CaseLit::Str(text) => Operand::StrConst(text.clone()),
          };
          self.emit(Instr::IfNeqConst {
            value: subject.clone(),
            literal,
            target: l_next,
          });
          self.lower_stmts(&case.body);
          self.emit(Instr::Goto { target: l_end });
          self.emit(Instr::Label { id: l_next });
        }
        self.lower_stmts(default_body);
        self.emit(Instr::Label { id: l_end });
      }
    }
  }

  fn lower_expr(&mut self, expr: &Expr) -> Operand {
    match &expr.kind {
      ExprKind::Num(value) => Operand::IntConst(*value),
      ExprKind::Str(text) => Operand::StrConst(text.clone()),
      ExprKind::Var(name) => {
        let key = self
          .resolve(name)
          .expect("variable reads resolved by semantic analysis");
        Operand::Name(key)
      }
      ExprKind::Unary { operand, .. } => {
        let src = self.lower_expr(operand);
        let dst = self.new_temp();
        self.emit(Instr::Bin {
          op: BinKind::Sub,
          dst: dst.clone(),
          lhs: Operand::IntConst(0),
          rhs: src,
        });
        dst
      }
      ExprKind::Binary { op, lhs, rhs } => {
        let lhs_op = self.lower_expr(lhs);
        let rhs_op = self.lower_expr(rhs);
        let kind = bin_kind(*op, lhs.ty(), rhs.ty());
        let dst = self.new_temp();
        self.emit(Instr::Bin {
          op: kind,
          dst: dst.clone(),
          lhs: lhs_op,
          rhs: rhs_op,
        });
        dst
      }
    }
  }
}

/// Resolve a source-level operator into a TAC operation using the operand
/// types. `*` is the only overloaded case.
fn bin_kind(op: BinOp, lhs: Ty, rhs: Ty) -> BinKind {
  match op {
    BinOp::Add => BinKind::Add,
    BinOp::Sub => BinKind::Sub,
    BinOp::Div => BinKind::Div,
    BinOp::Mod => BinKind::Mod,
    BinOp::Stitch => BinKind::Stitch,
    BinOp::Mul => {
      if lhs.is_int() && rhs.is_int() {
        BinKind::Mul
      } else {
        BinKind::Repeat
      }
    }
    BinOp::Eq => BinKind::CmpEq,
    BinOp::Ne => BinKind::CmpNe,
    BinOp::Lt => BinKind::CmpLt,
    BinOp::Le => BinKind::CmpLe,
    BinOp::Gt => BinKind::CmpGt,
    BinOp::Ge => BinKind::CmpGe,
  }
}
