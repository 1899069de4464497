//! Semantic analysis: attaches a type to every expression and enforces the
//! scoping rules.
//!
//! The symbol table is a stack of scopes. Only two kinds of scopes exist:
//! the program scope at the bottom and one scope per active `loop` body.
//! Lookup walks from innermost to outermost; insertion always targets the
//! innermost scope. A loop variable shadows an outer binding of the same
//! spelling for the duration of the body and disappears when the body ends.

use crate::error::{Diagnostic, SemaError, SourcePos};
use crate::parser::{BinOp, CaseLit, Expr, ExprKind, Stmt, UnaryOp};
use crate::ty::{Ty, binary_result};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Binding {
  ty: Ty,
  defined_at: SourcePos,
  loop_var: bool,
}

/// Type-check the program, back-patching `Expr::ty` along the way.
pub fn analyze(program: &mut [Stmt]) -> Result<(), Diagnostic> {
  Analyzer::new().check_stmts(program)
}

struct Analyzer {
  scopes: Vec<HashMap<String, Binding>>,
}

impl Analyzer {
  fn new() -> Self {
    Self {
      scopes: vec![HashMap::new()],
    }
  }

  fn lookup(&self, name: &str) -> Option<&Binding> {
    self.scopes.iter().rev().find_map(|scope| scope.get(name))
  }

  fn check_stmts(&mut self, stmts: &mut [Stmt]) -> Result<(), Diagnostic> {
    for stmt in stmts {
      self.check_stmt(stmt)?;
    }
    Ok(())
  }

  fn check_stmt(&mut self, stmt: &mut Stmt) -> Result<(), Diagnostic> {
    match stmt {
      Stmt::Assign { name, expr, pos } => {
        let got = self.check_expr(expr)?;
        match self.lookup(name) {
          Some(binding) if binding.loop_var => Err(Diagnostic::semantic(
            SemaError::LoopVariableAssignment { name: name.clone() },
            *pos,
          )),
          Some(binding) if binding.ty != got => Err(Diagnostic::semantic(
            SemaError::TypeMismatch {
              name: name.clone(),
              expected: binding.ty,
              got,
            },
            *pos,
          )),
          Some(_) => Ok(()),
          None => {
            let binding = Binding {
              ty: got,
              defined_at: *pos,
              loop_var: false,
            };
            self
              .scopes
              .last_mut()
              .expect("program scope always present")
              .insert(name.clone(), binding);
            Ok(())
          }
        }
      }
      Stmt::Display { expr, .. } | Stmt::Give { expr, .. } => {
        self.check_expr(expr)?;
        Ok(())
      }
      Stmt::Check {
        cond,
        then_body,
        else_body,
        ..
      } => {
        let got = self.check_expr(cond)?;
        if !got.is_int() {
          return Err(Diagnostic::semantic(
            SemaError::ConditionNotInt { got },
            cond.pos,
          ));
        }
        self.check_stmts(then_body)?;
        self.check_stmts(else_body)
      }
      Stmt::Loop {
        var,
        start,
        end,
        body,
        pos,
      } => {
        for (which, bound) in [("start", &mut *start), ("end", &mut *end)] {
          let got = self.check_expr(bound)?;
          if !got.is_int() {
            return Err(Diagnostic::semantic(
              SemaError::LoopBoundNotInt { which, got },
              bound.pos,
            ));
          }
        }

        let mut scope = HashMap::new();
        scope.insert(
          var.clone(),
          Binding {
            ty: Ty::Int,
            defined_at: *pos,
            loop_var: true,
          },
        );
        self.scopes.push(scope);
        let result = self.check_stmts(body);
        self.scopes.pop();
        result
      }
      Stmt::Choose {
        subject,
        cases,
        default_body,
        ..
      } => {
        let subject_ty = self.check_expr(subject)?;
        for case in cases.iter_mut() {
          let got = match case.literal {
            CaseLit::Int(_) => Ty::Int,
            CaseLit::Str(_) => Ty::Str,
          };
          if got != subject_ty {
            return Err(Diagnostic::semantic(
              SemaError::CaseTypeMismatch {
                expected: subject_ty,
                got,
              },
              case.lit_pos,
            ));
          }
          self.check_stmts(&mut case.body)?;
        }
        self.check_stmts(default_body)
      }
    }
  }

  fn check_expr(&mut self, expr: &mut Expr) -> Result<Ty, Diagnostic> {
    let ty = match &mut expr.kind {
      ExprKind::Num(_) => Ty::Int,
      ExprKind::Str(_) => Ty::Str,
      ExprKind::Var(name) => match self.lookup(name) {
        Some(binding) => binding.ty,
        None => {
          return Err(Diagnostic::semantic(
            SemaError::UndefinedVariable { name: name.clone() },
            expr.pos,
          ));
        }
      },
      ExprKind::Unary { op, operand } => {
        let got = self.check_expr(operand)?;
        if !got.is_int() {
          return Err(Diagnostic::semantic(
            SemaError::InvalidUnaryOperand { op: *op, ty: got },
            expr.pos,
          ));
        }
        Ty::Int
      }
      ExprKind::Binary { op, lhs, rhs } => {
        let op = *op;
        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;
        let Some(result) = binary_result(op, lhs_ty, rhs_ty) else {
          return Err(Diagnostic::semantic(
            SemaError::InvalidOperandTypes {
              op,
              lhs: lhs_ty,
              rhs: rhs_ty,
            },
            expr.pos,
          ));
        };
        // a repetition whose count is statically known to be negative is
        // rejected here; dynamic counts stay a runtime concern
        if op == BinOp::Mul && result.is_str() {
          let count_side = if lhs_ty.is_int() { &**lhs } else { &**rhs };
          if let Some(count) = const_int(count_side)
            && count < 0
          {
            return Err(Diagnostic::semantic(SemaError::NegativeRepeat, expr.pos));
          }
        }
        result
      }
    };
    expr.ty = Some(ty);
    Ok(ty)
  }
}

/// Evaluate an integer expression made only of literals, returning `None`
/// as soon as anything dynamic (or erroring) is involved.
fn const_int(expr: &Expr) -> Option<i64> {
  match &expr.kind {
    ExprKind::Num(value) => Some(*value),
    ExprKind::Unary {
      op: UnaryOp::Neg,
      operand,
    } => const_int(operand).map(i64::wrapping_neg),
    ExprKind::Binary { op, lhs, rhs } => {
      let a = const_int(lhs)?;
      let b = const_int(rhs)?;
      match op {
        BinOp::Add => Some(a.wrapping_add(b)),
        BinOp::Sub => Some(a.wrapping_sub(b)),
        BinOp::Mul => Some(a.wrapping_mul(b)),
        BinOp::Div => (b != 0).then(|| a.wrapping_div(b)),
        BinOp::Mod => (b != 0).then(|| a.wrapping_rem(b)),
        _ => None,
      }
    }
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::DiagnosticKind;
  use crate::tokenizer::tokenize;

  fn analyze_source(source: &str) -> Vec<Stmt> {
    let mut program =
      crate::parser::parse(tokenize(source).expect("source lexes")).expect("source parses");
    analyze(&mut program).expect("source type-checks");
    program
  }

  fn analyze_err(source: &str) -> SemaError {
    let mut program =
      crate::parser::parse(tokenize(source).expect("source lexes")).expect("source parses");
    let err = analyze(&mut program).expect_err("source is rejected");
    let DiagnosticKind::Semantic(kind) = err.kind else {
      panic!("expected a semantic diagnostic, got {err:?}");
    };
    kind
  }

  fn assert_fully_typed(stmts: &[Stmt]) {
    fn check_expr(expr: &Expr) {
      assert!(expr.ty.is_some(), "untyped expression: {:?}", expr.kind);
      match &expr.kind {
        ExprKind::Unary { operand, .. } => check_expr(operand),
        ExprKind::Binary { lhs, rhs, .. } => {
          check_expr(lhs);
          check_expr(rhs);
        }
        _ => {}
      }
    }
    for stmt in stmts {
      match stmt {
        Stmt::Assign { expr, .. } | Stmt::Display { expr, .. } | Stmt::Give { expr, .. } => {
          check_expr(expr);
        }
        Stmt::Loop {
          start, end, body, ..
        } => {
          check_expr(start);
          check_expr(end);
          assert_fully_typed(body);
        }
        Stmt::Check {
          cond,
          then_body,
          else_body,
          ..
        } => {
          check_expr(cond);
          assert_fully_typed(then_body);
          assert_fully_typed(else_body);
        }
        Stmt::Choose {
          subject,
          cases,
          default_body,
          ..
        } => {
          check_expr(subject);
          for case in cases {
            assert_fully_typed(&case.body);
          }
          assert_fully_typed(default_body);
        }
      }
    }
  }

  #[test]
  fn every_expression_is_typed_after_analysis() {
    let program = analyze_source(
      "x = 4: y = x * 5: check y > 10 { display \"big \" ~ y: } else { display y: } \
       loop i in 1..y { display \"-\" * i: }",
    );
    assert_fully_typed(&program);
  }

  #[test]
  fn reads_of_unbound_variables_are_rejected() {
    assert_eq!(
      analyze_err("display x:"),
      SemaError::UndefinedVariable {
        name: "x".to_string()
      }
    );
  }

  #[test]
  fn rebinding_to_a_different_type_is_rejected() {
    assert_eq!(
      analyze_err("x = 1: x = \"s\":"),
      SemaError::TypeMismatch {
        name: "x".to_string(),
        expected: Ty::Int,
        got: Ty::Str,
      }
    );
  }

  #[test]
  fn rebinding_to_the_same_type_is_fine() {
    analyze_source("x = 1: x = 2: s = \"a\": s = s ~ \"b\":");
  }

  #[test]
  fn relational_operators_on_strings_are_rejected() {
    assert_eq!(
      analyze_err("display \"a\" < \"b\":"),
      SemaError::InvalidOperandTypes {
        op: BinOp::Lt,
        lhs: Ty::Str,
        rhs: Ty::Str,
      }
    );
  }

  #[test]
  fn plus_does_not_concatenate_strings() {
    assert_eq!(
      analyze_err("display \"a\" + \"b\":"),
      SemaError::InvalidOperandTypes {
        op: BinOp::Add,
        lhs: Ty::Str,
        rhs: Ty::Str,
      }
    );
  }

  #[test]
  fn unary_minus_rejects_strings() {
    assert_eq!(
      analyze_err("display -\"a\":"),
      SemaError::InvalidUnaryOperand {
        op: UnaryOp::Neg,
        ty: Ty::Str,
      }
    );
  }

  #[test]
  fn statically_negative_repeat_counts_are_rejected() {
    assert_eq!(analyze_err("display \"hi\" * -2:"), SemaError::NegativeRepeat);
    // also through folded arithmetic
    assert_eq!(
      analyze_err("display (1 - 3) * \"hi\":"),
      SemaError::NegativeRepeat
    );
  }

  #[test]
  fn dynamic_repeat_counts_pass_analysis() {
    analyze_source("n = 0 - 2: display \"hi\" * n:");
  }

  #[test]
  fn loop_variables_shadow_and_unshadow() {
    // `i` is a string outside the loop, an int inside it
    analyze_source(
      "i = \"outer\": loop i in 1..3 { display i + 1: } display i ~ \"!\":",
    );
  }

  #[test]
  fn loop_variables_are_not_visible_after_the_body() {
    assert_eq!(
      analyze_err("loop i in 1..3 { display i: } display i:"),
      SemaError::UndefinedVariable {
        name: "i".to_string()
      }
    );
  }

  #[test]
  fn loop_variables_cannot_be_reassigned() {
    assert_eq!(
      analyze_err("loop i in 1..3 { i = 5: }"),
      SemaError::LoopVariableAssignment {
        name: "i".to_string()
      }
    );
  }

  #[test]
  fn loop_bounds_must_be_ints() {
    assert_eq!(
      analyze_err("loop i in \"a\"..3 { }"),
      SemaError::LoopBoundNotInt {
        which: "start",
        got: Ty::Str,
      }
    );
  }

  #[test]
  fn check_conditions_must_be_ints() {
    assert_eq!(
      analyze_err("check \"s\" { display 1: } else { display 2: }"),
      SemaError::ConditionNotInt { got: Ty::Str }
    );
  }

  #[test]
  fn case_labels_must_match_the_subject_type() {
    assert_eq!(
      analyze_err("choose 1 { \"a\": display 1: default: display 2: }"),
      SemaError::CaseTypeMismatch {
        expected: Ty::Int,
        got: Ty::Str,
      }
    );
    analyze_source(
      "choose \"mon\" { \"mon\": display 1: default: display 2: }",
    );
  }

  #[test]
  fn bindings_record_their_definition_site() {
    let mut program = crate::parser::parse(tokenize("x = 1:").unwrap()).unwrap();
    let mut analyzer = Analyzer::new();
    analyzer.check_stmts(&mut program).unwrap();
    let binding = analyzer.lookup("x").expect("x is bound");
    assert_eq!(
      (binding.defined_at.line, binding.defined_at.column),
      (1, 1)
    );
    assert_eq!(binding.ty, Ty::Int);
    assert!(!binding.loop_var);
  }

  #[test]
  fn variables_assigned_in_a_branch_reach_the_program_scope() {
    // check/choose bodies do not open scopes of their own
    analyze_source(
      "check 1 { x = 1: } else { x = 2: } display x:",
    );
  }
}
