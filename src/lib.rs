//! Crate root: wires together the PatternScript pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns the statement AST.
//! - `sema` types every expression against a scoped symbol table.
//! - `codegen` lowers the typed AST into three-address code.
//! - `optimizer` folds constants and removes unreachable instructions.
//! - `interp` executes the TAC and collects the program's output.
//! - `error` centralises the diagnostics shared by all of the above.
//!
//! The pipeline is strictly linear and single-threaded; each invocation
//! builds its own tokens, AST, symbol table and value store, and the first
//! diagnostic from any stage aborts the run.

pub mod codegen;
pub mod error;
pub mod interp;
pub mod optimizer;
pub mod parser;
pub mod sema;
pub mod tac;
pub mod tokenizer;
pub mod ty;
pub mod value;

pub use error::Diagnostic;
pub use interp::{Execution, Failure};
pub use value::Value;

use tracing::debug;

/// Compile a source string down to optimized three-address code.
pub fn compile(source: &str) -> Result<Vec<tac::Instr>, Diagnostic> {
  let tokens = tokenizer::tokenize(source)?;
  debug!(tokens = tokens.len(), "lexed");
  let mut program = parser::parse(tokens)?;
  debug!(statements = program.len(), "parsed");
  sema::analyze(&mut program)?;
  let code = codegen::generate(&program);
  debug!(instructions = code.len(), "lowered");
  let code = optimizer::optimize(code);
  debug!(instructions = code.len(), "optimized");
  Ok(code)
}

/// Run a PatternScript program from source.
///
/// On success the ordered output lines are returned together with the
/// optional `give` value; on failure the diagnostic is returned together
/// with any output emitted before the failure.
pub fn compile_and_run(source: &str) -> Result<Execution, Failure> {
  let code = compile(source)?;
  interp::execute(&code)
}
