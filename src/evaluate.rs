//! Compiler and evaluator for inline expressions (branch conditions,
//! interpolations, assignment right-hand sides).

pub mod compiler;
pub mod diagnostic;
pub mod node;
mod parser;
mod scanner;
pub mod token;
pub mod value;

pub use self::{
    compiler::{CompiledExpression, EmptyContext, Evaluation, ExpressionCompiler, LookupContext},
    diagnostic::{EvalDiagnostic, EvalDiagnosticKind},
    node::{CompilerNode, Operation},
    value::Value,
};
