use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A problem found while compiling or evaluating an inline expression.
///
/// Diagnostics are accumulated, never thrown; every diagnosed site also
/// produces a fallback value so one malformed expression cannot abort
/// compilation of the rest of a program. `pos` is a byte offset into the
/// expression source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvalDiagnostic {
    pub pos: usize,
    #[serde(flatten)]
    pub kind: EvalDiagnosticKind,
}

#[derive(Error, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EvalDiagnosticKind {
    #[error("Variable '{name}' was not found")]
    VariableNotFound { name: String },
    #[error("Unknown operation '{operator}'")]
    UnknownOperation { operator: String },
    #[error("Operation '{operator}' is not supported between {left} and {right}")]
    UnsupportedOperation {
        operator: String,
        left: String,
        right: String,
    },
    #[error("'{name}' is a reserved keyword")]
    ReservedKeyword { name: String },
    #[error("Could not parse expression: {message}")]
    ParseError { message: String },
}

impl EvalDiagnostic {
    pub fn new(pos: usize, kind: EvalDiagnosticKind) -> Self {
        EvalDiagnostic { pos, kind }
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}
