use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum SparkError {
    #[error("Internal: {0}")]
    Internal(String),
    #[error("Grammar: {0}")]
    Grammar(#[from] GrammarCompileError),
}

impl SparkError {
    pub fn internal(message: impl std::fmt::Display) -> Self {
        SparkError::Internal(message.to_string())
    }
}

/// A malformed grammar definition. Raised while compiling a grammar, never
/// while parsing user scripts.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum GrammarCompileError {
    #[error("rule '{rule}' includes unknown rule '{include}'")]
    UnknownInclude { rule: String, include: String },
    #[error("rule '{rule}' declares a begin pattern without an end pattern")]
    MissingEnd { rule: String },
    #[error("rule '{rule}' declares an end pattern without a begin pattern")]
    MissingBegin { rule: String },
    #[error("rule '{rule}' has an invalid pattern: {message}")]
    InvalidPattern { rule: String, message: String },
    #[error("rule '{rule}' declares capture '{capture}' not present in its pattern")]
    UnknownCapture { rule: String, capture: String },
    #[error("'$base' include is only valid inside an injected grammar")]
    BaseOutsideInjection,
}
