//! Toolchain for the Sparkdown interactive-screenplay scripting language:
//! a declarative grammar compiled into an executable rule table, a
//! scope-stack tokenizer with incremental reuse, a structure compiler that
//! produces serializable programs, an expression compiler with
//! fault-tolerant diagnostics, and a cooperative steppable runtime that
//! emits a debugger-style event stream.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sparkdown::{Game, SparkCompiler};
//!
//! let script = "var greeting = \"Hello\"\n\n# Intro\n~ greeting = greeting + \", world\"\n";
//! let program = SparkCompiler::new().compile(script);
//! assert!(program.diagnostics.is_empty());
//!
//! let mut game = Game::builder(Arc::new(program)).entry("Intro").build();
//! game.start();
//! while !game.is_finished() {
//!     game.tick(0.1);
//! }
//! let messages = game.drain_messages();
//! assert_eq!(messages.first().map(|m| m.method()), Some("game/started"));
//! assert!(messages.iter().any(|m| m.method() == "game/finished"));
//! ```

mod constants;
mod error;

pub mod compiler;
pub mod engine;
pub mod evaluate;
pub mod grammar;

pub mod errors {
    pub use crate::error::*;
}

pub mod program {
    pub use crate::compiler::{
        command::*,
        declaration::*,
        program::*,
    };
}

pub mod values {
    pub use crate::evaluate::value::*;
}

pub mod messages {
    pub use crate::engine::protocol::*;
}

pub use self::{
    compiler::SparkCompiler,
    constants::SPARK_PROGRAM_VERSION,
    engine::{Game, GameBuilder},
};
