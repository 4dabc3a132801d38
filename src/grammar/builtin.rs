use std::sync::Arc;

use super::{
    compiler::{CompiledGrammar, GrammarCompiler},
    definition::GrammarDefinition,
};

const SPARKDOWN_GRAMMAR_JSON: &str = include_str!("sparkdown.json");

/// The grammar definition for the Sparkdown screenplay language.
pub fn sparkdown_definition() -> GrammarDefinition {
    GrammarDefinition::from_json(SPARKDOWN_GRAMMAR_JSON).expect("builtin grammar is valid")
}

/// Compiles the builtin Sparkdown grammar.
pub fn sparkdown_grammar() -> Arc<CompiledGrammar> {
    Arc::new(
        GrammarCompiler
            .compile(&sparkdown_definition())
            .expect("builtin grammar compiles"),
    )
}
