//! Declarative grammars, their compiled rule tables, and the scope-stack
//! tokenizer that turns script text into shareable tree buffers.

pub mod builtin;
pub mod compiler;
pub mod definition;
pub mod matcher;
pub mod parser;
pub mod tree;

pub use self::{
    builtin::{sparkdown_definition, sparkdown_grammar},
    compiler::{CompiledGrammar, CompiledRule, GrammarCompiler},
    definition::{GrammarDefinition, GrammarRule, IncludeRef},
    matcher::{Matcher, PatternMatch},
    parser::{
        GrammarParser, GrammarStackElement, GrammarToken, ParseResult, TextEdit, stack_equivalent,
    },
    tree::{Node, NodeKind, NodeProps, NodeSet, Side, TreeBuffer, TreeRecord, check_side},
};
