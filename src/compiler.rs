//! Compiles parsed Sparkdown trees into [`SparkProgram`]s: nested blocks,
//! commands with source spans, declarations, and accumulated diagnostics.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    constants::is_reserved_keyword,
    evaluate::{EvalDiagnostic, ExpressionCompiler, Value},
    grammar::{
        CompiledGrammar, GrammarParser, GrammarToken, ParseResult, TextEdit, sparkdown_grammar,
    },
};

pub mod command;
pub mod declaration;
pub mod program;

pub use self::{
    command::{
        AssignOperator, BranchCheck, CommandData, CommandParams, CommandReference, ContentItem,
        LogSeverity,
    },
    declaration::{SparkEntity, SparkVariable},
    program::{
        ColorRange, DiagnosticSeverity, OutlineItem, SourceLocation, SparkBlock, SparkDiagnostic,
        SparkProgram,
    },
};

/// Key of the implicit top-level block that owns everything before the
/// first heading.
pub const MAIN_BLOCK: &str = "main";

/// Compiles script text into a [`SparkProgram`]. One compiler per open
/// document; compiling is synchronous, re-entrant, and never fails on
/// malformed input — problems land in `program.diagnostics`.
#[derive(Debug, Clone)]
pub struct SparkCompiler {
    parser: GrammarParser,
    expressions: ExpressionCompiler,
    file: Option<String>,
}

impl Default for SparkCompiler {
    fn default() -> Self {
        SparkCompiler::new()
    }
}

impl SparkCompiler {
    pub fn new() -> Self {
        SparkCompiler::with_grammar(sparkdown_grammar())
    }

    pub fn with_grammar(grammar: Arc<CompiledGrammar>) -> Self {
        SparkCompiler {
            parser: GrammarParser::new(grammar),
            expressions: ExpressionCompiler,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn parser(&self) -> &GrammarParser {
        &self.parser
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        self.parser.parse(text)
    }

    pub fn reparse(&self, old: &ParseResult, edit: &TextEdit, text: &str) -> ParseResult {
        self.parser.reparse(old, edit, text)
    }

    pub fn compile(&self, text: &str) -> SparkProgram {
        let parse = self.parse(text);
        self.compile_parsed(text, &parse)
    }

    /// Compiles from an existing parse, so a language server can reuse the
    /// incremental tree it already republished.
    pub fn compile_parsed(&self, text: &str, parse: &ParseResult) -> SparkProgram {
        let mut walk = Walk::new(self, text, parse);
        walk.run();
        walk.finish()
    }
}

struct OpenBranch {
    source: SourceLocation,
}

struct Walk<'a> {
    compiler: &'a SparkCompiler,
    text: &'a str,
    parse: &'a ParseResult,
    program: SparkProgram,
    /// Open heading scopes: (level, block key).
    block_stack: Vec<(usize, String)>,
    current_block: String,
    speaker: Option<String>,
    entity_context: Option<(String, usize)>,
    seen_heading: bool,
    known_vars: HashSet<String>,
    folded_vars: IndexMap<String, Value>,
    /// Open `if` chains of the current block.
    open_branches: Vec<OpenBranch>,
}

impl<'a> Walk<'a> {
    fn new(compiler: &'a SparkCompiler, text: &'a str, parse: &'a ParseResult) -> Self {
        let mut program = SparkProgram {
            file: compiler.file.clone(),
            ..SparkProgram::default()
        };
        program.blocks.insert(MAIN_BLOCK.to_string(), SparkBlock {
            name: MAIN_BLOCK.to_string(),
            level: 0,
            parent: None,
            children: Vec::new(),
            path: Vec::new(),
            source: SourceLocation::new(0, 0, text.len()),
            commands: Vec::new(),
        });
        Walk {
            compiler,
            text,
            parse,
            program,
            block_stack: vec![(0, MAIN_BLOCK.to_string())],
            current_block: MAIN_BLOCK.to_string(),
            speaker: None,
            entity_context: None,
            seen_heading: false,
            known_vars: HashSet::new(),
            folded_vars: IndexMap::new(),
            open_branches: Vec::new(),
        }
    }

    fn run(&mut self) {
        for line in 0..self.parse.line_starts.len() {
            self.compile_line(line);
        }
    }

    fn finish(mut self) -> SparkProgram {
        self.close_open_branches();
        self.program
    }

    fn node_id(&self, token: &GrammarToken) -> &'a str {
        self.parse
            .tree
            .node_set()
            .get(token.node)
            .map(|node| node.id.as_str())
            .unwrap_or("skip")
    }

    fn line_span(&self, line: usize) -> (usize, usize) {
        let start = self.parse.line_starts[line];
        let end = self
            .parse
            .line_starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        (start, end)
    }

    fn line_tokens(&self, start: usize, end: usize) -> Vec<&'a GrammarToken> {
        self.parse
            .tokens
            .iter()
            .filter(|token| token.from >= start && token.to <= end)
            .collect()
    }

    fn capture_span(
        &self,
        tokens: &[&GrammarToken],
        id: &str,
    ) -> Option<(usize, usize)> {
        tokens
            .iter()
            .find(|token| self.node_id(token) == id)
            .map(|token| (token.from, token.to))
    }

    fn capture_text(&self, tokens: &[&GrammarToken], id: &str) -> Option<&'a str> {
        self.capture_span(tokens, id)
            .map(|(from, to)| &self.text[from..to])
    }

    fn compile_line(&mut self, line: usize) {
        let (start, end) = self.line_span(line);
        let raw = &self.text[start..end];
        let indent = raw.len() - raw.trim_start_matches([' ', '\t']).len();

        // A line opened inside a block comment is inert.
        if self.in_scope(line, "block_comment") {
            return;
        }

        let tokens = self.line_tokens(start, end);
        let primary = tokens.iter().find(|token| {
            self.node_id(token) != "skip" || !self.text[token.from..token.to].trim().is_empty()
        });
        let Some(primary) = primary else {
            // Blank line: ends the current speaker run and entity fields.
            self.speaker = None;
            self.entity_context = None;
            return;
        };

        let source = SourceLocation {
            file: self.compiler.file.clone(),
            line,
            from: start,
            to: end,
        };

        match self.node_id(primary) {
            "comment" | "block_comment_begin" | "block_comment_end" => {}
            "heading" => self.compile_heading(&tokens, line, source),
            "variable" => self.compile_variable(&tokens, source),
            "entity" => self.compile_entity(&tokens, indent, source),
            "branch" => self.compile_branch(&tokens, indent, source),
            "branch_terminal" => self.compile_branch_terminal(&tokens, indent, source),
            "call" => self.compile_jump(&tokens, "call-c1", true, indent, source),
            "jump" => self.compile_jump(&tokens, "jump-c1", false, indent, source),
            "return" => {
                self.push_command(CommandParams::Return, indent, source);
            }
            "assign" => self.compile_assign(&tokens, indent, source),
            "wait" => self.compile_wait(&tokens, indent, source),
            "log" => self.compile_log(&tokens, indent, source),
            "choice" => self.compile_choice(&tokens, indent, source),
            "speaker" => {
                self.speaker = self
                    .capture_text(&tokens, "speaker-c1")
                    .map(|name| name.to_string());
                self.entity_context = None;
            }
            "metadata" if !self.seen_heading && indent == 0 && self.entity_context.is_none() => {
                self.compile_metadata(&tokens);
            }
            _ => self.compile_display_or_field(raw, start, indent, source),
        }
    }

    fn in_scope(&self, line: usize, rule_name: &str) -> bool {
        self.parse.line_stacks.get(line).is_some_and(|stack| {
            stack.last().is_some_and(|top| {
                self.compiler.parser.grammar().rule(top.rule).name() == rule_name
            })
        })
    }

    fn compile_heading(
        &mut self,
        tokens: &[&GrammarToken],
        line: usize,
        source: SourceLocation,
    ) {
        self.close_open_branches();
        self.speaker = None;
        self.entity_context = None;
        self.seen_heading = true;

        let level = self
            .capture_span(tokens, "heading-c1")
            .map(|(from, to)| to - from)
            .unwrap_or(1);
        let name = self
            .capture_text(tokens, "heading-c2")
            .unwrap_or("")
            .to_string();

        while self
            .block_stack
            .last()
            .is_some_and(|(open_level, _)| *open_level >= level)
            && self.block_stack.len() > 1
        {
            self.block_stack.pop();
        }
        let parent_key = self
            .block_stack
            .last()
            .map(|(_, key)| key.clone())
            .unwrap_or_else(|| MAIN_BLOCK.to_string());

        let parent_path = self.program.blocks[&parent_key].path.clone();
        let mut path = parent_path;
        path.push(name.clone());
        let mut key = path.join(".");
        if self.program.blocks.contains_key(&key) {
            self.diagnostic(
                DiagnosticSeverity::Warning,
                format!("duplicate section name '{name}'"),
                source.clone(),
            );
            let mut n = 2;
            while self.program.blocks.contains_key(&format!("{key} ({n})")) {
                n += 1;
            }
            key = format!("{key} ({n})");
        }

        self.program.outline.push(OutlineItem {
            name: name.clone(),
            level,
            line,
        });
        self.program.blocks.insert(key.clone(), SparkBlock {
            name,
            level,
            parent: Some(parent_key.clone()),
            children: Vec::new(),
            path,
            source,
            commands: Vec::new(),
        });
        if let Some(parent) = self.program.blocks.get_mut(&parent_key) {
            parent.children.push(key.clone());
        }
        self.block_stack.push((level, key.clone()));
        self.current_block = key;
    }

    fn compile_variable(&mut self, tokens: &[&GrammarToken], source: SourceLocation) {
        let Some(name) = self.capture_text(tokens, "variable-c1") else {
            return;
        };
        if is_reserved_keyword(name) {
            self.diagnostic(
                DiagnosticSeverity::Error,
                format!("'{name}' is a reserved keyword"),
                source,
            );
            return;
        }
        if self.program.variables.contains_key(name) {
            self.diagnostic(
                DiagnosticSeverity::Error,
                format!("variable '{name}' is already declared"),
                source,
            );
            return;
        }
        let (value_from, value_to) = self
            .capture_span(tokens, "variable-c2")
            .unwrap_or((source.to, source.to));
        let value_source = &self.text[value_from..value_to];
        let compiled = self
            .compiler
            .expressions
            .compile_checked(value_source, &self.known_vars);
        self.map_expression_diagnostics(&compiled.diagnostics, value_from, source.line);
        let value = compiled.evaluate(&self.folded_vars).value;

        self.known_vars.insert(name.to_string());
        self.folded_vars.insert(name.to_string(), value.clone());
        self.program.variables.insert(name.to_string(), SparkVariable {
            name: name.to_string(),
            type_name: value.type_name().to_string(),
            value,
            source,
        });
    }

    fn compile_entity(
        &mut self,
        tokens: &[&GrammarToken],
        indent: usize,
        source: SourceLocation,
    ) {
        let Some(name) = self.capture_text(tokens, "entity-c1") else {
            return;
        };
        if is_reserved_keyword(name) {
            self.diagnostic(
                DiagnosticSeverity::Error,
                format!("'{name}' is a reserved keyword"),
                source,
            );
            return;
        }
        let base = self
            .capture_text(tokens, "entity-c2")
            .map(|base| base.to_string());
        if let Some(base) = &base
            && !self.program.entities.contains_key(base)
        {
            self.diagnostic(
                DiagnosticSeverity::Warning,
                format!("base entity '{base}' is not declared yet"),
                source.clone(),
            );
        }
        self.entity_context = Some((name.to_string(), indent));
        self.program.entities.insert(name.to_string(), SparkEntity {
            name: name.to_string(),
            base,
            fields: IndexMap::new(),
            source,
        });
    }

    fn compile_branch(&mut self, tokens: &[&GrammarToken], indent: usize, source: SourceLocation) {
        let check = match self.capture_text(tokens, "branch-c1") {
            Some("if") => BranchCheck::If,
            Some("elseif") => BranchCheck::Elseif,
            _ => return,
        };
        let (cond_from, cond_to) = self
            .capture_span(tokens, "branch-c2")
            .unwrap_or((source.to, source.to));
        let condition = self.text[cond_from..cond_to].to_string();
        let compiled = self
            .compiler
            .expressions
            .compile_checked(&condition, &self.known_vars);
        self.map_expression_diagnostics(&compiled.diagnostics, cond_from, source.line);

        if check == BranchCheck::Elseif && self.open_branches.is_empty() {
            self.diagnostic(
                DiagnosticSeverity::Error,
                "'elseif' without a matching 'if'".to_string(),
                source.clone(),
            );
        }
        let branch_source = source.clone();
        self.push_command(CommandParams::Branch { check, condition }, indent, source);
        if check == BranchCheck::If {
            self.open_branches.push(OpenBranch {
                source: branch_source,
            });
        }
    }

    fn compile_branch_terminal(
        &mut self,
        tokens: &[&GrammarToken],
        indent: usize,
        source: SourceLocation,
    ) {
        let check = match self.capture_text(tokens, "branch_terminal-c1") {
            Some("else") => BranchCheck::Else,
            Some("end") => BranchCheck::End,
            _ => return,
        };
        if self.open_branches.is_empty() {
            self.diagnostic(
                DiagnosticSeverity::Error,
                format!(
                    "'{}' without a matching 'if'",
                    if check == BranchCheck::Else { "else" } else { "end" }
                ),
                source.clone(),
            );
        } else if check == BranchCheck::End {
            self.open_branches.pop();
        }
        self.push_command(
            CommandParams::Branch {
                check,
                condition: String::new(),
            },
            indent,
            source,
        );
    }

    fn compile_jump(
        &mut self,
        tokens: &[&GrammarToken],
        capture: &str,
        return_when_finished: bool,
        indent: usize,
        source: SourceLocation,
    ) {
        let value = self.capture_text(tokens, capture).unwrap_or("").to_string();
        self.push_command(
            CommandParams::Jump {
                value,
                return_when_finished,
            },
            indent,
            source,
        );
    }

    fn compile_assign(&mut self, tokens: &[&GrammarToken], indent: usize, source: SourceLocation) {
        let Some(variable) = self.capture_text(tokens, "assign-c1") else {
            return;
        };
        let operator = match self.capture_text(tokens, "assign-c2") {
            Some("=") => AssignOperator::Assign,
            Some("+=") => AssignOperator::Add,
            Some("-=") => AssignOperator::Subtract,
            Some("*=") => AssignOperator::Multiply,
            Some("/=") => AssignOperator::Divide,
            _ => return,
        };
        if !self.known_vars.contains(variable) {
            self.diagnostic(
                DiagnosticSeverity::Error,
                format!("Variable '{variable}' was not found"),
                source.clone(),
            );
        }
        let (value_from, value_to) = self
            .capture_span(tokens, "assign-c3")
            .unwrap_or((source.to, source.to));
        let value = self.text[value_from..value_to].to_string();
        let compiled = self
            .compiler
            .expressions
            .compile_checked(&value, &self.known_vars);
        self.map_expression_diagnostics(&compiled.diagnostics, value_from, source.line);
        self.push_command(
            CommandParams::Assign {
                variable: variable.to_string(),
                operator,
                value,
            },
            indent,
            source,
        );
    }

    fn compile_wait(&mut self, tokens: &[&GrammarToken], indent: usize, source: SourceLocation) {
        let (from, to) = self
            .capture_span(tokens, "wait-c1")
            .unwrap_or((source.to, source.to));
        let seconds = self.text[from..to].to_string();
        let compiled = self
            .compiler
            .expressions
            .compile_checked(&seconds, &self.known_vars);
        self.map_expression_diagnostics(&compiled.diagnostics, from, source.line);
        self.push_command(CommandParams::Wait { seconds }, indent, source);
    }

    fn compile_log(&mut self, tokens: &[&GrammarToken], indent: usize, source: SourceLocation) {
        let severity = match self.capture_text(tokens, "log-c1") {
            Some("warn") => LogSeverity::Warning,
            Some("error") => LogSeverity::Error,
            _ => LogSeverity::Info,
        };
        let message = unescape(self.capture_text(tokens, "log-c2").unwrap_or(""));
        self.push_command(CommandParams::Log { severity, message }, indent, source);
    }

    fn compile_choice(&mut self, tokens: &[&GrammarToken], indent: usize, source: SourceLocation) {
        let (text_from, text_to) = self
            .capture_span(tokens, "choice-c1")
            .unwrap_or((source.from, source.from));
        let target = self
            .capture_text(tokens, "choice-c2")
            .unwrap_or("")
            .to_string();
        let text = self.text;
        let content = self.compile_content(&text[text_from..text_to], text_from, source.line);
        self.push_command(CommandParams::Choice { content, target }, indent, source);
    }

    fn compile_metadata(&mut self, tokens: &[&GrammarToken]) {
        let Some(key) = self.capture_text(tokens, "metadata-c1") else {
            return;
        };
        let (value_from, value_to) = self
            .capture_span(tokens, "metadata-c2")
            .unwrap_or((0, 0));
        let value = &self.text[value_from..value_to];
        self.find_colors(value, value_from);
        self.program
            .metadata
            .insert(key.to_string(), value.to_string());
    }

    fn compile_display_or_field(
        &mut self,
        raw: &str,
        start: usize,
        indent: usize,
        source: SourceLocation,
    ) {
        // An indented `key: value` line directly after an entity declares a
        // field on it.
        if let Some((entity, entity_indent)) = self.entity_context.clone()
            && indent > entity_indent
            && let Some((key, value)) = split_field(raw)
        {
            let value_offset = start + (value.as_ptr() as usize - raw.as_ptr() as usize);
            self.find_colors(value, value_offset);
            if let Some(entry) = self.program.entities.get_mut(&entity) {
                entry.fields.insert(key.to_string(), value.to_string());
            }
            return;
        }
        self.entity_context = None;

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        let text_offset = start + (raw.len() - raw.trim_start().len());
        let content = self.compile_content(raw.trim(), text_offset, source.line);
        let character = self.speaker.clone();
        self.push_command(CommandParams::Display { character, content }, indent, source);
    }

    /// Splits display text into literal runs and `{expression}` spans,
    /// compiling each expression for diagnostics.
    fn compile_content(&mut self, text: &str, offset: usize, line: usize) -> Vec<ContentItem> {
        let mut items = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();
        while let Some((at, c)) = chars.next() {
            if c != '{' {
                literal.push(c);
                continue;
            }
            let expr_start = at + 1;
            let mut expr_end = None;
            for (close_at, close) in chars.by_ref() {
                if close == '}' {
                    expr_end = Some(close_at);
                    break;
                }
            }
            match expr_end {
                Some(end) => {
                    if !literal.is_empty() {
                        items.push(ContentItem::Text {
                            text: std::mem::take(&mut literal),
                        });
                    }
                    let expression = text[expr_start..end].to_string();
                    let compiled = self
                        .compiler
                        .expressions
                        .compile_checked(&expression, &self.known_vars);
                    self.map_expression_diagnostics(
                        &compiled.diagnostics,
                        offset + expr_start,
                        line,
                    );
                    items.push(ContentItem::Interpolation { expression });
                }
                None => {
                    self.diagnostic(
                        DiagnosticSeverity::Warning,
                        "unterminated interpolation".to_string(),
                        SourceLocation {
                            file: self.compiler.file.clone(),
                            line,
                            from: offset + at,
                            to: offset + text.len(),
                        },
                    );
                    literal.push('{');
                    literal.push_str(&text[expr_start..]);
                }
            }
        }
        if !literal.is_empty() {
            items.push(ContentItem::Text { text: literal });
        }
        items
    }

    fn push_command(
        &mut self,
        params: CommandParams,
        indent: usize,
        source: SourceLocation,
    ) -> usize {
        let block = self
            .program
            .blocks
            .get_mut(&self.current_block)
            .expect("current block exists");
        let index = block.commands.len();
        block.commands.push(CommandData {
            reference: CommandReference {
                type_id: params.type_id().to_string(),
                id: format!("{}.{index}", self.current_block),
                parent_id: self.current_block.clone(),
                index,
            },
            source,
            indent,
            params,
        });
        index
    }

    fn close_open_branches(&mut self) {
        let open = std::mem::take(&mut self.open_branches);
        for branch in open {
            self.diagnostic(
                DiagnosticSeverity::Error,
                "'if' without a matching 'end'".to_string(),
                branch.source,
            );
        }
    }

    fn map_expression_diagnostics(
        &mut self,
        diagnostics: &[EvalDiagnostic],
        offset: usize,
        line: usize,
    ) {
        for diagnostic in diagnostics {
            self.diagnostic(
                DiagnosticSeverity::Error,
                diagnostic.message(),
                SourceLocation {
                    file: self.compiler.file.clone(),
                    line,
                    from: offset + diagnostic.pos,
                    to: offset + diagnostic.pos,
                },
            );
        }
    }

    fn diagnostic(&mut self, severity: DiagnosticSeverity, message: String, source: SourceLocation) {
        self.program.diagnostics.push(SparkDiagnostic {
            severity,
            message,
            source,
        });
    }

    /// Records `#rrggbb` / `#rgb` literals for editor color decorations.
    fn find_colors(&mut self, text: &str, offset: usize) {
        let bytes = text.as_bytes();
        let mut at = 0;
        while at < bytes.len() {
            if bytes[at] == b'#' {
                let digits = bytes[at + 1..]
                    .iter()
                    .take_while(|byte| byte.is_ascii_hexdigit())
                    .count();
                if digits == 6 || digits == 3 {
                    self.program.color_ranges.push(ColorRange {
                        color: text[at..at + 1 + digits].to_string(),
                        from: offset + at,
                        to: offset + at + 1 + digits,
                    });
                    at += 1 + digits;
                    continue;
                }
            }
            at += 1;
        }
    }
}

fn split_field(raw: &str) -> Option<(&str, &str)> {
    let trimmed = raw.trim();
    let (key, value) = trimmed.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((key, value.trim()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
