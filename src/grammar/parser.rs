use std::sync::Arc;

use super::{
    compiler::{CaptureSlot, CompiledGrammar, CompiledRule},
    matcher::{Matcher, PatternMatch},
    tree::{DOCUMENT_NODE, NodeKind, SKIP_NODE, Side, TreeBuffer, TreeRecord, check_side},
};

/// One emitted token. `open`/`close` carry the rule-table index of the
/// scoped rule being opened or closed.
#[derive(Clone, Debug, PartialEq)]
pub struct GrammarToken {
    pub node: usize,
    pub from: usize,
    pub to: usize,
    pub open: Option<usize>,
    pub close: Option<usize>,
}

/// One open scope. Equivalence over `node`, `expected_end`, and the full
/// `rules` sequence is the reuse key for incremental parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct GrammarStackElement {
    pub rule: usize,
    pub node: usize,
    pub expected_end: String,
    pub rules: Vec<usize>,
}

/// True only if both stacks have the same open scopes with the same
/// expected ends and identical active-rule sequences. A pure value
/// comparison: nothing is shared or mutated, so reuse decisions are
/// deterministic and race-free.
pub fn stack_equivalent(a: &[GrammarStackElement], b: &[GrammarStackElement]) -> bool {
    a == b
}

/// A single text change, in pre-edit byte offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct TextEdit {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl TextEdit {
    /// Offset delta this edit applies to everything after it.
    pub fn delta(&self) -> isize {
        self.insert.len() as isize - (self.to - self.from) as isize
    }
}

/// The output of one parse: the token stream, per-line scope-stack
/// snapshots (the incremental-reuse anchors), and the assembled tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub tokens: Vec<GrammarToken>,
    pub line_starts: Vec<usize>,
    pub line_stacks: Vec<Vec<GrammarStackElement>>,
    pub tree: TreeBuffer,
    pub length: usize,
}

impl ParseResult {
    /// Tokens that partition the text: everything except capture tokens,
    /// whose spans nest inside their owning token.
    pub fn leaf_tokens(&self) -> impl Iterator<Item = &GrammarToken> + '_ {
        let nodes = self.tree.node_set();
        self.tokens.iter().filter(move |token| {
            nodes
                .get(token.node)
                .is_none_or(|node| node.props.kind != NodeKind::Capture)
        })
    }

    /// Indices of tokens touched by the edit range, via the side predicate.
    pub fn touched_tokens(&self, edit: &TextEdit) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| {
                check_side(Side::Around, edit.from, token.from, token.to)
                    || check_side(Side::Around, edit.to, token.from, token.to)
                    || (token.from >= edit.from && token.to <= edit.to)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

/// Runs a compiled grammar over text: maintains the scope stack, emits
/// tokens, and assembles them into a [`TreeBuffer`]. Holds no per-parse
/// state, so one parser is safely shared across documents.
#[derive(Debug, Clone)]
pub struct GrammarParser {
    grammar: Arc<CompiledGrammar>,
}

impl GrammarParser {
    pub fn new(grammar: Arc<CompiledGrammar>) -> Self {
        GrammarParser { grammar }
    }

    pub fn grammar(&self) -> &Arc<CompiledGrammar> {
        &self.grammar
    }

    /// Full parse of `text`.
    pub fn parse(&self, text: &str) -> ParseResult {
        let line_starts = line_starts(text);
        let mut tokens = Vec::new();
        let mut line_stacks = Vec::with_capacity(line_starts.len());
        let mut stack: Vec<GrammarStackElement> = Vec::new();

        for (index, &start) in line_starts.iter().enumerate() {
            line_stacks.push(stack.clone());
            self.tokenize_line(text, start, line_end(&line_starts, index, text), &mut stack, &mut tokens);
            push_newline_token(&line_starts, index, text, &mut tokens);
        }

        let tree = build_tree(&tokens, &self.grammar, text.len());
        ParseResult {
            tokens,
            line_starts,
            line_stacks,
            tree,
            length: text.len(),
        }
    }

    /// Incremental reparse of `text` (the post-edit contents) against a
    /// previous result. Lines before the edit are reused verbatim; lines
    /// after it are reused once the scope stack is `stack_equivalent` to
    /// the old snapshot at the same boundary, shifted by the edit's byte
    /// delta. A failed comparison simply retokenizes the line.
    pub fn reparse(&self, old: &ParseResult, edit: &TextEdit, text: &str) -> ParseResult {
        let new_line_starts = line_starts(text);
        let delta = edit.delta();

        // First line touched by the edit, located through the tokens the
        // edit range touches.
        let dirty_pos = old
            .touched_tokens(edit)
            .first()
            .map(|&index| old.tokens[index].from.min(edit.from))
            .unwrap_or(edit.from);
        let dirty_line = line_of(&old.line_starts, dirty_pos.min(old.length));

        if dirty_line >= new_line_starts.len()
            || old.line_starts[dirty_line] != new_line_starts[dirty_line]
        {
            return self.parse(text);
        }
        let dirty_start = new_line_starts[dirty_line];
        let line_delta = new_line_starts.len() as isize - old.line_starts.len() as isize;
        let edit_end_new = (edit.to as isize + delta) as usize;

        // Zero-width tokens sitting exactly at the boundary belong to the
        // dirty line and will be re-emitted.
        let mut tokens: Vec<GrammarToken> = old
            .tokens
            .iter()
            .take_while(|token| token.to < dirty_start || (token.to == dirty_start && token.from < dirty_start))
            .cloned()
            .collect();
        let mut line_stacks: Vec<Vec<GrammarStackElement>> =
            old.line_stacks[..=dirty_line].to_vec();
        let mut stack = old.line_stacks[dirty_line].clone();

        let mut line = dirty_line;
        while line < new_line_starts.len() {
            let start = new_line_starts[line];
            self.tokenize_line(text, start, line_end(&new_line_starts, line, text), &mut stack, &mut tokens);
            push_newline_token(&new_line_starts, line, text, &mut tokens);
            line += 1;

            // Try to splice the untouched tail back in.
            if line < new_line_starts.len() && new_line_starts[line] > edit_end_new {
                let old_line = line as isize - line_delta;
                if old_line > 0
                    && (old_line as usize) < old.line_starts.len()
                    && stack_equivalent(&stack, &old.line_stacks[old_line as usize])
                {
                    let old_line = old_line as usize;
                    let old_start = old.line_starts[old_line];
                    tokens.extend(
                        old.tokens
                            .iter()
                            .filter(|token| token.from >= old_start)
                            .map(|token| GrammarToken {
                                node: token.node,
                                from: (token.from as isize + delta) as usize,
                                to: (token.to as isize + delta) as usize,
                                open: token.open,
                                close: token.close,
                            }),
                    );
                    line_stacks.extend(old.line_stacks[old_line..].iter().cloned());
                    let tree = build_tree(&tokens, &self.grammar, text.len());
                    return ParseResult {
                        tokens,
                        line_starts: new_line_starts,
                        line_stacks,
                        tree,
                        length: text.len(),
                    };
                }
            }
            if line < new_line_starts.len() {
                line_stacks.push(stack.clone());
            }
        }

        let tree = build_tree(&tokens, &self.grammar, text.len());
        ParseResult {
            tokens,
            line_starts: new_line_starts,
            line_stacks,
            tree,
            length: text.len(),
        }
    }

    /// Tokenizes one line (`start..end`, newline excluded).
    ///
    /// At every position the innermost scope's end pattern is evaluated
    /// first, then the active rules in declaration order; the first rule
    /// that matches wins regardless of match length. A position no rule
    /// matches emits a one-character skip token, so the loop always
    /// advances: every push consumes input and only pops may be
    /// zero-width.
    fn tokenize_line(
        &self,
        text: &str,
        start: usize,
        end: usize,
        stack: &mut Vec<GrammarStackElement>,
        tokens: &mut Vec<GrammarToken>,
    ) {
        let line = &text[start..end];
        let mut pos = start;

        loop {
            if pos >= end {
                // Zero-width end patterns (e.g. `$`) may still close
                // scopes once the line is exhausted.
                while let Some(rule) = stack.last().map(|top| top.rule) {
                    if self.try_close(rule, line, start, pos, tokens).is_some() {
                        stack.pop();
                    } else {
                        break;
                    }
                }
                break;
            }

            if let Some(rule) = stack.last().map(|top| top.rule)
                && let Some(closed_at) = self.try_close(rule, line, start, pos, tokens)
            {
                stack.pop();
                pos = closed_at.max(pos);
                continue;
            }

            let active: &[usize] = match stack.last() {
                Some(top) => &top.rules,
                None => self.grammar.root(),
            };

            let mut advanced = None;
            for &rule_index in active {
                match self.grammar.rule(rule_index) {
                    CompiledRule::Match {
                        node,
                        matcher,
                        captures,
                        ..
                    } => {
                        if let Some(found) = match_in_line(matcher, line, start, pos)
                            && found.to > pos
                        {
                            emit_match(tokens, *node, &found, captures, None, None);
                            advanced = Some((found.to, None));
                            break;
                        }
                    }
                    CompiledRule::Scoped {
                        node,
                        begin_node,
                        begin,
                        end: end_matcher,
                        begin_captures,
                        patterns,
                        ..
                    } => {
                        if let Some(found) = match_in_line(begin, line, start, pos)
                            && found.to > pos
                        {
                            emit_match(
                                tokens,
                                *begin_node,
                                &found,
                                begin_captures,
                                Some(rule_index),
                                None,
                            );
                            let element = GrammarStackElement {
                                rule: rule_index,
                                node: *node,
                                expected_end: end_matcher.source().to_string(),
                                rules: patterns.clone(),
                            };
                            advanced = Some((found.to, Some(element)));
                            break;
                        }
                    }
                }
            }

            match advanced {
                Some((to, element)) => {
                    if let Some(element) = element {
                        stack.push(element);
                    }
                    pos = to;
                }
                None => {
                    let next = next_char_boundary(text, pos, end);
                    tokens.push(GrammarToken {
                        node: SKIP_NODE,
                        from: pos,
                        to: next,
                        open: None,
                        close: None,
                    });
                    pos = next;
                }
            }
        }
    }

    /// Tries the scope's end pattern at `pos`; on success emits the end
    /// token (plus captures) and returns the position after the match.
    fn try_close(
        &self,
        rule: usize,
        line: &str,
        start: usize,
        pos: usize,
        tokens: &mut Vec<GrammarToken>,
    ) -> Option<usize> {
        if let CompiledRule::Scoped {
            end,
            end_node,
            end_captures,
            ..
        } = self.grammar.rule(rule)
        {
            let found = match_in_line(end, line, start, pos)?;
            emit_match(tokens, *end_node, &found, end_captures, None, Some(rule));
            Some(found.to)
        } else {
            None
        }
    }
}

/// Anchored match within a single line, reported in absolute offsets.
fn match_in_line(
    matcher: &Matcher,
    line: &str,
    line_start: usize,
    pos: usize,
) -> Option<PatternMatch> {
    let found = matcher.match_at(line, pos - line_start)?;
    Some(PatternMatch {
        from: found.from + line_start,
        to: found.to + line_start,
        captures: found
            .captures
            .iter()
            .map(|span| span.map(|(from, to)| (from + line_start, to + line_start)))
            .collect(),
    })
}

fn emit_match(
    tokens: &mut Vec<GrammarToken>,
    node: usize,
    found: &PatternMatch,
    captures: &[CaptureSlot],
    open: Option<usize>,
    close: Option<usize>,
) {
    tokens.push(GrammarToken {
        node,
        from: found.from,
        to: found.to,
        open,
        close,
    });
    for slot in captures {
        if let Some(Some((from, to))) = found.captures.get(slot.group - 1) {
            tokens.push(GrammarToken {
                node: slot.node,
                from: *from,
                to: *to,
                open: None,
                close: None,
            });
        }
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (offset, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(offset + 1);
        }
    }
    starts
}

fn line_end(line_starts: &[usize], index: usize, text: &str) -> usize {
    line_starts
        .get(index + 1)
        .map(|next| next - 1)
        .unwrap_or(text.len())
}

fn push_newline_token(
    line_starts: &[usize],
    index: usize,
    text: &str,
    tokens: &mut Vec<GrammarToken>,
) {
    let end = line_end(line_starts, index, text);
    if end < text.len() {
        tokens.push(GrammarToken {
            node: SKIP_NODE,
            from: end,
            to: end + 1,
            open: None,
            close: None,
        });
    }
}

fn line_of(line_starts: &[usize], pos: usize) -> usize {
    match line_starts.binary_search(&pos) {
        Ok(line) => line,
        Err(insert) => insert - 1,
    }
}

fn next_char_boundary(text: &str, pos: usize, end: usize) -> usize {
    let mut next = pos + 1;
    while next < end && !text.is_char_boundary(next) {
        next += 1;
    }
    next.min(end)
}

/// Assembles a token stream into a pre-order tree buffer. Scope-opening
/// tokens start a parent record; capture tokens nest inside the token they
/// were captured from; everything else is a leaf under the innermost open
/// scope.
pub(crate) fn build_tree(
    tokens: &[GrammarToken],
    grammar: &CompiledGrammar,
    length: usize,
) -> TreeBuffer {
    let nodes = grammar.nodes().clone();
    let mut records = vec![TreeRecord {
        node: DOCUMENT_NODE,
        from: 0,
        to: length,
        child_count: 0,
    }];
    let mut frames: Vec<usize> = vec![0];
    let mut capture_owner: Option<usize> = None;

    for token in tokens {
        let is_capture = nodes
            .get(token.node)
            .is_some_and(|node| node.props.kind == NodeKind::Capture);

        if is_capture {
            // Captures follow the token they were captured from and nest
            // inside its span.
            if let Some(owner) = capture_owner {
                records[owner].child_count += 1;
                records.push(TreeRecord {
                    node: token.node,
                    from: token.from,
                    to: token.to,
                    child_count: 0,
                });
            }
            continue;
        }

        if token.close.is_some() {
            let frame = *frames.last().unwrap_or(&0);
            records[frame].child_count += 1;
            records.push(TreeRecord {
                node: token.node,
                from: token.from,
                to: token.to,
                child_count: 0,
            });
            capture_owner = Some(records.len() - 1);
            if frames.len() > 1 {
                records[frame].to = token.to;
                frames.pop();
            }
            continue;
        }

        if let Some(rule) = token.open {
            let scope_node = match grammar.rule(rule) {
                CompiledRule::Scoped { node, .. } => *node,
                CompiledRule::Match { node, .. } => *node,
            };
            let parent = *frames.last().unwrap_or(&0);
            records[parent].child_count += 1;
            // The scope record; its end offset is patched on close.
            records.push(TreeRecord {
                node: scope_node,
                from: token.from,
                to: token.to,
                child_count: 1,
            });
            frames.push(records.len() - 1);
            records.push(TreeRecord {
                node: token.node,
                from: token.from,
                to: token.to,
                child_count: 0,
            });
            capture_owner = Some(records.len() - 1);
            continue;
        }

        let parent = *frames.last().unwrap_or(&0);
        records[parent].child_count += 1;
        records.push(TreeRecord {
            node: token.node,
            from: token.from,
            to: token.to,
            child_count: 0,
        });
        capture_owner = Some(records.len() - 1);
    }

    // Unterminated scopes extend to the end of the text.
    for &frame in frames.iter().skip(1) {
        records[frame].to = length;
    }

    TreeBuffer::from_records(records, nodes, length)
}
