use regex::Regex;

use crate::error::GrammarCompileError;

/// A compiled pattern that can be tested against a string at a byte offset.
///
/// Matches are anchored: a match that starts anywhere past `at` is treated
/// as no match at all, which keeps "first rule in declaration order wins"
/// independent of how far away each rule could match.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    source: String,
}

/// A successful anchored match, with one span per regex capture group.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub from: usize,
    pub to: usize,
    pub captures: Vec<Option<(usize, usize)>>,
}

impl Matcher {
    pub fn compile(rule: &str, pattern: &str) -> Result<Self, GrammarCompileError> {
        let regex = Regex::new(pattern).map_err(|e| GrammarCompileError::InvalidPattern {
            rule: rule.to_string(),
            message: e.to_string(),
        })?;
        Ok(Matcher {
            regex,
            source: pattern.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of capture groups, excluding the whole-match group 0.
    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    pub fn test(&self, text: &str, at: usize) -> bool {
        self.match_at(text, at).is_some()
    }

    /// Matches anchored at `at`, returning capture spans in absolute offsets.
    pub fn match_at(&self, text: &str, at: usize) -> Option<PatternMatch> {
        let captures = self.regex.captures_at(text, at)?;
        let whole = captures.get(0)?;
        if whole.start() != at {
            return None;
        }
        Some(PatternMatch {
            from: whole.start(),
            to: whole.end(),
            captures: (1..captures.len())
                .map(|i| captures.get(i).map(|group| (group.start(), group.end())))
                .collect(),
        })
    }

    /// First match at or after `from`, unanchored. Used to scan ahead for a
    /// scope's expected end.
    pub fn find_from(&self, text: &str, from: usize) -> Option<(usize, usize)> {
        self.regex
            .find_at(text, from)
            .map(|found| (found.start(), found.end()))
    }
}
