use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::GrammarCompileError;

/// A declarative grammar: an ordered repository of named rules plus the
/// root pattern list. This is the only input to the grammar compiler.
#[derive(Clone, Debug, PartialEq)]
pub struct GrammarDefinition {
    pub name: String,
    pub patterns: Vec<GrammarRule>,
    pub repository: IndexMap<String, GrammarRule>,
}

/// One rule of a grammar definition.
///
/// The JSON form is discriminated by key presence: `include` references
/// another rule, `match` is a single-pattern rule, `begin`/`end` delimit a
/// scoped rule with nested patterns active while the scope is open.
#[derive(Clone, Debug, PartialEq)]
pub enum GrammarRule {
    Include(IncludeRef),
    Match {
        pattern: String,
        captures: IndexMap<String, String>,
    },
    Scoped {
        begin: String,
        end: String,
        patterns: Vec<GrammarRule>,
        begin_captures: IndexMap<String, String>,
        end_captures: IndexMap<String, String>,
    },
}

/// Target of an `include`: a repository rule by name, the whole grammar
/// (`$self`), or the host grammar when injected (`$base`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeRef {
    Rule(String),
    Self_,
    Base,
}

impl IncludeRef {
    fn parse(reference: &str) -> Self {
        match reference {
            "$self" => IncludeRef::Self_,
            "$base" => IncludeRef::Base,
            name => IncludeRef::Rule(name.strip_prefix('#').unwrap_or(name).to_string()),
        }
    }
}

impl GrammarDefinition {
    /// Parses a JSON grammar definition, raising authoring errors for rules
    /// that are not one of the three shapes (e.g. a `begin` without `end`).
    pub fn from_json(json: &str) -> Result<Self, GrammarCompileError> {
        let raw: RawGrammar = serde_json::from_str(json).map_err(|e| {
            GrammarCompileError::InvalidPattern {
                rule: "<grammar>".to_string(),
                message: e.to_string(),
            }
        })?;
        raw.validate()
    }
}

#[derive(Debug, Deserialize)]
struct RawGrammar {
    name: String,
    #[serde(default)]
    patterns: Vec<RawRule>,
    #[serde(default)]
    repository: IndexMap<String, RawRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    include: Option<String>,
    #[serde(rename = "match")]
    match_: Option<String>,
    begin: Option<String>,
    end: Option<String>,
    #[serde(default)]
    patterns: Vec<RawRule>,
    #[serde(default)]
    captures: IndexMap<String, String>,
    #[serde(rename = "beginCaptures", default)]
    begin_captures: IndexMap<String, String>,
    #[serde(rename = "endCaptures", default)]
    end_captures: IndexMap<String, String>,
}

impl RawGrammar {
    fn validate(self) -> Result<GrammarDefinition, GrammarCompileError> {
        Ok(GrammarDefinition {
            name: self.name,
            patterns: self
                .patterns
                .into_iter()
                .map(|rule| rule.validate("<root>"))
                .collect::<Result<_, _>>()?,
            repository: self
                .repository
                .into_iter()
                .map(|(name, rule)| Ok((name.clone(), rule.validate(&name)?)))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl RawRule {
    fn validate(self, name: &str) -> Result<GrammarRule, GrammarCompileError> {
        if let Some(reference) = self.include {
            return Ok(GrammarRule::Include(IncludeRef::parse(&reference)));
        }
        if let Some(pattern) = self.match_ {
            return Ok(GrammarRule::Match {
                pattern,
                captures: self.captures,
            });
        }
        match (self.begin, self.end) {
            (Some(begin), Some(end)) => Ok(GrammarRule::Scoped {
                begin,
                end,
                patterns: self
                    .patterns
                    .into_iter()
                    .map(|rule| rule.validate(name))
                    .collect::<Result<_, _>>()?,
                begin_captures: self.begin_captures,
                end_captures: self.end_captures,
            }),
            (Some(_), None) => Err(GrammarCompileError::MissingEnd {
                rule: name.to_string(),
            }),
            (None, Some(_)) => Err(GrammarCompileError::MissingBegin {
                rule: name.to_string(),
            }),
            (None, None) => Err(GrammarCompileError::InvalidPattern {
                rule: name.to_string(),
                message: "rule must declare include, match, or begin/end".to_string(),
            }),
        }
    }
}
