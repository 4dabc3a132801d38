use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::GrammarCompileError;

use super::{
    definition::{GrammarDefinition, GrammarRule, IncludeRef},
    matcher::Matcher,
    tree::{NodeKind, NodeProps, NodeSet},
};

/// One capture of a compiled pattern: regex group -> node type.
#[derive(Debug, Clone)]
pub struct CaptureSlot {
    pub group: usize,
    pub node: usize,
}

#[derive(Debug)]
pub enum CompiledRule {
    Match {
        name: String,
        node: usize,
        matcher: Matcher,
        captures: Vec<CaptureSlot>,
    },
    Scoped {
        name: String,
        node: usize,
        begin_node: usize,
        end_node: usize,
        begin: Matcher,
        end: Matcher,
        begin_captures: Vec<CaptureSlot>,
        end_captures: Vec<CaptureSlot>,
        /// Active rules while the scope is open, includes pre-expanded.
        patterns: Vec<usize>,
    },
}

impl CompiledRule {
    pub fn name(&self) -> &str {
        match self {
            CompiledRule::Match { name, .. } | CompiledRule::Scoped { name, .. } => name,
        }
    }
}

/// The immutable, executable form of a grammar: a flat rule table, the
/// pre-expanded root rule list, and the node-type registry. Built once,
/// shared by reference, never mutated afterwards.
#[derive(Debug)]
pub struct CompiledGrammar {
    pub name: String,
    rules: Vec<CompiledRule>,
    root: Vec<usize>,
    nodes: Arc<NodeSet>,
}

impl CompiledGrammar {
    pub fn rule(&self, index: usize) -> &CompiledRule {
        &self.rules[index]
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn root(&self) -> &[usize] {
        &self.root
    }

    pub fn nodes(&self) -> &Arc<NodeSet> {
        &self.nodes
    }

    pub fn rule_named(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.name() == name)
    }
}

/// Compiles a [`GrammarDefinition`] into a [`CompiledGrammar`], assigning
/// each distinct (rule, variant) a stable numeric node identity: one for a
/// match rule, three for a scoped rule, one per declared capture.
#[derive(Debug, Default)]
pub struct GrammarCompiler;

impl GrammarCompiler {
    pub fn compile(
        &self,
        definition: &GrammarDefinition,
    ) -> Result<CompiledGrammar, GrammarCompileError> {
        let mut state = CompileState {
            nodes: NodeSet::new(),
            rules: Vec::new(),
            by_name: IndexMap::new(),
        };

        // First pass: every concrete repository rule gets its table slot in
        // declaration order, so node identities are stable across runs.
        for (name, rule) in &definition.repository {
            match rule {
                GrammarRule::Include(_) => {}
                concrete => {
                    let index = state.compile_rule(name, concrete)?;
                    state.by_name.insert(name.clone(), index);
                }
            }
        }

        // Second pass: expand include references now that every name has a
        // slot. Root first so `$self` has a meaning inside nested patterns.
        let root = state.resolve_patterns(definition, &definition.patterns, "<root>", None)?;
        for (name, rule) in &definition.repository {
            if let GrammarRule::Scoped { patterns, .. } = rule {
                let resolved = state.resolve_patterns(definition, patterns, name, Some(&root))?;
                let index = state.by_name[name];
                if let CompiledRule::Scoped { patterns, .. } = &mut state.rules[index] {
                    *patterns = resolved;
                }
            }
        }

        Ok(CompiledGrammar {
            name: definition.name.clone(),
            rules: state.rules,
            root,
            nodes: Arc::new(state.nodes),
        })
    }
}

struct CompileState {
    nodes: NodeSet,
    rules: Vec<CompiledRule>,
    by_name: IndexMap<String, usize>,
}

impl CompileState {
    fn compile_rule(&mut self, name: &str, rule: &GrammarRule) -> Result<usize, GrammarCompileError> {
        match rule {
            GrammarRule::Match { pattern, captures } => {
                let matcher = Matcher::compile(name, pattern)?;
                let node = self.nodes.add(name, NodeProps::default());
                let captures = self.compile_captures(name, &matcher, captures)?;
                self.rules.push(CompiledRule::Match {
                    name: name.to_string(),
                    node,
                    matcher,
                    captures,
                });
                Ok(self.rules.len() - 1)
            }
            GrammarRule::Scoped {
                begin,
                end,
                begin_captures,
                end_captures,
                ..
            } => {
                let begin_matcher = Matcher::compile(name, begin)?;
                let end_matcher = Matcher::compile(name, end)?;
                let node = self.nodes.add(name, NodeProps::default());
                let begin_node = self.nodes.add(format!("{name}_begin"), NodeProps {
                    kind: NodeKind::ScopeBegin,
                    tag: None,
                });
                let end_node = self.nodes.add(format!("{name}_end"), NodeProps {
                    kind: NodeKind::ScopeEnd,
                    tag: None,
                });
                let begin_captures = self.compile_captures(name, &begin_matcher, begin_captures)?;
                let end_captures = self.compile_captures(name, &end_matcher, end_captures)?;
                self.rules.push(CompiledRule::Scoped {
                    name: name.to_string(),
                    node,
                    begin_node,
                    end_node,
                    begin: begin_matcher,
                    end: end_matcher,
                    begin_captures,
                    end_captures,
                    patterns: Vec::new(),
                });
                Ok(self.rules.len() - 1)
            }
            GrammarRule::Include(_) => Err(GrammarCompileError::InvalidPattern {
                rule: name.to_string(),
                message: "include rules have no table slot".to_string(),
            }),
        }
    }

    fn compile_captures(
        &mut self,
        rule: &str,
        matcher: &Matcher,
        captures: &IndexMap<String, String>,
    ) -> Result<Vec<CaptureSlot>, GrammarCompileError> {
        let mut slots = Vec::with_capacity(captures.len());
        for (group, tag) in captures {
            let group: usize = group.parse().map_err(|_| GrammarCompileError::UnknownCapture {
                rule: rule.to_string(),
                capture: group.clone(),
            })?;
            if group == 0 || group > matcher.group_count() {
                return Err(GrammarCompileError::UnknownCapture {
                    rule: rule.to_string(),
                    capture: group.to_string(),
                });
            }
            let node = self.nodes.add(format!("{rule}-c{group}"), NodeProps {
                kind: NodeKind::Capture,
                tag: Some(tag.clone()),
            });
            slots.push(CaptureSlot { group, node });
        }
        Ok(slots)
    }

    /// Expands a pattern list into an ordered list of rule-table indices.
    /// Include references are followed transitively; a visited set guards
    /// against cycles, so a self-referential include contributes each rule
    /// at most once.
    fn resolve_patterns(
        &mut self,
        definition: &GrammarDefinition,
        patterns: &[GrammarRule],
        owner: &str,
        root: Option<&[usize]>,
    ) -> Result<Vec<usize>, GrammarCompileError> {
        let mut resolved = Vec::new();
        let mut visited = Vec::new();
        self.resolve_into(definition, patterns, owner, root, &mut visited, &mut resolved)?;
        Ok(resolved)
    }

    fn resolve_into(
        &mut self,
        definition: &GrammarDefinition,
        patterns: &[GrammarRule],
        owner: &str,
        root: Option<&[usize]>,
        visited: &mut Vec<String>,
        resolved: &mut Vec<usize>,
    ) -> Result<(), GrammarCompileError> {
        for (position, rule) in patterns.iter().enumerate() {
            match rule {
                GrammarRule::Include(IncludeRef::Rule(name)) => {
                    if visited.iter().any(|seen| seen == name) {
                        continue;
                    }
                    visited.push(name.clone());
                    match self.by_name.get(name) {
                        Some(index) => resolved.push(*index),
                        None => match definition.repository.get(name) {
                            // An alias: a repository entry that is itself an
                            // include. Follow it.
                            Some(alias @ GrammarRule::Include(_)) => {
                                self.resolve_into(
                                    definition,
                                    std::slice::from_ref(alias),
                                    owner,
                                    root,
                                    visited,
                                    resolved,
                                )?;
                            }
                            _ => {
                                return Err(GrammarCompileError::UnknownInclude {
                                    rule: owner.to_string(),
                                    include: name.clone(),
                                });
                            }
                        },
                    }
                }
                GrammarRule::Include(IncludeRef::Self_) => match root {
                    Some(root) => resolved.extend_from_slice(root),
                    // Resolving the root list itself: `$self` is the list
                    // under construction, so the includes around it already
                    // cover it.
                    None => {}
                },
                GrammarRule::Include(IncludeRef::Base) => {
                    return Err(GrammarCompileError::BaseOutsideInjection);
                }
                concrete => {
                    // Inline anonymous rule; named after its position.
                    let index = self.compile_rule(&format!("{owner}.{position}"), concrete)?;
                    resolved.push(index);
                }
            }
        }
        Ok(())
    }
}
