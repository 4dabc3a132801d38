use std::collections::HashMap;

use crate::compiler::{CommandData, SparkBlock, SparkProgram};

/// Arena view of a program's block hierarchy: every name-string reference
/// is resolved into indices once, when the runtime takes the program, so
/// jumps never re-resolve strings.
#[derive(Debug, Default, Clone)]
pub struct BlockMap {
    keys: Vec<String>,
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    by_key: HashMap<String, usize>,
}

impl BlockMap {
    pub fn new(program: &SparkProgram) -> Self {
        let keys: Vec<String> = program.blocks.keys().cloned().collect();
        let by_key: HashMap<String, usize> = keys
            .iter()
            .enumerate()
            .map(|(index, key)| (key.clone(), index))
            .collect();
        let mut names = Vec::with_capacity(keys.len());
        let mut parents = Vec::with_capacity(keys.len());
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); keys.len()];
        for (index, block) in program.blocks.values().enumerate() {
            names.push(block.name.clone());
            parents.push(
                block
                    .parent
                    .as_ref()
                    .and_then(|parent| by_key.get(parent))
                    .copied(),
            );
            for child in &block.children {
                if let Some(child_index) = by_key.get(child) {
                    children[index].push(*child_index);
                }
            }
        }
        BlockMap {
            keys,
            names,
            parents,
            children,
            by_key,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, index: usize) -> &str {
        &self.keys[index]
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.by_key.get(key).copied()
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    pub fn block<'p>(&self, program: &'p SparkProgram, index: usize) -> Option<&'p SparkBlock> {
        program.blocks.get_index(index).map(|(_, block)| block)
    }

    pub fn commands<'p>(&self, program: &'p SparkProgram, index: usize) -> &'p [CommandData] {
        self.block(program, index)
            .map(|block| block.commands.as_slice())
            .unwrap_or(&[])
    }

    /// Resolves a jump target name relative to a block: own children
    /// first, then each ancestor's children walking outward, then any
    /// block with that name in program order, then an exact key.
    pub fn resolve(&self, from: usize, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        let mut at = Some(from);
        while let Some(index) = at {
            if let Some(found) = self
                .children
                .get(index)
                .and_then(|kids| kids.iter().find(|&&kid| self.names[kid] == name))
            {
                return Some(*found);
            }
            at = self.parents.get(index).copied().flatten();
        }
        if let Some(found) = self.names.iter().position(|candidate| candidate == name) {
            return Some(found);
        }
        self.index_of(name)
    }
}
