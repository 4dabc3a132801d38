use std::collections::HashMap;

use indexmap::IndexMap;

use crate::{
    compiler::SparkProgram,
    evaluate::{LookupContext, Value},
};

use super::blocks::BlockMap;

/// Layered variable store: a block-local layer shadows every ancestor
/// layer, and the global layer (declared `var`s) sits under all of them.
/// Lookup walks from the thread's block outward; writes land in the layer
/// that already holds the name, or create a block-local one.
#[derive(Debug, Default, Clone)]
pub struct ScopeChain {
    globals: IndexMap<String, Value>,
    locals: HashMap<usize, IndexMap<String, Value>>,
}

impl ScopeChain {
    pub fn from_program(program: &SparkProgram) -> Self {
        ScopeChain {
            globals: program
                .variables
                .iter()
                .map(|(name, variable)| (name.clone(), variable.value.clone()))
                .collect(),
            locals: HashMap::new(),
        }
    }

    pub fn reset(&mut self, program: &SparkProgram) {
        *self = ScopeChain::from_program(program);
    }

    pub fn get(&self, blocks: &BlockMap, block: usize, name: &str) -> Option<Value> {
        let mut at = Some(block);
        while let Some(index) = at {
            if let Some(value) = self.locals.get(&index).and_then(|layer| layer.get(name)) {
                return Some(value.clone());
            }
            at = blocks.parent(index);
        }
        self.globals.get(name).cloned()
    }

    /// Writes `name`, preferring the innermost layer that already holds it;
    /// a name held nowhere becomes local to `block`.
    pub fn set(&mut self, blocks: &BlockMap, block: usize, name: &str, value: Value) {
        let mut at = Some(block);
        while let Some(index) = at {
            if let Some(layer) = self.locals.get_mut(&index)
                && let Some(slot) = layer.get_mut(name)
            {
                *slot = value;
                return;
            }
            at = blocks.parent(index);
        }
        if let Some(slot) = self.globals.get_mut(name) {
            *slot = value;
            return;
        }
        self.locals
            .entry(block)
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Discards every block-local layer, keeping globals. Used when a
    /// thread's state is unwound.
    pub fn clear_locals(&mut self) {
        self.locals.clear();
    }

    pub fn globals(&self) -> &IndexMap<String, Value> {
        &self.globals
    }
}

/// Variable lookup for expressions evaluated by a thread positioned at a
/// block.
pub struct ThreadLookup<'a> {
    pub scopes: &'a ScopeChain,
    pub blocks: &'a BlockMap,
    pub block: usize,
}

impl LookupContext for ThreadLookup<'_> {
    fn get(&self, name: &str) -> Option<Value> {
        self.scopes.get(self.blocks, self.block, name)
    }
}
