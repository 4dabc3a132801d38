use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::evaluate::Value;

use super::program::SourceLocation;

/// A `var` declaration. The initializer is folded at compile time, so the
/// declared value and its inferred type travel with the program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparkVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Value,
    pub source: SourceLocation,
}

/// An `entity` declaration with optional inheritance via `base` and
/// `key: value` fields from the indented lines that follow it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparkEntity {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base: Option<String>,
    pub fields: IndexMap<String, String>,
    pub source: SourceLocation,
}

impl SparkEntity {
    /// Resolves a field, walking the `base` chain through `entities`.
    /// Inheritance cycles simply stop at the first revisited entity.
    pub fn field<'a>(
        &'a self,
        name: &str,
        entities: &'a IndexMap<String, SparkEntity>,
    ) -> Option<&'a str> {
        let mut current = self;
        let mut visited: Vec<&str> = vec![&self.name];
        loop {
            if let Some(value) = current.fields.get(name) {
                return Some(value);
            }
            let base = current.base.as_deref()?;
            if visited.contains(&base) {
                return None;
            }
            visited.push(base);
            current = entities.get(base)?;
        }
    }
}
