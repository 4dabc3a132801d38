use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::SPARK_PROGRAM_VERSION;

use super::{
    command::CommandData,
    declaration::{SparkEntity, SparkVariable},
};

/// A source span: the line it starts on plus absolute byte offsets.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    pub line: usize,
    pub from: usize,
    pub to: usize,
}

impl SourceLocation {
    pub fn new(line: usize, from: usize, to: usize) -> Self {
        SourceLocation {
            file: None,
            line,
            from,
            to,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A non-fatal, source-located problem attached to a compiled program.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparkDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub source: SourceLocation,
}

/// One named, nested region of commands.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SparkBlock {
    pub name: String,
    pub level: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub path: Vec<String>,
    pub source: SourceLocation,
    pub commands: Vec<CommandData>,
}

/// Editor outline entry, one per section heading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub name: String,
    pub level: usize,
    pub line: usize,
}

/// A recognized color literal, for editor decorations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorRange {
    pub color: String,
    pub from: usize,
    pub to: usize,
}

/// The compiled artifact: everything the runtime, language server, and
/// export pipelines consume. Serializable as JSON; map order is preserved
/// so block indices are stable across a round trip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparkProgram {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    pub metadata: IndexMap<String, String>,
    pub blocks: IndexMap<String, SparkBlock>,
    pub variables: IndexMap<String, SparkVariable>,
    pub entities: IndexMap<String, SparkEntity>,
    pub diagnostics: Vec<SparkDiagnostic>,
    pub outline: Vec<OutlineItem>,
    pub color_ranges: Vec<ColorRange>,
}

impl Default for SparkProgram {
    fn default() -> Self {
        SparkProgram {
            version: SPARK_PROGRAM_VERSION,
            file: None,
            metadata: IndexMap::new(),
            blocks: IndexMap::new(),
            variables: IndexMap::new(),
            entities: IndexMap::new(),
            diagnostics: Vec::new(),
            outline: Vec::new(),
            color_ranges: Vec::new(),
        }
    }
}

impl SparkProgram {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == DiagnosticSeverity::Error)
    }
}
