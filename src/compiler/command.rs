use serde::{Deserialize, Serialize};

use super::program::SourceLocation;

/// Stable identity of one command within a program.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandReference {
    /// Command kind, e.g. `"JumpCommand"`. Runner dispatch key.
    pub type_id: String,
    /// `"{block}.{index}"`, unique within the program.
    pub id: String,
    /// Key of the owning block.
    pub parent_id: String,
    /// Position within the owning block's command list.
    pub index: usize,
}

/// One executable instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandData {
    pub reference: CommandReference,
    pub source: SourceLocation,
    pub indent: usize,
    pub params: CommandParams,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchCheck {
    If,
    Elseif,
    Else,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOperator {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Subtract,
    #[serde(rename = "*=")]
    Multiply,
    #[serde(rename = "/=")]
    Divide,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

/// A piece of display or choice content: literal text or an inline
/// expression to interpolate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    Interpolation { expression: String },
}

/// Kind-specific command parameters. Expression operands are carried as
/// source text; the engine compiles them on first use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CommandParams {
    Branch {
        check: BranchCheck,
        condition: String,
    },
    Jump {
        value: String,
        return_when_finished: bool,
    },
    Return,
    Assign {
        variable: String,
        operator: AssignOperator,
        value: String,
    },
    Wait {
        seconds: String,
    },
    Log {
        severity: LogSeverity,
        message: String,
    },
    Display {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        character: Option<String>,
        content: Vec<ContentItem>,
    },
    Choice {
        content: Vec<ContentItem>,
        target: String,
    },
}

impl CommandParams {
    pub fn type_id(&self) -> &'static str {
        match self {
            CommandParams::Branch { .. } => "BranchCommand",
            CommandParams::Jump { .. } => "JumpCommand",
            CommandParams::Return => "ReturnCommand",
            CommandParams::Assign { .. } => "AssignCommand",
            CommandParams::Wait { .. } => "WaitCommand",
            CommandParams::Log { .. } => "LogCommand",
            CommandParams::Display { .. } => "DisplayCommand",
            CommandParams::Choice { .. } => "ChoiceCommand",
        }
    }
}
