//! JSON-RPC 2.0 shaped message types for the debug/event surface. The
//! transport that carries them is a collaborator; only the shapes live
//! here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::compiler::SourceLocation;

pub const JSON_RPC_VERSION: &str = "2.0";

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitReason {
    Finished,
    Quit,
    Invalidated,
    Error,
    Restart,
}

/// A per-thread runtime failure: always carries the originating source
/// location so editors can highlight it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFault {
    pub message: String,
    pub location: SourceLocation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Display,
    Choice,
}

/// Notifications the runtime emits, mirroring a step debugger. Serialized
/// as `{"method": ..., "params": ...}`; [`GameMessage::into_json`] adds the
/// `jsonrpc` envelope field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum GameMessage {
    #[serde(rename = "game/started")]
    Started {},
    #[serde(rename = "game/hitBreakpoint")]
    HitBreakpoint {
        thread: u32,
        location: SourceLocation,
    },
    #[serde(rename = "game/awaitingInteraction")]
    AwaitingInteraction {
        thread: u32,
        kind: InteractionKind,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        character: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        text: Option<String>,
        choices: Vec<String>,
    },
    #[serde(rename = "game/chosePathToContinue")]
    ChosePathToContinue {
        thread: u32,
        index: usize,
        target: String,
    },
    #[serde(rename = "game/clickedToContinue")]
    ClickedToContinue { thread: u32 },
    #[serde(rename = "game/autoAdvancedToContinue")]
    AutoAdvancedToContinue { thread: u32 },
    #[serde(rename = "game/willSaveCheckpoint")]
    WillSaveCheckpoint {
        thread: u32,
        checkpoint: String,
        location: SourceLocation,
    },
    #[serde(rename = "game/exitedThread")]
    ExitedThread { thread: u32 },
    #[serde(rename = "game/finished")]
    Finished {},
    #[serde(rename = "game/exited")]
    Exited {
        reason: ExitReason,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<RuntimeFault>,
    },
}

impl GameMessage {
    pub fn method(&self) -> &'static str {
        match self {
            GameMessage::Started {} => "game/started",
            GameMessage::HitBreakpoint { .. } => "game/hitBreakpoint",
            GameMessage::AwaitingInteraction { .. } => "game/awaitingInteraction",
            GameMessage::ChosePathToContinue { .. } => "game/chosePathToContinue",
            GameMessage::ClickedToContinue { .. } => "game/clickedToContinue",
            GameMessage::AutoAdvancedToContinue { .. } => "game/autoAdvancedToContinue",
            GameMessage::WillSaveCheckpoint { .. } => "game/willSaveCheckpoint",
            GameMessage::ExitedThread { .. } => "game/exitedThread",
            GameMessage::Finished {} => "game/finished",
            GameMessage::Exited { .. } => "game/exited",
        }
    }

    /// Full JSON-RPC notification value.
    pub fn into_json(self) -> serde_json::Value {
        match serde_json::to_value(&self) {
            Ok(mut value) => {
                value["jsonrpc"] = json!(JSON_RPC_VERSION);
                value
            }
            Err(_) => json!({ "jsonrpc": JSON_RPC_VERSION }),
        }
    }
}

/// Requests the runtime answers. Each carries an `id` paired with its
/// response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum GameRequestParams {
    /// Pre-seeds deterministic choice indices per thread, so previews can
    /// fast-forward through interaction points without real input.
    #[serde(rename = "game/willSimulateChoices")]
    WillSimulateChoices {
        #[serde(deserialize_with = "de_u32_keyed_choices")]
        choices: IndexMap<u32, Vec<usize>>,
    },
}

/// Deserialize a per-thread choice map whose keys arrive as JSON object
/// strings. `#[serde(flatten)]` on [`GameRequest`] buffers the request into
/// serde's internal `Content` representation, which bypasses serde_json's
/// string→integer map-key coercion; reading the keys as strings and parsing
/// them restores the intended `u32` thread ids without changing the wire
/// format.
fn de_u32_keyed_choices<'de, D>(deserializer: D) -> Result<IndexMap<u32, Vec<usize>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;
    let string_keyed = IndexMap::<String, Vec<usize>>::deserialize(deserializer)?;
    string_keyed
        .into_iter()
        .map(|(key, value)| key.parse::<u32>().map(|key| (key, value)).map_err(D::Error::custom))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameRequest {
    pub id: u64,
    #[serde(flatten)]
    pub params: GameRequestParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameResponse {
    pub id: u64,
    pub result: serde_json::Value,
}

impl GameResponse {
    pub fn ack(id: u64) -> Self {
        GameResponse {
            id,
            result: json!({}),
        }
    }

    pub fn into_json(self) -> serde_json::Value {
        json!({
            "jsonrpc": JSON_RPC_VERSION,
            "id": self.id,
            "result": self.result,
        })
    }
}
