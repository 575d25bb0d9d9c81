//! Server-sent event schema and best-effort validation.
//!
//! The wire format is a closed discriminated union tagged by `type`. Events
//! the reducer doesn't recognize, or that fail to match their variant's
//! shape, are dropped rather than surfaced as errors — a malformed or
//! forward-incompatible event should never abort an otherwise-healthy
//! stream.

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a block's progress is surfaced to the chat UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockDisplay {
    Hidden,
    Name,
    Description,
    Stream,
}

impl Default for BlockDisplay {
    fn default() -> Self {
        BlockDisplay::Description
    }
}

fn default_true() -> bool {
    true
}

/// Why a `finish` event ended the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    ClientToolCalls,
    Length,
    ContentFilter,
    Error,
    #[serde(other)]
    Other,
}

/// One client-side tool the server is requesting, as carried by a
/// `client-tool-request` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
}

/// The typed payload of a `file-available` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePayload {
    pub id: String,
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    Start,

    #[serde(rename_all = "camelCase")]
    BlockStart {
        block_id: String,
        #[serde(default)]
        block_name: String,
        block_type: String,
        #[serde(default)]
        display: BlockDisplay,
        #[serde(default)]
        description: Option<String>,
        #[serde(default = "default_true")]
        output_to_chat: bool,
        #[serde(default)]
        thread: Option<String>,
    },

    BlockEnd {
        block_id: String,
    },

    ReasoningStart {
        id: String,
    },

    ReasoningDelta {
        id: String,
        delta: String,
    },

    ReasoningEnd {
        id: String,
    },

    TextStart {
        id: String,
        #[serde(default, rename = "responseType")]
        response_type: Option<String>,
    },

    TextDelta {
        id: String,
        delta: String,
    },

    TextEnd {
        id: String,
    },

    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        title: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    ToolInputDelta {
        tool_call_id: String,
        delta: String,
    },

    #[serde(rename_all = "camelCase")]
    ToolInputEnd {
        tool_call_id: String,
    },

    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },

    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },

    #[serde(rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error: AgentError,
    },

    Source {
        #[serde(default)]
        thread: Option<String>,
        #[serde(flatten)]
        payload: Value,
    },

    #[serde(rename_all = "camelCase")]
    FileAvailable {
        #[serde(flatten)]
        file: FilePayload,
        #[serde(default)]
        thread: Option<String>,
    },

    ResourceUpdate {
        name: String,
        value: Value,
    },

    /// Server-side tool execution notice. Not client-actionable; the
    /// reducer observes it for informational purposes only.
    ToolRequest {
        #[serde(flatten)]
        raw: Value,
    },

    #[serde(rename_all = "camelCase")]
    ClientToolRequest {
        tool_calls: Vec<ClientToolCallRequest>,
    },

    Finish {
        finish_reason: FinishReason,
    },

    Error {
        error: AgentError,
    },
}

/// Parse and validate a raw server frame.
///
/// Returns `None` on any deserialization failure (unknown `type`, missing
/// required field, wrong field type) — callers must treat `None` as "drop
/// this frame", not as a hard error.
pub fn validate_event(raw: &Value) -> Option<StreamEvent> {
    match serde_json::from_value::<StreamEvent>(raw.clone()) {
        Ok(event) => Some(event),
        Err(err) => {
            log::trace!("dropping malformed event: {err}");
            None
        }
    }
}
