//! Core type definitions for the chat runtime's reactive message model.
//!
//! - [`UIMessage`]: an ordered, reactive conversation entry folded from the
//!   server event stream
//! - [`UIMessagePart`]: the tagged union of content a message can carry
//!   (text, reasoning, tool call, operation, source, file, structured object)
//!
//! # Example
//!
//! ```
//! use open_agent::{UIMessage, UIRole};
//!
//! let msg = UIMessage::new("msg_1", UIRole::User, 0);
//! assert!(msg.parts.is_empty());
//! ```

use crate::error::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a [`UIMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UIRole {
    User,
    Assistant,
}

/// Lifecycle state of a [`UIMessage`].
///
/// At most one assistant message is `Streaming` at a time; once a message
/// reaches `Done` its `parts` are no longer mutated by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Streaming,
    Done,
}

/// Per-tool-call bookkeeping status, independent of the owning message's
/// overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Done,
    Error,
    Cancelled,
}

/// Lifecycle status of an operation block — a non-LLM protocol step such as
/// `set-resource` surfaced as a visible indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Running,
    Done,
    Cancelled,
}

/// Lifecycle status of a streamed structured-object part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectStatus {
    Streaming,
    Done,
    Error,
}

/// One piece of content inside a [`UIMessage`].
///
/// A closed union mirroring the server's block types. Every variant carries
/// an optional `thread` tag identifying which logical sub-stream it belongs
/// to; `None` means the main thread, and the reducer stores it as absent
/// rather than as `Some("main")` so equality/serialization stay minimal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UIMessagePart {
    Text {
        text: String,
        status: MessageStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    Reasoning {
        text: String,
        status: MessageStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<AgentError>,
        status: ToolCallStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    Operation {
        operation_id: String,
        name: String,
        operation_type: String,
        status: OperationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    Source {
        source: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    File {
        file: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
    Object {
        type_name: String,
        /// Best-effort value produced by [`crate::repair_partial_json`]
        /// on every delta; `None` until the buffer first becomes parseable.
        #[serde(skip_serializing_if = "Option::is_none")]
        partial: Option<Value>,
        /// Only set once `text-end` parses the full accumulated buffer.
        #[serde(skip_serializing_if = "Option::is_none")]
        object: Option<Value>,
        status: ObjectStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        thread: Option<String>,
    },
}

impl UIMessagePart {
    pub fn thread(&self) -> Option<&str> {
        match self {
            UIMessagePart::Text { thread, .. }
            | UIMessagePart::Reasoning { thread, .. }
            | UIMessagePart::ToolCall { thread, .. }
            | UIMessagePart::Operation { thread, .. }
            | UIMessagePart::Source { thread, .. }
            | UIMessagePart::File { thread, .. }
            | UIMessagePart::Object { thread, .. } => thread.as_deref(),
        }
    }
}

/// A single reactive entry in the folded conversation.
///
/// Produced and owned by the reducer in `chat.rs`; hosts read snapshots via
/// [`crate::Chat::subscribe`] and never mutate a `UIMessage` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIMessage {
    pub id: String,
    pub role: UIRole,
    pub parts: Vec<UIMessagePart>,
    pub status: MessageStatus,
    pub created_at: i64,
}

impl UIMessage {
    pub fn new(id: impl Into<String>, role: UIRole, created_at: i64) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
            status: MessageStatus::Streaming,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_message_starts_streaming_and_empty() {
        let msg = UIMessage::new("msg_1", UIRole::Assistant, 1000);
        assert_eq!(msg.status, MessageStatus::Streaming);
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn test_ui_message_part_thread_defaults_to_main() {
        let part = UIMessagePart::Text {
            text: "hi".into(),
            status: MessageStatus::Streaming,
            thread: None,
        };
        assert_eq!(part.thread(), None);

        let part = UIMessagePart::Text {
            text: "hi".into(),
            status: MessageStatus::Streaming,
            thread: Some("sidebar".into()),
        };
        assert_eq!(part.thread(), Some("sidebar"));
    }

    #[test]
    fn test_ui_message_part_tool_call_serializes_tagged() {
        let part = UIMessagePart::ToolCall {
            tool_call_id: "call_1".into(),
            tool_name: "search".into(),
            display_name: None,
            args: Some(serde_json::json!({"q": "rust"})),
            result: None,
            error: None,
            status: ToolCallStatus::Running,
            thread: None,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool-call");
        assert_eq!(json["tool_name"], "search");
        assert!(json.get("thread").is_none());
    }

    #[test]
    fn test_ui_message_part_object_omits_unset_fields() {
        let part = UIMessagePart::Object {
            type_name: "weather".into(),
            partial: None,
            object: None,
            status: ObjectStatus::Streaming,
            error: None,
            thread: None,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "object");
        assert!(json.get("partial").is_none());
        assert!(json.get("object").is_none());
    }

    #[test]
    fn test_ui_message_part_operation_serializes_tagged() {
        let part = UIMessagePart::Operation {
            operation_id: "block_1".into(),
            name: "Saving file".into(),
            operation_type: "set-resource".into(),
            status: OperationStatus::Running,
            thread: None,
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "operation");
        assert_eq!(json["operation_type"], "set-resource");
    }
}
