//! # Streaming Chat Runtime
//!
//! A production-ready, streaming-first Rust runtime for client-side AI chat
//! agents. It turns a raw server event stream (text, reasoning, tool calls,
//! structured objects, file attachments) into an ordered list of UI-ready
//! messages, and mediates tool calls that must run on the client instead of
//! the server.
//!
//! ## Key Features
//!
//! - **Transport-agnostic**: works over one-shot request/SSE streams or a
//!   persistent socket, behind the same [`Transport`] trait.
//! - **Streaming reducer**: every event folds into [`UIMessage`]/
//!   [`UIMessagePart`] incrementally, so a subscriber sees partial text,
//!   partial structured objects, and in-flight tool calls as they arrive.
//! - **Client-side tool mediation**: automatic handlers run inline;
//!   interactive tools pause the chat in [`ChatStatus::AwaitingInput`] until
//!   the host calls [`Chat::submit_client_tool_result`].
//! - **Partial JSON repair**: structured-object streams are progressively
//!   parseable even mid-stream, via [`repair_partial_json`].
//! - **File uploads**: [`Chat::upload_files`] exchanges pending local files
//!   for host-issued references before a turn is sent.
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_agent::{Chat, ChatOptions, RequestStreamTransport, UserContent, UserMessageInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = RequestStreamTransport::new("http://localhost:4000/chat");
//!     let options = ChatOptions::builder().transport(transport).build()?;
//!     let mut chat = Chat::new(options);
//!
//!     chat.subscribe(|snapshot| {
//!         println!("status={:?} messages={}", snapshot.status, snapshot.messages.len());
//!     });
//!
//!     chat.send(
//!         "default",
//!         None,
//!         Some(UserMessageInput {
//!             content: Some(UserContent::Text("What's 2+2?".into())),
//!             files: None,
//!         }),
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **chat**: the reducer/state machine — `Chat`, `ChatOptions`, the
//!   per-event-type fold that builds `messages`.
//! - **event**: the wire event schema and silent-drop validator.
//! - **types**: `UIMessage`, `UIMessagePart`, and the other message-shaped
//!   data the reducer produces.
//! - **transport**: the `Transport` trait plus the request/stream and
//!   socket implementations.
//! - **tools**: client-tool mediation (automatic vs. interactive handlers,
//!   pending-call tracking).
//! - **upload**: file upload plumbing used before a turn is sent.
//! - **partial_json**: best-effort repair of a truncated JSON document.
//! - **error**: the `Error`/`Result` alias and the wire-level `AgentError`.

mod chat;
mod error;
mod event;
mod partial_json;
mod tools;
mod transport;
mod types;
mod upload;

// --- Reducer / chat session ---

pub use chat::{
    Chat, ChatOptions, ChatOptionsBuilder, ChatSnapshot, ChatStatus, UserContent, UserFile,
    UserMessageInput,
};

// --- Event schema ---

pub use event::{validate_event, BlockDisplay, ClientToolCallRequest, FilePayload, FinishReason, StreamEvent};

// --- Error handling ---

pub use error::{AgentError, Error, ErrorSource, ErrorType, Result};

// --- Message model ---

pub use types::{
    MessageStatus, ObjectStatus, OperationStatus, ToolCallStatus, UIMessage, UIMessagePart, UIRole,
};

// --- Transport ---

pub use transport::{BoxStreamEvents, ConnectionState, RequestStreamTransport, SocketTransport, Transport};

// --- Tool system ---

pub use tools::{
    ClientToolHandler, DispatchOutcome, PendingClientTool, ToolHandler, ToolMediator, ToolResult,
};

// --- File uploads ---

pub use upload::{FileReference, PendingUpload, PresignedUpload, UploadProgress};

// --- Partial JSON repair ---

pub use partial_json::repair_partial_json;

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Re-exports the types most call sites need: the chat session, its
/// configuration builder, the message model, and the tool/transport traits.
/// Import with `use open_agent::prelude::*;`.
pub mod prelude {
    pub use crate::{
        Chat, ChatOptions, ChatSnapshot, ChatStatus, ClientToolHandler, Error, PendingClientTool,
        Result, StreamEvent, ToolResult, Transport, UIMessage, UIMessagePart, UserContent,
        UserFile, UserMessageInput,
    };
}
