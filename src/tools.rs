//! Client-side tool mediation.
//!
//! When the server wants a tool executed on the client, it emits a
//! `client-tool-request` event naming one or more tool calls. This module
//! dispatches those requests against a host-supplied handler registry:
//! [`ClientToolHandler::Automatic`] handlers run immediately and return a
//! result inline; [`ClientToolHandler::Interactive`] tools are parked until
//! the host calls [`crate::chat::Chat::submit_client_tool_result`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_agent::{ChatOptions, ClientToolHandler, RequestStreamTransport};
//!
//! # fn example() -> open_agent::Result<()> {
//! let options = ChatOptions::builder()
//!     .transport(RequestStreamTransport::new("http://localhost:4000/chat"))
//!     .client_tool(
//!         "get_weather",
//!         ClientToolHandler::automatic(|_args| async move {
//!             Ok(serde_json::json!({"temp": 72, "conditions": "sunny"}))
//!         }),
//!     )
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use crate::Result;
use crate::error::{AgentError, ErrorSource, ErrorType};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a client tool's handler function.
///
/// `Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>` —
/// boxed and pinned so handlers of different concrete closure types can live
/// in the same registry, `Arc`-wrapped so the registry can be cloned cheaply
/// and the handler invoked without holding a lock across the `.await`.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// A tool result destined back to the server, whether produced by an
/// automatic handler or submitted by the host on behalf of an interactive
/// tool.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub output: Option<Value>,
    pub error: Option<AgentError>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, output: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: Some(output),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, error: AgentError) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: None,
            error: Some(error),
        }
    }
}

/// How a client tool is handled once the server asks for it.
///
/// `Automatic` runs a handler immediately and reports the result.
/// `Interactive` means the host owns execution: the mediator parks the
/// request until [`crate::chat::Chat::submit_client_tool_result`] supplies
/// an answer.
#[derive(Clone)]
pub enum ClientToolHandler {
    Automatic(ToolHandler),
    Interactive,
}

impl ClientToolHandler {
    pub fn automatic<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        ClientToolHandler::Automatic(Arc::new(move |args| Box::pin(handler(args))))
    }
}

impl std::fmt::Debug for ClientToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientToolHandler::Automatic(_) => write!(f, "ClientToolHandler::Automatic(..)"),
            ClientToolHandler::Interactive => write!(f, "ClientToolHandler::Interactive"),
        }
    }
}

/// A client-tool request that's waiting on the host to call
/// `submit_client_tool_result`.
#[derive(Debug, Clone)]
pub struct PendingClientTool {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: Value,
}

/// Outcome of dispatching one batch of `client-tool-request` events.
pub struct DispatchOutcome {
    pub results: Vec<ToolResult>,
    pub pending: Vec<PendingClientTool>,
}

/// Dispatches `client-tool-request` events against a handler registry.
///
/// Automatic handlers run to completion synchronously from the mediator's
/// point of view (the `dispatch` future resolves once they're all done);
/// interactive requests are recorded in `pending` and returned separately so
/// the reducer can surface them to the host and wait.
#[derive(Default)]
pub struct ToolMediator {
    handlers: HashMap<String, ClientToolHandler>,
    pending: HashMap<String, PendingClientTool>,
}

impl ToolMediator {
    pub fn new(handlers: HashMap<String, ClientToolHandler>) -> Self {
        Self {
            handlers,
            pending: HashMap::new(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Runs every automatic handler in `requests` to completion, and parks
    /// every interactive one in `pending`. Missing handlers synthesize an
    /// error result rather than panicking — a tool the host never
    /// registered is a recoverable, per-call failure.
    pub async fn dispatch(&mut self, requests: Vec<PendingClientTool>) -> DispatchOutcome {
        let mut results = Vec::new();
        let mut parked = Vec::new();

        for request in requests {
            match self.handlers.get(&request.tool_name) {
                Some(ClientToolHandler::Automatic(handler)) => {
                    log::debug!("dispatching client tool '{}' automatically", request.tool_name);
                    match handler(request.input.clone()).await {
                        Ok(output) => results.push(ToolResult::ok(request.tool_call_id, output)),
                        Err(err) => {
                            log::warn!("client tool '{}' handler failed: {err}", request.tool_name);
                            let agent_err = AgentError::new(
                                ErrorType::ToolError,
                                err.to_string(),
                                ErrorSource::Client,
                            )
                            .with_tool(request.tool_name.clone());
                            results.push(ToolResult::err(request.tool_call_id, agent_err));
                        }
                    }
                }
                Some(ClientToolHandler::Interactive) => {
                    self.pending
                        .insert(request.tool_call_id.clone(), request.clone());
                    parked.push(request);
                }
                None => {
                    log::warn!("no client tool handler registered for '{}'", request.tool_name);
                    let agent_err = AgentError::new(
                        ErrorType::ToolError,
                        format!("No client handler for tool: {}", request.tool_name),
                        ErrorSource::Client,
                    )
                    .with_tool(request.tool_name.clone());
                    results.push(ToolResult::err(request.tool_call_id, agent_err));
                }
            }
        }

        DispatchOutcome {
            results,
            pending: parked,
        }
    }

    /// Resolves a previously-parked interactive request with a host-supplied
    /// result. Returns `true` once every pending request has been resolved,
    /// signalling the reducer to continue the server execution.
    pub fn submit_result(&mut self, result: ToolResult) -> bool {
        self.pending.remove(&result.tool_call_id);
        self.pending.is_empty()
    }

    /// Snapshot of requests still waiting on a host-supplied result.
    pub fn pending_list(&self) -> Vec<PendingClientTool> {
        self.pending.values().cloned().collect()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}
