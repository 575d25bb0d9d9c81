//! Error types for the chat runtime.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
///
/// Ambient failures (transport, serialization, configuration) get their own
/// variant; the protocol's own structured error (raised by an `error` event
/// or returned from a tool handler) is carried as a payload in
/// [`Error::Protocol`] rather than being flattened into new variants here.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A structured protocol error, either raised by the server or
    /// synthesized locally (missing tool handler, repair failure, ...).
    #[error("{0}")]
    Protocol(AgentError),

    /// Tool execution error that doesn't carry full protocol detail
    /// (e.g. a panic caught at the dispatch boundary).
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Invalid input supplied by the caller.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// Other errors.
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new tool error.
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout() -> Self {
        Error::Timeout
    }
}

impl From<AgentError> for Error {
    fn from(e: AgentError) -> Self {
        Error::Protocol(e)
    }
}

/// The closed set of protocol error categories (spec §7).
///
/// Mirrors the server's `errorType` discriminant verbatim. Unknown values
/// decode to [`ErrorType::UnknownError`] rather than failing deserialization,
/// since a new server-side error type should degrade gracefully on an older
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    AuthenticationError,
    PermissionError,
    ValidationError,
    NotFoundError,
    RateLimitError,
    QuotaExceededError,
    ProviderError,
    ProviderOverloaded,
    ProviderTimeout,
    ExecutionError,
    ToolError,
    ProtocolError,
    InternalError,
    #[serde(other)]
    UnknownError,
}

/// Where an error originated (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    Platform,
    Provider,
    Tool,
    Client,
}

/// The structured error carried by `error` events and tool-dispatch
/// failures. Field names and casing follow spec §6/§7 verbatim
/// (`errorType`, `retryAfter`, ...) so a literal wire payload deserializes
/// without translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentError {
    pub error_type: ErrorType,
    pub message: String,
    pub source: ErrorSource,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.message)
    }
}

impl AgentError {
    pub fn new(error_type: ErrorType, message: impl Into<String>, source: ErrorSource) -> Self {
        let retryable = matches!(
            error_type,
            ErrorType::RateLimitError | ErrorType::ProviderOverloaded | ErrorType::ProviderTimeout
        );
        Self {
            error_type,
            message: message.into(),
            source,
            retryable,
            retry_after: None,
            code: None,
            provider: None,
            tool: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Classify an HTTP status code into a structured protocol error,
    /// following spec §7's mapping (400→validation_error, 401→
    /// authentication_error, 403→permission_error, ...) and the retryable
    /// rule: 429 or any 5xx is retryable.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let error_type = match status {
            400 => ErrorType::ValidationError,
            401 => ErrorType::AuthenticationError,
            403 => ErrorType::PermissionError,
            404 => ErrorType::NotFoundError,
            408 => ErrorType::ProviderTimeout,
            429 => ErrorType::RateLimitError,
            503 => ErrorType::ProviderOverloaded,
            500..=599 => ErrorType::ProviderError,
            _ => ErrorType::UnknownError,
        };
        let retryable = status == 429 || (500..=599).contains(&status);
        Self {
            error_type,
            message: message.into(),
            source: ErrorSource::Provider,
            retryable,
            retry_after: None,
            code: Some(status.to_string()),
            provider: None,
            tool: None,
        }
    }

    pub fn is_rate_limit_error(&self) -> bool {
        self.error_type == ErrorType::RateLimitError
    }

    pub fn is_auth_error(&self) -> bool {
        self.error_type == ErrorType::AuthenticationError
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}
