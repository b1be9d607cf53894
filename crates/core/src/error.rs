//! Error types for the Alin domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own enum; [`Error`] collects them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Alin operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Agent loop errors ---
    #[error("Loop error: {0}")]
    Loop(#[from] LoopError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Workspace errors ---
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A single upstream stream event could not be understood.
///
/// Never fatal: the bridge logs it at `trace` and drops the event.
#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("unparseable event payload: {reason}")]
    InvalidJson { reason: String },

    #[error("event is missing field `{0}`")]
    MissingField(&'static str),
}

/// HTTP statuses that are worth another attempt.
const RETRYABLE_STATUSES: [u16; 3] = [429, 500, 529];

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed with status {status}: {message}")]
    Http {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transient failures (429, 500, 529) are retried by the loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http { status, .. } if RETRYABLE_STATUSES.contains(status))
    }

    /// Server-provided `Retry-After`, which wins over computed backoff.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Which loop budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetKind {
    Iterations,
    Time,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Iterations => write!(f, "iterations"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// Terminal outcomes of an agent loop other than natural completion.
#[derive(Debug, Clone, Error)]
pub enum LoopError {
    #[error("{kind} budget exceeded")]
    BudgetExceeded { kind: BudgetKind },

    #[error("{message}")]
    Provider {
        status: Option<u16>,
        retryable: bool,
        message: String,
    },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl LoopError {
    /// Stable identifier used in client-facing error events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BudgetExceeded { kind: BudgetKind::Iterations } => "max_iterations_exceeded",
            Self::BudgetExceeded { kind: BudgetKind::Time } => "time_budget_exceeded",
            Self::Provider { .. } => "provider_error",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<ProviderError> for LoopError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MalformedResponse(msg) => Self::MalformedResponse(msg),
            other => Self::Provider {
                status: other.status(),
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

/// Tool-level failures. These never abort a loop: the message is fed back to
/// the model as an error tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path escapes the workspace: {path}")]
    PathTraversal { path: String },

    #[error("Command blocked by safety policy (matched `{pattern}`)")]
    CommandBlocked { pattern: String },

    #[error("Git operation not allowed: {verb}")]
    GitOperationBlocked { verb: String },

    #[error(
        "old_str matches {occurrences} locations; include more surrounding context so it is unique"
    )]
    AmbiguousMatch { occurrences: usize },

    #[error("{}", timeout_message(.output, .timeout_secs))]
    ExecutionTimeout { timeout_secs: u64, output: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool call cancelled")]
    Cancelled,
}

fn timeout_message(output: &str, timeout_secs: &u64) -> String {
    if output.is_empty() {
        format!("[timed out after {timeout_secs}s]")
    } else {
        format!("{output}\n[timed out after {timeout_secs}s]")
    }
}

impl ToolError {
    /// Stable identifier recorded in `ToolCallRecord::error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "unknown_tool",
            Self::NotFound(_) => "not_found",
            Self::PathTraversal { .. } => "path_traversal",
            Self::CommandBlocked { .. } => "command_blocked",
            Self::GitOperationBlocked { .. } => "git_operation_blocked",
            Self::AmbiguousMatch { .. } => "ambiguous_match",
            Self::ExecutionTimeout { .. } => "execution_timeout",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::ExecutionFailed(_) => "execution_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::ExecutionFailed(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Invalid workspace id: {0:?}")]
    InvalidId(String),

    #[error("Workspace {id} belongs to another owner")]
    OwnerMismatch { id: String },

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}
