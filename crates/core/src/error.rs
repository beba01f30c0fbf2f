//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`Error`] is what a chat
//! turn surfaces to its caller.

use thiserror::Error;

/// The top-level error type for a chat turn.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation ---
    #[error("Invalid messages: {0}")]
    InvalidMessages(String),

    #[error("You must be logged in to use chat.")]
    Unauthenticated,

    #[error("Message cannot be empty.")]
    EmptyInput,

    // --- Model ---
    #[error("AI request failed: {0}")]
    ModelRequestFailed(#[from] ProviderError),

    #[error("AI response missing content")]
    InvalidResponse,

    #[error(
        "Conversation loop exceeded maximum iterations ({0}). AI may be stuck in tool calling loop."
    )]
    MaxIterationsReached(u32),

    // --- Tools ---
    #[error("{0}")]
    Tool(#[from] ToolError),

    // --- History ---
    #[error("Chat history unavailable: {0}")]
    HistoryUnavailable(#[from] StoreError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Stable snake_case identifier used in logs and events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMessages(_) => "invalid_messages",
            Self::Unauthenticated => "unauthenticated",
            Self::EmptyInput => "empty_input",
            Self::ModelRequestFailed(_) => "model_request_failed",
            Self::InvalidResponse => "invalid_response",
            Self::MaxIterationsReached(_) => "max_iterations_reached",
            Self::Tool(ToolError::NotFound(_)) => "tool_not_found",
            Self::Tool(ToolError::Invalid(_)) => "tool_invalid",
            Self::Tool(ToolError::ExecutionFailed { .. }) => "tool_execution_failed",
            Self::HistoryUnavailable(_) => "history_unavailable",
            Self::Serialization(_) => "serialization",
        }
    }

    /// True when the failure reflects model behavior rather than
    /// infrastructure (a model stuck calling tools).
    pub fn is_model_behavior(&self) -> bool {
        matches!(self, Self::MaxIterationsReached(_))
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool {0} not available")]
    NotFound(String),

    #[error("Tool {0} missing valid callback")]
    Invalid(String),

    #[error("Tool {tool} execution failed: {reason}")]
    ExecutionFailed { tool: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}
