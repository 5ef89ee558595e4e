//! OmniTool AI error types.

use thiserror::Error;

/// Errors raised by the normalization layer and its backends.
///
/// Tool executors never surface these to callers; they log them and convert
/// them into the tool's failure variant. Chat sessions and the HTTP surface
/// do propagate them.
#[derive(Debug, Error)]
pub enum AiError {
    /// Invalid input or request.
    #[error("{0}")]
    InvalidInput(String),

    /// Missing API key for a provider.
    #[error("Missing API key for provider {0}")]
    MissingApiKey(String),

    /// Network, authentication or quota failure talking to the backend.
    #[error("Backend unavailable: {0}")]
    Transport(String),

    /// The completion text was not valid JSON or violated the schema.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The backend answered but produced nothing usable.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Provider error (from rig-core or the REST API).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Chat session not found.
    #[error("Chat session not found: {0}")]
    SessionNotFound(String),

    /// A message is already streaming on this session.
    #[error("Chat session is busy: {0}")]
    SessionBusy(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AiError {
    /// Create a new invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new malformed payload error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create a new empty result error.
    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyResult(msg.into())
    }

    /// Create a new provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Error code for programmatic handling in stream events.
impl AiError {
    pub fn code(&self) -> &'static str {
        match self {
            AiError::InvalidInput(_) => "INVALID_INPUT",
            AiError::MissingApiKey(_) => "MISSING_API_KEY",
            AiError::Transport(_) => "TRANSPORT_ERROR",
            AiError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            AiError::EmptyResult(_) => "EMPTY_RESULT",
            AiError::Provider(_) => "PROVIDER_ERROR",
            AiError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            AiError::SessionBusy(_) => "SESSION_BUSY",
            AiError::Config(_) => "CONFIG_ERROR",
            AiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::MalformedPayload(err.to_string())
    }
}
