//! Error types for exchange adapters.

use thiserror::Error;
use types::{ErrorKind, ProviderError};

/// Result type alias for adapter operations.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed for {exchange}: {reason}")]
    ConnectionFailed { exchange: String, reason: String },

    #[error("connection timeout for {exchange} after {timeout_ms}ms")]
    ConnectionTimeout { exchange: String, timeout_ms: u64 },

    #[error("parse error for {exchange}: {message} - {error}")]
    ParseError {
        exchange: String,
        message: String,
        error: String,
    },

    #[error("failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("circuit breaker open for {exchange}")]
    CircuitBreakerOpen { exchange: String },

    #[error("maximum reconnection attempts ({max_attempts}) exceeded for {exchange}")]
    MaxReconnectAttemptsExceeded { exchange: String, max_attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Whether a retry engine would normally retry this failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AdapterError::ConnectionFailed { .. }
                | AdapterError::ConnectionTimeout { .. }
                | AdapterError::WebSocket(_)
                | AdapterError::Io(_)
        )
    }

    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            AdapterError::Configuration(_) | AdapterError::MaxReconnectAttemptsExceeded { .. }
        )
    }
}

impl From<AdapterError> for ProviderError {
    fn from(err: AdapterError) -> Self {
        let kind = match &err {
            AdapterError::ConnectionFailed { .. }
            | AdapterError::ConnectionTimeout { .. }
            | AdapterError::WebSocket(_)
            | AdapterError::Io(_) => ErrorKind::Transient,
            AdapterError::CircuitBreakerOpen { .. } => ErrorKind::Transient,
            AdapterError::ParseError { .. } | AdapterError::JsonParse(_) => ErrorKind::InvalidInput,
            AdapterError::MaxReconnectAttemptsExceeded { .. } => ErrorKind::Transient,
            AdapterError::Cancelled => ErrorKind::Internal,
            AdapterError::Configuration(_) => ErrorKind::ConfigurationError,
            AdapterError::Internal(_) => ErrorKind::Internal,
        };
        ProviderError::with_cause(kind, "adapter", err.to_string(), err)
    }
}
