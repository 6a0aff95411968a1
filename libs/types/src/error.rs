//! Error taxonomy shared by every core component (§7 of the design).
//!
//! Components classify failures into one of these kinds at the boundary and
//! wrap them with the operation that produced them and, where available, the
//! underlying cause. The HTTP edge maps `kind` to a status code; it never
//! has to understand a component-specific error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied data is malformed. Never retried.
    InvalidInput,
    /// No data for a requested (feed, round).
    NotFound,
    /// Per-client admission blocked.
    RateLimited,
    /// Network/timeout/temporary failure; eligible for retry under policy.
    Transient,
    /// Update failed validation rules; dropped silently at ingest.
    ValidationFailure,
    /// Aggregator input fell below `minSources`.
    InsufficientSources,
    /// Startup misconfiguration; fatal.
    ConfigurationError,
    /// Unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Kinds the retry engine (C3) is allowed to retry, modulo the policy's
    /// own `retryable_kinds` allowlist.
    pub fn is_retryable_by_default(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Transient | ErrorKind::InsufficientSources => 503,
            ErrorKind::ValidationFailure => 500, // never surfaced to users directly
            ErrorKind::ConfigurationError => 500,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
#[error("{operation}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub operation: String,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(kind: ErrorKind, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        kind: ErrorKind,
        operation: impl Into<String>,
        message: impl Into<String>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn invalid_input(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, operation, message)
    }

    pub fn not_found(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, operation, message)
    }

    pub fn rate_limited(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, operation, message)
    }

    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, operation, message)
    }

    pub fn insufficient_sources(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientSources, operation, message)
    }

    pub fn configuration(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigurationError, operation, message)
    }

    pub fn internal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, operation, message)
    }
}

/// Severity used by validator/failover events; distinct from `ErrorKind`,
/// which drives propagation, not alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_taxonomy() {
        assert_eq!(ErrorKind::InvalidInput.http_status(), 400);
        assert_eq!(ErrorKind::NotFound.http_status(), 404);
        assert_eq!(ErrorKind::RateLimited.http_status(), 429);
        assert_eq!(ErrorKind::Transient.http_status(), 503);
        assert_eq!(ErrorKind::InsufficientSources.http_status(), 503);
    }

    #[test]
    fn only_transient_is_retryable_by_default() {
        assert!(ErrorKind::Transient.is_retryable_by_default());
        assert!(!ErrorKind::InvalidInput.is_retryable_by_default());
        assert!(!ErrorKind::RateLimited.is_retryable_by_default());
    }
}
