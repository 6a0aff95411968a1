//! Error body shape shared across the HTTP surface (§6/§7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use types::{ErrorKind, ProviderError};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn next_request_id() -> String {
    let n = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{}-{n}", chrono::Utc::now().timestamp_millis())
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub timestamp: i64,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_info: Option<RateLimitInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub window_ms: u64,
    pub total_hits: u32,
    pub total_hits_in_window: u32,
    pub retry_after_seconds: u64,
    pub reset_time: i64,
}

#[derive(Debug, Serialize)]
pub struct ClientInfo {
    pub client_id: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub rate_limit_info: Option<RateLimitInfo>,
    pub client_info: Option<ClientInfo>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            rate_limit_info: None,
            client_info: None,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self::new(err.kind, err.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: format!("{:?}", self.kind),
            message: self.message,
            timestamp: chrono::Utc::now().timestamp_millis(),
            request_id: next_request_id(),
            rate_limit_info: self.rate_limit_info,
            client_info: self.client_info,
        };
        (status, Json(body)).into_response()
    }
}
