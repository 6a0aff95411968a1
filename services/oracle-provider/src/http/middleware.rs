//! Per-client sliding-window admission control applied to the write
//! endpoints (`POST /feed-values*`, `POST /volumes`), plus the
//! request-counting and response-time instrumentation applied to every route.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use crate::http::error::{ClientInfo, ErrorBody, RateLimitInfo};
use crate::state::AppState;

/// Records one request into `ApiMetrics` and its elapsed time into the
/// performance monitor's rolling window (§4.8). Applied ahead of every route
/// so `/metrics/api` and `/metrics/performance` reflect real traffic.
pub async fn track_metrics(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    state.api_metrics.record_request();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
    state.performance_monitor.record_response_time_ms(elapsed_ms);
    state.api_metrics.record_response(response.status().is_server_error() || response.status().is_client_error());

    response
}

pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();
    let client_id = ratelimit::resolve_client_id(&headers, &remote.ip().to_string());

    let now_ms = chrono::Utc::now().timestamp_millis();
    let decision = state.rate_limiter.check(&client_id, now_ms);

    if !decision.allowed {
        let retry_after_seconds = decision.ms_before_next.div_ceil(1_000);
        let body = ErrorBody {
            error: "RateLimited".to_string(),
            message: "too many requests".to_string(),
            timestamp: now_ms,
            request_id: super::error::next_request_id(),
            rate_limit_info: Some(RateLimitInfo {
                limit: state.settings.rate_limit_max_requests,
                window_ms: state.settings.rate_limit_window_ms,
                total_hits: decision.total_hits,
                total_hits_in_window: decision.total_hits,
                retry_after_seconds,
                reset_time: now_ms + decision.ms_before_next as i64,
            }),
            client_info: Some(ClientInfo {
                client_id,
                method: request.method().to_string(),
                url: request.uri().to_string(),
            }),
        };
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after_seconds.to_string())],
            axum::response::Json(body),
        )
            .into_response();
    }

    next.run(request).await
}
