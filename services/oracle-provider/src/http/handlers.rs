//! Route handlers for the provider's HTTP surface (§6). Malformed input is a
//! full-request fault (4xx); a feed that simply has no data yet is reported
//! inside the 200 response's `data[]` with `value: null` and a `reason`.

use axum::extract::{Path, Query, State};
use axum::response::Json;

use super::dto::{
    ApiMetricsResponse, FeedDataItem, FeedValueDto, FeedValuesRequest, FeedValuesResponse,
    HealthResponse, LivenessResponse, MetricsResponse, PerformanceMetricsResponse,
    ReadinessResponse, ResponseTimeDto, RoundFeedValuesResponse, VolumeDataItem, VolumesQuery,
    VolumesResponse,
};
use super::error::ApiError;
use crate::state::AppState;

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn validate_feeds(feeds: &[types::FeedId]) -> Result<(), ApiError> {
    if feeds.is_empty() {
        return Err(ApiError::invalid_input("feeds must not be empty"));
    }
    if let Some(bad) = feeds.iter().find(|f| !f.is_canonical()) {
        return Err(ApiError::invalid_input(format!("invalid feed id: {bad}")));
    }
    Ok(())
}

pub async fn post_feed_values(
    State(state): State<AppState>,
    Json(req): Json<FeedValuesRequest>,
) -> Result<Json<FeedValuesResponse>, ApiError> {
    validate_feeds(&req.feeds)?;
    let now = now_ms();

    let mut data = Vec::with_capacity(req.feeds.len());
    for feed in &req.feeds {
        let value = state.orchestrator.query_current(feed, now, &state.warm_fetch).await;
        data.push(match value {
            Some(price) => FeedDataItem {
                feed: feed.clone(),
                value: Some(FeedValueDto::from(&price)),
                reason: None,
            },
            None => FeedDataItem {
                feed: feed.clone(),
                value: None,
                reason: Some("no current value cached for this feed".to_string()),
            },
        });
    }

    Ok(Json(FeedValuesResponse { feeds: req.feeds, data }))
}

fn parse_voting_round(raw: &str) -> Result<u64, ApiError> {
    let signed: i64 = raw
        .parse()
        .map_err(|_| ApiError::invalid_input("expected a numeric voting round id"))?;
    if signed < 0 {
        return Err(ApiError::invalid_input("voting round id must be non-negative"));
    }
    Ok(signed as u64)
}

pub async fn post_feed_values_round(
    State(state): State<AppState>,
    Path(voting_round_id): Path<String>,
    Json(req): Json<FeedValuesRequest>,
) -> Result<Json<RoundFeedValuesResponse>, ApiError> {
    validate_feeds(&req.feeds)?;
    let round = parse_voting_round(&voting_round_id)?;
    let now = now_ms();

    let mut data = Vec::with_capacity(req.feeds.len());
    for feed in &req.feeds {
        let value = state.orchestrator.query_round(feed, round, now);
        data.push((feed.clone(), value));
    }

    if data.iter().all(|(_, v)| v.is_none()) {
        return Err(ApiError::not_found(format!(
            "no round data for voting round {round} on any requested feed"
        )));
    }

    let data = data
        .into_iter()
        .map(|(feed, value)| match value {
            Some(price) => FeedDataItem {
                feed,
                value: Some(FeedValueDto::from(&price)),
                reason: None,
            },
            None => FeedDataItem {
                feed,
                value: None,
                reason: Some("no snapshot recorded for this feed in this round".to_string()),
            },
        })
        .collect();

    Ok(Json(RoundFeedValuesResponse { voting_round_id: round, data }))
}

pub async fn post_volumes(
    State(state): State<AppState>,
    Query(query): Query<VolumesQuery>,
    Json(req): Json<FeedValuesRequest>,
) -> Result<Json<VolumesResponse>, ApiError> {
    validate_feeds(&req.feeds)?;
    let window_sec = query.window_sec.unwrap_or(60);
    if window_sec == 0 {
        return Err(ApiError::invalid_input("windowSec must be positive"));
    }
    let now = now_ms();

    let data = req
        .feeds
        .iter()
        .map(|feed| match state.orchestrator.query_volume(feed, window_sec, now) {
            Some(volume) => VolumeDataItem { feed: feed.clone(), volume: Some(volume), reason: None },
            None => VolumeDataItem {
                feed: feed.clone(),
                volume: None,
                reason: Some("no volume recorded for this feed in the window".to_string()),
            },
        })
        .collect();

    Ok(Json(VolumesResponse { feeds: req.feeds, window_sec, data }))
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.orchestrator.cache().stats();
    let thresholds = state.performance_monitor.check_performance_thresholds(&stats);

    let mut services = std::collections::HashMap::new();
    services.insert(
        "cache".to_string(),
        if thresholds.hit_rate_ok { "ok" } else { "degraded" }.to_string(),
    );
    services.insert(
        "response_time".to_string(),
        if thresholds.response_time_ok { "ok" } else { "degraded" }.to_string(),
    );
    services.insert(
        "memory".to_string(),
        if thresholds.memory_usage_ok { "ok" } else { "degraded" }.to_string(),
    );

    Json(HealthResponse {
        status: if thresholds.overall_healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: now_ms(),
        services,
    })
}

pub async fn get_readiness(State(_state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse { ready: true, timestamp: now_ms() })
}

pub async fn get_liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse { alive: true, uptime: state.started_at.elapsed().as_secs() })
}

pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse { timestamp: now_ms(), metrics: state.orchestrator.cache().stats() })
}

pub async fn get_metrics_api(State(state): State<AppState>) -> Json<ApiMetricsResponse> {
    use std::sync::atomic::Ordering;
    Json(ApiMetricsResponse {
        requests: state.api_metrics.requests.load(Ordering::Relaxed),
        responses: state.api_metrics.responses.load(Ordering::Relaxed),
        errors: state.api_metrics.errors.load(Ordering::Relaxed),
    })
}

pub async fn get_metrics_performance(State(state): State<AppState>) -> Json<PerformanceMetricsResponse> {
    let monitor = &state.performance_monitor;
    Json(PerformanceMetricsResponse {
        response_time: ResponseTimeDto {
            mean_ms: monitor.mean_response_time_ms(),
            p50_ms: monitor.p50_response_time_ms(),
            p95_ms: monitor.p95_response_time_ms(),
            p99_ms: monitor.p99_response_time_ms(),
        },
        throughput: state.orchestrator.cache().stats().hits as f64,
    })
}

/// Maps a not-yet-constructed `ErrorKind` straight through `ApiError`, used
/// by tests that need a representative error body without a live request.
#[cfg(test)]
fn sample_error() -> ApiError {
    ApiError::new(types::ErrorKind::NotFound, "sample")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voting_round_rejects_negative_ids() {
        let err = parse_voting_round("-1").unwrap_err();
        assert!(err.message.to_lowercase().contains("non-negative"));
    }

    #[test]
    fn voting_round_rejects_non_numeric_ids() {
        let err = parse_voting_round("abc").unwrap_err();
        assert!(err.message.to_lowercase().contains("numeric"));
    }

    #[test]
    fn voting_round_accepts_zero() {
        assert_eq!(parse_voting_round("0").unwrap(), 0);
    }

    #[test]
    fn feed_validation_rejects_non_canonical_symbols() {
        let feeds = vec![types::FeedId::new(types::FeedCategory::Crypto, "btcusd")];
        assert!(validate_feeds(&feeds).is_err());
    }

    #[test]
    fn sample_error_round_trips_kind() {
        assert_eq!(sample_error().kind, types::ErrorKind::NotFound);
    }
}
