//! Request/response shapes for the HTTP surface. Unknown fields are rejected
//! at the edge rather than silently ignored (mirrors `forbidNonWhitelisted`).

use serde::{Deserialize, Serialize};
use types::{AggregatedPrice, FeedId};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedValuesRequest {
    pub feeds: Vec<FeedId>,
}

#[derive(Debug, Serialize)]
pub struct FeedValueDto {
    pub price: f64,
    pub timestamp: i64,
    pub sources: Vec<String>,
    pub confidence: f64,
    pub consensus_score: f64,
}

impl From<&AggregatedPrice> for FeedValueDto {
    fn from(price: &AggregatedPrice) -> Self {
        Self {
            price: price.price,
            timestamp: price.timestamp,
            sources: price.sources.clone(),
            confidence: price.confidence,
            consensus_score: price.consensus_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedDataItem {
    pub feed: FeedId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FeedValueDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FeedValuesResponse {
    pub feeds: Vec<FeedId>,
    pub data: Vec<FeedDataItem>,
}

#[derive(Debug, Serialize)]
pub struct RoundFeedValuesResponse {
    pub voting_round_id: u64,
    pub data: Vec<FeedDataItem>,
}

#[derive(Debug, Deserialize)]
pub struct VolumesQuery {
    pub window_sec: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct VolumeDataItem {
    pub feed: FeedId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VolumesResponse {
    pub feeds: Vec<FeedId>,
    pub window_sec: u32,
    pub data: Vec<VolumeDataItem>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub services: std::collections::HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub alive: bool,
    pub uptime: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub timestamp: i64,
    pub metrics: cache::CacheStats,
}

#[derive(Debug, Serialize)]
pub struct ApiMetricsResponse {
    pub requests: u64,
    pub responses: u64,
    pub errors: u64,
}

#[derive(Debug, Serialize)]
pub struct PerformanceMetricsResponse {
    pub response_time: ResponseTimeDto,
    pub throughput: f64,
}

#[derive(Debug, Serialize)]
pub struct ResponseTimeDto {
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}
