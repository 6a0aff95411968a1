//! Source health as tracked by the failover coordinator (C9).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Recovered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub status: SourceStatus,
    pub last_update: i64,
    pub error_count: u32,
    pub recovery_count: u32,
}

impl SourceHealth {
    pub fn new(source_id: impl Into<String>, now: i64) -> Self {
        Self {
            source_id: source_id.into(),
            status: SourceStatus::Healthy,
            last_update: now,
            error_count: 0,
            recovery_count: 0,
        }
    }
}
