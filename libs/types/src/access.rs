//! Per-feed access pattern tracked by the cache warmer (C7).

use crate::feed::FeedId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPattern {
    pub feed: FeedId,
    pub access_count: u64,
    pub last_access: i64,
    /// Exponential moving rate of access, in accesses/sec, halved every
    /// `decay_half_life_sec` (see `warmer::Warmer`).
    pub exponential_moving_rate: f64,
}

impl AccessPattern {
    pub fn new(feed: FeedId, now: i64) -> Self {
        Self {
            feed,
            access_count: 0,
            last_access: now,
            exponential_moving_rate: 0.0,
        }
    }
}
