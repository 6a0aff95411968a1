//! Outbound courtesy rate limiting against each exchange's own API limits.
//!
//! This is distinct from the provider's inbound, per-client limiter (see the
//! `ratelimit` crate): this one protects *us* from tripping an exchange's
//! connection/request caps, keyed by exchange id rather than by caller.

use governor::{DefaultDirectRateLimiter, Quota};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct RateLimiter {
    limiters: HashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, exchange: impl Into<String>, requests_per_minute: u32) {
        match NonZeroU32::try_from(requests_per_minute) {
            Ok(rate) => {
                let limiter = Arc::new(DefaultDirectRateLimiter::direct(Quota::per_minute(rate)));
                self.limiters.insert(exchange.into(), limiter);
            }
            Err(_) => tracing::warn!(requests_per_minute, "invalid rate limit, ignoring"),
        }
    }

    pub fn check(&self, exchange: &str) -> bool {
        self.limiters
            .get(exchange)
            .map(|limiter| limiter.check().is_ok())
            .unwrap_or(true)
    }

    pub async fn wait(&self, exchange: &str) {
        if let Some(limiter) = self.limiters.get(exchange) {
            limiter.until_ready().await;
        }
    }
}

/// Rolling success/rate-limited counters per exchange, for the health surface.
pub struct RateLimitTracker {
    requests: Arc<dashmap::DashMap<String, RequestStats>>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub fn record(&self, exchange: &str, success: bool) {
        self.requests
            .entry(exchange.to_string())
            .and_modify(|stats| {
                stats.total += 1;
                if success {
                    stats.successful += 1;
                } else {
                    stats.rate_limited += 1;
                }
            })
            .or_insert(RequestStats {
                total: 1,
                successful: u64::from(success),
                rate_limited: u64::from(!success),
            });
    }

    pub fn stats(&self) -> HashMap<String, RequestStats> {
        self.requests
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    pub total: u64,
    pub successful: u64,
    pub rate_limited: u64,
}

impl RequestStats {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }

    pub fn is_heavily_limited(&self) -> bool {
        self.rate_limited > self.successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_exchange_is_unlimited() {
        let limiter = RateLimiter::new();
        assert!(limiter.check("binance"));
    }

    #[test]
    fn tracker_reports_success_rate() {
        let tracker = RateLimitTracker::new();
        tracker.record("coinbase", true);
        tracker.record("coinbase", false);
        let stats = tracker.stats();
        assert_eq!(stats["coinbase"].success_rate(), 0.5);
    }
}
