//! Per-client sliding-window admission control for the inbound HTTP surface.
//! Distinct from the outbound, per-exchange courtesy limiter the adapters use
//! against upstream APIs.

use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    /// If true, a request whose outcome turns out successful is released
    /// back (doesn't count against the limit) via `release`.
    pub skip_successful_requests: bool,
    pub skip_failed_requests: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining_points: u32,
    pub ms_before_next: u64,
    pub total_hits: u32,
}

struct ClientRecord {
    timestamps: VecDeque<i64>,
    last_seen: i64,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<String, ClientRecord>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    /// Admits or blocks a request from `client_id` at `now_ms`, recording the
    /// hit on admission. Callers that can determine the eventual outcome
    /// (and whose config skips that outcome) should call `release` after.
    pub fn check(&self, client_id: &str, now_ms: i64) -> Decision {
        let window_start = now_ms - self.config.window_ms as i64;
        let mut record = self
            .clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientRecord {
                timestamps: VecDeque::new(),
                last_seen: now_ms,
            });

        while matches!(record.timestamps.front(), Some(&t) if t < window_start) {
            record.timestamps.pop_front();
        }
        record.last_seen = now_ms;

        let total_hits = record.timestamps.len() as u32;
        if total_hits < self.config.max_requests {
            record.timestamps.push_back(now_ms);
            Decision {
                allowed: true,
                remaining_points: self.config.max_requests - total_hits - 1,
                ms_before_next: 0,
                total_hits: total_hits + 1,
            }
        } else {
            let oldest = *record.timestamps.front().unwrap_or(&now_ms);
            let ms_before_next = (oldest + self.config.window_ms as i64 - now_ms).max(0) as u64;
            Decision {
                allowed: false,
                remaining_points: 0,
                ms_before_next,
                total_hits,
            }
        }
    }

    /// Un-counts the most recent admitted hit for `client_id`, e.g. when
    /// `skip_successful_requests` applies and the request succeeded.
    pub fn release(&self, client_id: &str) {
        if let Some(mut record) = self.clients.get_mut(client_id) {
            record.timestamps.pop_back();
        }
    }

    pub fn should_release(&self, success: bool) -> bool {
        (success && self.config.skip_successful_requests) || (!success && self.config.skip_failed_requests)
    }

    /// Evicts client records idle for more than twice the window, per the
    /// background sweep contract.
    pub fn sweep_idle(&self, now_ms: i64) {
        let idle_cutoff = self.config.window_ms as i64 * 2;
        self.clients.retain(|_, record| now_ms - record.last_seen <= idle_cutoff);
    }
}

/// Client identity resolution order: API key, then bearer token, then an
/// explicit client-id header, then the remote IP. `headers` keys are expected
/// lowercase, matching how most HTTP frameworks normalize them.
pub fn resolve_client_id(headers: &HashMap<String, String>, remote_ip: &str) -> String {
    if let Some(key) = headers.get("x-api-key") {
        return format!("apikey:{key}");
    }
    if let Some(auth) = headers.get("authorization") {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return format!("bearer:{token}");
        }
    }
    if let Some(client_id) = headers.get("x-client-id") {
        return format!("client:{client_id}");
    }
    format!("ip:{remote_ip}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_requests_under_the_limit() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 1_000,
            max_requests: 3,
            ..RateLimitConfig::default()
        });
        for i in 0..3 {
            let decision = limiter.check("a", i);
            assert!(decision.allowed);
        }
        let blocked = limiter.check("a", 3);
        assert!(!blocked.allowed);
    }

    #[test]
    fn window_slides_and_old_hits_expire() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 100,
            max_requests: 1,
            ..RateLimitConfig::default()
        });
        assert!(limiter.check("a", 0).allowed);
        assert!(!limiter.check("a", 50).allowed);
        assert!(limiter.check("a", 150).allowed);
    }

    #[test]
    fn release_uncounts_the_last_admitted_hit() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 1_000,
            max_requests: 1,
            skip_successful_requests: true,
            ..RateLimitConfig::default()
        });
        let decision = limiter.check("a", 0);
        assert!(decision.allowed);
        assert!(limiter.should_release(true));
        limiter.release("a");

        assert!(limiter.check("a", 1).allowed);
    }

    #[test]
    fn identity_resolution_prefers_api_key_over_ip() {
        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), "secret".to_string());
        headers.insert("x-client-id".to_string(), "ignored".to_string());
        assert_eq!(resolve_client_id(&headers, "127.0.0.1"), "apikey:secret");
    }

    #[test]
    fn identity_falls_back_to_remote_ip() {
        let headers = HashMap::new();
        assert_eq!(resolve_client_id(&headers, "10.0.0.5"), "ip:10.0.0.5");
    }

    #[test]
    fn sweep_evicts_only_long_idle_clients() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_ms: 100,
            max_requests: 10,
            ..RateLimitConfig::default()
        });
        limiter.check("stale", 0);
        limiter.check("fresh", 1_000);
        limiter.sweep_idle(1_000);
        assert!(limiter.clients.get("stale").is_none());
        assert!(limiter.clients.get("fresh").is_some());
    }
}
