use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use provider_config::ProviderSettings;

use crate::orchestrator::Orchestrator;

#[derive(Default)]
pub struct ApiMetrics {
    pub requests: AtomicU64,
    pub responses: AtomicU64,
    pub errors: AtomicU64,
}

impl ApiMetrics {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, is_error: bool) {
        self.responses.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ProviderSettings>,
    pub orchestrator: Arc<Orchestrator>,
    pub rate_limiter: Arc<ratelimit::RateLimiter>,
    pub performance_monitor: Arc<performance_monitor::PerformanceMonitor>,
    pub api_metrics: Arc<ApiMetrics>,
    pub warm_fetch: warmer::FetchCallback,
    pub started_at: Instant,
}
