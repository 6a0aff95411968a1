//! Circuit breaker pattern for fault tolerance around exchange connections.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation, requests pass through.
    Closed,
    /// Failing, requests are rejected outright.
    Open,
    /// Testing recovery with limited requests.
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
    pub half_open_max_failures: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            half_open_max_failures: 1,
        }
    }
}

pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitState>>,
    failure_count: Arc<AtomicU32>,
    success_count: Arc<AtomicU32>,
    last_failure_time: Arc<RwLock<Option<Instant>>>,
    config: CircuitBreakerConfig,
    total_requests: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    circuit_opens: Arc<AtomicU64>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            failure_count: Arc::new(AtomicU32::new(0)),
            success_count: Arc::new(AtomicU32::new(0)),
            last_failure_time: Arc::new(RwLock::new(None)),
            config,
            total_requests: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            circuit_opens: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether the caller should attempt the guarded operation. May flip
    /// `Open` to `HalfOpen` as a side effect once the recovery timeout has
    /// elapsed.
    pub async fn should_attempt(&self) -> bool {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write().await;

        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let last_failure = self.last_failure_time.read().await;
                match *last_failure {
                    Some(failure_time) if failure_time.elapsed() >= self.config.recovery_timeout => {
                        *state = CircuitState::HalfOpen;
                        self.failure_count.store(0, Ordering::Relaxed);
                        self.success_count.store(0, Ordering::Relaxed);
                        tracing::info!("circuit breaker transitioning to half-open");
                        true
                    }
                    _ => false,
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub async fn on_success(&self) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
                if successes >= self.config.success_threshold {
                    *state = CircuitState::Closed;
                    self.failure_count.store(0, Ordering::Relaxed);
                    tracing::info!("circuit breaker closed after {} successes", successes);
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    pub async fn on_failure(&self) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.write().await;
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure_time.write().await = Some(Instant::now());

        match *state {
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    *state = CircuitState::Open;
                    self.circuit_opens.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("circuit breaker opened after {} failures", failures);
                }
            }
            CircuitState::HalfOpen => {
                if failures >= self.config.half_open_max_failures {
                    *state = CircuitState::Open;
                    self.circuit_opens.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("circuit breaker reopened from half-open state");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            circuit_opens: self.circuit_opens.load(Ordering::Relaxed),
            current_failure_count: self.failure_count.load(Ordering::Relaxed),
        }
    }

    pub async fn reset(&self) {
        *self.state.write().await = CircuitState::Closed;
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        *self.last_failure_time.write().await = None;
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub total_requests: u64,
    pub total_failures: u64,
    pub circuit_opens: u64,
    pub current_failure_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });
        assert!(breaker.should_attempt().await);
        breaker.on_failure().await;
        assert!(breaker.should_attempt().await);
        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.should_attempt().await);
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::from_millis(0),
            success_threshold: 2,
            half_open_max_failures: 1,
        });
        breaker.on_failure().await;
        assert!(breaker.should_attempt().await);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
        breaker.on_success().await;
        breaker.on_success().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }
}
