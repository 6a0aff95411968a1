//! Exponential backoff with jitter for the reconnect loop (base 5s, cap 60s).

use rand::Rng;
use std::time::Duration;

use crate::config::ExchangeAdapterConfig;

pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    jitter_fraction: f64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &ExchangeAdapterConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_reconnect_delay_ms),
            max: Duration::from_millis(config.max_reconnect_delay_ms),
            jitter_fraction: config.reconnect_jitter_fraction,
            max_attempts: config.max_reconnect_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before reconnect attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial.as_millis() as f64 * 2f64.powi(attempt.saturating_sub(1) as i32);
        let capped_ms = base_ms.min(self.max.as_millis() as f64);

        let jitter = rand::thread_rng().gen_range(-self.jitter_fraction..=self.jitter_fraction);
        let jittered_ms = (capped_ms * (1.0 + jitter)).max(0.0);

        Duration::from_millis(jittered_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::from_config(&ExchangeAdapterConfig {
            initial_reconnect_delay_ms: 5_000,
            max_reconnect_delay_ms: 60_000,
            reconnect_jitter_fraction: 0.2,
            max_reconnect_attempts: 10,
            ..ExchangeAdapterConfig::default()
        })
    }

    #[test]
    fn delay_grows_then_saturates_at_cap() {
        let policy = policy();
        let d1 = policy.delay_for_attempt(1).as_millis() as f64;
        let d5 = policy.delay_for_attempt(5).as_millis() as f64;
        let d10 = policy.delay_for_attempt(10).as_millis() as f64;
        assert!(d1 <= 6_000.0);
        assert!(d5 > d1);
        assert!(d10 <= 72_000.0); // cap plus jitter headroom
    }

    #[test]
    fn jitter_stays_within_configured_fraction() {
        let policy = policy();
        for attempt in 1..=3 {
            let delay_ms = policy.delay_for_attempt(attempt).as_millis() as f64;
            let base_ms = 5_000.0 * 2f64.powi((attempt - 1) as i32);
            assert!(delay_ms <= base_ms * 1.2 + 1.0);
            assert!(delay_ms >= base_ms * 0.8 - 1.0);
        }
    }
}
