//! Per-adapter configuration: reconnect budget, timeouts, heartbeat cadence.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeAdapterConfig {
    pub name: String,
    pub enabled: bool,
    pub connect_timeout_ms: u64,
    pub max_reconnect_attempts: u32,
    pub initial_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub reconnect_jitter_fraction: f64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
}

impl Default for ExchangeAdapterConfig {
    fn default() -> Self {
        Self {
            name: "adapter".to_string(),
            enabled: true,
            connect_timeout_ms: 10_000,
            max_reconnect_attempts: 10,
            initial_reconnect_delay_ms: 5_000,
            max_reconnect_delay_ms: 60_000,
            reconnect_jitter_fraction: 0.2,
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
        }
    }
}

impl ExchangeAdapterConfig {
    /// Load from `{PREFIX}_*` environment variables, defaulting anything unset.
    pub fn from_env(prefix: &str) -> Self {
        let defaults = Self {
            name: prefix.to_lowercase(),
            ..Self::default()
        };
        Self {
            name: defaults.name.clone(),
            enabled: env_parsed(&format!("{prefix}_ENABLED"), defaults.enabled),
            connect_timeout_ms: env_parsed(
                &format!("{prefix}_CONNECT_TIMEOUT_MS"),
                defaults.connect_timeout_ms,
            ),
            max_reconnect_attempts: env_parsed(
                &format!("{prefix}_MAX_RECONNECT_ATTEMPTS"),
                defaults.max_reconnect_attempts,
            ),
            initial_reconnect_delay_ms: env_parsed(
                &format!("{prefix}_INITIAL_RECONNECT_DELAY_MS"),
                defaults.initial_reconnect_delay_ms,
            ),
            max_reconnect_delay_ms: env_parsed(
                &format!("{prefix}_MAX_RECONNECT_DELAY_MS"),
                defaults.max_reconnect_delay_ms,
            ),
            reconnect_jitter_fraction: env_parsed(
                &format!("{prefix}_RECONNECT_JITTER_FRACTION"),
                defaults.reconnect_jitter_fraction,
            ),
            ping_interval_ms: env_parsed(&format!("{prefix}_PING_INTERVAL_MS"), defaults.ping_interval_ms),
            pong_timeout_ms: env_parsed(&format!("{prefix}_PONG_TIMEOUT_MS"), defaults.pong_timeout_ms),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_reconnect_attempts == 0 {
            return Err("max_reconnect_attempts must be greater than 0".to_string());
        }
        if self.initial_reconnect_delay_ms > self.max_reconnect_delay_ms {
            return Err("initial_reconnect_delay_ms cannot exceed max_reconnect_delay_ms".to_string());
        }
        Ok(())
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(ExchangeAdapterConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_delay_bounds() {
        let mut config = ExchangeAdapterConfig::default();
        config.initial_reconnect_delay_ms = 120_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_env_reads_prefixed_vars() {
        env::set_var("TESTEX_MAX_RECONNECT_ATTEMPTS", "3");
        let config = ExchangeAdapterConfig::from_env("TESTEX");
        assert_eq!(config.max_reconnect_attempts, 3);
        env::remove_var("TESTEX_MAX_RECONNECT_ATTEMPTS");
    }
}
