//! Provider-wide settings loaded from environment variables (§6).
//!
//! Every field has a production-sane default so the provider boots without a
//! `.env` file in development; operators override via environment in every
//! other deployment.

use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub listen_port: u16,
    pub base_path: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_ms: u64,
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,
    pub graceful_shutdown_ms: u64,
    pub readiness_check_timeout_ms: u64,
    pub log_level: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            base_path: "/".to_string(),
            rate_limit_max_requests: 100,
            rate_limit_window_ms: 60_000,
            cache_ttl_ms: 1_000,
            cache_max_entries: 10_000,
            graceful_shutdown_ms: 30_000,
            readiness_check_timeout_ms: 5_000,
            log_level: "info".to_string(),
        }
    }
}

impl ProviderSettings {
    /// Load from environment, falling back to defaults for anything unset
    /// or unparseable. A malformed value is logged and treated as unset
    /// rather than failing startup; only `validate` is fatal.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_port: env_parsed("LISTEN_PORT", defaults.listen_port),
            base_path: env::var("BASE_PATH").unwrap_or(defaults.base_path),
            rate_limit_max_requests: env_parsed(
                "RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
            rate_limit_window_ms: env_parsed("RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms),
            cache_ttl_ms: env_parsed("CACHE_TTL_MS", defaults.cache_ttl_ms),
            cache_max_entries: env_parsed("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            graceful_shutdown_ms: env_parsed("GRACEFUL_SHUTDOWN_MS", defaults.graceful_shutdown_ms),
            readiness_check_timeout_ms: env_parsed(
                "READINESS_CHECK_TIMEOUT_MS",
                defaults.readiness_check_timeout_ms,
            ),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Startup validation. Failure here is a `ConfigurationError` (§7) and the
    /// caller should exit with code 1.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("LISTEN_PORT must be nonzero".to_string());
        }
        if self.rate_limit_max_requests == 0 {
            return Err("RATE_LIMIT_MAX_REQUESTS must be nonzero".to_string());
        }
        if self.cache_max_entries == 0 {
            return Err("CACHE_MAX_ENTRIES must be nonzero".to_string());
        }
        if !self.base_path.starts_with('/') {
            return Err("BASE_PATH must start with '/'".to_string());
        }
        Ok(())
    }

    /// Current-view TTL clamp per the data-model invariant: requested TTLs
    /// above 1000ms are silently capped.
    pub fn clamp_current_ttl_ms(&self, requested_ms: u64) -> u64 {
        requested_ms.min(1_000)
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
        assert!(ProviderSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut settings = ProviderSettings::default();
        settings.listen_port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn ttl_clamp_never_exceeds_one_second() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.clamp_current_ttl_ms(5_000), 1_000);
        assert_eq!(settings.clamp_current_ttl_ms(500), 500);
    }
}
