//! Validates raw [`PriceUpdate`]s against freshness, range, type, and
//! outlier rules before they reach the aggregator.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use types::{PriceUpdate, Severity, ValidationError, ValidationResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub max_age_ms: i64,
    pub min_price: f64,
    pub max_price: f64,
    pub outlier_threshold: f64,
    pub result_cache_ttl_ms: u64,
    pub result_cache_max_entries: usize,
    pub batch_validation_enabled: bool,
    pub realtime_validation_enabled: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 2_000,
            min_price: f64::MIN_POSITIVE,
            max_price: f64::MAX,
            outlier_threshold: 0.05,
            result_cache_ttl_ms: 1_000,
            result_cache_max_entries: 10_000,
            batch_validation_enabled: true,
            realtime_validation_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ValidationEvent {
    Passed { symbol: String, source: String },
    Failed { symbol: String, source: String, errors: Vec<ValidationError> },
    CriticalError { symbol: String, source: String, message: String },
}

#[derive(Clone)]
struct CachedResult {
    result: ValidationResult,
    inserted_at: Instant,
}

/// Keyed by `(source, symbol, timestamp)` per the data-model contract.
type CacheKey = (String, String, i64);

pub struct Validator {
    config: ValidatorConfig,
    cache: DashMap<CacheKey, CachedResult>,
    events: Option<mpsc::UnboundedSender<ValidationEvent>>,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, sender: mpsc::UnboundedSender<ValidationEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: ValidationEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Validates one update. `recent_median` is the rolling median price for
    /// the same feed, used for the outlier check; `None` skips that rule
    /// (nothing to compare against yet). `trusted_majority` lists source ids
    /// the outlier rule is allowed to defer to.
    pub fn validate(
        &self,
        update: &PriceUpdate,
        now_ms: i64,
        recent_median: Option<f64>,
        trusted_majority: &[String],
    ) -> ValidationResult {
        if !self.config.realtime_validation_enabled {
            return ValidationResult::valid(update.confidence, now_ms);
        }

        let key = (update.source.clone(), update.symbol.clone(), update.timestamp);
        if let Some(cached) = self.cache.get(&key) {
            if cached.inserted_at.elapsed().as_millis() as u64 <= self.config.result_cache_ttl_ms {
                return cached.result.clone();
            }
        }

        let result = self.run_rules(update, now_ms, recent_median, trusted_majority);
        self.insert_cache(key, result.clone());

        if result.is_valid {
            self.emit(ValidationEvent::Passed {
                symbol: update.symbol.clone(),
                source: update.source.clone(),
            });
        } else {
            self.emit(ValidationEvent::Failed {
                symbol: update.symbol.clone(),
                source: update.source.clone(),
                errors: result.errors.clone(),
            });
            if result.has_critical_error() {
                self.emit(ValidationEvent::CriticalError {
                    symbol: update.symbol.clone(),
                    source: update.source.clone(),
                    message: "critical validation failure".to_string(),
                });
            }
        }

        result
    }

    /// Same rules applied to a batch. When batch validation is disabled,
    /// every input passes through unchanged with its own confidence.
    pub fn validate_batch(
        &self,
        updates: &[PriceUpdate],
        now_ms: i64,
        recent_median: Option<f64>,
        trusted_majority: &[String],
    ) -> Vec<ValidationResult> {
        if !self.config.batch_validation_enabled {
            return updates
                .iter()
                .map(|u| ValidationResult::valid(u.confidence, now_ms))
                .collect();
        }
        updates
            .iter()
            .map(|u| self.validate(u, now_ms, recent_median, trusted_majority))
            .collect()
    }

    fn insert_cache(&self, key: CacheKey, result: ValidationResult) {
        if self.cache.len() >= self.config.result_cache_max_entries {
            if let Some(oldest_key) = self
                .cache
                .iter()
                .min_by_key(|entry| entry.value().inserted_at)
                .map(|entry| entry.key().clone())
            {
                self.cache.remove(&oldest_key);
            }
        }
        self.cache.insert(
            key,
            CachedResult {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    fn run_rules(
        &self,
        update: &PriceUpdate,
        now_ms: i64,
        recent_median: Option<f64>,
        trusted_majority: &[String],
    ) -> ValidationResult {
        let mut errors = Vec::new();

        if !update.price.is_finite() || update.price <= 0.0 {
            errors.push(ValidationError {
                kind: "type".to_string(),
                severity: Severity::Critical,
                operation: "type_check".to_string(),
                message: format!("price {} is not finite and positive", update.price),
            });
        }
        if update.timestamp < 0 {
            errors.push(ValidationError {
                kind: "type".to_string(),
                severity: Severity::Critical,
                operation: "type_check".to_string(),
                message: "timestamp must be non-negative".to_string(),
            });
        }

        let age_ms = now_ms - update.timestamp;
        if age_ms > self.config.max_age_ms {
            errors.push(ValidationError {
                kind: "freshness".to_string(),
                severity: Severity::High,
                operation: "freshness_check".to_string(),
                message: format!("update age {age_ms}ms exceeds max {}ms", self.config.max_age_ms),
            });
        }

        if update.price.is_finite() && (update.price < self.config.min_price || update.price > self.config.max_price) {
            errors.push(ValidationError {
                kind: "range".to_string(),
                severity: Severity::High,
                operation: "range_check".to_string(),
                message: format!(
                    "price {} outside [{}, {}]",
                    update.price, self.config.min_price, self.config.max_price
                ),
            });
        }

        if let Some(median) = recent_median {
            if median > 0.0 && update.price.is_finite() {
                let deviation = (update.price - median).abs() / median;
                if deviation > self.config.outlier_threshold {
                    let overridden = trusted_majority.contains(&update.source);
                    if !overridden {
                        errors.push(ValidationError {
                            kind: "outlier".to_string(),
                            severity: Severity::Medium,
                            operation: "outlier_check".to_string(),
                            message: format!(
                                "relative deviation {:.4} from median {median} exceeds threshold {}",
                                deviation, self.config.outlier_threshold
                            ),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            ValidationResult::valid(update.confidence, now_ms)
        } else {
            ValidationResult::rejected(errors, now_ms)
        }
    }
}

pub fn shared(config: ValidatorConfig) -> Arc<Validator> {
    Arc::new(Validator::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_update() -> PriceUpdate {
        PriceUpdate::new("BTC/USD", 50_000.0, 1_000, "binance").with_confidence(0.9)
    }

    #[test]
    fn fresh_in_range_update_passes() {
        let validator = Validator::new(ValidatorConfig::default());
        let result = validator.validate(&fresh_update(), 1_500, None, &[]);
        assert!(result.is_valid);
    }

    #[test]
    fn stale_update_is_rejected() {
        let validator = Validator::new(ValidatorConfig::default());
        let result = validator.validate(&fresh_update(), 10_000, None, &[]);
        assert!(!result.is_valid);
    }

    #[test]
    fn non_finite_price_is_critical() {
        let validator = Validator::new(ValidatorConfig::default());
        let update = PriceUpdate::new("BTC/USD", f64::NAN, 1_000, "binance");
        let result = validator.validate(&update, 1_000, None, &[]);
        assert!(result.has_critical_error());
    }

    #[test]
    fn outlier_rejected_unless_source_is_trusted_majority() {
        let validator = Validator::new(ValidatorConfig::default());
        let update = PriceUpdate::new("BTC/USD", 60_000.0, 1_000, "sketchy-exchange");
        let rejected = validator.validate(&update, 1_000, Some(50_000.0), &[]);
        assert!(!rejected.is_valid);

        let overridden = validator.validate(&update, 1_000, Some(50_000.0), &["sketchy-exchange".to_string()]);
        assert!(overridden.is_valid);
    }

    #[test]
    fn repeated_key_hits_the_result_cache() {
        let validator = Validator::new(ValidatorConfig::default());
        let update = fresh_update();
        let first = validator.validate(&update, 1_500, None, &[]);
        let second = validator.validate(&update, 1_500, None, &[]);
        assert_eq!(first.is_valid, second.is_valid);
        assert_eq!(validator.cache.len(), 1);
    }

    #[test]
    fn disabled_realtime_validation_is_a_passthrough() {
        let validator = Validator::new(ValidatorConfig {
            realtime_validation_enabled: false,
            ..ValidatorConfig::default()
        });
        let update = PriceUpdate::new("BTC/USD", f64::NAN, -5, "binance").with_confidence(0.7);
        let result = validator.validate(&update, 1_000, None, &[]);
        assert!(result.is_valid);
        assert_eq!(result.confidence, 0.7);
    }
}
