//! Per-update validation outcomes (C4 contract).

use crate::update::PriceUpdate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single rule failure or warning, tagged with the rule's operation name
/// (e.g. `"freshness"`, `"range"`, `"outlier"`) so callers can attribute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub kind: String,
    pub severity: Severity,
    pub operation: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: impl Into<String>, severity: Severity, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            severity,
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Outcome of running the validator's rule set against one `PriceUpdate`.
///
/// If `is_valid` and `adjusted_update` is `Some`, the adjusted form replaces
/// the input for every downstream consumer (aggregator, cache writes, etc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
    pub confidence: f64,
    pub adjusted_update: Option<PriceUpdate>,
    pub timestamp: i64,
}

impl ValidationResult {
    pub fn valid(confidence: f64, timestamp: i64) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            confidence,
            adjusted_update: None,
            timestamp,
        }
    }

    pub fn rejected(errors: Vec<ValidationError>, timestamp: i64) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
            confidence: 0.0,
            adjusted_update: None,
            timestamp,
        }
    }

    /// The update that should flow downstream: the adjusted form if present,
    /// otherwise the original. Callers should only invoke this when `is_valid`.
    pub fn effective_update<'a>(&'a self, original: &'a PriceUpdate) -> &'a PriceUpdate {
        self.adjusted_update.as_ref().unwrap_or(original)
    }

    pub fn has_critical_error(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_update_prefers_adjusted_form() {
        let original = PriceUpdate::new("BTC/USD", 50_000.0, 1_000, "binance");
        let adjusted = original.clone().with_confidence(0.5);
        let result = ValidationResult {
            adjusted_update: Some(adjusted.clone()),
            ..ValidationResult::valid(0.5, 1_000)
        };
        assert_eq!(result.effective_update(&original), &adjusted);
    }

    #[test]
    fn effective_update_falls_back_to_original() {
        let original = PriceUpdate::new("BTC/USD", 50_000.0, 1_000, "binance");
        let result = ValidationResult::valid(0.9, 1_000);
        assert_eq!(result.effective_update(&original), &original);
    }
}
