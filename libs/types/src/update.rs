//! Raw ticks as emitted by exchange adapters.

use serde::{Deserialize, Serialize};

/// A single price observation from one exchange. Immutable once emitted;
/// the validator may produce an adjusted copy but never mutates the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Exchange identifier, e.g. `"binance"`.
    pub source: String,
    pub volume: Option<f64>,
    /// Confidence in `[0, 1]`, computed by the adapter from latency/volume/spread.
    pub confidence: f64,
}

impl PriceUpdate {
    pub fn new(symbol: impl Into<String>, price: f64, timestamp: i64, source: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            source: source.into(),
            volume: None,
            confidence: 1.0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// `now - timestamp`, in milliseconds. Negative when the tick claims to be
    /// from the future; callers treat that as maximally stale, not as fresh.
    pub fn freshness_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }
}

/// Trade volume observed over a rolling window, reported alongside price
/// updates for venues that expose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeUpdate {
    pub symbol: String,
    pub source: String,
    pub window_sec: u32,
    pub volume: f64,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freshness_is_relative_to_supplied_now() {
        let update = PriceUpdate::new("BTC/USD", 50_000.0, 1_000, "binance");
        assert_eq!(update.freshness_ms(1_500), 500);
        assert_eq!(update.freshness_ms(500), -500);
    }
}
