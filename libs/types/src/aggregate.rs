//! Output of the aggregator (C5): one fused price per feed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPrice {
    pub symbol: String,
    pub price: f64,
    pub timestamp: i64,
    /// Distinct exchange ids that contributed to this aggregation.
    pub sources: Vec<String>,
    pub confidence: f64,
    /// Agreement among contributing sources, in `[0, 1]`.
    pub consensus_score: f64,
    pub voting_round: Option<u64>,
}

impl AggregatedPrice {
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}
