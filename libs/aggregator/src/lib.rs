//! Fuses validated updates for one feed into a single price with a
//! confidence score and a consensus score, via weighted median with
//! time decay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::{AggregatedPrice, PriceUpdate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    pub max_staleness_sec: f64,
    pub time_decay_factor: f64,
    pub min_sources: usize,
    /// Relative tolerance for "within epsilon of M" when computing confidence.
    pub epsilon: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_staleness_sec: 5.0,
            time_decay_factor: 0.1,
            min_sources: 2,
            epsilon: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateError {
    InsufficientSources { have: usize, need: usize },
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::InsufficientSources { have, need } => {
                write!(f, "insufficient sources: have {have}, need {need}")
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Aggregates `updates` (already validated, all for the same feed) into one
/// price as of `now_ms`. All math is IEEE-754 double; callers must reject
/// `NaN`/`Infinity` before this point (the validator's type rule does so).
pub fn aggregate(
    updates: &[PriceUpdate],
    now_ms: i64,
    voting_round: Option<u64>,
    config: &AggregatorConfig,
) -> Result<AggregatedPrice, AggregateError> {
    let weighted: Vec<(f64, f64, String)> = updates
        .iter()
        .filter_map(|u| {
            let age_sec = (now_ms - u.timestamp) as f64 / 1000.0;
            if age_sec > config.max_staleness_sec || age_sec < 0.0 {
                return None;
            }
            let weight = u.confidence * (-config.time_decay_factor * age_sec).exp();
            Some((u.price, weight, u.source.clone()))
        })
        .collect();

    let distinct_sources: std::collections::BTreeSet<&str> =
        weighted.iter().map(|(_, _, s)| s.as_str()).collect();
    if distinct_sources.len() < config.min_sources {
        return Err(AggregateError::InsufficientSources {
            have: distinct_sources.len(),
            need: config.min_sources,
        });
    }

    let median = weighted_median(&weighted);
    let mad = median_absolute_deviation(&weighted, median);
    let consensus_score = if median.abs() > f64::EPSILON {
        (1.0 - mad / median.abs()).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let total_weight: f64 = weighted.iter().map(|(_, w, _)| w).sum();
    let within_epsilon_weight: f64 = weighted
        .iter()
        .filter(|(price, _, _)| relative_deviation(*price, median) <= config.epsilon)
        .map(|(_, w, _)| w)
        .sum();
    let confidence = if total_weight > 0.0 {
        (within_epsilon_weight / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let mut sources: Vec<String> = distinct_sources.into_iter().map(str::to_string).collect();
    sources.sort();

    Ok(AggregatedPrice {
        symbol: updates[0].symbol.clone(),
        price: median,
        timestamp: now_ms,
        sources,
        confidence,
        consensus_score,
        voting_round,
    })
}

fn relative_deviation(price: f64, median: f64) -> f64 {
    if median.abs() > f64::EPSILON {
        (price - median).abs() / median.abs()
    } else {
        (price - median).abs()
    }
}

/// Weighted median via the cumulative-weight midpoint method: each entry
/// occupies the interval of its weight in the sorted cumulative
/// distribution, and the median is read off at the point where the 50th
/// percentile falls within or between those interval midpoints. This
/// reduces to the plain middle element when an entry's midpoint lands
/// exactly on the 50th percentile (the odd-count case) and linearly
/// interpolates between the two straddling prices otherwise (the
/// even-count tie-break). Identical prices are grouped first so their
/// weights aggregate before the percentile lookup.
fn weighted_median(weighted: &[(f64, f64, String)]) -> f64 {
    let mut grouped: BTreeMap<OrderedFloatKey, f64> = BTreeMap::new();
    for (price, weight, _) in weighted {
        *grouped.entry(OrderedFloatKey(*price)).or_insert(0.0) += weight;
    }

    let entries: Vec<(f64, f64)> = grouped.into_iter().map(|(k, w)| (k.0, w)).collect();
    let total: f64 = entries.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return entries.first().map(|(p, _)| *p).unwrap_or(0.0);
    }

    let mut cumulative = 0.0;
    let midpoints: Vec<f64> = entries
        .iter()
        .map(|(_, weight)| {
            let midpoint = cumulative + weight / 2.0;
            cumulative += weight;
            midpoint
        })
        .collect();

    let half = total / 2.0;
    for (i, &midpoint) in midpoints.iter().enumerate() {
        if (midpoint - half).abs() < 1e-9 {
            return entries[i].0;
        }
        if midpoint > half {
            if i == 0 {
                return entries[i].0;
            }
            let (prev_price, _) = entries[i - 1];
            let (price, _) = entries[i];
            let prev_midpoint = midpoints[i - 1];
            let span = midpoint - prev_midpoint;
            if span.abs() < 1e-12 {
                return (prev_price + price) / 2.0;
            }
            let fraction = (half - prev_midpoint) / span;
            return prev_price + (price - prev_price) * fraction;
        }
    }

    entries.last().map(|(p, _)| *p).unwrap_or(0.0)
}

fn median_absolute_deviation(weighted: &[(f64, f64, String)], median: f64) -> f64 {
    let deviations: Vec<(f64, f64, String)> = weighted
        .iter()
        .map(|(price, weight, source)| ((price - median).abs(), *weight, source.clone()))
        .collect();
    weighted_median(&deviations)
}

#[derive(PartialEq, PartialOrd)]
struct OrderedFloatKey(f64);
impl Eq for OrderedFloatKey {}
impl Ord for OrderedFloatKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(std::cmp::Ordering::Equal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(price: f64, source: &str, ms_ago: i64) -> PriceUpdate {
        PriceUpdate::new("BTC/USD", price, 10_000 - ms_ago, source).with_confidence(1.0)
    }

    #[test]
    fn aggregates_odd_count_to_exact_median() {
        let updates = vec![
            update(100.0, "a", 0),
            update(101.0, "b", 0),
            update(102.0, "c", 0),
        ];
        let result = aggregate(&updates, 10_000, None, &AggregatorConfig::default()).unwrap();
        assert_eq!(result.price, 101.0);
        assert_eq!(result.sources, vec!["a", "b", "c"]);
    }

    #[test]
    fn insufficient_sources_fails() {
        let updates = vec![update(100.0, "a", 0)];
        let result = aggregate(&updates, 10_000, None, &AggregatorConfig::default());
        assert_eq!(
            result,
            Err(AggregateError::InsufficientSources { have: 1, need: 2 })
        );
    }

    #[test]
    fn stale_updates_are_dropped_before_aggregation() {
        let updates = vec![
            update(100.0, "a", 0),
            update(999.0, "b", 10_000), // 10s old, beyond 5s max staleness
        ];
        let result = aggregate(&updates, 10_000, None, &AggregatorConfig::default());
        assert!(matches!(result, Err(AggregateError::InsufficientSources { .. })));
    }

    #[test]
    fn consensus_score_is_lower_for_dispersed_prices() {
        let tight = vec![update(100.0, "a", 0), update(100.1, "b", 0), update(99.9, "c", 0)];
        let wide = vec![update(100.0, "a", 0), update(150.0, "b", 0), update(50.0, "c", 0)];
        let tight_result = aggregate(&tight, 10_000, None, &AggregatorConfig::default()).unwrap();
        let wide_result = aggregate(&wide, 10_000, None, &AggregatorConfig::default()).unwrap();
        assert!(tight_result.consensus_score > wide_result.consensus_score);
    }

    #[test]
    fn aggregates_even_count_by_interpolating_between_straddling_prices() {
        let config = AggregatorConfig { time_decay_factor: 0.1, ..AggregatorConfig::default() };
        let updates = vec![
            PriceUpdate::new("BTC/USD", 100.00, 9_900, "a").with_confidence(0.9),
            PriceUpdate::new("BTC/USD", 100.10, 9_800, "b").with_confidence(0.9),
        ];
        let result = aggregate(&updates, 10_000, None, &config).unwrap();
        assert!(
            (result.price - 100.05).abs() < 0.01,
            "expected interpolated price near 100.05, got {}",
            result.price
        );
    }

    #[test]
    fn voting_round_is_carried_through() {
        let updates = vec![update(100.0, "a", 0), update(101.0, "b", 0)];
        let result = aggregate(&updates, 10_000, Some(42), &AggregatorConfig::default()).unwrap();
        assert_eq!(result.voting_round, Some(42));
    }
}
