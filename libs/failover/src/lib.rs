//! Tracks, per feed, an ordered list of candidate sources and their health,
//! demoting failing sources and promoting recovered ones back in.

use dashmap::DashMap;
use tokio::sync::mpsc;
use types::{ErrorSeverity, FeedId, SourceHealth, SourceStatus};

#[derive(Debug, Clone)]
pub struct FailoverConfig {
    pub consecutive_timeout_threshold: u32,
    /// A source must keep succeeding for this long after first recovering
    /// before it's promoted from `Recovered` back to `Healthy`.
    pub probation_period_ms: i64,
    pub rerank_on_recovery: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            consecutive_timeout_threshold: 3,
            probation_period_ms: 30_000,
            rerank_on_recovery: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub feed: FeedId,
    pub source: String,
    pub severity: ErrorSeverity,
    pub message: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    health: SourceHealth,
    consecutive_timeouts: u32,
    probation_started_at: Option<i64>,
}

impl Candidate {
    fn new(source_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            health: SourceHealth::new(source_id, now_ms),
            consecutive_timeouts: 0,
            probation_started_at: None,
        }
    }
}

pub struct FailoverCoordinator {
    config: FailoverConfig,
    feeds: DashMap<String, Vec<Candidate>>,
    events: Option<mpsc::UnboundedSender<Alert>>,
}

impl FailoverCoordinator {
    pub fn new(config: FailoverConfig) -> Self {
        Self {
            config,
            feeds: DashMap::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, sender: mpsc::UnboundedSender<Alert>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, alert: Alert) {
        if let Some(sender) = &self.events {
            let _ = sender.send(alert);
        }
    }

    /// Registers the ranked candidate list for `feed`. Replaces any existing
    /// registration; all candidates start `Healthy`.
    pub fn register_candidates(&self, feed: &FeedId, source_ids: &[String], now_ms: i64) {
        let candidates = source_ids.iter().map(|id| Candidate::new(id.clone(), now_ms)).collect();
        self.feeds.insert(feed.cache_key(), candidates);
    }

    /// The highest-ranked candidate currently eligible to serve traffic
    /// (`Healthy` or `Recovered`), in registration order.
    pub fn active_source(&self, feed: &FeedId) -> Option<String> {
        self.feeds.get(&feed.cache_key()).and_then(|candidates| {
            candidates
                .iter()
                .find(|c| matches!(c.health.status, SourceStatus::Healthy | SourceStatus::Recovered))
                .map(|c| c.health.source_id.clone())
        })
    }

    /// Direct failure report (e.g. a connection error). Marks the source
    /// `Unhealthy` immediately and promotes the next eligible candidate.
    pub fn report_failure(&self, feed: &FeedId, source: &str, now_ms: i64) {
        self.mark_unhealthy(feed, source, now_ms, "reported failure");
    }

    /// Records a timeout. After `consecutive_timeout_threshold` in a row, the
    /// source is marked `Unhealthy` the same way a hard failure would.
    pub fn report_timeout(&self, feed: &FeedId, source: &str, now_ms: i64) {
        let crossed_threshold = {
            let Some(mut candidates) = self.feeds.get_mut(&feed.cache_key()) else {
                return;
            };
            let Some(candidate) = candidates.iter_mut().find(|c| c.health.source_id == source) else {
                return;
            };
            candidate.consecutive_timeouts += 1;
            candidate.health.error_count += 1;
            candidate.consecutive_timeouts >= self.config.consecutive_timeout_threshold
        };

        if crossed_threshold {
            self.mark_unhealthy(feed, source, now_ms, "consecutive timeout threshold exceeded");
        }
    }

    fn mark_unhealthy(&self, feed: &FeedId, source: &str, now_ms: i64, reason: &str) {
        let Some(mut candidates) = self.feeds.get_mut(&feed.cache_key()) else {
            return;
        };
        let Some(candidate) = candidates.iter_mut().find(|c| c.health.source_id == source) else {
            return;
        };
        if candidate.health.status == SourceStatus::Unhealthy {
            return;
        }
        candidate.health.status = SourceStatus::Unhealthy;
        candidate.health.last_update = now_ms;
        candidate.health.error_count += 1;
        candidate.probation_started_at = None;
        drop(candidates);

        self.emit(Alert {
            feed: feed.clone(),
            source: source.to_string(),
            severity: ErrorSeverity::Critical,
            message: format!("source {source} marked unhealthy: {reason}"),
        });
    }

    /// Records a valid update from `source`. An `Unhealthy` source enters
    /// probation (`Recovered`); a `Recovered` source that has held for the
    /// full probation period is promoted to `Healthy` and, if configured,
    /// re-ranked to the front of the candidate list.
    pub fn report_success(&self, feed: &FeedId, source: &str, now_ms: i64) {
        let transition = {
            let Some(mut candidates) = self.feeds.get_mut(&feed.cache_key()) else {
                return;
            };
            let Some(candidate) = candidates.iter_mut().find(|c| c.health.source_id == source) else {
                return;
            };
            candidate.consecutive_timeouts = 0;
            candidate.health.last_update = now_ms;

            match candidate.health.status {
                SourceStatus::Unhealthy => {
                    candidate.health.status = SourceStatus::Recovered;
                    candidate.probation_started_at = Some(now_ms);
                    Some((SourceStatus::Recovered, false))
                }
                SourceStatus::Recovered => {
                    let started = candidate.probation_started_at.unwrap_or(now_ms);
                    if now_ms - started >= self.config.probation_period_ms {
                        candidate.health.status = SourceStatus::Healthy;
                        candidate.health.recovery_count += 1;
                        candidate.probation_started_at = None;
                        Some((SourceStatus::Healthy, true))
                    } else {
                        None
                    }
                }
                SourceStatus::Healthy | SourceStatus::Degraded => None,
            }
        };

        let Some((new_status, promoted)) = transition else {
            return;
        };

        if promoted && self.config.rerank_on_recovery {
            if let Some(mut candidates) = self.feeds.get_mut(&feed.cache_key()) {
                if let Some(pos) = candidates.iter().position(|c| c.health.source_id == source) {
                    let candidate = candidates.remove(pos);
                    candidates.insert(0, candidate);
                }
            }
        }

        self.emit(Alert {
            feed: feed.clone(),
            source: source.to_string(),
            severity: ErrorSeverity::Low,
            message: format!("source {source} transitioned to {new_status:?}"),
        });
    }

    pub fn candidate_health(&self, feed: &FeedId) -> Vec<SourceHealth> {
        self.feeds
            .get(&feed.cache_key())
            .map(|candidates| candidates.iter().map(|c| c.health.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FeedCategory;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    fn coordinator() -> FailoverCoordinator {
        let c = FailoverCoordinator::new(FailoverConfig::default());
        c.register_candidates(&feed(), &["binance".to_string(), "coinbase".to_string()], 0);
        c
    }

    #[test]
    fn primary_candidate_serves_by_default() {
        let c = coordinator();
        assert_eq!(c.active_source(&feed()), Some("binance".to_string()));
    }

    #[test]
    fn failure_promotes_the_next_candidate() {
        let c = coordinator();
        c.report_failure(&feed(), "binance", 1_000);
        assert_eq!(c.active_source(&feed()), Some("coinbase".to_string()));
    }

    #[test]
    fn timeouts_below_threshold_do_not_demote() {
        let c = coordinator();
        c.report_timeout(&feed(), "binance", 1);
        c.report_timeout(&feed(), "binance", 2);
        assert_eq!(c.active_source(&feed()), Some("binance".to_string()));
    }

    #[test]
    fn timeouts_at_threshold_demote() {
        let c = coordinator();
        for ms in 1..=3 {
            c.report_timeout(&feed(), "binance", ms);
        }
        assert_eq!(c.active_source(&feed()), Some("coinbase".to_string()));
    }

    #[test]
    fn success_after_failure_enters_recovered_not_healthy() {
        let c = coordinator();
        c.report_failure(&feed(), "binance", 0);
        c.report_success(&feed(), "binance", 100);

        let health = c.candidate_health(&feed());
        let binance = health.iter().find(|h| h.source_id == "binance").unwrap();
        assert_eq!(binance.status, SourceStatus::Recovered);
    }

    #[test]
    fn promotion_to_healthy_requires_full_probation_and_reranks() {
        let c = coordinator();
        c.report_failure(&feed(), "binance", 0);
        c.report_success(&feed(), "binance", 100); // -> Recovered
        c.report_success(&feed(), "binance", 200); // still within probation
        let health = c.candidate_health(&feed());
        assert_eq!(health.iter().find(|h| h.source_id == "binance").unwrap().status, SourceStatus::Recovered);

        c.report_success(&feed(), "binance", 100 + FailoverConfig::default().probation_period_ms);
        let health = c.candidate_health(&feed());
        assert_eq!(health[0].source_id, "binance");
        assert_eq!(health[0].status, SourceStatus::Healthy);
    }
}
