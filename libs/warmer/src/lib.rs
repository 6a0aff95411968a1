//! Tracks how often each feed is queried and proactively refreshes entries
//! that are about to go stale, so a warm entry is usually ready before a
//! caller asks for it.

use cache::Cache;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use types::{AggregatedPrice, FeedId};

#[derive(Debug, Clone)]
pub struct WarmerConfig {
    pub decay_half_life_sec: f64,
    /// Moving access rate (roughly: weighted accesses) above which a feed is
    /// considered hot enough to warm.
    pub warming_threshold: f64,
    /// A current-view entry within this many ms of expiry is eligible for a
    /// proactive refresh even if it hasn't expired yet.
    pub refresh_margin_ms: i64,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            decay_half_life_sec: 300.0,
            warming_threshold: 3.0,
            refresh_margin_ms: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WarmerEvent {
    WarmSucceeded { feed: FeedId },
    WarmFailed { feed: FeedId, error: String },
}

/// Result of a `dataSourceCallback` invocation: the fresh price plus the TTL
/// the warmer should store it with.
pub type FetchResult = Result<(AggregatedPrice, u64), String>;
pub type FetchCallback = Arc<dyn Fn(FeedId) -> BoxFuture<'static, FetchResult> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WarmupStats {
    pub total_patterns: usize,
    pub top_feeds: Vec<(FeedId, u64)>,
    pub strategies: Vec<String>,
}

pub struct Warmer {
    config: WarmerConfig,
    patterns: DashMap<String, types::AccessPattern>,
    in_flight: DashMap<String, ()>,
    events: Option<mpsc::UnboundedSender<WarmerEvent>>,
}

impl Warmer {
    pub fn new(config: WarmerConfig) -> Self {
        Self {
            config,
            patterns: DashMap::new(),
            in_flight: DashMap::new(),
            events: None,
        }
    }

    pub fn with_events(mut self, sender: mpsc::UnboundedSender<WarmerEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: WarmerEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Records one access to `feed` and, if the moving rate has crossed the
    /// warming threshold and the cache entry is absent or near expiry,
    /// schedules a warm. Never propagates a fetch failure to the caller; it
    /// is reported as a `WarmerEvent::WarmFailed` instead.
    pub async fn track_feed_access(&self, feed: &FeedId, now_ms: i64, cache: &Cache, fetch: &FetchCallback) {
        let key = feed.cache_key();
        let rate = {
            let mut entry = self
                .patterns
                .entry(key.clone())
                .or_insert_with(|| types::AccessPattern::new(feed.clone(), now_ms));
            let elapsed_sec = ((now_ms - entry.last_access).max(0) as f64) / 1_000.0;
            let decay = decay_factor(elapsed_sec, self.config.decay_half_life_sec);
            entry.exponential_moving_rate = entry.exponential_moving_rate * decay + 1.0;
            entry.access_count += 1;
            entry.last_access = now_ms;
            entry.exponential_moving_rate
        };

        if rate < self.config.warming_threshold {
            return;
        }

        let due_for_refresh = match cache.current_expiry_ms(feed) {
            None => true,
            Some(expires_at) => expires_at - now_ms <= self.config.refresh_margin_ms,
        };
        if !due_for_refresh {
            return;
        }

        if self.in_flight.insert(key.clone(), ()).is_some() {
            return; // a warm for this feed is already in flight
        }

        let result = fetch(feed.clone()).await;
        self.in_flight.remove(&key);

        match result {
            Ok((value, ttl_ms)) => {
                cache.set_price(feed, value, ttl_ms, now_ms);
                self.emit(WarmerEvent::WarmSucceeded { feed: feed.clone() });
            }
            Err(error) => {
                tracing::warn!(feed = %feed, %error, "cache warm failed");
                self.emit(WarmerEvent::WarmFailed { feed: feed.clone(), error });
            }
        }
    }

    pub fn get_warmup_stats(&self) -> WarmupStats {
        let mut top_feeds: Vec<(FeedId, u64)> = self
            .patterns
            .iter()
            .map(|e| (e.value().feed.clone(), e.value().access_count))
            .collect();
        top_feeds.sort_by(|a, b| b.1.cmp(&a.1));
        top_feeds.truncate(10);

        WarmupStats {
            total_patterns: self.patterns.len(),
            top_feeds,
            strategies: vec!["single-flight-refresh".to_string()],
        }
    }
}

fn decay_factor(elapsed_sec: f64, half_life_sec: f64) -> f64 {
    0.5f64.powf(elapsed_sec / half_life_sec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::FeedCategory;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    fn price() -> AggregatedPrice {
        AggregatedPrice {
            symbol: "BTC/USD".to_string(),
            price: 100.0,
            timestamp: 0,
            sources: vec!["binance".to_string()],
            confidence: 0.9,
            consensus_score: 0.9,
            voting_round: None,
        }
    }

    fn succeeding_fetch() -> FetchCallback {
        Arc::new(|_feed| Box::pin(async { Ok((price(), 1_000)) }))
    }

    #[tokio::test]
    async fn repeated_access_raises_moving_rate_above_threshold() {
        let warmer = Warmer::new(WarmerConfig {
            warming_threshold: 2.5,
            ..WarmerConfig::default()
        });
        let cache = Cache::new(cache::CacheConfig::default());
        let fetch = succeeding_fetch();

        for i in 0..5 {
            warmer.track_feed_access(&feed(), i * 10, &cache, &fetch).await;
        }

        assert!(cache.get_price(&feed(), 100).is_some());
    }

    #[tokio::test]
    async fn single_access_below_threshold_does_not_warm() {
        let warmer = Warmer::new(WarmerConfig::default());
        let cache = Cache::new(cache::CacheConfig::default());
        let fetch = succeeding_fetch();

        warmer.track_feed_access(&feed(), 0, &cache, &fetch).await;

        assert!(cache.get_price(&feed(), 0).is_none());
    }

    #[tokio::test]
    async fn fetch_failure_emits_event_without_panicking() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let warmer = Warmer::new(WarmerConfig {
            warming_threshold: 0.5,
            ..WarmerConfig::default()
        }).with_events(tx);
        let cache = Cache::new(cache::CacheConfig::default());
        let failing: FetchCallback = Arc::new(|_feed| Box::pin(async { Err("upstream down".to_string()) }));

        warmer.track_feed_access(&feed(), 0, &cache, &failing).await;

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, WarmerEvent::WarmFailed { .. }));
    }

    #[tokio::test]
    async fn fresh_entry_within_margin_is_not_warmed_again() {
        let warmer = Warmer::new(WarmerConfig {
            warming_threshold: 0.5,
            refresh_margin_ms: 0,
            ..WarmerConfig::default()
        });
        let cache = Cache::new(cache::CacheConfig::default());
        cache.set_price(&feed(), price(), 1_000, 0);
        let fetch = succeeding_fetch();

        // entry expires at 1000ms; at now=0 it is nowhere near the 0ms margin
        warmer.track_feed_access(&feed(), 0, &cache, &fetch).await;
        let stats = warmer.get_warmup_stats();
        assert_eq!(stats.total_patterns, 1);
    }

    #[test]
    fn top_feeds_are_capped_and_sorted_by_access_count() {
        let warmer = Warmer::new(WarmerConfig::default());
        warmer.patterns.insert(
            "crypto:BTC/USD".to_string(),
            types::AccessPattern {
                feed: feed(),
                access_count: 5,
                last_access: 0,
                exponential_moving_rate: 0.0,
            },
        );
        let stats = warmer.get_warmup_stats();
        assert_eq!(stats.top_feeds[0].1, 5);
    }
}
