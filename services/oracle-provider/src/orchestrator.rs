//! Wires the validator, aggregator, cache, warmer, and failover coordinator
//! around per-feed rolling update buffers. Adapter tasks push raw updates in;
//! HTTP handlers read aggregated prices out.

use aggregator::AggregatorConfig;
use dashmap::DashMap;
use provider_config::catalogue::FeedsCatalogue;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use types::{AggregatedPrice, FeedId, PriceUpdate, VolumeUpdate};

const UPDATE_BUFFER_CAPACITY: usize = 64;
const VOLUME_BUFFER_CAPACITY: usize = 256;

pub struct Orchestrator {
    catalogue: FeedsCatalogue,
    update_buffers: DashMap<String, VecDeque<PriceUpdate>>,
    volume_buffers: DashMap<String, VecDeque<VolumeUpdate>>,
    validator: Arc<validator::Validator>,
    aggregator_config: AggregatorConfig,
    cache: Arc<cache::Cache>,
    warmer: Arc<warmer::Warmer>,
    failover: Arc<failover::FailoverCoordinator>,
}

impl Orchestrator {
    pub fn new(
        catalogue: FeedsCatalogue,
        validator: Arc<validator::Validator>,
        aggregator_config: AggregatorConfig,
        cache: Arc<cache::Cache>,
        warmer: Arc<warmer::Warmer>,
        failover: Arc<failover::FailoverCoordinator>,
    ) -> Self {
        Self {
            catalogue,
            update_buffers: DashMap::new(),
            volume_buffers: DashMap::new(),
            validator,
            aggregator_config,
            cache,
            warmer,
            failover,
        }
    }

    pub fn catalogue(&self) -> &FeedsCatalogue {
        &self.catalogue
    }

    /// Finds the feed a raw `(exchange, symbol)` pair backs, per the
    /// catalogue's source list. An adapter emits one `PriceUpdate` stream for
    /// many exchange-native symbols; this is how the ingest loop tells them
    /// apart without the adapter knowing about feeds at all.
    pub fn resolve_feed(&self, exchange: &str, symbol: &str) -> Option<FeedId> {
        self.catalogue
            .feeds
            .iter()
            .find(|entry| {
                entry
                    .sources
                    .iter()
                    .any(|s| s.exchange.eq_ignore_ascii_case(exchange) && s.symbol.eq_ignore_ascii_case(symbol))
            })
            .map(|entry| entry.feed.clone())
    }

    /// Resolves `update.symbol`/`update.source` to the feed it backs, via the
    /// catalogue's source list, and ingests it under that feed.
    pub fn ingest(&self, feed: &FeedId, update: PriceUpdate, now_ms: i64) {
        let recent_median = self.recent_median(feed);
        let trusted_majority = self.failover.active_source(feed).into_iter().collect::<Vec<_>>();

        let result = self.validator.validate(&update, now_ms, recent_median, &trusted_majority);
        if !result.is_valid {
            tracing::debug!(feed = %feed, source = %update.source, "update rejected by validator");
            return;
        }

        self.failover.report_success(feed, &update.source, now_ms);

        let effective = result.effective_update(&update).clone();
        self.push_update(feed, effective);
        self.recompute_and_cache(feed, now_ms);
    }

    pub fn ingest_volume(&self, feed: &FeedId, update: VolumeUpdate) {
        let mut buffer = self.volume_buffers.entry(feed.cache_key()).or_insert_with(VecDeque::new);
        if buffer.len() >= VOLUME_BUFFER_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(update);
    }

    fn push_update(&self, feed: &FeedId, update: PriceUpdate) {
        let mut buffer = self.update_buffers.entry(feed.cache_key()).or_insert_with(VecDeque::new);
        if buffer.len() >= UPDATE_BUFFER_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(update);
    }

    fn recent_median(&self, feed: &FeedId) -> Option<f64> {
        let buffer = self.update_buffers.get(&feed.cache_key())?;
        if buffer.is_empty() {
            return None;
        }
        let mut prices: Vec<f64> = buffer.iter().map(|u| u.price).collect();
        prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Some(prices[prices.len() / 2])
    }

    /// Snapshots the feed's update buffer under a short lock, releases it,
    /// then aggregates and writes the current view. Never holds the buffer
    /// lock while calling into the cache.
    fn recompute_and_cache(&self, feed: &FeedId, now_ms: i64) {
        let snapshot: Vec<PriceUpdate> = match self.update_buffers.get(&feed.cache_key()) {
            Some(buffer) => buffer.iter().cloned().collect(),
            None => return,
        };

        match aggregator::aggregate(&snapshot, now_ms, None, &self.aggregator_config) {
            Ok(price) => self.cache.set_price(feed, price, 1_000, now_ms),
            Err(aggregator::AggregateError::InsufficientSources { have, need }) => {
                tracing::debug!(feed = %feed, have, need, "insufficient sources to aggregate");
            }
        }
    }

    /// Writes an immutable snapshot for `round`, deriving it from the
    /// feed's current buffer at call time.
    pub fn snapshot_for_round(&self, feed: &FeedId, round: u64, now_ms: i64) -> Option<AggregatedPrice> {
        let snapshot: Vec<PriceUpdate> = self.update_buffers.get(&feed.cache_key())?.iter().cloned().collect();
        let price = aggregator::aggregate(&snapshot, now_ms, Some(round), &self.aggregator_config).ok()?;
        self.cache.set_for_voting_round(feed, round, price.clone(), now_ms);
        Some(price)
    }

    /// Reads the current view, falling back to an opportunistic warm on miss.
    /// `fetch` is the same data-source callback the background warmer uses.
    pub async fn query_current(
        &self,
        feed: &FeedId,
        now_ms: i64,
        fetch: &warmer::FetchCallback,
    ) -> Option<AggregatedPrice> {
        self.warmer.track_feed_access(feed, now_ms, &self.cache, fetch).await;
        self.cache.get_price(feed, now_ms)
    }

    pub fn query_round(&self, feed: &FeedId, round: u64, now_ms: i64) -> Option<AggregatedPrice> {
        self.cache.get_for_voting_round(feed, round, now_ms)
    }

    pub fn query_volume(&self, feed: &FeedId, window_sec: u32, now_ms: i64) -> Option<f64> {
        let buffer = self.volume_buffers.get(&feed.cache_key())?;
        let window_start = now_ms - (window_sec as i64) * 1_000;
        let total: f64 = buffer
            .iter()
            .filter(|u| u.timestamp >= window_start)
            .map(|u| u.volume)
            .sum();
        Some(total)
    }

    /// Re-aggregates `feed` from its current buffer on demand, for use as the
    /// warmer's data-source callback. There is no separate pull-based fetch
    /// path in this architecture; a "fresh fetch" is just forcing the same
    /// aggregation the ingest pipeline already does.
    pub fn refresh(&self, feed: &FeedId, now_ms: i64) -> Result<(AggregatedPrice, u64), String> {
        let snapshot: Vec<PriceUpdate> = self
            .update_buffers
            .get(&feed.cache_key())
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        aggregator::aggregate(&snapshot, now_ms, None, &self.aggregator_config)
            .map(|price| (price, 1_000))
            .map_err(|e| e.to_string())
    }

    pub fn cache(&self) -> &cache::Cache {
        &self.cache
    }

    pub fn failover(&self) -> &failover::FailoverCoordinator {
        &self.failover
    }
}

/// Periodic background sweep: cache TTL expiry per §4.6's "periodic tick"
/// contract (default 500ms). Runs until `cancel` fires.
pub async fn run_cache_sweep(cache: Arc<cache::Cache>, interval_ms: u64, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                cache.sweep_expired(now_ms);
            }
            _ = cancel.cancelled() => break,
        }
    }
}

/// Drains one adapter's update channel into the orchestrator, resolving each
/// update's feed from its `(source, symbol)` pair, until the adapter task
/// ends or cancellation fires. Updates for a symbol absent from the
/// catalogue are dropped with a warning; the adapter has no notion of feeds.
pub async fn run_ingest_loop(
    orchestrator: Arc<Orchestrator>,
    mut updates: mpsc::Receiver<PriceUpdate>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe_update = updates.recv() => {
                match maybe_update {
                    Some(update) => {
                        match orchestrator.resolve_feed(&update.source, &update.symbol) {
                            Some(feed) => {
                                let now_ms = chrono::Utc::now().timestamp_millis();
                                orchestrator.ingest(&feed, update, now_ms);
                            }
                            None => {
                                tracing::warn!(source = %update.source, symbol = %update.symbol, "no feed maps to this update, dropping");
                            }
                        }
                    }
                    None => break,
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}
