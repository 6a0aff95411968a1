//! Dual-namespace in-memory cache: a short-TTL "current" view keyed by feed,
//! and an immutable "round" view keyed by (feed, voting round). Backed by
//! striped maps so entry mutation never blocks unrelated keys.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use types::cache::CacheEntry;
use types::feed::FeedId;
use types::AggregatedPrice;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    /// Requested TTLs above this are silently clamped (current view only).
    pub current_view_max_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            current_view_max_ttl_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub memory_usage: usize,
    pub evictions: u64,
}

type CurrentKey = String;
type RoundKey = (String, u64);

pub struct Cache {
    config: CacheConfig,
    current: DashMap<CurrentKey, CacheEntry<AggregatedPrice>>,
    round: DashMap<RoundKey, CacheEntry<AggregatedPrice>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            current: DashMap::new(),
            round: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Stores `value` in the current view with `effectiveTTL = min(requestedTTL,
    /// currentViewMaxTtl)`. Evicts by LRU first if this insert would exceed
    /// `maxEntries`.
    pub fn set_price(&self, feed: &FeedId, value: AggregatedPrice, requested_ttl_ms: u64, now_ms: i64) {
        let ttl_ms = requested_ttl_ms.min(self.config.current_view_max_ttl_ms);
        self.make_room(now_ms);
        self.current.insert(
            feed.cache_key(),
            CacheEntry::new(value, now_ms, Some(now_ms + ttl_ms as i64)),
        );
    }

    /// Returns the current-view entry iff unexpired, recording a hit/miss and
    /// touching the access counters. An opportunistic lazy sweep removes the
    /// entry if it has expired rather than returning stale data.
    pub fn get_price(&self, feed: &FeedId, now_ms: i64) -> Option<AggregatedPrice> {
        let key = feed.cache_key();
        let Some(mut entry) = self.current.get_mut(&key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.is_expired(now_ms) {
            drop(entry);
            self.current.remove(&key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        entry.touch(now_ms);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Stores an immutable round snapshot. Round entries never expire by TTL;
    /// they're cleared explicitly via `invalidate_on_price_update` or by LRU.
    pub fn set_for_voting_round(&self, feed: &FeedId, round: u64, value: AggregatedPrice, now_ms: i64) {
        self.make_room(now_ms);
        self.round
            .insert((feed.cache_key(), round), CacheEntry::new(value, now_ms, None));
    }

    pub fn get_for_voting_round(&self, feed: &FeedId, round: u64, now_ms: i64) -> Option<AggregatedPrice> {
        let key = (feed.cache_key(), round);
        let mut entry = self.round.get_mut(&key)?;
        entry.touch(now_ms);
        Some(entry.value.clone())
    }

    /// Clears every round entry for `feed` without touching its current entry.
    pub fn invalidate_on_price_update(&self, feed: &FeedId) {
        let prefix = feed.cache_key();
        self.round.retain(|(key, _), _| key != &prefix);
    }

    /// Removes expired current-view entries. Call on a periodic tick; lazy
    /// expiry on `get_price` handles the rest between ticks.
    pub fn sweep_expired(&self, now_ms: i64) {
        self.current.retain(|_, entry| !entry.is_expired(now_ms));
    }

    /// Expiry timestamp of the current-view entry for `feed`, if any, whether
    /// or not it has already passed. Used by the warmer to decide if an entry
    /// is within its refresh margin without taking it out of the cache.
    pub fn current_expiry_ms(&self, feed: &FeedId) -> Option<i64> {
        self.current.get(&feed.cache_key()).and_then(|e| e.expires_at)
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let entries = self.current.len() + self.round.len();
        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            entries,
            memory_usage: entries * std::mem::size_of::<CacheEntry<AggregatedPrice>>(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Evicts the globally least-recently-used entry (across both namespaces)
    /// until there is room for one more. O(n) scan; acceptable at the cache's
    /// intended scale (tens of thousands of feeds, not millions).
    fn make_room(&self, now_ms: i64) {
        if self.current.len() + self.round.len() < self.config.max_entries {
            return;
        }
        self.sweep_expired(now_ms);
        if self.current.len() + self.round.len() < self.config.max_entries {
            return;
        }

        let oldest_current = self
            .current
            .iter()
            .min_by_key(|e| e.last_access)
            .map(|e| (e.key().clone(), e.last_access));
        let oldest_round = self
            .round
            .iter()
            .min_by_key(|e| e.last_access)
            .map(|e| (e.key().clone(), e.last_access));

        match (oldest_current, oldest_round) {
            (Some((ck, ct)), Some((rk, rt))) => {
                if ct <= rt {
                    self.current.remove(&ck);
                } else {
                    self.round.remove(&rk);
                }
            }
            (Some((ck, _)), None) => {
                self.current.remove(&ck);
            }
            (None, Some((rk, _))) => {
                self.round.remove(&rk);
            }
            (None, None) => return,
        }
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::feed::FeedCategory;

    fn feed() -> FeedId {
        FeedId::new(FeedCategory::Crypto, "BTC/USD")
    }

    fn price(value: f64) -> AggregatedPrice {
        AggregatedPrice {
            symbol: "BTC/USD".to_string(),
            price: value,
            timestamp: 0,
            sources: vec!["binance".to_string()],
            confidence: 0.9,
            consensus_score: 0.9,
            voting_round: None,
        }
    }

    #[test]
    fn requested_ttl_above_cap_is_clamped() {
        let cache = Cache::new(CacheConfig::default());
        cache.set_price(&feed(), price(100.0), 5_000, 0);
        assert!(cache.get_price(&feed(), 999).is_some());
        assert!(cache.get_price(&feed(), 1_000).is_none());
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed_lazily() {
        let cache = Cache::new(CacheConfig::default());
        cache.set_price(&feed(), price(100.0), 100, 0);
        assert!(cache.get_price(&feed(), 200).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn round_view_survives_ttl_but_not_invalidation() {
        let cache = Cache::new(CacheConfig::default());
        cache.set_for_voting_round(&feed(), 7, price(100.0), 0);
        assert!(cache.get_for_voting_round(&feed(), 7, 1_000_000).is_some());

        cache.invalidate_on_price_update(&feed());
        assert!(cache.get_for_voting_round(&feed(), 7, 1_000_000).is_none());
    }

    #[test]
    fn invalidate_does_not_touch_current_view() {
        let cache = Cache::new(CacheConfig::default());
        cache.set_price(&feed(), price(100.0), 1_000, 0);
        cache.set_for_voting_round(&feed(), 7, price(100.0), 0);

        cache.invalidate_on_price_update(&feed());
        assert!(cache.get_price(&feed(), 500).is_some());
    }

    #[test]
    fn eviction_kicks_in_once_max_entries_reached() {
        let cache = Cache::new(CacheConfig {
            max_entries: 1,
            ..CacheConfig::default()
        });
        let other = FeedId::new(FeedCategory::Crypto, "ETH/USD");

        cache.set_price(&feed(), price(100.0), 1_000, 0);
        cache.set_price(&other, price(200.0), 1_000, 10);

        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn hit_rate_reflects_hits_and_misses() {
        let cache = Cache::new(CacheConfig::default());
        cache.set_price(&feed(), price(100.0), 1_000, 0);
        cache.get_price(&feed(), 1); // hit
        cache.get_price(&FeedId::new(FeedCategory::Crypto, "ETH/USD"), 1); // miss
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 0.5);
    }
}
