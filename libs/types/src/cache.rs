//! Cache entry shape shared by the current-view and round-view namespaces.

use serde::{Deserialize, Serialize};

/// Non-negative consensus round identifier.
pub type VotingRound = u64;

/// One stored value plus the bookkeeping the cache needs for TTL expiry and
/// LRU eviction. `T` is `AggregatedPrice` in this codebase, but the shape is
/// generic so the warmer and tests can exercise it independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    /// `None` for round-view entries: they never expire by TTL.
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub access_count: u64,
    pub last_access: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, created_at: i64, expires_at: Option<i64>) -> Self {
        Self {
            value,
            expires_at,
            created_at,
            access_count: 0,
            last_access: created_at,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }

    pub fn touch(&mut self, now: i64) {
        self.access_count += 1;
        self.last_access = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_view_entries_never_expire() {
        let entry = CacheEntry::new(42u32, 0, None);
        assert!(!entry.is_expired(i64::MAX));
    }

    #[test]
    fn ttl_entries_expire_at_the_boundary() {
        let entry = CacheEntry::new(42u32, 0, Some(1_000));
        assert!(!entry.is_expired(999));
        assert!(entry.is_expired(1_000));
    }
}
