//! Feed identity: category + canonical symbol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse asset class a feed belongs to. Drives which quote-currency rules
/// the symbol mapper applies (see `symbol::validate_for_category`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedCategory {
    Crypto,
    Forex,
    Commodity,
    Stock,
}

impl fmt::Display for FeedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeedCategory::Crypto => "crypto",
            FeedCategory::Forex => "forex",
            FeedCategory::Commodity => "commodity",
            FeedCategory::Stock => "stock",
        };
        write!(f, "{s}")
    }
}

/// `(category, name)` identity for a feed. `name` is always the canonical
/// `BASE/QUOTE` form produced by the symbol mapper; `FeedId` does not
/// validate this itself (construction happens after normalization), but
/// `is_canonical` lets callers assert the invariant at boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedId {
    pub category: FeedCategory,
    pub name: String,
}

impl FeedId {
    pub fn new(category: FeedCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Cache-key-safe string form, e.g. `crypto:BTC/USD`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.category, self.name)
    }

    /// `BASE` and `QUOTE` tokens are `[A-Z0-9]{2,}` separated by exactly one `/`.
    pub fn is_canonical(&self) -> bool {
        let mut parts = self.name.split('/');
        let (Some(base), Some(quote), None) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        is_canonical_token(base) && is_canonical_token(quote)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

fn is_canonical_token(token: &str) -> bool {
    token.len() >= 2 && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_symbol_requires_single_slash() {
        let f = FeedId::new(FeedCategory::Crypto, "BTC/USD");
        assert!(f.is_canonical());

        let f = FeedId::new(FeedCategory::Crypto, "BTC/USD/EUR");
        assert!(!f.is_canonical());

        let f = FeedId::new(FeedCategory::Crypto, "BTCUSD");
        assert!(!f.is_canonical());
    }

    #[test]
    fn canonical_tokens_reject_lowercase_and_short_tokens() {
        assert!(!FeedId::new(FeedCategory::Crypto, "btc/usd").is_canonical());
        assert!(!FeedId::new(FeedCategory::Crypto, "B/USD").is_canonical());
    }

    #[test]
    fn cache_key_is_stable_and_distinct_per_category() {
        let crypto = FeedId::new(FeedCategory::Crypto, "BTC/USD");
        let stock = FeedId::new(FeedCategory::Stock, "BTC/USD");
        assert_ne!(crypto.cache_key(), stock.cache_key());
    }
}
