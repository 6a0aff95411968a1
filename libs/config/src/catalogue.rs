//! Static catalogue files: which feeds exist and which exchanges back them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use types::FeedId;

/// One exchange contribution to a feed, as declared in the feeds catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    pub exchange: String,
    pub symbol: String,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCatalogueEntry {
    pub feed: FeedId,
    pub sources: Vec<FeedSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeedsCatalogue {
    pub feeds: Vec<FeedCatalogueEntry>,
}

impl FeedsCatalogue {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalogue: Self = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&raw)?
        } else {
            toml::from_str(&raw)?
        };
        Ok(catalogue)
    }

    pub fn sources_for(&self, feed: &FeedId) -> Option<&[FeedSource]> {
        self.feeds
            .iter()
            .find(|entry| &entry.feed == feed)
            .map(|entry| entry.sources.as_slice())
    }
}

/// Per-category list of exchange ids enabled for ingest.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExchangesFile {
    pub categories: HashMap<String, Vec<String>>,
}

impl ExchangesFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let file: Self = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&raw)?
        } else {
            toml::from_str(&raw)?
        };
        Ok(file)
    }

    pub fn exchanges_for_category(&self, category: &str) -> &[String] {
        self.categories
            .get(category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use types::FeedCategory;

    #[test]
    fn loads_feeds_catalogue_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
            [[feeds]]
            [feeds.feed]
            category = "crypto"
            name = "BTC/USD"
            [[feeds.sources]]
            exchange = "binance"
            symbol = "BTCUSDT"
            weight = 1.0
            "#
        )
        .unwrap();

        let catalogue = FeedsCatalogue::load(file.path()).unwrap();
        let feed = FeedId::new(FeedCategory::Crypto, "BTC/USD");
        let sources = catalogue.sources_for(&feed).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].exchange, "binance");
    }

    #[test]
    fn missing_feed_returns_none() {
        let catalogue = FeedsCatalogue::default();
        let feed = FeedId::new(FeedCategory::Crypto, "ETH/USD");
        assert!(catalogue.sources_for(&feed).is_none());
    }
}
