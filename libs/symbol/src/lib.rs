//! Canonicalizes exchange pair symbols to `BASE/QUOTE` and translates back
//! to each exchange's own convention.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use types::FeedCategory;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("cannot split '{0}' into base/quote")]
    InvalidSymbol(String),
}

/// Known ticker aliases that differ from the canonical asset code.
const ALIASES: &[(&str, &str)] = &[("XBT", "BTC"), ("XDG", "DOGE")];

/// Quote suffixes tried longest-first when a raw symbol has no separator,
/// e.g. Kraken's `XBTUSD`.
const QUOTE_SUFFIXES: &[&str] = &["USDT", "USDC", "BUSD", "USD", "EUR", "GBP", "JPY", "BTC", "ETH"];

fn canonical_alias(token: &str) -> String {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, canon)| canon.to_string())
        .unwrap_or_else(|| token.to_string())
}

fn is_valid_token(token: &str) -> bool {
    token.len() >= 2 && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Strips separators, applies exchange-agnostic alias mapping, and emits
/// `BASE/QUOTE`. Fails when the input cannot be split into two tokens of
/// length >= 2.
pub fn normalize(raw: &str) -> Result<String, SymbolError> {
    let upper = raw.to_ascii_uppercase();

    let (base, quote) = if let Some(idx) = upper.find(['-', '_', '/', ' ']) {
        (upper[..idx].to_string(), upper[idx + 1..].to_string())
    } else {
        QUOTE_SUFFIXES
            .iter()
            .find_map(|suffix| {
                upper
                    .strip_suffix(suffix)
                    .filter(|base| base.len() >= 2)
                    .map(|base| (base.to_string(), suffix.to_string()))
            })
            .ok_or_else(|| SymbolError::InvalidSymbol(raw.to_string()))?
    };

    let base = canonical_alias(&base);
    let quote = canonical_alias(&quote);

    if !is_valid_token(&base) || !is_valid_token(&quote) {
        return Err(SymbolError::InvalidSymbol(raw.to_string()));
    }

    Ok(format!("{base}/{quote}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFormat {
    Upper,
    Lower,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConventions {
    pub separator: String,
    pub base_first: bool,
    pub case_format: CaseFormat,
    /// Canonical symbol -> exact exchange symbol, takes precedence over
    /// the generated form.
    pub special_mappings: Option<HashMap<String, String>>,
}

impl Default for ExchangeConventions {
    fn default() -> Self {
        Self {
            separator: "".to_string(),
            base_first: true,
            case_format: CaseFormat::Upper,
            special_mappings: None,
        }
    }
}

/// Applies `conventions` to turn a canonical `BASE/QUOTE` symbol into the
/// exchange's own spelling. Special mappings, when present for this
/// canonical symbol, win outright.
pub fn to_exchange(canonical: &str, conventions: &ExchangeConventions) -> Result<String, SymbolError> {
    let (base, quote) = canonical
        .split_once('/')
        .filter(|(b, q)| is_valid_token(b) && is_valid_token(q))
        .ok_or_else(|| SymbolError::InvalidSymbol(canonical.to_string()))?;

    if let Some(mapped) = conventions
        .special_mappings
        .as_ref()
        .and_then(|m| m.get(canonical))
    {
        return Ok(mapped.clone());
    }

    let (first, second) = if conventions.base_first { (base, quote) } else { (quote, base) };
    let joined = format!("{first}{}{second}", conventions.separator);

    Ok(match conventions.case_format {
        CaseFormat::Upper => joined.to_ascii_uppercase(),
        CaseFormat::Lower => joined.to_ascii_lowercase(),
        CaseFormat::Mixed => joined,
    })
}

fn crypto_quotes() -> &'static [&'static str] {
    &["USD", "EUR", "GBP", "JPY", "USDT", "USDC", "BUSD", "BTC", "ETH"]
}

fn forex_quotes() -> &'static [&'static str] {
    &["USD", "EUR", "GBP", "JPY", "CHF", "AUD", "CAD", "NZD", "CNY"]
}

fn commodity_quotes() -> &'static [&'static str] {
    &["USD", "EUR", "GBP"]
}

/// Pure check of whether `canonical`'s quote currency belongs to the set
/// allowed for `category`. Stock feeds are priced in any fiat-like quote.
pub fn validate_for_category(canonical: &str, category: FeedCategory) -> bool {
    let Some((_, quote)) = canonical.split_once('/') else {
        return false;
    };
    let allowed = match category {
        FeedCategory::Crypto => crypto_quotes(),
        FeedCategory::Forex => forex_quotes(),
        FeedCategory::Commodity => commodity_quotes(),
        FeedCategory::Stock => crypto_quotes(),
    };
    allowed.contains(&quote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separated_symbol() {
        assert_eq!(normalize("btc-usd").unwrap(), "BTC/USD");
    }

    #[test]
    fn normalizes_alias_without_separator() {
        assert_eq!(normalize("XBTUSD").unwrap(), "BTC/USD");
    }

    #[test]
    fn rejects_unsplittable_symbol() {
        assert!(normalize("X").is_err());
    }

    #[test]
    fn to_exchange_honors_special_mapping_over_generated_form() {
        let mut special = HashMap::new();
        special.insert("BTC/USD".to_string(), "XXBTZUSD".to_string());
        let conventions = ExchangeConventions {
            special_mappings: Some(special),
            ..Default::default()
        };
        assert_eq!(to_exchange("BTC/USD", &conventions).unwrap(), "XXBTZUSD");
    }

    #[test]
    fn to_exchange_applies_separator_and_case() {
        let conventions = ExchangeConventions {
            separator: "-".to_string(),
            base_first: true,
            case_format: CaseFormat::Lower,
            special_mappings: None,
        };
        assert_eq!(to_exchange("BTC/USD", &conventions).unwrap(), "btc-usd");
    }

    #[test]
    fn validate_for_category_accepts_known_quote() {
        assert!(validate_for_category("BTC/USD", FeedCategory::Crypto));
        assert!(!validate_for_category("EUR/BTC", FeedCategory::Forex));
    }
}
