//! # Exchange Adapters
//!
//! WebSocket collectors that turn raw exchange ticker/trade frames into
//! [`types::PriceUpdate`] events, pushed through a registered sink without
//! blocking the receive loop. Each venue implements [`ExchangeAdapter`];
//! [`CircuitBreaker`] and [`RateLimiter`] are shared infrastructure every
//! adapter composes the same way.
//!
//! ## Not in scope
//!
//! Adapters do not validate business rules (freshness, range, outliers —
//! that's the validator), do not aggregate across sources, and do not cache.
//! They are pure ingest: parse, classify confidence, emit.

#![warn(missing_docs)]

pub mod adapter;
pub mod capability;
pub mod circuit_breaker;
pub mod confidence;
pub mod config;
pub mod error;
pub mod exchanges;
pub mod health;
pub mod rate_limit;
pub mod reconnect;
pub mod state;

pub use adapter::{AdapterSinks, ExchangeAdapter};
pub use capability::AdapterCapabilities;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::ExchangeAdapterConfig;
pub use error::{AdapterError, Result};
pub use health::{AdapterHealth, AdapterMetrics, HealthStatus};
pub use rate_limit::{RateLimitTracker, RateLimiter};
pub use reconnect::ReconnectPolicy;
pub use state::ConnectionState;

pub use exchanges::binance::BinanceAdapter;
pub use exchanges::coinbase::CoinbaseAdapter;
pub use exchanges::kraken::KrakenAdapter;
