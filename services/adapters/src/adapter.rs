//! The `ExchangeAdapter` contract every venue integration implements.

use async_trait::async_trait;
use tokio::sync::mpsc;
use types::PriceUpdate;

use crate::capability::AdapterCapabilities;
use crate::error::{AdapterError, Result};
use crate::health::AdapterHealth;
use crate::state::ConnectionState;

/// Sink through which an adapter emits decoded updates and errors without
/// blocking its own receive loop.
pub struct AdapterSinks {
    pub updates: mpsc::Sender<PriceUpdate>,
    pub errors: mpsc::Sender<AdapterError>,
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn capabilities(&self) -> AdapterCapabilities;

    /// Opens the streaming channel. Emits no data before reaching `Connected`.
    /// Fails with `MaxReconnectAttemptsExceeded` once the reconnect budget is
    /// exhausted.
    async fn connect(&self, sinks: AdapterSinks) -> Result<()>;

    /// Maps each symbol via the symbol mapper, sends the exchange's
    /// subscribe frame, and transitions to `Subscribed`. Idempotent per
    /// symbol: subscribing to an already-subscribed symbol is a no-op.
    async fn subscribe(&self, symbols: &[String]) -> Result<()>;

    /// Inverse of `subscribe`. Must not fail if the symbol was never
    /// subscribed.
    async fn unsubscribe(&self, symbols: &[String]) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn state(&self) -> ConnectionState;

    async fn health(&self) -> AdapterHealth;
}
