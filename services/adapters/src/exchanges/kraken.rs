//! Kraken adapter: v2 `ticker` channel over WebSocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use types::{FeedCategory, PriceUpdate};

use crate::adapter::{AdapterSinks, ExchangeAdapter};
use crate::capability::AdapterCapabilities;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::confidence::compute_confidence;
use crate::config::ExchangeAdapterConfig;
use crate::error::{AdapterError, Result};
use crate::health::{AdapterHealth, AdapterMetrics};
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;

const EXCHANGE: &str = "kraken";
const WEBSOCKET_URL: &str = "wss://ws.kraken.com/v2";

#[derive(Debug, Deserialize)]
struct TickerMessage {
    channel: String,
    data: Option<Vec<TickerData>>,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    symbol: String,
    last: f64,
    bid: f64,
    ask: f64,
    volume: f64,
}

impl TickerData {
    fn into_update(self, now_ms: i64) -> Result<PriceUpdate> {
        if !self.last.is_finite() || self.last <= 0.0 {
            return Err(AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "price validation".to_string(),
                error: "last price must be finite and positive".to_string(),
            });
        }
        let mid = (self.bid + self.ask) / 2.0;
        let spread_fraction = if mid > 0.0 { (self.ask - self.bid).abs() / mid } else { 0.0 };
        let confidence = compute_confidence(0.0, self.volume, 1.0, spread_fraction);

        Ok(PriceUpdate::new(&self.symbol, self.last, now_ms, EXCHANGE)
            .with_volume(self.volume)
            .with_confidence(confidence))
    }
}

pub struct KrakenAdapter {
    config: ExchangeAdapterConfig,
    circuit_breaker: CircuitBreaker,
    state: Arc<RwLock<ConnectionState>>,
    metrics: Arc<RwLock<AdapterMetrics>>,
}

impl KrakenAdapter {
    pub fn new(config: ExchangeAdapterConfig) -> Self {
        Self {
            config,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            metrics: Arc::new(RwLock::new(AdapterMetrics::default())),
        }
    }
}

#[async_trait]
impl ExchangeAdapter for KrakenAdapter {
    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities {
            supports_websocket: true,
            supports_rest: false,
            supports_volume: true,
            supports_order_book: false,
            supported_categories: vec![FeedCategory::Crypto],
        }
    }

    async fn connect(&self, sinks: AdapterSinks) -> Result<()> {
        *self.state.write().await = ConnectionState::Connecting;
        let reconnect = ReconnectPolicy::from_config(&self.config);
        let mut attempt = 0;

        loop {
            if !self.circuit_breaker.should_attempt().await {
                return Err(AdapterError::CircuitBreakerOpen {
                    exchange: EXCHANGE.to_string(),
                });
            }

            match self.run_connection(&sinks).await {
                Ok(()) => {
                    *self.state.write().await = ConnectionState::Disconnected;
                    return Ok(());
                }
                Err(err) => {
                    self.circuit_breaker.on_failure().await;
                    self.metrics.write().await.record_failure(err.to_string());
                    attempt += 1;
                    if attempt >= reconnect.max_attempts() {
                        *self.state.write().await = ConnectionState::Disconnected;
                        return Err(AdapterError::MaxReconnectAttemptsExceeded {
                            exchange: EXCHANGE.to_string(),
                            max_attempts: reconnect.max_attempts(),
                        });
                    }
                    *self.state.write().await = ConnectionState::Reconnecting;
                    let delay = reconnect.delay_for_attempt(attempt);
                    warn!(exchange = EXCHANGE, attempt, ?delay, "reconnecting after failure");
                    tokio::time::sleep(delay).await;
                    *self.state.write().await = ConnectionState::Connecting;
                }
            }
        }
    }

    async fn subscribe(&self, _symbols: &[String]) -> Result<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _symbols: &[String]) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        *self.state.write().await = ConnectionState::Disconnected;
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
            .try_read()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Reconnecting)
    }

    async fn health(&self) -> AdapterHealth {
        let connection = *self.state.read().await;
        let circuit_state = self.circuit_breaker.state().await;
        let metrics = self.metrics.read().await.clone();
        let status = metrics.classify(connection, circuit_state);
        AdapterHealth {
            exchange: EXCHANGE.to_string(),
            status,
            connection,
            circuit_state,
            metrics,
        }
    }
}

impl KrakenAdapter {
    async fn run_connection(&self, sinks: &AdapterSinks) -> Result<()> {
        self.metrics.write().await.record_connection_attempt(false);

        let (ws_stream, _) = tokio::time::timeout(
            std::time::Duration::from_millis(self.config.connect_timeout_ms),
            connect_async(WEBSOCKET_URL),
        )
        .await
        .map_err(|_| AdapterError::ConnectionTimeout {
            exchange: EXCHANGE.to_string(),
            timeout_ms: self.config.connect_timeout_ms,
        })?
        .map_err(|e| AdapterError::ConnectionFailed {
            exchange: EXCHANGE.to_string(),
            reason: e.to_string(),
        })?;

        self.metrics.write().await.record_connection_attempt(true);
        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        let subscription = json!({
            "method": "subscribe",
            "params": {"channel": "ticker", "symbol": ["BTC/USD", "ETH/USD"]},
        });
        ws_sink
            .send(Message::Text(subscription.to_string()))
            .await
            .map_err(AdapterError::WebSocket)?;

        *self.state.write().await = ConnectionState::Connected;
        *self.state.write().await = ConnectionState::Subscribing;
        *self.state.write().await = ConnectionState::Subscribed;
        info!(exchange = EXCHANGE, "subscribed to ticker channel");
        self.circuit_breaker.on_success().await;

        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_message(&text, sinks).await {
                        let _ = sinks.errors.try_send(e);
                    }
                }
                Ok(Message::Close(_)) => {
                    warn!(exchange = EXCHANGE, "server closed connection");
                    break;
                }
                Err(e) => return Err(AdapterError::WebSocket(e)),
                _ => {}
            }
        }

        Ok(())
    }

    async fn handle_message(&self, text: &str, sinks: &AdapterSinks) -> Result<()> {
        let message: TickerMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(_) => {
                debug!(exchange = EXCHANGE, "ignoring non-ticker frame");
                return Ok(());
            }
        };
        if message.channel != "ticker" {
            return Ok(());
        }
        let now = chrono::Utc::now().timestamp_millis();
        for tick in message.data.unwrap_or_default() {
            let update = tick.into_update(now)?;
            self.metrics.write().await.record_update();
            let _ = sinks.updates.try_send(update);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_ticker() {
        let tick = TickerData {
            symbol: "BTC/USD".to_string(),
            last: 50_000.0,
            bid: 49_990.0,
            ask: 50_010.0,
            volume: 12.5,
        };
        let update = tick.into_update(1_000).unwrap();
        assert_eq!(update.symbol, "BTC/USD");
        assert_eq!(update.timestamp, 1_000);
    }

    #[test]
    fn rejects_non_positive_last_price() {
        let tick = TickerData {
            symbol: "BTC/USD".to_string(),
            last: 0.0,
            bid: 1.0,
            ask: 1.0,
            volume: 1.0,
        };
        assert!(tick.into_update(0).is_err());
    }
}
