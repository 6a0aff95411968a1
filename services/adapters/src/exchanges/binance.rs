//! Binance adapter: combined-stream `@trade` ticks over WebSocket.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
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

const EXCHANGE: &str = "binance";
const WEBSOCKET_URL: &str =
    "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade";

#[derive(Debug, Clone, Deserialize)]
struct TradeEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: TradeEvent,
}

impl TradeEvent {
    fn into_update(self) -> Result<PriceUpdate> {
        let price: f64 = self.price.parse().map_err(|_| AdapterError::ParseError {
            exchange: EXCHANGE.to_string(),
            message: "price parsing".to_string(),
            error: format!("invalid price: {}", self.price),
        })?;
        let quantity: f64 = self.quantity.parse().unwrap_or(0.0);

        if !price.is_finite() || price <= 0.0 {
            return Err(AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "price validation".to_string(),
                error: "price must be finite and positive".to_string(),
            });
        }

        let now = chrono::Utc::now().timestamp_millis();
        let latency_ms = (now - self.trade_time_ms).max(0) as f64;
        let confidence = compute_confidence(latency_ms, quantity, 1.0, 0.0);

        Ok(PriceUpdate::new(&self.symbol, price, self.trade_time_ms, EXCHANGE)
            .with_volume(quantity)
            .with_confidence(confidence))
    }
}

pub struct BinanceAdapter {
    config: ExchangeAdapterConfig,
    circuit_breaker: CircuitBreaker,
    state: Arc<RwLock<ConnectionState>>,
    metrics: Arc<RwLock<AdapterMetrics>>,
}

impl BinanceAdapter {
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
impl ExchangeAdapter for BinanceAdapter {
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
        // Stream selection is baked into the connection URL's combined-stream
        // path; Binance has no separate subscribe frame for this adapter.
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

impl BinanceAdapter {
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
        let (_sink, mut ws_stream) = ws_stream.split();

        *self.state.write().await = ConnectionState::Connected;
        *self.state.write().await = ConnectionState::Subscribed;
        info!(exchange = EXCHANGE, "connected to combined trade stream");
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
        let envelope: StreamEnvelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(_) => {
                debug!(exchange = EXCHANGE, "ignoring non-trade frame");
                return Ok(());
            }
        };
        let update = envelope.data.into_update()?;
        self.metrics.write().await.record_update();
        let _ = sinks.updates.try_send(update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_trade_event() {
        let event = TradeEvent {
            symbol: "BTCUSDT".to_string(),
            price: "50000.5".to_string(),
            quantity: "0.25".to_string(),
            trade_time_ms: chrono::Utc::now().timestamp_millis(),
        };
        let update = event.into_update().unwrap();
        assert_eq!(update.symbol, "BTCUSDT");
        assert_eq!(update.volume, Some(0.25));
    }

    #[test]
    fn rejects_non_positive_price() {
        let event = TradeEvent {
            symbol: "BTCUSDT".to_string(),
            price: "0".to_string(),
            quantity: "1".to_string(),
            trade_time_ms: 0,
        };
        assert!(event.into_update().is_err());
    }
}
