//! Coinbase Exchange adapter: `matches` channel trade ticks over WebSocket.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::prelude::{FromStr, ToPrimitive};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use types::{FeedCategory, PriceUpdate};

use crate::adapter::{AdapterSinks, ExchangeAdapter};
use crate::capability::AdapterCapabilities;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::confidence::compute_confidence;
use crate::config::ExchangeAdapterConfig;
use crate::error::{AdapterError, Result};
use crate::health::{AdapterHealth, AdapterMetrics};
use crate::reconnect::ReconnectPolicy;
use crate::state::ConnectionState;

const EXCHANGE: &str = "coinbase";
const WEBSOCKET_URL: &str = "wss://ws-feed.exchange.coinbase.com";

#[derive(Debug, Clone, Deserialize)]
struct MatchEvent {
    #[serde(rename = "type")]
    event_type: String,
    product_id: String,
    price: String,
    size: String,
    time: String,
}

impl MatchEvent {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.event_type != "match" && self.event_type != "last_match" {
            return Err(format!("unexpected event type: {}", self.event_type));
        }
        if self.product_id.is_empty() {
            return Err("empty product_id".to_string());
        }
        Ok(())
    }
}

pub struct CoinbaseAdapter {
    config: ExchangeAdapterConfig,
    circuit_breaker: CircuitBreaker,
    state: Arc<RwLock<ConnectionState>>,
    metrics: Arc<RwLock<AdapterMetrics>>,
}

impl CoinbaseAdapter {
    pub fn new(config: ExchangeAdapterConfig) -> Self {
        Self {
            config,
            circuit_breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            metrics: Arc::new(RwLock::new(AdapterMetrics::default())),
        }
    }

    fn parse_update(event: &MatchEvent) -> Result<PriceUpdate> {
        event.validate().map_err(|error| AdapterError::ParseError {
            exchange: EXCHANGE.to_string(),
            message: "match event validation".to_string(),
            error,
        })?;

        let price = Decimal::from_str(&event.price)
            .map_err(|e| AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "price decimal parsing".to_string(),
                error: e.to_string(),
            })?
            .to_f64()
            .ok_or_else(|| AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "price conversion".to_string(),
                error: "price does not fit in f64".to_string(),
            })?;

        let size = Decimal::from_str(&event.size)
            .map_err(|e| AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "size decimal parsing".to_string(),
                error: e.to_string(),
            })?
            .to_f64()
            .unwrap_or(0.0);

        let timestamp = chrono::DateTime::parse_from_rfc3339(&event.time)
            .map_err(|e| AdapterError::ParseError {
                exchange: EXCHANGE.to_string(),
                message: "timestamp parsing".to_string(),
                error: e.to_string(),
            })?
            .timestamp_millis();

        let now = chrono::Utc::now().timestamp_millis();
        let latency_ms = (now - timestamp).max(0) as f64;
        let confidence = compute_confidence(latency_ms, size, 1.0, 0.0);

        Ok(PriceUpdate::new(&event.product_id, price, timestamp, EXCHANGE)
            .with_volume(size)
            .with_confidence(confidence))
    }
}

#[async_trait]
impl ExchangeAdapter for CoinbaseAdapter {
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
        // Subscription happens inline as part of `connect`'s run loop, since
        // Coinbase's feed is a single multiplexed stream per connection.
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

impl CoinbaseAdapter {
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
            "type": "subscribe",
            "product_ids": ["BTC-USD", "ETH-USD"],
            "channels": ["matches"],
        });
        ws_sink
            .send(Message::Text(subscription.to_string()))
            .await
            .map_err(AdapterError::WebSocket)?;

        *self.state.write().await = ConnectionState::Connected;
        *self.state.write().await = ConnectionState::Subscribing;
        info!(exchange = EXCHANGE, "subscribed to matches channel");
        *self.state.write().await = ConnectionState::Subscribed;
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
        let value: Value = serde_json::from_str(text)?;
        let Some(msg_type) = value.get("type").and_then(Value::as_str) else {
            return Ok(());
        };

        match msg_type {
            "match" | "last_match" => {
                let event: MatchEvent = serde_json::from_value(value)?;
                let update = Self::parse_update(&event)?;
                self.metrics.write().await.record_update();
                let _ = sinks.updates.try_send(update);
            }
            "error" => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(AdapterError::ConnectionFailed {
                    exchange: EXCHANGE.to_string(),
                    reason: message,
                });
            }
            other => debug!(exchange = EXCHANGE, msg_type = other, "ignoring message type"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_match_event() {
        let event = MatchEvent {
            event_type: "match".to_string(),
            product_id: "BTC-USD".to_string(),
            price: "50000.12".to_string(),
            size: "0.5".to_string(),
            time: "2024-01-01T00:00:00.000000Z".to_string(),
        };
        let update = CoinbaseAdapter::parse_update(&event).unwrap();
        assert_eq!(update.symbol, "BTC-USD");
        assert!((update.price - 50000.12).abs() < 1e-9);
        assert_eq!(update.volume, Some(0.5));
    }

    #[test]
    fn rejects_unknown_event_type() {
        let event = MatchEvent {
            event_type: "ticker".to_string(),
            product_id: "BTC-USD".to_string(),
            price: "1".to_string(),
            size: "1".to_string(),
            time: "2024-01-01T00:00:00.000000Z".to_string(),
        };
        assert!(CoinbaseAdapter::parse_update(&event).is_err());
    }

    #[test]
    fn capabilities_declare_crypto_websocket_only() {
        let adapter = CoinbaseAdapter::new(ExchangeAdapterConfig::default());
        let caps = adapter.capabilities();
        assert!(caps.supports_websocket);
        assert!(!caps.supports_rest);
        assert_eq!(caps.supported_categories, vec![FeedCategory::Crypto]);
    }
}
