//! Health and metrics surfaced by each adapter, consumed by C8/C9.

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitState;
use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealth {
    pub exchange: String,
    pub status: HealthStatus,
    pub connection: ConnectionState,
    pub circuit_state: CircuitState,
    pub metrics: AdapterMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterMetrics {
    pub updates_received: u64,
    pub updates_failed: u64,
    pub connection_attempts: u64,
    pub successful_connections: u64,
    pub reconnects: u64,
    pub last_update_latency_ms: Option<f64>,
    pub last_error: Option<String>,
}

impl AdapterMetrics {
    pub fn record_update(&mut self) {
        self.updates_received += 1;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.updates_failed += 1;
        self.last_error = Some(error.into());
    }

    pub fn record_connection_attempt(&mut self, success: bool) {
        self.connection_attempts += 1;
        if success {
            self.successful_connections += 1;
        }
    }

    /// Conservative health classification: any open circuit or a failure
    /// rate above 10% of received updates degrades the adapter; a
    /// disconnected state makes it unhealthy outright.
    pub fn classify(&self, connection: ConnectionState, circuit: CircuitState) -> HealthStatus {
        if connection == ConnectionState::Disconnected || circuit == CircuitState::Open {
            return HealthStatus::Unhealthy;
        }
        if self.updates_received > 0 && self.updates_failed * 10 > self.updates_received {
            return HealthStatus::Degraded;
        }
        HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_is_always_unhealthy() {
        let metrics = AdapterMetrics::default();
        assert_eq!(
            metrics.classify(ConnectionState::Disconnected, CircuitState::Closed),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn high_failure_rate_degrades() {
        let mut metrics = AdapterMetrics::default();
        metrics.updates_received = 10;
        metrics.updates_failed = 5;
        assert_eq!(
            metrics.classify(ConnectionState::Subscribed, CircuitState::Closed),
            HealthStatus::Degraded
        );
    }
}
