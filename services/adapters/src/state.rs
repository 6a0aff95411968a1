//! Adapter connection state machine.
//!
//! `Disconnected -> Connecting -> Connected -> {Subscribing, Subscribed} ->
//! Reconnecting -> Disconnected`. `Disconnected` is terminal only when
//! reached via an explicit `disconnect()` or a permanent failure; otherwise
//! the reconnect loop drives it back to `Connecting`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Subscribed,
    Reconnecting,
}

impl ConnectionState {
    /// Whether `next` is a legal transition from `self`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Reconnecting)
                | (Connected, Subscribing)
                | (Subscribing, Subscribed)
                | (Subscribing, Reconnecting)
                | (Subscribed, Subscribing)
                | (Subscribed, Reconnecting)
                | (Reconnecting, Connecting)
                | (_, Disconnected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Subscribing));
        assert!(Subscribing.can_transition_to(Subscribed));
    }

    #[test]
    fn disconnect_is_reachable_from_any_state() {
        assert!(Subscribed.can_transition_to(Disconnected));
        assert!(Reconnecting.can_transition_to(Disconnected));
    }

    #[test]
    fn cannot_subscribe_without_connecting_first() {
        assert!(!Disconnected.can_transition_to(Subscribing));
    }
}
