//! Gateway state machine
//!
//! ```text
//! Unconfigured ──► Connecting ──► Connected ◄──► Reconnecting
//!       │               │                             │
//!       └───────────────┴────────► Simulating ◄───────┘
//! ```
//!
//! `Simulating` is terminal: once the broker is found to be misconfigured or
//! unreachable, no further transitions are accepted.

use std::fmt;

use tokio::sync::watch;

/// Gateway lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// No broker configured yet
    Unconfigured,
    /// First connection attempt in progress
    Connecting,
    /// Subscribed and receiving telemetry
    Connected,
    /// Connection lost, waiting to retry
    Reconnecting,
    /// Generating synthetic telemetry
    Simulating,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Unconfigured => "unconfigured",
            GatewayState::Connecting => "connecting",
            GatewayState::Connected => "connected",
            GatewayState::Reconnecting => "reconnecting",
            GatewayState::Simulating => "simulating",
        }
    }

    pub fn is_simulating(&self) -> bool {
        matches!(self, GatewayState::Simulating)
    }

    /// Whether real broker traffic is flowing
    pub fn is_live(&self) -> bool {
        matches!(self, GatewayState::Connected)
    }

    fn can_transition_to(&self, next: GatewayState) -> bool {
        use GatewayState::*;
        match (self, next) {
            (Simulating, _) => false,
            (_, Simulating) => true,
            (Unconfigured, Connecting) => true,
            (Connecting, Connected) | (Connecting, Reconnecting) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connected) | (Reconnecting, Reconnecting) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes gateway state on a watch channel
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<GatewayState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GatewayState::Unconfigured);
        Self { tx }
    }

    pub fn current(&self) -> GatewayState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayState> {
        self.tx.subscribe()
    }

    /// Move to `next`; returns false if the transition is not allowed
    pub fn transition(&self, next: GatewayState) -> bool {
        let mut from = None;
        let changed = self.tx.send_if_modified(|state| {
            if *state == next || !state.can_transition_to(next) {
                return false;
            }
            from = Some(*state);
            *state = next;
            true
        });

        if let Some(from) = from {
            tracing::debug!(from = %from, to = %next, "Gateway state change");
        }
        changed
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.current(), GatewayState::Unconfigured);

        assert!(tracker.transition(GatewayState::Connecting));
        assert!(tracker.transition(GatewayState::Connected));
        assert!(tracker.current().is_live());

        assert!(tracker.transition(GatewayState::Reconnecting));
        assert!(tracker.transition(GatewayState::Connected));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let tracker = StateTracker::new();
        assert!(!tracker.transition(GatewayState::Connected));
        assert!(!tracker.transition(GatewayState::Unconfigured));
        assert_eq!(tracker.current(), GatewayState::Unconfigured);
    }

    #[test]
    fn test_simulating_is_terminal() {
        let tracker = StateTracker::new();
        assert!(tracker.transition(GatewayState::Simulating));
        assert!(tracker.current().is_simulating());

        assert!(!tracker.transition(GatewayState::Connecting));
        assert!(!tracker.transition(GatewayState::Reconnecting));
        assert!(!tracker.transition(GatewayState::Simulating));
        assert_eq!(tracker.current(), GatewayState::Simulating);
    }

    #[tokio::test]
    async fn test_watchers_see_changes() {
        let tracker = StateTracker::new();
        let mut rx = tracker.subscribe();

        tracker.transition(GatewayState::Connecting);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), GatewayState::Connecting);

        tracker.transition(GatewayState::Simulating);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), GatewayState::Simulating);
    }

    #[test]
    fn test_display() {
        assert_eq!(GatewayState::Reconnecting.to_string(), "reconnecting");
    }
}
