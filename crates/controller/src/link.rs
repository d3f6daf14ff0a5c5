//! Link state as seen by the controller
//!
//! State transitions:
//! ```text
//! CLOSED → CONNECTED → READY
//!    ↑         ↓         ↓
//!    └─────────┴─────────┘
//!        (disconnect)
//! ```
//!
//! A link becomes ready on the first heartbeat of a connection. A new
//! connection that replaces the current one restarts at CONNECTED.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No agent connected
    #[default]
    Closed,

    /// Agent connected, no heartbeat seen yet
    Connected,

    /// Heartbeat received on the current connection
    Ready,
}

impl LinkState {
    pub fn can_transition_to(&self, next: LinkState) -> bool {
        use LinkState::*;

        match (self, next) {
            (Closed, Connected) => true,
            (Connected, Ready) => true,

            // Replaced by a newer connection
            (Connected, Connected) | (Ready, Connected) => true,

            (Connected, Closed) | (Ready, Closed) => true,

            (a, b) if a == &b => true,
            _ => false,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        !matches!(self, LinkState::Closed)
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, LinkState::Ready)
    }
}

/// Observable link status published by the router
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatus {
    pub state: LinkState,

    /// Session id from the latest heartbeat
    pub session: Option<String>,

    /// Screen from the latest beacon
    pub screen: Option<String>,

    /// Connections seen so far
    pub connections: u64,
}

impl LinkStatus {
    /// Applies `next`, ignoring transitions the state machine forbids
    pub fn transition(&mut self, next: LinkState) -> bool {
        if !self.state.can_transition_to(next) {
            tracing::debug!(from = ?self.state, to = ?next, "Ignoring link transition");
            return false;
        }

        if next == LinkState::Connected {
            self.connections += 1;
            self.session = None;
            self.screen = None;
        }
        if next == LinkState::Closed {
            self.session = None;
        }
        self.state = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(LinkState::Closed.can_transition_to(LinkState::Connected));
        assert!(LinkState::Connected.can_transition_to(LinkState::Ready));
        assert!(LinkState::Ready.can_transition_to(LinkState::Closed));
        assert!(LinkState::Ready.can_transition_to(LinkState::Connected));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!LinkState::Closed.can_transition_to(LinkState::Ready));
    }

    #[test]
    fn test_status_tracks_connections() {
        let mut status = LinkStatus::default();
        assert!(!status.transition(LinkState::Ready));

        assert!(status.transition(LinkState::Connected));
        status.session = Some("abc".into());
        assert!(status.transition(LinkState::Ready));
        assert!(status.state.is_ready());

        assert!(status.transition(LinkState::Connected));
        assert_eq!(status.connections, 2);
        assert_eq!(status.session, None);

        assert!(status.transition(LinkState::Closed));
        assert!(!status.state.is_connected());
    }
}
