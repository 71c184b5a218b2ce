//! Connection state shared by the acquisition thread and the presenter.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// What the acquisition thread does with incoming samples.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No stream, or the stream dropped
    NotConnected = 0,
    /// Streaming, samples are discarded
    Connected = 1,
    /// Streaming into the sample buffer
    Collecting = 2,
    /// A block is being drained and exported; the drain owns the source
    Processing = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Collecting,
            3 => ConnectionState::Processing,
            _ => ConnectionState::NotConnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "NOT_CONNECTED",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Collecting => "COLLECTING",
            ConnectionState::Processing => "PROCESSING",
        };
        f.write_str(name)
    }
}

/// Cloneable handle to the shared connection state.
#[derive(Debug, Clone)]
pub struct ConnectionLink {
    state: Arc<AtomicU8>,
}

impl ConnectionLink {
    pub fn new(initial: ConnectionState) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(initial as u8)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.get() != ConnectionState::NotConnected
    }

    /// Marks the stream as gone. Sticky: only [`ConnectionLink::reconnect`]
    /// leaves this state.
    pub fn disconnect(&self) {
        self.state
            .store(ConnectionState::NotConnected as u8, Ordering::Release);
    }

    pub fn reconnect(&self) {
        self.state
            .store(ConnectionState::Connected as u8, Ordering::Release);
    }

    /// Moves to `next` unless the stream has dropped. Returns whether the
    /// state changed.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ConnectionState::NotConnected as u8).then_some(next as u8)
            })
            .is_ok()
    }
}

impl Default for ConnectionLink {
    fn default() -> Self {
        Self::new(ConnectionState::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_refused_after_disconnect() {
        let link = ConnectionLink::new(ConnectionState::Connected);
        assert!(link.transition(ConnectionState::Collecting));
        assert_eq!(link.get(), ConnectionState::Collecting);

        let other = link.clone();
        other.disconnect();
        assert!(!link.transition(ConnectionState::Collecting));
        assert_eq!(link.get(), ConnectionState::NotConnected);

        link.reconnect();
        assert!(link.is_connected());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ConnectionState::Processing.to_string(), "PROCESSING");
    }
}
