//! Connection record module
//!
//! One [`Connection`] exists per live WebSocket link. It carries the
//! connection's identifier, its lifecycle state and the sending half of the
//! queue drained by the socket writer task.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::error::{NetworkError, Result, SyncError};
use crate::identity::ConnectionId;

/// Lifecycle state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Registered and accepting outbound messages
    Open,
    /// Being torn down; no further sends
    Closing,
    /// Removed from the hub
    Closed,
}

impl ConnectionState {
    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A connected participant as seen by the relay
pub struct Connection {
    /// Identifier assigned at connect time
    pub id: ConnectionId,
    /// Remote address, when known
    pub address: Option<SocketAddr>,
    /// Time the connection was registered
    pub connected_at: Instant,
    state: RwLock<ConnectionState>,
    outbound_tx: mpsc::Sender<String>,
}

impl Connection {
    /// Create a new open connection feeding the given outbound queue
    pub fn new(
        id: ConnectionId,
        address: Option<SocketAddr>,
        outbound_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            address,
            connected_at: Instant::now(),
            state: RwLock::new(ConnectionState::Open),
            outbound_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Set the connection state
    pub fn set_state(&self, new_state: ConnectionState) {
        let old_state = std::mem::replace(&mut *self.state.write(), new_state);
        debug!(
            connection_id = %self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Connection state changed"
        );
    }

    /// Check if the connection can still receive messages
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open && !self.outbound_tx.is_closed()
    }

    /// How long the connection has been registered
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Queue a text frame without blocking
    pub fn try_send(&self, text: String) -> Result<()> {
        if self.state() != ConnectionState::Open {
            return Err(SyncError::Network(NetworkError::NotOpen(
                self.id.to_string(),
            )));
        }
        self.outbound_tx.try_send(text).map_err(|e| match e {
            TrySendError::Full(_) => SyncError::Network(NetworkError::WriteBufferFull),
            TrySendError::Closed(_) => SyncError::Network(NetworkError::ConnectionClosed),
        })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("age", &self.age())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection(capacity: usize) -> (Connection, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let addr = "127.0.0.1:12345".parse().ok();
        (Connection::new(ConnectionId::generate(), addr, tx), rx)
    }

    #[test]
    fn test_connection_starts_open() {
        let (conn, _rx) = test_connection(4);
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(conn.is_open());
    }

    #[test]
    fn test_try_send_delivers() {
        let (conn, mut rx) = test_connection(4);
        conn.try_send("hello".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_try_send_rejected_when_closing() {
        let (conn, mut rx) = test_connection(4);
        conn.set_state(ConnectionState::Closing);
        assert!(!conn.is_open());
        let err = conn.try_send("late".to_string()).unwrap_err();
        assert!(matches!(err, SyncError::Network(NetworkError::NotOpen(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_try_send_full_queue() {
        let (conn, _rx) = test_connection(1);
        conn.try_send("one".to_string()).unwrap();
        let err = conn.try_send("two".to_string()).unwrap_err();
        assert!(matches!(err, SyncError::Network(NetworkError::WriteBufferFull)));
    }

    #[test]
    fn test_try_send_writer_gone() {
        let (conn, rx) = test_connection(4);
        drop(rx);
        assert!(!conn.is_open());
        let err = conn.try_send("nobody".to_string()).unwrap_err();
        assert!(matches!(err, SyncError::Network(NetworkError::ConnectionClosed)));
    }
}
