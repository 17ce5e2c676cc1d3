//! Relay hub module
//!
//! The hub owns every live connection and the join-ordered roster, and routes
//! client messages:
//! - `userReady` -> `join` with the full roster, to every connection
//! - `playerMove` -> `move` tagged with the sender, to every other connection
//! - disconnect -> `leave`, to every remaining connection
//!
//! Roster mutation and broadcast iteration for one event happen under a single
//! lock, so no broadcast ever observes a half-applied join or leave. Sends are
//! non-blocking and a failed recipient never aborts the rest of a fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, Result, SyncError};
use crate::hub::connection::{Connection, ConnectionState};
use crate::identity::ConnectionId;
use crate::protocol::{ClientMessage, PeerMove, PoseSnapshot, ServerMessage};

/// State guarded by the hub lock
#[derive(Default)]
struct HubInner {
    /// Live connections by identifier
    connections: HashMap<ConnectionId, Arc<Connection>>,
    /// Identifiers in join order
    roster: Vec<ConnectionId>,
}

impl HubInner {
    /// Drop roster entries that no longer have a backing connection
    fn excise_stale_entries(&mut self) {
        let connections = &self.connections;
        self.roster.retain(|id| {
            let live = connections.contains_key(id);
            if !live {
                warn!(connection_id = %id, "Removing stale roster entry");
            }
            live
        });
    }

    /// Send a per-recipient message to every connection accepted by `filter`
    fn fan_out<F, B>(&self, filter: F, build: B) -> usize
    where
        F: Fn(&Connection) -> bool,
        B: Fn(&Connection) -> ServerMessage,
    {
        let mut delivered = 0;
        for connection in self.connections.values() {
            if !filter(connection) {
                continue;
            }
            let message = build(connection);
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, context = message.context(), "Failed to encode message");
                    continue;
                }
            };
            match connection.try_send(text) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        connection_id = %connection.id,
                        context = message.context(),
                        error = %e,
                        "Skipping recipient"
                    );
                }
            }
        }
        delivered
    }
}

/// Thread-safe relay hub
pub struct RelayHub {
    inner: Mutex<HubInner>,
}

impl RelayHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner::default()),
        }
    }

    /// Register a new connection and append it to the roster.
    ///
    /// Nothing is broadcast until the client sends `userReady`.
    pub fn connect(
        &self,
        outbound_tx: mpsc::Sender<String>,
        address: Option<SocketAddr>,
    ) -> ConnectionId {
        let mut inner = self.inner.lock();

        let mut id = ConnectionId::generate();
        while inner.connections.contains_key(&id) {
            id = ConnectionId::generate();
        }

        let connection = Arc::new(Connection::new(id.clone(), address, outbound_tx));
        inner.connections.insert(id.clone(), connection);
        inner.roster.push(id.clone());

        info!(
            connection_id = %id,
            address = ?address,
            connections = inner.connections.len(),
            "Connection registered"
        );

        id
    }

    /// Decode and route one text frame from `sender`.
    ///
    /// Errors are returned for diagnostics only; nothing reaches other peers.
    pub fn handle_message(&self, sender: &ConnectionId, text: &str) -> Result<()> {
        let message = ClientMessage::decode(text)?;
        self.dispatch(sender, message)
    }

    /// Route an already decoded client message
    pub fn dispatch(&self, sender: &ConnectionId, message: ClientMessage) -> Result<()> {
        trace!(connection_id = %sender, context = message.context(), "Dispatching message");
        match message {
            ClientMessage::UserReady => self.broadcast_join(sender),
            ClientMessage::PlayerMove(snapshot) => self.broadcast_move(sender, snapshot),
        }
    }

    fn broadcast_join(&self, sender: &ConnectionId) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.connections.contains_key(sender) {
            return Err(SyncError::Network(NetworkError::ConnectionNotFound(
                sender.to_string(),
            )));
        }

        inner.excise_stale_entries();
        let user_list = inner.roster.clone();
        let delivered = inner.fan_out(
            |_| true,
            |recipient| ServerMessage::Join {
                user_list: user_list.clone(),
                uuid: recipient.id.clone(),
            },
        );

        info!(
            connection_id = %sender,
            roster_size = user_list.len(),
            delivered = delivered,
            "Broadcast join"
        );
        Ok(())
    }

    fn broadcast_move(&self, sender: &ConnectionId, snapshot: PoseSnapshot) -> Result<()> {
        let inner = self.inner.lock();
        if !inner.connections.contains_key(sender) {
            return Err(SyncError::Network(NetworkError::ConnectionNotFound(
                sender.to_string(),
            )));
        }

        let message = ServerMessage::Move(PeerMove::new(sender.clone(), snapshot));
        let delivered = inner.fan_out(|recipient| recipient.id != *sender, |_| message.clone());

        trace!(connection_id = %sender, delivered = delivered, "Relayed move");
        Ok(())
    }

    /// Remove a connection and tell everyone who is left.
    ///
    /// Returns `false` if the identifier was not registered, in which case
    /// nothing is broadcast.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let mut inner = self.inner.lock();

        let Some(connection) = inner.connections.remove(id) else {
            return false;
        };
        connection.set_state(ConnectionState::Closing);
        inner.roster.retain(|entry| entry != id);
        connection.set_state(ConnectionState::Closed);

        let delivered = inner.fan_out(
            |_| true,
            |recipient| ServerMessage::Leave {
                disconnected_uuid: id.clone(),
                uuid: recipient.id.clone(),
            },
        );

        info!(
            connection_id = %id,
            connected_for = ?connection.age(),
            remaining = inner.connections.len(),
            delivered = delivered,
            "Connection left"
        );
        true
    }

    /// Disconnect every connection (server shutdown)
    pub fn disconnect_all(&self) {
        let ids = self.inner.lock().roster.clone();
        for id in ids {
            self.disconnect(&id);
        }
        // Anything registered but missing from the roster
        let mut inner = self.inner.lock();
        for (_, connection) in inner.connections.drain() {
            connection.set_state(ConnectionState::Closed);
        }
        inner.roster.clear();
    }

    /// Snapshot of the roster in join order
    pub fn roster(&self) -> Vec<ConnectionId> {
        self.inner.lock().roster.clone()
    }

    /// Get a connection by identifier
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.inner.lock().connections.get(id).cloned()
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}
