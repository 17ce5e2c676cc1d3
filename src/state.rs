//! Application state module
//!
//! Contains the shared state used across all relay connections.

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::hub::RelayHub;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Relay hub tracking connected clients
    pub hub: RelayHub,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        info!(
            outbound_queue_capacity = config.outbound_queue_capacity,
            "Creating relay hub"
        );
        Self {
            config,
            hub: RelayHub::new(),
            shutdown_tx,
        }
    }

    /// Number of connected participants
    pub fn connection_count(&self) -> usize {
        self.hub.connection_count()
    }
}
