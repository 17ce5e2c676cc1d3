//! Connection handler module
//!
//! Handles the lifecycle of one relay connection:
//! - WebSocket upgrade
//! - Registration with the hub and a dedicated writer task
//! - Routing every inbound text frame through the hub
//! - Deregistration (and the `leave` broadcast) when the stream ends

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, Result, SyncError};
use crate::identity::ConnectionId;
use crate::net::transport::read_text;
use crate::state::AppState;

/// How long the writer gets to flush queued frames and the close reply
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection handler for relay clients
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a WebSocket connection until it closes
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        // Set TCP options before upgrade
        stream.set_nodelay(true)?;

        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| SyncError::Network(NetworkError::WebSocket(e.to_string())))?;

        info!(address = %addr, "WebSocket connection established");

        let (mut sink, mut source) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) =
            mpsc::channel::<String>(self.state.config.outbound_queue_capacity);

        let id = self.state.hub.connect(outbound_tx, Some(addr));

        let writer_id = id.clone();
        let mut writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(connection_id = %writer_id, error = %e, "Writer stopped");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let result = self.process_connection(&id, &mut source).await;

        debug!(connection_id = %id, "Connection handler ending");
        // Dropping the hub's sender ends the writer loop, which then closes the sink
        self.state.hub.disconnect(&id);

        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            debug!(connection_id = %id, "Writer did not drain in time");
            writer.abort();
        }

        result
    }

    /// Feed inbound frames to the hub until the peer goes away
    async fn process_connection<S>(&self, id: &ConnectionId, source: &mut S) -> Result<()>
    where
        S: futures_util::Stream<
                Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
            > + Unpin,
    {
        loop {
            match read_text(source).await {
                Ok(Some(text)) => {
                    if let Err(e) = self.state.hub.handle_message(id, &text) {
                        warn!(connection_id = %id, error = %e, "Dropping message");
                    }
                }
                Ok(None) => {
                    debug!(connection_id = %id, "Connection closed");
                    return Ok(());
                }
                Err(e) => {
                    trace!(connection_id = %id, error = %e, "Connection read failed");
                    return Err(e);
                }
            }
        }
    }
}
