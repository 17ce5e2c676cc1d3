//! Transport session
//!
//! One persistent WebSocket connection from a participant to the relay. The
//! session announces itself with `userReady` as soon as the socket is up,
//! pushes pose snapshots through an unbounded queue drained by a writer task,
//! and hands every inbound message to a [`SessionHandler`] from a reader task.
//!
//! There is no reconnect: once the stream ends the session stays closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::error::{NetworkError, Result};
use crate::identity::ConnectionId;
use crate::net::transport::read_text;
use crate::protocol::{ClientMessage, PeerMove, PoseSnapshot, ServerMessage};

/// How long `close` waits for the relay to finish the close handshake
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Receiver of relay events
pub trait SessionHandler: Send + Sync + 'static {
    /// Roster changed; `own_id` is the identifier the relay gave this client
    fn on_join(&self, user_list: &[ConnectionId], own_id: &ConnectionId);

    /// A participant disconnected
    fn on_leave(&self, disconnected: &ConnectionId);

    /// Another participant moved
    fn on_move(&self, update: &PeerMove);

    /// The connection to the relay ended
    fn on_close(&self) {}
}

impl<H: SessionHandler> SessionHandler for Arc<H> {
    fn on_join(&self, user_list: &[ConnectionId], own_id: &ConnectionId) {
        (**self).on_join(user_list, own_id)
    }

    fn on_leave(&self, disconnected: &ConnectionId) {
        (**self).on_leave(disconnected)
    }

    fn on_move(&self, update: &PeerMove) {
        (**self).on_move(update)
    }

    fn on_close(&self) {
        (**self).on_close()
    }
}

/// Decode one inbound frame and route it to the handler
pub fn dispatch<H: SessionHandler + ?Sized>(handler: &H, text: &str) -> Result<()> {
    let message = ServerMessage::decode(text)?;
    trace!(context = message.context(), "Dispatching relay message");

    match message {
        ServerMessage::Join { user_list, uuid } => handler.on_join(&user_list, &uuid),
        ServerMessage::Leave {
            disconnected_uuid, ..
        } => handler.on_leave(&disconnected_uuid),
        ServerMessage::Move(update) => handler.on_move(&update),
    }
    Ok(())
}

/// Live connection to the relay
pub struct TransportSession {
    endpoint: String,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    open: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl TransportSession {
    /// Connect to `endpoint` and announce readiness
    pub async fn connect<H: SessionHandler>(endpoint: &str, handler: H) -> Result<Self> {
        debug!(endpoint = %endpoint, "Connecting to relay");
        let (ws_stream, _response) = connect_async(endpoint).await?;
        info!(endpoint = %endpoint, "Connected to relay");

        let (mut sink, mut source) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let open = Arc::new(AtomicBool::new(true));

        // Queued before the writer starts so it is always the first frame
        outbound_tx
            .send(ClientMessage::UserReady.encode()?)
            .map_err(|_| NetworkError::ConnectionClosed)?;

        let writer_open = Arc::clone(&open);
        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(error = %e, "Session writer stopped");
                    writer_open.store(false, Ordering::SeqCst);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_open = Arc::clone(&open);
        let reader_endpoint = endpoint.to_string();
        let reader = tokio::spawn(async move {
            loop {
                match read_text(&mut source).await {
                    Ok(Some(text)) => {
                        if let Err(e) = dispatch(&handler, &text) {
                            warn!(error = %e, "Dropping relay message");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Relay connection failed");
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            info!(endpoint = %reader_endpoint, "Relay connection closed");
            handler.on_close();
        });

        Ok(Self {
            endpoint: endpoint.to_string(),
            outbound_tx: Some(outbound_tx),
            open,
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the relay connection is still up
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.outbound_tx.is_some()
    }

    /// Queue a pose snapshot for the relay; never waits for the socket
    pub fn send(&self, snapshot: &PoseSnapshot) -> Result<()> {
        if !self.is_open() {
            return Err(NetworkError::NotOpen(self.endpoint.clone()).into());
        }
        let text = ClientMessage::PlayerMove(*snapshot).encode()?;
        match &self.outbound_tx {
            Some(tx) => tx
                .send(text)
                .map_err(|_| NetworkError::ConnectionClosed.into()),
            None => Err(NetworkError::ConnectionClosed.into()),
        }
    }

    /// Flush queued frames, close the socket and stop the reader
    pub async fn close(&mut self) {
        // Dropping the sender lets the writer drain and send a close frame
        self.outbound_tx = None;

        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                debug!(error = %e, "Session writer task failed");
            }
        }

        if let Some(mut reader) = self.reader.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
                debug!(endpoint = %self.endpoint, "Relay did not close in time");
                reader.abort();
            }
        }

        self.open.store(false, Ordering::SeqCst);
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl SessionHandler for Recorder {
        fn on_join(&self, user_list: &[ConnectionId], own_id: &ConnectionId) {
            self.events
                .lock()
                .push(format!("join {} as {}", user_list.len(), own_id));
        }

        fn on_leave(&self, disconnected: &ConnectionId) {
            self.events.lock().push(format!("leave {}", disconnected));
        }

        fn on_move(&self, update: &PeerMove) {
            self.events
                .lock()
                .push(format!("move {} {}", update.uuid, update.current_action_name));
        }
    }

    #[test]
    fn test_dispatch_routes_by_context() {
        let recorder = Recorder::default();
        dispatch(
            &recorder,
            r#"{"context":"join","userList":["a","b"],"uuid":"b"}"#,
        )
        .unwrap();
        dispatch(
            &recorder,
            r#"{"context":"move","uuid":"a","position":{"x":1,"y":0,"z":2},
                "rotation":{"y":0.5},"currentActionName":"walk_left","previousActionName":"idle"}"#,
        )
        .unwrap();
        dispatch(
            &recorder,
            r#"{"context":"leave","disconnectedUUID":"a","uuid":"b"}"#,
        )
        .unwrap();

        assert_eq!(
            *recorder.events.lock(),
            vec![
                "join 2 as b".to_string(),
                "move a walk_left".to_string(),
                "leave a".to_string(),
            ]
        );
    }

    #[test]
    fn test_dispatch_rejects_bad_frames() {
        let recorder = Recorder::default();
        assert!(dispatch(&recorder, "garbage").is_err());
        assert!(dispatch(&recorder, r#"{"context":"playerMove"}"#).is_err());
        assert!(dispatch(&recorder, r#"{"context":"move","uuid":"a"}"#).is_err());
        assert!(recorder.events.lock().is_empty());
    }

    #[test]
    fn test_arc_handler_forwards() {
        let recorder = Arc::new(Recorder::default());
        dispatch(
            &Arc::clone(&recorder),
            r#"{"context":"leave","disconnectedUUID":"x","uuid":"y"}"#,
        )
        .unwrap();
        assert_eq!(*recorder.events.lock(), vec!["leave x".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let result = TransportSession::connect("ws://127.0.0.1:1", Recorder::default()).await;
        assert!(result.is_err());
    }
}
