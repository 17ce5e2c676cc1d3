//! Transport module
//!
//! Reads application text frames off a WebSocket stream, shared by the relay's
//! connection handler and the client session. Control frames are consumed here
//! (tungstenite answers pings itself on the next write), so callers only ever
//! see message payloads or end-of-stream.

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

use crate::error::{NetworkError, Result, SyncError};

/// Read the next text payload from the stream.
///
/// Returns `Ok(None)` once the peer closed the connection.
pub async fn read_text<S>(stream: &mut S) -> Result<Option<String>>
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(message)) => match message {
                Message::Text(text) => {
                    trace!(len = text.len(), "Received text WebSocket message");
                    return Ok(Some(text));
                }
                Message::Binary(data) => match String::from_utf8(data) {
                    // Some clients send JSON as binary frames
                    Ok(text) => return Ok(Some(text)),
                    Err(e) => {
                        warn!(error = %e, "Dropping non UTF-8 binary message");
                    }
                },
                Message::Close(frame) => {
                    debug!(frame = ?frame, "WebSocket close message received");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            },
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
            Some(Err(e)) => {
                return Err(SyncError::Network(NetworkError::WebSocket(e.to_string())));
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn frames(
        items: Vec<std::result::Result<Message, WsError>>,
    ) -> impl Stream<Item = std::result::Result<Message, WsError>> + Unpin {
        stream::iter(items)
    }

    #[tokio::test]
    async fn test_skips_control_frames() {
        let mut s = frames(vec![
            Ok(Message::Ping(vec![1])),
            Ok(Message::Pong(vec![2])),
            Ok(Message::Text("hello".to_string())),
        ]);
        assert_eq!(read_text(&mut s).await.unwrap(), Some("hello".to_string()));
        assert_eq!(read_text(&mut s).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_binary_utf8_accepted() {
        let mut s = frames(vec![
            Ok(Message::Binary(vec![0xff, 0xfe])),
            Ok(Message::Binary(b"{}".to_vec())),
        ]);
        assert_eq!(read_text(&mut s).await.unwrap(), Some("{}".to_string()));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let mut s = frames(vec![
            Ok(Message::Close(None)),
            Ok(Message::Text("after".to_string())),
        ]);
        assert_eq!(read_text(&mut s).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_errors_surface() {
        let mut s = frames(vec![Err(WsError::ConnectionClosed)]);
        assert_eq!(read_text(&mut s).await.unwrap(), None);

        let mut s = frames(vec![Err(WsError::Utf8)]);
        assert!(matches!(
            read_text(&mut s).await,
            Err(SyncError::Network(NetworkError::WebSocket(_)))
        ));
    }
}
