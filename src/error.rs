//! Error handling module
//!
//! Defines custom error types for the avatar sync relay and client.

use std::io;

use thiserror::Error;

/// Main error type for avatar sync
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection not open: {0}")]
    NotOpen(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Write buffer full")]
    WriteBufferFull,
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown message context: {0}")]
    UnknownContext(String),

    #[error("Missing message context")]
    MissingContext,

    #[error("Encoding failed: {0}")]
    EncodeFailed(String),
}

/// Result type alias for avatar sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Network(NetworkError::WebSocket(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");

        let err = ProtocolError::UnknownContext("teleport".to_string());
        assert_eq!(err.to_string(), "Unknown message context: teleport");

        let err = SyncError::from(ProtocolError::MissingContext);
        assert_eq!(err.to_string(), "Protocol error: Missing message context");
    }

    #[test]
    fn test_network_error_wraps() {
        let err: SyncError = NetworkError::NotOpen("abc".to_string()).into();
        assert!(matches!(
            err,
            SyncError::Network(NetworkError::NotOpen(ref id)) if id == "abc"
        ));
    }
}
