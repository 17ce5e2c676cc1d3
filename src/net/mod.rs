//! Networking module
//!
//! This module handles the relay's network plumbing:
//! - Accepting TCP connections and upgrading them to WebSocket
//! - Per-connection read loops and writer tasks
//! - Reading text frames off a WebSocket stream (shared with the client)

pub mod handler;
pub mod listener;
pub mod transport;
