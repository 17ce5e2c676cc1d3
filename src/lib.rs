//! Avatar Sync Library
//!
//! Shared 3D scene presence over WebSockets: a relay hub that fans out join,
//! move and leave events, and the participant-side locomotion, animation and
//! session state that feeds it.
//!
//! ## Modules
//!
//! - `client` - Locomotion controller, animation machine, relay session
//! - `config` - Relay and client configuration management
//! - `error` - Error types and result definitions
//! - `hub` - Connection registry, roster and fan-out rules
//! - `identity` - Participant identifiers
//! - `net` - WebSocket listener, connection handler and frame reading
//! - `protocol` - JSON wire messages and action names

pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod identity;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::{ClientConfig, ServerConfig};
pub use error::{Result, SyncError};
pub use identity::ConnectionId;
pub use state::AppState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
