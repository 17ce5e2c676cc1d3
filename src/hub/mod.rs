//! Relay hub module
//!
//! Server-side bookkeeping of who is connected and the fan-out rules for
//! join, move and leave events.

pub mod connection;
pub mod relay;

pub use connection::{Connection, ConnectionState};
pub use relay::RelayHub;
