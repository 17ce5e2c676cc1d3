//! Protocol module
//!
//! Shared wire types for the relay and its clients:
//! - Action names (animation clip identifiers carried in pose updates)
//! - Tagged client and server messages and their JSON encoding

pub mod action;
pub mod messages;

pub use action::ActionName;
pub use messages::{ClientMessage, PeerMove, PoseSnapshot, Position, Rotation, ServerMessage};
