//! Wire message definitions
//!
//! Every frame on the wire is a JSON text message tagged by a `context` field.
//! Clients send [`ClientMessage`]s, the relay answers with [`ServerMessage`]s.
//!
//! | context      | direction          | payload                                        |
//! |--------------|--------------------|------------------------------------------------|
//! | `userReady`  | client -> relay    | none                                           |
//! | `playerMove` | client -> relay    | position, rotation, current/previous action    |
//! | `join`       | relay -> all       | `userList`, recipient `uuid`                   |
//! | `move`       | relay -> all others| pose fields plus sender `uuid`                 |
//! | `leave`      | relay -> remaining | `disconnectedUUID`, recipient `uuid`           |

use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::identity::ConnectionId;
use crate::protocol::action::ActionName;

/// Context tag of the client ready signal
pub const CONTEXT_USER_READY: &str = "userReady";
/// Context tag of the client pose update
pub const CONTEXT_PLAYER_MOVE: &str = "playerMove";
/// Context tag of the roster broadcast
pub const CONTEXT_JOIN: &str = "join";
/// Context tag of the relayed pose update
pub const CONTEXT_MOVE: &str = "move";
/// Context tag of the disconnect broadcast
pub const CONTEXT_LEAVE: &str = "leave";

/// Ground-contact position of an avatar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

/// Yaw-only avatar rotation, in radians around the vertical axis.
///
/// Browser clients send a serialized `THREE.Euler` (`_x`, `_y`, `_z`,
/// `_order`); only its `_y` is read.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(rename = "y", alias = "_y")]
    pub yaw: f32,
}

impl Rotation {
    pub fn from_yaw(yaw: f32) -> Self {
        Self { yaw }
    }
}

/// Per-frame pose plus animation state of the local avatar
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSnapshot {
    pub position: Position,
    pub rotation: Rotation,
    pub current_action_name: ActionName,
    pub previous_action_name: ActionName,
}

/// A pose update relayed from another participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMove {
    /// Identifier of the participant that moved
    pub uuid: ConnectionId,
    pub position: Position,
    pub rotation: Rotation,
    pub current_action_name: ActionName,
    pub previous_action_name: ActionName,
}

impl PeerMove {
    /// Tag a snapshot with the identifier of its sender
    pub fn new(uuid: ConnectionId, snapshot: PoseSnapshot) -> Self {
        Self {
            uuid,
            position: snapshot.position,
            rotation: snapshot.rotation,
            current_action_name: snapshot.current_action_name,
            previous_action_name: snapshot.previous_action_name,
        }
    }

    /// The pose carried by this update
    pub fn snapshot(&self) -> PoseSnapshot {
        PoseSnapshot {
            position: self.position,
            rotation: self.rotation,
            current_action_name: self.current_action_name,
            previous_action_name: self.previous_action_name,
        }
    }
}

/// Messages sent from a client to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "context")]
pub enum ClientMessage {
    /// The client is ready to receive the roster
    #[serde(rename = "userReady")]
    UserReady,
    /// The client's avatar moved
    #[serde(rename = "playerMove")]
    PlayerMove(PoseSnapshot),
}

/// Messages sent from the relay to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "context")]
pub enum ServerMessage {
    /// Full roster in join order; `uuid` is the recipient's own identifier
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "userList")]
        user_list: Vec<ConnectionId>,
        uuid: ConnectionId,
    },
    /// Another participant moved
    #[serde(rename = "move")]
    Move(PeerMove),
    /// A participant disconnected; `uuid` is the recipient's own identifier
    #[serde(rename = "leave")]
    Leave {
        #[serde(rename = "disconnectedUUID")]
        disconnected_uuid: ConnectionId,
        uuid: ConnectionId,
    },
}

impl ClientMessage {
    const CONTEXTS: &'static [&'static str] = &[CONTEXT_USER_READY, CONTEXT_PLAYER_MOVE];

    /// Context tag of this message
    pub fn context(&self) -> &'static str {
        match self {
            ClientMessage::UserReady => CONTEXT_USER_READY,
            ClientMessage::PlayerMove(_) => CONTEXT_PLAYER_MOVE,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode(self)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode(text, Self::CONTEXTS)
    }
}

impl ServerMessage {
    const CONTEXTS: &'static [&'static str] = &[CONTEXT_JOIN, CONTEXT_MOVE, CONTEXT_LEAVE];

    /// Context tag of this message
    pub fn context(&self) -> &'static str {
        match self {
            ServerMessage::Join { .. } => CONTEXT_JOIN,
            ServerMessage::Move(_) => CONTEXT_MOVE,
            ServerMessage::Leave { .. } => CONTEXT_LEAVE,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode(self)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        decode(text, Self::CONTEXTS)
    }
}

fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::EncodeFailed(e.to_string()))
}

/// Decode a tagged message, telling unknown contexts apart from broken payloads
fn decode<T: DeserializeOwned>(text: &str, contexts: &[&str]) -> Result<T, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))?;

    let context = match value.get("context") {
        Some(serde_json::Value::String(context)) => context.as_str(),
        Some(_) | None => return Err(ProtocolError::MissingContext),
    };

    if !contexts.contains(&context) {
        return Err(ProtocolError::UnknownContext(context.to_string()));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
}
