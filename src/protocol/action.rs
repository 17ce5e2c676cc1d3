//! Animation action names
//!
//! The closed set of locomotion clips an avatar can be playing. The names travel
//! over the wire verbatim (`walk_forward`, `run_left`, ...), so the serde
//! representation is part of the protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// A named locomotion animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    #[default]
    Idle,
    WalkForward,
    WalkBackward,
    WalkLeft,
    WalkRight,
    RunForward,
    RunLeft,
    RunRight,
}

impl ActionName {
    /// Every action, in clip-loading order
    pub const ALL: [ActionName; 8] = [
        ActionName::Idle,
        ActionName::RunForward,
        ActionName::RunLeft,
        ActionName::RunRight,
        ActionName::WalkForward,
        ActionName::WalkBackward,
        ActionName::WalkRight,
        ActionName::WalkLeft,
    ];

    /// Wire name of the action
    pub fn name(&self) -> &'static str {
        match self {
            ActionName::Idle => "idle",
            ActionName::WalkForward => "walk_forward",
            ActionName::WalkBackward => "walk_backward",
            ActionName::WalkLeft => "walk_left",
            ActionName::WalkRight => "walk_right",
            ActionName::RunForward => "run_forward",
            ActionName::RunLeft => "run_left",
            ActionName::RunRight => "run_right",
        }
    }

    /// Run counterpart of a walking action.
    ///
    /// `walk_backward` has no running clip and maps to `None`.
    pub fn run_counterpart(&self) -> Option<ActionName> {
        match self {
            ActionName::WalkForward => Some(ActionName::RunForward),
            ActionName::WalkLeft => Some(ActionName::RunLeft),
            ActionName::WalkRight => Some(ActionName::RunRight),
            _ => None,
        }
    }

    /// Walk counterpart of a running action
    pub fn walk_counterpart(&self) -> Option<ActionName> {
        match self {
            ActionName::RunForward => Some(ActionName::WalkForward),
            ActionName::RunLeft => Some(ActionName::WalkLeft),
            ActionName::RunRight => Some(ActionName::WalkRight),
            _ => None,
        }
    }

    /// Check if this is one of the running actions
    pub fn is_running(&self) -> bool {
        self.walk_counterpart().is_some()
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionName {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionName::ALL
            .iter()
            .copied()
            .find(|action| action.name() == s)
            .ok_or_else(|| ProtocolError::MalformedMessage(format!("unknown action name: {}", s)))
    }
}
