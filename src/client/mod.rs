//! Client module
//!
//! Participant-side state:
//! - Locomotion of the local avatar and its input bindings
//! - Animation action machine and mixers
//! - The WebSocket session to the relay and the remote avatar registry

pub mod animation;
pub mod avatars;
pub mod input;
pub mod locomotion;
pub mod mixer;
pub mod player;
pub mod session;

pub use animation::{ActionIntent, ActionMachine, AnimationMixer, AvatarAnimation};
pub use avatars::{RemoteAvatar, RemoteAvatars};
pub use input::{KeyEvent, LogicalKey};
pub use locomotion::LocomotionController;
pub use mixer::{headless_animation, WeightMixer};
pub use player::LocalPlayer;
pub use session::{SessionHandler, TransportSession};
