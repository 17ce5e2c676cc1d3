//! Locomotion controller
//!
//! First-person movement for the local avatar. Each frame integrates, in order:
//! friction on horizontal velocity, gravity, key intent (view-relative), the
//! position update and the ground clamp. The controller tracks the *eye*
//! position; snapshots put the avatar's feet on the wire instead.
//!
//! Nothing responds to input until the avatar has touched the ground once.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Quat, Vec3};
use tracing::trace;

use crate::client::animation::{ActionIntent, ActionMachine};
use crate::client::input::{KeyEvent, LogicalKey};
use crate::protocol::{ActionName, PoseSnapshot, Position, Rotation};

/// Camera height above the avatar's feet
pub const EYE_HEIGHT: f32 = 1.66;
/// Horizontal acceleration while walking
pub const WALK_SPEED: f32 = 16.0;
/// Speed factor while the run modifier is held
pub const RUN_MULTIPLIER: f32 = 2.5;
/// Horizontal velocity decay rate
pub const FRICTION: f32 = 10.0;
/// Upward velocity added by a jump
pub const JUMP_VELOCITY: f32 = 20.0;
/// Downward acceleration
pub const GRAVITY: f32 = 9.8 * 8.0;

/// Which movement keys are held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MovementFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementFlags {
    fn set(&mut self, key: LogicalKey, held: bool) {
        match key {
            LogicalKey::Forward => self.forward = held,
            LogicalKey::Backward => self.backward = held,
            LogicalKey::Left => self.left = held,
            LogicalKey::Right => self.right = held,
            LogicalKey::Jump | LogicalKey::Run => {}
        }
    }

    fn any(&self) -> bool {
        self.forward || self.backward || self.left || self.right
    }
}

fn walk_action(key: LogicalKey) -> Option<ActionName> {
    match key {
        LogicalKey::Forward => Some(ActionName::WalkForward),
        LogicalKey::Backward => Some(ActionName::WalkBackward),
        LogicalKey::Left => Some(ActionName::WalkLeft),
        LogicalKey::Right => Some(ActionName::WalkRight),
        LogicalKey::Jump | LogicalKey::Run => None,
    }
}

fn axis(positive: bool, negative: bool) -> f32 {
    (positive as i32 - negative as i32) as f32
}

/// First-person movement state of the local avatar
#[derive(Debug, Clone)]
pub struct LocomotionController {
    position: Vec3,
    orientation: Quat,
    velocity: Vec3,
    direction: Vec3,
    flags: MovementFlags,
    running: bool,
    jump_held: bool,
    grounded: bool,
    has_landed: bool,
}

impl Default for LocomotionController {
    fn default() -> Self {
        Self::new()
    }
}

impl LocomotionController {
    /// Spawn at the origin with the eye at standing height
    pub fn new() -> Self {
        Self::with_position(Vec3::new(0.0, EYE_HEIGHT, 0.0))
    }

    /// Spawn with the eye at `position`
    pub fn with_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            direction: Vec3::ZERO,
            flags: MovementFlags::default(),
            running: false,
            jump_held: false,
            grounded: false,
            has_landed: false,
        }
    }

    /// Eye position
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Feet position
    pub fn ground_position(&self) -> Vec3 {
        self.position - Vec3::new(0.0, EYE_HEIGHT, 0.0)
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn flags(&self) -> MovementFlags {
        self.flags
    }

    /// Whether a jump is currently allowed
    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    /// Whether the avatar has touched the ground at least once
    pub fn has_landed(&self) -> bool {
        self.has_landed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current horizontal acceleration
    pub fn speed(&self) -> f32 {
        if self.running {
            WALK_SPEED * RUN_MULTIPLIER
        } else {
            WALK_SPEED
        }
    }

    /// Rotation around the vertical axis, with pitch and roll stripped
    pub fn yaw(&self) -> f32 {
        let (yaw, _pitch, _roll) = self.orientation.to_euler(EulerRot::YXZ);
        yaw
    }

    /// Replace the view orientation (driven by the renderer or pointer lock)
    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
    }

    /// Turn the view; pitch is clamped to straight up/down
    pub fn look(&mut self, yaw_delta: f32, pitch_delta: f32) {
        let (yaw, pitch, _roll) = self.orientation.to_euler(EulerRot::YXZ);
        let pitch = (pitch + pitch_delta).clamp(-FRAC_PI_2, FRAC_PI_2);
        self.orientation = Quat::from_euler(EulerRot::YXZ, yaw + yaw_delta, pitch, 0.0);
    }

    /// Horizontal right/forward unit vectors of the current view
    fn horizontal_basis(&self) -> (Vec3, Vec3) {
        let right = Quat::from_rotation_y(self.yaw()) * Vec3::X;
        let forward = Vec3::Y.cross(right);
        (right, forward)
    }

    /// Translate a key event into movement state and animation intents.
    ///
    /// Events before the first ground contact are ignored.
    pub fn handle_key(&mut self, event: KeyEvent) -> Vec<ActionIntent> {
        if !self.has_landed {
            trace!(event = ?event, "Ignoring input before landing");
            return Vec::new();
        }

        match event {
            KeyEvent::Pressed(LogicalKey::Jump) => {
                if !self.jump_held {
                    self.jump_held = true;
                    self.jump();
                }
                Vec::new()
            }
            KeyEvent::Released(LogicalKey::Jump) => {
                self.jump_held = false;
                Vec::new()
            }
            KeyEvent::Pressed(LogicalKey::Run) => {
                self.running = true;
                vec![ActionIntent::Run]
            }
            KeyEvent::Released(LogicalKey::Run) => {
                self.running = false;
                vec![ActionIntent::Walk]
            }
            KeyEvent::Pressed(key) => {
                self.flags.set(key, true);
                let mut intents: Vec<ActionIntent> =
                    walk_action(key).map(ActionIntent::Play).into_iter().collect();
                if self.running {
                    intents.push(ActionIntent::Run);
                }
                intents
            }
            KeyEvent::Released(key) => {
                // Any direction release idles, even with another direction held
                self.flags.set(key, false);
                vec![ActionIntent::Play(ActionName::Idle)]
            }
        }
    }

    /// Apply a jump impulse if standing on the ground
    pub fn jump(&mut self) -> bool {
        if !self.grounded {
            return false;
        }
        self.velocity.y += JUMP_VELOCITY;
        self.grounded = false;
        true
    }

    /// Drop all held input (pointer lock released)
    pub fn reset(&mut self) -> Vec<ActionIntent> {
        self.flags = MovementFlags::default();
        self.running = false;
        self.jump_held = false;
        self.grounded = false;
        vec![ActionIntent::Play(ActionName::Idle)]
    }

    /// Advance the simulation by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        self.velocity.x -= self.velocity.x * FRICTION * dt;
        self.velocity.z -= self.velocity.z * FRICTION * dt;
        self.velocity.y -= GRAVITY * dt;

        self.direction.z = axis(self.flags.forward, self.flags.backward);
        self.direction.x = axis(self.flags.right, self.flags.left);
        self.direction = self.direction.normalize_or_zero();

        let speed = self.speed();
        if self.flags.forward || self.flags.backward {
            self.velocity.z -= self.direction.z * speed * dt;
        }
        if self.flags.left || self.flags.right {
            self.velocity.x -= self.direction.x * speed * dt;
        }

        let (right, forward) = self.horizontal_basis();
        self.position += right * (-self.velocity.x * dt);
        self.position += forward * (-self.velocity.z * dt);
        self.position.y += self.velocity.y * dt;

        if self.position.y < EYE_HEIGHT {
            self.velocity.y = 0.0;
            self.position.y = EYE_HEIGHT;
            self.grounded = true;
            self.has_landed = true;
        }
    }

    /// Outbound pose: feet position, yaw only, and the avatar's action pair
    pub fn snapshot(&self, actions: &ActionMachine) -> PoseSnapshot {
        PoseSnapshot {
            position: Position::from(self.ground_position()),
            rotation: Rotation::from_yaw(self.yaw()),
            current_action_name: actions.current(),
            previous_action_name: actions.previous(),
        }
    }

    /// Whether any movement key is held
    pub fn is_moving(&self) -> bool {
        self.flags.any()
    }
}
