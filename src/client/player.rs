//! Local player
//!
//! Couples the locomotion controller with the local avatar's animation record
//! and produces the snapshot sent to the relay each frame.

use crate::client::animation::{AnimationMixer, AvatarAnimation};
use crate::client::input::{KeyEvent, LogicalKey};
use crate::client::locomotion::LocomotionController;
use crate::protocol::PoseSnapshot;

/// The participant driven by this client's input
#[derive(Debug)]
pub struct LocalPlayer<M: AnimationMixer> {
    controller: LocomotionController,
    animation: AvatarAnimation<M>,
}

impl<M: AnimationMixer> LocalPlayer<M> {
    pub fn new(animation: AvatarAnimation<M>) -> Self {
        Self::with_controller(LocomotionController::new(), animation)
    }

    pub fn with_controller(controller: LocomotionController, animation: AvatarAnimation<M>) -> Self {
        Self {
            controller,
            animation,
        }
    }

    pub fn controller(&self) -> &LocomotionController {
        &self.controller
    }

    pub fn animation(&self) -> &AvatarAnimation<M> {
        &self.animation
    }

    /// Feed a key event through movement and animation
    pub fn handle_key(&mut self, event: KeyEvent) {
        for intent in self.controller.handle_key(event) {
            self.animation.apply(intent);
        }
    }

    /// Feed a raw key code; unbound keys are ignored
    pub fn handle_key_code(&mut self, code: &str, pressed: bool) {
        if let Some(key) = LogicalKey::from_code(code) {
            let event = if pressed {
                KeyEvent::Pressed(key)
            } else {
                KeyEvent::Released(key)
            };
            self.handle_key(event);
        }
    }

    pub fn look(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.controller.look(yaw_delta, pitch_delta);
    }

    /// Release all held input
    pub fn reset(&mut self) {
        for intent in self.controller.reset() {
            self.animation.apply(intent);
        }
    }

    /// Step one frame and return the pose to publish.
    ///
    /// The snapshot is taken before the animation tick so a transition started
    /// this frame still shows its `previous` action on the wire.
    pub fn frame(&mut self, dt: f32) -> PoseSnapshot {
        self.controller.update(dt);
        let snapshot = self.controller.snapshot(self.animation.machine());
        self.animation.tick(dt);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mixer::headless_animation;
    use crate::protocol::ActionName;
    use pretty_assertions::assert_eq;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_keys_ignored_until_landed() {
        let mut player = LocalPlayer::new(headless_animation());
        player.handle_key_code("KeyW", true);
        assert_eq!(player.animation().current(), ActionName::Idle);

        player.frame(DT);
        player.handle_key_code("KeyW", true);
        assert_eq!(player.animation().current(), ActionName::WalkForward);
    }

    #[test]
    fn test_frame_reports_transition_pair() {
        let mut player = LocalPlayer::new(headless_animation());
        player.frame(DT);

        player.handle_key_code("KeyW", true);
        player.handle_key_code("ShiftLeft", true);
        let snapshot = player.frame(DT);
        assert_eq!(snapshot.current_action_name, ActionName::RunForward);
        assert_eq!(snapshot.previous_action_name, ActionName::Idle);

        let snapshot = player.frame(DT);
        assert_eq!(snapshot.previous_action_name, ActionName::RunForward);
        assert!(snapshot.position.z < 0.0);
    }

    #[test]
    fn test_backward_does_not_run() {
        let mut player = LocalPlayer::new(headless_animation());
        player.frame(DT);
        player.handle_key_code("ShiftLeft", true);
        player.handle_key_code("KeyS", true);
        assert_eq!(player.animation().current(), ActionName::WalkBackward);
        assert!(player.controller().is_running());
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut player = LocalPlayer::new(headless_animation());
        player.frame(DT);
        player.handle_key_code("KeyD", true);
        player.reset();
        assert_eq!(player.animation().current(), ActionName::Idle);
        player.handle_key_code("KeyQ", true);
        assert_eq!(player.animation().current(), ActionName::Idle);
    }
}
