//! Animation action machine
//!
//! Turns movement intents into named clips and blends between them. The
//! machine only records *which* clip should play; the per-frame [`AvatarAnimation::tick`]
//! notices a pending change, starts a cross-fade on the mixer and moves on.
//! Fades are never awaited: a new transition simply starts a new fade from
//! whatever is current.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::protocol::ActionName;

/// Cross-fade length in seconds
pub const CROSS_FADE_DURATION: f32 = 0.2;

/// A request to change what the avatar is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionIntent {
    /// Switch to the named action unconditionally
    Play(ActionName),
    /// Switch the current walking action to its running counterpart
    Run,
    /// Switch the current running action back to walking
    Walk,
}

/// Current/previous action pair of one avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionMachine {
    current: ActionName,
    previous: ActionName,
}

impl ActionMachine {
    /// Start idle, with nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ActionName {
        self.current
    }

    pub fn previous(&self) -> ActionName {
        self.previous
    }

    /// Apply an intent, returning whether the current action changed.
    ///
    /// `Run` and `Walk` only remap names that have a counterpart; running
    /// backward does not exist, so `walk_backward` is left alone.
    pub fn apply(&mut self, intent: ActionIntent) -> bool {
        let next = match intent {
            ActionIntent::Play(action) => Some(action),
            ActionIntent::Run => self.current.run_counterpart(),
            ActionIntent::Walk => self.current.walk_counterpart(),
        };
        match next {
            Some(action) if action != self.current => {
                self.current = action;
                true
            }
            _ => false,
        }
    }

    /// Overwrite the current action (remote avatars follow the network)
    pub fn set_current(&mut self, action: ActionName) {
        self.current = action;
    }

    /// `(from, to)` if a cross-fade has yet to be started
    pub fn pending_transition(&self) -> Option<(ActionName, ActionName)> {
        (self.current != self.previous).then_some((self.previous, self.current))
    }

    /// Mark the pending transition as started
    pub fn commit(&mut self) {
        self.previous = self.current;
    }
}

/// Playback backend for one avatar's clips.
///
/// Implemented by the rendering side; [`crate::client::mixer::WeightMixer`]
/// is the in-crate implementation used headless.
pub trait AnimationMixer {
    /// Handle of a playable clip
    type Clip: Copy + fmt::Debug;

    fn enable(&mut self, clip: Self::Clip);
    fn play(&mut self, clip: Self::Clip);
    fn set_effective_time_scale(&mut self, clip: Self::Clip, time_scale: f32);
    fn set_effective_weight(&mut self, clip: Self::Clip, weight: f32);
    fn set_time(&mut self, clip: Self::Clip, time: f32);

    /// Fade `from` out and `to` in over `duration`, optionally warping their
    /// time scales so the clips stay in step
    fn cross_fade(&mut self, from: Self::Clip, to: Self::Clip, duration: f32, warp: bool);

    /// Fade `clip` in from zero weight over `duration`
    fn fade_in(&mut self, clip: Self::Clip, duration: f32);

    /// Advance playback and any running fades
    fn update(&mut self, dt: f32);
}

/// Animation state of one avatar: the action machine, its clips and its mixer
pub struct AvatarAnimation<M: AnimationMixer> {
    machine: ActionMachine,
    clips: HashMap<ActionName, M::Clip>,
    mixer: M,
}

impl<M: AnimationMixer> AvatarAnimation<M> {
    /// Start every clip playing, with only `idle` visible
    pub fn new(mut mixer: M, clips: HashMap<ActionName, M::Clip>) -> Self {
        for (action, clip) in &clips {
            let weight = if *action == ActionName::Idle { 1.0 } else { 0.0 };
            mixer.enable(*clip);
            mixer.set_effective_time_scale(*clip, 1.0);
            mixer.set_effective_weight(*clip, weight);
            mixer.play(*clip);
        }
        Self {
            machine: ActionMachine::new(),
            clips,
            mixer,
        }
    }

    pub fn machine(&self) -> &ActionMachine {
        &self.machine
    }

    pub fn current(&self) -> ActionName {
        self.machine.current()
    }

    pub fn previous(&self) -> ActionName {
        self.machine.previous()
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    pub fn clip(&self, action: ActionName) -> Option<M::Clip> {
        self.clips.get(&action).copied()
    }

    /// Apply an input intent
    pub fn apply(&mut self, intent: ActionIntent) -> bool {
        self.machine.apply(intent)
    }

    /// Follow an action name received from the network
    pub fn set_action(&mut self, action: ActionName) {
        self.machine.set_current(action);
    }

    /// Start any pending cross-fade, then advance the mixer by `dt`
    pub fn tick(&mut self, dt: f32) {
        if let Some((from, to)) = self.machine.pending_transition() {
            debug!(from = %from, to = %to, "Animation transition");
            match self.clips.get(&to).copied() {
                Some(target) => {
                    let source = self.clips.get(&from).copied();
                    self.execute_cross_fade(source, target, CROSS_FADE_DURATION);
                }
                None => warn!(action = %to, "No clip loaded for action"),
            }
            self.machine.commit();
        }
        self.mixer.update(dt);
    }

    fn execute_cross_fade(&mut self, source: Option<M::Clip>, target: M::Clip, duration: f32) {
        self.mixer.enable(target);
        self.mixer.set_effective_time_scale(target, 1.0);
        self.mixer.set_effective_weight(target, 1.0);
        self.mixer.set_time(target, 0.0);
        match source {
            Some(source) => self.mixer.cross_fade(source, target, duration, true),
            None => self.mixer.fade_in(target, duration),
        }
    }
}

impl<M: AnimationMixer> fmt::Debug for AvatarAnimation<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvatarAnimation")
            .field("machine", &self.machine)
            .field("clips", &self.clips.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Enable(ActionName),
        Play(ActionName),
        TimeScale(ActionName, f32),
        Weight(ActionName, f32),
        Time(ActionName, f32),
        CrossFade(ActionName, ActionName, f32, bool),
        FadeIn(ActionName, f32),
        Update(f32),
    }

    /// Records every call so ordering can be asserted
    #[derive(Default)]
    struct RecordingMixer {
        calls: Vec<Call>,
    }

    impl AnimationMixer for RecordingMixer {
        type Clip = ActionName;

        fn enable(&mut self, clip: ActionName) {
            self.calls.push(Call::Enable(clip));
        }
        fn play(&mut self, clip: ActionName) {
            self.calls.push(Call::Play(clip));
        }
        fn set_effective_time_scale(&mut self, clip: ActionName, time_scale: f32) {
            self.calls.push(Call::TimeScale(clip, time_scale));
        }
        fn set_effective_weight(&mut self, clip: ActionName, weight: f32) {
            self.calls.push(Call::Weight(clip, weight));
        }
        fn set_time(&mut self, clip: ActionName, time: f32) {
            self.calls.push(Call::Time(clip, time));
        }
        fn cross_fade(&mut self, from: ActionName, to: ActionName, duration: f32, warp: bool) {
            self.calls.push(Call::CrossFade(from, to, duration, warp));
        }
        fn fade_in(&mut self, clip: ActionName, duration: f32) {
            self.calls.push(Call::FadeIn(clip, duration));
        }
        fn update(&mut self, dt: f32) {
            self.calls.push(Call::Update(dt));
        }
    }

    fn recording_animation(actions: &[ActionName]) -> AvatarAnimation<RecordingMixer> {
        let clips = actions.iter().map(|a| (*a, *a)).collect();
        let mut animation = AvatarAnimation::new(RecordingMixer::default(), clips);
        animation.mixer.calls.clear();
        animation
    }

    #[test]
    fn test_direct_names_transition_unconditionally() {
        let mut machine = ActionMachine::new();
        assert!(machine.apply(ActionIntent::Play(ActionName::WalkLeft)));
        assert_eq!(machine.current(), ActionName::WalkLeft);
        assert!(machine.apply(ActionIntent::Play(ActionName::RunRight)));
        assert_eq!(machine.current(), ActionName::RunRight);
        assert!(!machine.apply(ActionIntent::Play(ActionName::RunRight)));
    }

    #[test]
    fn test_run_is_idempotent() {
        let mut machine = ActionMachine::new();
        machine.apply(ActionIntent::Play(ActionName::WalkForward));
        assert!(machine.apply(ActionIntent::Run));
        assert_eq!(machine.current(), ActionName::RunForward);
        assert!(!machine.apply(ActionIntent::Run));
        assert_eq!(machine.current(), ActionName::RunForward);
    }

    #[test]
    fn test_walk_then_run_round_trips() {
        let mut machine = ActionMachine::new();
        machine.apply(ActionIntent::Play(ActionName::RunForward));
        machine.apply(ActionIntent::Walk);
        assert_eq!(machine.current(), ActionName::WalkForward);
        machine.apply(ActionIntent::Run);
        assert_eq!(machine.current(), ActionName::RunForward);
    }

    #[test]
    fn test_modifiers_ignore_idle_and_backward() {
        let mut machine = ActionMachine::new();
        assert!(!machine.apply(ActionIntent::Run));
        assert!(!machine.apply(ActionIntent::Walk));
        assert_eq!(machine.current(), ActionName::Idle);

        machine.apply(ActionIntent::Play(ActionName::WalkBackward));
        assert!(!machine.apply(ActionIntent::Run));
        assert_eq!(machine.current(), ActionName::WalkBackward);
        assert!(!machine.apply(ActionIntent::Walk));
        assert_eq!(machine.current(), ActionName::WalkBackward);
    }

    #[test]
    fn test_walk_on_walking_is_noop() {
        let mut machine = ActionMachine::new();
        machine.apply(ActionIntent::Play(ActionName::WalkRight));
        assert!(!machine.apply(ActionIntent::Walk));
        assert_eq!(machine.current(), ActionName::WalkRight);
    }

    #[test]
    fn test_previous_waits_for_commit() {
        let mut machine = ActionMachine::new();
        machine.apply(ActionIntent::Play(ActionName::WalkForward));
        machine.apply(ActionIntent::Run);
        assert_eq!(machine.previous(), ActionName::Idle);
        assert_eq!(
            machine.pending_transition(),
            Some((ActionName::Idle, ActionName::RunForward))
        );
        machine.commit();
        assert_eq!(machine.previous(), ActionName::RunForward);
        assert_eq!(machine.pending_transition(), None);
    }

    #[test]
    fn test_initial_clip_setup() {
        let clips: HashMap<_, _> = [(ActionName::Idle, ActionName::Idle)].into_iter().collect();
        let animation = AvatarAnimation::new(RecordingMixer::default(), clips);
        assert_eq!(
            animation.mixer().calls,
            vec![
                Call::Enable(ActionName::Idle),
                Call::TimeScale(ActionName::Idle, 1.0),
                Call::Weight(ActionName::Idle, 1.0),
                Call::Play(ActionName::Idle),
            ]
        );
    }

    #[test]
    fn test_tick_without_change_only_updates() {
        let mut animation = recording_animation(&[ActionName::Idle, ActionName::WalkForward]);
        animation.tick(0.016);
        assert_eq!(animation.mixer().calls, vec![Call::Update(0.016)]);
    }

    #[test]
    fn test_tick_starts_cross_fade_before_update() {
        let mut animation = recording_animation(&[ActionName::Idle, ActionName::WalkForward]);
        animation.apply(ActionIntent::Play(ActionName::WalkForward));
        animation.tick(0.016);

        assert_eq!(
            animation.mixer().calls,
            vec![
                Call::Enable(ActionName::WalkForward),
                Call::TimeScale(ActionName::WalkForward, 1.0),
                Call::Weight(ActionName::WalkForward, 1.0),
                Call::Time(ActionName::WalkForward, 0.0),
                Call::CrossFade(
                    ActionName::Idle,
                    ActionName::WalkForward,
                    CROSS_FADE_DURATION,
                    true
                ),
                Call::Update(0.016),
            ]
        );
        assert_eq!(animation.previous(), ActionName::WalkForward);
    }

    #[test]
    fn test_fade_in_without_source_clip() {
        let mut animation = recording_animation(&[ActionName::WalkLeft]);
        animation.apply(ActionIntent::Play(ActionName::WalkLeft));
        animation.tick(0.01);
        assert!(animation
            .mixer()
            .calls
            .contains(&Call::FadeIn(ActionName::WalkLeft, CROSS_FADE_DURATION)));
    }

    #[test]
    fn test_missing_target_clip_still_commits() {
        let mut animation = recording_animation(&[ActionName::Idle]);
        animation.set_action(ActionName::RunLeft);
        animation.tick(0.01);
        assert_eq!(animation.mixer().calls, vec![Call::Update(0.01)]);
        assert_eq!(animation.previous(), ActionName::RunLeft);
    }

    #[test]
    fn test_rapid_transitions_fade_from_latest() {
        let mut animation = recording_animation(&[
            ActionName::Idle,
            ActionName::WalkForward,
            ActionName::RunForward,
        ]);
        animation.apply(ActionIntent::Play(ActionName::WalkForward));
        animation.tick(0.01);
        animation.apply(ActionIntent::Run);
        animation.tick(0.01);

        let fades: Vec<_> = animation
            .mixer()
            .calls
            .iter()
            .filter(|c| matches!(c, Call::CrossFade(..)))
            .cloned()
            .collect();
        assert_eq!(
            fades,
            vec![
                Call::CrossFade(ActionName::Idle, ActionName::WalkForward, 0.2, true),
                Call::CrossFade(ActionName::WalkForward, ActionName::RunForward, 0.2, true),
            ]
        );
    }
}
