//! Weight mixer
//!
//! A renderer-free [`AnimationMixer`] that tracks per-clip playback time,
//! blend weight and time scale. Fades and warps are linear ramps advanced by
//! [`AnimationMixer::update`]; a clip that finishes fading out is disabled.

use std::collections::HashMap;

use tracing::warn;

use crate::client::animation::{AnimationMixer, AvatarAnimation};
use crate::protocol::ActionName;

/// Clip length used when no asset metadata is available
pub const DEFAULT_CLIP_DURATION: f32 = 1.0;

/// Handle of a clip registered with a [`WeightMixer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(usize);

/// Linear interpolation of a value over time
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ramp {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Ramp {
    fn new(from: f32, to: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            elapsed: 0.0,
            duration,
        }
    }

    fn value(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).min(1.0);
        self.from + (self.to - self.from) * t
    }

    fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Debug, Clone)]
struct ClipState {
    name: String,
    duration: f32,
    enabled: bool,
    playing: bool,
    time: f32,
    weight: f32,
    time_scale: f32,
    fade: Option<Ramp>,
    warp: Option<Ramp>,
}

impl ClipState {
    fn new(name: String, duration: f32) -> Self {
        Self {
            name,
            duration,
            enabled: true,
            playing: false,
            time: 0.0,
            weight: 1.0,
            time_scale: 1.0,
            fade: None,
            warp: None,
        }
    }

    fn update(&mut self, dt: f32) {
        if !self.enabled || !self.playing {
            return;
        }

        if let Some(warp) = self.warp.as_mut() {
            warp.advance(dt);
            self.time_scale = warp.value();
            if warp.is_done() {
                self.warp = None;
            }
        }

        self.time += dt * self.time_scale;
        if self.duration > 0.0 {
            self.time = self.time.rem_euclid(self.duration);
        }

        if let Some(fade) = self.fade.as_mut() {
            fade.advance(dt);
            self.weight = fade.value();
            if fade.is_done() {
                self.fade = None;
                if self.weight == 0.0 {
                    self.enabled = false;
                }
            }
        }
    }
}

/// In-memory mixer for headless avatars
#[derive(Debug, Clone, Default)]
pub struct WeightMixer {
    clips: Vec<ClipState>,
}

impl WeightMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a looping clip of the given length in seconds
    pub fn add_clip(&mut self, name: impl Into<String>, duration: f32) -> ClipId {
        self.clips.push(ClipState::new(name.into(), duration));
        ClipId(self.clips.len() - 1)
    }

    /// Whether `clip` was registered with this mixer
    pub fn contains(&self, clip: ClipId) -> bool {
        self.clips.get(clip.0).is_some()
    }

    /// Blend weight the clip currently contributes (zero when disabled or unknown)
    pub fn weight(&self, clip: ClipId) -> f32 {
        self.clips
            .get(clip.0)
            .filter(|state| state.enabled)
            .map_or(0.0, |state| state.weight)
    }

    pub fn time_scale(&self, clip: ClipId) -> f32 {
        self.clips.get(clip.0).map_or(0.0, |state| state.time_scale)
    }

    pub fn time(&self, clip: ClipId) -> f32 {
        self.clips.get(clip.0).map_or(0.0, |state| state.time)
    }

    pub fn is_enabled(&self, clip: ClipId) -> bool {
        self.clips.get(clip.0).is_some_and(|state| state.enabled)
    }

    pub fn is_fading(&self, clip: ClipId) -> bool {
        self.clips.get(clip.0).is_some_and(|state| state.fade.is_some())
    }

    pub fn name(&self, clip: ClipId) -> Option<&str> {
        self.clips.get(clip.0).map(|state| state.name.as_str())
    }

    fn clip_mut(&mut self, clip: ClipId) -> Option<&mut ClipState> {
        let state = self.clips.get_mut(clip.0);
        if state.is_none() {
            warn!(clip = clip.0, "Ignoring unknown clip handle");
        }
        state
    }

    fn clip_duration(&self, clip: ClipId) -> Option<f32> {
        self.clips.get(clip.0).map(|state| state.duration)
    }

    fn schedule_fade(&mut self, clip: ClipId, from: f32, to: f32, duration: f32) {
        if let Some(state) = self.clip_mut(clip) {
            state.weight = from;
            state.fade = Some(Ramp::new(from, to, duration));
        }
    }

    fn schedule_warp(&mut self, clip: ClipId, from: f32, to: f32, duration: f32) {
        if let Some(state) = self.clip_mut(clip) {
            state.time_scale = from;
            state.warp = Some(Ramp::new(from, to, duration));
        }
    }
}

impl AnimationMixer for WeightMixer {
    type Clip = ClipId;

    fn enable(&mut self, clip: ClipId) {
        if let Some(state) = self.clip_mut(clip) {
            state.enabled = true;
        }
    }

    fn play(&mut self, clip: ClipId) {
        if let Some(state) = self.clip_mut(clip) {
            state.playing = true;
        }
    }

    fn set_effective_time_scale(&mut self, clip: ClipId, time_scale: f32) {
        if let Some(state) = self.clip_mut(clip) {
            state.time_scale = time_scale;
            state.warp = None;
        }
    }

    fn set_effective_weight(&mut self, clip: ClipId, weight: f32) {
        if let Some(state) = self.clip_mut(clip) {
            state.weight = weight;
            state.fade = None;
        }
    }

    fn set_time(&mut self, clip: ClipId, time: f32) {
        if let Some(state) = self.clip_mut(clip) {
            state.time = time;
        }
    }

    fn cross_fade(&mut self, from: ClipId, to: ClipId, duration: f32, warp: bool) {
        self.schedule_fade(from, 1.0, 0.0, duration);
        self.schedule_fade(to, 0.0, 1.0, duration);

        if warp {
            let (Some(from_len), Some(to_len)) = (self.clip_duration(from), self.clip_duration(to))
            else {
                return;
            };
            if from_len > 0.0 && to_len > 0.0 {
                // Stretch both clips so their cycles line up while blending
                self.schedule_warp(from, 1.0, from_len / to_len, duration);
                self.schedule_warp(to, to_len / from_len, 1.0, duration);
            }
        }
    }

    fn fade_in(&mut self, clip: ClipId, duration: f32) {
        self.schedule_fade(clip, 0.0, 1.0, duration);
    }

    fn update(&mut self, dt: f32) {
        for clip in &mut self.clips {
            clip.update(dt);
        }
    }
}

/// Build a headless avatar with one clip per action
pub fn headless_animation() -> AvatarAnimation<WeightMixer> {
    headless_animation_with(|_| DEFAULT_CLIP_DURATION)
}

/// Build a headless avatar, taking clip lengths from `duration_of`
pub fn headless_animation_with<F>(duration_of: F) -> AvatarAnimation<WeightMixer>
where
    F: Fn(ActionName) -> f32,
{
    let mut mixer = WeightMixer::new();
    let clips: HashMap<ActionName, ClipId> = ActionName::ALL
        .iter()
        .map(|action| (*action, mixer.add_clip(action.name(), duration_of(*action))))
        .collect();
    AvatarAnimation::new(mixer, clips)
}
