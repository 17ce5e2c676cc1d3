//! Remote avatar registry
//!
//! Every other participant in the scene is a [`RemoteAvatar`]: the last pose
//! the relay forwarded plus that avatar's own animation record. The reader
//! task of the session writes here, the frame loop reads and ticks.

use std::collections::HashSet;
use std::time::Instant;

use dashmap::DashMap;
use glam::Vec3;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::client::animation::{AnimationMixer, AvatarAnimation};
use crate::client::session::SessionHandler;
use crate::identity::ConnectionId;
use crate::protocol::{ActionName, PeerMove, PoseSnapshot, Position, Rotation};

/// Builds the animation record for a newly seen participant
pub type AnimationFactory<M> = Box<dyn Fn() -> AvatarAnimation<M> + Send + Sync>;

/// Another participant as seen by this client
#[derive(Debug)]
pub struct RemoteAvatar<M: AnimationMixer> {
    /// Feet position
    pub position: Vec3,
    /// Rotation around the vertical axis
    pub yaw: f32,
    pub animation: AvatarAnimation<M>,
    /// When the last move arrived, `None` until the first one
    pub last_update: Option<Instant>,
}

impl<M: AnimationMixer> RemoteAvatar<M> {
    fn new(animation: AvatarAnimation<M>) -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            animation,
            last_update: None,
        }
    }

    fn apply(&mut self, update: &PeerMove) {
        self.position = update.position.into();
        self.yaw = update.rotation.yaw;
        self.animation.set_action(update.current_action_name);
        self.last_update = Some(Instant::now());
    }

    /// Current pose in wire form
    pub fn snapshot(&self) -> PoseSnapshot {
        PoseSnapshot {
            position: Position::from(self.position),
            rotation: Rotation::from_yaw(self.yaw),
            current_action_name: self.animation.current(),
            previous_action_name: self.animation.previous(),
        }
    }
}

/// Concurrent map of remote avatars keyed by participant identifier
pub struct RemoteAvatars<M: AnimationMixer> {
    avatars: DashMap<ConnectionId, RemoteAvatar<M>>,
    local_id: RwLock<Option<ConnectionId>>,
    factory: AnimationFactory<M>,
}

impl<M: AnimationMixer> RemoteAvatars<M> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> AvatarAnimation<M> + Send + Sync + 'static,
    {
        Self {
            avatars: DashMap::new(),
            local_id: RwLock::new(None),
            factory: Box::new(factory),
        }
    }

    /// Identifier the relay assigned to this client, once known
    pub fn local_id(&self) -> Option<ConnectionId> {
        self.local_id.read().clone()
    }

    fn is_local(&self, id: &ConnectionId) -> bool {
        self.local_id.read().as_ref() == Some(id)
    }

    fn spawn(&self) -> RemoteAvatar<M> {
        RemoteAvatar::new((self.factory)())
    }

    /// Reconcile with a roster broadcast
    pub fn apply_join(&self, user_list: &[ConnectionId], own_id: &ConnectionId) {
        *self.local_id.write() = Some(own_id.clone());

        let roster: HashSet<&ConnectionId> = user_list.iter().collect();
        self.avatars.retain(|id, _| roster.contains(id));

        for id in user_list {
            if id == own_id || self.avatars.contains_key(id) {
                continue;
            }
            debug!(connection_id = %id, "Adding remote avatar");
            self.avatars.insert(id.clone(), self.spawn());
        }
    }

    /// Drop a participant that disconnected
    pub fn apply_leave(&self, id: &ConnectionId) -> bool {
        let removed = self.avatars.remove(id).is_some();
        if removed {
            debug!(connection_id = %id, "Removed remote avatar");
        }
        removed
    }

    /// Overwrite a participant's pose and current action
    pub fn apply_move(&self, update: &PeerMove) {
        if self.is_local(&update.uuid) {
            return;
        }
        self.avatars
            .entry(update.uuid.clone())
            .or_insert_with(|| self.spawn())
            .apply(update);
    }

    /// Advance every remote avatar's animation
    pub fn tick(&self, dt: f32) {
        for mut avatar in self.avatars.iter_mut() {
            avatar.animation.tick(dt);
        }
    }

    /// Run `f` against one avatar
    pub fn with_avatar<R>(&self, id: &ConnectionId, f: impl FnOnce(&RemoteAvatar<M>) -> R) -> Option<R> {
        self.avatars.get(id).map(|avatar| f(avatar.value()))
    }

    pub fn snapshot(&self, id: &ConnectionId) -> Option<PoseSnapshot> {
        self.with_avatar(id, RemoteAvatar::snapshot)
    }

    pub fn current_action(&self, id: &ConnectionId) -> Option<ActionName> {
        self.with_avatar(id, |avatar| avatar.animation.current())
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.avatars.contains_key(id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.avatars.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }
}

impl<M> SessionHandler for RemoteAvatars<M>
where
    M: AnimationMixer + Send + Sync + 'static,
    M::Clip: Send + Sync,
{
    fn on_join(&self, user_list: &[ConnectionId], own_id: &ConnectionId) {
        info!(users = user_list.len(), own_id = %own_id, "Roster update");
        self.apply_join(user_list, own_id);
    }

    fn on_leave(&self, disconnected: &ConnectionId) {
        info!(connection_id = %disconnected, "Participant left");
        self.apply_leave(disconnected);
    }

    fn on_move(&self, update: &PeerMove) {
        self.apply_move(update);
    }

    fn on_close(&self) {
        info!(remaining = self.len(), "Session closed");
    }
}

impl<M: AnimationMixer> std::fmt::Debug for RemoteAvatars<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAvatars")
            .field("local_id", &self.local_id())
            .field("avatars", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mixer::{headless_animation, WeightMixer};
    use pretty_assertions::assert_eq;

    fn registry() -> RemoteAvatars<WeightMixer> {
        RemoteAvatars::new(headless_animation)
    }

    fn ids(names: &[&str]) -> Vec<ConnectionId> {
        names.iter().map(|n| ConnectionId::from(*n)).collect()
    }

    fn sorted(mut ids: Vec<ConnectionId>) -> Vec<ConnectionId> {
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    fn moved(uuid: &str, action: ActionName) -> PeerMove {
        PeerMove::new(
            uuid.into(),
            PoseSnapshot {
                position: Position::new(1.0, 0.0, 2.0),
                rotation: Rotation::from_yaw(0.5),
                current_action_name: action,
                previous_action_name: ActionName::Idle,
            },
        )
    }

    #[test]
    fn test_join_alone_creates_nothing() {
        let avatars = registry();
        avatars.apply_join(&ids(&["me"]), &"me".into());
        assert!(avatars.is_empty());
        assert_eq!(avatars.local_id(), Some("me".into()));
    }

    #[test]
    fn test_join_adds_others_and_drops_missing() {
        let avatars = registry();
        avatars.apply_join(&ids(&["a", "me"]), &"me".into());
        assert_eq!(avatars.ids(), ids(&["a"]));

        avatars.apply_join(&ids(&["me", "b", "c"]), &"me".into());
        assert_eq!(sorted(avatars.ids()), ids(&["b", "c"]));
    }

    #[test]
    fn test_move_updates_pose_and_action() {
        let avatars = registry();
        avatars.apply_join(&ids(&["a", "me"]), &"me".into());
        avatars.apply_move(&moved("a", ActionName::WalkForward));

        let pose = avatars.snapshot(&"a".into()).unwrap();
        assert_eq!(pose.position, Position::new(1.0, 0.0, 2.0));
        assert_eq!(pose.rotation.yaw, 0.5);
        assert_eq!(pose.current_action_name, ActionName::WalkForward);
        // Previous only advances when the avatar ticks
        assert_eq!(pose.previous_action_name, ActionName::Idle);

        avatars.tick(0.016);
        let pose = avatars.snapshot(&"a".into()).unwrap();
        assert_eq!(pose.previous_action_name, ActionName::WalkForward);
    }

    #[test]
    fn test_move_from_unknown_participant_creates_avatar() {
        let avatars = registry();
        avatars.apply_join(&ids(&["me"]), &"me".into());
        avatars.apply_move(&moved("late", ActionName::RunLeft));
        assert_eq!(avatars.current_action(&"late".into()), Some(ActionName::RunLeft));
    }

    #[test]
    fn test_own_moves_ignored() {
        let avatars = registry();
        avatars.apply_join(&ids(&["me"]), &"me".into());
        avatars.apply_move(&moved("me", ActionName::WalkLeft));
        assert!(avatars.is_empty());
    }

    #[test]
    fn test_leave_removes() {
        let avatars = registry();
        avatars.apply_join(&ids(&["a", "b", "me"]), &"me".into());
        assert!(avatars.apply_leave(&"a".into()));
        assert!(!avatars.apply_leave(&"a".into()));
        assert!(!avatars.contains(&"a".into()));
        assert!(avatars.contains(&"b".into()));
    }

    #[test]
    fn test_last_write_wins() {
        let avatars = registry();
        avatars.apply_move(&moved("a", ActionName::WalkForward));
        avatars.apply_move(&moved("a", ActionName::RunForward));
        assert_eq!(avatars.current_action(&"a".into()), Some(ActionName::RunForward));
        assert!(avatars
            .with_avatar(&"a".into(), |avatar| avatar.last_update.is_some())
            .unwrap());
    }
}
