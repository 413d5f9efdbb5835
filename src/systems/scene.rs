//! Scene switching on the [`World`].
//!
//! Scenes are ordinary entities under the root. [`World::change_scene`]
//! triggers `leaving` on the current scene with a continuation; once that
//! continuation runs, the old scene is detached and pushed onto the history
//! (or destroyed when `cancel_push` is set), the new scene is inserted at the
//! old scene's index under the root so overlays above it stay above, and the
//! new scene gets `entering`.

use log::info;

use crate::events::{self, Event};
use crate::resources::ids::EntityId;
use crate::resources::world::World;

impl World {
    pub fn active_scene(&self) -> Option<EntityId> {
        self.scenes.active
    }

    /// Scenes that [`back_scene`](Self::back_scene) can return to, oldest first.
    pub fn scene_history(&self) -> &[EntityId] {
        &self.scenes.history
    }

    /// Replace the active scene with `next`.
    pub fn change_scene(&mut self, next: EntityId, cancel_push: bool) {
        let Some(old) = self.scenes.active else {
            start_scene(self, None, next, cancel_push);
            return;
        };
        let mut payload = Event::Transition(Some(Box::new(move |world: &mut World| {
            start_scene(world, Some(old), next, cancel_push)
        })));
        self.trigger(old, events::LEAVING, &mut payload);
        if let Some(done) = payload.take_continuation() {
            done(self);
        }
    }

    /// Return to the most recently pushed scene, destroying the current one.
    pub fn back_scene(&mut self) -> bool {
        match self.scenes.history.pop() {
            Some(previous) => {
                self.change_scene(previous, true);
                true
            }
            None => false,
        }
    }

    /// Forget `scene` in the history.
    pub fn remove_scene(&mut self, scene: EntityId) -> bool {
        match self.scenes.history.iter().position(|s| *s == scene) {
            Some(index) => {
                self.scenes.history.remove(index);
                true
            }
            None => false,
        }
    }
}

fn start_scene(world: &mut World, old: Option<EntityId>, next: EntityId, cancel_push: bool) {
    let root = world.root();
    let mut index = 0;
    if let Some(old) = old {
        let push = !cancel_push;
        index = world.index_of_child(root, old).unwrap_or(0);
        match world.parent(old) {
            Some(parent) => {
                world.remove_child(parent, old, !push);
            }
            None if !push => {
                world.remove(old);
            }
            None => {}
        }
        if push {
            world.scenes.history.push(old);
        }
    }
    world.insert_child(root, next, index);
    world.scenes.active = Some(next);
    info!("Scene changed to {}", next);
    world.trigger(next, events::ENTERING, &mut Event::Transition(None));
}
