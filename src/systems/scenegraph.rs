//! Parent/child operations on the [`World`].
//!
//! An entity is in at most one parent's child list. Adding a child that
//! already has a parent detaches it from there first. While a parent is
//! ticking (`updating`), adds and removes on it are queued and applied by
//! [`subtick`](super::tick::subtick) once its child loop is done, so the
//! list being iterated never changes under the iteration.
//!
//! Adding a child to an attached parent attaches the child's whole subtree,
//! firing `attach` exactly once per entity.

use log::{debug, warn};
use smallvec::SmallVec;

use crate::components::entity::EntityBuilder;
use crate::error::{EngineError, Result};
use crate::events::bus::listener;
use crate::events::{self, Event};
use crate::resources::ids::EntityId;
use crate::resources::world::{Context, World};

/// Mark `id` attached and fire its `attach` event, once.
pub(crate) fn attach(world: &mut World, id: EntityId) {
    let Some(entity) = world.get_mut(id) else {
        return;
    };
    if entity.attached {
        return;
    }
    entity.attached = true;
    world.emit(id, events::ATTACH);
}

/// Built-in `attach` listener: attach every child not attached yet.
pub(crate) fn attach_children(ctx: &mut Context<'_>, _ev: &mut Event<'_>) {
    for child in ctx.children() {
        attach(ctx.world, child);
    }
}

impl World {
    /// Children of `id`, in draw order.
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.get(id).map(|e| e.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.get(id)?.parent()
    }

    pub fn index_of_child(&self, parent: EntityId, child: EntityId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Whether `ancestor` is `id` or one of its parents.
    pub fn is_ancestor(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Append `child` to `parent`'s children.
    ///
    /// Returns `false` if either entity is missing or the link would create
    /// a loop. Queued if `parent` is ticking.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        self.link_or_queue(parent, child, None)
    }

    /// Insert `child` at `index` (clamped) among `parent`'s children.
    pub fn insert_child(&mut self, parent: EntityId, child: EntityId, index: usize) -> bool {
        self.link_or_queue(parent, child, Some(index))
    }

    fn link_or_queue(&mut self, parent: EntityId, child: EntityId, index: Option<usize>) -> bool {
        if !self.contains(child) || self.is_ancestor(child, parent) {
            warn!("Cannot add {} under {}", child, parent);
            return false;
        }
        let Some(p) = self.get_mut(parent) else {
            return false;
        };
        if p.updating {
            p.pending_adds.push((child, index));
            return true;
        }
        self.link(parent, child, index);
        true
    }

    pub(crate) fn link(&mut self, parent: EntityId, child: EntityId, index: Option<usize>) {
        if let Some(old) = self.parent(child) {
            self.unlink(old, child);
            self.trigger(old, events::CHILD_REMOVED, &mut Event::Entity(child));
        }
        let Some(p) = self.get_mut(parent) else {
            return;
        };
        let index = index.map_or(p.children.len(), |i| i.min(p.children.len()));
        p.children.insert(index, child);
        let parent_attached = p.attached;
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        if parent_attached {
            attach(self, child);
        }
        self.trigger(parent, events::CHILD_ADDED, &mut Event::Entity(child));
    }

    fn unlink(&mut self, parent: EntityId, child: EntityId) {
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
    }

    /// Detach `child` from `parent`, destroying it (and its subtree) when
    /// `destroy` is set. Queued if `parent` is ticking.
    ///
    /// Returns `false` if `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId, destroy: bool) -> bool {
        let Some(p) = self.get_mut(parent) else {
            return false;
        };
        if p.updating {
            if !p.pending_removes.iter().any(|(c, _)| *c == child) {
                p.pending_removes.push((child, destroy));
            }
            return true;
        }
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.unlink(parent, child);
        if destroy {
            self.destroy_subtree(child);
        }
        self.trigger(parent, events::CHILD_REMOVED, &mut Event::Entity(child));
        if destroy {
            self.despawn(child);
        }
        true
    }

    /// Destroy an entity: detach from its parent, destroy its children,
    /// detach its behaviours and drop it from the arena.
    ///
    /// The root cannot be removed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if id == self.root() || !self.contains(id) {
            return false;
        }
        match self.parent(id) {
            Some(parent) => self.remove_child(parent, id, true),
            None => {
                self.destroy_subtree(id);
                self.despawn(id);
                true
            }
        }
    }

    /// Tear down everything below `id` and detach its behaviours. The caller
    /// despawns `id` itself.
    fn destroy_subtree(&mut self, id: EntityId) {
        let children = match self.get_mut(id) {
            Some(entity) => {
                entity.pending_adds.clear();
                entity.pending_removes.clear();
                std::mem::take(&mut entity.children)
            }
            None => return,
        };
        for child in children {
            if let Some(c) = self.get_mut(child) {
                c.parent = None;
            }
            self.destroy_subtree(child);
            self.trigger(id, events::CHILD_REMOVED, &mut Event::Entity(child));
            self.despawn(child);
        }
        self.remove_all_behaviours(id);
        if let Some(entity) = self.get_mut(id) {
            entity.attached = false;
        }
        debug!("Destroyed {}", id);
    }

    /// Remove every child of `id`, destroying them when `destroy` is set.
    pub fn remove_all_children(&mut self, id: EntityId, destroy: bool) {
        let children: SmallVec<[EntityId; 8]> = self.children(id).iter().copied().collect();
        for child in children {
            self.remove_child(id, child, destroy);
        }
    }

    /// Move `child` to the end of its parent's list, drawing it on top.
    pub fn bring_to_front(&mut self, child: EntityId) -> bool {
        let Some(parent) = self.parent(child) else {
            return false;
        };
        self.remove_child(parent, child, false) && self.add_child(parent, child)
    }

    /// Show `modal` above `owner`: the owner is disabled until the modal
    /// triggers `completed`, then the modal is destroyed.
    pub fn add_modal(&mut self, owner: EntityId, modal: EntityId) -> bool {
        let Some(parent) = self.parent(owner) else {
            return false;
        };
        if !self.add_child(parent, modal) {
            return false;
        }
        if let Some(o) = self.get_mut(owner) {
            o.disabled = true;
        }
        self.once(
            modal,
            events::COMPLETED,
            listener(move |ctx, _ev| {
                if let Some(o) = ctx.world.get_mut(owner) {
                    o.disabled = false;
                }
                let modal = ctx.this;
                ctx.world.remove(modal);
            }),
            None,
        );
        true
    }

    /// Spawn an entity straight under `parent`.
    pub fn spawn_child(&mut self, parent: EntityId, builder: EntityBuilder) -> Result<EntityId> {
        if !self.contains(parent) {
            return Err(EngineError::EntityNotFound(parent));
        }
        let id = self.spawn(builder)?;
        self.add_child(parent, id);
        Ok(id)
    }
}
