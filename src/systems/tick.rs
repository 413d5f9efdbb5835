//! Recursive simulation step.
//!
//! The engine triggers `subtick` on the root once per simulation step. Each
//! entity's built-in [`subtick`] listener then:
//!
//! 1. snapshots its child list and marks itself as updating,
//! 2. triggers `subtick` on every active child,
//! 3. triggers its own `tick` (behaviour logic runs here),
//! 4. applies the child removals and additions queued during 2 and 3,
//! 5. re-sorts its children by truncated `z` if `sort_on_tick` is set.

use smallvec::SmallVec;

use crate::components::entity::trunc;
use crate::events::{self, Event, Response};
use crate::resources::ids::EntityId;
use crate::resources::world::{Context, World};

/// Built-in `subtick` listener.
pub(crate) fn subtick(ctx: &mut Context<'_>, ev: &mut Event<'_>) -> Response {
    let (Some(delta), Some(timestamp)) = (ev.delta(), ev.timestamp()) else {
        return Response::Ignored;
    };
    let this = ctx.this;
    let children: SmallVec<[EntityId; 8]> = match ctx.entity_mut() {
        Some(entity) => {
            entity.updating = true;
            entity.children.iter().copied().collect()
        }
        None => return Response::Ignored,
    };

    for child in children {
        if ctx.world.get(child).is_some_and(|c| c.active) {
            ctx.world
                .trigger(child, events::SUBTICK, &mut Event::tick(delta, timestamp));
        }
    }

    ctx.world
        .trigger(this, events::TICK, &mut Event::tick(delta, timestamp));

    drain_pending(ctx.world, this);
    Response::Ignored
}

/// Finish an entity's tick: clear `updating`, apply queued mutations, sort.
fn drain_pending(world: &mut World, id: EntityId) {
    let Some(entity) = world.get_mut(id) else {
        return;
    };
    entity.updating = false;
    let removes = std::mem::take(&mut entity.pending_removes);
    let adds = std::mem::take(&mut entity.pending_adds);
    let sort = entity.sort_on_tick;

    for (child, destroy) in removes {
        world.remove_child(id, child, destroy);
    }
    for (child, index) in adds {
        match index {
            Some(index) => world.insert_child(id, child, index),
            None => world.add_child(id, child),
        };
    }
    if sort {
        sort_children(world, id);
    }
}

/// Stable sort of `id`'s children by truncated `z`.
pub fn sort_children(world: &mut World, id: EntityId) {
    let Some(entity) = world.get(id) else {
        return;
    };
    let mut keyed: Vec<(f32, EntityId)> = entity
        .children
        .iter()
        .map(|c| {
            let z = world.get(*c).and_then(|e| e.z).unwrap_or(0.0);
            (trunc(z), *c)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    if let Some(entity) = world.get_mut(id) {
        entity.children = keyed.into_iter().map(|(_, c)| c).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use crate::components::entity::EntityBuilder;

    fn step(world: &mut World) {
        let root = world.root();
        world.trigger(root, events::SUBTICK, &mut Event::tick(0.017, 0.017));
    }

    #[test]
    fn test_children_tick_before_parent() {
        let mut world = World::new();
        let root = world.root();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (order.clone(), order.clone());
        let parent = world
            .spawn_child(
                root,
                EntityBuilder::new().on(events::TICK, move |_c, _e| l1.borrow_mut().push("parent")),
            )
            .unwrap();
        world
            .spawn_child(
                parent,
                EntityBuilder::new().on(events::TICK, move |_c, _e| l2.borrow_mut().push("child")),
            )
            .unwrap();
        step(&mut world);
        assert_eq!(*order.borrow(), vec!["child", "parent"]);
    }

    #[test]
    fn test_inactive_children_skip_tick() {
        let mut world = World::new();
        let root = world.root();
        let ticks = Rc::new(RefCell::new(0));
        let t = ticks.clone();
        let id = world
            .spawn_child(
                root,
                EntityBuilder::new()
                    .with("active", json!(false))
                    .on(events::TICK, move |_c, _e| *t.borrow_mut() += 1),
            )
            .unwrap();
        step(&mut world);
        assert_eq!(*ticks.borrow(), 0);
        world.get_mut(id).unwrap().active = true;
        step(&mut world);
        assert_eq!(*ticks.borrow(), 1);
    }

    #[test]
    fn test_tick_payload_reaches_behaviours() {
        let mut world = World::new();
        let root = world.root();
        let id = world
            .spawn_child(
                root,
                EntityBuilder::new().on(events::TICK, |ctx, ev| {
                    let delta = ev.delta().unwrap_or(0.0);
                    if let Some(e) = ctx.entity_mut() {
                        e.x += delta;
                    }
                }),
            )
            .unwrap();
        step(&mut world);
        assert!((world.get(id).unwrap().x - 0.017).abs() < 1e-6);
    }

    #[test]
    fn test_child_added_during_tick_waits_for_next_step() {
        let mut world = World::new();
        let root = world.root();
        let newcomer = world
            .spawn(EntityBuilder::new().on(events::TICK, |ctx, _ev| {
                ctx.set_property("ticked", json!(true));
            }))
            .unwrap();
        world
            .spawn_child(
                root,
                EntityBuilder::new().on(events::TICK, move |ctx, _ev| {
                    let root = ctx.world.root();
                    ctx.world.add_child(root, newcomer);
                }),
            )
            .unwrap();
        step(&mut world);
        assert_eq!(world.parent(newcomer), Some(root));
        assert!(!world.get(newcomer).unwrap().has_property("ticked"));
        step(&mut world);
        assert!(world.get(newcomer).unwrap().has_property("ticked"));
    }

    #[test]
    fn test_sort_on_tick_is_stable_over_truncated_z() {
        let mut world = World::new();
        let root = world.root();
        world.get_mut(root).unwrap().sort_on_tick = true;
        let a = world
            .spawn_child(root, EntityBuilder::new().with("z", json!(2.7)))
            .unwrap();
        let b = world
            .spawn_child(root, EntityBuilder::new().with("z", json!(1)))
            .unwrap();
        let c = world
            .spawn_child(root, EntityBuilder::new().with("z", json!(2.1)))
            .unwrap();
        let d = world.spawn_child(root, EntityBuilder::new()).unwrap();
        step(&mut world);
        assert_eq!(world.children(root), &[d, b, a, c]);
    }
}
