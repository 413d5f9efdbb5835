//! Pairwise collision pass over every `collider` entity.
//!
//! Runs once per simulation step, after the root `subtick`:
//!
//! 1. clear `collided`/`collisions` on every collider,
//! 2. for each unordered pair accepted by both sides' `collidesWith`,
//!    compare bounding boxes with [`check_aabb_intersection`] in both
//!    directions and record the pair on both entities,
//! 3. fire `collision` on each entity once per recorded partner.
//!
//! State is rebuilt from scratch every step, so running the pass twice
//! without moving anything yields the same result.

use log::trace;
use serde_json::Value;

use crate::components::collider::{COLLIDER, COLLIDES_WITH};
use crate::components::entity::BoundingBox;
use crate::events::{self, Event};
use crate::resources::ids::EntityId;
use crate::resources::world::World;

/// Whether any corner of `a` lies inside `b` (edges inclusive).
///
/// This is a corner-containment test, not a full overlap test: two boxes
/// crossing like a plus sign overlap without either having a corner inside
/// the other, and callers test both directions.
pub fn check_aabb_intersection(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.corners().iter().any(|(x, y)| b.contains(*x, *y))
}

fn accepts(world: &mut World, id: EntityId, other: EntityId) -> bool {
    match world.call(id, COLLIDES_WITH, &[other.to_value()]) {
        None => true,
        Some(Value::Bool(b)) => b,
        Some(Value::Null) => false,
        Some(_) => true,
    }
}

/// Recompute collisions for the current configuration and fire events.
/// Returns the number of colliding pairs.
pub fn handle_collisions(world: &mut World) -> usize {
    let Ok(collider) = world.behaviour(COLLIDER) else {
        return 0;
    };
    let objects = collider.objects();

    for id in objects.iter() {
        if let Some(entity) = world.get_mut(*id) {
            entity.collision.clear();
        }
    }

    let mut pairs = 0;
    for (i, &a) in objects.iter().enumerate() {
        for &b in &objects[i + 1..] {
            if a == b {
                continue;
            }
            if !accepts(world, a, b) || !accepts(world, b, a) {
                continue;
            }
            let (Some(box_a), Some(box_b)) = (
                world.get(a).map(|e| e.bounding_box()),
                world.get(b).map(|e| e.bounding_box()),
            ) else {
                continue;
            };
            if world
                .get(a)
                .is_some_and(|e| e.collision.is_colliding_with(b))
            {
                continue;
            }
            if check_aabb_intersection(&box_a, &box_b) || check_aabb_intersection(&box_b, &box_a)
            {
                if let Some(entity) = world.get_mut(a) {
                    entity.collision.collisions.push(b);
                }
                if let Some(entity) = world.get_mut(b) {
                    entity.collision.collisions.push(a);
                }
                pairs += 1;
            }
        }
    }

    for &id in objects.iter() {
        let partners = match world.get_mut(id) {
            Some(entity) => {
                entity.collision.collided = !entity.collision.collisions.is_empty();
                entity.collision.collisions.clone()
            }
            None => continue,
        };
        for other in partners {
            trace!("{} collides with {}", id, other);
            world.trigger(id, events::COLLISION, &mut Event::Entity(other));
        }
    }
    pairs
}
