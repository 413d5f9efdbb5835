//! The `collider` behaviour.
//!
//! Marks an entity for the collision pass in [`crate::systems::collision`].
//! The per-frame result lives in [`Entity::collision`](super::entity::Entity::collision).
//!
//! Entities can narrow what they collide with by owning a `collidesWith`
//! method (installed before the behaviour, so it wins). It receives the
//! other entity's id and returns a boolean; both sides must accept.

use serde_json::Value;

use crate::components::behaviour::{Behaviour, BehaviourDefinition};
use crate::events;

pub const COLLIDER: &str = "collider";
pub const COLLIDES_WITH: &str = "collidesWith";

/// Build the `collider` behaviour.
pub fn behaviour() -> Behaviour {
    Behaviour::new(
        COLLIDER,
        BehaviourDefinition::new()
            .method(COLLIDES_WITH, |_ctx, _args| Value::Bool(true))
            .on(events::GIZMOS, |ctx, ev| {
                let Some(entity) = ctx.entity() else {
                    return;
                };
                let bb = entity.bounding_box();
                let (style, width) = if entity.collision.collided {
                    ("#ff0000", 4.0)
                } else {
                    ("#00ff00", 2.0)
                };
                if let Some(r) = ev.renderer() {
                    r.set_stroke_style(style, width);
                    r.stroke_rect(bb.x, bb.y, bb.width, bb.height);
                }
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::entity::EntityBuilder;
    use crate::events::Event;
    use crate::resources::renderer::{DrawCommand, Recorder};
    use crate::resources::world::World;
    use crate::systems::collision::handle_collisions;

    #[test]
    fn test_gizmo_style_follows_collided_flag() {
        let mut world = World::new();
        let root = world.root();
        let a = world
            .spawn_child(root, EntityBuilder::new().behaviour(COLLIDER).size(4.0, 4.0))
            .unwrap();
        world
            .spawn_child(
                root,
                EntityBuilder::new()
                    .behaviour(COLLIDER)
                    .at(50.0, 0.0)
                    .size(4.0, 4.0),
            )
            .unwrap();
        handle_collisions(&mut world);

        let mut rec = Recorder::new();
        world.trigger(a, events::GIZMOS, &mut Event::Render(&mut rec));
        assert_eq!(
            rec.commands()[0],
            DrawCommand::StrokeStyle {
                style: "#00ff00".into(),
                line_width: 2.0
            }
        );

        world.get_mut(a).unwrap().x = 49.0;
        handle_collisions(&mut world);
        rec.clear();
        world.trigger(a, events::GIZMOS, &mut Event::Render(&mut rec));
        assert_eq!(
            rec.commands()[0],
            DrawCommand::StrokeStyle {
                style: "#ff0000".into(),
                line_width: 4.0
            }
        );
    }

    #[test]
    fn test_default_accepts_everything() {
        let mut world = World::new();
        let id = world
            .spawn(EntityBuilder::new().behaviour(COLLIDER))
            .unwrap();
        assert_eq!(
            world.call(id, COLLIDES_WITH, &[Value::Null]),
            Some(Value::Bool(true))
        );
    }
}
