//! The `mass` behaviour: gravity and velocity integration.
//!
//! Attaching resets the velocity to zero (and a non-finite position to the
//! origin). Each tick: `dy += gravity * delta`, then `x += dx * delta` and
//! `y += dy * delta`. `applyForce(x, y)` adds an impulse to the velocity.
//!
//! The gizmo is a blue dot at the position plus the velocity vector scaled
//! down by ten.

use serde_json::Value;

use crate::components::behaviour::{Behaviour, BehaviourDefinition};
use crate::events;

pub const MASS: &str = "mass";
pub const APPLY_FORCE: &str = "applyForce";

const GIZMO_COLOUR: &str = "#0000ff";

fn arg(args: &[Value], index: usize) -> f32 {
    args.get(index).and_then(Value::as_f64).unwrap_or(0.0) as f32
}

/// Build the `mass` behaviour.
pub fn behaviour() -> Behaviour {
    Behaviour::new(
        MASS,
        BehaviourDefinition::new()
            .init(|ctx| {
                if let Some(e) = ctx.entity_mut() {
                    if !e.x.is_finite() {
                        e.x = 0.0;
                    }
                    if !e.y.is_finite() {
                        e.y = 0.0;
                    }
                    e.dx = 0.0;
                    e.dy = 0.0;
                }
            })
            .on(events::TICK, |ctx, ev| {
                let Some(delta) = ev.delta() else {
                    return;
                };
                let gravity = ctx.world.gravity;
                if let Some(e) = ctx.entity_mut() {
                    e.dy += gravity * delta;
                    e.x += e.dx * delta;
                    e.y += e.dy * delta;
                }
            })
            .on(events::GIZMOS, |ctx, ev| {
                let Some((x, y, dx, dy)) = ctx.entity().map(|e| (e.x, e.y, e.dx, e.dy)) else {
                    return;
                };
                if let Some(r) = ev.renderer() {
                    r.set_fill_style(GIZMO_COLOUR);
                    r.set_stroke_style(GIZMO_COLOUR, 2.0);
                    r.fill_circle(x, y, 4.0);
                    r.stroke_line(x, y, x + dx / 10.0, y + dy / 10.0);
                }
            })
            .method(APPLY_FORCE, |ctx, args| {
                let (fx, fy) = (arg(args, 0), arg(args, 1));
                if let Some(e) = ctx.entity_mut() {
                    e.dx += fx;
                    e.dy += fy;
                }
                Value::Null
            }),
    )
}
