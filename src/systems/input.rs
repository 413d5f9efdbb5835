//! Pointer input dispatch through the scene graph.
//!
//! The engine triggers `touchstart`/`touchmove`/`touchend` on the root with
//! view coordinates. Each entity's built-in listener converts them into its
//! children's space (subtract position, divide by scale, subtract scroll
//! offset) and offers the touch to its children from the topmost (last) one
//! down. The first child that consumes the touch, or marks it cancelled,
//! stops the search; the entity's own touch listeners then still run but see
//! `cancelled` set.
//!
//! A disabled entity does not forward touches to its children.

use smallvec::SmallVec;

use crate::components::entity::trunc;
use crate::events::{Event, Response, TouchEvent};
use crate::resources::ids::EntityId;
use crate::resources::world::Context;

/// Pointer state sampled between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub x: f32,
    pub y: f32,
    pub is_down: bool,
    /// Down state as of the last input phase.
    pub was_down: bool,
}

/// Built-in touch listener, shared by the three touch events.
pub(crate) fn propagate_touch(ctx: &mut Context<'_>, ev: &mut Event<'_>, name: &str) -> Response {
    let Event::Touch(touch) = ev else {
        return Response::Ignored;
    };
    let Some(entity) = ctx.entity() else {
        return Response::Ignored;
    };
    if entity.disabled {
        return Response::Ignored;
    }

    let scale_x = entity.transform.scale_x.filter(|s| *s != 0.0).unwrap_or(1.0);
    let scale_y = entity.transform.scale_y.filter(|s| *s != 0.0).unwrap_or(1.0);
    let x = (touch.x - trunc(entity.x)) / scale_x - trunc(entity.offset_x.unwrap_or(0.0));
    let y = (touch.y - trunc(entity.y)) / scale_y - trunc(entity.offset_y.unwrap_or(0.0));
    let children: SmallVec<[EntityId; 8]> = entity.children.iter().rev().copied().collect();

    for child in children {
        let mut child_event = Event::Touch(TouchEvent {
            x,
            y,
            cancelled: touch.cancelled,
        });
        let consumed = ctx.world.trigger(child, name, &mut child_event).is_consumed();
        let cancelled = matches!(child_event, Event::Touch(t) if t.cancelled);
        if consumed || cancelled {
            touch.cancelled = true;
            return Response::Consumed;
        }
    }
    Response::Ignored
}
