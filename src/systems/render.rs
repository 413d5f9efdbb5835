//! Recursive render and gizmo passes.
//!
//! The engine triggers `subrender` on the root with a [`Renderer`]. Each
//! entity's built-in [`subrender`] listener applies its composite operation,
//! multiplies alpha with the inherited alpha, applies scale/rotation around
//! its pivot, clips if asked, triggers its own `render`, then translates into
//! its local space (plus scroll offset) and recurses into its children.
//!
//! Save/restore is only issued when the entity actually changes the
//! transform or clip; composite and alpha are put back explicitly.
//!
//! With `clip` set, children entirely above or below the visible band
//! `[-offsetY, height - offsetY]` are skipped.

use smallvec::SmallVec;

use crate::components::entity::trunc;
use crate::events::{self, Event, Response};
use crate::resources::ids::EntityId;
use crate::resources::renderer::Renderer;
use crate::resources::world::{Context, World};

/// Built-in `subrender` listener.
pub(crate) fn subrender(ctx: &mut Context<'_>, ev: &mut Event<'_>) -> Response {
    let Event::Render(renderer) = ev else {
        return Response::Ignored;
    };
    render_entity(ctx.world, ctx.this, &mut **renderer);
    Response::Ignored
}

/// Render `id` and its subtree.
pub fn render_entity(world: &mut World, id: EntityId, r: &mut dyn Renderer) {
    let Some(entity) = world.get(id) else {
        return;
    };
    let t = entity.transform.clone();
    let center_x = trunc(t.center_x.unwrap_or(0.0));
    let center_y = trunc(t.center_y.unwrap_or(0.0));
    let x = trunc(entity.x) - center_x;
    let y = trunc(entity.y) - center_y;
    let offset_x = trunc(entity.offset_x.unwrap_or(0.0));
    let offset_y = trunc(entity.offset_y.unwrap_or(0.0));
    let clip = entity.clip;
    let height = entity.height.unwrap_or(0.0);
    let clip_rect = (
        trunc(entity.x),
        trunc(entity.y),
        trunc(entity.width.unwrap_or(0.0)),
        trunc(height),
    );
    let children: SmallVec<[EntityId; 8]> = entity.children.iter().copied().collect();

    let old_composite = t.composite_operation.as_deref().map(|op| {
        let old = r.composite_operation().to_string();
        r.set_composite_operation(op);
        old
    });

    let old_alpha = match t.alpha {
        Some(alpha) if alpha != 1.0 => {
            let old = r.global_alpha();
            r.set_global_alpha(alpha * old);
            Some(old)
        }
        _ => None,
    };

    let mut saved = false;
    let scaled = t.scale_x.is_some_and(|s| s != 1.0) || t.scale_y.is_some_and(|s| s != 1.0);
    if scaled || t.rotation.is_some() {
        saved = true;
        r.save();
        r.translate(x + center_x, y + center_y);
        if scaled {
            r.scale(t.scale_x.unwrap_or(1.0), t.scale_y.unwrap_or(1.0));
        }
        if let Some(angle) = t.rotation.filter(|a| *a != 0.0) {
            r.rotate(angle);
        }
        r.translate(-x - center_x, -y - center_y);
    }

    if clip {
        if !saved {
            saved = true;
            r.save();
        }
        let (cx, cy, cw, ch) = clip_rect;
        r.clip_rect(cx, cy, cw, ch);
    }

    world.trigger(id, events::RENDER, &mut Event::Render(&mut *r));

    if saved {
        r.translate(x, y);
    }

    if !children.is_empty() {
        if saved {
            let tx = offset_x + center_x;
            let ty = offset_y + center_y;
            if tx != 0.0 || ty != 0.0 {
                r.translate(tx, ty);
            }
        } else {
            let tx = x + offset_x + center_x;
            let ty = y + offset_y + center_y;
            if tx != 0.0 || ty != 0.0 {
                saved = true;
                r.save();
                r.translate(tx, ty);
            }
        }

        for child in children {
            if clip && let Some(c) = world.get(child) {
                let top = c.y;
                let bottom = top + trunc(c.height.unwrap_or(0.0));
                if bottom < -offset_y || top > height - offset_y {
                    continue;
                }
            }
            world.trigger(child, events::SUBRENDER, &mut Event::Render(&mut *r));
        }
    }

    if saved {
        r.restore();
    }
    if let Some(old) = old_composite {
        r.set_composite_operation(&old);
    }
    if let Some(old) = old_alpha {
        r.set_global_alpha(old);
    }
}

/// Built-in `gizmos` listener: carry the debug overlay into the children
/// with the entity's translation and rotation.
pub(crate) fn subgizmos(ctx: &mut Context<'_>, ev: &mut Event<'_>) -> Response {
    let Event::Render(renderer) = ev else {
        return Response::Ignored;
    };
    gizmos_entity(ctx.world, ctx.this, &mut **renderer);
    Response::Ignored
}

fn gizmos_entity(world: &mut World, id: EntityId, r: &mut dyn Renderer) {
    let Some(entity) = world.get(id) else {
        return;
    };
    if entity.children.is_empty() {
        return;
    }
    let x = trunc(entity.x);
    let y = trunc(entity.y);
    let rotation = entity.transform.rotation.filter(|a| *a != 0.0);
    let children: SmallVec<[EntityId; 8]> = entity.children.iter().copied().collect();

    let mut saved = false;
    if x != 0.0 || y != 0.0 {
        saved = true;
        r.save();
        r.translate(x, y);
    }
    if let Some(angle) = rotation {
        if !saved {
            saved = true;
            r.save();
        }
        r.rotate(angle);
    }
    for child in children {
        world.trigger(child, events::GIZMOS, &mut Event::Render(&mut *r));
    }
    if saved {
        r.restore();
    }
}
