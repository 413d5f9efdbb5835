//! The `scene` behaviour for scene roots.
//!
//! On `leaving` it fires `leave` and continues the switch right away; on
//! `entering` it fires `enter`. A scene that wants a transition can bind its
//! own `leaving` listener before this behaviour and keep the continuation
//! until the transition is done.

use serde_json::Value;

use crate::components::behaviour::{Behaviour, BehaviourDefinition};
use crate::events;

pub const SCENE: &str = "scene";
pub const REMOVE_FROM_STACK: &str = "removeFromStack";

/// Build the `scene` behaviour.
pub fn behaviour() -> Behaviour {
    Behaviour::new(
        SCENE,
        BehaviourDefinition::new()
            .on(events::LEAVING, |ctx, ev| {
                let done = ev.take_continuation();
                ctx.emit(events::LEAVE);
                if let Some(done) = done {
                    done(ctx.world);
                }
            })
            .on(events::ENTERING, |ctx, ev| {
                let done = ev.take_continuation();
                ctx.emit(events::ENTER);
                if let Some(done) = done {
                    done(ctx.world);
                }
            })
            .method(REMOVE_FROM_STACK, |ctx, _args| {
                let this = ctx.this;
                Value::Bool(ctx.world.remove_scene(this))
            }),
    )
}
