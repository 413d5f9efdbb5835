//! Tick-driven tweens and delays.
//!
//! [`World::ease`] computes a [`TweenPlan`] once and binds a `tick` listener
//! on the target that:
//! - accumulates `delta` into the elapsed time (in `f64`),
//! - applies the plan at `clamp(elapsed / duration, 0, 1)`,
//! - once `elapsed` reaches `duration`, applies the plan at 1, unbinds
//!   itself and runs the completion.
//!
//! The returned [`Listener`] is the cancellation handle: unbinding it (see
//! [`World::cancel_tween`]) stops the tween where it is and drops the
//! completion without running it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use log::debug;
use serde_json::{Map, Value};

use crate::components::tween::{Easing, TweenPlan};
use crate::events::bus::{Listener, listener};
use crate::events::{self, Event};
use crate::resources::ids::EntityId;
use crate::resources::world::{Context, World};

/// Runs once when a tween or delay finishes, as the target entity.
pub type Completion = Box<dyn FnOnce(&mut Context<'_>)>;

/// Wrap a closure as a [`Completion`].
pub fn completion<F>(f: F) -> Completion
where
    F: FnOnce(&mut Context<'_>) + 'static,
{
    Box::new(f)
}

/// Seconds short of `duration` that still count as finished; `f32` deltas
/// rarely add up to it exactly.
const FINISH_TOLERANCE: f64 = 1e-6;

type Slot = Rc<RefCell<Option<Weak<dyn Fn(&mut Context<'_>, &mut Event<'_>) -> events::Response>>>>;

impl World {
    /// Animate `targets` on `id` over `duration` seconds.
    ///
    /// Returns `None` when the entity does not exist.
    pub fn ease(
        &mut self,
        id: EntityId,
        targets: &Map<String, Value>,
        duration: f32,
        easing: Easing,
        done: Option<Completion>,
    ) -> Option<Listener> {
        let plan = TweenPlan::new(self.get(id)?, targets);
        debug!(
            "Tween on {} over {}s with {} action(s)",
            id,
            duration,
            plan.actions().len()
        );

        let duration = f64::from(duration);
        let elapsed = Cell::new(0.0_f64);
        let done = RefCell::new(done);
        let slot: Slot = Rc::new(RefCell::new(None));
        let own = slot.clone();

        let tick = listener(move |ctx: &mut Context<'_>, ev: &mut Event<'_>| {
            let Some(delta) = ev.delta() else {
                return;
            };
            elapsed.set(elapsed.get() + f64::from(delta));
            let finished = duration - elapsed.get() <= FINISH_TOLERANCE;
            let progress = if finished {
                1.0
            } else {
                (elapsed.get() / duration).clamp(0.0, 1.0) as f32
            };
            if let Some(entity) = ctx.entity_mut() {
                plan.apply(entity, progress, easing);
            }
            if !finished {
                return;
            }
            let me = own.borrow().as_ref().and_then(Weak::upgrade);
            if let Some(me) = me {
                let this = ctx.this;
                ctx.world.off(this, events::TICK, Some(&me), None);
            }
            let finished = done.borrow_mut().take();
            if let Some(finished) = finished {
                finished(ctx);
            }
        });
        *slot.borrow_mut() = Some(Rc::downgrade(&tick));

        self.on(id, events::TICK, tick.clone(), None);
        Some(tick)
    }

    /// Tween back to the properties the entity was built with.
    pub fn ease_to_defaults(
        &mut self,
        id: EntityId,
        duration: f32,
        easing: Easing,
        done: Option<Completion>,
    ) -> Option<Listener> {
        let defaults = self.get(id)?.saved_defaults.clone();
        self.ease(id, &defaults, duration, easing, done)
    }

    /// Run `after` once `duration` seconds of ticks have passed on `id`.
    pub fn delay(&mut self, id: EntityId, duration: f32, after: Completion) -> Option<Listener> {
        self.ease(id, &Map::new(), duration, Easing::Linear, Some(after))
    }

    /// Stop a tween or delay started with [`ease`](Self::ease).
    pub fn cancel_tween(&mut self, id: EntityId, tween: &Listener) -> bool {
        self.off(id, events::TICK, Some(tween), None)
    }
}
