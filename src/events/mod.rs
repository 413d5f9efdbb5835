//! Event payloads, names, and the per-entity multicast bus.
//!
//! Every entity owns an [`EventBus`](bus::EventBus) keyed by event name.
//! Triggering an event calls each bound listener in registration order with
//! a mutable [`Event`] payload and combines their [`Response`]s with a logical
//! OR; input dispatch uses that to stop propagation at the first consumer.
//!
//! Submodules:
//! - [`bus`] – listener bindings, `on`/`once`/`off`, and the ordered multicall
//!
//! The constants below are the event names the runtime itself triggers.
//! Behaviours are free to trigger any other name.

pub mod bus;

use std::ops::{BitOr, BitOrAssign};

use serde_json::Value;

use crate::resources::ids::EntityId;
use crate::resources::renderer::Renderer;
use crate::resources::world::World;

/// Recursive tick propagation, bound by the runtime on every entity.
pub const SUBTICK: &str = "subtick";
/// Per-entity simulation step, after its active children ticked.
pub const TICK: &str = "tick";
/// Recursive render propagation, bound by the runtime on every entity.
pub const SUBRENDER: &str = "subrender";
/// Per-entity drawing, inside the entity's local transform.
pub const RENDER: &str = "render";
/// Debug overlay pass, only triggered while the engine is debugging.
pub const GIZMOS: &str = "gizmos";
pub const TOUCHSTART: &str = "touchstart";
pub const TOUCHMOVE: &str = "touchmove";
pub const TOUCHEND: &str = "touchend";
/// Fired once when an entity becomes reachable from the engine root.
pub const ATTACH: &str = "attach";
pub const CHILD_ADDED: &str = "childAdded";
pub const CHILD_REMOVED: &str = "childRemoved";
pub const COLLISION: &str = "collision";
pub const LOADED: &str = "loaded";
pub const TEXT_CHANGED: &str = "textchanged";
/// Scene transitions. The payload carries the continuation.
pub const LEAVING: &str = "leaving";
pub const ENTERING: &str = "entering";
pub const LEAVE: &str = "leave";
pub const ENTER: &str = "enter";
/// Fired by a modal when it is done; see [`World::add_modal`].
pub const COMPLETED: &str = "completed";

/// Aggregated listener result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Response {
    /// The listener did not handle the event.
    #[default]
    Ignored,
    /// The listener handled the event; input dispatch stops here.
    Consumed,
}

impl Response {
    pub fn is_consumed(self) -> bool {
        self == Response::Consumed
    }
}

impl From<()> for Response {
    fn from(_: ()) -> Self {
        Response::Ignored
    }
}

impl From<bool> for Response {
    fn from(consumed: bool) -> Self {
        if consumed {
            Response::Consumed
        } else {
            Response::Ignored
        }
    }
}

impl BitOr for Response {
    type Output = Response;

    fn bitor(self, rhs: Response) -> Response {
        (self.is_consumed() || rhs.is_consumed()).into()
    }
}

impl BitOrAssign for Response {
    fn bitor_assign(&mut self, rhs: Response) {
        *self = *self | rhs;
    }
}

/// Pointer position in the receiving entity's local space.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TouchEvent {
    pub x: f32,
    pub y: f32,
    /// Set once some entity consumed the touch; siblings beneath it are skipped.
    pub cancelled: bool,
}

impl TouchEvent {
    pub fn new(x: f32, y: f32) -> Self {
        TouchEvent {
            x,
            y,
            cancelled: false,
        }
    }
}

/// Work to run once a scene transition finishes.
pub type Continuation = Box<dyn FnOnce(&mut World)>;

/// Payload handed to every listener of a trigger.
pub enum Event<'e> {
    /// No payload.
    Signal,
    /// One simulation step. `delta` is in seconds, `timestamp` is the
    /// simulated time in seconds after this step.
    Tick { delta: f32, timestamp: f64 },
    /// Drawing target for `render`/`subrender`/`gizmos`.
    Render(&'e mut dyn Renderer),
    Touch(TouchEvent),
    /// Another entity: the child for `childAdded`/`childRemoved`, the other
    /// party for `collision`.
    Entity(EntityId),
    Value(Value),
    /// Scene transition. A listener may `take()` the continuation and run it
    /// when its transition is done; otherwise the trigger site runs it.
    Transition(Option<Continuation>),
}

impl<'e> Event<'e> {
    pub fn tick(delta: f32, timestamp: f64) -> Self {
        Event::Tick { delta, timestamp }
    }

    /// Step length in seconds, for `Tick` payloads.
    pub fn delta(&self) -> Option<f32> {
        match self {
            Event::Tick { delta, .. } => Some(*delta),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Event::Tick { timestamp, .. } => Some(*timestamp),
            _ => None,
        }
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Event::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn touch(&self) -> Option<&TouchEvent> {
        match self {
            Event::Touch(touch) => Some(touch),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Event::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn renderer(&mut self) -> Option<&mut dyn Renderer> {
        match self {
            Event::Render(renderer) => {
                let renderer: &mut dyn Renderer = &mut **renderer;
                Some(renderer)
            }
            _ => None,
        }
    }

    /// Take the pending continuation of a `Transition` payload.
    pub fn take_continuation(&mut self) -> Option<Continuation> {
        match self {
            Event::Transition(done) => done.take(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Event<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Signal => f.write_str("Signal"),
            Event::Tick { delta, timestamp } => f
                .debug_struct("Tick")
                .field("delta", delta)
                .field("timestamp", timestamp)
                .finish(),
            Event::Render(_) => f.write_str("Render(..)"),
            Event::Touch(touch) => f.debug_tuple("Touch").field(touch).finish(),
            Event::Entity(id) => f.debug_tuple("Entity").field(id).finish(),
            Event::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Event::Transition(done) => write!(f, "Transition(pending: {})", done.is_some()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_or() {
        use Response::*;
        assert_eq!(Ignored | Ignored, Ignored);
        assert_eq!(Ignored | Consumed, Consumed);
        assert_eq!(Consumed | Ignored, Consumed);
        let mut acc = Ignored;
        acc |= Consumed;
        acc |= Ignored;
        assert!(acc.is_consumed());
    }

    #[test]
    fn test_response_from_listener_returns() {
        assert_eq!(Response::from(()), Response::Ignored);
        assert_eq!(Response::from(true), Response::Consumed);
        assert_eq!(Response::from(false), Response::Ignored);
    }

    #[test]
    fn test_event_accessors() {
        let tick = Event::tick(0.017, 1.5);
        assert_eq!(tick.delta(), Some(0.017));
        assert_eq!(tick.timestamp(), Some(1.5));
        assert_eq!(tick.entity(), None);

        let id = EntityId::from_raw(3);
        assert_eq!(Event::Entity(id).entity(), Some(id));
        assert!(Event::Signal.touch().is_none());
    }

    #[test]
    fn test_take_continuation_once() {
        let mut ev = Event::Transition(Some(Box::new(|_world: &mut World| {})));
        assert!(ev.take_continuation().is_some());
        assert!(ev.take_continuation().is_none());
    }
}
