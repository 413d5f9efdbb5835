//! Per-entity listener bindings.
//!
//! An [`EventBus`] maps event names to a [`MultiCall`]: an ordered list of
//! `(listener, context, once)` bindings. The bus only stores bindings;
//! triggering happens through [`World::trigger`](crate::resources::world::World::trigger)
//! because listeners need mutable access to the whole world.
//!
//! Triggers iterate a [`snapshot`](EventBus::snapshot) of the bindings, so a
//! listener that binds or unbinds during a trigger only affects later
//! triggers.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{Event, Response};
use crate::resources::ids::EntityId;
use crate::resources::world::Context;

/// Shared, comparable listener handle.
///
/// Two handles are the same listener when they point at the same allocation,
/// which is what [`EventBus::off`] matches on.
pub type Listener = Rc<dyn Fn(&mut Context<'_>, &mut Event<'_>) -> Response>;

fn bind_listener<F>(f: F) -> F
where
    F: Fn(&mut Context<'_>, &mut Event<'_>) -> Response + 'static,
{
    f
}

/// Wrap a closure or fn as a [`Listener`].
///
/// The closure may return `()`, `bool`, or [`Response`].
pub fn listener<F, R>(f: F) -> Listener
where
    F: Fn(&mut Context<'_>, &mut Event<'_>) -> R + 'static,
    R: Into<Response>,
{
    Rc::new(bind_listener(move |ctx, ev| f(ctx, ev).into()))
}

/// Identity comparison for listener handles.
pub fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// One registered listener.
#[derive(Clone)]
pub struct Binding {
    /// Unique per bus; lets `once` bindings remove exactly themselves.
    pub(crate) key: u64,
    pub listener: Listener,
    /// Entity the listener runs as. `None` runs it as the triggering entity.
    pub context: Option<EntityId>,
    pub once: bool,
}

/// Ordered listeners invoked together for one event name.
#[derive(Clone, Default)]
pub struct MultiCall {
    bindings: SmallVec<[Binding; 2]>,
}

impl MultiCall {
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn push(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    /// Remove the most recent binding matching the given listener and/or
    /// context. With neither given, clears every binding.
    fn remove(&mut self, listener: Option<&Listener>, context: Option<EntityId>) -> bool {
        if listener.is_none() && context.is_none() {
            let had_any = !self.bindings.is_empty();
            self.bindings.clear();
            return had_any;
        }
        let found = self.bindings.iter().rposition(|b| {
            listener.is_none_or(|l| same_listener(l, &b.listener))
                && context.is_none_or(|c| b.context == Some(c))
        });
        match found {
            Some(index) => {
                self.bindings.remove(index);
                true
            }
            None => false,
        }
    }

    fn remove_key(&mut self, key: u64) -> bool {
        match self.bindings.iter().position(|b| b.key == key) {
            Some(index) => {
                self.bindings.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Named-event listener table. Created empty; the map is allocated on the
/// first binding.
#[derive(Default)]
pub struct EventBus {
    calls: Option<FxHashMap<String, MultiCall>>,
    next_key: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, event: &str, listener: Listener, context: Option<EntityId>, once: bool) {
        self.next_key += 1;
        let binding = Binding {
            key: self.next_key,
            listener,
            context,
            once,
        };
        self.calls
            .get_or_insert_with(FxHashMap::default)
            .entry(event.to_string())
            .or_default()
            .push(binding);
    }

    /// Append a listener for `event`.
    pub fn on(&mut self, event: &str, listener: Listener, context: Option<EntityId>) -> &mut Self {
        self.bind(event, listener, context, false);
        self
    }

    /// Append a listener that unbinds itself before its first call.
    pub fn once(&mut self, event: &str, listener: Listener, context: Option<EntityId>) -> &mut Self {
        self.bind(event, listener, context, true);
        self
    }

    /// Unbind listeners for `event`.
    ///
    /// With a listener and/or context, removes the most recent matching
    /// binding. With neither, removes every binding for the event. Removing
    /// something that is not bound is a no-op.
    pub fn off(
        &mut self,
        event: &str,
        listener: Option<&Listener>,
        context: Option<EntityId>,
    ) -> &mut Self {
        if let Some(call) = self.calls.as_mut().and_then(|calls| calls.get_mut(event)) {
            call.remove(listener, context);
        }
        self
    }

    /// Like [`off`](Self::off) but reports whether anything was removed.
    pub fn remove(
        &mut self,
        event: &str,
        listener: Option<&Listener>,
        context: Option<EntityId>,
    ) -> bool {
        self.calls
            .as_mut()
            .and_then(|calls| calls.get_mut(event))
            .is_some_and(|call| call.remove(listener, context))
    }

    pub(crate) fn remove_binding(&mut self, event: &str, key: u64) -> bool {
        self.calls
            .as_mut()
            .and_then(|calls| calls.get_mut(event))
            .is_some_and(|call| call.remove_key(key))
    }

    /// Copy of the current bindings for `event`, in call order.
    pub fn snapshot(&self, event: &str) -> SmallVec<[Binding; 4]> {
        self.calls
            .as_ref()
            .and_then(|calls| calls.get(event))
            .map(|call| call.bindings.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.calls
            .as_ref()
            .and_then(|calls| calls.get(event))
            .map_or(0, MultiCall::len)
    }

    pub fn is_bound(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Whether the binding table has been allocated yet.
    pub fn is_initialized(&self) -> bool {
        self.calls.is_some()
    }
}
