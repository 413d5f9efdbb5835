//! Behaviours: named, reusable bundles of methods, listeners and defaults.
//!
//! A [`Behaviour`] is registered once per world and then applied to any
//! number of entities at the same time. Applying one:
//!
//! 1. records the entity in the behaviour's object set,
//! 2. installs its methods into the entity's capability table unless the
//!    entity already has a method of that name (first attached wins),
//! 3. binds its listeners to the entity's event bus, at most once per
//!    behaviour and event,
//! 4. sets its defaults only for properties the entity does not have yet,
//! 5. runs its `init` method when asked to.
//!
//! Required behaviours are resolved by the
//! [`BehaviourRegistry`](crate::resources::registry::BehaviourRegistry) and
//! applied before the behaviour that needs them. Removal mirrors each step
//! and only touches what this behaviour installed.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;
use serde_json::Value;

use crate::events::bus::{Listener, listener};
use crate::events::{Event, Response};
use crate::resources::ids::EntityId;
use crate::resources::world::{Context, World};

/// Method callable through an entity's capability table.
pub type Method = Rc<dyn Fn(&mut Context<'_>, &[Value]) -> Value>;

/// Name of the method run once when a behaviour is attached.
pub const INIT: &str = "init";
/// Name of the method run when a behaviour is removed.
pub const DESTROY: &str = "destroy";

fn bind_method<F>(f: F) -> F
where
    F: Fn(&mut Context<'_>, &[Value]) -> Value + 'static,
{
    f
}

/// Wrap a closure or fn as a [`Method`].
pub fn method<F>(f: F) -> Method
where
    F: Fn(&mut Context<'_>, &[Value]) -> Value + 'static,
{
    Rc::new(bind_method(f))
}

/// Identity comparison for method handles.
pub fn same_method(a: &Method, b: &Method) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// A value in a behaviour definition.
#[derive(Clone)]
pub enum Slot {
    Method(Method),
    Listener(Listener),
}

/// Definition object a behaviour is built from.
///
/// Keys follow the `on<Event>` convention: a listener stored under `ontick`
/// listens to `tick`. Everything else is a method.
#[derive(Clone, Default)]
pub struct BehaviourDefinition {
    entries: Vec<(String, Slot)>,
    defaults: Vec<(String, Value)>,
    requires: Vec<String>,
}

impl BehaviourDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw definition entry.
    pub fn define(mut self, key: impl Into<String>, slot: Slot) -> Self {
        self.entries.push((key.into(), slot));
        self
    }

    /// Listen to `event`. Stored under the `on<event>` key.
    pub fn on<F, R>(self, event: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &mut Event<'_>) -> R + 'static,
        R: Into<Response>,
    {
        self.define(format!("on{event}"), Slot::Listener(listener(f)))
    }

    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context<'_>, &[Value]) -> Value + 'static,
    {
        self.define(name, Slot::Method(method(f)))
    }

    /// Hook run once at attach time.
    pub fn init<F>(self, f: F) -> Self
    where
        F: Fn(&mut Context<'_>) + 'static,
    {
        self.method(INIT, move |ctx, _args| {
            f(ctx);
            Value::Null
        })
    }

    /// Hook run when the behaviour is removed.
    pub fn destroy<F>(self, f: F) -> Self
    where
        F: Fn(&mut Context<'_>) + 'static,
    {
        self.method(DESTROY, move |ctx, _args| {
            f(ctx);
            Value::Null
        })
    }

    pub fn default_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.defaults.push((key.into(), value));
        self
    }

    pub fn requires(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }
}

/// Entities currently carrying a behaviour, with a cached slice that is only
/// rebuilt after the set changed.
struct ObjectSet {
    members: BTreeSet<EntityId>,
    cache: Rc<[EntityId]>,
    dirty: bool,
}

impl Default for ObjectSet {
    fn default() -> Self {
        ObjectSet {
            members: BTreeSet::new(),
            cache: Rc::from(Vec::new()),
            dirty: false,
        }
    }
}

/// A registered component type.
pub struct Behaviour {
    name: String,
    methods: Vec<(String, Method)>,
    listeners: Vec<(String, Listener)>,
    defaults: Vec<(String, Value)>,
    requires: Vec<String>,
    objects: RefCell<ObjectSet>,
}

impl Behaviour {
    /// Split a definition into methods and listeners.
    pub fn new(name: impl Into<String>, definition: BehaviourDefinition) -> Self {
        let mut methods = Vec::new();
        let mut listeners = Vec::new();
        for (key, slot) in definition.entries {
            match slot {
                Slot::Listener(l) => {
                    let event = match key.strip_prefix("on") {
                        Some(event) if !event.is_empty() => event.to_string(),
                        _ => key,
                    };
                    listeners.push((event, l));
                }
                Slot::Method(m) => methods.push((key, m)),
            }
        }
        Behaviour {
            name: name.into(),
            methods,
            listeners,
            defaults: definition.defaults,
            requires: definition.requires,
            objects: RefCell::new(ObjectSet::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    pub fn defaults(&self) -> &[(String, Value)] {
        &self.defaults
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|(n, _)| n.as_str())
    }

    /// Events this behaviour listens to.
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.listeners.iter().map(|(e, _)| e.as_str())
    }

    /// Entities currently carrying this behaviour, in creation order.
    pub fn objects(&self) -> Rc<[EntityId]> {
        let mut set = self.objects.borrow_mut();
        if set.dirty {
            set.cache = set.members.iter().copied().collect();
            set.dirty = false;
        }
        set.cache.clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.borrow().members.len()
    }

    pub fn is_applied_to(&self, id: EntityId) -> bool {
        self.objects.borrow().members.contains(&id)
    }

    fn binding_key(&self, event: &str) -> String {
        format!("{}.{}", self.name, event)
    }

    /// Attach to `target`. Requirements must already be attached.
    pub(crate) fn apply(&self, world: &mut World, target: EntityId, run_init: bool) {
        let Some(entity) = world.get_mut(target) else {
            return;
        };
        {
            let mut set = self.objects.borrow_mut();
            if set.members.insert(target) {
                set.dirty = true;
            }
        }

        for (name, m) in &self.methods {
            entity.install_method(name, Some(&self.name), m.clone());
        }

        for (event, l) in &self.listeners {
            if entity.bound_listeners.insert(self.binding_key(event)) {
                entity.events.on(event, l.clone(), Some(target));
            }
        }

        let mut applied = Vec::new();
        for (key, value) in &self.defaults {
            if !entity.has_property(key) && entity.set_property(key, value.clone()) {
                applied.push(key.clone());
            }
        }
        if !applied.is_empty() {
            entity
                .applied_defaults
                .entry(self.name.clone())
                .or_default()
                .extend(applied);
        }

        debug!("Behaviour '{}' attached to {}", self.name, target);

        if run_init && let Some(init) = self.method(INIT).cloned() {
            let mut ctx = Context::new(world, target);
            init(&mut ctx, &[]);
        }
    }

    /// Detach from `target`, undoing only what this behaviour installed.
    pub(crate) fn remove(&self, world: &mut World, target: EntityId) {
        {
            let mut set = self.objects.borrow_mut();
            if set.members.remove(&target) {
                set.dirty = true;
            }
        }
        let Some(entity) = world.get_mut(target) else {
            return;
        };

        for (name, m) in &self.methods {
            entity.uninstall_method(name, m);
        }

        for (event, l) in &self.listeners {
            if entity.bound_listeners.remove(&self.binding_key(event)) {
                entity.events.off(event, Some(l), Some(target));
            }
        }

        if let Some(keys) = entity.applied_defaults.remove(&self.name) {
            for key in keys {
                entity.unset_property(&key);
            }
        }

        debug!("Behaviour '{}' removed from {}", self.name, target);

        if let Some(destroy) = self.method(DESTROY).cloned() {
            let mut ctx = Context::new(world, target);
            destroy(&mut ctx, &[]);
        }
    }
}

impl std::fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Behaviour")
            .field("name", &self.name)
            .field("methods", &self.methods.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("events", &self.listeners.iter().map(|(e, _)| e).collect::<Vec<_>>())
            .field("requires", &self.requires)
            .finish()
    }
}
