//! The entity arena and everything that needs mutable access to all of it.
//!
//! [`World`] owns every [`Entity`] by id, the [`BehaviourRegistry`], the id
//! counter, and the root of the scene graph. Entities refer to each other by
//! [`EntityId`] only, so listeners can freely add, remove and reparent
//! entities while an event is being delivered.
//!
//! Listeners and methods run with a [`Context`]: the world plus the id of the
//! entity they are running as.
//!
//! Scene-graph operations live in [`crate::systems::scenegraph`], tweens in
//! [`crate::systems::tween`], scene switching in [`crate::systems::scene`];
//! they all extend `World` with further `impl` blocks.

use std::rc::Rc;

use log::{debug, error, warn};
use rustc_hash::FxHashMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::components::behaviour::{Behaviour, Method};
use crate::components::entity::{Entity, EntityBuilder};
use crate::components::{collider, mass, scene};
use crate::error::{EngineError, Result};
use crate::events::bus::{Listener, listener};
use crate::events::{self, Event, Response};
use crate::resources::ids::{EntityId, IdGenerator};
use crate::resources::registry::BehaviourRegistry;
use crate::systems::{input, render, scenegraph, tick};

/// Default downward acceleration used by the `mass` behaviour, in units/s².
pub const DEFAULT_GRAVITY: f32 = 2800.0;

/// Listeners every entity carries.
struct Builtins {
    subtick: Listener,
    attach: Listener,
    touchstart: Listener,
    touchmove: Listener,
    touchend: Listener,
    subrender: Listener,
    gizmos: Listener,
}

impl Builtins {
    fn new() -> Self {
        Builtins {
            subtick: listener(tick::subtick),
            attach: listener(scenegraph::attach_children),
            touchstart: listener(|ctx, ev| input::propagate_touch(ctx, ev, events::TOUCHSTART)),
            touchmove: listener(|ctx, ev| input::propagate_touch(ctx, ev, events::TOUCHMOVE)),
            touchend: listener(|ctx, ev| input::propagate_touch(ctx, ev, events::TOUCHEND)),
            subrender: listener(render::subrender),
            gizmos: listener(render::subgizmos),
        }
    }

    fn bind(&self, entity: &mut Entity) {
        entity
            .events
            .on(events::SUBTICK, self.subtick.clone(), None)
            .on(events::ATTACH, self.attach.clone(), None)
            .on(events::TOUCHSTART, self.touchstart.clone(), None)
            .on(events::TOUCHMOVE, self.touchmove.clone(), None)
            .on(events::TOUCHEND, self.touchend.clone(), None)
            .on(events::SUBRENDER, self.subrender.clone(), None)
            .on(events::GIZMOS, self.gizmos.clone(), None);
    }
}

/// Active scene and the scenes pushed beneath it.
#[derive(Debug, Default)]
pub struct SceneStack {
    pub(crate) active: Option<EntityId>,
    pub(crate) history: Vec<EntityId>,
}

/// Entity arena, behaviour registry and scene-graph root.
pub struct World {
    entities: FxHashMap<EntityId, Entity>,
    ids: IdGenerator,
    registry: BehaviourRegistry,
    builtins: Builtins,
    root: EntityId,
    /// Acceleration applied by the `mass` behaviour.
    pub gravity: f32,
    pub(crate) scenes: SceneStack,
    stop_requested: bool,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a world with a root entity and the built-in behaviours
    /// (`collider`, `mass`, `scene`) registered.
    pub fn new() -> Self {
        let mut ids = IdGenerator::new();
        let builtins = Builtins::new();
        let root = ids.next_id();
        let mut root_entity = Entity::new(root);
        root_entity.tag = Some("root".to_string());
        root_entity.attached = true;
        builtins.bind(&mut root_entity);

        let mut entities = FxHashMap::default();
        entities.insert(root, root_entity);

        let mut registry = BehaviourRegistry::new();
        for behaviour in [collider::behaviour(), mass::behaviour(), scene::behaviour()] {
            if let Err(e) = registry.register(behaviour) {
                error!("Failed to register built-in behaviour: {}", e);
            }
        }

        World {
            entities,
            ids,
            registry,
            builtins,
            root,
            gravity: DEFAULT_GRAVITY,
            scenes: SceneStack::default(),
            stop_requested: false,
        }
    }

    /// The scene-graph root. Always present and attached.
    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Live entities, root included.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// First entity with the given tag, in id order.
    pub fn find_by_tag(&self, tag: &str) -> Option<EntityId> {
        self.entities
            .values()
            .filter(|e| e.tag.as_deref() == Some(tag))
            .map(Entity::id)
            .min()
    }

    // ==================== CONSTRUCTION ====================

    /// Build an entity that is not yet part of the scene graph.
    ///
    /// Every behaviour name (and its requirements) is resolved before the
    /// entity is created, so an unknown name leaves the world untouched.
    pub fn spawn(&mut self, builder: EntityBuilder) -> Result<EntityId> {
        for name in &builder.behaviours {
            self.registry.attach_order(name)?;
        }

        let id = self.ids.next_id();
        let mut entity = Entity::new(id);
        self.builtins.bind(&mut entity);
        entity.tag = builder.tag;
        for (key, value) in builder.properties {
            if !entity.set_property(&key, value.clone()) {
                warn!("Entity {}: ignoring invalid value for '{}'", id, key);
                continue;
            }
            entity.saved_defaults.insert(key, value);
        }
        for (event, l) in builder.listeners {
            entity.events.on(&event, l, None);
        }
        for (name, m) in builder.methods {
            entity.install_method(&name, None, m);
        }
        self.entities.insert(id, entity);

        for name in &builder.behaviours {
            self.add_behaviour(id, name)?;
        }
        if let Some(init) = builder.init {
            init(&mut Context::new(self, id));
        }
        debug!("Spawned entity {}", id);
        Ok(id)
    }

    /// Build an entity that counts as attached to the engine, firing its
    /// `attach` event. It still needs a parent to be ticked or drawn.
    pub fn create(&mut self, builder: EntityBuilder) -> Result<EntityId> {
        let id = self.spawn(builder)?;
        scenegraph::attach(self, id);
        Ok(id)
    }

    /// Drop an entity from the arena. Callers detach it first.
    pub(crate) fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        if id == self.root {
            return None;
        }
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            debug!("Despawned entity {}", id);
        }
        removed
    }

    // ==================== BEHAVIOURS ====================

    pub fn registry(&self) -> &BehaviourRegistry {
        &self.registry
    }

    /// Register a behaviour for this world.
    pub fn register_behaviour(&mut self, behaviour: Behaviour) -> Result<Rc<Behaviour>> {
        self.registry.register(behaviour)
    }

    pub fn behaviour(&self, name: &str) -> Result<Rc<Behaviour>> {
        self.registry.get(name)
    }

    /// Attach a behaviour and, first, everything it requires.
    ///
    /// Already attached behaviours are skipped. `init` runs for each newly
    /// attached behaviour, requirements first.
    pub fn add_behaviour(&mut self, id: EntityId, name: &str) -> Result<()> {
        if !self.contains(id) {
            return Err(EngineError::EntityNotFound(id));
        }
        let order = self.registry.attach_order(name)?;
        for behaviour in order {
            let Some(entity) = self.entities.get_mut(&id) else {
                return Err(EngineError::EntityNotFound(id));
            };
            if entity.has_behaviour(behaviour.name()) {
                continue;
            }
            entity.behaviours.push(behaviour.name().to_string());
            behaviour.apply(self, id, true);
        }
        Ok(())
    }

    /// Detach a behaviour. Returns whether it was attached.
    ///
    /// Behaviours it required stay attached.
    pub fn remove_behaviour(&mut self, id: EntityId, name: &str) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        let Some(index) = entity.behaviours.iter().position(|b| b == name) else {
            return false;
        };
        entity.behaviours.remove(index);
        match self.registry.get(name) {
            Ok(behaviour) => behaviour.remove(self, id),
            Err(e) => warn!("Entity {}: {}", id, e),
        }
        true
    }

    /// Detach every behaviour, most recently attached first.
    pub(crate) fn remove_all_behaviours(&mut self, id: EntityId) {
        let names: Vec<String> = match self.entities.get(&id) {
            Some(entity) => entity.behaviours.iter().rev().cloned().collect(),
            None => return,
        };
        for name in names {
            self.remove_behaviour(id, &name);
        }
    }

    pub fn has_behaviour(&self, id: EntityId, name: &str) -> bool {
        self.get(id).is_some_and(|e| e.has_behaviour(name))
    }

    // ==================== EVENTS ====================

    /// Bind a listener on an entity's bus.
    pub fn on(&mut self, id: EntityId, event: &str, l: Listener, context: Option<EntityId>) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.events.on(event, l, context);
                true
            }
            None => false,
        }
    }

    pub fn once(&mut self, id: EntityId, event: &str, l: Listener, context: Option<EntityId>) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.events.once(event, l, context);
                true
            }
            None => false,
        }
    }

    /// Unbind; see [`EventBus::off`](crate::events::bus::EventBus::off).
    pub fn off(
        &mut self,
        id: EntityId,
        event: &str,
        l: Option<&Listener>,
        context: Option<EntityId>,
    ) -> bool {
        self.entities
            .get_mut(&id)
            .is_some_and(|entity| entity.events.remove(event, l, context))
    }

    /// Call every listener bound to `event` on `id`, in registration order.
    ///
    /// Listeners bound or unbound during the trigger only affect later
    /// triggers. A `once` binding is unbound right before its call and
    /// skipped if something else unbound it first. Returns the OR of all
    /// listener responses.
    pub fn trigger(&mut self, id: EntityId, event: &str, payload: &mut Event<'_>) -> Response {
        let bindings = match self.entities.get(&id) {
            Some(entity) => entity.events.snapshot(event),
            None => return Response::Ignored,
        };
        let mut response = Response::Ignored;
        for binding in bindings {
            if binding.once {
                let unbound = self
                    .entities
                    .get_mut(&id)
                    .is_some_and(|e| e.events.remove_binding(event, binding.key));
                if !unbound {
                    continue;
                }
            }
            let mut ctx = Context::new(self, binding.context.unwrap_or(id));
            response |= (binding.listener)(&mut ctx, &mut *payload);
        }
        response
    }

    /// Trigger with no payload.
    pub fn emit(&mut self, id: EntityId, event: &str) -> Response {
        self.trigger(id, event, &mut Event::Signal)
    }

    // ==================== METHODS ====================

    pub fn has_method(&self, id: EntityId, name: &str) -> bool {
        self.get(id).is_some_and(|e| e.has_method(name))
    }

    /// Call a method from an entity's capability table.
    pub fn call(&mut self, id: EntityId, name: &str, args: &[Value]) -> Option<Value> {
        let m: Method = self.get(id)?.method(name)?.clone();
        Some(m(&mut Context::new(self, id), args))
    }

    // ==================== PROPERTIES ====================

    pub fn get_property(&self, id: EntityId, key: &str) -> Option<Value> {
        self.get(id)?.get_property(key)
    }

    pub fn set_property(&mut self, id: EntityId, key: &str, value: Value) -> bool {
        self.get_mut(id).is_some_and(|e| e.set_property(key, value))
    }

    // ==================== LOOP CONTROL ====================

    /// Ask the running engine loop to stop after the current frame.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn take_stop_request(&mut self) -> bool {
        std::mem::take(&mut self.stop_requested)
    }
}

/// What a listener or method runs with.
pub struct Context<'w> {
    pub world: &'w mut World,
    /// The entity the code runs as.
    pub this: EntityId,
}

impl<'w> Context<'w> {
    pub fn new(world: &'w mut World, this: EntityId) -> Self {
        Context { world, this }
    }

    pub fn entity(&self) -> Option<&Entity> {
        self.world.get(self.this)
    }

    pub fn entity_mut(&mut self) -> Option<&mut Entity> {
        self.world.get_mut(self.this)
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.entity().and_then(Entity::parent)
    }

    pub fn children(&self) -> SmallVec<[EntityId; 8]> {
        self.entity()
            .map(|e| e.children().iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.entity()?.get_property(key)
    }

    pub fn property_f32(&self, key: &str) -> Option<f32> {
        self.entity()?.property_f32(key)
    }

    pub fn set_property(&mut self, key: &str, value: Value) {
        if let Some(entity) = self.entity_mut() {
            entity.set_property(key, value);
        }
    }

    pub fn trigger(&mut self, event: &str, payload: &mut Event<'_>) -> Response {
        self.world.trigger(self.this, event, payload)
    }

    pub fn emit(&mut self, event: &str) -> Response {
        self.world.emit(self.this, event)
    }

    pub fn call(&mut self, name: &str, args: &[Value]) -> Option<Value> {
        self.world.call(self.this, name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use serde_json::json;

    use crate::components::behaviour::BehaviourDefinition;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, label: &'static str) -> Listener {
        let log = log.clone();
        listener(move |_ctx, _ev| log.borrow_mut().push(label))
    }

    // ==================== TRIGGER ====================

    #[test]
    fn test_trigger_calls_in_order_and_ors_results() {
        let mut world = World::new();
        let id = world.spawn(EntityBuilder::new()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        world.on(id, "ping", recorder(&log, "a"), None);
        world.on(id, "ping", listener(|_c, _e| true), None);
        world.on(id, "ping", recorder(&log, "c"), None);

        assert_eq!(world.emit(id, "ping"), Response::Consumed);
        assert_eq!(*log.borrow(), vec!["a", "c"]);
        assert_eq!(world.emit(id, "nobody"), Response::Ignored);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let mut world = World::new();
        let id = world.spawn(EntityBuilder::new()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        world.once(id, "ping", recorder(&log, "once"), None);
        world.emit(id, "ping");
        world.emit(id, "ping");
        assert_eq!(*log.borrow(), vec!["once"]);
        assert_eq!(world.get(id).unwrap().events().listener_count("ping"), 0);
    }

    #[test]
    fn test_binding_during_trigger_applies_next_time() {
        let mut world = World::new();
        let id = world.spawn(EntityBuilder::new()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let late = recorder(&log, "late");
        world.on(
            id,
            "ping",
            listener(move |ctx, _ev| {
                let this = ctx.this;
                ctx.world.on(this, "ping", late.clone(), None);
            }),
            None,
        );
        world.emit(id, "ping");
        assert!(log.borrow().is_empty());
        world.emit(id, "ping");
        assert_eq!(*log.borrow(), vec!["late"]);
    }

    #[test]
    fn test_unbinding_during_trigger_still_runs_snapshot() {
        let mut world = World::new();
        let id = world.spawn(EntityBuilder::new()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let second = recorder(&log, "second");
        let handle = second.clone();
        world.on(
            id,
            "ping",
            listener(move |ctx, _ev| {
                let this = ctx.this;
                ctx.world.off(this, "ping", Some(&handle), None);
            }),
            None,
        );
        world.on(id, "ping", second, None);
        world.emit(id, "ping");
        world.emit(id, "ping");
        assert_eq!(*log.borrow(), vec!["second"]);
    }

    #[test]
    fn test_context_binding_runs_as_other_entity() {
        let mut world = World::new();
        let a = world.spawn(EntityBuilder::new().tag("a")).unwrap();
        let b = world.spawn(EntityBuilder::new().tag("b")).unwrap();
        world.on(
            a,
            "ping",
            listener(|ctx, _ev| ctx.set_property("seen", json!(true))),
            Some(b),
        );
        world.emit(a, "ping");
        assert!(!world.get(a).unwrap().has_property("seen"));
        assert_eq!(world.get_property(b, "seen"), Some(json!(true)));
    }

    // ==================== CONSTRUCTION ====================

    #[test]
    fn test_spawn_unknown_behaviour_creates_nothing() {
        let mut world = World::new();
        let before = world.len();
        let err = world
            .spawn(EntityBuilder::new().behaviour("ghost"))
            .unwrap_err();
        assert_eq!(err, EngineError::UnknownBehaviour("ghost".into()));
        assert_eq!(world.len(), before);
    }

    #[test]
    fn test_spawn_applies_properties_and_init() {
        let mut world = World::new();
        let id = world
            .spawn(
                EntityBuilder::new()
                    .at(3.0, 4.0)
                    .with("score", json!(7))
                    .init(|ctx| ctx.set_property("ready", json!(true))),
            )
            .unwrap();
        let e = world.get(id).unwrap();
        assert_eq!(e.x, 3.0);
        assert_eq!(e.get_property("score"), Some(json!(7)));
        assert_eq!(e.get_property("ready"), Some(json!(true)));
        assert!(!e.is_attached());
    }

    #[test]
    fn test_create_marks_attached() {
        let mut world = World::new();
        let id = world.create(EntityBuilder::new()).unwrap();
        assert!(world.get(id).unwrap().is_attached());
    }

    #[test]
    fn test_builtin_behaviours_registered() {
        let world = World::new();
        assert_eq!(world.registry().names(), vec!["collider", "mass", "scene"]);
    }

    #[test]
    fn test_find_by_tag() {
        let mut world = World::new();
        let id = world.spawn(EntityBuilder::new().tag("hero")).unwrap();
        assert_eq!(world.find_by_tag("hero"), Some(id));
        assert_eq!(world.find_by_tag("root"), Some(world.root()));
        assert_eq!(world.find_by_tag("villain"), None);
    }

    // ==================== BEHAVIOURS ====================

    #[test]
    fn test_requirements_attach_first() {
        let mut world = World::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let log_a = order.clone();
        let log_b = order.clone();
        world
            .register_behaviour(Behaviour::new(
                "walker",
                BehaviourDefinition::new()
                    .requires("legs")
                    .init(move |_ctx| log_b.borrow_mut().push("walker")),
            ))
            .unwrap();
        world
            .register_behaviour(Behaviour::new(
                "legs",
                BehaviourDefinition::new().init(move |_ctx| log_a.borrow_mut().push("legs")),
            ))
            .unwrap();
        let id = world.spawn(EntityBuilder::new().behaviour("walker")).unwrap();
        assert_eq!(*order.borrow(), vec!["legs", "walker"]);
        assert_eq!(world.get(id).unwrap().behaviours(), &["legs", "walker"]);
    }

    #[test]
    fn test_add_behaviour_to_missing_entity() {
        let mut world = World::new();
        let ghost = EntityId::from_raw(999);
        assert_eq!(
            world.add_behaviour(ghost, "mass").unwrap_err(),
            EngineError::EntityNotFound(ghost)
        );
        assert!(!world.remove_behaviour(ghost, "mass"));
    }

    #[test]
    fn test_call_runs_with_entity_context() {
        let mut world = World::new();
        let id = world
            .spawn(EntityBuilder::new().method("double", |ctx, args| {
                let base = ctx.property_f32("x").unwrap_or(0.0);
                let factor = args.first().and_then(Value::as_f64).unwrap_or(2.0) as f32;
                json!(base * factor)
            }))
            .unwrap();
        world.set_property(id, "x", json!(4));
        assert_eq!(world.call(id, "double", &[json!(3)]), Some(json!(12.0)));
        assert_eq!(world.call(id, "missing", &[]), None);
    }

    #[test]
    fn test_stop_request_is_taken_once() {
        let mut world = World::new();
        world.request_stop();
        assert!(world.take_stop_request());
        assert!(!world.take_stop_request());
    }
}
