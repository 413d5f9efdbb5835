//! Integration tests for the scene graph and the behaviour protocol.
//!
//! Covers mutation of the tree from inside tick handlers, symmetric
//! attach/detach of behaviours, and registration failures.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test scenegraph_integration
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};

use cadence::events::{self, Event};
use cadence::{
    Behaviour, BehaviourDefinition, EngineError, EntityBuilder, EntityId, World,
};

fn tick_root(world: &mut World) {
    let root = world.root();
    world.trigger(root, events::SUBTICK, &mut Event::tick(0.016, 0.016));
}

fn logging_child(
    world: &mut World,
    parent: EntityId,
    name: &'static str,
    log: &Rc<RefCell<Vec<&'static str>>>,
) -> EntityId {
    let log = log.clone();
    world
        .spawn_child(
            parent,
            EntityBuilder::new()
                .tag(name)
                .on(events::TICK, move |_ctx, _ev| log.borrow_mut().push(name)),
        )
        .unwrap()
}

// ==================== REENTRANT MUTATION ====================

#[test]
fn test_remove_self_during_own_tick() {
    let mut world = World::new();
    let root = world.root();
    let log = Rc::new(RefCell::new(Vec::new()));

    let a = logging_child(&mut world, root, "a", &log);
    let b = world
        .spawn_child(
            root,
            EntityBuilder::new().tag("b").on(events::TICK, {
                let log = log.clone();
                move |ctx, _ev| {
                    log.borrow_mut().push("b");
                    let this = ctx.this;
                    if let Some(parent) = ctx.parent() {
                        ctx.world.remove_child(parent, this, false);
                    }
                }
            }),
        )
        .unwrap();
    let c = logging_child(&mut world, root, "c", &log);

    tick_root(&mut world);
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    assert_eq!(world.children(root), &[a, c]);
    assert!(world.contains(b));
    assert_eq!(world.parent(b), None);

    tick_root(&mut world);
    assert_eq!(*log.borrow(), vec!["a", "b", "c", "a", "c"]);
}

#[test]
fn test_destroy_sibling_during_tick_waits_for_loop_end() {
    let mut world = World::new();
    let root = world.root();
    let log = Rc::new(RefCell::new(Vec::new()));

    let victim_slot = Rc::new(RefCell::new(None::<EntityId>));
    let slot = victim_slot.clone();
    let killer_log = log.clone();
    world
        .spawn_child(
            root,
            EntityBuilder::new().on(events::TICK, move |ctx, _ev| {
                killer_log.borrow_mut().push("killer");
                let victim = *slot.borrow();
                if let (Some(victim), Some(parent)) = (victim, ctx.parent()) {
                    ctx.world.remove_child(parent, victim, true);
                }
            }),
        )
        .unwrap();
    let victim = logging_child(&mut world, root, "victim", &log);
    *victim_slot.borrow_mut() = Some(victim);

    tick_root(&mut world);
    assert_eq!(*log.borrow(), vec!["killer", "victim"]);
    assert!(!world.contains(victim));
    assert_eq!(world.children(root).len(), 1);
}

#[test]
fn test_spawn_during_tick_joins_next_step() {
    let mut world = World::new();
    let root = world.root();
    let log = Rc::new(RefCell::new(Vec::new()));
    let spawned = Rc::new(RefCell::new(false));

    let flag = spawned.clone();
    let child_log = log.clone();
    world
        .spawn_child(
            root,
            EntityBuilder::new().on(events::TICK, move |ctx, _ev| {
                if flag.replace(true) {
                    return;
                }
                let root = ctx.world.root();
                let log = child_log.clone();
                ctx.world
                    .spawn_child(
                        root,
                        EntityBuilder::new()
                            .on(events::TICK, move |_c, _e| log.borrow_mut().push("late")),
                    )
                    .unwrap();
            }),
        )
        .unwrap();

    tick_root(&mut world);
    assert!(log.borrow().is_empty());
    assert_eq!(world.children(root).len(), 2);
    tick_root(&mut world);
    assert_eq!(*log.borrow(), vec!["late"]);
}

// ==================== BEHAVIOUR PROTOCOL ====================

fn glow() -> Behaviour {
    Behaviour::new(
        "glow",
        BehaviourDefinition::new()
            .default_value("glowRadius", json!(8))
            .default_value("x", json!(100))
            .method("brighten", |ctx, _args| {
                let radius = ctx.property_f32("glowRadius").unwrap_or(0.0);
                ctx.set_property("glowRadius", json!(radius * 2.0));
                Value::Null
            })
            .on(events::TICK, |_ctx, _ev| {})
            .on(events::COLLISION, |_ctx, _ev| {}),
    )
}

#[test]
fn test_attach_then_detach_restores_entity() {
    let mut world = World::new();
    world.register_behaviour(glow()).unwrap();
    let id = world
        .spawn(EntityBuilder::new().with("label", json!("lamp")))
        .unwrap();

    let snapshot = |world: &World| {
        let e = world.get(id).unwrap();
        (
            e.property_keys().iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            e.has_method("brighten"),
            e.events().listener_count(events::TICK),
            e.events().listener_count(events::COLLISION),
            e.x,
        )
    };
    let before = snapshot(&world);

    world.add_behaviour(id, "glow").unwrap();
    {
        let e = world.get(id).unwrap();
        assert_eq!(e.get_property("glowRadius"), Some(json!(8)));
        assert_eq!(e.x, 0.0);
        assert!(e.has_method("brighten"));
        assert_eq!(e.events().listener_count(events::TICK), 1);
    }
    world.call(id, "brighten", &[]);
    assert_eq!(world.get(id).unwrap().property_f32("glowRadius"), Some(16.0));

    assert!(world.remove_behaviour(id, "glow"));
    assert_eq!(snapshot(&world), before);
    assert!(!world.behaviour("glow").unwrap().is_applied_to(id));
}

#[test]
fn test_attach_twice_is_idempotent() {
    let mut world = World::new();
    world.register_behaviour(glow()).unwrap();
    let id = world.spawn(EntityBuilder::new().behaviour("glow")).unwrap();
    world.add_behaviour(id, "glow").unwrap();
    let e = world.get(id).unwrap();
    assert_eq!(e.behaviours(), &["glow".to_string()]);
    assert_eq!(e.events().listener_count(events::COLLISION), 1);
}

#[test]
fn test_requirements_are_attached_first() {
    let mut world = World::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    for (name, requires) in [("base", None), ("middle", Some("base")), ("top", Some("middle"))] {
        let log = order.clone();
        let mut def = BehaviourDefinition::new().init(move |_ctx| log.borrow_mut().push(name));
        if let Some(r) = requires {
            def = def.requires(r);
        }
        world.register_behaviour(Behaviour::new(name, def)).unwrap();
    }
    let id = world.spawn(EntityBuilder::new().behaviour("top")).unwrap();
    assert_eq!(*order.borrow(), vec!["base", "middle", "top"]);
    assert_eq!(
        world.get(id).unwrap().behaviours(),
        &["base".to_string(), "middle".to_string(), "top".to_string()]
    );
}

// ==================== REGISTRATION FAILURES ====================

#[test]
fn test_requirement_cycle_is_rejected() {
    let mut world = World::new();
    world
        .register_behaviour(Behaviour::new("a", BehaviourDefinition::new().requires("b")))
        .unwrap();
    world
        .register_behaviour(Behaviour::new("b", BehaviourDefinition::new().requires("c")))
        .unwrap();
    let err = world
        .register_behaviour(Behaviour::new("c", BehaviourDefinition::new().requires("a")))
        .unwrap_err();
    assert!(matches!(err, EngineError::RequirementCycle(_)));
    assert!(!world.registry().contains("c"));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut world = World::new();
    world.register_behaviour(glow()).unwrap();
    assert_eq!(
        world.register_behaviour(glow()).unwrap_err(),
        EngineError::DuplicateBehaviour("glow".into())
    );
}

#[test]
fn test_unknown_requirement_leaves_entity_untouched() {
    let mut world = World::new();
    world
        .register_behaviour(Behaviour::new(
            "orphan",
            BehaviourDefinition::new()
                .requires("missing")
                .default_value("marker", json!(true)),
        ))
        .unwrap();
    let id = world.spawn(EntityBuilder::new()).unwrap();
    assert_eq!(
        world.add_behaviour(id, "orphan"),
        Err(EngineError::UnknownBehaviour("missing".into()))
    );
    let e = world.get(id).unwrap();
    assert!(e.behaviours().is_empty());
    assert!(!e.has_property("marker"));
}
