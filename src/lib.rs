//! Cadence: a 2D real-time entity-composition runtime.
//!
//! Entities form a scene graph under a root and get their logic from
//! behaviours: named bundles of methods, event listeners and default
//! properties that can be attached to any number of entities. Everything
//! talks through a per-entity event bus.
//!
//! - [`components`] – entities, behaviours, the built-in behaviours and tween plans
//! - [`engine`] – the fixed-step frame loop driving tick, input and render
//! - [`error`] – the crate error type
//! - [`events`] – event names, payloads and the multicast bus
//! - [`resources`] – the world arena, behaviour registry, ids, config, timers, renderers
//! - [`systems`] – scene graph, tick, render, input, collision, scene and tween logic

pub mod components;
pub mod engine;
pub mod error;
pub mod events;
pub mod resources;
pub mod systems;

pub use components::behaviour::{Behaviour, BehaviourDefinition};
pub use components::entity::{Entity, EntityBuilder};
pub use components::tween::Easing;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use events::bus::{Listener, listener};
pub use events::{Event, Response};
pub use resources::engineconfig::EngineConfig;
pub use resources::ids::EntityId;
pub use resources::world::{Context, World};
