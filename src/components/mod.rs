//! Entities and the behaviours attached to them.
//!
//! Submodules overview:
//! - [`behaviour`] – behaviour definitions and the attach/detach protocol
//! - [`entity`] – the scene-graph node, its typed properties and the builder
//! - [`collider`] – built-in `collider` behaviour
//! - [`mass`] – built-in `mass` behaviour (gravity and velocity)
//! - [`scene`] – built-in `scene` behaviour for scene roots
//! - [`tween`] – easing curves, colours and per-property tween plans

pub mod behaviour;
pub mod collider;
pub mod entity;
pub mod mass;
pub mod scene;
pub mod tween;
