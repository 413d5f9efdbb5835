//! Runtime logic operating on the [`World`](crate::resources::world::World).
//!
//! Submodules overview
//! - [`collision`] – pairwise collision pass and `collision` events
//! - [`input`] – touch propagation through the scene graph
//! - [`render`] – recursive render and gizmo passes
//! - [`scene`] – scene switching and history
//! - [`scenegraph`] – parent/child links, deferred mutation, attach propagation
//! - [`tick`] – recursive simulation step
//! - [`tween`] – tick-driven tweens and delays

pub mod collision;
pub mod input;
pub mod render;
pub mod scene;
pub mod scenegraph;
pub mod tick;
pub mod tween;
