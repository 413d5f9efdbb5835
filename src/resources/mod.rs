//! Long-lived state and platform collaborators.
//!
//! Overview
//! - `engineconfig` – loop, world and view settings from an INI file
//! - `framestats` – fps and rolling update/render durations
//! - `ids` – entity ids and their generator
//! - `registry` – behaviours by name and their attach order
//! - `renderer` – the drawing contract and a recording implementation
//! - `timer` – frame schedulers and the clock that turns frames into deltas
//! - `world` – the entity arena and the event/method entry points
pub mod engineconfig;
pub mod framestats;
pub mod ids;
pub mod registry;
pub mod renderer;
pub mod timer;
pub mod world;
