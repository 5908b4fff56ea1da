//! # Tarn — 2D Engine Core
//!
//! The runtime object model of a 2D game: a sparse-set entity/component
//! registry, the parent/child hierarchy it carries, typed events, and a
//! reflection bridge that lets scripts reach all of it by runtime type id.
//!
//! ```text
//!   scripts (Lua)          host code            scene documents
//!        │                     │                       │
//!        ▼                     ▼                       ▼
//!   MetaRegistry ──────► Registry ◄────────── SceneRegistry
//!   (bridge table)      (entities,            (serde functions)
//!        │               components,
//!        ▼               hierarchy, context)
//!   EventDispatcher
//! ```
//!
//! Start with `use tarn::prelude::*` and build a [`Core`](core::Core).

pub mod components;
pub mod config;
pub mod core;
pub mod ecs;
pub mod error;
pub mod event;
pub mod math;
pub mod prelude;
pub mod reflect;
pub mod scene;

#[cfg(feature = "hot-reload")]
pub mod asset;

#[cfg(feature = "scripting")]
pub mod scripting;

pub use error::{Error, Result};
