//! # Sparse-Set ECS
//!
//! Entities are generational handles; each component type lives in its own
//! sparse set, so adding or removing a component never moves any other
//! component of the same entity.
//!
//! ## Module Overview
//!
//! - [`entity`] — Generational entity IDs
//! - [`storage`] — Per-type sparse sets behind an erased `ComponentStorage`
//! - [`context`] — Registry-wide singletons keyed by type
//! - [`registry`] — Central container (entities + components + context)
//! - [`query`] — Closure-based typed views
//! - [`view`] — Views assembled from runtime type ids
//! - [`hierarchy`] — Intrusive parent/child links and transform propagation
//! - [`handle`] — Entity + registry pairs

pub mod context;
pub mod entity;
pub mod handle;
pub mod hierarchy;
pub mod query;
pub mod registry;
pub mod storage;
pub mod view;

pub use context::{ContextError, ContextStore};
pub use entity::Entity;
pub use handle::{EntityHandle, EntityRef};
pub use hierarchy::{GlobalTransform, Relationship, propagate_transforms};
pub use query::{ComponentSet, QueryParam};
pub use registry::{DEFAULT_ENTITY_NAME, Identification, Registry};
pub use storage::{Component, ComponentStorage, SparseSet};
pub use view::RuntimeView;
