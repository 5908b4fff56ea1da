//! # Reflection Bridge
//!
//! Lets a caller that only holds a [`RuntimeTypeId`] perform typed
//! operations on components and events. Scripts are the main client: they
//! carry the id of a descriptor table and nothing else.
//!
//! ```text
//! script: entity:get_component(Transform)
//!   → RuntimeTypeId("Transform")
//!   → MetaRegistry::invoke(id, "get", Entity(registry, e), [])
//!   → registry.try_get::<Transform>(e).cloned()  (inside the bound closure)
//!   → MetaAny(Transform) → "to_json" → script table
//! ```
//!
//! Each type registers itself once at startup with
//! [`MetaRegistry::register_component`] or [`MetaRegistry::register_event`].

pub mod any;
pub mod component;
pub mod event;
pub mod registry;
pub mod type_id;

pub use any::MetaAny;
pub use component::{ReflectComponent, component_ops};
pub use event::{JsonHandler, ReflectEvent, event_ops};
pub use registry::{
    MetaFn, MetaKind, MetaOps, MetaRegistry, MetaTarget, MetaType, REQUIRED_COMPONENT_OPS,
    REQUIRED_EVENT_OPS, ReflectError, op,
};
pub use type_id::{Reflect, RuntimeTypeId};
