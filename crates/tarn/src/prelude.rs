//! Convenience re-exports — `use tarn::prelude::*` for the common items.

// Core
pub use crate::config::{CoreConfig, WatchEntry};
pub use crate::core::Core;
pub use crate::ecs::{
    DEFAULT_ENTITY_NAME, Entity, EntityHandle, EntityRef, GlobalTransform, Identification, Registry, Relationship,
    RuntimeView, propagate_transforms,
};
pub use crate::error::{Error, Result};
pub use crate::event::{AssetReloaded, EventDispatcher, Subscription};
pub use crate::math::{Affine2, Color, Rect, Vec2, Vec3};
pub use crate::scene::{SceneData, SceneMarker, SceneRegistry};

// Engine components
pub use crate::components::{
    Animation, BodyHandle, BodyType, BoxCollider, CircleCollider, Physics, Sprite, Text, Transform, Ui,
};

// Reflection bridge
pub use crate::reflect::{MetaAny, MetaRegistry, MetaTarget, Reflect, RuntimeTypeId, op};

// Hot reload (feature-gated)
#[cfg(feature = "hot-reload")]
pub use crate::asset::AssetWatcher;

// Scripting (feature-gated)
#[cfg(feature = "scripting")]
pub use crate::scripting::ScriptEngine;
