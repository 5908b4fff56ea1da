//! The standard bridge operation set for a component type.
//!
//! | op                  | target             | args            | result        |
//! |---------------------|--------------------|-----------------|---------------|
//! | `add`               | `Entity(reg, e)`   | `T` or JSON     | stored `T`    |
//! | `get`               | `Entity(reg, e)`   |                 | `T` clone     |
//! | `has`               | `Entity(reg, e)`   |                 | `bool`        |
//! | `remove`            | `Entity(reg, e)`   |                 | removed `T`   |
//! | `add_to_view`       | `View(view)`       |                 | `true`        |
//! | `exclude_from_view` | `View(view)`       |                 | `true`        |
//! | `to_json`           | `None`             | `T`             | JSON `Value`  |
//! | `from_json`         | `None`             | JSON            | `T`           |
//!
//! `add` replaces an existing component instead of panicking: scripts have
//! no way to guard the call with a typed `has`. Any op on a dead entity
//! returns the empty result.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ecs::{Component, Entity, Registry};

use super::any::MetaAny;
use super::registry::{MetaKind, MetaOps, MetaRegistry, MetaTarget, ReflectError, op};
use super::type_id::Reflect;

/// Everything a type needs to be reachable from scripts as a component.
pub trait ReflectComponent: Component + Reflect + Serialize + DeserializeOwned {}

impl<T: Component + Reflect + Serialize + DeserializeOwned> ReflectComponent for T {}

fn live_entity(target: MetaTarget<'_>) -> Option<(&mut Registry, Entity)> {
    match target {
        MetaTarget::Entity(registry, entity) if registry.is_alive(entity) => Some((registry, entity)),
        MetaTarget::Entity(_, entity) => {
            log::warn!("bridge: component op on dead entity {entity:?}");
            None
        }
        _ => None,
    }
}

fn first_arg(args: Vec<MetaAny>) -> MetaAny {
    args.into_iter().next().unwrap_or_default()
}

/// The full component operation set for `T`.
pub fn component_ops<T: ReflectComponent>() -> MetaOps {
    MetaOps::new()
        .with(op::ADD, |target, args| {
            let Some((registry, entity)) = live_entity(target) else {
                return MetaAny::empty();
            };
            let Some(value) = first_arg(args).into_payload::<T>() else {
                return MetaAny::empty();
            };
            MetaAny::new(registry.add_or_replace(entity, value).clone())
        })
        .with(op::GET, |target, _| {
            live_entity(target)
                .and_then(|(registry, entity)| registry.try_get::<T>(entity).cloned())
                .map_or_else(MetaAny::empty, MetaAny::new)
        })
        .with(op::HAS, |target, _| match live_entity(target) {
            Some((registry, entity)) => MetaAny::new(registry.has::<T>(entity)),
            None => MetaAny::empty(),
        })
        .with(op::REMOVE, |target, _| {
            MetaAny::from_option(live_entity(target).and_then(|(registry, entity)| registry.remove::<T>(entity)))
        })
        .with(op::ADD_TO_VIEW, |target, _| match target {
            MetaTarget::View(view) => {
                view.include_type::<T>();
                MetaAny::new(true)
            }
            _ => MetaAny::empty(),
        })
        .with(op::EXCLUDE_FROM_VIEW, |target, _| match target {
            MetaTarget::View(view) => {
                view.exclude_type::<T>();
                MetaAny::new(true)
            }
            _ => MetaAny::empty(),
        })
        .with(op::TO_JSON, |_, args| {
            let Ok(value) = first_arg(args).take::<T>() else {
                return MetaAny::empty();
            };
            match serde_json::to_value(&value) {
                Ok(json) => MetaAny::new(json),
                Err(err) => {
                    log::warn!("bridge: cannot serialize `{}`: {err}", T::TYPE_NAME);
                    MetaAny::empty()
                }
            }
        })
        .with(op::FROM_JSON, |_, args| MetaAny::from_option(first_arg(args).into_payload::<T>()))
}

impl MetaRegistry {
    /// Register `T` with the standard component operation set.
    pub fn register_component<T: ReflectComponent>(&mut self) -> Result<(), ReflectError> {
        self.register::<T>(MetaKind::Component, component_ops::<T>())
    }
}
