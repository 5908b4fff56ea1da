//! # Meta Registry — The Reflection Bridge Table
//!
//! Maps `(RuntimeTypeId, operation name)` to a native closure that performs a
//! fully typed operation. Each component or event type registers its own
//! operation set at startup; the registry itself never branches on a
//! concrete type.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ MetaRegistry                                                │
//! │                                                             │
//! │  0x1f3a.. "Transform" ─┬─ "add"      → Fn(target, args)     │
//! │                        ├─ "get"      → Fn(target, args)     │
//! │                        └─ ...                               │
//! │  0x82c1.. "AssetReloaded" ─┬─ "emit" → Fn(target, args)     │
//! │                            └─ ...                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`invoke`](MetaRegistry::invoke) on an unknown type or operation returns
//! an empty [`MetaAny`] and logs a warning; it never panics.

use std::any::TypeId;
use std::collections::HashMap;

use crate::ecs::{Entity, Registry, RuntimeView};
use crate::event::EventDispatcher;

use super::any::MetaAny;
use super::type_id::{Reflect, RuntimeTypeId};

/// Operations every scripting-visible component must provide.
pub const REQUIRED_COMPONENT_OPS: &[&str] = &[
    op::ADD,
    op::GET,
    op::HAS,
    op::REMOVE,
    op::ADD_TO_VIEW,
    op::EXCLUDE_FROM_VIEW,
];

/// Operations every scripting-visible event must provide.
pub const REQUIRED_EVENT_OPS: &[&str] = &[
    op::EMIT,
    op::ENQUEUE,
    op::HAS_HANDLERS,
    op::SUBSCRIBE,
    op::UNSUBSCRIBE,
];

/// Operation names.
pub mod op {
    pub const ADD: &str = "add";
    pub const GET: &str = "get";
    pub const HAS: &str = "has";
    pub const REMOVE: &str = "remove";
    pub const ADD_TO_VIEW: &str = "add_to_view";
    pub const EXCLUDE_FROM_VIEW: &str = "exclude_from_view";
    pub const TO_JSON: &str = "to_json";
    pub const FROM_JSON: &str = "from_json";

    pub const EMIT: &str = "emit";
    pub const ENQUEUE: &str = "enqueue";
    pub const HAS_HANDLERS: &str = "has_handlers";
    pub const FLUSH: &str = "flush";
    pub const CLEAR_QUEUE: &str = "clear_queue";
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
}

/// What a bridge operation acts on.
pub enum MetaTarget<'a> {
    /// Pure conversions (`to_json`, `from_json`).
    None,
    Entity(&'a mut Registry, Entity),
    View(&'a mut RuntimeView),
    Events(&'a mut EventDispatcher),
}

impl MetaTarget<'_> {
    fn describe(&self) -> &'static str {
        match self {
            MetaTarget::None => "none",
            MetaTarget::Entity(..) => "entity",
            MetaTarget::View(_) => "view",
            MetaTarget::Events(_) => "events",
        }
    }
}

/// A bound native operation.
pub type MetaFn = Box<dyn Fn(MetaTarget<'_>, Vec<MetaAny>) -> MetaAny>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    Component,
    Event,
}

/// Raised while building the bridge table. All of these are startup
/// configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReflectError {
    /// The same type was registered twice.
    #[error("type `{name}` ({id}) is already registered")]
    Duplicate { name: &'static str, id: RuntimeTypeId },

    /// Two different type names hash to the same runtime id.
    #[error("runtime type id {id} of `{name}` collides with `{existing}`")]
    Collision {
        name: &'static str,
        existing: &'static str,
        id: RuntimeTypeId,
    },

    /// A registered type lacks an operation the scripting layer relies on.
    #[error("type `{name}` is missing required operation `{op}`")]
    MissingOperation { name: &'static str, op: &'static str },
}

/// Operation set under construction for one type.
#[derive(Default)]
pub struct MetaOps {
    ops: Vec<(&'static str, MetaFn)>,
}

impl MetaOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `f`. A later binding of the same name replaces it.
    pub fn with(
        mut self,
        name: &'static str,
        f: impl Fn(MetaTarget<'_>, Vec<MetaAny>) -> MetaAny + 'static,
    ) -> Self {
        self.ops.push((name, Box::new(f)));
        self
    }
}

/// Bridge entry for one reflected type.
pub struct MetaType {
    pub id: RuntimeTypeId,
    pub name: &'static str,
    pub kind: MetaKind,
    /// Native type id, used to build views and look up storages.
    pub type_id: TypeId,
    ops: HashMap<&'static str, MetaFn>,
}

impl MetaType {
    pub fn supports(&self, op: &str) -> bool {
        self.ops.contains_key(op)
    }

    pub fn operations(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.ops.keys().copied()
    }
}

/// The `(type, operation) → native function` table.
#[derive(Default)]
pub struct MetaRegistry {
    types: HashMap<RuntimeTypeId, MetaType>,
    /// Registration order, for stable iteration.
    order: Vec<RuntimeTypeId>,
}

/// Never stored; including it makes a view match nothing.
#[derive(Clone)]
struct Unresolved;

impl MetaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `T`'s runtime id to an operation set.
    pub fn register<T: Reflect>(&mut self, kind: MetaKind, ops: MetaOps) -> Result<(), ReflectError> {
        let id = T::TYPE_ID;
        if let Some(existing) = self.types.get(&id) {
            return Err(if existing.name == T::TYPE_NAME {
                ReflectError::Duplicate {
                    name: T::TYPE_NAME,
                    id,
                }
            } else {
                ReflectError::Collision {
                    name: T::TYPE_NAME,
                    existing: existing.name,
                    id,
                }
            });
        }

        log::debug!("bridge: registered {:?} `{}` ({id})", kind, T::TYPE_NAME);
        self.types.insert(
            id,
            MetaType {
                id,
                name: T::TYPE_NAME,
                kind,
                type_id: TypeId::of::<T>(),
                ops: ops.ops.into_iter().collect(),
            },
        );
        self.order.push(id);
        Ok(())
    }

    /// Call `(id, op)` on `target`. Unresolved calls return an empty value.
    pub fn invoke(&self, id: RuntimeTypeId, op: &str, target: MetaTarget<'_>, args: Vec<MetaAny>) -> MetaAny {
        let Some(meta) = self.types.get(&id) else {
            log::warn!("bridge: unknown type id {id} (op `{op}`)");
            return MetaAny::empty();
        };
        let Some(f) = meta.ops.get(op) else {
            log::warn!("bridge: `{}` has no operation `{op}`", meta.name);
            return MetaAny::empty();
        };
        log::trace!("bridge: {}::{op} on {}", meta.name, target.describe());
        f(target, args)
    }

    pub fn contains(&self, id: RuntimeTypeId) -> bool {
        self.types.contains_key(&id)
    }

    pub fn supports(&self, id: RuntimeTypeId, op: &str) -> bool {
        self.types.get(&id).is_some_and(|meta| meta.supports(op))
    }

    pub fn get(&self, id: RuntimeTypeId) -> Option<&MetaType> {
        self.types.get(&id)
    }

    pub fn type_name(&self, id: RuntimeTypeId) -> Option<&'static str> {
        self.types.get(&id).map(|meta| meta.name)
    }

    pub fn find_by_name(&self, name: &str) -> Option<RuntimeTypeId> {
        let id = RuntimeTypeId::from_name(name);
        self.types
            .get(&id)
            .filter(|meta| meta.name == name)
            .map(|meta| meta.id)
    }

    /// Registered types in registration order.
    pub fn types(&self) -> impl Iterator<Item = &MetaType> + '_ {
        self.order.iter().filter_map(|id| self.types.get(id))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check that every type carries its kind's required operations.
    pub fn validate(&self) -> Result<(), ReflectError> {
        for meta in self.types() {
            let required = match meta.kind {
                MetaKind::Component => REQUIRED_COMPONENT_OPS,
                MetaKind::Event => REQUIRED_EVENT_OPS,
            };
            if let Some(&missing) = required.iter().find(|name| !meta.supports(name)) {
                return Err(ReflectError::MissingOperation {
                    name: meta.name,
                    op: missing,
                });
            }
        }
        Ok(())
    }

    /// Fold `add_to_view` over `ids` into a fresh view.
    ///
    /// An id that does not resolve makes the whole view empty, the same
    /// result a native view over an unknown component would give.
    pub fn build_view(&self, ids: &[RuntimeTypeId]) -> RuntimeView {
        let mut view = RuntimeView::new();
        for &id in ids {
            let result = self.invoke(id, op::ADD_TO_VIEW, MetaTarget::View(&mut view), Vec::new());
            if result.is_empty() {
                view.include(TypeId::of::<Unresolved>());
            }
        }
        view
    }

    /// Fold `exclude_from_view` over `ids`. Unresolved ids exclude nothing.
    pub fn exclude(&self, view: &mut RuntimeView, ids: &[RuntimeTypeId]) {
        for &id in ids {
            self.invoke(id, op::EXCLUDE_FROM_VIEW, MetaTarget::View(view), Vec::new());
        }
    }
}
