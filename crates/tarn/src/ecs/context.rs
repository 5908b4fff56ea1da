//! # Context Store — Registry-Wide Singletons
//!
//! Context entries are "global" data that belong to the registry rather than
//! to any entity: the asset watcher, a physics world handle, the active
//! camera, the music player. Any code holding the registry can reach them by
//! type alone.
//!
//! Unlike components, a type may be registered at most once. A second
//! [`add`](ContextStore::add) is a configuration error and is reported to the
//! caller so startup can abort.

use std::any::{Any, TypeId};
use std::collections::HashMap;

/// Raised when a context type is registered twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("context `{type_name}` is already registered")]
pub struct ContextError {
    pub type_name: &'static str,
}

/// Type-keyed map of singleton values.
#[derive(Default)]
pub struct ContextStore {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a singleton. Fails if a value of this type is already present.
    pub fn add<T: 'static + Send + Sync>(&mut self, value: T) -> Result<&mut T, ContextError> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(TypeId::of::<T>()) {
            Entry::Occupied(_) => Err(ContextError {
                type_name: std::any::type_name::<T>(),
            }),
            Entry::Vacant(slot) => {
                log::debug!("context registered: {}", std::any::type_name::<T>());
                let boxed = slot.insert(Box::new(value));
                Ok(boxed
                    .downcast_mut::<T>()
                    .expect("context entry keyed by its own TypeId"))
            }
        }
    }

    /// Get a shared reference to a singleton.
    ///
    /// # Panics
    ///
    /// Panics if the type was never added.
    pub fn get<T: 'static + Send + Sync>(&self) -> &T {
        self.try_get::<T>().unwrap_or_else(|| {
            panic!(
                "Context `{}` not found. Did you forget to add it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// Get a mutable reference to a singleton.
    ///
    /// # Panics
    ///
    /// Panics if the type was never added.
    pub fn get_mut<T: 'static + Send + Sync>(&mut self) -> &mut T {
        self.try_get_mut::<T>().unwrap_or_else(|| {
            panic!(
                "Context `{}` not found. Did you forget to add it?",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn try_get<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<T>())
    }

    pub fn try_get_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.entries
            .get_mut(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_mut::<T>())
    }

    pub fn contains<T: 'static + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Take a singleton out, e.g. to use it while also borrowing the registry.
    /// Re-adding it afterwards is not a duplicate.
    pub fn remove<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
