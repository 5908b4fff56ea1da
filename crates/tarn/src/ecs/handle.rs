//! Entity handles: an [`Entity`] paired with the registry it lives in.
//!
//! [`EntityHandle`] borrows the registry mutably and exposes the full typed
//! API plus hierarchy edits. [`EntityRef`] borrows it shared and is `Copy`,
//! so it can be passed around freely during read-only passes.
//!
//! ```ignore
//! registry.spawn("player", "heroes")
//!     .insert(Transform::from_xy(0.0, 0.0))
//!     .insert(Sprite::default());
//! ```
//!
//! Handles do not keep the entity alive. Using one after its entity was
//! destroyed hits the same panics as the registry's typed accessors.

use super::entity::Entity;
use super::registry::Registry;
use super::storage::Component;

/// Mutable handle to one entity.
pub struct EntityHandle<'r> {
    registry: &'r mut Registry,
    entity: Entity,
}

impl<'r> EntityHandle<'r> {
    pub fn new(registry: &'r mut Registry, entity: Entity) -> Self {
        Self { registry, entity }
    }

    pub fn id(&self) -> Entity {
        self.entity
    }

    /// The entity's unique name, or `""` if it has no identification.
    pub fn name(&self) -> &str {
        self.registry.name_of(self.entity).unwrap_or("")
    }

    pub fn group(&self) -> &str {
        self.registry.group_of(self.entity).unwrap_or("")
    }

    pub fn is_alive(&self) -> bool {
        self.registry.is_alive(self.entity)
    }

    /// Add a component, builder style.
    pub fn insert<T: Component>(self, component: T) -> Self {
        self.registry.add(self.entity, component);
        self
    }

    pub fn add<T: Component>(&mut self, component: T) -> &mut T {
        self.registry.add(self.entity, component)
    }

    pub fn add_or_replace<T: Component>(&mut self, component: T) -> &mut T {
        self.registry.add_or_replace(self.entity, component)
    }

    pub fn get<T: Component>(&self) -> &T {
        self.registry.get::<T>(self.entity)
    }

    pub fn get_mut<T: Component>(&mut self) -> &mut T {
        self.registry.get_mut::<T>(self.entity)
    }

    pub fn try_get<T: Component>(&self) -> Option<&T> {
        self.registry.try_get::<T>(self.entity)
    }

    pub fn try_get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.registry.try_get_mut::<T>(self.entity)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.registry.has::<T>(self.entity)
    }

    pub fn remove<T: Component>(&mut self) -> Option<T> {
        self.registry.remove::<T>(self.entity)
    }

    /// Make `child` the last child of this entity.
    pub fn add_child(&mut self, child: Entity) -> bool {
        self.registry.add_child(self.entity, child)
    }

    pub fn parent(&self) -> Option<Entity> {
        self.registry.parent(self.entity)
    }

    pub fn children(&self) -> Vec<Entity> {
        self.registry.children(self.entity)
    }

    /// Deep-copy this entity and its subtree under the same parent.
    pub fn duplicate(&mut self) -> Option<Entity> {
        let parent = self.parent();
        self.registry.duplicate_recursive(self.entity, parent)
    }

    /// Destroy the entity. Its children become roots.
    pub fn kill(self) -> bool {
        self.registry.destroy(self.entity)
    }

    /// Destroy the entity and its subtree. Returns the removed names.
    pub fn kill_recursive(self) -> Vec<String> {
        self.registry.remove_and_destroy(self.entity)
    }

    pub fn registry(&mut self) -> &mut Registry {
        &mut *self.registry
    }

    pub fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef {
            registry: &*self.registry,
            entity: self.entity,
        }
    }
}

impl PartialEq for EntityHandle<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

/// Shared, copyable handle to one entity.
#[derive(Clone, Copy)]
pub struct EntityRef<'r> {
    registry: &'r Registry,
    entity: Entity,
}

impl<'r> EntityRef<'r> {
    pub fn new(registry: &'r Registry, entity: Entity) -> Self {
        Self { registry, entity }
    }

    pub fn id(&self) -> Entity {
        self.entity
    }

    pub fn name(&self) -> &'r str {
        self.registry.name_of(self.entity).unwrap_or("")
    }

    pub fn group(&self) -> &'r str {
        self.registry.group_of(self.entity).unwrap_or("")
    }

    pub fn is_alive(&self) -> bool {
        self.registry.is_alive(self.entity)
    }

    pub fn get<T: Component>(&self) -> &'r T {
        self.registry.get::<T>(self.entity)
    }

    pub fn try_get<T: Component>(&self) -> Option<&'r T> {
        self.registry.try_get::<T>(self.entity)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.registry.has::<T>(self.entity)
    }

    pub fn parent(&self) -> Option<EntityRef<'r>> {
        self.registry
            .parent(self.entity)
            .map(|parent| EntityRef::new(self.registry, parent))
    }

    pub fn children(&self) -> impl Iterator<Item = EntityRef<'r>> + use<'r> {
        let registry = self.registry;
        registry
            .children(self.entity)
            .into_iter()
            .map(move |child| EntityRef::new(registry, child))
    }
}

impl PartialEq for EntityRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl std::fmt::Debug for EntityRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} \"{}\"", self.entity, self.name())
    }
}

impl Registry {
    /// Create an entity and return a handle for adding components.
    pub fn spawn(&mut self, name: &str, group: &str) -> EntityHandle<'_> {
        let entity = self.create_entity(name, group);
        EntityHandle::new(self, entity)
    }

    pub fn entity(&mut self, entity: Entity) -> EntityHandle<'_> {
        EntityHandle::new(self, entity)
    }

    pub fn entity_ref(&self, entity: Entity) -> EntityRef<'_> {
        EntityRef::new(self, entity)
    }
}
