//! # Registry — The Central Container
//!
//! The [`Registry`] owns every live entity, every component storage and the
//! context store. It is the single source of truth for game state; entity
//! handles, relationship links and views only ever point into it.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Registry                                             │
//! │                                                      │
//! │  allocator: generational entity slots                │
//! │                                                      │
//! │  storages: HashMap<TypeId, Box<dyn ComponentStorage>>│
//! │    one SparseSet<T> per component type               │
//! │                                                      │
//! │  context: ContextStore                               │
//! │    one value per type, not tied to an entity         │
//! │                                                      │
//! │  names:  name  → entity   (unique)                   │
//! │  groups: group → entities                            │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contract
//!
//! Typed access is the hot path and does not return `Result`. Asking for a
//! component that is not there ([`get`](Registry::get)) or adding one that
//! already is ([`add`](Registry::add)) is a programming error and panics.
//! Use [`has`](Registry::has) / [`try_get`](Registry::try_get) when presence
//! is uncertain.
//!
//! There is no internal synchronization. The registry is driven from one
//! thread; background work hands results over through its own locks (see
//! [`asset`](crate::asset)).

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};

use super::context::{ContextError, ContextStore};
use super::entity::{Entity, EntityAllocator};
use super::hierarchy::Relationship;
use super::storage::{Component, ComponentStorage, SparseSet};

/// Name and group of an entity, attached by [`Registry::create_entity`].
///
/// The registry keeps its name and group indices in sync with this
/// component; edit names through the registry, not by mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identification {
    pub name: String,
    pub group: String,
    pub entity_id: u32,
}

/// Name used when an entity is created without one.
pub const DEFAULT_ENTITY_NAME: &str = "GameObject";

/// The central container for all game state.
pub struct Registry {
    allocator: EntityAllocator,
    pub(crate) storages: HashMap<TypeId, Box<dyn ComponentStorage>>,
    context: ContextStore,
    /// Unique name → entity.
    names: HashMap<String, Entity>,
    /// Group → member entities.
    groups: HashMap<String, HashSet<Entity>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            allocator: EntityAllocator::new(),
            storages: HashMap::new(),
            context: ContextStore::new(),
            names: HashMap::new(),
            groups: HashMap::new(),
        }
    }

    // ── Context ─────────────────────────────────────────────────────

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ContextStore {
        &mut self.context
    }

    /// Publish a registry-wide singleton. A second value of the same type is
    /// a configuration error.
    pub fn add_context<T: 'static + Send + Sync>(&mut self, value: T) -> Result<&mut T, ContextError> {
        self.context.add(value)
    }

    /// # Panics
    ///
    /// Panics if the context type was never added.
    pub fn get_context<T: 'static + Send + Sync>(&self) -> &T {
        self.context.get::<T>()
    }

    /// # Panics
    ///
    /// Panics if the context type was never added.
    pub fn get_context_mut<T: 'static + Send + Sync>(&mut self) -> &mut T {
        self.context.get_mut::<T>()
    }

    pub fn try_get_context<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.context.try_get::<T>()
    }

    // ── Entity Management ───────────────────────────────────────────

    /// Create an entity carrying an [`Identification`] and a root
    /// [`Relationship`].
    ///
    /// An empty `name` falls back to [`DEFAULT_ENTITY_NAME`]. Names are
    /// unique: a taken name gets a `_N` suffix.
    pub fn create_entity(&mut self, name: &str, group: &str) -> Entity {
        let entity = self.allocator.allocate();
        let base = if name.is_empty() { DEFAULT_ENTITY_NAME } else { name };
        let name = self.unique_name(base);
        if name != base {
            log::debug!("entity name \"{base}\" taken, using \"{name}\"");
        }

        self.names.insert(name.clone(), entity);
        if !group.is_empty() {
            self.groups.entry(group.to_string()).or_default().insert(entity);
        }

        self.storage_or_create::<Identification>().insert(
            entity,
            Identification {
                name,
                group: group.to_string(),
                entity_id: entity.index,
            },
        );
        self.storage_or_create::<Relationship>()
            .insert(entity, Relationship::new(entity));
        entity
    }

    /// Returns `base` if no entity uses it, otherwise the first free
    /// `base_N`.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.names.contains_key(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Every alive entity in slot order.
    pub fn entities(&self) -> Vec<Entity> {
        self.allocator.alive()
    }

    /// Look an entity up by its unique name.
    pub fn find_by_name(&self, name: &str) -> Option<Entity> {
        self.names.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if no entity has that name.
    pub fn named(&self, name: &str) -> Entity {
        self.find_by_name(name)
            .unwrap_or_else(|| panic!("No entity named \"{name}\""))
    }

    /// All entities in `group`, in no particular order.
    pub fn group_members(&self, group: &str) -> Vec<Entity> {
        self.groups
            .get(group)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The entity's name, if it was created with an [`Identification`].
    pub fn name_of(&self, entity: Entity) -> Option<&str> {
        self.try_get::<Identification>(entity).map(|id| id.name.as_str())
    }

    pub fn group_of(&self, entity: Entity) -> Option<&str> {
        self.try_get::<Identification>(entity).map(|id| id.group.as_str())
    }

    /// Destroy an entity and every component it owns.
    ///
    /// The entity is unlinked from its parent and siblings and its children
    /// become roots, so no surviving [`Relationship`] points at it. Use
    /// [`remove_and_destroy`](Registry::remove_and_destroy) to take the
    /// subtree with it.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.allocator.is_alive(entity) {
            return false;
        }

        self.detach(entity);
        self.orphan_children(entity);

        if let Some(id) = self.try_get::<Identification>(entity) {
            let (name, group) = (id.name.clone(), id.group.clone());
            if self.names.get(&name) == Some(&entity) {
                self.names.remove(&name);
            }
            if let Some(members) = self.groups.get_mut(&group) {
                members.remove(&entity);
                if members.is_empty() {
                    self.groups.remove(&group);
                }
            }
        }

        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        self.allocator.deallocate(entity);
        true
    }

    /// Destroy every entity. Context entries survive.
    pub fn clear(&mut self) {
        for entity in self.allocator.alive() {
            self.allocator.deallocate(entity);
        }
        for storage in self.storages.values_mut() {
            storage.clear();
        }
        self.names.clear();
        self.groups.clear();
    }

    // ── Typed Component Access ──────────────────────────────────────

    /// Attach a component.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead or already has a `T`.
    pub fn add<T: Component>(&mut self, entity: Entity, component: T) -> &mut T {
        assert!(
            self.allocator.is_alive(entity),
            "Cannot add component `{}` to dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        let storage = self.storage_or_create::<T>();
        assert!(
            !storage.contains(entity),
            "Entity {:?} already has component `{}`",
            entity,
            std::any::type_name::<T>()
        );
        storage.insert(entity, component)
    }

    /// Attach a component, replacing any existing `T`.
    ///
    /// # Panics
    ///
    /// Panics if the entity is dead.
    pub fn add_or_replace<T: Component>(&mut self, entity: Entity, component: T) -> &mut T {
        assert!(
            self.allocator.is_alive(entity),
            "Cannot add component `{}` to dead entity {:?}",
            std::any::type_name::<T>(),
            entity
        );
        self.storage_or_create::<T>().insert(entity, component)
    }

    /// # Panics
    ///
    /// Panics if the entity has no `T` (or is dead).
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.try_get::<T>(entity).unwrap_or_else(|| {
            panic!(
                "Entity {:?} has no component `{}`",
                entity,
                std::any::type_name::<T>()
            )
        })
    }

    /// # Panics
    ///
    /// Panics if the entity has no `T` (or is dead).
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.try_get_mut::<T>(entity).unwrap_or_else(|| {
            panic!(
                "Entity {:?} has no component `{}`",
                entity,
                std::any::type_name::<T>()
            )
        })
    }

    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn try_get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|storage| storage.contains(entity))
    }

    /// Detach and return a component. `None` if it was not present.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    // ── Storages ────────────────────────────────────────────────────

    pub fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any().downcast_ref::<SparseSet<T>>())
    }

    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|storage| storage.as_any_mut().downcast_mut::<SparseSet<T>>())
    }

    pub(crate) fn storage_or_create<T: Component>(&mut self) -> &mut SparseSet<T> {
        self.storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::new()))
            .as_any_mut()
            .downcast_mut::<SparseSet<T>>()
            .expect("storage keyed by its own TypeId")
    }

    /// Type-erased storage lookup, used by runtime views.
    pub fn storage_by_type_id(&self, type_id: TypeId) -> Option<&dyn ComponentStorage> {
        self.storages.get(&type_id).map(|storage| storage.as_ref())
    }

    /// Type-erased component lookup, used by the scene serializer.
    pub fn get_any(&self, entity: Entity, type_id: TypeId) -> Option<&dyn Any> {
        self.storages.get(&type_id)?.get_any(entity)
    }

    /// Clone every component of `from` onto `to`, except the listed types.
    pub(crate) fn clone_components(&mut self, from: Entity, to: Entity, skip: &[TypeId]) {
        for (type_id, storage) in self.storages.iter_mut() {
            if !skip.contains(type_id) {
                storage.clone_component(from, to);
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    #[derive(Debug, Clone, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    #[derive(Debug, Clone)]
    struct Health(u32);

    #[test]
    fn create_attaches_identity_and_relationship() {
        let mut registry = Registry::new();
        let e = registry.create_entity("player", "heroes");
        let id = registry.get::<Identification>(e);
        assert_eq!(id.name, "player");
        assert_eq!(id.group, "heroes");
        assert_eq!(id.entity_id, e.index());
        assert_eq!(registry.get::<Relationship>(e).self_entity, e);
        assert_eq!(registry.get::<Relationship>(e).parent, None);
    }

    #[test]
    fn add_get_remove() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.add(e, Position { x: 1.0, y: 2.0 });
        assert!(registry.has::<Position>(e));
        assert!(!registry.has::<Velocity>(e));
        assert_eq!(registry.get::<Position>(e), &Position { x: 1.0, y: 2.0 });

        registry.get_mut::<Position>(e).x = 5.0;
        assert_eq!(registry.remove::<Position>(e), Some(Position { x: 5.0, y: 2.0 }));
        assert!(registry.try_get::<Position>(e).is_none());
        assert_eq!(registry.remove::<Position>(e), None);
    }

    #[test]
    #[should_panic(expected = "already has component")]
    fn add_twice_panics() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.add(e, Health(1));
        registry.add(e, Health(2));
    }

    #[test]
    fn add_or_replace_overwrites() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.add(e, Health(1));
        registry.add_or_replace(e, Health(2));
        assert_eq!(registry.get::<Health>(e).0, 2);
    }

    #[test]
    #[should_panic(expected = "has no component")]
    fn get_absent_panics() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.get::<Velocity>(e);
    }

    #[test]
    #[should_panic(expected = "dead entity")]
    fn add_to_dead_entity_panics() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.destroy(e);
        registry.add(e, Health(1));
    }

    #[test]
    fn destroy_clears_every_storage() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "enemies");
        registry.add(e, Position { x: 0.0, y: 0.0 });
        registry.add(e, Velocity { dx: 1.0, dy: 1.0 });

        assert!(registry.destroy(e));
        assert!(!registry.is_alive(e));
        assert!(!registry.has::<Position>(e));
        assert!(!registry.has::<Velocity>(e));
        assert!(!registry.has::<Identification>(e));
        assert!(!registry.has::<Relationship>(e));
        assert!(registry.find_by_name("a").is_none());
        assert!(registry.group_members("enemies").is_empty());
        assert!(!registry.destroy(e));
    }

    #[test]
    fn recycled_slot_does_not_see_old_components() {
        let mut registry = Registry::new();
        let old = registry.create_entity("old", "");
        registry.add(old, Health(10));
        registry.destroy(old);

        let new = registry.create_entity("new", "");
        assert_eq!(new.index(), old.index());
        assert!(!registry.has::<Health>(new));
        assert!(!registry.has::<Health>(old));
    }

    #[test]
    fn names_are_unique() {
        let mut registry = Registry::new();
        let a = registry.create_entity("crate", "");
        let b = registry.create_entity("crate", "");
        let c = registry.create_entity("", "");
        assert_eq!(registry.name_of(a), Some("crate"));
        assert_eq!(registry.name_of(b), Some("crate_1"));
        assert_eq!(registry.name_of(c), Some(DEFAULT_ENTITY_NAME));
        assert_eq!(registry.named("crate_1"), b);
    }

    #[test]
    #[should_panic(expected = "No entity named")]
    fn named_panics_on_missing() {
        Registry::new().named("ghost");
    }

    #[test]
    fn groups_track_membership() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "enemies");
        let b = registry.create_entity("b", "enemies");
        let _c = registry.create_entity("c", "props");

        let enemies = registry.group_members("enemies");
        assert_eq!(enemies.len(), 2);
        assert!(enemies.contains(&a) && enemies.contains(&b));
        assert_eq!(registry.group_of(a), Some("enemies"));
        assert!(registry.group_members("nobody").is_empty());
    }

    #[test]
    fn clear_invalidates_all_handles() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "g");
        registry.add(a, Health(3));
        registry.add_context(7u32).unwrap();

        registry.clear();
        assert_eq!(registry.entity_count(), 0);
        assert!(!registry.is_alive(a));
        assert!(registry.find_by_name("a").is_none());

        // Fresh entity reuses the slot but not the identity.
        let b = registry.create_entity("a", "");
        assert_ne!(a, b);
        assert!(!registry.has::<Health>(b));
        assert_eq!(*registry.get_context::<u32>(), 7);
    }

    #[test]
    fn context_singleton() {
        let mut registry = Registry::new();
        registry.add_context(String::from("camera")).unwrap();
        assert!(registry.add_context(String::from("other")).is_err());
        assert_eq!(registry.get_context::<String>(), "camera");
        assert!(registry.try_get_context::<u8>().is_none());
    }

    #[test]
    fn erased_lookup() {
        let mut registry = Registry::new();
        let e = registry.create_entity("a", "");
        registry.add(e, Health(9));
        let any = registry.get_any(e, TypeId::of::<Health>()).unwrap();
        assert_eq!(any.downcast_ref::<Health>().unwrap().0, 9);
        assert!(registry.get_any(e, TypeId::of::<Velocity>()).is_none());
    }
}
