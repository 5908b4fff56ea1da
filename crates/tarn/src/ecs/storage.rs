//! # Storage — Per-Type Sparse Sets
//!
//! Each component type gets one [`SparseSet`]: a packed `dense` array of
//! values, a parallel array of the owning entities, and a `sparse` array
//! mapping an entity's slot index to its position in `dense`.
//!
//! ```text
//! sparse:   [None, Some(1), None, Some(0)]   ← indexed by Entity::index
//! dense:    [Pos(3,3), Pos(1,1)]             ← iterated linearly
//! entities: [Entity(3v0), Entity(1v0)]
//! ```
//!
//! Insert, remove and lookup are O(1); removal swaps the last element into
//! the hole so `dense` stays packed. Lookups compare the full handle stored
//! in `entities`, so a stale generation never resolves.
//!
//! The registry only knows storages through the object-safe
//! [`ComponentStorage`] trait, which is how destroy, duplication and runtime
//! views reach every storage without knowing `T`.

use std::any::Any;

use super::entity::Entity;

/// Anything storable as a component: plain, clonable, thread-portable data.
pub trait Component: 'static + Send + Sync + Clone {}

impl<T: 'static + Send + Sync + Clone> Component for T {}

/// Densely packed storage for one component type.
pub struct SparseSet<T> {
    dense: Vec<T>,
    entities: Vec<Entity>,
    sparse: Vec<Option<u32>>,
}

impl<T> SparseSet<T> {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            entities: Vec::new(),
            sparse: Vec::new(),
        }
    }

    fn dense_index(&self, entity: Entity) -> Option<usize> {
        let slot = (*self.sparse.get(entity.index as usize)?)? as usize;
        (self.entities[slot] == entity).then_some(slot)
    }

    /// Returns `true` if `entity` (this exact generation) has a value here.
    pub fn contains(&self, entity: Entity) -> bool {
        self.dense_index(entity).is_some()
    }

    /// Insert or overwrite the value for `entity`, returning the stored value.
    pub fn insert(&mut self, entity: Entity, value: T) -> &mut T {
        let index = entity.index as usize;
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, None);
        }

        if let Some(slot) = self.sparse[index] {
            let slot = slot as usize;
            // A stale generation may still occupy the slot; the new owner wins.
            self.entities[slot] = entity;
            self.dense[slot] = value;
            &mut self.dense[slot]
        } else {
            let slot = self.dense.len();
            self.dense.push(value);
            self.entities.push(entity);
            self.sparse[index] = Some(slot as u32);
            &mut self.dense[slot]
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.dense_index(entity).map(|slot| &self.dense[slot])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.dense_index(entity).map(|slot| &mut self.dense[slot])
    }

    /// Swap-remove the value for `entity`.
    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = self.dense_index(entity)?;
        self.sparse[entity.index as usize] = None;

        let value = self.dense.swap_remove(slot);
        self.entities.swap_remove(slot);

        // Point the moved element's sparse entry at its new home.
        if let Some(moved) = self.entities.get(slot) {
            self.sparse[moved.index as usize] = Some(slot as u32);
        }
        Some(value)
    }

    /// Owning entities in dense order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate `(entity, value)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.dense.iter())
    }

    /// Iterate `(entity, value)` pairs mutably in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities.iter().copied().zip(self.dense.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn clear(&mut self) {
        self.dense.clear();
        self.entities.clear();
        self.sparse.clear();
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of a [`SparseSet`] with its component type erased.
pub trait ComponentStorage: Any + Send + Sync {
    /// Full type name of the stored component (diagnostics, logs).
    fn component_name(&self) -> &'static str;

    fn contains(&self, entity: Entity) -> bool;

    /// Drop the entity's value if present.
    fn remove_entity(&mut self, entity: Entity) -> bool;

    /// Clone `from`'s value onto `to`. Returns `false` if `from` has none.
    fn clone_component(&mut self, from: Entity, to: Entity) -> bool;

    fn entities(&self) -> &[Entity];

    fn len(&self) -> usize;

    fn get_any(&self, entity: Entity) -> Option<&dyn Any>;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentStorage for SparseSet<T> {
    fn component_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn contains(&self, entity: Entity) -> bool {
        SparseSet::contains(self, entity)
    }

    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn clone_component(&mut self, from: Entity, to: Entity) -> bool {
        match self.get(from).cloned() {
            Some(value) => {
                self.insert(to, value);
                true
            }
            None => false,
        }
    }

    fn entities(&self) -> &[Entity] {
        SparseSet::entities(self)
    }

    fn len(&self) -> usize {
        SparseSet::len(self)
    }

    fn get_any(&self, entity: Entity) -> Option<&dyn Any> {
        self.get(entity).map(|value| value as &dyn Any)
    }

    fn clear(&mut self) {
        SparseSet::clear(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: u32, generation: u32) -> Entity {
        Entity { index, generation }
    }

    #[test]
    fn insert_and_get() {
        let mut set = SparseSet::new();
        set.insert(entity(3, 0), 30u32);
        set.insert(entity(1, 0), 10u32);
        assert_eq!(set.get(entity(3, 0)), Some(&30));
        assert_eq!(set.get(entity(1, 0)), Some(&10));
        assert_eq!(set.get(entity(2, 0)), None);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn stale_generation_does_not_resolve() {
        let mut set = SparseSet::new();
        set.insert(entity(0, 0), 1u32);
        assert!(!set.contains(entity(0, 1)));
        assert!(set.get(entity(0, 1)).is_none());
    }

    #[test]
    fn remove_keeps_dense_packed() {
        let mut set = SparseSet::new();
        set.insert(entity(0, 0), 'a');
        set.insert(entity(1, 0), 'b');
        set.insert(entity(2, 0), 'c');

        assert_eq!(set.remove(entity(0, 0)), Some('a'));
        assert_eq!(set.len(), 2);
        // 'c' was swapped into slot 0 and must still resolve.
        assert_eq!(set.get(entity(2, 0)), Some(&'c'));
        assert_eq!(set.get(entity(1, 0)), Some(&'b'));
        assert_eq!(set.entities(), &[entity(2, 0), entity(1, 0)]);
    }

    #[test]
    fn remove_missing_returns_none() {
        let mut set: SparseSet<u8> = SparseSet::new();
        assert_eq!(set.remove(entity(9, 0)), None);
    }

    #[test]
    fn insert_overwrites() {
        let mut set = SparseSet::new();
        set.insert(entity(0, 0), 1u32);
        *set.insert(entity(0, 0), 2u32) += 1;
        assert_eq!(set.get(entity(0, 0)), Some(&3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn erased_clone_component() {
        let mut set = SparseSet::new();
        set.insert(entity(0, 0), String::from("hero"));
        let storage: &mut dyn ComponentStorage = &mut set;
        assert!(storage.clone_component(entity(0, 0), entity(1, 0)));
        assert!(!storage.clone_component(entity(5, 0), entity(6, 0)));
        let set = storage.as_any().downcast_ref::<SparseSet<String>>().unwrap();
        assert_eq!(set.get(entity(1, 0)).map(String::as_str), Some("hero"));
    }

    #[test]
    fn drop_called_on_remove() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Clone)]
        struct Tracked;
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut set = SparseSet::new();
        set.insert(entity(0, 0), Tracked);
        set.insert(entity(1, 0), Tracked);
        set.remove(entity(0, 0));
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);
        drop(set);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 2);
    }
}
