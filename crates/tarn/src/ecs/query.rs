//! # Query — Typed Views Over Component Storages
//!
//! Native systems iterate with compile-time component types:
//!
//! ```text
//! registry.query::<(&Transform, &mut Sprite)>(|entity, (transform, sprite)| {
//!     // mutate sprite, read transform
//! });
//!
//! 1. Compute TypeIds: [Transform, Sprite]
//! 2. Pick the smallest of those storages as the driver.
//! 3. Extract the storages, walk the driver's entities, keep those present
//!    in every other storage (and absent from every excluded one).
//! 4. Restore the storages.
//! ```
//!
//! ## Extract / Restore
//!
//! The closure may not outlive a pass and cannot reach the registry, so it can
//! mutate component values but never add or remove entities mid-iteration.
//! Storages are temporarily removed from the registry's map so that several
//! `&mut` storages can be borrowed at once without aliasing.
//!
//! ## The `QueryParam` Trait
//!
//! Implemented for `&T` and `&mut T`; tuples of params are params, so
//! `(&A, &mut B)` just works. Exclusion filters are plain type tuples
//! implementing [`ComponentSet`].

use std::any::TypeId;
use std::collections::HashMap;

use super::entity::Entity;
use super::registry::Registry;
use super::storage::{Component, ComponentStorage, SparseSet};

type Storages = HashMap<TypeId, Box<dyn ComponentStorage>>;

/// Something fetchable per entity from extracted storages.
pub trait QueryParam {
    /// The item yielded per entity.
    type Item<'w>;

    /// Owned storage data extracted from the registry.
    type Column;

    /// The component TypeIds this parameter needs.
    fn type_ids() -> Vec<TypeId>;

    fn extract(storages: &mut Storages) -> Self::Column;

    fn restore(col: Self::Column, storages: &mut Storages);

    /// Whether `entity` has every component this parameter fetches.
    fn matches(col: &Self::Column, entity: Entity) -> bool;

    /// Fetch the item for `entity`. Only called after [`matches`](Self::matches).
    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_>;
}

fn extract_storage<T: Component>(storages: &mut Storages) -> (TypeId, Box<dyn ComponentStorage>) {
    let tid = TypeId::of::<T>();
    let storage = storages.remove(&tid).unwrap_or_else(|| {
        panic!(
            "Query extract: storage for `{}` not found",
            std::any::type_name::<T>()
        )
    });
    (tid, storage)
}

fn downcast<T: Component>(storage: &mut dyn ComponentStorage) -> &mut SparseSet<T> {
    storage
        .as_any_mut()
        .downcast_mut::<SparseSet<T>>()
        .expect("storage keyed by its own TypeId")
}

/// Shared read access to a component.
impl<T: Component> QueryParam for &T {
    type Item<'w> = &'w T;
    type Column = (TypeId, Box<dyn ComponentStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(storages: &mut Storages) -> Self::Column {
        extract_storage::<T>(storages)
    }

    fn restore(col: Self::Column, storages: &mut Storages) {
        storages.insert(col.0, col.1);
    }

    fn matches(col: &Self::Column, entity: Entity) -> bool {
        col.1.contains(entity)
    }

    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
        downcast::<T>(col.1.as_mut())
            .get(entity)
            .unwrap_or_else(|| panic!("Query fetch: {entity:?} lost its component mid-pass"))
    }
}

/// Exclusive write access to a component.
impl<T: Component> QueryParam for &mut T {
    type Item<'w> = &'w mut T;
    type Column = (TypeId, Box<dyn ComponentStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(storages: &mut Storages) -> Self::Column {
        extract_storage::<T>(storages)
    }

    fn restore(col: Self::Column, storages: &mut Storages) {
        storages.insert(col.0, col.1);
    }

    fn matches(col: &Self::Column, entity: Entity) -> bool {
        col.1.contains(entity)
    }

    fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
        downcast::<T>(col.1.as_mut())
            .get_mut(entity)
            .unwrap_or_else(|| panic!("Query fetch: {entity:?} lost its component mid-pass"))
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type Column = ($($P::Column,)+);

            fn type_ids() -> Vec<TypeId> {
                let mut ids = Vec::new();
                $(ids.extend($P::type_ids());)+
                ids
            }

            #[allow(non_snake_case)]
            fn extract(storages: &mut Storages) -> Self::Column {
                ($($P::extract(storages),)+)
            }

            #[allow(non_snake_case)]
            fn restore(col: Self::Column, storages: &mut Storages) {
                let ($($P,)+) = col;
                $($P::restore($P, storages);)+
            }

            #[allow(non_snake_case)]
            fn matches(col: &Self::Column, entity: Entity) -> bool {
                let ($($P,)+) = col;
                true $(&& $P::matches($P, entity))+
            }

            #[allow(non_snake_case)]
            fn fetch(col: &mut Self::Column, entity: Entity) -> Self::Item<'_> {
                let ($($P,)+) = col;
                ($($P::fetch($P, entity),)+)
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);

/// A set of component types used as an exclusion filter.
pub trait ComponentSet {
    fn type_ids() -> Vec<TypeId>;
}

impl ComponentSet for () {
    fn type_ids() -> Vec<TypeId> {
        Vec::new()
    }
}

macro_rules! impl_component_set_tuple {
    ($($C:ident),+) => {
        impl<$($C: Component),+> ComponentSet for ($($C,)+) {
            fn type_ids() -> Vec<TypeId> {
                vec![$(TypeId::of::<$C>()),+]
            }
        }
    };
}

impl_component_set_tuple!(A);
impl_component_set_tuple!(A, B);
impl_component_set_tuple!(A, B, C);
impl_component_set_tuple!(A, B, C, D);

impl Registry {
    /// Call `f` for every entity that has all components in `Q`.
    ///
    /// ```ignore
    /// registry.query::<(&Transform, &mut Sprite)>(|entity, (t, s)| { ... });
    /// ```
    pub fn query<Q: QueryParam>(&mut self, f: impl FnMut(Entity, Q::Item<'_>)) {
        self.query_excluding::<Q, ()>(f);
    }

    /// Like [`query`](Self::query), skipping entities that have any of the
    /// components in `X`.
    ///
    /// ```ignore
    /// registry.query_excluding::<(&mut Transform,), (Physics,)>(|_, (t,)| { ... });
    /// ```
    pub fn query_excluding<Q: QueryParam, X: ComponentSet>(
        &mut self,
        mut f: impl FnMut(Entity, Q::Item<'_>),
    ) {
        let required = Q::type_ids();
        for (i, tid) in required.iter().enumerate() {
            assert!(
                !required[..i].contains(tid),
                "Query `{}` requests the same component twice",
                std::any::type_name::<Q>()
            );
        }

        // A missing storage means no entity can match.
        let Some(driver) = required
            .iter()
            .map(|tid| self.storages.get(tid).map(|s| s.as_ref()))
            .collect::<Option<Vec<_>>>()
            .and_then(|storages| storages.into_iter().min_by_key(|s| s.len()))
            .map(|s| s.entities().to_vec())
        else {
            return;
        };

        let excluded: Vec<TypeId> = X::type_ids()
            .into_iter()
            .filter(|tid| !required.contains(tid))
            .collect();

        let mut cols = Q::extract(&mut self.storages);
        for entity in driver {
            if !Q::matches(&cols, entity) {
                continue;
            }
            if excluded
                .iter()
                .any(|tid| self.storages.get(tid).is_some_and(|s| s.contains(entity)))
            {
                continue;
            }
            f(entity, Q::fetch(&mut cols, entity));
        }
        Q::restore(cols, &mut self.storages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pos(f32);
    #[derive(Debug, Clone, PartialEq)]
    struct Vel(f32);
    #[derive(Debug, Clone)]
    struct Frozen;

    #[test]
    fn query_intersects_storages() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        let b = registry.create_entity("b", "");
        let c = registry.create_entity("c", "");
        registry.add(a, Pos(0.0));
        registry.add(a, Vel(1.0));
        registry.add(b, Pos(0.0));
        registry.add(c, Vel(2.0));

        let mut seen = Vec::new();
        registry.query::<(&Pos, &Vel)>(|entity, _| seen.push(entity));
        assert_eq!(seen, vec![a]);
    }

    #[test]
    fn query_mutates_values() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        let b = registry.create_entity("b", "");
        registry.add(a, Pos(0.0));
        registry.add(a, Vel(1.5));
        registry.add(b, Pos(10.0));
        registry.add(b, Vel(-1.0));

        registry.query::<(&mut Pos, &Vel)>(|_, (pos, vel)| pos.0 += vel.0);
        assert_eq!(registry.get::<Pos>(a), &Pos(1.5));
        assert_eq!(registry.get::<Pos>(b), &Pos(9.0));
        // Storages are restored after the pass.
        assert!(registry.has::<Vel>(a));
    }

    #[test]
    fn query_excluding_skips_filtered() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        let b = registry.create_entity("b", "");
        registry.add(a, Pos(0.0));
        registry.add(b, Pos(0.0));
        registry.add(b, Frozen);

        let mut seen = Vec::new();
        registry.query_excluding::<(&Pos,), (Frozen,)>(|entity, _| seen.push(entity));
        assert_eq!(seen, vec![a]);
    }

    #[test]
    fn query_missing_storage_yields_nothing() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        registry.add(a, Pos(0.0));
        let mut count = 0;
        registry.query::<(&Pos, &Vel)>(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    #[should_panic(expected = "same component twice")]
    fn duplicate_param_panics() {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        registry.add(a, Pos(0.0));
        registry.query::<(&Pos, &mut Pos)>(|_, _| {});
    }
}
