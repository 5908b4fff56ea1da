//! # Runtime View — Queries Assembled From Type Ids
//!
//! [`query`](super::registry::Registry::query) needs its component types at
//! compile time. A [`RuntimeView`] is the same filter built from a list of
//! [`TypeId`]s at call time, which is all a dynamic caller (a script, the
//! reflection bridge) can supply.
//!
//! ```text
//! include: [Transform, Sprite]   exclude: [Physics]
//!
//! driver = smallest(include storages)
//! for e in driver.entities():
//!     keep e if every include storage contains e
//!            and no exclude storage contains e
//! ```
//!
//! A view holds no borrows; iteration is lazy and can be restarted by calling
//! [`iter`](RuntimeView::iter) again. An empty include list matches nothing.

use std::any::TypeId;

use super::entity::Entity;
use super::registry::Registry;
use super::storage::{Component, ComponentStorage};

/// Dynamically assembled include/exclude filter over component storages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeView {
    include: Vec<TypeId>,
    exclude: Vec<TypeId>,
}

impl RuntimeView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a component type. Adding the same type twice is harmless.
    pub fn include(&mut self, type_id: TypeId) -> &mut Self {
        if !self.include.contains(&type_id) {
            self.include.push(type_id);
        }
        self
    }

    /// Reject entities that carry a component type.
    pub fn exclude(&mut self, type_id: TypeId) -> &mut Self {
        if !self.exclude.contains(&type_id) {
            self.exclude.push(type_id);
        }
        self
    }

    pub fn include_type<T: Component>(&mut self) -> &mut Self {
        self.include(TypeId::of::<T>())
    }

    pub fn exclude_type<T: Component>(&mut self) -> &mut Self {
        self.exclude(TypeId::of::<T>())
    }

    pub fn includes(&self) -> &[TypeId] {
        &self.include
    }

    pub fn excludes(&self) -> &[TypeId] {
        &self.exclude
    }

    /// Whether `entity` passes the filter.
    pub fn contains(&self, registry: &Registry, entity: Entity) -> bool {
        !self.include.is_empty()
            && self.include.iter().all(|tid| {
                registry
                    .storage_by_type_id(*tid)
                    .is_some_and(|s| s.contains(entity))
            })
            && !self.exclude.iter().any(|tid| {
                registry
                    .storage_by_type_id(*tid)
                    .is_some_and(|s| s.contains(entity))
            })
    }

    fn driver<'r>(&self, registry: &'r Registry) -> Option<&'r dyn ComponentStorage> {
        self.include
            .iter()
            .map(|tid| registry.storage_by_type_id(*tid))
            .collect::<Option<Vec<_>>>()?
            .into_iter()
            .min_by_key(|s| s.len())
    }

    /// Lazily iterate matching entities.
    pub fn iter<'a>(&'a self, registry: &'a Registry) -> impl Iterator<Item = Entity> + 'a {
        self.driver(registry)
            .into_iter()
            .flat_map(|s| s.entities().iter().copied())
            .filter(move |&entity| self.contains(registry, entity))
    }

    /// Call `f` once per matching entity.
    pub fn each(&self, registry: &Registry, mut f: impl FnMut(Entity)) {
        for entity in self.iter(registry) {
            f(entity);
        }
    }

    /// Like [`each`](Self::each), but `f` may mutate the registry.
    ///
    /// The matching set is captured before the first call, so entities the
    /// callback creates are not visited. An entity destroyed by an earlier
    /// callback is skipped.
    pub fn each_mut(&self, registry: &mut Registry, mut f: impl FnMut(&mut Registry, Entity)) {
        for entity in self.entities(registry) {
            if registry.is_alive(entity) {
                f(registry, entity);
            }
        }
    }

    pub fn entities(&self, registry: &Registry) -> Vec<Entity> {
        self.iter(registry).collect()
    }

    pub fn count(&self, registry: &Registry) -> usize {
        self.iter(registry).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Pos;
    #[derive(Clone)]
    struct Vel;
    #[derive(Clone)]
    struct Hidden;

    fn setup() -> (Registry, Entity, Entity, Entity) {
        let mut registry = Registry::new();
        let a = registry.create_entity("a", "");
        let b = registry.create_entity("b", "");
        let c = registry.create_entity("c", "");
        registry.add(a, Pos);
        registry.add(a, Vel);
        registry.add(b, Pos);
        registry.add(c, Pos);
        registry.add(c, Vel);
        registry.add(c, Hidden);
        (registry, a, b, c)
    }

    #[test]
    fn include_intersects() {
        let (registry, a, _b, c) = setup();
        let mut view = RuntimeView::new();
        view.include_type::<Pos>().include_type::<Vel>();
        let mut found = view.entities(&registry);
        found.sort();
        assert_eq!(found, vec![a, c]);
    }

    #[test]
    fn exclude_filters() {
        let (registry, a, b, _c) = setup();
        let mut view = RuntimeView::new();
        view.include_type::<Pos>().exclude_type::<Hidden>();
        let mut found = view.entities(&registry);
        found.sort();
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn restartable() {
        let (registry, ..) = setup();
        let mut view = RuntimeView::new();
        view.include_type::<Pos>();
        assert_eq!(view.count(&registry), 3);
        assert_eq!(view.count(&registry), 3);
    }

    #[test]
    fn empty_and_unknown_match_nothing() {
        let (registry, a, ..) = setup();
        assert_eq!(RuntimeView::new().count(&registry), 0);

        #[derive(Clone)]
        struct Never;
        let mut view = RuntimeView::new();
        view.include_type::<Pos>().include_type::<Never>();
        assert_eq!(view.count(&registry), 0);
        assert!(!view.contains(&registry, a));
    }

    #[test]
    fn each_mut_allows_deferred_structural_changes() {
        let (mut registry, a, b, c) = setup();
        let mut view = RuntimeView::new();
        view.include_type::<Pos>();
        let mut visited = 0;
        view.each_mut(&mut registry, |registry, entity| {
            visited += 1;
            // Destroying a later match is safe: it is skipped.
            if entity == a {
                registry.destroy(b);
                registry.destroy(c);
            }
        });
        assert!(visited >= 1);
        assert!(registry.is_alive(a));
        assert_eq!(view.count(&registry), 1);
    }
}
