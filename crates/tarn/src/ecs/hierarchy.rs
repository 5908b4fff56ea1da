//! # Entity Hierarchies — Intrusive Parent/Child Links
//!
//! Every entity created by the registry carries a [`Relationship`]
//! component. The tree lives entirely inside those components: no node
//! allocations, no second ownership graph, and every link is a
//! generation-checked [`Entity`].
//!
//! ```text
//!            parent
//!              │ first_child
//!              ▼
//!   child0 ⇄ child1 ⇄ child2      (prev_sibling / next_sibling)
//!     │         │        │
//!     └─────────┴────────┴──► parent
//! ```
//!
//! Invariants kept by every operation here:
//!
//! - `self_entity` equals the owning entity.
//! - a child is reachable from `parent.first_child` via `next_sibling`.
//! - a parent's child list never contains an entity twice.
//! - roots have `parent == None`.
//!
//! Edit the tree only through these methods; writing the fields directly
//! breaks the invariants above.
//!
//! ## Usage
//!
//! ```ignore
//! let parent = registry.create_entity("ship", "");
//! let turret = registry.create_entity("turret", "");
//! registry.add_child(parent, turret);
//! registry.add(parent, Transform::from_xy(100.0, 50.0));
//! registry.add(turret, Transform::from_xy(10.0, 0.0));
//!
//! propagate_transforms(&mut registry);
//! // turret's GlobalTransform now sits at (110, 50)
//! ```

use std::any::TypeId;

use crate::components::Transform;
use crate::math::Affine2;

use super::entity::Entity;
use super::registry::{Identification, Registry};

/// Parent, first child and sibling links of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship {
    pub self_entity: Entity,
    pub parent: Option<Entity>,
    pub first_child: Option<Entity>,
    pub prev_sibling: Option<Entity>,
    pub next_sibling: Option<Entity>,
}

impl Relationship {
    /// A root with no children.
    pub fn new(self_entity: Entity) -> Self {
        Self {
            self_entity,
            parent: None,
            first_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

impl Registry {
    fn relationship_mut(&mut self, entity: Entity) -> &mut Relationship {
        if !self.has::<Relationship>(entity) {
            self.add_or_replace(entity, Relationship::new(entity));
        }
        self.get_mut::<Relationship>(entity)
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.try_get::<Relationship>(entity)?.parent
    }

    /// Direct children in sibling order.
    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        let mut children = Vec::new();
        let mut cursor = self
            .try_get::<Relationship>(entity)
            .and_then(|rel| rel.first_child);
        while let Some(child) = cursor {
            children.push(child);
            cursor = self
                .try_get::<Relationship>(child)
                .and_then(|rel| rel.next_sibling);
        }
        children
    }

    /// Alive entities without a parent, in slot order.
    pub fn roots(&self) -> Vec<Entity> {
        self.entities()
            .into_iter()
            .filter(|&entity| self.parent(entity).is_none())
            .collect()
    }

    /// Returns `true` if `ancestor` appears on `entity`'s parent chain.
    /// An entity is not its own ancestor.
    pub fn is_ancestor_of(&self, ancestor: Entity, entity: Entity) -> bool {
        let mut cursor = self.parent(entity);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Make `child` the last child of `parent`.
    ///
    /// `child` is first unlinked from wherever it was. Returns `false` (and
    /// changes nothing) if either entity is dead, or if the link would make
    /// a cycle: `child == parent` or `child` is an ancestor of `parent`.
    pub fn add_child(&mut self, parent: Entity, child: Entity) -> bool {
        debug_assert!(
            self.is_alive(parent) && self.is_alive(child),
            "add_child on dead entity ({parent:?} -> {child:?})"
        );
        if !self.is_alive(parent) || !self.is_alive(child) {
            return false;
        }
        if parent == child || self.is_ancestor_of(child, parent) {
            log::warn!("add_child rejected: {child:?} under {parent:?} would form a cycle");
            return false;
        }

        self.detach(child);

        // Full walk to the tail of the child list.
        match self.children(parent).last().copied() {
            Some(tail) => {
                self.relationship_mut(tail).next_sibling = Some(child);
                self.relationship_mut(child).prev_sibling = Some(tail);
            }
            None => self.relationship_mut(parent).first_child = Some(child),
        }
        self.relationship_mut(child).parent = Some(parent);
        true
    }

    /// Unlink `entity` from its parent and siblings, making it a root. Its
    /// own children stay attached.
    pub fn detach(&mut self, entity: Entity) {
        let Some(rel) = self.try_get::<Relationship>(entity).copied() else {
            return;
        };

        match rel.prev_sibling {
            // Middle or last sibling.
            Some(prev) => {
                if let Some(prev_rel) = self.try_get_mut::<Relationship>(prev) {
                    prev_rel.next_sibling = rel.next_sibling;
                }
            }
            // First child.
            None => {
                if let Some(parent_rel) = rel.parent.and_then(|p| self.try_get_mut::<Relationship>(p)) {
                    if parent_rel.first_child == Some(entity) {
                        parent_rel.first_child = rel.next_sibling;
                    }
                }
            }
        }
        if let Some(next_rel) = rel.next_sibling.and_then(|n| self.try_get_mut::<Relationship>(n)) {
            next_rel.prev_sibling = rel.prev_sibling;
        }

        if let Some(own) = self.try_get_mut::<Relationship>(entity) {
            own.parent = None;
            own.prev_sibling = None;
            own.next_sibling = None;
        }
    }

    /// Turn every child of `entity` into a root.
    pub(crate) fn orphan_children(&mut self, entity: Entity) {
        for child in self.children(entity) {
            if let Some(rel) = self.try_get_mut::<Relationship>(child) {
                rel.parent = None;
                rel.prev_sibling = None;
                rel.next_sibling = None;
            }
        }
        if let Some(rel) = self.try_get_mut::<Relationship>(entity) {
            rel.first_child = None;
        }
    }

    /// Destroy `entity` and its whole subtree, children before parents.
    ///
    /// Returns the name of every destroyed entity in destruction order, so
    /// name-keyed collaborators can drop their entries.
    pub fn remove_and_destroy(&mut self, entity: Entity) -> Vec<String> {
        debug_assert!(self.is_alive(entity), "remove_and_destroy on dead entity {entity:?}");
        let mut removed = Vec::new();
        if self.is_alive(entity) {
            self.remove_subtree(entity, &mut removed);
        }
        removed
    }

    fn remove_subtree(&mut self, entity: Entity, removed: &mut Vec<String>) {
        for child in self.children(entity) {
            self.remove_subtree(child, removed);
        }
        removed.push(
            self.name_of(entity)
                .map(str::to_string)
                .unwrap_or_else(|| entity.to_string()),
        );
        // `destroy` patches the entity out of its parent's child list.
        self.destroy(entity);
    }

    /// Deep-copy `source` and its subtree.
    ///
    /// Every component except [`Identification`] and [`Relationship`] is
    /// cloned. Copies get fresh names derived from the originals and keep
    /// the source's child order. The copied root is attached under
    /// `new_parent`, or left as a root if there is none or it is dead.
    ///
    /// The subtree is read in full before the first copy exists, so
    /// `new_parent` may be `source` itself or one of its descendants.
    pub fn duplicate_recursive(&mut self, source: Entity, new_parent: Option<Entity>) -> Option<Entity> {
        debug_assert!(self.is_alive(source), "duplicate_recursive on dead entity {source:?}");
        if !self.is_alive(source) {
            return None;
        }

        // Pre-order, each node paired with the position of its parent.
        let mut nodes: Vec<(Entity, Option<usize>)> = Vec::new();
        let mut stack = vec![(source, None)];
        while let Some((entity, parent)) = stack.pop() {
            let position = nodes.len();
            nodes.push((entity, parent));
            for child in self.children(entity).into_iter().rev() {
                stack.push((child, Some(position)));
            }
        }

        let mut copies: Vec<Entity> = Vec::with_capacity(nodes.len());
        for (original, parent) in nodes {
            let (name, group) = self
                .try_get::<Identification>(original)
                .map(|id| (id.name.clone(), id.group.clone()))
                .unwrap_or_default();
            let copy = self.create_entity(&name, &group);
            self.clone_components(
                original,
                copy,
                &[TypeId::of::<Identification>(), TypeId::of::<Relationship>()],
            );
            if let Some(position) = parent {
                self.add_child(copies[position], copy);
            }
            copies.push(copy);
        }

        let root = copies[0];
        match new_parent {
            Some(parent) if self.is_alive(parent) => {
                self.add_child(parent, root);
            }
            Some(parent) => log::warn!("duplicate of {source:?}: parent {parent:?} is dead, copy left as a root"),
            None => {}
        }
        Some(root)
    }

    /// Pre-order walk: `f(root)`, then each child subtree in sibling order.
    ///
    /// The child list of a node is read after `f` has run on it.
    pub fn apply_to_hierarchy<F: FnMut(&mut Registry, Entity)>(&mut self, root: Entity, mut f: F) {
        self.apply_pre_order(root, &mut f);
    }

    fn apply_pre_order<F: FnMut(&mut Registry, Entity)>(&mut self, entity: Entity, f: &mut F) {
        if !self.is_alive(entity) {
            return;
        }
        f(self, entity);
        for child in self.children(entity) {
            self.apply_pre_order(child, f);
        }
    }
}

/// The world-space transform computed by [`propagate_transforms`].
///
/// For roots this equals the local [`Transform`]. For children it is
/// `parent_global * child_local`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform(pub Affine2);

impl Default for GlobalTransform {
    fn default() -> Self {
        Self(Affine2::IDENTITY)
    }
}

/// Propagate local transforms down the entity hierarchy.
///
/// Entities with a `Transform` get a `GlobalTransform`. An entity without
/// one inherits its parent's global transform unchanged. Parents are always
/// computed before their children.
pub fn propagate_transforms(registry: &mut Registry) {
    for root in registry.roots() {
        registry.apply_to_hierarchy(root, |registry, entity| {
            let parent_global = registry
                .parent(entity)
                .and_then(|parent| registry.try_get::<GlobalTransform>(parent))
                .map(|global| global.0);
            let local = registry.try_get::<Transform>(entity).map(Transform::matrix);

            let global = match (parent_global, local) {
                (Some(parent), Some(local)) => parent * local,
                (Some(parent), None) => parent,
                (None, Some(local)) => local,
                (None, None) => {
                    registry.remove::<GlobalTransform>(entity);
                    return;
                }
            };
            registry.add_or_replace(entity, GlobalTransform(global));
        });
    }
}
