//! Entity handles and the slot allocator behind them.
//!
//! An [`Entity`] is an `(index, generation)` pair. The registry keys every
//! component storage by `index`; `generation` tells a live handle from a
//! stale one that happens to share the slot:
//!
//! ```text
//! create  → 3v0
//! destroy → slot 3 generation becomes 1, 3v0 is now stale
//! create  → 3v1   (once slot 3 comes back round)
//! ```
//!
//! Freed slots are reused oldest-first, so a destroyed handle's slot sits
//! idle while every other free slot is used. A slot whose generation would
//! wrap is retired instead of reused.

use std::collections::VecDeque;
use std::fmt;

/// Handle to an entity in a [`Registry`](super::registry::Registry).
///
/// Plain `Copy` data: equal iff index and generation match, and it never
/// keeps the entity's components alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl Entity {
    /// Storage slot. Shared with earlier, destroyed entities.
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[derive(Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

pub(crate) struct EntityAllocator {
    slots: Vec<Slot>,
    /// Dead slots waiting for reuse, oldest first.
    free: VecDeque<u32>,
    live: usize,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            live: 0,
        }
    }

    pub fn allocate(&mut self) -> Entity {
        self.live += 1;
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            return Entity {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).expect("entity slots exhausted");
        self.slots.push(Slot {
            generation: 0,
            alive: true,
        });
        Entity { index, generation: 0 }
    }

    /// Returns `false` for a stale or already freed handle.
    pub fn deallocate(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.index as usize];
        slot.alive = false;
        self.live -= 1;
        // On overflow the slot is retired: never freed, never matched again.
        if let Some(next) = slot.generation.checked_add(1) {
            slot.generation = next;
            self.free.push_back(entity.index);
        }
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.index as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation)
    }

    pub fn alive_count(&self) -> usize {
        self.live
    }

    /// Live entities in slot order. Scene saves rely on this order.
    pub fn alive(&self) -> Vec<Entity> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_start_at_generation_zero() {
        let mut slots = EntityAllocator::new();
        let a = slots.allocate();
        let b = slots.allocate();
        assert_eq!((a.index(), a.generation()), (0, 0));
        assert_eq!((b.index(), b.generation()), (1, 0));
        assert_eq!(format!("{b:?}"), "Entity(1v0)");
    }

    #[test]
    fn destroyed_handle_stays_stale_after_reuse() {
        let mut slots = EntityAllocator::new();
        let old = slots.allocate();
        assert!(slots.deallocate(old));
        assert!(!slots.deallocate(old));

        let new = slots.allocate();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.generation(), 1);
        assert!(slots.is_alive(new));
        assert!(!slots.is_alive(old));
    }

    #[test]
    fn oldest_free_slot_is_reused_first() {
        let mut slots = EntityAllocator::new();
        let a = slots.allocate();
        let b = slots.allocate();
        let c = slots.allocate();
        slots.deallocate(b);
        slots.deallocate(a);
        slots.deallocate(c);
        let order: Vec<u32> = (0..3).map(|_| slots.allocate().index()).collect();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn exhausted_slot_is_retired() {
        let mut slots = EntityAllocator::new();
        let e = slots.allocate();
        slots.slots[0].generation = u32::MAX;
        let last = Entity {
            index: e.index,
            generation: u32::MAX,
        };
        assert!(slots.deallocate(last));
        assert!(slots.free.is_empty());
        assert_eq!(slots.allocate().index(), 1);
    }

    #[test]
    fn alive_is_in_slot_order() {
        let mut slots = EntityAllocator::new();
        let a = slots.allocate();
        let b = slots.allocate();
        let c = slots.allocate();
        slots.deallocate(b);
        assert_eq!(slots.alive(), vec![a, c]);
        assert_eq!(slots.alive_count(), 2);

        let d = slots.allocate();
        assert_eq!(slots.alive(), vec![a, d, c]);
        assert_eq!(slots.alive_count(), 3);
    }
}
