//! Entity identity and lifecycle.
//!
//! An [`EntityId`] is a 64-bit handle packing a *generation* counter in the
//! high 32 bits and a storage *index* in the low 32 bits. The
//! [`EntityManager`] owns the liveness table: a handle is alive iff the
//! generation recorded for its index matches the handle's generation and the
//! slot has not been freed. Destroying an entity bumps the slot generation,
//! so every previously issued handle to that index goes stale immediately.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`. Plain value type with no
/// ownership semantics; holding one does not keep the entity alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Construct an `EntityId` from an index and a generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The storage index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation counter (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityManager
// ---------------------------------------------------------------------------

/// Allocates, recycles, and validates [`EntityId`]s.
///
/// Freed indices wait in a FIFO queue before reuse so generation bumps are
/// spread across slots instead of concentrating on whichever index was freed
/// last.
///
/// Destroying an entity does NOT strip its components; the orchestrator must
/// remove the entity from every storage before the index can be recycled
/// (see [`ComponentManager::destroy_entity`](crate::manager::ComponentManager::destroy_entity)).
#[derive(Debug, Default)]
pub struct EntityManager {
    /// Current generation for each index slot.
    generations: Vec<u32>,
    /// Whether the slot currently backs a live entity.
    alive: Vec<bool>,
    /// Recyclable indices, oldest first.
    free_indices: VecDeque<u32>,
}

impl EntityManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            alive: Vec::new(),
            free_indices: VecDeque::new(),
        }
    }

    /// Allocate a fresh entity.
    ///
    /// Reuses a freed index when one is available (its generation was already
    /// bumped at destroy time), otherwise appends a new slot at generation 0.
    ///
    /// # Panics
    ///
    /// Panics if the 32-bit index space is exhausted. That is a resource
    /// configuration failure, not a recoverable runtime condition.
    pub fn create(&mut self) -> EntityId {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            return EntityId::new(index, self.generations[index as usize]);
        }
        assert!(
            self.generations.len() < u32::MAX as usize,
            "entity index space exhausted ({} slots)",
            self.generations.len()
        );
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        EntityId::new(index, 0)
    }

    /// Destroy an entity, invalidating every outstanding handle to its index.
    ///
    /// Destruction is idempotent: a stale or never-issued handle is a no-op
    /// and returns `false`. On success the slot generation is bumped and the
    /// index joins the free list.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    /// Whether `id` refers to a currently live entity. O(1), never fails.
    pub fn is_alive(&self, id: EntityId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len()
            && self.alive[idx]
            && self.generations[idx] == id.generation()
    }

    /// Number of currently live entities.
    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }

    /// Iterate the handles of all currently live entities, in index order.
    pub fn iter_live(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &alive)| alive)
            .map(|(idx, _)| EntityId::new(idx as u32, self.generations[idx]))
    }

    /// Capture the full allocator state for snapshot support.
    ///
    /// Returns `(generations, alive, free_indices)` as owned vectors, with
    /// the free list in FIFO order.
    pub(crate) fn snapshot_state(&self) -> (Vec<u32>, Vec<bool>, Vec<u32>) {
        let free: Vec<u32> = self.free_indices.iter().copied().collect();
        (self.generations.clone(), self.alive.clone(), free)
    }

    /// Rebuild a manager from previously captured state, preserving
    /// generations, alive flags, and free-list order exactly.
    pub(crate) fn restore_state(
        generations: Vec<u32>,
        alive: Vec<bool>,
        free_indices: Vec<u32>,
    ) -> Self {
        Self {
            generations,
            alive,
            free_indices: VecDeque::from(free_indices),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_ids_have_unique_indices() {
        let mut entities = EntityManager::new();
        let ids: Vec<EntityId> = (0..64).map(|_| entities.create()).collect();
        let mut indices: Vec<u32> = ids.iter().map(|id| id.index()).collect();
        indices.sort();
        indices.dedup();
        assert_eq!(indices.len(), 64);
    }

    #[test]
    fn destroy_then_create_reuses_index_with_higher_generation() {
        let mut entities = EntityManager::new();
        let e0 = entities.create();
        assert_eq!(e0.generation(), 0);
        assert!(entities.destroy(e0));

        let e1 = entities.create();
        assert_eq!(e1.index(), e0.index());
        assert_eq!(e1.generation(), 1);
    }

    #[test]
    fn stale_handle_never_becomes_alive_again() {
        let mut entities = EntityManager::new();
        let e0 = entities.create();
        assert!(entities.is_alive(e0));
        entities.destroy(e0);
        assert!(!entities.is_alive(e0));

        // Recycling the index must not resurrect the old handle.
        let e1 = entities.create();
        assert_eq!(e1.index(), e0.index());
        assert!(entities.is_alive(e1));
        assert!(!entities.is_alive(e0));
    }

    #[test]
    fn destroy_is_idempotent() {
        let mut entities = EntityManager::new();
        let e = entities.create();
        assert!(entities.destroy(e));
        assert!(!entities.destroy(e));
        assert!(!entities.destroy(EntityId::new(999, 0)));
    }

    #[test]
    fn free_list_is_fifo() {
        let mut entities = EntityManager::new();
        let a = entities.create();
        let b = entities.create();
        entities.destroy(a);
        entities.destroy(b);
        // Oldest freed index comes back first.
        assert_eq!(entities.create().index(), a.index());
        assert_eq!(entities.create().index(), b.index());
    }

    #[test]
    fn alive_count_tracks_lifecycle() {
        let mut entities = EntityManager::new();
        let e0 = entities.create();
        let _e1 = entities.create();
        assert_eq!(entities.alive_count(), 2);
        entities.destroy(e0);
        assert_eq!(entities.alive_count(), 1);
    }

    #[test]
    fn entity_id_raw_roundtrip() {
        let id = EntityId::new(42, 7);
        assert_eq!(id.index(), 42);
        assert_eq!(id.generation(), 7);
        assert_eq!(EntityId::from_raw(id.to_raw()), id);
    }

    #[test]
    fn snapshot_state_roundtrip() {
        let mut entities = EntityManager::new();
        let e0 = entities.create();
        let e1 = entities.create();
        let _e2 = entities.create();
        entities.destroy(e0);

        let (generations, alive, free) = entities.snapshot_state();
        let restored = EntityManager::restore_state(generations, alive, free);
        assert!(!restored.is_alive(e0));
        assert!(restored.is_alive(e1));
        assert_eq!(restored.alive_count(), 2);
    }
}
