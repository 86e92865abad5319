//! Whole-world snapshot and restore.
//!
//! A [`WorldSnapshot`] captures everything needed to reproduce the entity
//! population exactly: the allocator state (generations, alive flags, free
//! list) and every live entity's [`EntityRecord`]. Restoring replays the
//! snapshot under the original [`EntityId`]s, so handles serialized alongside
//! the world stay valid after a load.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::entity::{EntityId, EntityManager};
use crate::manager::{ComponentManager, EntityRecord};
use crate::registry::{ComponentLoaderRegistry, ComponentSerializerRegistry};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Serializable state of the [`EntityManager`]'s allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorSnapshot {
    /// Per-index generation counters.
    pub generations: Vec<u32>,
    /// Per-index alive flags.
    pub alive: Vec<bool>,
    /// Free-list indices in FIFO order.
    pub free_indices: Vec<u32>,
}

/// One entity in a snapshot: its exact handle plus its component record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// The entity's handle (index and generation).
    pub entity_id: EntityId,
    /// The entity's components as persisted name-and-payload pairs.
    pub record: EntityRecord,
}

/// A complete, serializable snapshot of entity and component state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Allocator state.
    pub allocator: AllocatorSnapshot,
    /// Every live entity, sorted by handle for deterministic output.
    pub entities: Vec<EntitySnapshot>,
}

// ---------------------------------------------------------------------------
// Capture / restore
// ---------------------------------------------------------------------------

/// Capture a snapshot of the whole world.
///
/// Serializes every live entity via the serializer registry. Component types
/// without a serializer make this fail rather than silently dropping data.
///
/// # Errors
///
/// Returns [`EcsError::UnregisteredType`] or a serializer hook's own error
/// if any live entity's component cannot be serialized.
pub fn capture_snapshot(
    entities: &EntityManager,
    components: &ComponentManager,
    serializers: &ComponentSerializerRegistry,
) -> Result<WorldSnapshot, EcsError> {
    let (generations, alive, free_indices) = entities.snapshot_state();

    let mut snapshots = Vec::with_capacity(entities.alive_count());
    for entity in entities.iter_live() {
        let record = components.serialize_entity(entities, entity, serializers)?;
        snapshots.push(EntitySnapshot {
            entity_id: entity,
            record,
        });
    }
    snapshots.sort_by_key(|e| e.entity_id.to_raw());

    Ok(WorldSnapshot {
        allocator: AllocatorSnapshot {
            generations,
            alive,
            free_indices,
        },
        entities: snapshots,
    })
}

/// Validate a snapshot's internal consistency before any state is touched.
fn validate_snapshot(snapshot: &WorldSnapshot) -> Result<(), EcsError> {
    let allocator = &snapshot.allocator;
    let inconsistent = |details: String| EcsError::Deserialization {
        component: "allocator".to_owned(),
        details,
    };

    if allocator.generations.len() != allocator.alive.len() {
        return Err(inconsistent(format!(
            "{} generations vs {} alive flags",
            allocator.generations.len(),
            allocator.alive.len()
        )));
    }

    let mut seen = HashSet::new();
    for &free_idx in &allocator.free_indices {
        let Some(&alive) = allocator.alive.get(free_idx as usize) else {
            return Err(inconsistent(format!(
                "free index {} out of bounds ({} slots)",
                free_idx,
                allocator.alive.len()
            )));
        };
        if alive {
            return Err(inconsistent(format!(
                "free list contains index {free_idx} which is marked alive"
            )));
        }
        if !seen.insert(free_idx) {
            return Err(inconsistent(format!(
                "free list contains duplicate index {free_idx}"
            )));
        }
    }

    // Alive slots and snapshot entities must match one-to-one, with the
    // generation the allocator recorded for the slot.
    let entity_indices: HashSet<u32> = snapshot
        .entities
        .iter()
        .map(|e| e.entity_id.index())
        .collect();
    for (idx, &is_alive) in allocator.alive.iter().enumerate() {
        let has_entity = entity_indices.contains(&(idx as u32));
        if is_alive && !has_entity {
            return Err(inconsistent(format!(
                "slot {idx} is marked alive but has no entity in the snapshot"
            )));
        }
        if !is_alive && has_entity {
            return Err(inconsistent(format!(
                "slot {idx} is marked dead but has entity data in the snapshot"
            )));
        }
    }
    for entity in &snapshot.entities {
        let idx = entity.entity_id.index() as usize;
        if allocator.generations.get(idx) != Some(&entity.entity_id.generation()) {
            return Err(inconsistent(format!(
                "entity {} does not match the allocator generation for its slot",
                entity.entity_id
            )));
        }
    }
    Ok(())
}

/// Restore the world from a snapshot.
///
/// Every record is validated and loaded *before* existing state is cleared,
/// so a failing snapshot leaves the world untouched. On success all previous
/// entities are gone, the allocator matches the snapshot exactly (subsequent
/// [`EntityManager::create`] calls continue from the restored free list), and
/// every snapshot entity exists under its original handle.
///
/// The same component types must already be registered in `components`;
/// registration itself is not part of a snapshot.
///
/// # Errors
///
/// Returns [`EcsError::Deserialization`] for an internally inconsistent
/// snapshot, [`EcsError::UnknownComponentType`] when a record names an
/// unregistered type, or a loader hook's own error.
pub fn restore_snapshot(
    entities: &mut EntityManager,
    components: &mut ComponentManager,
    snapshot: &WorldSnapshot,
    loaders: &ComponentLoaderRegistry,
) -> Result<(), EcsError> {
    validate_snapshot(snapshot)?;

    // Load every record up front; nothing is cleared until all payloads
    // parsed.
    let mut loaded = Vec::with_capacity(snapshot.entities.len());
    for entity in &snapshot.entities {
        loaded.push((
            entity.entity_id,
            components.load_record(&entity.record, loaders)?,
        ));
    }

    components.clear_storages();
    *entities = EntityManager::restore_state(
        snapshot.allocator.generations.clone(),
        snapshot.allocator.alive.clone(),
        snapshot.allocator.free_indices.clone(),
    );

    for (entity_id, values) in loaded {
        components.attach_loaded(entity_id, values);
    }

    tracing::debug!(entities = snapshot.entities.len(), "restored world snapshot");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
