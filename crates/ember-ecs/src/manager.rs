//! Component orchestration.
//!
//! The [`ComponentManager`] is the sole owner of every per-type storage and
//! of the [`ComponentTypeManager`] that names them. Systems go through it to
//! attach, detach, and look up components; the level loader goes through it
//! to turn entities into [`EntityRecord`]s and back. It does not own entity
//! identity -- operations that depend on liveness take the [`EntityManager`]
//! alongside, the same way systems receive both managers side by side.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::component::{ComponentTypeId, ComponentTypeManager};
use crate::entity::{EntityId, EntityManager};
use crate::registry::{ComponentLoaderRegistry, ComponentSerializerRegistry};
use crate::storage::{ComponentStorage, ErasedStorage};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// One persisted component: the stable type name plus the payload bytes its
/// serializer hook produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// The name the component type was registered under.
    pub type_name: String,
    /// Opaque payload; only the type's loader knows the format.
    pub payload: Vec<u8>,
}

/// A persisted entity: its components as an ordered sequence of
/// name-and-payload pairs. Serde provides the framing; the concrete on-disk
/// encoding of the record itself is the caller's choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Component entries in serialization order.
    pub components: Vec<ComponentEntry>,
}

// ---------------------------------------------------------------------------
// ComponentManager
// ---------------------------------------------------------------------------

/// Owns all component storages and drives every cross-type operation.
pub struct ComponentManager {
    /// Type registration and name resolution.
    types: ComponentTypeManager,
    /// One storage per registered type, indexed by `ComponentTypeId`.
    storages: Vec<Box<dyn ErasedStorage>>,
}

impl std::fmt::Debug for ComponentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManager")
            .field("registered_types", &self.types.len())
            .field("stored_components", &self.storages.iter().map(|s| s.len()).sum::<usize>())
            .finish()
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentManager {
    /// Create a manager with no registered types.
    pub fn new() -> Self {
        Self {
            types: ComponentTypeManager::new(),
            storages: Vec::new(),
        }
    }

    /// Register component type `T` under `name` and create its storage.
    ///
    /// Idempotent: re-registering `T` returns its existing id and leaves the
    /// storage untouched.
    pub fn register<T: Send + Sync + 'static>(&mut self, name: &str) -> ComponentTypeId {
        let id = self.types.register::<T>(name);
        if id.index() == self.storages.len() {
            self.storages.push(Box::new(ComponentStorage::<T>::new()));
        }
        id
    }

    /// Read-only access to the type manager.
    pub fn types(&self) -> &ComponentTypeManager {
        &self.types
    }

    /// The typed storage for a registered `T`.
    ///
    /// The downcast cannot fail for ids produced by
    /// [`register`](Self::register); a mismatch would be a wiring bug.
    pub(crate) fn storage<T: 'static>(&self) -> Option<&ComponentStorage<T>> {
        let id = self.types.lookup::<T>()?;
        Some(
            self.storages[id.index()]
                .as_any()
                .downcast_ref::<ComponentStorage<T>>()
                .expect("storage type does not match its registered component type"),
        )
    }

    /// Mutable variant of [`storage`](Self::storage).
    pub(crate) fn storage_mut<T: 'static>(&mut self) -> Option<&mut ComponentStorage<T>> {
        let id = self.types.lookup::<T>()?;
        Some(
            self.storages[id.index()]
                .as_any_mut()
                .downcast_mut::<ComponentStorage<T>>()
                .expect("storage type does not match its registered component type"),
        )
    }

    /// The erased storage for a type id, if one was registered.
    pub(crate) fn erased_storage(&self, id: ComponentTypeId) -> Option<&dyn ErasedStorage> {
        self.storages.get(id.index()).map(|s| s.as_ref())
    }

    // -- component access ---------------------------------------------------

    /// Attach a component to a live entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] if `T` was never registered,
    /// [`EcsError::InvalidEntity`] if the handle is stale, and
    /// [`EcsError::DuplicateComponent`] if the entity already holds a `T`
    /// (probe with [`has`](Self::has) or detach first -- there is no silent
    /// overwrite).
    pub fn attach<T: Send + Sync + 'static>(
        &mut self,
        entities: &EntityManager,
        entity: EntityId,
        value: T,
    ) -> Result<&mut T, EcsError> {
        let id = self.types.type_id::<T>()?;
        if !entities.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        tracing::debug!(%entity, component = std::any::type_name::<T>(), "attaching component");
        self.storages[id.index()]
            .as_any_mut()
            .downcast_mut::<ComponentStorage<T>>()
            .expect("storage type does not match its registered component type")
            .insert(entity, value)
    }

    /// Detach `T` from an entity. No-op if the entity does not hold one.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] if `T` was never registered.
    pub fn detach<T: Send + Sync + 'static>(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let id = self.types.type_id::<T>()?;
        if self.storages[id.index()].remove(entity) {
            tracing::debug!(%entity, component = std::any::type_name::<T>(), "detached component");
        }
        Ok(())
    }

    /// Get `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] if `T` was never registered,
    /// [`EcsError::MissingComponent`] if the entity does not hold one.
    pub fn get<T: 'static>(&self, entity: EntityId) -> Result<&T, EcsError> {
        self.types.type_id::<T>()?;
        self.storage::<T>()
            .expect("storage exists for every registered type")
            .get(entity)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut<T: 'static>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        self.types.type_id::<T>()?;
        self.storage_mut::<T>()
            .expect("storage exists for every registered type")
            .get_mut(entity)
    }

    /// Get `entity`'s `T`, or `None` when absent or `T` is unregistered.
    pub fn try_get<T: 'static>(&self, entity: EntityId) -> Option<&T> {
        self.storage::<T>()?.try_get(entity)
    }

    /// Mutable variant of [`try_get`](Self::try_get).
    pub fn try_get_mut<T: 'static>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.storage_mut::<T>()?.try_get_mut(entity)
    }

    /// Whether `entity` holds a `T`. Never fails; an unregistered type is
    /// simply held by nobody.
    pub fn has<T: 'static>(&self, entity: EntityId) -> bool {
        self.storage::<T>().is_some_and(|s| s.has(entity))
    }

    /// Number of entities currently holding a `T`.
    pub fn count<T: 'static>(&self) -> usize {
        self.storage::<T>().map_or(0, |s| s.len())
    }

    // -- entity teardown ----------------------------------------------------

    /// Strip every component from an entity, then destroy its id.
    ///
    /// The ordering is the load-bearing invariant: the index must not return
    /// to the allocator's free list while any storage still references it,
    /// or a stale component could be attributed to whichever entity reuses
    /// the index. Idempotent: a stale handle is a no-op returning `false`.
    pub fn destroy_entity(&mut self, entities: &mut EntityManager, entity: EntityId) -> bool {
        if !entities.is_alive(entity) {
            return false;
        }
        for storage in &mut self.storages {
            storage.remove(entity);
        }
        tracing::debug!(%entity, "destroyed entity");
        entities.destroy(entity)
    }

    /// Drop every component from every storage. Entity ids are untouched.
    pub(crate) fn clear_storages(&mut self) {
        for storage in &mut self.storages {
            storage.clear();
        }
    }

    // -- persistence --------------------------------------------------------

    /// Serialize a live entity into an [`EntityRecord`].
    ///
    /// Probes every registered type's storage for membership and runs the
    /// matching serializer hook. Entries are emitted in type registration
    /// order.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidEntity`] for a stale handle, or
    /// [`EcsError::UnregisteredType`] when the entity holds a component with
    /// no serializer hook.
    pub fn serialize_entity(
        &self,
        entities: &EntityManager,
        entity: EntityId,
        serializers: &ComponentSerializerRegistry,
    ) -> Result<EntityRecord, EcsError> {
        if !entities.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        let mut components = Vec::new();
        for id in self.types.ids() {
            let Some(value) = self.storages[id.index()].get_erased(entity) else {
                continue;
            };
            let payload = serializers.save(id, value)?;
            let type_name = self
                .types
                .name_of(id)
                .expect("every assigned id has a name")
                .to_owned();
            components.push(ComponentEntry { type_name, payload });
        }
        Ok(EntityRecord { components })
    }

    /// Create a new entity from an [`EntityRecord`].
    ///
    /// All payloads are loaded and validated up front; only then is the
    /// entity created and the components attached in record order. A failing
    /// record therefore never leaves a half-constructed entity behind.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] when a record names a type that is
    /// not registered, [`EcsError::Deserialization`] when a record lists the
    /// same type twice or a payload does not parse, or the loader hook's own
    /// error. Deserialization of other entities is unaffected.
    pub fn deserialize_entity(
        &mut self,
        entities: &mut EntityManager,
        record: &EntityRecord,
        loaders: &ComponentLoaderRegistry,
    ) -> Result<EntityId, EcsError> {
        let loaded = self.load_record(record, loaders)?;
        let entity = entities.create();
        self.attach_loaded(entity, loaded);
        tracing::debug!(%entity, components = record.components.len(), "deserialized entity");
        Ok(entity)
    }

    /// Load and validate every entry of a record without touching storages.
    pub(crate) fn load_record(
        &self,
        record: &EntityRecord,
        loaders: &ComponentLoaderRegistry,
    ) -> Result<Vec<(ComponentTypeId, Box<dyn Any>)>, EcsError> {
        let mut loaded: Vec<(ComponentTypeId, Box<dyn Any>)> =
            Vec::with_capacity(record.components.len());
        for entry in &record.components {
            let id = self.types.lookup_by_name(&entry.type_name).ok_or_else(|| {
                EcsError::UnknownComponentType {
                    name: entry.type_name.clone(),
                    registered: self.types.registered_names().join(", "),
                }
            })?;
            if loaded.iter().any(|(seen, _)| *seen == id) {
                return Err(EcsError::Deserialization {
                    component: entry.type_name.clone(),
                    details: "record lists the component type more than once".to_owned(),
                });
            }
            loaded.push((id, loaders.load(id, &entry.payload)?));
        }
        Ok(loaded)
    }

    /// Attach pre-validated loaded values to an entity.
    pub(crate) fn attach_loaded(
        &mut self,
        entity: EntityId,
        loaded: Vec<(ComponentTypeId, Box<dyn Any>)>,
    ) {
        for (id, value) in loaded {
            self.storages[id.index()]
                .insert_erased(entity, value)
                .expect("duplicate types were rejected before attaching");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
