//! Ember ECS -- the entity-component data engine at the core of the Ember
//! engine.
//!
//! Per-entity state lives in sparse-set storages, one per component kind,
//! giving O(1) attach/detach/lookup and contiguous, cache-friendly iteration
//! for the per-frame hot path. Entity handles are generational, so a
//! destroyed entity's recycled index can never be confused with the old one.
//! Component types are registered at startup under stable names; the
//! loader/serializer registries let a level loader persist and restore
//! entities without the core knowing any concrete component type.
//!
//! Everything runs on the engine's main simulation thread inside the
//! fixed-step update loop. There is no internal locking; if the surrounding
//! engine introduces threads, access must be externally serialized.
//!
//! # Quick Start
//!
//! ```
//! use ember_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Transform { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut entities = EntityManager::new();
//! let mut components = ComponentManager::new();
//! components.register::<Transform>("transform");
//! components.register::<Velocity>("velocity");
//!
//! let player = entities.create();
//! components.attach(&entities, player, Transform { x: 0.0, y: 0.0 }).unwrap();
//! components.attach(&entities, player, Velocity { dx: 1.0, dy: 0.0 }).unwrap();
//!
//! for (_entity, (transform, velocity)) in components.view_mut::<(&mut Transform, &Velocity)>() {
//!     transform.x += velocity.dx;
//! }
//!
//! assert_eq!(components.get::<Transform>(player).unwrap(), &Transform { x: 1.0, y: 0.0 });
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod manager;
pub mod registry;
pub mod schedule;
pub mod snapshot;
pub mod state;
pub mod storage;
#[allow(unsafe_code)]
pub mod view;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Data-dependent failures (stale handles, missing components, unloadable
/// records) are recoverable: callers can skip, log, or abort the specific
/// operation. Startup misconfigurations that cannot be meaningfully handled
/// at runtime (component name collisions, duplicate system names) panic at
/// the registration site instead.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity handle is stale or was never issued.
    #[error("entity {entity} is stale or was never created")]
    InvalidEntity { entity: entity::EntityId },

    /// Attach was called for a component the entity already holds.
    #[error("entity {entity} already has a '{component}' component")]
    DuplicateComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// Get was called for a component the entity does not hold.
    #[error("entity {entity} has no '{component}' component")]
    MissingComponent {
        entity: entity::EntityId,
        component: String,
    },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponentType { name: String, registered: String },

    /// A loader or serializer was registered twice for one type.
    #[error("a hook is already registered for component type {type_id:?}")]
    DuplicateRegistration {
        type_id: component::ComponentTypeId,
    },

    /// Load or save was requested for a type with no registered hook.
    #[error("no hook registered for component type {type_id:?}")]
    UnregisteredType {
        type_id: component::ComponentTypeId,
    },

    /// A component value could not be serialized.
    #[error("failed to serialize component '{component}': {details}")]
    Serialization { component: String, details: String },

    /// A persisted payload or record could not be deserialized.
    #[error("failed to deserialize component '{component}': {details}")]
    Deserialization { component: String, details: String },

    /// A system names a dependency that was never scheduled.
    #[error("system '{system}' depends on unknown system '{dependency}'")]
    UnknownSystemDependency { system: String, dependency: String },

    /// The system dependency graph contains a cycle.
    #[error("cycle detected in system dependencies")]
    SystemDependencyCycle,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{ComponentTypeId, ComponentTypeManager};
    pub use crate::entity::{EntityId, EntityManager};
    pub use crate::manager::{ComponentEntry, ComponentManager, EntityRecord};
    pub use crate::registry::{ComponentLoaderRegistry, ComponentSerializerRegistry};
    pub use crate::schedule::{System, SystemScheduler};
    pub use crate::snapshot::{capture_snapshot, restore_snapshot, WorldSnapshot};
    pub use crate::state::SystemState;
    pub use crate::storage::{ComponentStorage, ErasedStorage};
    pub use crate::view::{View, ViewItem, ViewIter, ViewIterMut};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
