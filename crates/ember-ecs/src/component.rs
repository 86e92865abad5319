//! Component type registration.
//!
//! Every component kind used by the engine is registered once at startup in a
//! [`ComponentTypeManager`], which hands out the dense [`ComponentTypeId`]
//! used to index per-type tables. Assignment order follows registration
//! order, which is not guaranteed stable across runs -- persisted data must
//! key components by their registered *name* and resolve it back to an id at
//! load time.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Dense, process-local identifier for a registered component type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentTypeManager
// ---------------------------------------------------------------------------

/// Assigns and remembers a stable [`ComponentTypeId`] per component kind.
///
/// A type registers once; re-registering the same Rust type returns the id it
/// already holds. The manager also maintains the name↔id mapping that
/// persistence relies on.
#[derive(Debug, Default)]
pub struct ComponentTypeManager {
    /// Rust TypeId -> assigned id, for idempotent registration.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Registered name -> assigned id, for resolving persisted records.
    by_name: HashMap<String, ComponentTypeId>,
    /// Registered names, indexed by `ComponentTypeId`.
    names: Vec<String>,
}

impl ComponentTypeManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            names: Vec::new(),
        }
    }

    /// Register `T` under `name`, returning its [`ComponentTypeId`].
    ///
    /// Idempotent by type identity: if `T` was registered before, the
    /// existing id is returned and `name` is ignored.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already bound to a *different* type. Component
    /// names are the stable persistence key, so a collision is a startup
    /// misconfiguration.
    pub fn register<T: 'static>(&mut self, name: &str) -> ComponentTypeId {
        if let Some(&existing) = self.by_type.get(&TypeId::of::<T>()) {
            return existing;
        }
        if self.by_name.contains_key(name) {
            panic!("component name '{name}' is already registered for a different type");
        }
        let id = ComponentTypeId(self.names.len() as u32);
        self.by_type.insert(TypeId::of::<T>(), id);
        self.by_name.insert(name.to_owned(), id);
        self.names.push(name.to_owned());
        id
    }

    /// Look up the id for `T`, or `None` if it was never registered.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Resolve the id for `T`, failing if the type was never registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponentType`]. Querying an unregistered
    /// type is a programmer error, surfaced as a recoverable error so callers
    /// can report it with context.
    pub fn type_id<T: 'static>(&self) -> Result<ComponentTypeId, EcsError> {
        self.lookup::<T>().ok_or_else(|| EcsError::UnknownComponentType {
            name: std::any::type_name::<T>().to_owned(),
            registered: self.registered_names().join(", "),
        })
    }

    /// Resolve a registered name back to its id.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// The name a type id was registered under.
    pub fn name_of(&self, id: ComponentTypeId) -> Option<&str> {
        self.names.get(id.index()).map(|s| s.as_str())
    }

    /// All assigned ids, in assignment order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        (0..self.names.len() as u32).map(ComponentTypeId)
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
