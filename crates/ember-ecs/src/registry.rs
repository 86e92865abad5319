//! Loader and serializer registries.
//!
//! Persistence works through two lookup tables keyed by [`ComponentTypeId`]:
//! the loader registry turns payload bytes back into an erased component
//! value, and the serializer registry turns an erased value into payload
//! bytes. Both are populated once at startup and read thereafter; the core
//! never interprets the bytes itself, so each component type owns its wire
//! format. [`register_serde`](ComponentLoaderRegistry::register_serde)
//! installs the default JSON-bytes hooks for any serde-able type.
//!
//! The registries are plain owned tables constructed by the engine's
//! top-level context (or a test) -- there is no ambient global state.

use std::any::Any;

use crate::component::ComponentTypeId;
use crate::EcsError;

/// Turns payload bytes into an erased component value.
pub type LoadFn = Box<dyn Fn(&[u8]) -> Result<Box<dyn Any>, EcsError> + Send + Sync>;

/// Turns an erased component value into payload bytes.
pub type SaveFn = Box<dyn Fn(&dyn Any) -> Result<Vec<u8>, EcsError> + Send + Sync>;

// ---------------------------------------------------------------------------
// ComponentLoaderRegistry
// ---------------------------------------------------------------------------

/// Table of per-type load hooks, indexed by [`ComponentTypeId`].
#[derive(Default)]
pub struct ComponentLoaderRegistry {
    loaders: Vec<Option<LoadFn>>,
}

impl ComponentLoaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { loaders: Vec::new() }
    }

    /// Register a load hook for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateRegistration`] if `id` already has a
    /// loader. Types register exactly once at startup; hitting this is a
    /// misconfiguration worth failing loudly over.
    pub fn register(&mut self, id: ComponentTypeId, loader: LoadFn) -> Result<(), EcsError> {
        if id.index() >= self.loaders.len() {
            self.loaders.resize_with(id.index() + 1, || None);
        }
        if self.loaders[id.index()].is_some() {
            return Err(EcsError::DuplicateRegistration { type_id: id });
        }
        self.loaders[id.index()] = Some(loader);
        Ok(())
    }

    /// Register the default JSON-bytes loader for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateRegistration`] if `id` already has a
    /// loader.
    pub fn register_serde<T>(&mut self, id: ComponentTypeId) -> Result<(), EcsError>
    where
        T: Send + Sync + 'static + for<'de> serde::Deserialize<'de>,
    {
        self.register(
            id,
            Box::new(|bytes: &[u8]| {
                let value: T =
                    serde_json::from_slice(bytes).map_err(|e| EcsError::Deserialization {
                        component: std::any::type_name::<T>().to_owned(),
                        details: e.to_string(),
                    })?;
                Ok(Box::new(value) as Box<dyn Any>)
            }),
        )
    }

    /// Load a component value from payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredType`] if `id` has no loader, or the
    /// hook's own error if the payload does not parse.
    pub fn load(&self, id: ComponentTypeId, bytes: &[u8]) -> Result<Box<dyn Any>, EcsError> {
        let loader = self
            .loaders
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(EcsError::UnregisteredType { type_id: id })?;
        loader(bytes)
    }

    /// Whether `id` has a registered loader.
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.loaders
            .get(id.index())
            .is_some_and(|slot| slot.is_some())
    }
}

impl std::fmt::Debug for ComponentLoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentLoaderRegistry")
            .field("count", &self.loaders.iter().filter(|l| l.is_some()).count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentSerializerRegistry
// ---------------------------------------------------------------------------

/// Table of per-type save hooks, indexed by [`ComponentTypeId`].
#[derive(Default)]
pub struct ComponentSerializerRegistry {
    serializers: Vec<Option<SaveFn>>,
}

impl ComponentSerializerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            serializers: Vec::new(),
        }
    }

    /// Register a save hook for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateRegistration`] if `id` already has a
    /// serializer.
    pub fn register(&mut self, id: ComponentTypeId, serializer: SaveFn) -> Result<(), EcsError> {
        if id.index() >= self.serializers.len() {
            self.serializers.resize_with(id.index() + 1, || None);
        }
        if self.serializers[id.index()].is_some() {
            return Err(EcsError::DuplicateRegistration { type_id: id });
        }
        self.serializers[id.index()] = Some(serializer);
        Ok(())
    }

    /// Register the default JSON-bytes serializer for `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateRegistration`] if `id` already has a
    /// serializer.
    pub fn register_serde<T>(&mut self, id: ComponentTypeId) -> Result<(), EcsError>
    where
        T: Send + Sync + 'static + serde::Serialize,
    {
        self.register(
            id,
            Box::new(|value: &dyn Any| {
                let typed = value.downcast_ref::<T>().ok_or_else(|| EcsError::Serialization {
                    component: std::any::type_name::<T>().to_owned(),
                    details: "value does not match the registered component type".to_owned(),
                })?;
                serde_json::to_vec(typed).map_err(|e| EcsError::Serialization {
                    component: std::any::type_name::<T>().to_owned(),
                    details: e.to_string(),
                })
            }),
        )
    }

    /// Serialize a component value to payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnregisteredType`] if `id` has no serializer, or
    /// the hook's own error.
    pub fn save(&self, id: ComponentTypeId, value: &dyn Any) -> Result<Vec<u8>, EcsError> {
        let serializer = self
            .serializers
            .get(id.index())
            .and_then(|slot| slot.as_ref())
            .ok_or(EcsError::UnregisteredType { type_id: id })?;
        serializer(value)
    }

    /// Whether `id` has a registered serializer.
    pub fn contains(&self, id: ComponentTypeId) -> bool {
        self.serializers
            .get(id.index())
            .is_some_and(|slot| slot.is_some())
    }
}

impl std::fmt::Debug for ComponentSerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSerializerRegistry")
            .field(
                "count",
                &self.serializers.iter().filter(|s| s.is_some()).count(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeManager;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Health(u32);

    fn health_id() -> (ComponentTypeManager, ComponentTypeId) {
        let mut types = ComponentTypeManager::new();
        let id = types.register::<Health>("health");
        (types, id)
    }

    #[test]
    fn serde_hooks_roundtrip() {
        let (_types, id) = health_id();
        let mut loaders = ComponentLoaderRegistry::new();
        let mut serializers = ComponentSerializerRegistry::new();
        loaders.register_serde::<Health>(id).unwrap();
        serializers.register_serde::<Health>(id).unwrap();

        let bytes = serializers.save(id, &Health(75)).unwrap();
        let value = loaders.load(id, &bytes).unwrap();
        assert_eq!(value.downcast_ref::<Health>(), Some(&Health(75)));
    }

    #[test]
    fn reregistration_is_rejected() {
        let (_types, id) = health_id();
        let mut loaders = ComponentLoaderRegistry::new();
        loaders.register_serde::<Health>(id).unwrap();
        let err = loaders.register_serde::<Health>(id).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateRegistration { .. }));

        let mut serializers = ComponentSerializerRegistry::new();
        serializers.register_serde::<Health>(id).unwrap();
        let err = serializers.register_serde::<Health>(id).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateRegistration { .. }));
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let (_types, id) = health_id();
        let loaders = ComponentLoaderRegistry::new();
        assert!(matches!(
            loaders.load(id, b"{}"),
            Err(EcsError::UnregisteredType { .. })
        ));

        let serializers = ComponentSerializerRegistry::new();
        assert!(matches!(
            serializers.save(id, &Health(1)),
            Err(EcsError::UnregisteredType { .. })
        ));
        assert!(!serializers.contains(id));
    }

    #[test]
    fn malformed_payload_is_a_deserialization_error() {
        let (_types, id) = health_id();
        let mut loaders = ComponentLoaderRegistry::new();
        loaders.register_serde::<Health>(id).unwrap();
        let err = loaders.load(id, b"not json").unwrap_err();
        assert!(matches!(err, EcsError::Deserialization { .. }));
    }

    #[test]
    fn save_of_mismatched_value_is_an_error() {
        let (_types, id) = health_id();
        let mut serializers = ComponentSerializerRegistry::new();
        serializers.register_serde::<Health>(id).unwrap();
        let err = serializers.save(id, &"wrong type").unwrap_err();
        assert!(matches!(err, EcsError::Serialization { .. }));
    }

    #[test]
    fn custom_hook_owns_its_byte_format() {
        let (_types, id) = health_id();
        let mut loaders = ComponentLoaderRegistry::new();
        let mut serializers = ComponentSerializerRegistry::new();

        // Little-endian u32, no JSON involved.
        serializers
            .register(
                id,
                Box::new(|value: &dyn Any| {
                    let health = value.downcast_ref::<Health>().unwrap();
                    Ok(health.0.to_le_bytes().to_vec())
                }),
            )
            .unwrap();
        loaders
            .register(
                id,
                Box::new(|bytes: &[u8]| {
                    let raw: [u8; 4] =
                        bytes.try_into().map_err(|_| EcsError::Deserialization {
                            component: "Health".to_owned(),
                            details: format!("expected 4 bytes, got {}", bytes.len()),
                        })?;
                    Ok(Box::new(Health(u32::from_le_bytes(raw))) as Box<dyn Any>)
                }),
            )
            .unwrap();

        let bytes = serializers.save(id, &Health(1234)).unwrap();
        assert_eq!(bytes.len(), 4);
        let value = loaders.load(id, &bytes).unwrap();
        assert_eq!(value.downcast_ref::<Health>(), Some(&Health(1234)));
    }
}
