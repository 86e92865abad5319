//! Integration tests for entity records and world snapshots.

use ember_ecs::prelude::*;

// -- test component types ---------------------------------------------------

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Transform {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Health(u32);

// -- helpers ----------------------------------------------------------------

struct World {
    entities: EntityManager,
    components: ComponentManager,
    loaders: ComponentLoaderRegistry,
    serializers: ComponentSerializerRegistry,
}

/// Build a world with the three test types registered in the given name
/// order, with serde hooks for each.
fn world_with_registration_order(order: &[&str]) -> World {
    let mut components = ComponentManager::new();
    let mut loaders = ComponentLoaderRegistry::new();
    let mut serializers = ComponentSerializerRegistry::new();

    for &name in order {
        match name {
            "transform" => {
                let id = components.register::<Transform>("transform");
                loaders.register_serde::<Transform>(id).unwrap();
                serializers.register_serde::<Transform>(id).unwrap();
            }
            "velocity" => {
                let id = components.register::<Velocity>("velocity");
                loaders.register_serde::<Velocity>(id).unwrap();
                serializers.register_serde::<Velocity>(id).unwrap();
            }
            "health" => {
                let id = components.register::<Health>("health");
                loaders.register_serde::<Health>(id).unwrap();
                serializers.register_serde::<Health>(id).unwrap();
            }
            other => panic!("unknown test component '{other}'"),
        }
    }

    World {
        entities: EntityManager::new(),
        components,
        loaders,
        serializers,
    }
}

fn setup() -> World {
    world_with_registration_order(&["transform", "velocity", "health"])
}

// ---------------------------------------------------------------------------
// Entity record tests
// ---------------------------------------------------------------------------

#[test]
fn record_roundtrip_within_one_world() {
    let mut w = setup();

    let e = w.entities.create();
    w.components
        .attach(&w.entities, e, Transform { x: 1.0, y: 2.0 })
        .unwrap();
    w.components.attach(&w.entities, e, Health(99)).unwrap();

    let record = w
        .components
        .serialize_entity(&w.entities, e, &w.serializers)
        .unwrap();
    let twin = w
        .components
        .deserialize_entity(&mut w.entities, &record, &w.loaders)
        .unwrap();

    assert_ne!(twin, e);
    assert!(w.entities.is_alive(twin));
    assert_eq!(
        w.components.get::<Transform>(twin).unwrap(),
        &Transform { x: 1.0, y: 2.0 }
    );
    assert_eq!(w.components.get::<Health>(twin).unwrap(), &Health(99));
    assert!(!w.components.has::<Velocity>(twin));
}

#[test]
fn records_resolve_by_name_across_registration_orders() {
    // Serialize in a world registered one way, deserialize in a world
    // registered the other way around: type ids differ, names do not.
    let mut source = world_with_registration_order(&["transform", "velocity", "health"]);
    let mut target = world_with_registration_order(&["health", "velocity", "transform"]);

    let e = source.entities.create();
    source
        .components
        .attach(&source.entities, e, Transform { x: 8.0, y: 9.0 })
        .unwrap();
    source
        .components
        .attach(&source.entities, e, Health(12))
        .unwrap();

    let record = source
        .components
        .serialize_entity(&source.entities, e, &source.serializers)
        .unwrap();
    // The persisted form carries stable names, never raw type ids.
    for entry in &record.components {
        assert!(["transform", "velocity", "health"].contains(&entry.type_name.as_str()));
    }

    let loaded = target
        .components
        .deserialize_entity(&mut target.entities, &record, &target.loaders)
        .unwrap();
    assert_eq!(
        target.components.get::<Transform>(loaded).unwrap(),
        &Transform { x: 8.0, y: 9.0 }
    );
    assert_eq!(target.components.get::<Health>(loaded).unwrap(), &Health(12));
}

#[test]
fn record_survives_its_own_serde_framing() {
    let mut w = setup();

    let e = w.entities.create();
    w.components
        .attach(&w.entities, e, Velocity { dx: -1.0, dy: 0.5 })
        .unwrap();

    let record = w
        .components
        .serialize_entity(&w.entities, e, &w.serializers)
        .unwrap();
    let json = serde_json::to_string(&record).unwrap();
    let reparsed: EntityRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed, record);

    let twin = w
        .components
        .deserialize_entity(&mut w.entities, &reparsed, &w.loaders)
        .unwrap();
    assert_eq!(
        w.components.get::<Velocity>(twin).unwrap(),
        &Velocity { dx: -1.0, dy: 0.5 }
    );
}

#[test]
fn unknown_name_aborts_only_that_entity() {
    let mut w = setup();

    let good = EntityRecord {
        components: vec![ComponentEntry {
            type_name: "health".to_owned(),
            payload: serde_json::to_vec(&Health(4)).unwrap(),
        }],
    };
    let bad = EntityRecord {
        components: vec![
            ComponentEntry {
                type_name: "health".to_owned(),
                payload: serde_json::to_vec(&Health(5)).unwrap(),
            },
            ComponentEntry {
                type_name: "from_a_newer_build".to_owned(),
                payload: b"{}".to_vec(),
            },
        ],
    };

    let loaded = w
        .components
        .deserialize_entity(&mut w.entities, &good, &w.loaders)
        .unwrap();

    let before = w.entities.alive_count();
    let err = w
        .components
        .deserialize_entity(&mut w.entities, &bad, &w.loaders)
        .unwrap_err();
    assert!(matches!(err, EcsError::UnknownComponentType { .. }));

    // The bad record created nothing and left the good entity intact.
    assert_eq!(w.entities.alive_count(), before);
    assert_eq!(w.components.count::<Health>(), 1);
    assert_eq!(w.components.get::<Health>(loaded).unwrap(), &Health(4));
}

// ---------------------------------------------------------------------------
// World snapshot tests
// ---------------------------------------------------------------------------

#[test]
fn snapshot_restores_into_a_fresh_world() {
    let mut source = setup();

    let e1 = source.entities.create();
    source
        .components
        .attach(&source.entities, e1, Transform { x: 1.0, y: 1.0 })
        .unwrap();
    source
        .components
        .attach(&source.entities, e1, Health(10))
        .unwrap();
    let e2 = source.entities.create();
    source
        .components
        .attach(&source.entities, e2, Transform { x: 2.0, y: 2.0 })
        .unwrap();
    // Leave a hole in the index space so the free list is non-trivial.
    let e3 = source.entities.create();
    source.components.destroy_entity(&mut source.entities, e3);

    let snapshot = capture_snapshot(
        &source.entities,
        &source.components,
        &source.serializers,
    )
    .unwrap();
    let json = serde_json::to_string(&snapshot).unwrap();

    let mut target = setup();
    let parsed: WorldSnapshot = serde_json::from_str(&json).unwrap();
    restore_snapshot(
        &mut target.entities,
        &mut target.components,
        &parsed,
        &target.loaders,
    )
    .unwrap();

    // Handles from the source world are valid in the target world.
    assert!(target.entities.is_alive(e1));
    assert!(target.entities.is_alive(e2));
    assert!(!target.entities.is_alive(e3));
    assert_eq!(
        target.components.get::<Transform>(e1).unwrap(),
        &Transform { x: 1.0, y: 1.0 }
    );
    assert_eq!(target.components.get::<Health>(e1).unwrap(), &Health(10));

    // Allocation resumes exactly where the source world left off.
    let next = target.entities.create();
    assert_eq!(next.index(), e3.index());
    assert_eq!(next.generation(), e3.generation() + 1);
}

#[test]
fn restore_replaces_existing_population() {
    let mut w = setup();

    let kept = w.entities.create();
    w.components.attach(&w.entities, kept, Health(1)).unwrap();
    let snapshot = capture_snapshot(&w.entities, &w.components, &w.serializers).unwrap();

    // Grow the world past the snapshot, then restore.
    for _ in 0..10 {
        let e = w.entities.create();
        w.components
            .attach(&w.entities, e, Transform { x: 0.0, y: 0.0 })
            .unwrap();
    }
    restore_snapshot(&mut w.entities, &mut w.components, &snapshot, &w.loaders).unwrap();

    assert_eq!(w.entities.alive_count(), 1);
    assert!(w.entities.is_alive(kept));
    assert_eq!(w.components.count::<Transform>(), 0);
    assert_eq!(w.components.count::<Health>(), 1);
}
