//! Integration tests for World sparse snapshot capture/restore.

use lockstep_ecs::prelude::*;

fn setup_world(max_entities: usize) -> (World, ComponentTypeId, ComponentTypeId) {
    let mut world = World::new(max_entities);
    let transform = world.register_component(
        ComponentSchema::new("transform")
            .field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
            .field("y", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
    );
    let health = world.register_component(
        ComponentSchema::new("health").field("hp", FieldRepr::U8, FieldRaw::U8(100)),
    );
    world.register_entity_type(EntityDef::new("player", vec![transform, health]));
    world.register_entity_type(EntityDef::new("marker", vec![transform]));
    (world, transform, health)
}

#[test]
fn snapshot_restores_multiple_entity_types() {
    let (mut world, transform, health) = setup_world(64);

    let p1 = world.spawn("player").unwrap();
    world.set_field(p1, transform, 0, FieldRaw::FixedI32(10));
    world.set_field(p1, health, 0, FieldRaw::U8(42));

    let m1 = world.spawn("marker").unwrap();
    world.set_field(m1, transform, 1, FieldRaw::FixedI32(-5));

    let before_hash = world.compute_state_hash();
    let snap = world.get_sparse_snapshot(100, 3, true);

    let (mut restored, transform2, health2) = setup_world(64);
    restored.load_sparse_snapshot(&snap).unwrap();

    assert_eq!(restored.compute_state_hash(), before_hash);
    assert_eq!(restored.get_field(p1, transform2, 0), Some(FieldRaw::FixedI32(10)));
    assert_eq!(restored.get_field(p1, health2, 0), Some(FieldRaw::U8(42)));
    assert_eq!(restored.get_field(m1, transform2, 1), Some(FieldRaw::FixedI32(-5)));
}

#[test]
fn snapshot_preserves_client_id_binding() {
    let (mut world, _transform, _health) = setup_world(64);
    let p1 = world.spawn("player").unwrap();
    world.set_entity_client_id(p1, "client-7".to_owned());

    let snap = world.get_sparse_snapshot(0, 0, true);
    let (mut restored, _t2, _h2) = setup_world(64);
    restored.load_sparse_snapshot(&snap).unwrap();

    assert_eq!(restored.entity_by_client_id("client-7"), Some(p1));
}

#[test]
fn snapshot_preserves_allocator_generation_for_recycled_ids() {
    let (mut world, _transform, _health) = setup_world(8);
    let p1 = world.spawn("player").unwrap();
    world.destroy(p1);
    let p2 = world.spawn("player").unwrap();
    assert_eq!(p1.index(), p2.index());
    assert_ne!(p1.generation(), p2.generation());

    let snap = world.get_sparse_snapshot(0, 0, true);
    let (mut restored, _t2, _h2) = setup_world(8);
    restored.load_sparse_snapshot(&snap).unwrap();

    assert!(restored.is_valid(p2));
    assert!(!restored.is_valid(p1));

    let p3 = restored.spawn("player").unwrap();
    assert_ne!(p3.index(), p2.index(), "allocator must not hand out the still-live index");
}

#[test]
fn late_joiner_catchup_matches_running_peer() {
    let (mut world, transform, _health) = setup_world(64);
    let ids: Vec<_> = (0..5).map(|_| world.spawn("marker").unwrap()).collect();
    for (i, &id) in ids.iter().enumerate() {
        world.set_field(id, transform, 0, FieldRaw::FixedI32(i as i32 * lockstep_math::fixed::FP_ONE));
    }

    let snap = world.get_sparse_snapshot(50, 1, true);

    let (mut joiner, transform2, _h2) = setup_world(64);
    joiner.load_sparse_snapshot(&snap).unwrap();

    assert_eq!(joiner.compute_state_hash(), world.compute_state_hash());
    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(
            joiner.get_field(id, transform2, 0),
            Some(FieldRaw::FixedI32(i as i32 * lockstep_math::fixed::FP_ONE))
        );
    }
}

#[test]
fn loading_snapshot_with_unknown_entity_type_errors_without_mutating() {
    let (mut world, _transform, _health) = setup_world(64);
    let p1 = world.spawn("player").unwrap();

    let mut snap = world.get_sparse_snapshot(0, 0, true);
    snap.entity_types.push("nonexistent".to_owned());

    let before_hash = world.compute_state_hash();
    let result = world.load_sparse_snapshot(&snap);
    assert!(result.is_err());
    assert_eq!(world.compute_state_hash(), before_hash);
    assert!(world.is_valid(p1));
}

#[test]
fn excluded_entity_type_round_trips_as_empty() {
    let mut world = World::new(32);
    let transform = world.register_component(
        ComponentSchema::new("transform").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
    );
    world.register_entity_type(EntityDef::new("local_only", vec![transform]).excluded_from_sync());
    world.spawn("local_only").unwrap();

    let snap = world.get_sparse_snapshot(0, 0, true);
    assert!(snap.entity_types.is_empty());
    assert!(snap.entities.is_empty());
}
