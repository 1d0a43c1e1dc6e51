//! Property tests for ECS invariants: allocator uniqueness/validity, and
//! spawn/destroy/query ordering under random operation sequences.

use lockstep_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum EcsOp {
    Spawn,
    Destroy(usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<EcsOp>> {
    prop::collection::vec(
        prop_oneof![
            Just(EcsOp::Spawn),
            (0usize..64).prop_map(EcsOp::Destroy),
        ],
        0..200,
    )
}

fn build_world() -> (World, ComponentTypeId) {
    let mut world = World::new(256);
    let transform = world.register_component(
        ComponentSchema::new("transform")
            .field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
    );
    world.register_entity_type(EntityDef::new("dot", vec![transform]));
    (world, transform)
}

proptest! {
    #[test]
    fn allocated_ids_never_collide_with_active_ids(ops in ops_strategy()) {
        let (mut world, _comp) = build_world();
        let mut alive: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                EcsOp::Spawn => {
                    if let Ok(id) = world.spawn("dot") {
                        prop_assert!(!alive.contains(&id));
                        alive.push(id);
                    }
                }
                EcsOp::Destroy(i) => {
                    if !alive.is_empty() {
                        let idx = i % alive.len();
                        let id = alive.remove(idx);
                        prop_assert!(world.destroy(id));
                    }
                }
            }
        }

        for &id in &alive {
            prop_assert!(world.is_valid(id));
        }
    }

    #[test]
    fn query_always_yields_ascending_order(ops in ops_strategy()) {
        let (mut world, _comp) = build_world();
        for op in ops {
            match op {
                EcsOp::Spawn => { let _ = world.spawn("dot"); }
                EcsOp::Destroy(i) => {
                    let ids = world.active_entities_sorted();
                    if !ids.is_empty() {
                        world.destroy(ids[i % ids.len()]);
                    }
                }
            }
        }
        let ids = world.active_entities_sorted();
        let mut sorted = ids.clone();
        sorted.sort();
        prop_assert_eq!(ids, sorted);
    }

    #[test]
    fn state_hash_round_trips_through_snapshot(spawns in 0usize..20) {
        let (mut world, comp) = build_world();
        for i in 0..spawns {
            let id = world.spawn("dot").unwrap();
            world.set_field(id, comp, 0, FieldRaw::FixedI32(i as i32));
        }
        let before = world.compute_state_hash();
        let snap = world.get_sparse_snapshot(0, 0, true);

        let (mut world2, _comp2) = build_world();
        world2.load_sparse_snapshot(&snap).unwrap();
        let after = world2.compute_state_hash();

        prop_assert_eq!(before, after);
    }
}
