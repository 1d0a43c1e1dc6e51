//! Entity create/delete deltas between two consecutive sparse snapshots,
//! and their partitioning for bandwidth-limited delta sync. Per-field
//! mutations never ride on this path -- those are covered by the periodic
//! full-state hash plus majority-hash consensus, not by deltas.

use lockstep_ecs::snapshot::{EntityEntry, SparseSnapshot};

use crate::CodecError;

#[derive(Debug, Clone)]
pub struct SnapshotDelta {
    pub frame: u64,
    pub base_hash: Option<u32>,
    pub result_hash: Option<u32>,
    /// New entities, sorted by ID.
    pub created: Vec<EntityEntry>,
    /// Removed entity IDs, sorted numerically.
    pub deleted: Vec<u32>,
}

/// Number of delta partitions for `entity_count` active entities and
/// `client_count` connected clients, targeting ~30 entities per partition.
pub fn num_partitions(entity_count: usize, client_count: usize) -> u32 {
    let target = (entity_count as f64 / 30.0).ceil() as u32;
    let upper = (2 * client_count).max(1) as u32;
    target.max(1).min(upper)
}

/// Computes the create/delete delta between `prev` and `curr`. Per-field
/// changes to entities present in both are not represented here.
pub fn compute_delta(prev: &SparseSnapshot, curr: &SparseSnapshot, base_hash: u32, result_hash: u32) -> SnapshotDelta {
    let prev_ids: std::collections::BTreeSet<u32> = prev.entities.iter().map(|e| e.eid).collect();
    let curr_ids: std::collections::BTreeSet<u32> = curr.entities.iter().map(|e| e.eid).collect();

    let mut created: Vec<EntityEntry> = curr
        .entities
        .iter()
        .filter(|e| !prev_ids.contains(&e.eid))
        .cloned()
        .collect();
    created.sort_by_key(|e| e.eid);

    let mut deleted: Vec<u32> = prev_ids.difference(&curr_ids).copied().collect();
    deleted.sort_unstable();

    SnapshotDelta {
        frame: curr.frame,
        base_hash: Some(base_hash),
        result_hash: Some(result_hash),
        created,
        deleted,
    }
}

/// Slices a delta into `num_partitions` disjoint pieces by `eid %
/// num_partitions`. Hashes are full-state values and are not meaningful per
/// partition, so partition slices carry `None` for both.
pub fn partition_delta(delta: &SnapshotDelta, num_partitions: u32) -> Vec<(u32, SnapshotDelta)> {
    (0..num_partitions)
        .map(|p| {
            let created = delta
                .created
                .iter()
                .filter(|e| e.eid % num_partitions == p)
                .cloned()
                .collect();
            let deleted = delta.deleted.iter().filter(|&&eid| eid % num_partitions == p).copied().collect();
            (
                p,
                SnapshotDelta {
                    frame: delta.frame,
                    base_hash: None,
                    result_hash: None,
                    created,
                    deleted,
                },
            )
        })
        .collect()
}

/// Reassembles a full delta from partition slices, verifying every slice
/// agrees on the frame number.
pub fn assemble_delta(parts: &[SnapshotDelta]) -> Result<SnapshotDelta, CodecError> {
    let frame = match parts.first() {
        Some(first) => first.frame,
        None => return Ok(SnapshotDelta { frame: 0, base_hash: None, result_hash: None, created: Vec::new(), deleted: Vec::new() }),
    };

    let mut created = Vec::new();
    let mut deleted = Vec::new();
    for part in parts {
        if part.frame != frame {
            return Err(CodecError::PartitionFrameMismatch { a: frame, b: part.frame });
        }
        created.extend(part.created.iter().cloned());
        deleted.extend(part.deleted.iter().copied());
    }
    created.sort_by_key(|e: &EntityEntry| e.eid);
    deleted.sort_unstable();

    Ok(SnapshotDelta {
        frame,
        base_hash: None,
        result_hash: None,
        created,
        deleted,
    })
}

/// Applies a create/delete delta to `prev`, reproducing the entity set
/// `curr` it was computed against. Assumes `delta.created`'s entries were
/// encoded against the same `entity_types`/`schema` as `prev` -- true
/// whenever both snapshots came from the same `World`. Entities the delta
/// neither created nor deleted keep their field values from `prev`, since
/// per-field mutations never ride on the delta path.
pub fn apply_delta(prev: &SparseSnapshot, delta: &SnapshotDelta) -> SparseSnapshot {
    let deleted: std::collections::BTreeSet<u32> = delta.deleted.iter().copied().collect();
    let mut entities: Vec<EntityEntry> = prev
        .entities
        .iter()
        .filter(|e| !deleted.contains(&e.eid))
        .cloned()
        .chain(delta.created.iter().cloned())
        .collect();
    entities.sort_by_key(|e| e.eid);

    SparseSnapshot {
        frame: delta.frame,
        seq: prev.seq,
        post_tick: prev.post_tick,
        entity_types: prev.entity_types.clone(),
        schema: prev.schema.clone(),
        entities,
        world_state: prev.world_state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_ecs::component::{ComponentSchema, FieldRaw, FieldRepr};
    use lockstep_ecs::world::{EntityDef, World};

    fn world() -> World {
        let mut world = World::new(64);
        let comp = world.register_component(ComponentSchema::new("t").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)));
        world.register_entity_type(EntityDef::new("dot", vec![comp]));
        world
    }

    #[test]
    fn detects_created_and_deleted_entities() {
        let mut world = world();
        let a = world.spawn("dot").unwrap();
        let prev = world.get_sparse_snapshot(0, 0, true);

        world.destroy(a);
        let b = world.spawn("dot").unwrap();
        let c = world.spawn("dot").unwrap();
        let curr = world.get_sparse_snapshot(1, 0, true);

        let delta = compute_delta(&prev, &curr, 1, 2);
        assert_eq!(delta.deleted, vec![a.to_raw()]);
        let mut created_ids: Vec<u32> = delta.created.iter().map(|e| e.eid).collect();
        created_ids.sort_unstable();
        let mut expected = vec![b.to_raw(), c.to_raw()];
        expected.sort_unstable();
        assert_eq!(created_ids, expected);
    }

    #[test]
    fn partitioning_and_assembly_round_trip() {
        let mut world = world();
        for _ in 0..10 {
            world.spawn("dot").unwrap();
        }
        let prev = World::new(64).get_sparse_snapshot(0, 0, true);
        let curr = world.get_sparse_snapshot(5, 0, true);
        let delta = compute_delta(&prev, &curr, 0, 1);

        let parts = partition_delta(&delta, 3);
        let slices: Vec<SnapshotDelta> = parts.into_iter().map(|(_, d)| d).collect();
        let assembled = assemble_delta(&slices).unwrap();

        let mut expected_created: Vec<u32> = delta.created.iter().map(|e| e.eid).collect();
        expected_created.sort_unstable();
        let mut got_created: Vec<u32> = assembled.created.iter().map(|e| e.eid).collect();
        got_created.sort_unstable();
        assert_eq!(got_created, expected_created);
    }

    #[test]
    fn num_partitions_respects_client_cap() {
        assert_eq!(num_partitions(300, 2), 4);
        assert_eq!(num_partitions(10, 5), 1);
        assert_eq!(num_partitions(0, 0), 1);
    }
}
