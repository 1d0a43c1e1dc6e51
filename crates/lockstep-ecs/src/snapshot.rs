//! Sparse, type-indexed world snapshot.
//!
//! This is the in-memory data model only -- binary framing, the rollback
//! buffer, and delta computation live in `lockstep-codec`, which wraps
//! this struct the way the teacher's engine-level snapshot wraps its ECS
//! world snapshot with a hash and binary envelope.
//!
//! Encoding commits to: entities in ascending ID order, components of an
//! entity in their declared attach order, fields in declared schema order
//! (not name-sorted -- name-sorted order is reserved for the state hash).
//! A type only appears in `entity_types`/`schema` if at least one encoded
//! entity uses it. Entity types with an empty `sync_fields` whitelist are
//! skipped entirely.

use serde::{Deserialize, Serialize};

use crate::component::{ComponentTypeId, FieldRaw};
use crate::entity::EntityId;
use crate::query::EntityTypeId;
use crate::world::World;
use crate::EcsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeSchema {
    pub type_name: String,
    /// (component name, field names in schema order that are synced)
    pub components: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityEntry {
    pub eid: u32,
    pub type_index: u32,
    pub client_id: Option<String>,
    /// Concatenation of every synced field's raw value, in the order the
    /// entity type's schema entry declares them.
    pub values: Vec<FieldRaw>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseSnapshot {
    pub frame: u64,
    pub seq: u64,
    pub post_tick: bool,
    pub entity_types: Vec<String>,
    pub schema: Vec<EntityTypeSchema>,
    pub entities: Vec<EntityEntry>,
    pub world_state: crate::world::WorldState,
}

fn synced_fields_for(world: &World, type_id: EntityTypeId, component: ComponentTypeId) -> Vec<String> {
    let schema = world.registry.schema(component);
    if !schema.sync {
        return Vec::new();
    }
    let def = world.entity_def(type_id);
    match &def.sync_fields {
        None => schema.fields.iter().map(|f| f.name.clone()).collect(),
        Some(whitelist) => schema
            .fields
            .iter()
            .filter(|f| whitelist.contains(&f.name))
            .map(|f| f.name.clone())
            .collect(),
    }
}

impl World {
    pub fn get_sparse_snapshot(&self, frame: u64, seq: u64, post_tick: bool) -> SparseSnapshot {
        let mut entity_types: Vec<String> = Vec::new();
        let mut type_index_of: std::collections::HashMap<EntityTypeId, u32> = std::collections::HashMap::new();
        let mut schema: Vec<EntityTypeSchema> = Vec::new();
        let mut entities: Vec<EntityEntry> = Vec::new();

        for id in self.active_entities_sorted() {
            let type_id = self.entity_type_of_public(id);
            let def = self.entity_def(type_id);
            if !def.is_syncable() {
                continue;
            }

            let type_index = *type_index_of.entry(type_id).or_insert_with(|| {
                let idx = entity_types.len() as u32;
                entity_types.push(def.name.clone());
                let components: Vec<(String, Vec<String>)> = def
                    .components
                    .iter()
                    .map(|&c| {
                        (
                            self.registry.schema(c).name.clone(),
                            synced_fields_for(self, type_id, c),
                        )
                    })
                    .filter(|(_, fields)| !fields.is_empty())
                    .collect();
                schema.push(EntityTypeSchema {
                    type_name: def.name.clone(),
                    components,
                });
                idx
            });

            let mut values = Vec::new();
            let type_schema = &schema[type_index as usize];
            for (comp_name, field_names) in &type_schema.components {
                let comp_id = self.registry.lookup_by_name(comp_name).unwrap();
                let comp_schema = self.registry.schema(comp_id);
                let cols = self.columns(comp_id).unwrap();
                for field_name in field_names {
                    let field_idx = comp_schema.field_index(field_name).unwrap();
                    values.push(cols.get_field(id.index(), field_idx));
                }
            }

            entities.push(EntityEntry {
                eid: id.to_raw(),
                type_index,
                client_id: self.index.by_client_id_reverse(id).map(|s| s.to_owned()),
                values,
            });
        }

        SparseSnapshot {
            frame,
            seq,
            post_tick,
            entity_types,
            schema,
            entities,
            world_state: self.capture_state(),
        }
    }

    /// Decode a sparse snapshot into this world. Clears all existing
    /// entities first; the component registry and entity-type definitions
    /// must already be registered identically to when the snapshot was
    /// taken.
    pub fn load_sparse_snapshot(&mut self, snapshot: &SparseSnapshot) -> Result<(), EcsError> {
        for type_name in &snapshot.entity_types {
            if self.entity_type_id(type_name).is_none() {
                return Err(EcsError::UnknownEntityType {
                    name: type_name.clone(),
                });
            }
        }
        for entry in &snapshot.entities {
            let type_schema = &snapshot.schema[entry.type_index as usize];
            let mut offset = 0usize;
            for (comp_name, field_names) in &type_schema.components {
                self.registry
                    .lookup_by_name(comp_name)
                    .ok_or_else(|| EcsError::UnknownComponent {
                        name: comp_name.clone(),
                    })?;
                let field_count = field_names.len();
                if offset + field_count > entry.values.len() {
                    return Err(EcsError::SnapshotDecode {
                        details: format!("entity {} truncated values for {}", entry.eid, comp_name),
                    });
                }
                offset += field_count;
            }
        }

        self.clear_all_entities();
        self.strings = crate::string_registry::StringRegistry::restore_from_state(&snapshot.world_state.strings);
        self.rng = lockstep_math::rng::Rng::from_state(snapshot.world_state.rng);

        for entry in &snapshot.entities {
            let type_name = &snapshot.entity_types[entry.type_index as usize];
            let eid = EntityId::from_raw(entry.eid);
            self.spawn_with_id(type_name, eid)?;

            let type_schema = &snapshot.schema[entry.type_index as usize];
            let mut offset = 0usize;
            for (comp_name, field_names) in &type_schema.components {
                let comp_id = self.registry.lookup_by_name(comp_name).unwrap();
                let comp_schema = self.registry.schema(comp_id).clone();
                for field_name in field_names {
                    let field_idx = comp_schema.field_index(field_name).unwrap();
                    let raw = entry.values[offset];
                    self.set_field(eid, comp_id, field_idx, raw);
                    offset += 1;
                }
            }

            if let Some(client_id) = &entry.client_id {
                self.set_entity_client_id(eid, client_id.clone());
            }

            let type_id = self.entity_type_id(type_name).unwrap();
            if let Some(hook) = self.entity_def(type_id).on_restore {
                hook(self, eid);
            }
        }

        self.restore_allocators(&snapshot.world_state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentSchema, FieldRepr};
    use crate::world::EntityDef;

    fn make_world() -> (World, ComponentTypeId) {
        let mut world = World::new(64);
        let schema = ComponentSchema::new("transform")
            .field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
            .field("y", FieldRepr::FixedI32, FieldRaw::FixedI32(0));
        let comp = world.register_component(schema);
        world.register_entity_type(EntityDef::new("dot", vec![comp]));
        (world, comp)
    }

    #[test]
    fn round_trip_preserves_hash() {
        let (mut world, comp) = make_world();
        let id = world.spawn("dot").unwrap();
        world.set_field(id, comp, 0, FieldRaw::FixedI32(77));
        let before = world.compute_state_hash();

        let snap = world.get_sparse_snapshot(10, 0, true);

        let (mut world2, _comp2) = make_world();
        world2.load_sparse_snapshot(&snap).unwrap();
        let after = world2.compute_state_hash();

        assert_eq!(before, after);
    }

    #[test]
    fn excluded_entity_type_is_never_encoded() {
        let mut world = World::new(64);
        let schema = ComponentSchema::new("scratch").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0));
        let comp = world.register_component(schema);
        world.register_entity_type(EntityDef::new("ghost", vec![comp]).excluded_from_sync());
        world.spawn("ghost").unwrap();
        let snap = world.get_sparse_snapshot(0, 0, true);
        assert!(snap.entities.is_empty());
    }
}
