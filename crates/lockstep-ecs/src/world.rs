//! The [`World`] is the top-level container for the ECS. It owns the entity
//! allocators, the component registry and column storage, the query
//! indices, the string registry, the RNG, the per-client input registry,
//! and the phase scheduler -- everything needed to run one independent
//! simulation. Nothing here is global/static, so two `World`s can run side
//! by side in one process (needed to run two lockstep peers in one test
//! binary).

use std::collections::HashMap;

use lockstep_math::hash::Xxhash32Folder;
use lockstep_math::rng::{Rng, RngState};
use serde::{Deserialize, Serialize};

use crate::component::{ComponentColumns, ComponentRegistry, ComponentSchema, ComponentTypeId, FieldRaw};
use crate::entity::{AllocatorState, EntityAllocator, EntityId};
use crate::input_registry::{Input, InputRegistry};
use crate::query::{EntityIndex, EntityTypeId};
use crate::scheduler::Scheduler;
use crate::string_registry::StringRegistry;
use crate::EcsError;

/// A registered entity template: its component list and how much of it is
/// ever serialized.
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub name: String,
    pub components: Vec<ComponentTypeId>,
    /// `None` = sync every sync-flagged component's fields normally.
    /// `Some(empty)` = this entity type is never serialized at all.
    /// `Some(names)` = only these `component.field` names are synced.
    pub sync_fields: Option<Vec<String>>,
    pub on_restore: Option<fn(&mut World, EntityId)>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, components: Vec<ComponentTypeId>) -> EntityDef {
        EntityDef {
            name: name.into(),
            components,
            sync_fields: None,
            on_restore: None,
        }
    }

    pub fn excluded_from_sync(mut self) -> Self {
        self.sync_fields = Some(Vec::new());
        self
    }

    pub fn sync_whitelist(mut self, names: Vec<String>) -> Self {
        self.sync_fields = Some(names);
        self
    }

    pub fn on_restore(mut self, hook: fn(&mut World, EntityId)) -> Self {
        self.on_restore = Some(hook);
        self
    }

    pub fn is_syncable(&self) -> bool {
        !matches!(&self.sync_fields, Some(v) if v.is_empty())
    }
}

/// Networked-peer state captured/restored across a snapshot boundary.
/// `local_allocator` is deliberately absent: local entities are per-client
/// scratch state that never rides the wire, so a receiving peer's own local
/// allocator must never be overwritten by a snapshot load or resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldState {
    pub allocator: AllocatorState,
    pub rng: RngState,
    pub strings: crate::string_registry::StringRegistryState,
    pub client_ids: Vec<(String, u32)>,
}

/// Per-entity render-interpolation scratch. Mutated every `prePhysics` and
/// every `render` tick (see `Scheduler`'s phase list); never read by
/// `compute_state_hash` or the snapshot codec, since it is purely a
/// rendering convenience and not simulation state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RenderScratch {
    pub prev_x: f32,
    pub prev_y: f32,
    pub interp_x: f32,
    pub interp_y: f32,
}

pub struct World {
    max_entities: u32,
    pub registry: ComponentRegistry,
    columns: HashMap<ComponentTypeId, ComponentColumns>,
    entity_defs: Vec<EntityDef>,
    entity_def_names: HashMap<String, EntityTypeId>,
    entity_type_of: HashMap<EntityId, EntityTypeId>,
    allocator: EntityAllocator,
    local_allocator: EntityAllocator,
    render_scratch: Vec<RenderScratch>,
    pub index: EntityIndex,
    pub strings: StringRegistry,
    pub rng: Rng,
    pub inputs: InputRegistry,
    pub is_client: bool,
    current_frame: u64,
}

impl World {
    pub fn new(max_entities: u32) -> World {
        World {
            max_entities,
            registry: ComponentRegistry::new(),
            columns: HashMap::new(),
            entity_defs: Vec::new(),
            entity_def_names: HashMap::new(),
            entity_type_of: HashMap::new(),
            allocator: EntityAllocator::new(max_entities),
            local_allocator: EntityAllocator::new_local(max_entities),
            render_scratch: vec![RenderScratch::default(); max_entities as usize],
            index: EntityIndex::new(),
            strings: StringRegistry::new(),
            rng: Rng::new(0),
            inputs: InputRegistry::new(),
            is_client: false,
            current_frame: 0,
        }
    }

    /// Reads an entity's render-interpolation scratch. Indexed by entity
    /// index, not identity -- stale reads after a generation bump return
    /// whatever the previous occupant left there, same as component fields.
    pub fn render_scratch(&self, id: EntityId) -> RenderScratch {
        self.render_scratch[id.index() as usize]
    }

    pub fn set_render_scratch(&mut self, id: EntityId, scratch: RenderScratch) {
        self.render_scratch[id.index() as usize] = scratch;
    }

    pub fn seed_rng(&mut self, seed: u32) {
        self.rng = Rng::new(seed);
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    pub fn register_component(&mut self, schema: ComponentSchema) -> ComponentTypeId {
        let id = self.registry.register(schema.clone());
        self.columns.insert(id, ComponentColumns::new(schema, self.max_entities as usize));
        id
    }

    pub fn register_entity_type(&mut self, def: EntityDef) -> EntityTypeId {
        let id = EntityTypeId(self.entity_defs.len() as u32);
        if self.entity_def_names.contains_key(&def.name) {
            panic!("entity type '{}' is already registered", def.name);
        }
        self.entity_def_names.insert(def.name.clone(), id);
        self.entity_defs.push(def);
        id
    }

    pub fn entity_type_id(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_def_names.get(name).copied()
    }

    pub fn entity_def(&self, type_id: EntityTypeId) -> &EntityDef {
        &self.entity_defs[type_id.0 as usize]
    }

    fn components_of(&self, type_id: EntityTypeId) -> Vec<ComponentTypeId> {
        self.entity_def(type_id).components.clone()
    }

    fn attach_components(&mut self, id: EntityId, type_id: EntityTypeId) {
        let components = self.components_of(type_id);
        for c in &components {
            self.columns.get_mut(c).unwrap().attach(id.index());
        }
        self.index.insert_entity(id, type_id, &components);
        self.entity_type_of.insert(id, type_id);
    }

    pub fn spawn(&mut self, type_name: &str) -> Result<EntityId, EcsError> {
        let type_id = self
            .entity_type_id(type_name)
            .ok_or_else(|| EcsError::UnknownEntityType { name: type_name.to_owned() })?;
        let id = self
            .allocator
            .allocate()
            .ok_or(EcsError::EntitiesExhausted)?;
        self.attach_components(id, type_id);
        Ok(id)
    }

    pub fn spawn_local(&mut self, type_name: &str) -> Result<EntityId, EcsError> {
        let type_id = self
            .entity_type_id(type_name)
            .ok_or_else(|| EcsError::UnknownEntityType { name: type_name.to_owned() })?;
        let id = self
            .local_allocator
            .allocate()
            .ok_or(EcsError::EntitiesExhausted)?;
        self.attach_components(id, type_id);
        Ok(id)
    }

    /// Spawn with a specific, previously-serialized ID. Used by snapshot
    /// restore; idempotent with respect to the allocator slot.
    pub fn spawn_with_id(&mut self, type_name: &str, id: EntityId) -> Result<(), EcsError> {
        let type_id = self
            .entity_type_id(type_name)
            .ok_or_else(|| EcsError::UnknownEntityType { name: type_name.to_owned() })?;
        if id.is_local() {
            self.local_allocator.allocate_specific(id);
        } else {
            self.allocator.allocate_specific(id);
        }
        self.attach_components(id, type_id);
        Ok(())
    }

    pub fn destroy(&mut self, id: EntityId) -> bool {
        let type_id = match self.entity_type_of.remove(&id) {
            Some(t) => t,
            None => return false,
        };
        let components = self.components_of(type_id);
        for c in &components {
            self.columns.get_mut(c).unwrap().detach(id.index());
        }
        self.index.remove_entity(id, type_id, &components);
        if id.is_local() {
            self.local_allocator.free(id)
        } else {
            self.allocator.free(id)
        }
    }

    pub fn is_valid(&self, id: EntityId) -> bool {
        if id.is_local() {
            self.local_allocator.is_valid(id)
        } else {
            self.allocator.is_valid(id)
        }
    }

    pub fn set_entity_client_id(&mut self, id: EntityId, client_id: impl Into<String>) {
        self.index.set_client_id(client_id, id);
    }

    pub fn entity_by_client_id(&self, client_id: &str) -> Option<EntityId> {
        self.index.by_client_id(client_id)
    }

    pub fn get_field(&self, id: EntityId, component: ComponentTypeId, field: usize) -> Option<FieldRaw> {
        let cols = self.columns.get(&component)?;
        if !cols.has(id.index()) {
            return None;
        }
        Some(cols.get_field(id.index(), field))
    }

    pub fn set_field(&mut self, id: EntityId, component: ComponentTypeId, field: usize, raw: FieldRaw) -> bool {
        let cols = match self.columns.get_mut(&component) {
            Some(c) => c,
            None => return false,
        };
        if !cols.has(id.index()) {
            return false;
        }
        cols.set_field(id.index(), field, raw);
        true
    }

    pub fn columns(&self, component: ComponentTypeId) -> Option<&ComponentColumns> {
        self.columns.get(&component)
    }

    pub fn columns_mut(&mut self, component: ComponentTypeId) -> Option<&mut ComponentColumns> {
        self.columns.get_mut(&component)
    }

    /// Every active, non-local entity ID in ascending order.
    pub fn active_entities_sorted(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entity_type_of.keys().copied().filter(|id| !id.is_local()).collect();
        ids.sort();
        ids
    }

    /// The deterministic xxhash32 state hash: active entity count, then
    /// per sorted active ID (skipping non-syncable types), the raw ID
    /// followed by each sync component's fields in name-sorted order.
    pub fn compute_state_hash(&self) -> u32 {
        let ids = self.active_entities_sorted();
        let syncable: Vec<EntityId> = ids
            .into_iter()
            .filter(|id| self.entity_def(self.entity_type_of[id]).is_syncable())
            .collect();

        let mut folder = Xxhash32Folder::new(0x1234_5678);
        folder.fold_u32(syncable.len() as u32);

        for id in syncable {
            folder.fold_u32(id.to_raw());
            let type_id = self.entity_type_of[&id];
            let def = self.entity_def(type_id);
            let mut components = def.components.clone();
            components.sort_by_key(|c| self.registry.schema(*c).name.clone());
            for c in components {
                let schema = self.registry.schema(c);
                if !schema.sync {
                    continue;
                }
                let cols = &self.columns[&c];
                for field in schema.fields_name_sorted() {
                    let idx = schema.field_index(&field.name).unwrap();
                    let raw = cols.get_field(id.index(), idx);
                    fold_field_raw(&mut folder, raw);
                }
            }
        }
        folder.finish()
    }

    pub fn set_input(&mut self, input: Input) {
        self.inputs.set(input);
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    pub fn advance_frame(&mut self, frame: u64) {
        self.current_frame = frame;
    }

    /// Run one tick: the caller has already applied inputs via
    /// [`World::set_input`]; this just advances the scheduler phases.
    pub fn run_phases(&mut self, scheduler: &Scheduler) -> Result<(), EcsError> {
        scheduler.run_tick(self, self.is_client)
    }

    pub fn entity_type_of_public(&self, id: EntityId) -> EntityTypeId {
        self.entity_type_of[&id]
    }

    /// Drop every entity without touching component registration or
    /// entity-type definitions. Used by snapshot restore before entities
    /// are recreated from the incoming data.
    pub fn clear_all_entities(&mut self) {
        let ids: Vec<EntityId> = self.entity_type_of.keys().copied().collect();
        for id in ids {
            self.destroy(id);
        }
        self.allocator = EntityAllocator::new(self.max_entities);
        self.local_allocator = EntityAllocator::new_local(self.max_entities);
    }

    /// Overwrite the networked allocator's state from a captured
    /// [`WorldState`], used after entities have been recreated via
    /// `spawn_with_id` so the free-list reflects exactly the restored
    /// active set. The local allocator is untouched -- it is this peer's
    /// own scratch bookkeeping and never travels in a `WorldState`.
    pub fn restore_allocators(&mut self, state: &WorldState) {
        self.allocator = EntityAllocator::restore_from_state(self.max_entities, false, &state.allocator);
    }

    pub fn capture_state(&self) -> WorldState {
        let client_ids: Vec<(String, u32)> = self
            .active_entities_sorted()
            .into_iter()
            .filter_map(|id| {
                self.index
                    .by_client_id_reverse(id)
                    .map(|cid| (cid.to_owned(), id.to_raw()))
            })
            .collect();
        WorldState {
            allocator: self.allocator.snapshot_state(),
            rng: self.rng.save_state(),
            strings: self.strings.snapshot_state(),
            client_ids,
        }
    }
}

fn fold_field_raw(folder: &mut Xxhash32Folder, raw: FieldRaw) {
    match raw {
        FieldRaw::FixedI32(v) => folder.fold_i32(v),
        FieldRaw::U8(v) => folder.fold_u32(v as u32),
        FieldRaw::Bool(v) => folder.fold_u32(v as u32),
        FieldRaw::F32(v) => folder.fold_u32(v.to_bits()),
    }
}
