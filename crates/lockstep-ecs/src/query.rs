//! Index-based query engine.
//!
//! No archetype tables, no generic `Query` trait: entities live in flat
//! column storage (see [`crate::component`]), so matching a query is a
//! matter of intersecting index sets rather than walking archetype rows.
//! Every entry point returns IDs in ascending numeric order -- unordered
//! set iteration here would be a determinism hazard, since systems may
//! branch on iteration order.

use std::collections::{BTreeSet, HashMap};

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EntityTypeId(pub u32);

/// Indices kept in lockstep with entity spawn/destroy and component
/// attach/detach. Every set is a `BTreeSet<EntityId>`, which iterates in
/// the ascending order `EntityId`'s derived `Ord` already provides.
#[derive(Debug, Default)]
pub struct EntityIndex {
    by_type: HashMap<EntityTypeId, BTreeSet<EntityId>>,
    by_component: HashMap<ComponentTypeId, BTreeSet<EntityId>>,
    by_client_id: HashMap<String, EntityId>,
}

impl EntityIndex {
    pub fn new() -> EntityIndex {
        EntityIndex::default()
    }

    pub fn insert_entity(&mut self, id: EntityId, type_id: EntityTypeId, components: &[ComponentTypeId]) {
        self.by_type.entry(type_id).or_default().insert(id);
        for &c in components {
            self.by_component.entry(c).or_default().insert(id);
        }
    }

    pub fn remove_entity(&mut self, id: EntityId, type_id: EntityTypeId, components: &[ComponentTypeId]) {
        if let Some(set) = self.by_type.get_mut(&type_id) {
            set.remove(&id);
        }
        for &c in components {
            if let Some(set) = self.by_component.get_mut(&c) {
                set.remove(&id);
            }
        }
        self.by_client_id.retain(|_, &mut v| v != id);
    }

    pub fn attach_component(&mut self, id: EntityId, component: ComponentTypeId) {
        self.by_component.entry(component).or_default().insert(id);
    }

    pub fn detach_component(&mut self, id: EntityId, component: ComponentTypeId) {
        if let Some(set) = self.by_component.get_mut(&component) {
            set.remove(&id);
        }
    }

    pub fn set_client_id(&mut self, client_id: impl Into<String>, id: EntityId) {
        self.by_client_id.insert(client_id.into(), id);
    }

    pub fn clear_client_id(&mut self, client_id: &str) {
        self.by_client_id.remove(client_id);
    }

    pub fn by_type(&self, type_id: EntityTypeId) -> Vec<EntityId> {
        self.by_type
            .get(&type_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn by_client_id(&self, client_id: &str) -> Option<EntityId> {
        self.by_client_id.get(client_id).copied()
    }

    /// Reverse lookup: the client ID (if any) bound to `id`.
    pub fn by_client_id_reverse(&self, id: EntityId) -> Option<&str> {
        self.by_client_id
            .iter()
            .find(|(_, &v)| v == id)
            .map(|(k, _)| k.as_str())
    }

    /// Intersect the smallest-first to minimize scans, then return a
    /// sorted vec.
    pub fn by_components(&self, components: &[ComponentTypeId]) -> Vec<EntityId> {
        if components.is_empty() {
            return Vec::new();
        }
        let mut sets: Vec<&BTreeSet<EntityId>> = components
            .iter()
            .filter_map(|c| self.by_component.get(c))
            .collect();
        if sets.len() != components.len() {
            // At least one requested component has never been attached.
            return Vec::new();
        }
        sets.sort_by_key(|s| s.len());
        let (smallest, rest) = sets.split_first().unwrap();
        let result: BTreeSet<EntityId> = smallest
            .iter()
            .copied()
            .filter(|id| rest.iter().all(|s| s.contains(id)))
            .collect();
        result.into_iter().collect()
    }

    pub fn by_type_and_components(&self, type_id: EntityTypeId, components: &[ComponentTypeId]) -> Vec<EntityId> {
        let type_set = match self.by_type.get(&type_id) {
            Some(s) => s,
            None => return Vec::new(),
        };
        if components.is_empty() {
            return type_set.iter().copied().collect();
        }
        let component_sets: Vec<&BTreeSet<EntityId>> = components
            .iter()
            .filter_map(|c| self.by_component.get(c))
            .collect();
        if component_sets.len() != components.len() {
            return Vec::new();
        }
        type_set
            .iter()
            .copied()
            .filter(|id| component_sets.iter().all(|s| s.contains(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eid(index: u32) -> EntityId {
        EntityId::new(index, 0)
    }

    #[test]
    fn by_type_returns_sorted() {
        let mut idx = EntityIndex::new();
        let t = EntityTypeId(1);
        idx.insert_entity(eid(5), t, &[]);
        idx.insert_entity(eid(1), t, &[]);
        idx.insert_entity(eid(3), t, &[]);
        assert_eq!(idx.by_type(t), vec![eid(1), eid(3), eid(5)]);
    }

    #[test]
    fn by_components_intersects() {
        let mut idx = EntityIndex::new();
        let t = EntityTypeId(1);
        let a = ComponentTypeId(0);
        let b = ComponentTypeId(1);
        idx.insert_entity(eid(1), t, &[a, b]);
        idx.insert_entity(eid(2), t, &[a]);
        idx.insert_entity(eid(3), t, &[a, b]);
        assert_eq!(idx.by_components(&[a, b]), vec![eid(1), eid(3)]);
    }

    #[test]
    fn by_components_missing_component_is_empty() {
        let idx = EntityIndex::new();
        assert!(idx.by_components(&[ComponentTypeId(99)]).is_empty());
    }

    #[test]
    fn client_id_round_trip() {
        let mut idx = EntityIndex::new();
        idx.set_client_id("alice", eid(7));
        assert_eq!(idx.by_client_id("alice"), Some(eid(7)));
        idx.clear_client_id("alice");
        assert_eq!(idx.by_client_id("alice"), None);
    }

    #[test]
    fn remove_entity_clears_all_indices() {
        let mut idx = EntityIndex::new();
        let t = EntityTypeId(1);
        let a = ComponentTypeId(0);
        idx.insert_entity(eid(1), t, &[a]);
        idx.set_client_id("bob", eid(1));
        idx.remove_entity(eid(1), t, &[a]);
        assert!(idx.by_type(t).is_empty());
        assert!(idx.by_components(&[a]).is_empty());
        assert_eq!(idx.by_client_id("bob"), None);
    }

    #[test]
    fn by_type_and_components_filters() {
        let mut idx = EntityIndex::new();
        let t1 = EntityTypeId(1);
        let t2 = EntityTypeId(2);
        let a = ComponentTypeId(0);
        idx.insert_entity(eid(1), t1, &[a]);
        idx.insert_entity(eid(2), t2, &[a]);
        assert_eq!(idx.by_type_and_components(t1, &[a]), vec![eid(1)]);
    }
}
