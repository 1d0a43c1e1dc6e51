//! Component schemas and structure-of-arrays column storage.
//!
//! Unlike a generic-type component registry, components here are declared
//! by a runtime schema (an ordered list of typed fields) rather than a Rust
//! type, because the snapshot codec and the state hasher both need to walk
//! component fields without any `TypeId`-erased downcasting. Every field of
//! every component type is stored as one flat array of length
//! `max_entities`, indexed directly by entity index -- no per-entity
//! allocation, no archetype moves.

use std::collections::HashMap;

use lockstep_math::fixed::Fp;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ComponentTypeId(pub u32);

/// The wire-level representation of a component field.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum FieldRepr {
    /// Deterministic fixed-point scalar, stored as a raw `i32`.
    FixedI32,
    U8,
    Bool,
    /// Not hashed unless explicitly forced -- present for render-adjacent
    /// data that still needs to travel in a snapshot.
    F32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldRaw {
    FixedI32(i32),
    U8(u8),
    Bool(bool),
    F32(f32),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub repr: FieldRepr,
    pub default: FieldRaw,
}

/// A component's declared shape: its ordered fields and whether it
/// participates in snapshots / the state hash at all.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
    /// `false` means this component never appears in a snapshot or the
    /// state hash (e.g. render-only scratch data).
    pub sync: bool,
}

impl ComponentSchema {
    pub fn new(name: impl Into<String>) -> ComponentSchema {
        ComponentSchema {
            name: name.into(),
            fields: Vec::new(),
            sync: true,
        }
    }

    pub fn field(mut self, name: impl Into<String>, repr: FieldRepr, default: FieldRaw) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            repr,
            default,
        });
        self
    }

    pub fn not_synced(mut self) -> Self {
        self.sync = false;
        self
    }

    /// Field names in name-sorted order, used by the state hasher.
    pub fn fields_name_sorted(&self) -> Vec<&FieldSchema> {
        let mut out: Vec<&FieldSchema> = self.fields.iter().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Name -> type id registry. Components are declared once at startup; the
/// registry commits to iterating component names in sorted order wherever
/// determinism matters (snapshot schema section, state hash).
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: HashMap<String, ComponentTypeId>,
    schemas: Vec<ComponentSchema>,
}

impl ComponentRegistry {
    pub fn new() -> ComponentRegistry {
        ComponentRegistry::default()
    }

    /// Register a new component schema. Panics if the name is already
    /// registered -- a duplicate declaration is a programmer error that
    /// would otherwise silently desync peers that registered it once.
    pub fn register(&mut self, schema: ComponentSchema) -> ComponentTypeId {
        if self.by_name.contains_key(&schema.name) {
            panic!("component '{}' is already registered", schema.name);
        }
        let id = ComponentTypeId(self.schemas.len() as u32);
        self.by_name.insert(schema.name.clone(), id);
        self.schemas.push(schema);
        id
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    pub fn schema(&self, id: ComponentTypeId) -> &ComponentSchema {
        &self.schemas[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Component names, sorted -- the order the snapshot codec and state
    /// hasher both commit to.
    pub fn registered_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn ids_sorted_by_name(&self) -> Vec<ComponentTypeId> {
        self.registered_names_sorted()
            .into_iter()
            .map(|n| self.by_name[n])
            .collect()
    }
}

/// Bit-per-entity presence tracking, `ceil(max_entities / 32)` words.
#[derive(Debug, Clone)]
pub struct PresenceBitset {
    words: Vec<u32>,
}

impl PresenceBitset {
    pub fn new(max_entities: usize) -> PresenceBitset {
        PresenceBitset {
            words: vec![0u32; max_entities.div_ceil(32)],
        }
    }

    pub fn set(&mut self, index: u32) {
        let (word, bit) = (index / 32, index % 32);
        self.words[word as usize] |= 1 << bit;
    }

    pub fn clear(&mut self, index: u32) {
        let (word, bit) = (index / 32, index % 32);
        self.words[word as usize] &= !(1 << bit);
    }

    pub fn get(&self, index: u32) -> bool {
        let (word, bit) = (index / 32, index % 32);
        (self.words[word as usize] >> bit) & 1 != 0
    }

    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(word_idx, &word)| {
            (0..32u32).filter_map(move |bit| {
                if (word >> bit) & 1 != 0 {
                    Some(word_idx as u32 * 32 + bit)
                } else {
                    None
                }
            })
        })
    }
}

#[derive(Debug, Clone)]
enum FieldColumn {
    FixedI32(Vec<i32>),
    U8(Vec<u8>),
    Bool(Vec<bool>),
    F32(Vec<f32>),
}

impl FieldColumn {
    fn new(repr: FieldRepr, max_entities: usize, default: FieldRaw) -> FieldColumn {
        match repr {
            FieldRepr::FixedI32 => {
                let d = match default {
                    FieldRaw::FixedI32(v) => v,
                    _ => 0,
                };
                FieldColumn::FixedI32(vec![d; max_entities])
            }
            FieldRepr::U8 => {
                let d = match default {
                    FieldRaw::U8(v) => v,
                    _ => 0,
                };
                FieldColumn::U8(vec![d; max_entities])
            }
            FieldRepr::Bool => {
                let d = match default {
                    FieldRaw::Bool(v) => v,
                    _ => false,
                };
                FieldColumn::Bool(vec![d; max_entities])
            }
            FieldRepr::F32 => {
                let d = match default {
                    FieldRaw::F32(v) => v,
                    _ => 0.0,
                };
                FieldColumn::F32(vec![d; max_entities])
            }
        }
    }

    fn raw_at(&self, index: u32) -> FieldRaw {
        match self {
            FieldColumn::FixedI32(v) => FieldRaw::FixedI32(v[index as usize]),
            FieldColumn::U8(v) => FieldRaw::U8(v[index as usize]),
            FieldColumn::Bool(v) => FieldRaw::Bool(v[index as usize]),
            FieldColumn::F32(v) => FieldRaw::F32(v[index as usize]),
        }
    }

    fn set_raw_at(&mut self, index: u32, raw: FieldRaw) {
        match (self, raw) {
            (FieldColumn::FixedI32(v), FieldRaw::FixedI32(x)) => v[index as usize] = x,
            (FieldColumn::U8(v), FieldRaw::U8(x)) => v[index as usize] = x,
            (FieldColumn::Bool(v), FieldRaw::Bool(x)) => v[index as usize] = x,
            (FieldColumn::F32(v), FieldRaw::F32(x)) => v[index as usize] = x,
            _ => panic!("field repr mismatch on write"),
        }
    }
}

/// Column storage for every instance of one component type, plus the
/// presence bitmask over entity indices.
#[derive(Debug, Clone)]
pub struct ComponentColumns {
    pub schema: ComponentSchema,
    columns: Vec<FieldColumn>,
    presence: PresenceBitset,
}

impl ComponentColumns {
    pub fn new(schema: ComponentSchema, max_entities: usize) -> ComponentColumns {
        let columns = schema
            .fields
            .iter()
            .map(|f| FieldColumn::new(f.repr, max_entities, f.default))
            .collect();
        ComponentColumns {
            schema,
            columns,
            presence: PresenceBitset::new(max_entities),
        }
    }

    pub fn has(&self, index: u32) -> bool {
        self.presence.get(index)
    }

    pub fn attach(&mut self, index: u32) {
        self.presence.set(index);
        for (col, field) in self.columns.iter_mut().zip(&self.schema.fields) {
            col.set_raw_at(index, field.default);
        }
    }

    pub fn detach(&mut self, index: u32) {
        self.presence.clear(index);
    }

    pub fn active_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.presence.iter_set()
    }

    pub fn get_field(&self, index: u32, field: usize) -> FieldRaw {
        self.columns[field].raw_at(index)
    }

    pub fn set_field(&mut self, index: u32, field: usize, raw: FieldRaw) {
        self.columns[field].set_raw_at(index, raw);
    }

    pub fn get_fixed(&self, index: u32, field: usize) -> Fp {
        match self.get_field(index, field) {
            FieldRaw::FixedI32(v) => Fp::from_raw(v),
            other => panic!("field is not fixed-point: {other:?}"),
        }
    }

    pub fn set_fixed(&mut self, index: u32, field: usize, value: Fp) {
        self.set_field(index, field, FieldRaw::FixedI32(value.raw()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> ComponentSchema {
        ComponentSchema::new("transform")
            .field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
            .field("y", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ComponentRegistry::new();
        let id = reg.register(sample_schema());
        assert_eq!(reg.lookup_by_name("transform"), Some(id));
    }

    #[test]
    #[should_panic]
    fn duplicate_name_panics() {
        let mut reg = ComponentRegistry::new();
        reg.register(sample_schema());
        reg.register(sample_schema());
    }

    #[test]
    fn names_are_sorted() {
        let mut reg = ComponentRegistry::new();
        reg.register(ComponentSchema::new("zeta"));
        reg.register(ComponentSchema::new("alpha"));
        assert_eq!(reg.registered_names_sorted(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn columns_attach_detach_and_defaults() {
        let mut cols = ComponentColumns::new(sample_schema(), 8);
        cols.attach(3);
        assert!(cols.has(3));
        assert_eq!(cols.get_fixed(3, 0), Fp::ZERO);
        cols.set_fixed(3, 0, Fp::from_raw(42));
        assert_eq!(cols.get_fixed(3, 0), Fp::from_raw(42));
        cols.detach(3);
        assert!(!cols.has(3));
    }

    #[test]
    fn presence_bitset_roundtrip() {
        let mut bits = PresenceBitset::new(40);
        bits.set(0);
        bits.set(31);
        bits.set(32);
        bits.set(39);
        let set: Vec<u32> = bits.iter_set().collect();
        assert_eq!(set, vec![0, 31, 32, 39]);
        bits.clear(31);
        assert!(!bits.get(31));
    }

    #[test]
    fn fields_name_sorted_order() {
        let schema = ComponentSchema::new("t")
            .field("z", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
            .field("a", FieldRepr::FixedI32, FieldRaw::FixedI32(0));
        let sorted = schema.fields_name_sorted();
        assert_eq!(sorted[0].name, "a");
        assert_eq!(sorted[1].name, "z");
    }
}
