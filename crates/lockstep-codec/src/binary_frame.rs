//! Canonical binary encoding of a sparse snapshot:
//! `u32 LE meta_length | meta_bytes (JSON) | concatenated field column blocks`.
//!
//! Column blocks are grouped by entity type (in snapshot schema order), then
//! by component and field within that type, in the same order the sparse
//! snapshot concatenates its per-entity value vectors. Each block holds one
//! native-width element per entity of that type, in the order those
//! entities appear in the snapshot.

use serde::{Deserialize, Serialize};

use lockstep_ecs::component::{ComponentRegistry, FieldRaw, FieldRepr};
use lockstep_ecs::snapshot::{EntityEntry, EntityTypeSchema, SparseSnapshot};
use lockstep_ecs::world::WorldState;

use crate::CodecError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntityMeta {
    eid: u32,
    type_index: u32,
    client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameMeta {
    frame: u64,
    seq: u64,
    post_tick: bool,
    entity_types: Vec<String>,
    schema: Vec<EntityTypeSchema>,
    entity_meta: Vec<EntityMeta>,
    world_state: WorldState,
}

fn field_width(repr: FieldRepr) -> usize {
    match repr {
        FieldRepr::FixedI32 | FieldRepr::F32 => 4,
        FieldRepr::U8 | FieldRepr::Bool => 1,
    }
}

fn encode_field_raw(out: &mut Vec<u8>, repr: FieldRepr, raw: FieldRaw) {
    match (repr, raw) {
        (FieldRepr::FixedI32, FieldRaw::FixedI32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (FieldRepr::U8, FieldRaw::U8(v)) => out.push(v),
        (FieldRepr::Bool, FieldRaw::Bool(v)) => out.push(v as u8),
        (FieldRepr::F32, FieldRaw::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (repr, raw) => unreachable!("field repr {repr:?} does not match value {raw:?}"),
    }
}

fn decode_field_raw(buf: &[u8], repr: FieldRepr) -> Result<(FieldRaw, &[u8]), CodecError> {
    let width = field_width(repr);
    if buf.len() < width {
        return Err(CodecError::Truncated { needed: width - buf.len() });
    }
    let (bytes, rest) = buf.split_at(width);
    let raw = match repr {
        FieldRepr::FixedI32 => FieldRaw::FixedI32(i32::from_le_bytes(bytes.try_into().unwrap())),
        FieldRepr::U8 => FieldRaw::U8(bytes[0]),
        FieldRepr::Bool => FieldRaw::Bool(bytes[0] != 0),
        FieldRepr::F32 => FieldRaw::F32(f32::from_le_bytes(bytes.try_into().unwrap())),
    };
    Ok((raw, rest))
}

pub fn encode_snapshot(snapshot: &SparseSnapshot, registry: &ComponentRegistry) -> Result<Vec<u8>, CodecError> {
    let entity_meta: Vec<EntityMeta> = snapshot
        .entities
        .iter()
        .map(|e| EntityMeta {
            eid: e.eid,
            type_index: e.type_index,
            client_id: e.client_id.clone(),
        })
        .collect();

    let meta = FrameMeta {
        frame: snapshot.frame,
        seq: snapshot.seq,
        post_tick: snapshot.post_tick,
        entity_types: snapshot.entity_types.clone(),
        schema: snapshot.schema.clone(),
        entity_meta,
        world_state: snapshot.world_state.clone(),
    };
    let meta_bytes = serde_json::to_vec(&meta).map_err(|e| CodecError::InvalidMeta { details: e.to_string() })?;

    let mut out = Vec::with_capacity(4 + meta_bytes.len());
    out.extend_from_slice(&(meta_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta_bytes);

    for (type_index, type_schema) in snapshot.schema.iter().enumerate() {
        let entries: Vec<&EntityEntry> = snapshot
            .entities
            .iter()
            .filter(|e| e.type_index as usize == type_index)
            .collect();

        let mut field_offset = 0usize;
        for (comp_name, field_names) in &type_schema.components {
            let comp_id = registry
                .lookup_by_name(comp_name)
                .ok_or_else(|| CodecError::UnknownComponent { name: comp_name.clone() })?;
            let comp_schema = registry.schema(comp_id);
            for field_name in field_names {
                let field_idx = comp_schema.field_index(field_name).unwrap();
                let repr = comp_schema.fields[field_idx].repr;
                for entry in &entries {
                    encode_field_raw(&mut out, repr, entry.values[field_offset]);
                }
                field_offset += 1;
            }
        }
    }

    Ok(out)
}

pub fn decode_snapshot(bytes: &[u8], registry: &ComponentRegistry) -> Result<SparseSnapshot, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Truncated { needed: 4 - bytes.len() });
    }
    let meta_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
    if bytes.len() < 4 + meta_len {
        return Err(CodecError::Truncated { needed: 4 + meta_len - bytes.len() });
    }
    let meta: FrameMeta = serde_json::from_slice(&bytes[4..4 + meta_len])
        .map_err(|e| CodecError::InvalidMeta { details: e.to_string() })?;
    let mut rest = &bytes[4 + meta_len..];

    let mut values_per_entity: Vec<Vec<FieldRaw>> = vec![Vec::new(); meta.entity_meta.len()];

    for (type_index, type_schema) in meta.schema.iter().enumerate() {
        let indices: Vec<usize> = meta
            .entity_meta
            .iter()
            .enumerate()
            .filter(|(_, m)| m.type_index as usize == type_index)
            .map(|(i, _)| i)
            .collect();

        for (comp_name, field_names) in &type_schema.components {
            let comp_id = registry
                .lookup_by_name(comp_name)
                .ok_or_else(|| CodecError::UnknownComponent { name: comp_name.clone() })?;
            let comp_schema = registry.schema(comp_id);
            for field_name in field_names {
                let field_idx = comp_schema.field_index(field_name).unwrap();
                let repr = comp_schema.fields[field_idx].repr;
                for &i in &indices {
                    let (raw, next) = decode_field_raw(rest, repr)?;
                    values_per_entity[i].push(raw);
                    rest = next;
                }
            }
        }
    }

    let entities = meta
        .entity_meta
        .into_iter()
        .zip(values_per_entity)
        .map(|(m, values)| EntityEntry {
            eid: m.eid,
            type_index: m.type_index,
            client_id: m.client_id,
            values,
        })
        .collect();

    Ok(SparseSnapshot {
        frame: meta.frame,
        seq: meta.seq,
        post_tick: meta.post_tick,
        entity_types: meta.entity_types,
        schema: meta.schema,
        entities,
        world_state: meta.world_state,
    })
}

/// Fallback decoder for transports that re-serialize a binary snapshot blob
/// through `JSON.stringify`, turning it into an object keyed by
/// integer-string indices (`{"0": 12, "1": 255, ...}`) instead of leaving it
/// as a byte array. Reassembles the bytes in index order and decodes them
/// with [`decode_snapshot`] as usual. The binary form is canonical; this
/// exists only for interop with older transports that produce this shape.
#[cfg(feature = "legacy-json-snapshot")]
pub fn decode_legacy_json(value: &serde_json::Value, registry: &ComponentRegistry) -> Result<SparseSnapshot, CodecError> {
    let obj = value
        .as_object()
        .ok_or_else(|| CodecError::InvalidMeta { details: "legacy snapshot payload is not a JSON object".to_string() })?;

    let mut indexed: Vec<(usize, u8)> = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        let index: usize = key
            .parse()
            .map_err(|_| CodecError::InvalidMeta { details: format!("legacy snapshot key '{key}' is not an integer index") })?;
        let byte = val
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .ok_or_else(|| CodecError::InvalidMeta { details: format!("legacy snapshot value at key '{key}' is not a byte") })?;
        indexed.push((index, byte));
    }
    indexed.sort_unstable_by_key(|&(i, _)| i);

    let bytes: Vec<u8> = indexed.into_iter().map(|(_, b)| b).collect();
    decode_snapshot(&bytes, registry)
}
