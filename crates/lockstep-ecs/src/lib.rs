//! Archetype-free entity-component store for a deterministic lockstep
//! simulation.
//!
//! Entities are plain generational IDs (see [`entity`]); components are
//! declared by runtime schema and stored column-wise, one flat array per
//! field, indexed directly by entity index (see [`component`]) -- there
//! are no archetypes to move entities between. [`query`] resolves queries
//! by intersecting index sets rather than walking tables. [`scheduler`]
//! runs registered systems across the six standard phases. [`world`] ties
//! all of this together into one simulation instance, and [`snapshot`]
//! captures/restores it in a sparse, type-indexed form.
//!
//! # Quick start
//!
//! ```
//! use lockstep_ecs::prelude::*;
//!
//! let mut world = World::new(1024);
//! let transform = world.register_component(
//!     ComponentSchema::new("transform")
//!         .field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0))
//!         .field("y", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
//! );
//! world.register_entity_type(EntityDef::new("dot", vec![transform]));
//!
//! let dot = world.spawn("dot").unwrap();
//! world.set_field(dot, transform, 0, FieldRaw::FixedI32(lockstep_math::fixed::FP_ONE));
//! assert_eq!(world.get_field(dot, transform, 0), Some(FieldRaw::FixedI32(lockstep_math::fixed::FP_ONE)));
//! ```

pub mod component;
pub mod entity;
pub mod input_registry;
pub mod query;
pub mod scheduler;
pub mod snapshot;
pub mod string_registry;
pub mod world;

#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    #[error("entity type '{name}' is not registered")]
    UnknownEntityType { name: String },

    #[error("component '{name}' is not registered")]
    UnknownComponent { name: String },

    #[error("entity {entity:?} does not have component '{component}'")]
    MissingComponent { entity: entity::EntityId, component: String },

    #[error("entity {entity:?} is stale or was never allocated")]
    StaleEntity { entity: entity::EntityId },

    #[error("allocator exhausted: no free entity slots remain")]
    EntitiesExhausted,

    #[error("snapshot decode failed: {details}")]
    SnapshotDecode { details: String },

    #[error("system '{name}' returned an error: {details}")]
    SystemFailed { name: String, details: String },
}

pub mod prelude {
    pub use crate::component::{ComponentColumns, ComponentRegistry, ComponentSchema, ComponentTypeId, FieldRaw, FieldRepr};
    pub use crate::entity::EntityId;
    pub use crate::input_registry::{Input, InputRegistry};
    pub use crate::query::{EntityIndex, EntityTypeId};
    pub use crate::scheduler::{Phase, Scheduler};
    pub use crate::snapshot::SparseSnapshot;
    pub use crate::world::{EntityDef, RenderScratch, World};
    pub use crate::EcsError;
}
