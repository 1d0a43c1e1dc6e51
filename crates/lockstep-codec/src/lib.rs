//! Binary framing, rollback history, and delta compression for sparse
//! world snapshots. This crate only ever handles bytes and
//! [`lockstep_ecs::snapshot::SparseSnapshot`] values -- it never touches a
//! live [`lockstep_ecs::world::World`] beyond borrowing its component
//! registry to resolve field widths.

pub mod binary_frame;
pub mod delta;
pub mod rollback;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("snapshot frame truncated: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("meta section was not valid JSON: {details}")]
    InvalidMeta { details: String },

    #[error("unknown component '{name}' referenced by snapshot meta")]
    UnknownComponent { name: String },

    #[error("delta assembly mismatch: partitions disagree on frame ({a} vs {b})")]
    PartitionFrameMismatch { a: u64, b: u64 },
}

pub mod prelude {
    pub use crate::binary_frame::{decode_snapshot, encode_snapshot};
    pub use crate::delta::{apply_delta, assemble_delta, compute_delta, num_partitions, partition_delta, SnapshotDelta};
    pub use crate::rollback::RollbackBuffer;
    pub use crate::CodecError;
}
