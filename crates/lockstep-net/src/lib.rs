//! Authority-driven network synchronization layered on top of the sparse
//! snapshot codec: partition sender selection, late-joiner catchup, and
//! majority-hash desync detection/recovery.

pub mod driver;
pub mod partition;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("catchup span of {span} frames exceeds the cap of {cap}")]
    CatchupTooLarge { span: u64, cap: u64 },

    #[error(transparent)]
    Codec(#[from] lockstep_codec::CodecError),

    #[error(transparent)]
    Ecs(#[from] lockstep_ecs::EcsError),

    #[error(transparent)]
    Wire(#[from] lockstep_wire::WireError),
}

pub mod prelude {
    pub use crate::driver::{DesyncState, InputEffect, JoinOutcome, NetworkDriver};
    pub use crate::partition::{degradation_tier, pick_partition_senders, DegradationTier};
    pub use crate::NetError;
}
