//! Wire-level primitives shared by the snapshot codec and the network
//! driver: tagged primitive value encoding, entity ID encoding, and the
//! `Transport` trait an embedder implements to move bytes.

pub mod entity_wire;
pub mod transport;
pub mod value;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of buffer while decoding")]
    Truncated,

    #[error("unknown value tag {tag}")]
    UnknownTag { tag: u8 },

    #[error("string payload was not valid utf-8")]
    InvalidUtf8,

    #[error("transport failure: {details}")]
    Transport { details: String },
}

pub mod prelude {
    pub use crate::entity_wire::{decode_entity_id, encode_entity_id};
    pub use crate::transport::Transport;
    pub use crate::value::WireValue;
    pub use crate::WireError;
}
