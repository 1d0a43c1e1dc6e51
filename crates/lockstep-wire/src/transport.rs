//! The thin transport boundary the core simulation assumes. An embedder
//! implements inbound delivery by calling the `on_*` methods as messages
//! arrive, and drives outbound traffic through the plain `send_*` methods.
//! Every method returns a `Result` so a transport failure is surfaced to the
//! embedder rather than panicking the simulation -- the simulation itself
//! keeps running locally if a send fails (offline fallback).

use crate::WireError;

pub struct ReliabilityUpdate {
    pub scores: Vec<(String, u8)>,
    pub version: u64,
}

pub trait Transport {
    fn on_connect(
        &mut self,
        snapshot_bytes: Option<&[u8]>,
        pending_inputs: &[Vec<u8>],
        server_frame: u64,
        server_fps: u32,
        assigned_client_id: &str,
    ) -> Result<(), WireError>;

    fn on_tick(&mut self, frame: u64, inputs: &[Vec<u8>], majority_hash_for_prior_frame: Option<u32>) -> Result<(), WireError>;

    fn on_binary_snapshot(&mut self, bytes: &[u8]) -> Result<(), WireError>;

    fn on_reliability_update(&mut self, update: ReliabilityUpdate) -> Result<(), WireError>;

    fn on_majority_hash(&mut self, frame: u64, hash: u32) -> Result<(), WireError>;

    fn on_resync_snapshot(&mut self, bytes: &[u8], frame: u64) -> Result<(), WireError>;

    fn on_disconnect(&mut self) -> Result<(), WireError>;

    fn send(&mut self, bytes: &[u8]) -> Result<(), WireError>;

    fn send_snapshot(&mut self, bytes: &[u8], hash: u32, seq: u64, frame: u64) -> Result<(), WireError>;

    fn send_state_hash(&mut self, frame: u64, hash: u32) -> Result<(), WireError>;

    fn send_partition_data(&mut self, frame: u64, partition_id: u32, bytes: &[u8]) -> Result<(), WireError>;

    fn request_resync(&mut self) -> Result<(), WireError>;

    fn leave_room(&mut self) -> Result<(), WireError>;
}
