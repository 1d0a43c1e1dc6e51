//! Configuration for a [`crate::simulation::Simulation`] instance.

/// Tunables for one simulation instance. Defaults match the constants
/// called out for sizing the allocator, rollback history, and partition
/// sync.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Maximum live entities; also bounds the entity index space.
    pub max_entities: usize,
    /// How many past frames the rollback buffer retains.
    pub rollback_frames: u64,
    /// Default clients sampled per delta partition.
    pub senders_per_partition: u32,
    /// Maximum frames a late joiner may replay before a resync is requested
    /// instead of a full catchup.
    pub catchup_cap: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_entities: 10_000,
            rollback_frames: lockstep_codec::rollback::DEFAULT_MAX_FRAMES,
            senders_per_partition: lockstep_net::partition::DEFAULT_SENDERS_PER_PARTITION,
            catchup_cap: lockstep_net::driver::MAX_CATCHUP_FRAMES,
        }
    }
}
