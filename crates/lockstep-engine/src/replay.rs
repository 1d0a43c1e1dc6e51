//! Deterministic replay with input recording and checkpoint verification.
//!
//! Records inputs and periodic state-hash checkpoints during a run into a
//! [`ReplayLog`]. [`replay`] then restores the initial snapshot and feeds
//! the recorded inputs tick-by-tick, comparing state hashes at each
//! checkpoint to catch any determinism regression.
//!
//! # Recording
//!
//! ```
//! use lockstep_engine::prelude::*;
//! use lockstep_ecs::input_registry::Input;
//!
//! let mut sim = Simulation::new(SimulationConfig { max_entities: 8, ..Default::default() }, false);
//! let snapshot = sim.world.get_sparse_snapshot(0, 0, true);
//! let mut recorder = ReplayRecorder::new(snapshot, 10);
//!
//! for frame in 1..=5u64 {
//!     let hash = sim.tick(frame).unwrap();
//!     recorder.record_tick(frame, &[] as &[Input], Some(hash));
//! }
//!
//! let log = recorder.finish();
//! assert_eq!(log.total_ticks, 5);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lockstep_ecs::input_registry::Input;
use lockstep_ecs::snapshot::SparseSnapshot;

use crate::simulation::Simulation;
use crate::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayLog {
    /// Snapshot replay begins by restoring.
    pub initial_snapshot: SparseSnapshot,
    /// Number of ticks to run from the initial snapshot's frame.
    pub total_ticks: u64,
    pub entries: Vec<ReplayEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplayEntry {
    Input { frame: u64, input: Input },
    Checkpoint { frame: u64, state_hash: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResult {
    pub completed: bool,
    pub ticks_replayed: u64,
    pub first_divergence: Option<ReplayDivergence>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDivergence {
    pub frame: u64,
    pub expected_hash: u32,
    pub actual_hash: u32,
}

/// Records a simulation run into a [`ReplayLog`]. Ticks must be recorded in
/// strictly increasing frame order.
pub struct ReplayRecorder {
    log: ReplayLog,
    checkpoint_interval: u64,
    ticks_recorded: u64,
    last_frame: Option<u64>,
}

impl ReplayRecorder {
    /// `checkpoint_interval` of 0 means "checkpoint on every tick a hash is
    /// supplied for"; otherwise checkpoints land every `checkpoint_interval`
    /// frames.
    pub fn new(initial_snapshot: SparseSnapshot, checkpoint_interval: u64) -> ReplayRecorder {
        ReplayRecorder {
            log: ReplayLog {
                initial_snapshot,
                total_ticks: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
            ticks_recorded: 0,
            last_frame: None,
        }
    }

    /// Call before executing the tick at `frame`, with the inputs applied
    /// for that tick and (optionally) the state hash computed after the
    /// tick ran.
    pub fn record_tick(&mut self, frame: u64, inputs: &[Input], state_hash: Option<u32>) {
        if let Some(prev) = self.last_frame {
            assert!(frame > prev, "ReplayRecorder::record_tick: frame {frame} did not increase past {prev}");
        }
        self.last_frame = Some(frame);
        self.ticks_recorded += 1;

        for input in inputs {
            self.log.entries.push(ReplayEntry::Input { frame, input: input.clone() });
        }

        if let Some(hash) = state_hash {
            let should_checkpoint = self.checkpoint_interval == 0 || frame % self.checkpoint_interval == 0;
            if should_checkpoint {
                self.log.entries.push(ReplayEntry::Checkpoint { frame, state_hash: hash });
            }
        }
    }

    pub fn finish(mut self) -> ReplayLog {
        self.log.total_ticks = self.ticks_recorded;
        self.log
    }
}

/// Replays `log` against `sim`, verifying determinism at each checkpoint.
/// Validates the log before mutating `sim` -- on error, `sim` is left
/// untouched.
pub fn replay(sim: &mut Simulation, log: &ReplayLog) -> Result<ReplayResult, EngineError> {
    let mut inputs_by_frame: BTreeMap<u64, Vec<Input>> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, u32> = BTreeMap::new();

    for entry in &log.entries {
        match entry {
            ReplayEntry::Input { frame, input } => inputs_by_frame.entry(*frame).or_default().push(input.clone()),
            ReplayEntry::Checkpoint { frame, state_hash } => {
                checkpoints.insert(*frame, *state_hash);
            }
        }
    }

    if log.total_ticks == 0 {
        return Ok(ReplayResult { completed: true, ticks_replayed: 0, first_divergence: None });
    }

    let start_frame = log.initial_snapshot.frame + 1;
    let end_frame = start_frame
        .checked_add(log.total_ticks - 1)
        .ok_or(EngineError::NoRollbackEntry { frame: start_frame })?;

    sim.world.load_sparse_snapshot(&log.initial_snapshot)?;
    sim.world.advance_frame(log.initial_snapshot.frame);

    let mut ticks_replayed = 0u64;
    for frame in start_frame..=end_frame {
        if let Some(inputs) = inputs_by_frame.get(&frame) {
            for input in inputs {
                sim.set_input(input.clone());
            }
        }

        let actual_hash = sim.tick(frame)?;
        ticks_replayed += 1;

        if let Some(&expected_hash) = checkpoints.get(&frame) {
            if actual_hash != expected_hash {
                return Ok(ReplayResult {
                    completed: false,
                    ticks_replayed,
                    first_divergence: Some(ReplayDivergence { frame, expected_hash, actual_hash }),
                });
            }
        }
    }

    Ok(ReplayResult { completed: true, ticks_replayed, first_divergence: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use lockstep_ecs::component::{ComponentSchema, FieldRaw, FieldRepr};
    use lockstep_ecs::scheduler::Phase;
    use lockstep_ecs::world::{EntityDef, World};

    fn move_right(world: &mut World) -> Result<(), lockstep_ecs::EcsError> {
        let comp = world.registry.lookup_by_name("transform").unwrap();
        for id in world.active_entities_sorted() {
            if let Some(FieldRaw::FixedI32(x)) = world.get_field(id, comp, 0) {
                world.set_field(id, comp, 0, FieldRaw::FixedI32(x + lockstep_math::fixed::FP_ONE));
            }
        }
        Ok(())
    }

    fn build_sim() -> Simulation {
        let mut sim = Simulation::new(SimulationConfig { max_entities: 32, ..Default::default() }, false);
        let transform = sim.world.register_component(
            ComponentSchema::new("transform").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
        );
        sim.world.register_entity_type(EntityDef::new("dot", vec![transform]));
        sim.scheduler.add_system(Phase::Update, "move_right", 0, move_right);
        sim.world.spawn("dot").unwrap();
        sim
    }

    #[test]
    fn replay_reproduces_recorded_hashes() {
        let mut sim = build_sim();
        let initial = sim.world.get_sparse_snapshot(0, 0, true);
        let mut recorder = ReplayRecorder::new(initial, 5);

        for frame in 1..=20u64 {
            let hash = sim.tick(frame).unwrap();
            recorder.record_tick(frame, &[], Some(hash));
        }
        let log = recorder.finish();

        let mut replay_sim = build_sim();
        let result = replay(&mut replay_sim, &log).unwrap();
        assert!(result.completed);
        assert!(result.first_divergence.is_none());
        assert_eq!(result.ticks_replayed, 20);
    }

    #[test]
    fn replay_detects_injected_divergence() {
        let mut sim = build_sim();
        let initial = sim.world.get_sparse_snapshot(0, 0, true);
        let mut recorder = ReplayRecorder::new(initial, 1);
        for frame in 1..=5u64 {
            let hash = sim.tick(frame).unwrap();
            recorder.record_tick(frame, &[], Some(hash));
        }
        let mut log = recorder.finish();
        if let ReplayEntry::Checkpoint { state_hash, .. } = &mut log.entries[2] {
            *state_hash ^= 0xFFFF_FFFF;
        }

        let mut replay_sim = build_sim();
        let result = replay(&mut replay_sim, &log).unwrap();
        assert!(!result.completed);
        assert!(result.first_divergence.is_some());
    }
}
