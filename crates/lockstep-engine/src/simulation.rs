//! Top-level facade wiring the ECS world, the phased scheduler, the
//! rollback history, and the network driver into one simulation instance.
//!
//! A [`Simulation`] is the thing an embedder actually owns: it exposes
//! `tick`, the join flows, and the majority-hash/resync path without
//! requiring the caller to juggle `lockstep-ecs`/`lockstep-codec`/
//! `lockstep-net` directly.

use std::collections::BTreeMap;

use lockstep_codec::rollback::RollbackBuffer;
use lockstep_ecs::input_registry::Input;
use lockstep_ecs::scheduler::Scheduler;
use lockstep_ecs::snapshot::SparseSnapshot;
use lockstep_ecs::world::World;
use lockstep_net::driver::{self, DesyncState, InputEffect, JoinOutcome, NetworkDriver};

use crate::config::SimulationConfig;
use crate::EngineError;

pub struct Simulation {
    pub world: World,
    pub scheduler: Scheduler,
    config: SimulationConfig,
    rollback: RollbackBuffer,
    net: NetworkDriver,
}

impl Simulation {
    pub fn new(config: SimulationConfig, is_client: bool) -> Simulation {
        let mut world = World::new(config.max_entities as u32);
        world.is_client = is_client;
        let rollback = RollbackBuffer::new(config.rollback_frames);
        Simulation {
            world,
            scheduler: Scheduler::new(),
            config,
            rollback,
            net: NetworkDriver::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn desync_state(&self) -> DesyncState {
        self.net.state()
    }

    /// Runs one tick at `frame`, then records the post-tick hash and a
    /// rollback checkpoint.
    pub fn tick(&mut self, frame: u64) -> Result<u32, EngineError> {
        self.world.advance_frame(frame);
        self.world.run_phases(&self.scheduler)?;
        let hash = self.world.compute_state_hash();
        self.net.record_hash(frame, hash);
        self.rollback.save(frame, self.world.get_sparse_snapshot(frame, 0, true));
        Ok(hash)
    }

    pub fn set_input(&mut self, input: Input) {
        self.world.set_input(input);
    }

    /// Categorizes `input` by `data.type` (join/reconnect/leave/disconnect/
    /// resync_request vs. ordinary gameplay input) and updates the active
    /// client list, authority, and pending-snapshot-upload bookkeeping
    /// accordingly, before falling through to [`Simulation::set_input`] for
    /// anything else. See [`NetworkDriver::process_input`].
    pub fn process_input(
        &mut self,
        input: &Input,
        on_connect: Option<&mut dyn FnMut(&mut World, &str)>,
        on_disconnect: Option<&mut dyn FnMut(&mut World, &str)>,
    ) -> InputEffect {
        self.net.process_input(&mut self.world, input, on_connect, on_disconnect)
    }

    pub fn active_clients(&self) -> &[String] {
        self.net.active_clients()
    }

    pub fn authority(&self) -> Option<&str> {
        self.net.authority()
    }

    pub fn is_authority(&self, client_id: &str) -> bool {
        self.net.is_authority(client_id)
    }

    /// Returns and clears whether a snapshot upload was scheduled since the
    /// last call (by a `leave`/`disconnect` or `resync_request` input).
    /// Callers should gate the actual upload on [`Simulation::is_authority`].
    pub fn take_snapshot_upload_pending(&mut self) -> bool {
        self.net.take_snapshot_upload_pending()
    }

    /// Rolls back to a previously saved frame and replays forward to
    /// `target_frame`, applying `inputs_by_frame` along the way. Used by the
    /// divergence-recovery path when a local snapshot is still trustworthy
    /// enough to avoid a full authority resync.
    pub fn rollback_and_replay(
        &mut self,
        from_frame: u64,
        target_frame: u64,
        inputs_by_frame: &BTreeMap<u64, Vec<Input>>,
    ) -> Result<u32, EngineError> {
        let snapshot = self
            .rollback
            .get(from_frame)
            .cloned()
            .ok_or(EngineError::NoRollbackEntry { frame: from_frame })?;
        self.world.load_sparse_snapshot(&snapshot)?;
        self.world.advance_frame(from_frame);

        let mut hash = self.world.compute_state_hash();
        for frame in (from_frame + 1)..=target_frame {
            if let Some(inputs) = inputs_by_frame.get(&frame) {
                for input in inputs {
                    self.world.set_input(input.clone());
                }
            }
            hash = self.tick(frame)?;
        }
        Ok(hash)
    }

    pub fn init_first_joiner(&mut self, initial_inputs: &[Input]) -> Result<JoinOutcome, EngineError> {
        let outcome = driver::init_first_joiner(&mut self.world, &self.scheduler, initial_inputs)?;
        if let Some((frame, hash)) = outcome.hashes_by_frame.last() {
            self.net.record_hash(*frame, *hash);
        }
        Ok(outcome)
    }

    pub fn join_late(
        &mut self,
        snapshot: &SparseSnapshot,
        inputs_by_frame: &BTreeMap<u64, Vec<Input>>,
        server_current_frame: u64,
        on_snapshot: Option<&mut dyn FnMut(&mut World)>,
    ) -> Result<JoinOutcome, EngineError> {
        let outcome = driver::join_late(
            &mut self.world,
            &self.scheduler,
            snapshot,
            inputs_by_frame,
            server_current_frame,
            on_snapshot,
        )?;
        for &(frame, hash) in &outcome.hashes_by_frame {
            self.net.record_hash(frame, hash);
        }
        Ok(outcome)
    }

    /// Compares a server-reported majority hash against our local record for
    /// that frame. Returns `true` if a resync should be requested.
    pub fn check_majority_hash(&mut self, frame: u64, majority_hash: u32) -> bool {
        self.net.check_majority_hash(frame, majority_hash)
    }

    pub fn apply_resync(&mut self, bytes: &[u8], server_frame: u64) -> Result<(), EngineError> {
        self.net.apply_resync(&mut self.world, bytes, server_frame)?;
        self.rollback.clear();
        Ok(())
    }

    pub fn encode_resync(&self) -> Result<Vec<u8>, EngineError> {
        Ok(NetworkDriver::encode_resync(&self.world)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_ecs::component::{ComponentSchema, FieldRaw, FieldRepr};
    use lockstep_ecs::scheduler::Phase;
    use lockstep_ecs::world::EntityDef;

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
        let mut sim = Simulation::new(SimulationConfig { max_entities: 64, ..Default::default() }, false);
        let transform = sim.world.register_component(
            ComponentSchema::new("transform").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
        );
        sim.world.register_entity_type(EntityDef::new("dot", vec![transform]));
        sim.scheduler.add_system(Phase::Update, "move_right", 0, move_right);
        sim.world.spawn("dot").unwrap();
        sim
    }

    #[test]
    fn ticking_advances_and_hashes_deterministically() {
        let mut a = build_sim();
        let mut b = build_sim();
        for frame in 1..=10 {
            assert_eq!(a.tick(frame).unwrap(), b.tick(frame).unwrap());
        }
    }

    #[test]
    fn rollback_and_replay_reaches_the_same_hash_as_direct_ticking() {
        let mut direct = build_sim();
        for frame in 1..=20 {
            direct.tick(frame).unwrap();
        }
        let direct_hash = direct.world.compute_state_hash();

        let mut replayed = build_sim();
        for frame in 1..=10 {
            replayed.tick(frame).unwrap();
        }
        let hash = replayed.rollback_and_replay(5, 20, &BTreeMap::new()).unwrap();
        assert_eq!(hash, direct_hash);
    }
}
