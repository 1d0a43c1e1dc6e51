//! Authority election, join flows, and majority-hash desync recovery.
//!
//! The simulation itself has no notion of a network; this module drives a
//! [`World`] + [`Scheduler`] pair through the join/steady-state/resync flows
//! described for a lockstep peer, using [`lockstep_codec`] for snapshot
//! bytes and [`lockstep_ecs::input_registry::Input`] for per-tick input.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, error, warn};

use lockstep_codec::binary_frame::{decode_snapshot, encode_snapshot};
use lockstep_ecs::input_registry::Input;
use lockstep_ecs::scheduler::Scheduler;
use lockstep_ecs::snapshot::SparseSnapshot;
use lockstep_ecs::world::World;

use crate::NetError;

pub const MAX_CATCHUP_FRAMES: u64 = 200;
pub const HASH_HISTORY_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesyncState {
    InSync,
    Desynced { resync_in_flight: bool },
}

pub struct JoinOutcome {
    pub hashes_by_frame: Vec<(u64, u32)>,
    pub baseline_snapshot: SparseSnapshot,
}

/// First joiner: create the room's world, apply whatever inputs arrived
/// alongside the creation message, tick once at frame 0, and produce the
/// snapshot every later joiner will catch up from.
pub fn init_first_joiner(world: &mut World, scheduler: &Scheduler, initial_inputs: &[Input]) -> Result<JoinOutcome, NetError> {
    for input in initial_inputs {
        world.set_input(input.clone());
    }
    world.run_phases(scheduler)?;
    let hash = world.compute_state_hash();
    let snapshot = world.get_sparse_snapshot(world.current_frame(), 0, true);
    Ok(JoinOutcome {
        hashes_by_frame: vec![(world.current_frame(), hash)],
        baseline_snapshot: snapshot,
    })
}

/// Late joiner: restore `snapshot`, replay any catch-up frames, and return
/// per-tick hashes recorded along the way. `inputs_by_frame` holds every
/// input keyed by the tick frame it targets; `on_snapshot` runs once,
/// immediately after the restore, under an RNG save/restore guard so it
/// cannot perturb the deterministic simulation.
pub fn join_late(
    world: &mut World,
    scheduler: &Scheduler,
    snapshot: &SparseSnapshot,
    inputs_by_frame: &BTreeMap<u64, Vec<Input>>,
    server_current_frame: u64,
    mut on_snapshot: Option<&mut dyn FnMut(&mut World)>,
) -> Result<JoinOutcome, NetError> {
    world.load_sparse_snapshot(snapshot)?;
    world.advance_frame(snapshot.frame);

    if let Some(hook) = on_snapshot.as_deref_mut() {
        let saved_rng = world.rng.save_state();
        hook(world);
        world.rng = lockstep_math::rng::Rng::from_state(saved_rng);
    }

    let start = snapshot.frame + if snapshot.post_tick { 1 } else { 0 };
    if server_current_frame < start {
        return Ok(JoinOutcome {
            hashes_by_frame: Vec::new(),
            baseline_snapshot: snapshot.clone(),
        });
    }
    let span = server_current_frame - start;
    if span > MAX_CATCHUP_FRAMES {
        return Err(NetError::CatchupTooLarge { span, cap: MAX_CATCHUP_FRAMES });
    }

    let mut hashes = Vec::new();
    for frame in start..=server_current_frame {
        if let Some(inputs) = inputs_by_frame.get(&frame) {
            for input in inputs {
                if input.seq <= snapshot.seq {
                    warn!(frame, seq = input.seq, "discarding stale input already reflected in snapshot");
                    continue;
                }
                world.set_input(input.clone());
            }
        }
        world.advance_frame(frame);
        world.run_phases(scheduler)?;
        hashes.push((frame, world.compute_state_hash()));
    }

    let baseline = world.get_sparse_snapshot(server_current_frame, 0, true);
    Ok(JoinOutcome {
        hashes_by_frame: hashes,
        baseline_snapshot: baseline,
    })
}

/// Picks the authority after a disconnect: the smallest-lexicographic
/// still-active client.
pub fn elect_authority<'a>(active_clients: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    active_clients.into_iter().min()
}

/// What a categorized input asked the driver to do, beyond whatever it
/// already did to `active_clients`/`authority`/the input registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEffect {
    /// Routed to the per-client input registry; no join/leave/resync handling.
    Routed,
    /// A client joined or reconnected.
    Joined,
    /// A client left or disconnected; authority may have migrated.
    Left,
    /// A `resync_request` was seen; the authority should upload a snapshot.
    ResyncRequested,
}

/// Tracks the rolling per-frame hash history, the desync state machine
/// driven by the server's periodic majority-hash broadcasts, and the
/// active-client/authority bookkeeping driven by `join`/`leave` inputs.
pub struct NetworkDriver {
    hash_history: VecDeque<(u64, u32)>,
    state: DesyncState,
    active_clients: Vec<String>,
    authority: Option<String>,
    snapshot_upload_pending: bool,
}

impl NetworkDriver {
    pub fn new() -> NetworkDriver {
        NetworkDriver {
            hash_history: VecDeque::with_capacity(HASH_HISTORY_WINDOW),
            state: DesyncState::InSync,
            active_clients: Vec::new(),
            authority: None,
            snapshot_upload_pending: false,
        }
    }

    pub fn state(&self) -> DesyncState {
        self.state
    }

    pub fn active_clients(&self) -> &[String] {
        &self.active_clients
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn is_authority(&self, client_id: &str) -> bool {
        self.authority.as_deref() == Some(client_id)
    }

    /// Returns whether a snapshot upload was scheduled since the last call,
    /// clearing the flag. The spec's "authority schedules snapshot upload"
    /// is deliberately not gated on identity here -- callers check
    /// [`NetworkDriver::is_authority`] for their own client ID before acting
    /// on it, since only the authority peer actually uploads.
    pub fn take_snapshot_upload_pending(&mut self) -> bool {
        std::mem::replace(&mut self.snapshot_upload_pending, false)
    }

    fn add_active_client(&mut self, client_id: &str) {
        if let Err(idx) = self.active_clients.binary_search_by(|c| c.as_str().cmp(client_id)) {
            self.active_clients.insert(idx, client_id.to_owned());
        }
    }

    fn remove_active_client(&mut self, client_id: &str) {
        if let Ok(idx) = self.active_clients.binary_search_by(|c| c.as_str().cmp(client_id)) {
            self.active_clients.remove(idx);
        }
    }

    /// Categorizes one input by `data.type` per the Network Driver's input
    /// semantics: `join`/`reconnect` add the client to the active list and
    /// designate an authority if there is none; `leave`/`disconnect` remove
    /// it and migrate authority to the smallest remaining client; a
    /// `resync_request` schedules an authority snapshot upload. Everything
    /// else falls through to the per-client input registry via
    /// [`World::set_input`]. `on_connect`/`on_disconnect` run under an RNG
    /// save/restore guard since they may run on only a subset of peers.
    pub fn process_input(
        &mut self,
        world: &mut World,
        input: &Input,
        on_connect: Option<&mut dyn FnMut(&mut World, &str)>,
        on_disconnect: Option<&mut dyn FnMut(&mut World, &str)>,
    ) -> InputEffect {
        match input.data.get("type").and_then(|v| v.as_str()) {
            Some("join") | Some("reconnect") => {
                self.add_active_client(&input.client_id);
                if self.authority.is_none() {
                    self.authority = Some(input.client_id.clone());
                }
                if let Some(hook) = on_connect {
                    let saved = world.rng.save_state();
                    hook(world, &input.client_id);
                    world.rng = lockstep_math::rng::Rng::from_state(saved);
                }
                InputEffect::Joined
            }
            Some("leave") | Some("disconnect") => {
                self.remove_active_client(&input.client_id);
                if self.authority.as_deref() == Some(input.client_id.as_str()) {
                    self.authority = elect_authority(self.active_clients.iter().map(|c| c.as_str())).map(str::to_owned);
                }
                if let Some(hook) = on_disconnect {
                    let saved = world.rng.save_state();
                    hook(world, &input.client_id);
                    world.rng = lockstep_math::rng::Rng::from_state(saved);
                }
                self.snapshot_upload_pending = true;
                InputEffect::Left
            }
            Some("resync_request") => {
                self.snapshot_upload_pending = true;
                InputEffect::ResyncRequested
            }
            _ => {
                world.set_input(input.clone());
                InputEffect::Routed
            }
        }
    }

    pub fn record_hash(&mut self, frame: u64, hash: u32) {
        if self.hash_history.len() == HASH_HISTORY_WINDOW {
            self.hash_history.pop_front();
        }
        self.hash_history.push_back((frame, hash));
    }

    pub fn hash_for_frame(&self, frame: u64) -> Option<u32> {
        self.hash_history.iter().find(|&&(f, _)| f == frame).map(|&(_, h)| h)
    }

    /// Compares the server's reported majority hash for `frame` against our
    /// own recorded hash for that frame, updating the desync state machine.
    /// Returns `true` if a resync request should be issued.
    pub fn check_majority_hash(&mut self, frame: u64, majority_hash: u32) -> bool {
        let local = match self.hash_for_frame(frame) {
            Some(h) => h,
            None => {
                debug!(frame, "no local hash recorded for majority-hash comparison");
                return false;
            }
        };

        if local == majority_hash {
            if matches!(self.state, DesyncState::Desynced { resync_in_flight: false }) {
                debug!(frame, "recovered from desync");
                self.state = DesyncState::InSync;
            }
            false
        } else {
            match self.state {
                DesyncState::Desynced { resync_in_flight: true } => false,
                _ => {
                    warn!(frame, local, majority_hash, "hash mismatch, requesting resync");
                    self.state = DesyncState::Desynced { resync_in_flight: true };
                    true
                }
            }
        }
    }

    /// Applies a resync snapshot: decodes it, logs a field-by-field diff
    /// against the current world, loads it, and resets desync bookkeeping.
    pub fn apply_resync(
        &mut self,
        world: &mut World,
        bytes: &[u8],
        server_frame: u64,
    ) -> Result<(), NetError> {
        let decoded = decode_snapshot(bytes, &world.registry)?;
        log_snapshot_diff(world, &decoded);

        world.load_sparse_snapshot(&decoded)?;
        world.advance_frame(server_frame);
        self.hash_history.clear();
        let hash = world.compute_state_hash();
        self.record_hash(server_frame, hash);
        self.state = DesyncState::InSync;
        Ok(())
    }

    /// Encodes the authority's resync snapshot for broadcast.
    pub fn encode_resync(world: &World) -> Result<Vec<u8>, NetError> {
        let snapshot = world.get_sparse_snapshot(world.current_frame(), 0, true);
        Ok(encode_snapshot(&snapshot, &world.registry)?)
    }
}

impl Default for NetworkDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn log_snapshot_diff(world: &World, incoming: &SparseSnapshot) {
    let current = world.get_sparse_snapshot(world.current_frame(), 0, true);
    let mut by_eid: BTreeMap<u32, &lockstep_ecs::snapshot::EntityEntry> =
        current.entities.iter().map(|e| (e.eid, e)).collect();

    for entry in &incoming.entities {
        match by_eid.remove(&entry.eid) {
            Some(local) if local.values.len() == entry.values.len() => {
                for (i, (a, b)) in local.values.iter().zip(&entry.values).enumerate() {
                    if a != b {
                        error!(eid = entry.eid, field = i, local = ?a, authority = ?b, "resync field mismatch");
                    }
                }
            }
            Some(_) => error!(eid = entry.eid, "resync value-vector length mismatch"),
            None => error!(eid = entry.eid, "resync introduces an entity missing locally"),
        }
    }
    for (eid, _) in by_eid {
        error!(eid, "resync removes an entity present locally");
    }
}
