//! Bounded, frame-indexed snapshot history used by the divergence-recovery
//! path: roll the world back to a known-good frame, then replay forward.
//!
//! Modeled as a ring keyed by frame number rather than write position, since
//! callers look entries up by frame rather than by insertion order.

use std::collections::HashMap;

use lockstep_ecs::snapshot::SparseSnapshot;

pub const DEFAULT_MAX_FRAMES: u64 = 60;

#[derive(Debug)]
pub struct RollbackBuffer {
    max_frames: u64,
    entries: HashMap<u64, SparseSnapshot>,
}

impl RollbackBuffer {
    pub fn new(max_frames: u64) -> RollbackBuffer {
        RollbackBuffer {
            max_frames: max_frames.max(1),
            entries: HashMap::new(),
        }
    }

    /// Insert a snapshot for `frame`, evicting every entry older than the
    /// retained window.
    pub fn save(&mut self, frame: u64, snapshot: SparseSnapshot) {
        self.entries.insert(frame, snapshot);
        let floor = frame.saturating_sub(self.max_frames - 1);
        self.entries.retain(|&f, _| f >= floor);
    }

    pub fn get(&self, frame: u64) -> Option<&SparseSnapshot> {
        self.entries.get(&frame)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Most recent retained frame, if any.
    pub fn latest_frame(&self) -> Option<u64> {
        self.entries.keys().copied().max()
    }
}
