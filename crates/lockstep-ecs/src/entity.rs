//! Entity identifiers and allocation.
//!
//! An [`EntityId`] packs a 12-bit generation counter into the high bits and
//! a 20-bit index into the low bits of a single `u32`, plus a separate
//! "local" flag bit (30) that marks entities drawn from a parallel
//! allocator and never serialized. The generation is bumped (mod 4096)
//! every time an index is recycled so stale IDs are detected immediately.

use serde::{Deserialize, Serialize};

pub const INDEX_BITS: u32 = 20;
pub const GENERATION_BITS: u32 = 12;
pub const MAX_GENERATION: u32 = (1 << GENERATION_BITS) - 1;
pub const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
/// Bit 30: marks an entity as local-only (never serialized, never networked).
pub const LOCAL_ENTITY_BIT: u32 = 0x4000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    pub fn new(index: u32, generation: u32) -> EntityId {
        debug_assert!(index <= INDEX_MASK, "entity index out of range: {index}");
        debug_assert!(
            generation <= MAX_GENERATION,
            "entity generation out of range: {generation}"
        );
        EntityId((generation << INDEX_BITS) | (index & INDEX_MASK))
    }

    pub fn new_local(index: u32, generation: u32) -> EntityId {
        let base = Self::new(index, generation);
        EntityId(base.0 | LOCAL_ENTITY_BIT)
    }

    pub fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    pub fn generation(self) -> u32 {
        (self.0 >> INDEX_BITS) & MAX_GENERATION
    }

    pub fn is_local(self) -> bool {
        self.0 & LOCAL_ENTITY_BIT != 0
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }

    pub fn from_raw(raw: u32) -> EntityId {
        EntityId(raw)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

/// Serializable allocator state: next free index, the sorted free list, and
/// per-index generation counters (length == `next_index`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorState {
    pub next_index: u32,
    pub free_list: Vec<u32>,
    pub generations: Vec<u32>,
}

/// Allocates and recycles entity indices with a generation counter per
/// index, maintaining the free list in ascending sorted order so snapshot
/// restore and allocator diffing are order-independent.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next_index: u32,
    free_list: Vec<u32>,
    generations: Vec<u32>,
    alive: Vec<bool>,
    max_entities: u32,
    local: bool,
}

impl EntityAllocator {
    pub fn new(max_entities: u32) -> EntityAllocator {
        EntityAllocator {
            next_index: 0,
            free_list: Vec::new(),
            generations: Vec::new(),
            alive: Vec::new(),
            max_entities,
            local: false,
        }
    }

    pub fn new_local(max_entities: u32) -> EntityAllocator {
        let mut allocator = EntityAllocator::new(max_entities);
        allocator.local = true;
        allocator
    }

    fn make_id(&self, index: u32, generation: u32) -> EntityId {
        if self.local {
            EntityId::new_local(index, generation)
        } else {
            EntityId::new(index, generation)
        }
    }

    /// Allocate the next available entity ID, preferring a recycled index.
    pub fn allocate(&mut self) -> Option<EntityId> {
        if let Some(index) = self.free_list.first().copied() {
            self.free_list.remove(0);
            self.alive[index as usize] = true;
            return Some(self.make_id(index, self.generations[index as usize]));
        }

        if self.next_index >= self.max_entities {
            return None;
        }

        let index = self.next_index;
        self.next_index += 1;
        self.generations.push(0);
        self.alive.push(true);
        Some(self.make_id(index, 0))
    }

    /// Free a previously allocated entity. Returns `false` if the ID was
    /// already stale or never allocated.
    pub fn free(&mut self, id: EntityId) -> bool {
        let index = id.index();
        if index >= self.next_index || !self.is_valid(id) {
            return false;
        }
        self.alive[index as usize] = false;
        self.generations[index as usize] = (self.generations[index as usize] + 1) % (MAX_GENERATION + 1);
        self.insert_free_sorted(index);
        true
    }

    fn insert_free_sorted(&mut self, index: u32) {
        let pos = self.free_list.partition_point(|&x| x < index);
        if self.free_list.get(pos) != Some(&index) {
            self.free_list.insert(pos, index);
        }
    }

    /// Reserve a specific ID during snapshot restore. Idempotent: calling
    /// this twice with the same already-active ID is a no-op.
    pub fn allocate_specific(&mut self, id: EntityId) {
        let index = id.index();
        let generation = id.generation();

        while (self.generations.len() as u32) <= index {
            self.generations.push(0);
            self.alive.push(false);
            self.insert_free_sorted(self.generations.len() as u32 - 1);
        }
        if self.next_index <= index {
            self.next_index = index + 1;
        }

        if self.alive[index as usize] && self.generations[index as usize] == generation {
            return;
        }

        self.generations[index as usize] = generation;
        self.alive[index as usize] = true;
        if let Ok(pos) = self.free_list.binary_search(&index) {
            self.free_list.remove(pos);
        }
    }

    pub fn is_valid(&self, id: EntityId) -> bool {
        let index = id.index();
        index < self.next_index
            && self.alive.get(index as usize).copied().unwrap_or(false)
            && self.generations[index as usize] == id.generation()
    }

    pub fn snapshot_state(&self) -> AllocatorState {
        AllocatorState {
            next_index: self.next_index,
            free_list: self.free_list.clone(),
            generations: self.generations.clone(),
        }
    }

    pub fn restore_from_state(max_entities: u32, local: bool, state: &AllocatorState) -> EntityAllocator {
        let alive = {
            let mut alive = vec![true; state.generations.len()];
            for &free_idx in &state.free_list {
                if let Some(slot) = alive.get_mut(free_idx as usize) {
                    *slot = false;
                }
            }
            alive
        };
        EntityAllocator {
            next_index: state.next_index,
            free_list: state.free_list.clone(),
            generations: state.generations.clone(),
            alive,
            max_entities,
            local,
        }
    }

    pub fn active_count(&self) -> usize {
        self.alive.iter().filter(|&&a| a).count()
    }
}
