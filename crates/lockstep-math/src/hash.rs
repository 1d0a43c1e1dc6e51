//! xxhash32, with the prime constants pinned by spec.
//!
//! This is a plain-Rust reimplementation of the xxhash32 algorithm (no
//! external crate) because the hash must be bit-identical across every peer
//! implementation that claims to speak this protocol, and that requires
//! committing to one exact set of constants rather than whatever a given
//! hashing crate's default variant happens to produce.

const PRIME1: u32 = 2654435761;
const PRIME2: u32 = 2246822519;
const PRIME3: u32 = 3266489917;
const PRIME4: u32 = 668265263;
const PRIME5: u32 = 374761393;

fn round(acc: u32, input: u32) -> u32 {
    let acc = acc.wrapping_add(input.wrapping_mul(PRIME2));
    acc.rotate_left(13).wrapping_mul(PRIME1)
}

fn avalanche(mut h: u32) -> u32 {
    h ^= h >> 15;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 13;
    h = h.wrapping_mul(PRIME3);
    h ^= h >> 16;
    h
}

/// One-shot xxhash32 over a byte slice with the given seed.
pub fn xxhash32(seed: u32, data: &[u8]) -> u32 {
    let len = data.len();
    let mut chunks = data.chunks_exact(16);
    let mut h: u32;

    if len >= 16 {
        let mut v1 = seed.wrapping_add(PRIME1).wrapping_add(PRIME2);
        let mut v2 = seed.wrapping_add(PRIME2);
        let mut v3 = seed;
        let mut v4 = seed.wrapping_sub(PRIME1);

        for chunk in chunks.by_ref() {
            v1 = round(v1, u32::from_le_bytes(chunk[0..4].try_into().unwrap()));
            v2 = round(v2, u32::from_le_bytes(chunk[4..8].try_into().unwrap()));
            v3 = round(v3, u32::from_le_bytes(chunk[8..12].try_into().unwrap()));
            v4 = round(v4, u32::from_le_bytes(chunk[12..16].try_into().unwrap()));
        }

        h = v1
            .rotate_left(1)
            .wrapping_add(v2.rotate_left(7))
            .wrapping_add(v3.rotate_left(12))
            .wrapping_add(v4.rotate_left(18));
    } else {
        h = seed.wrapping_add(PRIME5);
    }

    h = h.wrapping_add(len as u32);

    let remainder = chunks.remainder();
    let mut rest = remainder;
    while rest.len() >= 4 {
        let lane = u32::from_le_bytes(rest[0..4].try_into().unwrap());
        h = h.wrapping_add(lane.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME4);
        rest = &rest[4..];
    }
    for &byte in rest {
        h = h.wrapping_add((byte as u32).wrapping_mul(PRIME5));
        h = h.rotate_left(11).wrapping_mul(PRIME1);
    }

    avalanche(h)
}

/// Combine two hash-sized values into one, used to derive per-partition /
/// per-frame seeds without allocating a byte buffer.
pub fn xxhash32_combine(a: u32, b: u32) -> u32 {
    let mut bytes = [0u8; 8];
    bytes[0..4].copy_from_slice(&a.to_le_bytes());
    bytes[4..8].copy_from_slice(&b.to_le_bytes());
    xxhash32(PRIME5, &bytes)
}

/// Incremental folder for building the simulation state hash: each field
/// value is folded in as a little-endian `u32` lane, matching the
/// one-shot algorithm's tail-byte processing so a folder over N values is
/// identical to calling [`xxhash32`] on the concatenated little-endian
/// bytes of those values.
#[derive(Debug, Clone)]
pub struct Xxhash32Folder {
    buffer: Vec<u8>,
    seed: u32,
}

impl Xxhash32Folder {
    pub fn new(seed: u32) -> Xxhash32Folder {
        Xxhash32Folder {
            buffer: Vec::new(),
            seed,
        }
    }

    pub fn fold_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn fold_i32(&mut self, value: i32) {
        self.fold_u32(value as u32);
    }

    pub fn fold_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn finish(&self) -> u32 {
        xxhash32(self.seed, &self.buffer)
    }
}
