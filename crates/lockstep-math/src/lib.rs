//! Deterministic primitives shared by every peer in a lockstep simulation.
//!
//! Everything in this crate must produce bit-identical results across
//! platforms and across independent implementations that follow the same
//! algorithm. That rules out `f32`/`f64` transcendental functions (not
//! guaranteed bit-identical across targets) and general-purpose hashing or
//! RNG crates (their algorithms are not pinned by any spec we control).
//!
//! Three pieces live here: [`fixed`] (Q16.16 scalars and trig), [`rng`]
//! (a seeded xorshift stream), and [`hash`] (xxhash32 with fixed primes).

pub mod fixed;
pub mod hash;
pub mod rng;

pub mod prelude {
    pub use crate::fixed::Fp;
    pub use crate::hash::{xxhash32, Xxhash32Folder};
    pub use crate::rng::Rng;
}
