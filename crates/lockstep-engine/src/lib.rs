//! Lockstep Engine -- wires the deterministic ECS world, the delta-sync
//! codec, and the authority-driven network driver into one simulation
//! facade.
//!
//! # Quick start
//!
//! ```
//! use lockstep_engine::prelude::*;
//! use lockstep_ecs::scheduler::Phase;
//!
//! fn build() -> Simulation {
//!     let mut sim = Simulation::new(SimulationConfig { max_entities: 64, ..Default::default() }, false);
//!     let transform = sim.world.register_component(
//!         ComponentSchema::new("transform").field("x", FieldRepr::FixedI32, FieldRaw::FixedI32(0)),
//!     );
//!     sim.world.register_entity_type(EntityDef::new("dot", vec![transform]));
//!     sim.world.spawn("dot").unwrap();
//!     sim
//! }
//!
//! let mut a = build();
//! let mut b = build();
//! assert_eq!(a.tick(1).unwrap(), b.tick(1).unwrap(), "identical sims must converge");
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod replay;
pub mod simulation;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no rollback entry retained for frame {frame}")]
    NoRollbackEntry { frame: u64 },

    #[error(transparent)]
    Ecs(#[from] lockstep_ecs::EcsError),

    #[error(transparent)]
    Net(#[from] lockstep_net::NetError),

    #[error(transparent)]
    Codec(#[from] lockstep_codec::CodecError),
}

pub mod prelude {
    pub use lockstep_ecs::prelude::*;
    pub use lockstep_net::driver::InputEffect;

    pub use crate::config::SimulationConfig;
    pub use crate::replay::{replay, ReplayLog, ReplayRecorder, ReplayResult};
    pub use crate::simulation::Simulation;
    pub use crate::EngineError;
}
