//! Cell-based fluid physics for sparse voxel worlds.
//!
//! The crate is organized around a small number of seams:
//! - [`core`](crate::core) holds the grid vocabulary: positions, chunks and
//!   flow directions.
//! - [`world`](crate::world) is the adapter boundary to the host voxel
//!   world.
//! - [`fluid`](crate::fluid) is the simulation itself: cell model, flow
//!   calculator, active-set registry, tick drivers and the adaptive
//!   performance controller.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fluid_engine::core::VoxelPos;
//! use fluid_engine::fluid::{FluidCell, FluidPhysics, SimulationConfig, SubstanceId};
//! use fluid_engine::world::{MemoryWorld, WorldView};
//!
//! let mut engine = FluidPhysics::new(SimulationConfig::balanced());
//! let world: Arc<dyn WorldView> = Arc::new(MemoryWorld::new(0, 256));
//!
//! engine.register_cell(VoxelPos::new(0, 64, 0), FluidCell::source(SubstanceId::water()));
//! engine.tick(&world);
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub mod core;
pub mod fluid;
pub mod world;

pub use crate::core::{ChunkPos, FlowDirection, VoxelPos};
pub use crate::fluid::{
    FluidCell, FluidPhysics, FluidRegistry, FluidSimulator, PartitionedProcessor,
    SimulationConfig, SubstanceId, TickStats,
};
pub use crate::world::{MemoryWorld, WorldView};

/// Errors surfaced by engine construction and configuration loading
#[derive(Debug, Error)]
pub enum FluidError {
    #[error("failed to read config file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to build fluid worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
