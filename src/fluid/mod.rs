//! Cellular fluid simulation over a sparse voxel grid.
//!
//! Fluid lives in discrete cells holding 0-8 levels of one substance. Each
//! tick visits only the cells in the active worklist, moves fluid downward
//! by gravity and sideways by pressure and momentum, and lets settled cells
//! drop out of the worklist until a neighbor disturbs them.
//!
//! [`FluidPhysics`] is the host-facing entry point; [`FluidSimulator`] and
//! [`PartitionedProcessor`] are the single-threaded and chunk-parallel tick
//! drivers underneath it.

pub mod cell;
pub mod config;
pub mod engine;
pub mod flow;
pub mod parallel;
pub mod performance;
pub mod registry;
pub mod simulator;


pub use cell::{FluidCell, SubstanceId};
pub use config::{shared, SharedConfig, SimulationConfig};
pub use engine::FluidPhysics;
pub use parallel::{PartitionedProcessor, TickStats, BARRIER_TIMEOUT};
pub use performance::PerformanceController;
pub use registry::FluidRegistry;
pub use simulator::{FluidSimulator, TickCache};

/// Maximum fluid level a cell can hold
pub const MAX_FLUID_LEVEL: u8 = 8;
/// Minimum fluid level (an empty cell)
pub const MIN_FLUID_LEVEL: u8 = 0;
