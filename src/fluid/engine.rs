use std::sync::Arc;
use std::time::Instant;

use super::cell::FluidCell;
use super::config::{self, SharedConfig, SimulationConfig};
use super::parallel::{PartitionedProcessor, TickStats};
use super::performance::PerformanceController;
use super::registry::FluidRegistry;
use super::simulator::FluidSimulator;
use crate::core::{ChunkPos, FlowDirection, VoxelPos};
use crate::world::WorldView;
use crate::FluidError;

/// Top-level fluid simulation facade.
///
/// Owns the registry, configuration, tick drivers and the adaptive
/// performance controller. Hosts construct one per world and call
/// [`tick`](Self::tick) from their update loop; cell edits outside the
/// simulation go through [`on_cell_changed`](Self::on_cell_changed).
pub struct FluidPhysics {
    config: SharedConfig,
    registry: Arc<FluidRegistry>,
    simulator: FluidSimulator,
    processor: Option<PartitionedProcessor>,
    controller: PerformanceController,
    tick_counter: u64,
}

impl FluidPhysics {
    /// Single-threaded engine
    pub fn new(config: SimulationConfig) -> Self {
        let config = config::shared(config);
        let registry = Arc::new(FluidRegistry::new());
        let simulator = FluidSimulator::new(Arc::clone(&registry), config.clone());
        let controller = PerformanceController::new(config.clone());

        Self {
            config,
            registry,
            simulator,
            processor: None,
            controller,
            tick_counter: 0,
        }
    }

    /// Engine with a chunk-partitioned worker pool
    pub fn with_parallel(config: SimulationConfig, threads: usize) -> Result<Self, FluidError> {
        let mut engine = Self::new(config);
        engine.processor = Some(PartitionedProcessor::new(
            Arc::clone(&engine.registry),
            engine.config.clone(),
            threads,
        )?);
        Ok(engine)
    }

    /// Advance the simulation by one host tick.
    ///
    /// Only every `update_frequency`-th call runs a simulation pass; the
    /// rest return `None`. Each pass is timed and fed to the performance
    /// controller.
    pub fn tick(&mut self, world: &Arc<dyn WorldView>) -> Option<TickStats> {
        self.tick_counter += 1;
        let frequency = self.config.read().update_frequency.max(1) as u64;
        if self.tick_counter % frequency != 0 {
            return None;
        }

        let start = Instant::now();
        let stats = match &self.processor {
            Some(processor) => processor.process_tick(world),
            None => {
                let visited = self.simulator.process_tick(&**world);
                TickStats {
                    partitions_submitted: 1,
                    cells_processed: visited,
                    ..TickStats::default()
                }
            }
        };
        self.controller.record_tick(start.elapsed(), &self.registry);

        log::trace!(
            "fluid tick {}: {} cells in {:?}",
            self.tick_counter,
            stats.cells_processed,
            start.elapsed()
        );
        Some(stats)
    }

    /// Add a cell to the simulation
    pub fn register_cell(&self, pos: VoxelPos, cell: FluidCell) {
        self.registry.register(pos, cell);
    }

    /// Remove a cell from the simulation
    pub fn unregister_cell(&self, pos: VoxelPos) {
        self.registry.unregister(pos);
    }

    /// Current state of a cell; missing positions read as empty
    pub fn query_cell(&self, pos: VoxelPos) -> FluidCell {
        self.registry.get(pos)
    }

    /// Replace a cell's state and wake it
    pub fn set_cell(&self, pos: VoxelPos, cell: FluidCell) {
        self.registry.set(pos, cell);
    }

    /// Scan a newly loaded chunk for fluid to simulate
    pub fn on_chunk_load(&self, world: &dyn WorldView, chunk: ChunkPos) {
        self.registry.load_chunk(world, chunk);
    }

    /// Drop all simulation state for an unloaded chunk
    pub fn on_chunk_unload(&self, chunk: ChunkPos) {
        self.registry.unload_chunk(chunk);
    }

    /// React to an external edit at `pos`: re-read the cell and its six
    /// neighbors from the world and wake whichever hold fluid.
    pub fn on_cell_changed(&self, world: &dyn WorldView, pos: VoxelPos) {
        let mut wake = |pos: VoxelPos| {
            let cell = world.read_cell_state(pos);
            if cell.is_empty() {
                self.registry.unregister(pos);
            } else {
                self.registry.register(pos, cell);
            }
        };

        wake(pos);
        for direction in [
            FlowDirection::Up,
            FlowDirection::Down,
            FlowDirection::North,
            FlowDirection::East,
            FlowDirection::South,
            FlowDirection::West,
        ] {
            wake(pos.offset(direction));
        }
    }

    pub fn registry(&self) -> &Arc<FluidRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn average_tick_time(&self) -> std::time::Duration {
        self.controller.average_tick_time()
    }
}
