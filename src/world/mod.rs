//! Seam between the simulation core and the host voxel world.
//!
//! The core never talks to a concrete world; it reads and writes cell state
//! through [`WorldView`]. Hosts adapt their native block/fluid representation
//! behind this trait.

use dashmap::DashMap;

use crate::core::VoxelPos;
use crate::fluid::FluidCell;

/// Host world collaborator.
///
/// A missing or unloaded position is a valid empty cell, never a fault.
pub trait WorldView: Send + Sync {
    /// Read the fluid state at a position
    fn read_cell_state(&self, pos: VoxelPos) -> FluidCell;

    /// Write the fluid state at a position
    fn write_cell_state(&self, pos: VoxelPos, cell: FluidCell);

    /// Lowest simulated y coordinate (inclusive)
    fn min_build_height(&self) -> i32;

    /// Highest simulated y coordinate (exclusive)
    fn max_build_height(&self) -> i32;
}

/// In-memory world backed by a concurrent map.
///
/// Used by the tests and benchmarks; doubles as a reference adapter
/// implementation.
pub struct MemoryWorld {
    cells: DashMap<VoxelPos, FluidCell>,
    min_y: i32,
    max_y: i32,
}

impl MemoryWorld {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            cells: DashMap::new(),
            min_y,
            max_y,
        }
    }

    pub fn set(&self, pos: VoxelPos, cell: FluidCell) {
        self.write_cell_state(pos, cell);
    }

    pub fn get(&self, pos: VoxelPos) -> FluidCell {
        self.read_cell_state(pos)
    }

    /// Number of nonempty cells currently stored
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Sum of all fluid levels, for conservation checks
    pub fn total_fluid(&self) -> u64 {
        self.cells.iter().map(|entry| entry.value().level() as u64).sum()
    }
}

impl WorldView for MemoryWorld {
    fn read_cell_state(&self, pos: VoxelPos) -> FluidCell {
        self.cells
            .get(&pos)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(FluidCell::empty)
    }

    fn write_cell_state(&self, pos: VoxelPos, cell: FluidCell) {
        if cell.is_empty() {
            self.cells.remove(&pos);
        } else {
            self.cells.insert(pos, cell);
        }
    }

    fn min_build_height(&self) -> i32 {
        self.min_y
    }

    fn max_build_height(&self) -> i32 {
        self.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fluid::SubstanceId;

    #[test]
    fn missing_cells_read_as_empty() {
        let world = MemoryWorld::new(0, 64);
        assert!(world.read_cell_state(VoxelPos::new(1, 2, 3)).is_empty());
    }

    #[test]
    fn writing_empty_evicts() {
        let world = MemoryWorld::new(0, 64);
        let pos = VoxelPos::new(0, 1, 0);
        world.set(pos, FluidCell::new(SubstanceId::water(), 5, false));
        assert_eq!(world.cell_count(), 1);

        world.set(pos, FluidCell::empty());
        assert_eq!(world.cell_count(), 0);
    }

    #[test]
    fn total_fluid_sums_levels() {
        let world = MemoryWorld::new(0, 64);
        world.set(VoxelPos::new(0, 0, 0), FluidCell::new(SubstanceId::water(), 3, false));
        world.set(VoxelPos::new(1, 0, 0), FluidCell::new(SubstanceId::water(), 8, true));
        assert_eq!(world.total_fluid(), 11);
    }
}
