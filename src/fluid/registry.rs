use dashmap::DashMap;
use rustc_hash::FxHashMap;

use super::cell::FluidCell;
use crate::core::{ChunkPos, VoxelPos, CHUNK_SIZE};
use crate::world::WorldView;

/// Tracks which cells require processing and stores their current state.
///
/// Active-set membership is the sole gate for whether a cell is visited by a
/// tick. Storage and markers are concurrent maps so worker tasks and the
/// driver can touch them without external locking. Explicitly constructed
/// and passed to every component that needs it; there is no global instance.
pub struct FluidRegistry {
    cells: DashMap<VoxelPos, FluidCell>,
    active: DashMap<VoxelPos, ()>,
}

impl FluidRegistry {
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
            active: DashMap::new(),
        }
    }

    /// Register a cell for processing. An empty cell is a no-op equivalent
    /// to [`unregister`](Self::unregister).
    pub fn register(&self, pos: VoxelPos, cell: FluidCell) {
        if cell.is_empty() {
            self.unregister(pos);
            return;
        }
        self.cells.insert(pos, cell);
        self.active.insert(pos, ());
    }

    /// Remove a cell from storage and the active set
    pub fn unregister(&self, pos: VoxelPos) {
        self.cells.remove(&pos);
        self.active.remove(&pos);
    }

    /// Get the stored cell; a missing position is a valid empty cell
    pub fn get(&self, pos: VoxelPos) -> FluidCell {
        self.lookup(pos).unwrap_or_else(FluidCell::empty)
    }

    /// Stored cell if present, used by the tick cache read-through
    pub(crate) fn lookup(&self, pos: VoxelPos) -> Option<FluidCell> {
        self.cells.get(&pos).map(|entry| entry.value().clone())
    }

    /// Replace a cell's state and mark it active; an empty cell unregisters
    pub fn set(&self, pos: VoxelPos, cell: FluidCell) {
        if cell.is_empty() {
            self.unregister(pos);
        } else {
            self.cells.insert(pos, cell);
            self.active.insert(pos, ());
        }
    }

    /// Update storage without touching active markers.
    ///
    /// Used by the tick flush so settled cells do not get re-activated.
    pub(crate) fn store(&self, pos: VoxelPos, cell: FluidCell) {
        if cell.is_empty() {
            self.cells.remove(&pos);
        } else {
            self.cells.insert(pos, cell);
        }
    }

    pub fn mark_active(&self, pos: VoxelPos) {
        self.active.insert(pos, ());
    }

    pub fn mark_inactive(&self, pos: VoxelPos) {
        self.active.remove(&pos);
    }

    pub fn is_active(&self, pos: VoxelPos) -> bool {
        self.active.contains_key(&pos)
    }

    /// Stable snapshot of the active set for one tick
    pub fn active_coordinates(&self) -> Vec<VoxelPos> {
        self.active.iter().map(|entry| *entry.key()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Active coordinates grouped by chunk partition
    pub fn active_by_chunk(&self) -> FxHashMap<ChunkPos, Vec<VoxelPos>> {
        let mut partitions: FxHashMap<ChunkPos, Vec<VoxelPos>> = FxHashMap::default();
        for entry in self.active.iter() {
            let pos = *entry.key();
            partitions.entry(pos.chunk()).or_default().push(pos);
        }
        partitions
    }

    /// Scan a chunk's full vertical column through the world adapter and
    /// register every nonempty cell. O(chunk volume).
    pub fn load_chunk(&self, world: &dyn WorldView, chunk: ChunkPos) {
        let (min_x, min_z) = chunk.min_block();
        let mut registered = 0usize;

        for x in min_x..min_x + CHUNK_SIZE {
            for z in min_z..min_z + CHUNK_SIZE {
                for y in world.min_build_height()..world.max_build_height() {
                    let pos = VoxelPos::new(x, y, z);
                    let cell = world.read_cell_state(pos);
                    if !cell.is_empty() {
                        self.register(pos, cell);
                        registered += 1;
                    }
                }
            }
        }

        log::debug!("loaded chunk {:?}: {} fluid cells registered", chunk, registered);
    }

    /// Evict all stored cells and active markers inside the chunk's bounds.
    /// O(chunk volume).
    pub fn unload_chunk(&self, chunk: ChunkPos) {
        self.cells.retain(|pos, _| !chunk.contains(*pos));
        self.active.retain(|pos, _| !chunk.contains(*pos));
        log::debug!("unloaded chunk {:?}", chunk);
    }

    /// Drop all cells and markers
    pub fn clear(&self) {
        self.cells.clear();
        self.active.clear();
    }
}

impl Default for FluidRegistry {
    fn default() -> Self {
        Self::new()
    }
}
