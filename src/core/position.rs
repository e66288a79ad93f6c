use serde::{Deserialize, Serialize};

use crate::core::direction::FlowDirection;

/// Size of a chunk partition along each horizontal axis
pub const CHUNK_SIZE: i32 = 16;

/// Position of a voxel in the world (world coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn above(&self) -> Self {
        Self::new(self.x, self.y + 1, self.z)
    }

    pub fn below(&self) -> Self {
        Self::new(self.x, self.y - 1, self.z)
    }

    /// Neighbor position one step in the given direction
    pub fn offset(&self, direction: FlowDirection) -> Self {
        let (dx, dy, dz) = direction.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Get the chunk partition this voxel belongs to
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::from_voxel_pos(*self)
    }
}

/// Horizontal chunk partition key.
///
/// Derived from a voxel's horizontal position only; a partition spans the
/// full vertical column of a 16x16 block region. Used both for storage
/// locality and for dividing the active set across worker tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn from_voxel_pos(pos: VoxelPos) -> Self {
        Self::new(pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE))
    }

    /// World-space minimum block coordinates (x, z) of this chunk
    pub fn min_block(&self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.z * CHUNK_SIZE)
    }

    /// Whether the voxel falls inside this chunk's horizontal bounds
    pub fn contains(&self, pos: VoxelPos) -> bool {
        ChunkPos::from_voxel_pos(pos) == *self
    }
}
