//! Grid primitives shared by every simulation component.

pub mod direction;
pub mod position;

pub use direction::FlowDirection;
pub use position::{ChunkPos, VoxelPos, CHUNK_SIZE};
