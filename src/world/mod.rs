//! World management - blocks, chunks, generation, saving

pub mod background;
mod block;
mod chunk;
pub mod coords;
pub mod generation;
pub mod persistence;
#[allow(clippy::module_inception)]
mod world;

pub use background::{BackgroundTask, RequestStatus, TaskPoll, TaskSlot};
pub use block::{Block, BlockDiff, HitOutcome, Material};
pub use chunk::{Chunk, ChunkDiff};
pub use coords::{
    block_origin, chunk_origin, is_valid_chunk, world_to_chunk, world_to_relative, WorldRect,
    BLOCK_SIZE, CHUNK_AREA, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_CHUNK_COORD, MIN_CHUNK_COORD,
};
pub use generation::{sample_noise, BlockFactory, GenerationParams, WorldSeeds};
pub use persistence::{PersistenceManager, SaveDocument, Settings};
pub use world::{BlockHit, World};
