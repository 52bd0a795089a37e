//! # Digworld - chunked 2D dig world
//!
//! Blocks are generated on demand from two noise seeds, dug out by clicks,
//! and saved as a sparse list of differences from the generated terrain.

pub mod config;
pub mod error;
pub mod session;
pub mod simulation;
pub mod world;

pub use config::GameConfig;
pub use error::{PersistenceError, PersistenceResult};
pub use session::GameSession;
pub use world::{World, WorldSeeds};

/// Common imports for internal use
pub mod prelude {
    pub use crate::session::{ClickOutcome, GameSession, Notification, NotificationKind};
    pub use crate::simulation::{Particle, ParticleSystem};
    pub use crate::world::{Block, Chunk, Material, World, WorldRect, WorldSeeds, BLOCK_SIZE};
    pub use glam::{IVec2, Vec2};
}
