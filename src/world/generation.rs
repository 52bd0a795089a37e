use glam::IVec2;
use noise::{NoiseFn, Perlin};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::block::{Block, Material};
use super::coords::{chunk_origin, BLOCK_SIZE, CHUNK_AREA, CHUNK_HEIGHT, CHUNK_WIDTH};

/// Largest seed value handed out for new worlds
pub const MAX_SEED: u32 = (1 << 31) - 1;

/// Depth offset fed to the ore field so it never lines up with the hardness field
const ORE_NOISE_Z: f64 = 256.0;

/// Seeds for the two independent noise fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldSeeds {
    /// Drives hardness
    pub main: u32,
    /// Drives ore placement
    pub ore: u32,
}

impl WorldSeeds {
    pub fn new(main: u32, ore: u32) -> Self {
        Self { main, ore }
    }

    /// Fresh seeds in `1..=MAX_SEED`
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            main: rng.random_range(1..=MAX_SEED),
            ore: rng.random_range(1..=MAX_SEED),
        }
    }
}

/// Tunable terrain constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Block row holding the grass line; everything above is air
    pub surface_level: i32,
    pub hardness_min: u32,
    /// Hardness gained per block of depth below the grass line
    pub hardness_slope: f64,
    pub noise_scale_hardness: f64,
    pub noise_scale_ore: f64,
    /// Maximum hardness swing the noise can add once fully phased in
    pub noise_range: f64,
    /// Depth in blocks at which noise reaches full influence
    pub transition_depth: f64,
    /// Damping applied to negative noise so soft pockets stay shallow
    pub negative_impact_factor: f64,
    /// Blocks at or below this hardness are dirt
    pub dirt_threshold: u32,
    pub ore_threshold: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            surface_level: 7,
            hardness_min: 3,
            hardness_slope: 0.1,
            noise_scale_hardness: 0.005,
            noise_scale_ore: 0.04,
            noise_range: 20.0,
            transition_depth: 50.0,
            negative_impact_factor: 0.25,
            dirt_threshold: 10,
            ore_threshold: 0.4,
        }
    }
}

/// Sample seeded Perlin noise, roughly in `[-1, 1]`
///
/// Pure: the same seed and coordinates give the same value in any process.
pub fn sample_noise(seed: u32, x: f64, y: f64, z: f64) -> f64 {
    Perlin::new(seed).get([x, y, z])
}

/// Deterministic `(x, y, seeds) -> Block` generator
///
/// Holds one noise field per seed so per-block sampling doesn't rebuild
/// permutation tables; the output equals [`sample_noise`] with the same seed.
#[derive(Clone)]
pub struct BlockFactory {
    seeds: WorldSeeds,
    params: GenerationParams,
    hardness_noise: Perlin,
    ore_noise: Perlin,
}

impl BlockFactory {
    pub fn new(seeds: WorldSeeds, params: GenerationParams) -> Self {
        Self {
            seeds,
            params,
            hardness_noise: Perlin::new(seeds.main),
            ore_noise: Perlin::new(seeds.ore),
        }
    }

    pub fn seeds(&self) -> WorldSeeds {
        self.seeds
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// Generate the block whose top-left corner holds world pixel `(world_x, world_y)`
    pub fn block_at(&self, world_x: i32, world_y: i32) -> Block {
        let p = &self.params;
        let position = IVec2::new(
            world_x.div_euclid(BLOCK_SIZE) * BLOCK_SIZE,
            world_y.div_euclid(BLOCK_SIZE) * BLOCK_SIZE,
        );
        let y_block = world_y.div_euclid(BLOCK_SIZE);

        if y_block < p.surface_level {
            return Block::air(position);
        }

        if y_block == p.surface_level {
            return Block::solid(position, Material::Grass, p.hardness_min);
        }

        let max_hardness = self.hardness_at(position, y_block);
        let material = if max_hardness <= p.dirt_threshold {
            Material::Dirt
        } else {
            let ore_value = self.ore_noise.get([
                position.x as f64 * p.noise_scale_ore,
                position.y as f64 * p.noise_scale_ore,
                ORE_NOISE_Z,
            ]);
            if ore_value >= p.ore_threshold {
                Material::Coal
            } else {
                Material::Stone
            }
        };

        Block::solid(position, material, max_hardness)
    }

    /// Underground hardness: linear depth ramp plus asymmetric, depth-phased noise
    fn hardness_at(&self, position: IVec2, y_block: i32) -> u32 {
        let p = &self.params;
        let depth = (y_block - p.surface_level - 1) as f64;
        let base = p.hardness_min as f64 + depth * p.hardness_slope;

        let noise_value = self.hardness_noise.get([
            position.x as f64 * p.noise_scale_hardness,
            position.y as f64 * p.noise_scale_hardness,
            0.0,
        ]);

        let depth_scale = if p.transition_depth > 0.0 {
            (depth / p.transition_depth).min(1.0)
        } else {
            1.0
        };
        let range = p.noise_range * depth_scale;
        let contribution = if noise_value >= 0.0 {
            noise_value * range
        } else {
            noise_value * range * p.negative_impact_factor
        };

        (base + contribution).max(p.hardness_min as f64).floor() as u32
    }

    /// Generate every block of a chunk, row-major (`index = y * CHUNK_WIDTH + x`)
    pub fn generate_chunk_blocks(&self, chunk: IVec2) -> Vec<Block> {
        let origin = chunk_origin(chunk);
        let mut blocks = Vec::with_capacity(CHUNK_AREA);

        for local_y in 0..CHUNK_HEIGHT {
            for local_x in 0..CHUNK_WIDTH {
                let world_x = origin.x + local_x as i32 * BLOCK_SIZE;
                let world_y = origin.y + local_y as i32 * BLOCK_SIZE;
                blocks.push(self.block_at(world_x, world_y));
            }
        }

        log::trace!("[GEN] Chunk ({}, {}) generated", chunk.x, chunk.y);
        blocks
    }
}
