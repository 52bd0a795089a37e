//! World - owns chunks and answers block queries

use ahash::{AHashMap, AHashSet};
use glam::IVec2;
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

use super::block::{Block, HitOutcome};
use super::chunk::{Chunk, ChunkDiff};
use super::coords::{is_valid_chunk, world_to_chunk, WorldRect, BLOCK_SIZE};
use super::generation::{BlockFactory, GenerationParams, WorldSeeds};

/// Result of clicking a block through the world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHit {
    pub outcome: HitOutcome,
    /// Block state after the hit
    pub block: Block,
}

/// The game world, composed of lazily generated chunks
///
/// Chunks are kept for the lifetime of the world; nothing is evicted.
pub struct World {
    /// Chunk shells and generated chunks, keyed by chunk coordinates
    chunks: AHashMap<IVec2, Chunk>,

    /// Every chunk that has been generated, the set a save must rebuild
    generated_chunks: AHashSet<IVec2>,

    factory: BlockFactory,
}

impl World {
    pub fn new(seeds: WorldSeeds, params: GenerationParams) -> Self {
        log::info!("New world (seed main: {}, seed ore: {})", seeds.main, seeds.ore);
        Self {
            chunks: AHashMap::new(),
            generated_chunks: AHashSet::new(),
            factory: BlockFactory::new(seeds, params),
        }
    }

    pub fn seeds(&self) -> WorldSeeds {
        self.factory.seeds()
    }

    pub fn factory(&self) -> &BlockFactory {
        &self.factory
    }

    /// Swap in new seeds and drop every chunk
    pub fn reseed(&mut self, seeds: WorldSeeds) {
        let params = self.factory.params().clone();
        self.factory = BlockFactory::new(seeds, params);
        self.chunks.clear();
        self.generated_chunks.clear();
        log::info!("World reseeded (seed main: {}, seed ore: {})", seeds.main, seeds.ore);
    }

    /// Get or create the chunk at `pos`, generating it if needed
    pub fn ensure_chunk(&mut self, pos: IVec2) -> &mut Chunk {
        let chunk = self
            .chunks
            .entry(pos)
            .or_insert_with(|| Chunk::new(pos.x, pos.y));

        if !chunk.is_generated() {
            chunk.materialize(&self.factory);
            self.generated_chunks.insert(pos);
        }
        chunk
    }

    /// Generate every chunk overlapping the viewport plus a margin in blocks
    ///
    /// Cheap to call every tick. Returns how many chunks were newly generated.
    pub fn load_visible_chunks(&mut self, viewport: WorldRect, margin_blocks: i32) -> usize {
        let area = viewport.expanded(margin_blocks * BLOCK_SIZE);
        let mut generated = 0;

        for pos in area.chunks() {
            if !self.generated_chunks.contains(&pos) {
                self.ensure_chunk(pos);
                generated += 1;
            }
        }

        if generated > 0 {
            log::debug!(
                "[GEN] {} chunks generated for viewport ({}, {}) {}x{}",
                generated,
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height
            );
        }
        generated
    }

    /// Block containing the world pixel, generating its chunk if needed
    pub fn block_at(&mut self, world_x: i32, world_y: i32) -> Option<&mut Block> {
        let pos = world_to_chunk(world_x, world_y);
        self.ensure_chunk(pos);
        let chunk = self.chunks.get_mut(&pos)?;
        chunk.get_by_world(world_x, world_y, &self.factory)
    }

    /// Read-only lookup that never generates
    pub fn peek_block(&self, world_x: i32, world_y: i32) -> Option<&Block> {
        let chunk = self.chunks.get(&world_to_chunk(world_x, world_y))?;
        let (rel_x, rel_y) = super::coords::world_to_relative(world_x, world_y);
        chunk.block(rel_x as i32, rel_y as i32)
    }

    /// Mark the chunk containing a world pixel as modified this session
    pub fn mark_modified_at(&mut self, world_x: i32, world_y: i32) {
        if let Some(chunk) = self.chunks.get_mut(&world_to_chunk(world_x, world_y)) {
            chunk.mark_modified();
        }
    }

    /// Hit the block under a world pixel once
    pub fn hit_block(&mut self, world_x: i32, world_y: i32) -> Option<BlockHit> {
        self.block_at(world_x, world_y)?;
        self.mark_modified_at(world_x, world_y);

        let block = self.block_at(world_x, world_y)?;
        let outcome = block.hit();
        log::trace!(
            "Hit {} at ({}, {}) -> {:?}",
            block.material(),
            block.position.x,
            block.position.y,
            outcome
        );
        Some(BlockHit {
            outcome,
            block: *block,
        })
    }

    /// Unbroken blocks overlapping `rect` from already generated chunks
    ///
    /// Never generates; ungenerated chunks contribute nothing.
    pub fn active_blocks_in_region(&self, rect: WorldRect) -> Vec<&Block> {
        let mut blocks = Vec::new();
        for pos in rect.chunks() {
            if let Some(chunk) = self.chunks.get(&pos) {
                blocks.extend(
                    chunk
                        .active_blocks()
                        .filter(|b| rect.intersects_block(b.position)),
                );
            }
        }
        blocks
    }

    /// Replace all chunks: regenerate every coordinate, then re-apply diffs
    ///
    /// Cost is proportional to the number of generated chunks, not to the diffs.
    /// Chunks outside the addressable range are dropped with a warning.
    pub fn rebuild_from_diffs(
        &mut self,
        generated_coords: impl IntoIterator<Item = IVec2>,
        diffs: &[ChunkDiff],
    ) {
        let mut dropped = 0;
        let coords: AHashSet<IVec2> = generated_coords
            .into_iter()
            .filter(|&pos| {
                let valid = is_valid_chunk(pos);
                if !valid {
                    dropped += 1;
                }
                valid
            })
            .collect();
        if dropped > 0 {
            log::warn!("[LOAD] Dropped {} out-of-range generated chunk coordinates", dropped);
        }

        let ordered: Vec<IVec2> = coords.iter().copied().collect();
        let rebuilt = Self::generate_all(&ordered, &self.factory);

        self.chunks = rebuilt.into_iter().map(|c| (c.pos(), c)).collect();
        self.generated_chunks = coords;

        let mut applied = 0;
        for diff in diffs {
            let pos = IVec2::new(diff.cx, diff.cy);
            if !is_valid_chunk(pos) {
                log::warn!(
                    "[LOAD] Dropping diff for out-of-range chunk ({}, {})",
                    pos.x,
                    pos.y
                );
                continue;
            }
            if self.generated_chunks.insert(pos) {
                log::debug!(
                    "[LOAD] Diff for chunk ({}, {}) missing from generated set, generating",
                    pos.x,
                    pos.y
                );
            }
            let chunk = self
                .chunks
                .entry(pos)
                .or_insert_with(|| Chunk::new(pos.x, pos.y));
            applied += chunk.apply_diff(&diff.modified_blocks, &self.factory);
        }

        log::info!(
            "[LOAD] Rebuilt {} chunks, re-applied {} block diffs from {} chunk diffs ({} blocks dug)",
            self.chunks.len(),
            applied,
            diffs.len(),
            self.dug_block_count()
        );
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn generate_all(coords: &[IVec2], factory: &BlockFactory) -> Vec<Chunk> {
        coords
            .par_iter()
            .map(|&pos| Chunk::generated(pos, factory))
            .collect()
    }

    // No threads on wasm
    #[cfg(target_arch = "wasm32")]
    fn generate_all(coords: &[IVec2], factory: &BlockFactory) -> Vec<Chunk> {
        coords
            .iter()
            .map(|&pos| Chunk::generated(pos, factory))
            .collect()
    }

    /// Broken blocks across all chunks
    pub fn dug_block_count(&self) -> usize {
        self.chunks.values().map(Chunk::count_dug).sum()
    }

    /// Diffs for every chunk modified this session that still differs from generation
    pub fn collect_diffs(&self) -> Vec<ChunkDiff> {
        let mut diffs: Vec<ChunkDiff> = self
            .chunks
            .values()
            .filter(|c| c.is_modified_in_session())
            .filter_map(Chunk::to_diff)
            .collect();
        diffs.sort_by_key(|d| (d.cy, d.cx));
        diffs
    }

    /// Generated chunk coordinates, sorted for stable output
    pub fn generated_coords(&self) -> Vec<IVec2> {
        let mut coords: Vec<IVec2> = self.generated_chunks.iter().copied().collect();
        coords.sort_by_key(|c| (c.y, c.x));
        coords
    }

    pub fn is_generated(&self, pos: IVec2) -> bool {
        self.generated_chunks.contains(&pos)
    }

    pub fn chunk(&self, pos: IVec2) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Get all loaded chunks
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}
