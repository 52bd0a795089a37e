//! Chunk - 16x16 region of blocks, generated on first access

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::block::{Block, BlockDiff};
use super::coords::{world_to_chunk, world_to_relative, CHUNK_AREA, CHUNK_HEIGHT, CHUNK_WIDTH};
use super::generation::BlockFactory;

/// Saved modifications of one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDiff {
    pub cx: i32,
    pub cy: i32,
    #[serde(default)]
    pub modified_blocks: Vec<BlockDiff>,
}

/// A 16x16 region of the world
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk coordinates (in chunk space, not pixel space)
    pub x: i32,
    pub y: i32,

    /// Block data, row-major order, empty until generated
    /// Index = y * CHUNK_WIDTH + x
    blocks: Vec<Block>,

    generated: bool,

    /// Whether a block in this chunk was clicked or restored since the world was built
    modified_in_session: bool,
}

impl Chunk {
    /// Empty shell; blocks are produced on first access
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            blocks: Vec::new(),
            generated: false,
            modified_in_session: false,
        }
    }

    /// Chunk with its blocks already generated
    pub fn generated(pos: IVec2, factory: &BlockFactory) -> Self {
        let mut chunk = Self::new(pos.x, pos.y);
        chunk.materialize(factory);
        chunk
    }

    pub fn pos(&self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn is_modified_in_session(&self) -> bool {
        self.modified_in_session
    }

    /// Fill the grid from the factory; no-op once generated
    pub fn materialize(&mut self, factory: &BlockFactory) {
        if self.generated {
            return;
        }
        self.blocks = factory.generate_chunk_blocks(self.pos());
        debug_assert_eq!(self.blocks.len(), CHUNK_AREA);
        self.generated = true;
    }

    #[inline]
    fn index(rel_x: i32, rel_y: i32) -> Option<usize> {
        if (0..CHUNK_WIDTH as i32).contains(&rel_x) && (0..CHUNK_HEIGHT as i32).contains(&rel_y) {
            Some(rel_y as usize * CHUNK_WIDTH + rel_x as usize)
        } else {
            None
        }
    }

    /// Block at relative coordinates, generating the chunk if needed
    pub fn get_block(
        &mut self,
        rel_x: i32,
        rel_y: i32,
        factory: &BlockFactory,
    ) -> Option<&mut Block> {
        self.materialize(factory);
        let index = Self::index(rel_x, rel_y)?;
        self.blocks.get_mut(index)
    }

    /// Block containing a world pixel, generating the chunk if needed
    ///
    /// Only the in-chunk offset of the pixel is used; callers pick the chunk.
    pub fn get_by_world(
        &mut self,
        world_x: i32,
        world_y: i32,
        factory: &BlockFactory,
    ) -> Option<&mut Block> {
        let (rel_x, rel_y) = world_to_relative(world_x, world_y);
        self.get_block(rel_x as i32, rel_y as i32, factory)
    }

    /// Read-only lookup; `None` while ungenerated
    pub fn block(&self, rel_x: i32, rel_y: i32) -> Option<&Block> {
        let index = Self::index(rel_x, rel_y)?;
        self.blocks.get(index)
    }

    pub fn mark_modified(&mut self) {
        self.modified_in_session = true;
    }

    /// Modified blocks only; `None` when ungenerated or nothing changed
    pub fn to_diff(&self) -> Option<ChunkDiff> {
        if !self.generated {
            return None;
        }

        let modified_blocks: Vec<BlockDiff> = self
            .blocks
            .iter()
            .filter(|b| b.is_modified())
            .map(Block::to_diff)
            .collect();

        if modified_blocks.is_empty() {
            return None;
        }

        Some(ChunkDiff {
            cx: self.x,
            cy: self.y,
            modified_blocks,
        })
    }

    /// Re-apply saved block state; diffs that don't land in this chunk are skipped
    ///
    /// Returns how many diffs were applied.
    pub fn apply_diff(&mut self, diffs: &[BlockDiff], factory: &BlockFactory) -> usize {
        self.materialize(factory);

        let pos = self.pos();
        let mut applied = 0;
        for diff in diffs {
            if world_to_chunk(diff.x, diff.y) != pos {
                log::warn!(
                    "[LOAD] Ignoring block diff at ({}, {}) outside chunk ({}, {})",
                    diff.x,
                    diff.y,
                    self.x,
                    self.y
                );
                continue;
            }

            if let Some(block) = self.get_by_world(diff.x, diff.y, factory) {
                block.restore(diff.current_hardness, diff.material);
                applied += 1;
            }
        }

        self.modified_in_session = true;
        applied
    }

    /// All unbroken blocks; nothing while ungenerated (never generates)
    pub fn active_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| b.is_active())
    }

    /// Broken blocks in this chunk
    pub fn count_dug(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| b.is_broken() && b.is_modified())
            .count()
    }

    /// Raw block slice for rendering, empty while ungenerated
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block::Material;
    use crate::world::generation::{GenerationParams, WorldSeeds};

    fn factory() -> BlockFactory {
        BlockFactory::new(WorldSeeds::new(1, 2), GenerationParams::default())
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let factory = factory();
        let mut once = Chunk::new(0, 0);
        once.materialize(&factory);

        let mut twice = Chunk::new(0, 0);
        twice.materialize(&factory);
        twice.materialize(&factory);

        assert!(once.is_generated());
        assert_eq!(once.blocks(), twice.blocks());
        assert_eq!(once.blocks().len(), CHUNK_AREA);
    }

    #[test]
    fn test_materialize_keeps_existing_modifications() {
        let factory = factory();
        let mut chunk = Chunk::generated(IVec2::new(0, 0), &factory);
        chunk.get_block(0, 8, &factory).unwrap().hit();
        chunk.materialize(&factory);
        assert!(chunk.block(0, 8).unwrap().is_modified());
    }

    #[test]
    fn test_get_block_generates_and_bounds_checks() {
        let factory = factory();
        let mut chunk = Chunk::new(1, 0);
        assert!(chunk.block(0, 0).is_none());

        assert!(chunk.get_block(0, 0, &factory).is_some());
        assert!(chunk.is_generated());
        assert!(chunk.get_block(-1, 0, &factory).is_none());
        assert!(chunk.get_block(0, 16, &factory).is_none());
        assert!(chunk.get_block(16, 0, &factory).is_none());

        let block = chunk.get_block(15, 15, &factory).unwrap();
        assert_eq!(block.position, IVec2::new(128 + 15 * 8, 15 * 8));
    }

    #[test]
    fn test_get_by_world_uses_relative_offset() {
        let factory = factory();
        let mut chunk = Chunk::new(-1, 0);
        let block = chunk.get_by_world(-8, 64, &factory).unwrap();
        assert_eq!(block.position, IVec2::new(-8, 64));
    }

    #[test]
    fn test_to_diff_is_minimal() {
        let factory = factory();
        let mut chunk = Chunk::new(0, 0);
        assert!(chunk.to_diff().is_none(), "ungenerated chunk has no diff");

        chunk.materialize(&factory);
        assert!(chunk.to_diff().is_none(), "untouched chunk has no diff");

        chunk.get_block(2, 8, &factory).unwrap().hit();
        chunk.get_block(3, 9, &factory).unwrap().hit();
        chunk.get_block(3, 9, &factory).unwrap().hit();

        let diff = chunk.to_diff().unwrap();
        assert_eq!((diff.cx, diff.cy), (0, 0));
        assert_eq!(diff.modified_blocks.len(), 2);
        let modified = chunk.blocks().iter().filter(|b| b.is_modified()).count();
        assert_eq!(diff.modified_blocks.len(), modified);
    }

    #[test]
    fn test_apply_diff_restores_and_ignores_strays() {
        let factory = factory();
        let diffs = vec![
            BlockDiff {
                x: 16,
                y: 64,
                current_hardness: 0,
                material: Some(Material::Dirt),
            },
            // Belongs to chunk (1, 0)
            BlockDiff {
                x: 200,
                y: 64,
                current_hardness: 0,
                material: None,
            },
        ];

        let mut chunk = Chunk::new(0, 0);
        let applied = chunk.apply_diff(&diffs, &factory);

        assert_eq!(applied, 1);
        assert!(chunk.is_modified_in_session());
        let block = chunk.block(2, 8).unwrap();
        assert!(block.is_broken());
        assert_eq!(block.current_hardness(), 0);
    }

    #[test]
    fn test_active_blocks_never_generate() {
        let chunk = Chunk::new(0, 0);
        assert_eq!(chunk.active_blocks().count(), 0);
        assert!(!chunk.is_generated());
    }

    #[test]
    fn test_active_blocks_skip_air_and_broken() {
        let factory = factory();
        let mut chunk = Chunk::generated(IVec2::new(0, 0), &factory);
        // rows 0..7 are air, rows 7..16 solid
        assert_eq!(chunk.active_blocks().count(), 9 * CHUNK_WIDTH);

        let block = chunk.get_block(0, 7, &factory).unwrap();
        while block.hit() != crate::world::block::HitOutcome::Broken {}
        assert_eq!(chunk.active_blocks().count(), 9 * CHUNK_WIDTH - 1);
        assert_eq!(chunk.count_dug(), 1);
    }
}
