//! Coordinate conversions between world pixels, chunks, and in-chunk block offsets
//!
//! World coordinates are pixels with y growing downward. Every conversion uses
//! floor semantics (`div_euclid`/`rem_euclid`) so negative coordinates land in
//! the chunk to their upper-left, never in chunk 0 by truncation.

use glam::IVec2;

/// Side length of one block in world pixels
pub const BLOCK_SIZE: i32 = 8;

/// Chunk width in blocks
pub const CHUNK_WIDTH: usize = 16;

/// Chunk height in blocks
pub const CHUNK_HEIGHT: usize = 16;

/// Number of blocks in one chunk
pub const CHUNK_AREA: usize = CHUNK_WIDTH * CHUNK_HEIGHT;

const CHUNK_PIXEL_WIDTH: i32 = CHUNK_WIDTH as i32 * BLOCK_SIZE;
const CHUNK_PIXEL_HEIGHT: i32 = CHUNK_HEIGHT as i32 * BLOCK_SIZE;

/// Smallest chunk coordinate whose pixels fit in `i32`
pub const MIN_CHUNK_COORD: i32 = i32::MIN / CHUNK_PIXEL_WIDTH;

/// Largest chunk coordinate whose last pixel still fits in `i32`
pub const MAX_CHUNK_COORD: i32 = (i32::MAX - (CHUNK_PIXEL_WIDTH - 1)) / CHUNK_PIXEL_WIDTH;

/// Chunk coordinates containing the world pixel `(world_x, world_y)`
#[inline]
pub fn world_to_chunk(world_x: i32, world_y: i32) -> IVec2 {
    IVec2::new(
        world_x.div_euclid(CHUNK_PIXEL_WIDTH),
        world_y.div_euclid(CHUNK_PIXEL_HEIGHT),
    )
}

/// Block offset of a world pixel inside its chunk, always in `[0, CHUNK_WIDTH) x [0, CHUNK_HEIGHT)`
#[inline]
pub fn world_to_relative(world_x: i32, world_y: i32) -> (usize, usize) {
    let block_x = world_x.div_euclid(BLOCK_SIZE);
    let block_y = world_y.div_euclid(BLOCK_SIZE);
    (
        block_x.rem_euclid(CHUNK_WIDTH as i32) as usize,
        block_y.rem_euclid(CHUNK_HEIGHT as i32) as usize,
    )
}

/// Whether every pixel of the chunk is addressable in `i32` world coordinates
#[inline]
pub fn is_valid_chunk(chunk: IVec2) -> bool {
    (MIN_CHUNK_COORD..=MAX_CHUNK_COORD).contains(&chunk.x)
        && (MIN_CHUNK_COORD..=MAX_CHUNK_COORD).contains(&chunk.y)
}

/// World pixel of a chunk's top-left corner
///
/// Only defined for chunks passing [`is_valid_chunk`].
#[inline]
pub fn chunk_origin(chunk: IVec2) -> IVec2 {
    IVec2::new(chunk.x * CHUNK_PIXEL_WIDTH, chunk.y * CHUNK_PIXEL_HEIGHT)
}

/// Snap a world pixel to the top-left corner of the block containing it
#[inline]
pub fn block_origin(world_x: i32, world_y: i32) -> IVec2 {
    IVec2::new(
        world_x.div_euclid(BLOCK_SIZE) * BLOCK_SIZE,
        world_y.div_euclid(BLOCK_SIZE) * BLOCK_SIZE,
    )
}

/// Axis-aligned rectangle in world pixels, right and bottom edges exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WorldRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Grow the rectangle by `margin` pixels on every side
    pub fn expanded(&self, margin: i32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2,
            self.height + margin * 2,
        )
    }

    /// Whether the block whose top-left corner is `origin` overlaps this rectangle
    pub fn intersects_block(&self, origin: IVec2) -> bool {
        origin.x + BLOCK_SIZE > self.x
            && origin.x < self.right()
            && origin.y + BLOCK_SIZE > self.y
            && origin.y < self.bottom()
    }

    /// Inclusive range of chunk coordinates overlapping this rectangle
    pub fn chunk_range(&self) -> (IVec2, IVec2) {
        let min = world_to_chunk(self.x, self.y);
        let max = world_to_chunk(
            self.right().max(self.x + 1) - 1,
            self.bottom().max(self.y + 1) - 1,
        );
        (min, max)
    }

    /// Every chunk coordinate overlapping this rectangle, row by row
    pub fn chunks(&self) -> impl Iterator<Item = IVec2> {
        let (min, max) = self.chunk_range();
        (min.y..=max.y).flat_map(move |cy| (min.x..=max.x).map(move |cx| IVec2::new(cx, cy)))
    }
}
