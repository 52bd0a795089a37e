//! Block - one grid cell of the world

use glam::IVec2;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::coords::BLOCK_SIZE;

/// What a block is made of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    #[default]
    Air,
    Grass,
    Dirt,
    Stone,
    Coal,
}

impl Material {
    pub const ALL: [Material; 5] = [
        Material::Air,
        Material::Grass,
        Material::Dirt,
        Material::Stone,
        Material::Coal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Material::Air => "air",
            Material::Grass => "grass",
            Material::Dirt => "dirt",
            Material::Stone => "stone",
            Material::Coal => "coal",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Material {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Material::ALL
            .into_iter()
            .find(|m| m.name() == lowered)
            .ok_or_else(|| format!("unknown material '{}'", s))
    }
}

/// Result of hitting a block once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Block was already broken (or air), nothing changed
    Ignored,
    /// Block lost one point of hardness and is still standing
    Damaged { remaining: u32 },
    /// Block reached zero hardness on this hit
    Broken,
}

/// A single block in the world
///
/// Invariants: `current_hardness <= max_hardness`, and a broken block has
/// `current_hardness == 0`. Air is always broken with `max_hardness == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Top-left corner in world pixels, always a multiple of `BLOCK_SIZE`
    pub position: IVec2,
    max_hardness: u32,
    current_hardness: u32,
    material: Material,
    broken: bool,
    /// Diverged from what generation would produce fresh
    modified: bool,
}

impl Block {
    pub fn air(position: IVec2) -> Self {
        Self {
            position,
            max_hardness: 0,
            current_hardness: 0,
            material: Material::Air,
            broken: true,
            modified: false,
        }
    }

    pub fn solid(position: IVec2, material: Material, max_hardness: u32) -> Self {
        Self {
            position,
            max_hardness,
            current_hardness: max_hardness,
            material,
            broken: max_hardness == 0,
            modified: false,
        }
    }

    #[inline]
    pub fn max_hardness(&self) -> u32 {
        self.max_hardness
    }

    #[inline]
    pub fn current_hardness(&self) -> u32 {
        self.current_hardness
    }

    #[inline]
    pub fn material(&self) -> Material {
        self.material
    }

    #[inline]
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Eligible for collision and rendering
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.broken
    }

    /// `1 - current/max`, 0.0 for intact blocks and air
    pub fn damage_ratio(&self) -> f32 {
        if self.max_hardness == 0 {
            return 0.0;
        }
        1.0 - self.current_hardness as f32 / self.max_hardness as f32
    }

    /// Crack overlay frame: 0 for intact or broken blocks, otherwise 1..=5
    pub fn break_stage(&self) -> u8 {
        if self.broken || self.current_hardness == self.max_hardness {
            return 0;
        }
        let stage = (self.damage_ratio() * 5.0).ceil() as u8;
        stage.clamp(1, 5)
    }

    /// Whether an unbroken block covers the world pixel
    pub fn contains_point(&self, world_x: i32, world_y: i32) -> bool {
        !self.broken
            && self.position.x <= world_x
            && world_x < self.position.x + BLOCK_SIZE
            && self.position.y <= world_y
            && world_y < self.position.y + BLOCK_SIZE
    }

    /// Take one hit, the only way a block changes during play
    pub fn hit(&mut self) -> HitOutcome {
        if self.broken {
            return HitOutcome::Ignored;
        }

        self.modified = true;
        self.current_hardness = self.current_hardness.saturating_sub(1);

        if self.current_hardness == 0 {
            self.broken = true;
            HitOutcome::Broken
        } else {
            HitOutcome::Damaged {
                remaining: self.current_hardness,
            }
        }
    }

    /// Overwrite state from a saved diff, clamping hardness into `[0, max]`
    pub(crate) fn restore(&mut self, current_hardness: i64, material: Option<Material>) {
        if self.material == Material::Air {
            return;
        }

        self.current_hardness = current_hardness.clamp(0, self.max_hardness as i64) as u32;
        self.broken = self.current_hardness == 0;
        if let Some(material) = material.filter(|m| *m != Material::Air) {
            self.material = material;
        }
        self.modified = true;
    }

    pub fn to_diff(&self) -> BlockDiff {
        BlockDiff {
            x: self.position.x,
            y: self.position.y,
            current_hardness: self.current_hardness as i64,
            material: Some(self.material),
        }
    }
}

/// Saved state of one modified block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiff {
    /// World pixel x of the block's top-left corner
    pub x: i32,
    /// World pixel y of the block's top-left corner
    pub y: i32,
    #[serde(alias = "current_hp")]
    pub current_hardness: i64,
    #[serde(
        default,
        alias = "sprite_id",
        deserialize_with = "deserialize_lenient_material"
    )]
    pub material: Option<Material>,
}

/// Unknown material names load as `None` so the generated material is kept
fn deserialize_lenient_material<'de, D>(deserializer: D) -> Result<Option<Material>, D::Error>
where
    D: Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    Ok(name.and_then(|n| n.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(block: &Block) {
        assert!(block.current_hardness() <= block.max_hardness());
        if block.is_broken() {
            assert_eq!(block.current_hardness(), 0);
        }
    }

    #[test]
    fn test_hardness_five_breaks_on_fifth_hit() {
        let mut block = Block::solid(IVec2::new(0, 64), Material::Dirt, 5);

        for expected_remaining in (1..5).rev() {
            assert_eq!(
                block.hit(),
                HitOutcome::Damaged {
                    remaining: expected_remaining
                }
            );
            assert!(!block.is_broken());
            assert_invariants(&block);
        }

        assert_eq!(block.hit(), HitOutcome::Broken);
        assert!(block.is_broken());
        assert!(block.is_modified());
        assert_invariants(&block);

        assert_eq!(block.hit(), HitOutcome::Ignored);
        assert_invariants(&block);
    }

    #[test]
    fn test_air_ignores_hits() {
        let mut block = Block::air(IVec2::ZERO);
        assert_eq!(block.hit(), HitOutcome::Ignored);
        assert!(!block.is_modified());
        assert_eq!(block.max_hardness(), 0);
        assert_invariants(&block);
    }

    #[test]
    fn test_first_hit_marks_modified() {
        let mut block = Block::solid(IVec2::ZERO, Material::Stone, 12);
        assert!(!block.is_modified());
        block.hit();
        assert!(block.is_modified());
    }

    #[test]
    fn test_break_stage_progression() {
        let mut block = Block::solid(IVec2::ZERO, Material::Stone, 10);
        assert_eq!(block.break_stage(), 0);

        block.hit();
        assert_eq!(block.break_stage(), 1);

        for _ in 0..8 {
            block.hit();
        }
        assert_eq!(block.current_hardness(), 1);
        assert_eq!(block.break_stage(), 5);

        block.hit();
        assert_eq!(block.break_stage(), 0, "broken blocks draw no crack overlay");
    }

    #[test]
    fn test_restore_clamps_into_range() {
        let mut block = Block::solid(IVec2::ZERO, Material::Stone, 12);
        block.restore(99, None);
        assert_eq!(block.current_hardness(), 12);
        assert!(!block.is_broken());
        assert!(block.is_modified());

        block.restore(-4, Some(Material::Coal));
        assert_eq!(block.current_hardness(), 0);
        assert!(block.is_broken());
        assert_eq!(block.material(), Material::Coal);
        assert_invariants(&block);
    }

    #[test]
    fn test_restore_leaves_air_alone() {
        let mut block = Block::air(IVec2::ZERO);
        block.restore(5, Some(Material::Stone));
        assert_eq!(block, Block::air(IVec2::ZERO));
    }

    #[test]
    fn test_contains_point() {
        let mut block = Block::solid(IVec2::new(8, 64), Material::Dirt, 1);
        assert!(block.contains_point(8, 64));
        assert!(block.contains_point(15, 71));
        assert!(!block.contains_point(16, 64));
        block.hit();
        assert!(!block.contains_point(8, 64));
    }

    #[test]
    fn test_diff_reads_legacy_field_names() {
        let diff: BlockDiff =
            serde_json::from_str(r#"{"x": 16, "y": 64, "current_hp": 2, "sprite_id": "coal"}"#)
                .unwrap();
        assert_eq!(diff.current_hardness, 2);
        assert_eq!(diff.material, Some(Material::Coal));

        let diff: BlockDiff =
            serde_json::from_str(r#"{"x": 0, "y": 0, "current_hardness": 0, "material": "unknown"}"#)
                .unwrap();
        assert_eq!(diff.material, None);

        let diff: BlockDiff =
            serde_json::from_str(r#"{"x": 0, "y": 0, "current_hardness": 1}"#).unwrap();
        assert_eq!(diff.material, None);
    }
}
