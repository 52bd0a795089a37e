//! Game configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `config.ron` file (if exists)
//! 3. Environment variables prefixed with `DIGWORLD_`
//!
//! Example environment variable: `DIGWORLD_WORLD__SAVE_PATH=slot2.json`

use anyhow::{ensure, Context, Result};
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::simulation::ParticleParams;
use crate::world::{GenerationParams, WorldRect};

/// Main game configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameConfig {
    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub generation: GenerationParams,

    #[serde(default)]
    pub particles: ParticleParams,

    #[serde(default)]
    pub debug: DebugConfig,
}

/// World and viewport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Where the save document lives
    pub save_path: String,
    /// Visible area in world pixels
    pub view_width: i32,
    pub view_height: i32,
    /// Extra ring of blocks generated around the view
    pub view_margin_blocks: i32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            save_path: "savedata.json".to_string(),
            view_width: 160,
            view_height: 120,
            view_margin_blocks: 1,
        }
    }
}

impl WorldConfig {
    /// Viewport whose top-left corner sits at the camera
    pub fn viewport(&self, camera_x: i32, camera_y: i32) -> WorldRect {
        WorldRect::new(camera_x, camera_y, self.view_width, self.view_height)
    }
}

/// Debug/development settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Include paths and error details in save/load notifications
    pub show_debug_info: bool,
}

impl GameConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `config.ron` file (if exists)
    /// 3. Environment variables prefixed with `DIGWORLD_` (highest priority)
    pub fn load() -> Result<Self> {
        let builder = Self::defaults()?
            // Layer 2: Config file (optional, won't error if missing)
            .add_source(
                File::with_name("config")
                    .format(config::FileFormat::Ron)
                    .required(false),
            )
            // Layer 3: Environment variables (DIGWORLD_WORLD__SAVE_PATH, etc.)
            .add_source(
                Environment::with_prefix("DIGWORLD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    /// Load defaults overlaid with one required RON file, ignoring the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let builder = Self::defaults()?.add_source(
            File::from(path)
                .format(config::FileFormat::Ron)
                .required(true),
        );

        Self::build(builder).with_context(|| format!("Failed to load config from {:?}", path))
    }

    /// Layer 1: compiled defaults for the sections read most often
    fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let world = WorldConfig::default();
        let builder = Config::builder()
            .set_default("world.save_path", world.save_path)?
            .set_default("world.view_width", world.view_width as i64)?
            .set_default("world.view_height", world.view_height as i64)?
            .set_default("world.view_margin_blocks", world.view_margin_blocks as i64)?
            .set_default("debug.show_debug_info", false)?;
        Ok(builder)
    }

    fn build(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config = builder.build().context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the world or particle code cannot run with
    pub fn validate(&self) -> Result<()> {
        let w = &self.world;
        ensure!(
            w.view_width > 0 && w.view_height > 0,
            "world view must be non-empty, got {}x{}",
            w.view_width,
            w.view_height
        );
        ensure!(
            w.view_margin_blocks >= 0,
            "world.view_margin_blocks must not be negative, got {}",
            w.view_margin_blocks
        );

        let p = &self.particles;
        ensure!(
            p.spawn_min <= p.spawn_max,
            "particles.spawn_min ({}) is greater than particles.spawn_max ({})",
            p.spawn_min,
            p.spawn_max
        );
        ensure!(
            p.speed_min.is_finite() && p.speed_max.is_finite() && p.speed_min <= p.speed_max,
            "particles.speed_min ({}) must be finite and not greater than particles.speed_max ({})",
            p.speed_min,
            p.speed_max
        );
        ensure!(
            p.spawn_mean.is_finite() && p.spawn_stddev.is_finite() && p.spawn_stddev >= 0.0,
            "particle burst distribution needs a finite mean and a non-negative stddev, got {} and {}",
            p.spawn_mean,
            p.spawn_stddev
        );

        let g = &self.generation;
        ensure!(
            g.noise_scale_hardness.is_finite() && g.noise_scale_ore.is_finite(),
            "generation noise scales must be finite"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.world.save_path, "savedata.json");
        assert_eq!(config.world.view_width, 160);
        assert_eq!(config.world.view_height, 120);
        assert_eq!(config.generation.surface_level, 7);
        assert_eq!(config.particles.spawn_max, 15);
        assert!(!config.debug.show_debug_info);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".ron")
            .tempfile()
            .expect("Failed to create temp file");
        write!(
            file,
            r#"(
                world: (save_path: "slot2.json"),
                generation: (ore_threshold: 0.6),
                particles: (max_particles: 64),
                debug: (show_debug_info: true),
            )"#
        )
        .expect("Failed to write config");

        let config = GameConfig::load_from(file.path()).expect("Failed to load config");
        assert_eq!(config.world.save_path, "slot2.json");
        assert_eq!(config.world.view_width, 160);
        assert_eq!(config.generation.ore_threshold, 0.6);
        assert_eq!(config.generation.hardness_min, 3);
        assert_eq!(config.particles.max_particles, 64);
        assert_eq!(config.particles.gravity, 0.19);
        assert!(config.debug.show_debug_info);
    }

    #[test]
    fn test_swapped_particle_bounds_are_rejected() {
        let mut file = tempfile::Builder::new()
            .suffix(".ron")
            .tempfile()
            .expect("Failed to create temp file");
        write!(file, "(particles: (spawn_min: 20, spawn_max: 4))").expect("Failed to write config");

        let err = GameConfig::load_from(file.path()).unwrap_err();
        assert!(
            format!("{:#}", err).contains("spawn_min"),
            "unexpected error: {:#}",
            err
        );
    }

    #[test]
    fn test_validate_checks_speed_and_view() {
        assert!(GameConfig::default().validate().is_ok());

        let mut config = GameConfig::default();
        config.particles.speed_min = 2.0;
        config.particles.speed_max = 1.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.particles.spawn_stddev = -1.0;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.world.view_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_viewport_follows_camera() {
        let world = WorldConfig::default();
        assert_eq!(world.viewport(-16, 8), WorldRect::new(-16, 8, 160, 120));
    }
}
