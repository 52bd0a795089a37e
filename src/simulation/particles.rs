//! Debris particles thrown out when a block breaks.
//! Particles collide with blocks but never change them.

use glam::{IVec2, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::world::{Block, WorldRect, BLOCK_SIZE};

/// Physics and spawning constants, per tick at the game's fixed frame rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleParams {
    pub gravity: f32,
    /// Multiplier applied to horizontal velocity on a side hit (negative bounces back)
    pub bounce_damping_x: f32,
    pub ground_friction: f32,
    /// Seconds a particle may rest on the ground before it disappears
    pub max_ground_rest_secs: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    /// Extra upward kick at launch
    pub launch_lift: f32,
    pub spawn_min: usize,
    pub spawn_max: usize,
    pub spawn_mean: f64,
    pub spawn_stddev: f64,
    pub max_particles: usize,
    /// How far below the view a particle may fall before it is dropped
    pub fall_out_margin_blocks: i32,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self {
            gravity: 0.19,
            bounce_damping_x: -0.4,
            ground_friction: 0.85,
            max_ground_rest_secs: 5.0,
            speed_min: 20.0 / 60.0,
            speed_max: 60.0 / 60.0,
            launch_lift: 1.5,
            spawn_min: 5,
            spawn_max: 15,
            spawn_mean: 10.0,
            spawn_stddev: 2.0,
            max_particles: 500,
            fall_out_margin_blocks: 5,
        }
    }
}

impl ParticleParams {
    /// Launch speed bounds, low end first even if configured backwards
    pub fn speed_range(&self) -> (f32, f32) {
        (
            self.speed_min.min(self.speed_max),
            self.speed_max.max(self.speed_min),
        )
    }

    /// Burst size bounds, low end first even if configured backwards
    pub fn spawn_range(&self) -> (usize, usize) {
        (
            self.spawn_min.min(self.spawn_max),
            self.spawn_max.max(self.spawn_min),
        )
    }
}

/// Colour class of a debris particle, picked from the broken block's hardness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleColor {
    Soil,
    Rock,
    Pale,
    Dark,
}

impl ParticleColor {
    /// Soft blocks shed mostly soil, medium ones mostly rock, hard ones dark grit
    pub fn for_hardness<R: Rng + ?Sized>(max_hardness: u32, rng: &mut R) -> Self {
        if max_hardness <= 5 {
            if rng.random_bool(0.9) {
                ParticleColor::Soil
            } else {
                ParticleColor::Rock
            }
        } else if max_hardness <= 10 {
            if rng.random_bool(0.9) {
                ParticleColor::Rock
            } else {
                ParticleColor::Pale
            }
        } else {
            ParticleColor::Dark
        }
    }
}

/// A single debris particle in world pixels
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub color: ParticleColor,
    alive: bool,
    /// When the current uninterrupted ground contact started
    grounded_since: Option<Instant>,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, color: ParticleColor) -> Self {
        Self {
            position,
            velocity,
            color,
            alive: true,
            grounded_since: None,
        }
    }

    /// Launch from the centre of a broken block in a random direction
    pub fn launch<R: Rng + ?Sized>(
        block_origin: IVec2,
        max_hardness: u32,
        params: &ParticleParams,
        rng: &mut R,
    ) -> Self {
        let half = BLOCK_SIZE as f32 / 2.0;
        let position = block_origin.as_vec2() + Vec2::splat(half);

        let angle = rng.random_range(0.0..std::f32::consts::TAU);
        let (speed_min, speed_max) = params.speed_range();
        let speed = if speed_min < speed_max {
            rng.random_range(speed_min..=speed_max)
        } else {
            speed_min
        };
        let velocity = Vec2::new(
            angle.cos() * speed,
            angle.sin() * speed - params.launch_lift,
        );

        Self::new(position, velocity, ParticleColor::for_hardness(max_hardness, rng))
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded_since.is_some()
    }

    /// Advance one tick against the supplied collidable blocks
    ///
    /// Each axis resolves against the first overlapping block in slice order.
    pub fn step(&mut self, blocks: &[&Block], params: &ParticleParams, fall_out_y: f32, now: Instant) {
        if !self.alive {
            return;
        }
        let size = BLOCK_SIZE as f32;

        self.velocity.y += params.gravity;

        self.position.x += self.velocity.x;
        if let Some(block) = blocks.iter().find(|b| overlaps(b, self.position)) {
            let left = block.position.x as f32;
            self.position.x = if self.velocity.x > 0.0 {
                left - 0.1
            } else {
                left + size + 0.1
            };
            self.velocity.x *= params.bounce_damping_x;
        }

        self.position.y += self.velocity.y;
        let mut on_ground = false;
        if let Some(block) = blocks.iter().find(|b| overlaps(b, self.position)) {
            let top = block.position.y as f32;
            if self.velocity.y > 0.0 {
                self.position.y = top - 0.1;
                self.velocity.y = 0.0;
                self.velocity.x *= params.ground_friction;
                on_ground = true;
            } else if self.velocity.y < 0.0 {
                self.position.y = top + size + 0.1;
                self.velocity.y = 0.0;
            }
        }

        if on_ground {
            match self.grounded_since {
                None => self.grounded_since = Some(now),
                Some(since) => {
                    if now.duration_since(since).as_secs_f32() > params.max_ground_rest_secs {
                        self.alive = false;
                    }
                }
            }
        } else {
            self.grounded_since = None;
        }

        if self.position.y > fall_out_y {
            self.alive = false;
        }
    }
}

#[inline]
fn overlaps(block: &Block, point: Vec2) -> bool {
    let min = block.position.as_vec2();
    let max = min + Vec2::splat(BLOCK_SIZE as f32);
    min.x <= point.x && point.x < max.x && min.y <= point.y && point.y < max.y
}

/// Normal sample via Box-Muller
fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, stddev: f64) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    mean + stddev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Owns every live debris particle
pub struct ParticleSystem {
    particles: Vec<Particle>,
    params: ParticleParams,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(ParticleParams::default())
    }
}

impl ParticleSystem {
    pub fn new(params: ParticleParams) -> Self {
        Self {
            particles: Vec::with_capacity(params.max_particles.min(1024)),
            params,
        }
    }

    pub fn params(&self) -> &ParticleParams {
        &self.params
    }

    /// Add a particle, evicting the oldest when full
    pub fn spawn(&mut self, particle: Particle) {
        if self.params.max_particles == 0 {
            return;
        }
        if self.particles.len() >= self.params.max_particles {
            self.particles.remove(0);
        }
        self.particles.push(particle);
    }

    /// Burst for a block that just broke; returns how many particles were spawned
    pub fn spawn_break_burst<R: Rng + ?Sized>(
        &mut self,
        block_origin: IVec2,
        max_hardness: u32,
        rng: &mut R,
    ) -> usize {
        let p = &self.params;
        let (spawn_min, spawn_max) = p.spawn_range();
        let count = gaussian(rng, p.spawn_mean, p.spawn_stddev)
            .clamp(spawn_min as f64, spawn_max as f64) as usize;

        for _ in 0..count {
            let particle = Particle::launch(block_origin, max_hardness, &self.params, rng);
            self.spawn(particle);
        }

        log::trace!(
            "Spawned {} particles at ({}, {})",
            count,
            block_origin.x,
            block_origin.y
        );
        count
    }

    /// Step every particle and drop the dead ones
    ///
    /// `blocks` should be the active blocks around `view`; particles falling
    /// more than the configured margin below `view` are removed.
    pub fn update(&mut self, blocks: &[&Block], view: WorldRect, now: Instant) {
        let fall_out_y = (view.bottom() + self.params.fall_out_margin_blocks * BLOCK_SIZE) as f32;
        for particle in &mut self.particles {
            particle.step(blocks, &self.params, fall_out_y, now);
        }
        self.particles.retain(|p| p.is_alive());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
