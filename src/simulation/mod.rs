//! Simulation systems - debris particles

pub mod particles;

pub use particles::{Particle, ParticleColor, ParticleParams, ParticleSystem};
