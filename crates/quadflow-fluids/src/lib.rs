use glam::UVec2;

use error::FluidError;
use region::Region;

pub mod border;
pub mod error;
pub mod eulerian;
pub mod fields;
pub mod grid;
pub mod quadtree;
pub mod region;
pub mod scene;

/// The tick contract every solver variant implements.
pub trait Fluid: Sized {
    type Params;

    /// Builds a fresh simulation over a `resolution × resolution` index space.
    ///
    /// `particle_count_hint` sizes particle-based solvers; grid solvers may ignore it.
    fn initialize(resolution: u32, particle_count_hint: usize, params: &Self::Params) -> Result<Self, FluidError>;

    /// Advances the simulation by exactly one tick.
    fn step(&mut self, params: &Self::Params) -> Result<(), FluidError>;

    /// Adds fluid at the given grid index. Out-of-range indices are clamped.
    fn add_fluid(&mut self, index: UVec2, params: &Self::Params);

    fn resolution(&self) -> u32;

    /// Returns the density of the cell owning `index` together with that cell's extent.
    fn sample(&self, index: UVec2) -> FieldSample;
}

/// A read-only view of one cell, enough to draw it as a filled rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    pub density: f32,
    pub region: Region,
}
