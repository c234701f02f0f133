use glam::{IVec2, UVec2};

use crate::{error::FluidError, eulerian::QuadtreeFluid2D, FieldSample, Fluid};

/// Drives a fluid from pixel-space input.
pub struct Scene<F: Fluid> {
    /// The fluid for this scene.
    pub fluid: F,
    /// The parameters for this scene's fluid.
    params: F::Params,
    /// Size of the drawing surface in pixels.
    viewport: UVec2,
    /// Grid indices waiting to be injected on the next step.
    pending: Vec<UVec2>,
}

impl<F: Fluid> Scene<F> {
    #[inline(always)]
    pub fn new(fluid: F, params: F::Params, viewport: UVec2) -> Self {
        Self {
            fluid,
            params,
            viewport,
            pending: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn params(&self) -> &F::Params {
        &self.params
    }

    #[inline(always)]
    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    /// Pixels covered by one unit cell along each axis, never less than one.
    pub fn cell_pixel_size(&self) -> UVec2 {
        (self.viewport / self.fluid.resolution()).max(UVec2::ONE)
    }

    /// Maps a pixel position to the grid index under it, clamped into the domain.
    pub fn pixel_to_index(&self, pixel: IVec2) -> UVec2 {
        let last = self.fluid.resolution() as i32 - 1;
        let index = pixel.div_euclid(self.cell_pixel_size().as_ivec2());

        index.clamp(IVec2::ZERO, IVec2::splat(last)).as_uvec2()
    }

    /// Queues an injection under `pixel` for the next step.
    pub fn inject(&mut self, pixel: IVec2) {
        let index = self.pixel_to_index(pixel);
        self.pending.push(index);
    }

    pub fn pending(&self) -> &[UVec2] {
        &self.pending
    }

    /// Applies the queued injections, then advances the fluid by one tick.
    pub fn step(&mut self) -> Result<(), FluidError> {
        for index in self.pending.drain(..) {
            self.fluid.add_fluid(index, &self.params);
        }

        self.fluid.step(&self.params)
    }
}

impl Scene<QuadtreeFluid2D> {
    /// Every leaf to draw, one rectangle each.
    pub fn leaves(&self) -> impl Iterator<Item = FieldSample> + '_ {
        self.fluid.samples()
    }
}
