use glam::{IVec2, UVec2};
use log::debug;
use ndarray::{s, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{
    error::FluidError,
    fields::Field,
    grid::AdaptiveGrid,
    quadtree::CellId,
    FieldSample, Fluid,
};

mod stages;

/// Density range of the random initial fill.
const RANDOM_FILL_DENSITY: f32 = 100.0;
/// Velocity magnitude bound of the random initial fill.
const RANDOM_FILL_VELOCITY: f32 = 10.0;

/// How the domain is populated at initialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitialFill {
    /// A single zeroed leaf.
    #[default]
    Empty,
    /// Unit cells with random density and velocity.
    Random,
}

#[derive(Debug, Clone)]
pub struct QuadtreeFluid2DParams {
    /// Time step of a single tick.
    pub dt: f32,
    pub viscosity: f32,
    pub diffusion: f32,
    /// Relaxation sweeps per diffusion or pressure solve.
    pub num_iters: usize,
    /// A leaf is refined when the density spread over its neighbours exceeds this.
    pub refine_threshold: f32,
    /// Four sibling leaves are merged when their density spread is at most this.
    pub coarsen_threshold: f32,
    pub injection_density: f32,
    /// Bound of the random velocity impulse added per injection.
    pub injection_velocity: f32,
    pub seed: u64,
    pub initial_fill: InitialFill,
}

impl Default for QuadtreeFluid2DParams {
    fn default() -> Self {
        Self {
            dt: 0.5,
            viscosity: 1e-5,
            diffusion: 1e-5,
            num_iters: 10,
            refine_threshold: 40.0,
            coarsen_threshold: 0.4,
            injection_density: 250.0,
            injection_velocity: 10.0,
            seed: 0,
            initial_fill: InitialFill::Empty,
        }
    }
}

/// Stable fluids over an adaptive quadtree.
#[derive(Debug, Clone)]
pub struct QuadtreeFluid2D {
    grid: AdaptiveGrid,
    /// Leaves of the current tree, in depth-first order, as of the last step.
    leaves: Vec<CellId>,
    rng: ChaCha8Rng,
    tick: u64,
}

impl QuadtreeFluid2D {
    #[inline]
    pub fn grid(&self) -> &AdaptiveGrid {
        &self.grid
    }

    /// Number of completed ticks.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Refines every cell down to unit size and assigns random density and velocity.
    fn fill_random(&mut self) {
        let tree = self.grid.tree_mut();
        let mut leaves = tree.leaves();
        while leaves.iter().any(|&id| tree.cell(id).region.can_split()) {
            for &id in &leaves {
                tree.refine(id);
            }
            tree.collect_leaves(&mut leaves);
        }

        for id in leaves {
            let density = self.rng.gen::<f32>() * RANDOM_FILL_DENSITY;
            let vx = (self.rng.gen::<f32>() - 0.5) * 2.0 * RANDOM_FILL_VELOCITY;
            let vy = (self.rng.gen::<f32>() - 0.5) * 2.0 * RANDOM_FILL_VELOCITY;

            let tree = self.grid.tree_mut();
            tree.set(id, Field::Density, density);
            tree.set(id, Field::VelocityX, vx);
            tree.set(id, Field::VelocityY, vy);
        }
    }

    /// Every leaf of the current tree as a drawable sample.
    pub fn samples(&self) -> impl Iterator<Item = FieldSample> + '_ {
        let tree = self.grid.tree();
        tree.leaves().into_iter().map(move |id| FieldSample {
            density: tree.get(id, Field::Density),
            region: tree.cell(id).region,
        })
    }

    /// Density integrated over the domain.
    pub fn total_mass(&self) -> f32 {
        self.samples().map(|s| s.density * s.region.area() as f32).sum()
    }

    /// The density field rasterized at unit resolution, indexed `[i, j]`.
    pub fn density_grid(&self) -> Array2<f32> {
        let n = self.grid.resolution() as usize;
        let mut raster = Array2::zeros((n, n));

        for sample in self.samples() {
            let (start, end) = (sample.region.start, sample.region.end);
            raster
                .slice_mut(s![start.x..end.x, start.y..end.y])
                .fill(sample.density);
        }

        raster
    }
}

/// Converts without wrapping, so huge indices still clamp onto the far edge.
fn to_signed(index: UVec2) -> IVec2 {
    index.min(UVec2::splat(i32::MAX as u32)).as_ivec2()
}

impl Fluid for QuadtreeFluid2D {
    type Params = QuadtreeFluid2DParams;

    fn initialize(resolution: u32, _particle_count_hint: usize, params: &Self::Params) -> Result<Self, FluidError> {
        let mut fluid = Self {
            grid: AdaptiveGrid::new(resolution)?,
            leaves: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(params.seed),
            tick: 0,
        };

        if params.initial_fill == InitialFill::Random {
            fluid.fill_random();
        }

        Ok(fluid)
    }

    fn step(&mut self, params: &Self::Params) -> Result<(), FluidError> {
        let coarsened = self.grid.coarsen_pass(params.coarsen_threshold);
        let refined = self.grid.refine_pass(params.refine_threshold, &mut self.leaves);

        stages::velocity_step(&mut self.grid, &self.leaves, params)?;
        stages::density_step(&mut self.grid, &self.leaves, params)?;

        self.tick += 1;
        debug!(
            "tick {}: {} leaves ({coarsened} coarsened, {refined} refined)",
            self.tick,
            self.leaves.len(),
        );

        Ok(())
    }

    fn add_fluid(&mut self, index: UVec2, params: &Self::Params) {
        let id = self.grid.point_locate(to_signed(index));
        let v = params.injection_velocity;
        let impulse = [
            (self.rng.gen::<f32>() - 0.5) * 2.0 * v,
            (self.rng.gen::<f32>() - 0.5) * 2.0 * v,
        ];

        let tree = self.grid.tree_mut();
        tree.set(id, Field::Density, tree.get(id, Field::Density) + params.injection_density);
        tree.set(id, Field::VelocityX, tree.get(id, Field::VelocityX) + impulse[0]);
        tree.set(id, Field::VelocityY, tree.get(id, Field::VelocityY) + impulse[1]);
    }

    #[inline]
    fn resolution(&self) -> u32 {
        self.grid.resolution()
    }

    fn sample(&self, index: UVec2) -> FieldSample {
        let tree = self.grid.tree();
        let id = tree.point_locate(to_signed(index));

        FieldSample {
            density: tree.get(id, Field::Density),
            region: tree.cell(id).region,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec2, UVec2};

    use super::{InitialFill, QuadtreeFluid2D, QuadtreeFluid2DParams};
    use crate::{
        error::{FluidError, Stage},
        fields::Field,
        region::Region,
        Fluid,
    };

    fn refined_once(n: u32) -> (QuadtreeFluid2D, QuadtreeFluid2DParams) {
        let params = QuadtreeFluid2DParams::default();
        let mut fluid = QuadtreeFluid2D::initialize(n, 0, &params).unwrap();
        let root = fluid.grid.tree().root();
        fluid.grid.tree_mut().refine(root);
        (fluid, params)
    }

    #[test]
    fn initializes_to_a_single_leaf() {
        let params = QuadtreeFluid2DParams::default();
        let fluid = QuadtreeFluid2D::initialize(64, 10_000, &params).unwrap();

        assert_eq!(fluid.resolution(), 64);
        assert_eq!(fluid.grid().border().len(), 4 * 64 + 4);

        let samples: Vec<_> = fluid.samples().collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].region, Region::square(64));
        assert_eq!(samples[0].density, 0.0);
    }

    #[test]
    fn rejects_invalid_resolution() {
        let params = QuadtreeFluid2DParams::default();
        assert!(matches!(QuadtreeFluid2D::initialize(48, 0, &params), Err(FluidError::InvalidResolution(48))));
        assert!(matches!(QuadtreeFluid2D::initialize(1, 0, &params), Err(FluidError::InvalidResolution(1))));
    }

    #[test]
    fn injection_adds_density_and_bounded_velocity() {
        let (mut fluid, params) = refined_once(4);
        fluid.add_fluid(UVec2::new(2, 2), &params);
        fluid.add_fluid(UVec2::new(3, 3), &params);

        let se = fluid.grid.point_locate(IVec2::new(2, 2));
        let tree = fluid.grid.tree();
        assert_eq!(tree.get(se, Field::Density), 500.0);
        assert!(tree.get(se, Field::VelocityX).abs() <= 20.0);
        assert!(tree.get(se, Field::VelocityY).abs() <= 20.0);

        let nw = fluid.grid.point_locate(IVec2::new(0, 0));
        assert_eq!(tree.get(nw, Field::Density), 0.0);
    }

    #[test]
    fn refined_children_start_from_parent_values() {
        let (mut fluid, params) = refined_once(4);
        let ne = fluid.grid.point_locate(IVec2::new(2, 0));
        fluid.grid.tree_mut().set(ne, Field::Density, 3.0);
        fluid.grid.tree_mut().set(ne, Field::VelocityY, -1.5);
        let parent = *fluid.grid.tree().fields(ne);
        fluid.add_fluid(UVec2::new(2, 2), &params);

        let mut leaves = Vec::new();
        fluid.grid.refine_pass(params.refine_threshold, &mut leaves);

        let children = fluid.grid.tree().cell(ne).children().expect("north-east quadrant refined");
        for child in children {
            assert_eq!(*fluid.grid.tree().fields(child), parent);
        }
    }

    #[test]
    fn lone_root_only_sees_its_border() {
        let params = QuadtreeFluid2DParams::default();
        let mut fluid = QuadtreeFluid2D::initialize(4, 0, &params).unwrap();
        fluid.add_fluid(UVec2::new(2, 2), &params);
        fluid.step(&params).unwrap();

        let samples: Vec<_> = fluid.samples().collect();
        assert_eq!(samples.len(), 1);
        assert!((samples[0].density - 250.0).abs() < 1e-3);
    }

    #[test]
    fn injection_refines_sharp_neighbours_after_one_step() {
        let (mut fluid, params) = refined_once(4);
        fluid.add_fluid(UVec2::new(2, 2), &params);
        fluid.step(&params).unwrap();

        let tree = fluid.grid.tree();
        let quadrants = tree.cell(tree.root()).children().unwrap();
        let refined: Vec<_> = quadrants.iter().map(|&q| !tree.cell(q).is_leaf()).collect();
        assert_eq!(refined, [false, true, true, false]);
        assert_eq!(fluid.samples().count(), 10);
        assert_eq!(fluid.tick(), 1);
    }

    #[test]
    fn mass_is_conserved_at_rest() {
        let params = QuadtreeFluid2DParams {
            refine_threshold: f32::INFINITY,
            coarsen_threshold: -1.0,
            ..Default::default()
        };

        // Depth 3 puts unit leaves along every wall.
        for depth in [2, 3] {
            let mut fluid = QuadtreeFluid2D::initialize(8, 0, &params).unwrap();
            let tree = fluid.grid.tree_mut();
            for _ in 0..depth {
                for id in tree.leaves() {
                    tree.refine(id);
                }
            }
            for (k, id) in tree.leaves().into_iter().enumerate() {
                tree.set(id, Field::Density, (k % 5) as f32 * 20.0);
            }

            let before = fluid.total_mass();
            for _ in 0..20 {
                fluid.step(&params).unwrap();
            }

            assert_eq!(fluid.samples().count(), 1 << (2 * depth));
            let after = fluid.total_mass();
            assert!((after - before).abs() <= 1e-4 * before, "depth {depth}: {before} -> {after}");
        }
    }

    #[test]
    fn non_finite_values_abort_the_tick() {
        let params = QuadtreeFluid2DParams::default();
        let mut fluid = QuadtreeFluid2D::initialize(4, 0, &params).unwrap();
        let root = fluid.grid.tree().root();
        fluid.grid.tree_mut().set(root, Field::VelocityX, f32::NAN);

        let err = fluid.step(&params).unwrap_err();
        assert!(matches!(
            err,
            FluidError::NonFinite { stage: Stage::Diffuse, field: Field::PrevVelocityX, region, .. } if region == Region::square(4)
        ));
        assert_eq!(fluid.tick(), 0);
    }

    #[test]
    fn random_fill_is_reproducible() {
        let params = QuadtreeFluid2DParams {
            seed: 7,
            initial_fill: InitialFill::Random,
            ..Default::default()
        };

        let mut a = QuadtreeFluid2D::initialize(16, 0, &params).unwrap();
        let mut b = QuadtreeFluid2D::initialize(16, 0, &params).unwrap();
        assert_eq!(a.samples().count(), 256);
        assert!(a.samples().all(|s| (0.0..100.0).contains(&s.density)));

        for _ in 0..3 {
            a.step(&params).unwrap();
            b.step(&params).unwrap();
        }
        assert_eq!(a.density_grid(), b.density_grid());
    }

    #[test]
    fn sample_reports_the_owning_leaf() {
        let (mut fluid, params) = refined_once(8);
        fluid.add_fluid(UVec2::new(6, 1), &params);

        let sample = fluid.sample(UVec2::new(5, 3));
        assert_eq!(sample.region, Region::new(IVec2::new(4, 0), IVec2::new(8, 4)));
        assert_eq!(sample.density, 250.0);

        // Out-of-range indices clamp onto the edge.
        assert_eq!(fluid.sample(UVec2::new(100, 0)), sample);

        let raster = fluid.density_grid();
        assert_eq!(raster[[7, 0]], 250.0);
        assert_eq!(raster[[3, 0]], 0.0);
        assert_eq!(raster.sum(), fluid.total_mass());
    }
}
