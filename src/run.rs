use std::{error::Error, f32::consts::TAU, path::PathBuf};

use clap::{Args, ValueEnum};
use glam::{UVec2, Vec2};
use indicatif::{ProgressBar, ProgressIterator, ProgressStyle};
use log::{info, warn};
use quadflow_fluids::{
    eulerian::{InitialFill, QuadtreeFluid2D, QuadtreeFluid2DParams},
    scene::Scene,
    Fluid,
};
use quadflow_io::encode::FluidDataEncoder;

/// Full turns of the injection point over the first half of the run.
const ORBITS: f32 = 3.0;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Fill {
    Empty,
    Random,
}

impl From<Fill> for InitialFill {
    fn from(fill: Fill) -> Self {
        match fill {
            Fill::Empty => InitialFill::Empty,
            Fill::Random => InitialFill::Random,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Cells along each side of the finest grid. Must be a power of two.
    #[arg(short, long, default_value_t = 128)]
    resolution: u32,
    #[arg(short, long, default_value_t = 300)]
    frames: u64,
    /// Viewport width in pixels, used to map the scripted input.
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 800)]
    height: u32,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, value_enum, default_value_t = Fill::Empty)]
    fill: Fill,
    #[arg(long)]
    dt: Option<f32>,
    #[arg(long)]
    viscosity: Option<f32>,
    #[arg(long)]
    diffusion: Option<f32>,
    /// Relaxation sweeps per solve.
    #[arg(long)]
    iters: Option<usize>,
    #[arg(long)]
    refine_threshold: Option<f32>,
    #[arg(long)]
    coarsen_threshold: Option<f32>,
    #[arg(short, long, default_value = "output")]
    output: PathBuf,
}

impl RunArgs {
    fn params(&self) -> QuadtreeFluid2DParams {
        let defaults = QuadtreeFluid2DParams::default();

        QuadtreeFluid2DParams {
            dt: self.dt.unwrap_or(defaults.dt),
            viscosity: self.viscosity.unwrap_or(defaults.viscosity),
            diffusion: self.diffusion.unwrap_or(defaults.diffusion),
            num_iters: self.iters.unwrap_or(defaults.num_iters),
            refine_threshold: self.refine_threshold.unwrap_or(defaults.refine_threshold),
            coarsen_threshold: self.coarsen_threshold.unwrap_or(defaults.coarsen_threshold),
            seed: self.seed,
            initial_fill: self.fill.into(),
            ..defaults
        }
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let params = args.params();
    let fluid = QuadtreeFluid2D::initialize(args.resolution, 0, &params)?;
    let mut scene = Scene::new(fluid, params, UVec2::new(args.width, args.height));

    let mut encoder = FluidDataEncoder::new(args.output.clone(), args.frames)?;
    encoder.encode_metadata(&scene, scene.params().dt)?;

    let bar_template = "Running Simulation {spinner:.green} [{elapsed}] [{bar:50.white/white}] {pos}/{len} ({eta})";
    let style = ProgressStyle::with_template(bar_template)?
        .progress_chars("=> ").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress = ProgressBar::new(args.frames).with_style(style);

    let viewport = scene.viewport().as_vec2();
    let radius = 0.25 * viewport.min_element();

    for frame in (0..args.frames).progress_with(progress) {
        let t = frame as f32 / args.frames as f32;

        // Orbiting source
        if t < 0.5 {
            let theta = t * ORBITS * TAU;
            let pixel = viewport / 2.0 + radius * Vec2::new(theta.cos(), theta.sin());
            scene.inject(pixel.as_ivec2());
        }

        if let Err(err) = scene.step() {
            warn!("simulation stopped at frame {frame}: {err}");
            return Err(err.into());
        }
        encoder.encode_frame(&scene)?;
    }

    let peak = scene.fluid.density_grid().iter().copied().fold(0.0, f32::max);
    info!(
        "wrote {} frames to {}: {} leaves, total mass {:.2}, peak density {:.2}",
        encoder.frames_written(),
        args.output.display(),
        scene.leaves().count(),
        scene.fluid.total_mass(),
        peak,
    );

    Ok(())
}
