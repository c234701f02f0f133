use glam::{IVec2, Vec2};
use log::trace;

use crate::{
    border::Boundary,
    error::{FluidError, Stage},
    fields::Field,
    grid::AdaptiveGrid,
    quadtree::CellId,
};

use super::QuadtreeFluid2DParams;

/// Diffuses, projects and self-advects both velocity components.
///
/// The first projection keeps its pressure and divergence in the current-velocity slots,
/// the second one in the previous-velocity slots.
pub(super) fn velocity_step(grid: &mut AdaptiveGrid, leaves: &[CellId], params: &QuadtreeFluid2DParams) -> Result<(), FluidError> {
    use Field::*;

    let iters = params.num_iters;
    diffuse(grid, leaves, Boundary::VelocityX, [PrevVelocityX, VelocityX], params.viscosity, params)?;
    diffuse(grid, leaves, Boundary::VelocityY, [PrevVelocityY, VelocityY], params.viscosity, params)?;

    project(grid, leaves, [PrevVelocityX, PrevVelocityY], [VelocityX, VelocityY], iters)?;

    let velocity = [PrevVelocityX, PrevVelocityY];
    advect(grid, leaves, Boundary::VelocityX, [VelocityX, PrevVelocityX], velocity, params.dt)?;
    advect(grid, leaves, Boundary::VelocityY, [VelocityY, PrevVelocityY], velocity, params.dt)?;

    project(grid, leaves, [VelocityX, VelocityY], [PrevVelocityX, PrevVelocityY], iters)
}

/// Diffuses the density, then carries it along the current velocity.
pub(super) fn density_step(grid: &mut AdaptiveGrid, leaves: &[CellId], params: &QuadtreeFluid2DParams) -> Result<(), FluidError> {
    use Field::*;

    diffuse(grid, leaves, Boundary::Scalar, [PrevDensity, Density], params.diffusion, params)?;
    advect(grid, leaves, Boundary::Scalar, [Density, PrevDensity], [VelocityX, VelocityY], params.dt)
}

/// Gauss-Seidel relaxation of `c·x - a·Σ neighbours(x) = x0`, sweeping the leaves in place.
pub(super) fn linear_solve(
    grid: &mut AdaptiveGrid,
    leaves: &[CellId],
    kind: Boundary,
    [x, x0]: [Field; 2],
    a: f32,
    c: f32,
    iters: usize,
) {
    let c_recip = c.recip();

    for _ in 0..iters {
        for &id in leaves {
            let sum: f32 = grid.neighbor_means(id, [x]).iter().map(|[v]| v).sum();
            let rhs = grid.tree().get(id, x0);
            grid.tree_mut().set(id, x, (rhs + a * sum) * c_recip);
        }
        grid.set_boundary(kind, x);
    }
}

/// Implicit diffusion of `x0` into `x` at the given `rate`.
pub(super) fn diffuse(
    grid: &mut AdaptiveGrid,
    leaves: &[CellId],
    kind: Boundary,
    [x, x0]: [Field; 2],
    rate: f32,
    params: &QuadtreeFluid2DParams,
) -> Result<(), FluidError> {
    let n = grid.resolution() as f32;
    let a = params.dt * rate * n * n;

    linear_solve(grid, leaves, kind, [x, x0], a, 1.0 + 4.0 * a, params.num_iters);

    trace!("diffused {x:?} over {} leaves", leaves.len());
    check_finite(grid, leaves, Stage::Diffuse, &[x])
}

/// Removes the divergent part of `[vx, vy]`, using `[p, div]` as scratch.
pub(super) fn project(
    grid: &mut AdaptiveGrid,
    leaves: &[CellId],
    [vx, vy]: [Field; 2],
    [p, div]: [Field; 2],
    iters: usize,
) -> Result<(), FluidError> {
    let n = grid.resolution() as f32;

    for &id in leaves {
        let [north, south, west, east] = grid.neighbor_means(id, [vx, vy]);
        let divergence = -0.5 * ((east[0] - west[0]) + (south[1] - north[1])) / n;

        let tree = grid.tree_mut();
        tree.set(id, div, divergence);
        tree.set(id, p, 0.0);
    }
    grid.set_boundary(Boundary::Scalar, div);
    grid.set_boundary(Boundary::Scalar, p);

    linear_solve(grid, leaves, Boundary::Scalar, [p, div], 1.0, 4.0, iters);

    for &id in leaves {
        let [[north], [south], [west], [east]] = grid.neighbor_means(id, [p]);
        let (u, v) = (grid.tree().get(id, vx), grid.tree().get(id, vy));

        let tree = grid.tree_mut();
        tree.set(id, vx, u - 0.5 * n * (east - west));
        tree.set(id, vy, v - 0.5 * n * (south - north));
    }
    grid.set_boundary(Boundary::VelocityX, vx);
    grid.set_boundary(Boundary::VelocityY, vy);

    trace!("projected ({vx:?}, {vy:?}) over {} leaves", leaves.len());
    check_finite(grid, leaves, Stage::Project, &[vx, vy, p, div])
}

/// Semi-Lagrangian transport of `d0` into `d` along `[vx, vy]`.
///
/// Every unit index of a leaf is traced back with the leaf's own velocity and the bilinear
/// samples are averaged over the leaf. Positions are clamped into `[-0.5, N - 0.5]` in index
/// space, so a trace that stays put samples its own cell exactly.
pub(super) fn advect(
    grid: &mut AdaptiveGrid,
    leaves: &[CellId],
    kind: Boundary,
    [d, d0]: [Field; 2],
    [vx, vy]: [Field; 2],
    dt: f32,
) -> Result<(), FluidError> {
    let n = grid.resolution() as f32;
    let dt0 = dt * n;

    for &id in leaves {
        let region = grid.tree().cell(id).region;
        let velocity = Vec2::new(grid.tree().get(id, vx), grid.tree().get(id, vy));

        let mut total = 0.0;
        for index in region.iter() {
            let pos = (index.as_vec2() - dt0 * velocity).clamp(Vec2::splat(-0.5), Vec2::splat(n - 0.5));
            total += sample_bilinear(grid, d0, pos);
        }

        grid.tree_mut().set(id, d, total / region.area() as f32);
    }
    grid.set_boundary(kind, d);

    trace!("advected {d:?} over {} leaves", leaves.len());
    check_finite(grid, leaves, Stage::Advect, &[d])
}

fn sample_bilinear(grid: &AdaptiveGrid, field: Field, pos: Vec2) -> f32 {
    let base = pos.floor();
    let s1 = pos - base;
    let s0 = Vec2::ONE - s1;

    let i0 = base.as_ivec2();
    let at = |offset: IVec2| grid.tree().get(grid.point_locate(i0 + offset), field);

    s0.x * (s0.y * at(IVec2::ZERO) + s1.y * at(IVec2::Y))
        + s1.x * (s0.y * at(IVec2::X) + s1.y * at(IVec2::ONE))
}

/// Fails with the first leaf holding a non-finite value in any of `fields`.
pub(super) fn check_finite(grid: &AdaptiveGrid, leaves: &[CellId], stage: Stage, fields: &[Field]) -> Result<(), FluidError> {
    for &id in leaves {
        for &field in fields {
            let value = grid.tree().get(id, field);
            if !value.is_finite() {
                return Err(FluidError::NonFinite {
                    stage,
                    field,
                    region: grid.tree().cell(id).region,
                    value,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use glam::IVec2;

    use super::{advect, diffuse, project};
    use crate::{
        border::Boundary,
        eulerian::QuadtreeFluid2DParams,
        fields::Field,
        grid::AdaptiveGrid,
        quadtree::CellId,
    };

    /// A grid refined uniformly down to leaves of the given edge length.
    fn uniform_grid(n: u32, leaf: i32) -> (AdaptiveGrid, Vec<CellId>) {
        let mut grid = AdaptiveGrid::new(n).unwrap();
        loop {
            let leaves = grid.tree().leaves();
            if grid.tree().cell(leaves[0]).region.extent().x <= leaf {
                break;
            }
            for id in leaves {
                grid.tree_mut().refine(id);
            }
        }

        let mut leaves = Vec::new();
        grid.resolve_all(&mut leaves);
        (grid, leaves)
    }

    fn mass(grid: &AdaptiveGrid, leaves: &[CellId], field: Field) -> f32 {
        leaves
            .iter()
            .map(|&id| grid.tree().get(id, field) * grid.tree().cell(id).region.area() as f32)
            .sum()
    }

    #[test]
    fn density_is_conserved_without_velocity() {
        for leaf in [1, 2] {
            let (mut grid, leaves) = uniform_grid(8, leaf);
            for (k, &id) in leaves.iter().enumerate() {
                grid.tree_mut().set(id, Field::Density, (k * 7 % 11) as f32 * 9.0);
            }
            grid.set_boundary(Boundary::Scalar, Field::Density);

            let params = QuadtreeFluid2DParams {
                diffusion: 1e-3,
                ..Default::default()
            };
            let before = mass(&grid, &leaves, Field::Density);

            for _ in 0..50 {
                diffuse(&mut grid, &leaves, Boundary::Scalar, [Field::PrevDensity, Field::Density], params.diffusion, &params).unwrap();
                advect(&mut grid, &leaves, Boundary::Scalar, [Field::Density, Field::PrevDensity], [Field::VelocityX, Field::VelocityY], params.dt).unwrap();
            }

            let after = mass(&grid, &leaves, Field::Density);
            assert!((after - before).abs() <= 1e-4 * before, "leaf {leaf}: {before} -> {after}");
        }
    }

    #[test]
    fn advection_at_rest_copies_the_previous_field() {
        // Unit leaves along the north and west walls next to coarser ones.
        let mut grid = AdaptiveGrid::new(8).unwrap();
        let root = grid.tree().root();
        grid.tree_mut().refine(root);
        let nw = grid.point_locate(IVec2::ZERO);
        grid.tree_mut().refine(nw);
        let nw = grid.point_locate(IVec2::ZERO);
        grid.tree_mut().refine(nw);
        let ne = grid.point_locate(IVec2::new(4, 0));
        grid.tree_mut().refine(ne);

        let mut leaves = Vec::new();
        grid.resolve_all(&mut leaves);
        for (k, &id) in leaves.iter().enumerate() {
            grid.tree_mut().set(id, Field::PrevDensity, (k * 5 % 7) as f32 * 13.0 + 1.0);
        }

        advect(&mut grid, &leaves, Boundary::Scalar, [Field::Density, Field::PrevDensity], [Field::VelocityX, Field::VelocityY], 0.5).unwrap();

        for &id in &leaves {
            assert_eq!(grid.tree().get(id, Field::Density), grid.tree().get(id, Field::PrevDensity));
        }
    }

    #[test]
    fn projection_keeps_divergence_free_fields() {
        let (mut grid, leaves) = uniform_grid(8, 1);

        // Alternating columns cancel in the central difference, walls included.
        let profile = |j: i32| (j as f32 * 0.7).sin() + 0.25;
        for &id in &leaves {
            let index = grid.tree().cell(id).region.start;
            let sign = if index.x % 2 == 0 { 1.0 } else { -1.0 };
            grid.tree_mut().set(id, Field::VelocityX, sign * profile(index.y));
        }
        grid.set_boundary(Boundary::VelocityX, Field::VelocityX);
        grid.set_boundary(Boundary::VelocityY, Field::VelocityY);

        let before: Vec<_> = leaves.iter().map(|&id| grid.tree().get(id, Field::VelocityX)).collect();
        project(&mut grid, &leaves, [Field::VelocityX, Field::VelocityY], [Field::PrevVelocityX, Field::PrevVelocityY], 10).unwrap();

        for (&id, u) in leaves.iter().zip(before) {
            assert!((grid.tree().get(id, Field::VelocityX) - u).abs() < 1e-5);
            assert!(grid.tree().get(id, Field::VelocityY).abs() < 1e-5);
        }
    }

    #[test]
    fn projection_reduces_divergence() {
        let (mut grid, leaves) = uniform_grid(8, 1);

        // A source in the middle pushing outward.
        for &id in &leaves {
            let offset = grid.tree().cell(id).region.start - IVec2::splat(4);
            grid.tree_mut().set(id, Field::VelocityX, offset.x as f32);
            grid.tree_mut().set(id, Field::VelocityY, offset.y as f32);
        }
        grid.set_boundary(Boundary::VelocityX, Field::VelocityX);
        grid.set_boundary(Boundary::VelocityY, Field::VelocityY);

        let divergence = |grid: &AdaptiveGrid| -> f32 {
            leaves
                .iter()
                .map(|&id| {
                    let [n, s, w, e] = grid.neighbor_means(id, [Field::VelocityX, Field::VelocityY]);
                    ((e[0] - w[0]) + (s[1] - n[1])).abs()
                })
                .sum()
        };

        let before = divergence(&grid);
        project(&mut grid, &leaves, [Field::VelocityX, Field::VelocityY], [Field::PrevVelocityX, Field::PrevVelocityY], 40).unwrap();
        assert!(divergence(&grid) < before);
    }

    #[test]
    fn advection_moves_density_downstream() {
        let (mut grid, leaves) = uniform_grid(16, 1);
        for &id in &leaves {
            let start = grid.tree().cell(id).region.start;
            grid.tree_mut().set(id, Field::VelocityX, 1.0 / 16.0);
            if start.x == 4 {
                grid.tree_mut().set(id, Field::PrevDensity, 10.0);
            }
        }

        advect(&mut grid, &leaves, Boundary::Scalar, [Field::Density, Field::PrevDensity], [Field::VelocityX, Field::VelocityY], 1.0).unwrap();

        let column = |x: i32| grid.tree().get(grid.point_locate(IVec2::new(x, 8)), Field::Density);
        assert_eq!(column(4), 0.0);
        assert_eq!(column(5), 10.0);
    }
}
