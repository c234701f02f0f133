use glam::IVec2;

use crate::{
    border::{Boundary, BorderRing},
    error::{FluidError, MAX_RESOLUTION, MIN_RESOLUTION},
    fields::Field,
    quadtree::{direction::Direction, neighbors::{NeighborList, NeighborTable}, CellId, QuadTree},
};

/// The spatial context shared by every solver stage: the tree, its border ring and the
/// neighbour sets resolved for the current tick.
#[derive(Debug, Clone)]
pub struct AdaptiveGrid {
    resolution: u32,
    tree: QuadTree,
    border: BorderRing,
    neighbors: NeighborTable,
}

impl AdaptiveGrid {
    pub fn new(resolution: u32) -> Result<Self, FluidError> {
        if !resolution.is_power_of_two() || !(MIN_RESOLUTION..=MAX_RESOLUTION).contains(&resolution) {
            return Err(FluidError::InvalidResolution(resolution));
        }

        let mut tree = QuadTree::new(resolution);
        let border = BorderRing::new(&mut tree);
        let neighbors = NeighborTable::with_resolution(resolution);

        Ok(Self {
            resolution,
            tree,
            border,
            neighbors,
        })
    }

    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    #[inline]
    pub fn tree(&self) -> &QuadTree {
        &self.tree
    }

    #[inline]
    pub fn tree_mut(&mut self) -> &mut QuadTree {
        &mut self.tree
    }

    #[inline]
    pub fn border(&self) -> &BorderRing {
        &self.border
    }

    /// The neighbour set of `id` along `direction` as of the last resolve pass.
    #[inline]
    pub fn neighbors(&self, id: CellId, direction: Direction) -> &[CellId] {
        self.neighbors.get(id, direction)
    }

    #[inline]
    pub fn point_locate(&self, index: IVec2) -> CellId {
        self.tree.point_locate(index)
    }

    fn resolve(&mut self, id: CellId, direction: Direction, neighbors: &mut NeighborList) {
        neighbors.clear();
        match self.tree.greater_or_equal_neighbor(id, direction) {
            Some(candidate) => self.tree.leaf_neighbors(candidate, direction, neighbors),
            None => {
                let region = self.tree.cell(id).region;
                neighbors.extend_from_slice(self.border.claim(direction, region, id));
            }
        }
    }

    /// Resolves and stores the four neighbour sets of the leaf `id`.
    ///
    /// With `can_refine`, the leaf is also refined when the density spread over all of its
    /// neighbours exceeds `threshold`; its new children get their neighbour sets resolved but
    /// are not tested again. Returns the number of refined cells.
    pub fn find_neighbors_and_refine(&mut self, id: CellId, can_refine: bool, threshold: f32) -> usize {
        let mut neighbors = NeighborList::new();
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;

        for direction in Direction::ALL {
            self.resolve(id, direction, &mut neighbors);
            if can_refine {
                for &n in &neighbors {
                    let d = self.tree.get(n, Field::Density);
                    min = min.min(d);
                    max = max.max(d);
                }
            }
            self.neighbors.set(id, direction, &neighbors);
        }

        if !can_refine || max - min <= threshold || !self.tree.refine(id) {
            return 0;
        }

        if let Some(children) = self.tree.cell(id).children() {
            for child in children {
                self.find_neighbors_and_refine(child, false, threshold);
            }
        }

        1
    }

    /// Rebuilds every neighbour set and refines leaves with sharp surroundings.
    ///
    /// `leaves` receives the leaves of the final tree. When anything was refined the sets are
    /// resolved a second time so none of them refers to a cell that became internal during
    /// the pass. Returns the number of refined cells.
    pub fn refine_pass(&mut self, threshold: f32, leaves: &mut Vec<CellId>) -> usize {
        self.neighbors.clear(self.tree.capacity());
        self.tree.collect_leaves(leaves);

        let refined: usize = leaves
            .iter()
            .map(|&id| self.find_neighbors_and_refine(id, true, threshold))
            .sum();

        if refined > 0 {
            self.resolve_all(leaves);
        }

        refined
    }

    /// Resolves the neighbour sets of every leaf without refining.
    pub fn resolve_all(&mut self, leaves: &mut Vec<CellId>) {
        self.neighbors.clear(self.tree.capacity());
        self.tree.collect_leaves(leaves);

        for &id in leaves.iter() {
            self.find_neighbors_and_refine(id, false, 0.0);
        }
    }

    /// Post-order coarsening of the tree. Returns the number of merged cells.
    pub fn coarsen_pass(&mut self, threshold: f32) -> usize {
        self.tree.coarsen_pass(threshold)
    }

    /// Mean of each requested field over the neighbour set of every direction, indexed by
    /// [`Direction::index`].
    pub fn neighbor_means<const K: usize>(&self, id: CellId, fields: [Field; K]) -> [[f32; K]; 4] {
        Direction::ALL.map(|direction| {
            let neighbors = self.neighbors.get(id, direction);
            debug_assert!(!neighbors.is_empty(), "leaf has no {direction:?} neighbours");

            let mut sums = [0.0; K];
            for &n in neighbors {
                let values = self.tree.fields(n);
                for (sum, &field) in sums.iter_mut().zip(&fields) {
                    *sum += values[field];
                }
            }

            let scale = (neighbors.len() as f32).recip();
            sums.map(|sum| sum * scale)
        })
    }

    /// Refreshes the border ring's copy of `field`.
    pub fn set_boundary(&mut self, kind: Boundary, field: Field) {
        self.border.apply(&mut self.tree, kind, field);
    }
}
