use glam::IVec2;

use crate::{
    fields::Field,
    quadtree::{direction::{Direction, Quadrant}, CellId, QuadTree},
    region::Region,
};

/// How a field behaves at the domain walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// Copied unchanged across every wall.
    Scalar,
    /// Reflected across the west and east walls.
    VelocityX,
    /// Reflected across the north and south walls.
    VelocityY,
}

impl Boundary {
    fn sign(self, wall: Direction) -> f32 {
        match (self, wall) {
            (Boundary::VelocityX, Direction::West | Direction::East) => -1.0,
            (Boundary::VelocityY, Direction::North | Direction::South) => -1.0,
            _ => 1.0,
        }
    }
}

/// The ring of `4N + 4` ghost cells around the domain.
///
/// Cells are laid out as the north row, the south row, the west column and the east column
/// (`N` each, in increasing index order), followed by the NW, NE, SW and SE corners. Each edge
/// cell remembers the interior leaf currently touching it.
#[derive(Debug, Clone)]
pub struct BorderRing {
    resolution: usize,
    cells: Vec<CellId>,
    sources: Vec<Option<CellId>>,
}

impl BorderRing {
    /// Allocates the ring as detached cells of `tree`.
    pub fn new(tree: &mut QuadTree) -> Self {
        let n = tree.resolution();
        let mut cells = Vec::with_capacity(4 * n as usize + 4);

        for wall in Direction::ALL {
            for k in 0..n {
                let index = match wall {
                    Direction::North => IVec2::new(k, -1),
                    Direction::South => IVec2::new(k, n),
                    Direction::West => IVec2::new(-1, k),
                    Direction::East => IVec2::new(n, k),
                };
                cells.push(tree.insert_detached(Region::unit(index)));
            }
        }

        for corner in Quadrant::ALL {
            let (east, south) = corner.sides();
            let index = IVec2::new(if east { n } else { -1 }, if south { n } else { -1 });
            cells.push(tree.insert_detached(Region::unit(index)));
        }

        Self {
            resolution: n as usize,
            sources: vec![None; 4 * n as usize],
            cells,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    /// The border cells along `wall`, in increasing index order.
    pub fn wall(&self, wall: Direction) -> &[CellId] {
        let n = self.resolution;
        &self.cells[wall.index() * n..(wall.index() + 1) * n]
    }

    pub fn corner(&self, corner: Quadrant) -> CellId {
        self.cells[4 * self.resolution + corner.index()]
    }

    /// The interior leaf last recorded as touching the `offset`-th cell of `wall`.
    pub fn source(&self, wall: Direction, offset: usize) -> Option<CellId> {
        self.sources[wall.index() * self.resolution + offset]
    }

    /// Returns the border cells facing `region` across `wall` and records `leaf` as their source.
    pub fn claim(&mut self, wall: Direction, region: Region, leaf: CellId) -> &[CellId] {
        let (start, end) = match wall {
            Direction::North | Direction::South => (region.start.x, region.end.x),
            Direction::West | Direction::East => (region.start.y, region.end.y),
        };

        let base = wall.index() * self.resolution;
        let range = base + start as usize..base + end as usize;
        for source in &mut self.sources[range.clone()] {
            *source = Some(leaf);
        }

        &self.cells[range]
    }

    /// Sets `field` on every border cell from its source leaf, then fills the corners with the
    /// mean of their two adjacent edge cells. Cells without a source keep their value.
    pub fn apply(&self, tree: &mut QuadTree, kind: Boundary, field: Field) {
        for wall in Direction::ALL {
            let sign = kind.sign(wall);
            for (&cell, &source) in self.wall(wall).iter().zip(&self.sources[wall.index() * self.resolution..]) {
                if let Some(source) = source {
                    let value = tree.get(source, field);
                    tree.set(cell, field, sign * value);
                }
            }
        }

        let last = self.resolution - 1;
        let corners = [
            (Quadrant::NorthWest, (Direction::North, 0), (Direction::West, 0)),
            (Quadrant::NorthEast, (Direction::North, last), (Direction::East, 0)),
            (Quadrant::SouthWest, (Direction::South, 0), (Direction::West, last)),
            (Quadrant::SouthEast, (Direction::South, last), (Direction::East, last)),
        ];

        for (corner, (wall_a, a), (wall_b, b)) in corners {
            let value = 0.5 * (tree.get(self.wall(wall_a)[a], field) + tree.get(self.wall(wall_b)[b], field));
            tree.set(self.corner(corner), field, value);
        }
    }
}
