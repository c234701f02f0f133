use std::fmt;

use glam::IVec2;

use crate::quadtree::direction::Quadrant;

/// A half-open rectangle of grid indices, `[start.x, end.x) × [start.y, end.y)`.
///
/// `x` is the `i` axis (west to east) and `y` is the `j` axis (north to south).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: IVec2,
    pub end: IVec2,
}

impl Region {
    pub fn new(start: IVec2, end: IVec2) -> Self {
        assert!(start.x < end.x && start.y < end.y, "region has non-positive area");

        Self { start, end }
    }

    /// The square `[0, n) × [0, n)`.
    pub fn square(n: i32) -> Self {
        Self::new(IVec2::ZERO, IVec2::splat(n))
    }

    /// A single index.
    pub fn unit(index: IVec2) -> Self {
        Self::new(index, index + 1)
    }

    #[inline]
    pub fn extent(&self) -> IVec2 {
        self.end - self.start
    }

    #[inline]
    pub fn area(&self) -> i32 {
        let e = self.extent();
        e.x * e.y
    }

    #[inline]
    pub fn midpoint(&self) -> IVec2 {
        (self.start + self.end) / 2
    }

    #[inline]
    pub fn contains(&self, index: IVec2) -> bool {
        index.cmpge(self.start).all() && index.cmplt(self.end).all()
    }

    /// Whether the region can be bisected along both axes.
    pub fn can_split(&self) -> bool {
        let e = self.extent();
        e.x > 1 && e.y > 1 && e.x % 2 == 0 && e.y % 2 == 0
    }

    /// One of the four equal quadrants of this region.
    pub fn quadrant(&self, quadrant: Quadrant) -> Region {
        let mid = self.midpoint();
        let (east, south) = quadrant.sides();
        let (x0, x1) = if east { (mid.x, self.end.x) } else { (self.start.x, mid.x) };
        let (y0, y1) = if south { (mid.y, self.end.y) } else { (self.start.y, mid.y) };

        Region::new(IVec2::new(x0, y0), IVec2::new(x1, y1))
    }

    /// Iterates every index in the region, rows of constant `j` first.
    pub fn iter(&self) -> impl Iterator<Item = IVec2> + '_ {
        (self.start.y..self.end.y).flat_map(move |j| (self.start.x..self.end.x).map(move |i| IVec2::new(i, j)))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}) x [{}, {})", self.start.x, self.end.x, self.start.y, self.end.y)
    }
}
