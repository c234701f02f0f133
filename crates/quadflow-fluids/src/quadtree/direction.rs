/// One of the four edges of a cell. North is towards smaller `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::North, Direction::South, Direction::West, Direction::East];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

/// Position of a child inside its parent. Children are stored in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [Quadrant::NorthWest, Quadrant::NorthEast, Quadrant::SouthWest, Quadrant::SouthEast];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_sides(east: bool, south: bool) -> Quadrant {
        match (east, south) {
            (false, false) => Quadrant::NorthWest,
            (true, false) => Quadrant::NorthEast,
            (false, true) => Quadrant::SouthWest,
            (true, true) => Quadrant::SouthEast,
        }
    }

    /// `(east, south)`.
    pub fn sides(self) -> (bool, bool) {
        match self {
            Quadrant::NorthWest => (false, false),
            Quadrant::NorthEast => (true, false),
            Quadrant::SouthWest => (false, true),
            Quadrant::SouthEast => (true, true),
        }
    }

    /// Whether this quadrant touches the `direction` edge of its parent.
    pub fn is_on_side(self, direction: Direction) -> bool {
        let (east, south) = self.sides();
        match direction {
            Direction::North => !south,
            Direction::South => south,
            Direction::West => !east,
            Direction::East => east,
        }
    }

    /// Reflects the quadrant across the axis parallel to the `direction` edge.
    pub fn mirror(self, direction: Direction) -> Quadrant {
        let (east, south) = self.sides();
        match direction {
            Direction::North | Direction::South => Quadrant::from_sides(east, !south),
            Direction::West | Direction::East => Quadrant::from_sides(!east, south),
        }
    }

    /// The two quadrants touching the `direction` edge, west before east and north before south.
    pub fn on_side(direction: Direction) -> [Quadrant; 2] {
        match direction {
            Direction::North => [Quadrant::NorthWest, Quadrant::NorthEast],
            Direction::South => [Quadrant::SouthWest, Quadrant::SouthEast],
            Direction::West => [Quadrant::NorthWest, Quadrant::SouthWest],
            Direction::East => [Quadrant::NorthEast, Quadrant::SouthEast],
        }
    }
}
