use smallvec::{smallvec, SmallVec};

use super::{direction::{Direction, Quadrant}, CellId, CellKind, QuadTree};

/// Inline capacity for a single edge's neighbour list.
pub type NeighborList = SmallVec<[CellId; 8]>;

#[derive(Debug, Clone, Copy, Default)]
struct Span {
    start: u32,
    len: u32,
}

/// Per-tick neighbour sets of every leaf, stored in one shared buffer.
///
/// The table is cleared rather than reallocated between ticks. Entries for cells that were
/// refined or coarsened since the last rebuild are stale and must not be read.
#[derive(Debug, Clone, Default)]
pub struct NeighborTable {
    spans: Vec<[Span; 4]>,
    buffer: Vec<CellId>,
}

impl NeighborTable {
    /// Reserves room for the largest possible fan-out: a leaf of edge length `e` never has
    /// more than `4e` neighbours, and the edge lengths of all leaves sum to at most `N²`.
    pub fn with_resolution(resolution: u32) -> Self {
        let n = resolution as usize;

        Self {
            spans: Vec::new(),
            buffer: Vec::with_capacity(4 * n * n),
        }
    }

    pub fn clear(&mut self, capacity: usize) {
        self.buffer.clear();
        self.spans.clear();
        self.spans.resize(capacity, [Span::default(); 4]);
    }

    pub fn set(&mut self, id: CellId, direction: Direction, neighbors: &[CellId]) {
        if id.index() >= self.spans.len() {
            self.spans.resize(id.index() + 1, [Span::default(); 4]);
        }

        self.spans[id.index()][direction.index()] = Span {
            start: self.buffer.len() as u32,
            len: neighbors.len() as u32,
        };
        self.buffer.extend_from_slice(neighbors);
    }

    pub fn get(&self, id: CellId, direction: Direction) -> &[CellId] {
        match self.spans.get(id.index()) {
            Some(spans) => {
                let span = spans[direction.index()];
                &self.buffer[span.start as usize..(span.start + span.len) as usize]
            }
            None => &[],
        }
    }
}

impl QuadTree {
    /// Finds the smallest cell at least as large as `id` that shares its `direction` edge.
    ///
    /// Returns `None` when that edge lies on the domain boundary. The result may be internal
    /// when the tree is finer on the other side.
    pub fn greater_or_equal_neighbor(&self, id: CellId, direction: Direction) -> Option<CellId> {
        let cell = self.cell(id);
        let (parent, quadrant) = (cell.parent?, cell.quadrant?);
        let siblings = self.cell(parent).children()?;

        if !quadrant.is_on_side(direction) {
            return Some(siblings[quadrant.mirror(direction).index()]);
        }

        let node = self.greater_or_equal_neighbor(parent, direction)?;
        match self.cell(node).kind {
            CellKind::Leaf(_) => Some(node),
            CellKind::Internal(children) => Some(children[quadrant.mirror(direction).index()]),
        }
    }

    /// Collects every leaf under `candidate` touching the edge it shares with a cell lying to
    /// its `direction.opposite()` side, in breadth-first order.
    pub fn leaf_neighbors(&self, candidate: CellId, direction: Direction, neighbors: &mut NeighborList) {
        let facing = Quadrant::on_side(direction.opposite());

        let mut queue: SmallVec<[CellId; 16]> = smallvec![candidate];
        let mut head = 0;
        while let Some(&id) = queue.get(head) {
            head += 1;
            match self.cell(id).kind {
                CellKind::Leaf(_) => neighbors.push(id),
                CellKind::Internal(children) => queue.extend(facing.map(|q| children[q.index()])),
            }
        }
    }
}
