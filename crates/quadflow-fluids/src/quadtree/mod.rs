use direction::Quadrant;
use glam::IVec2;

use crate::{fields::{Field, Fields}, region::Region};

pub mod direction;
pub mod neighbors;

/// Stable index of a cell in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u32);

impl CellId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellKind {
    /// A cell holding live field state.
    Leaf(Fields),
    /// A cell subdivided into children ordered NW, NE, SW, SE.
    Internal([CellId; 4]),
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub region: Region,
    /// Non-owning link used for upward walks. `None` for the root and for border cells.
    pub parent: Option<CellId>,
    /// Where this cell sits inside its parent.
    pub quadrant: Option<Quadrant>,
    pub kind: CellKind,
}

impl Cell {
    fn leaf(region: Region, parent: Option<CellId>, quadrant: Option<Quadrant>, fields: Fields) -> Self {
        Self {
            region,
            parent,
            quadrant,
            kind: CellKind::Leaf(fields),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, CellKind::Leaf(_))
    }

    #[inline]
    pub fn children(&self) -> Option<[CellId; 4]> {
        match self.kind {
            CellKind::Leaf(_) => None,
            CellKind::Internal(children) => Some(children),
        }
    }

    /// Field state of the cell. Internal cells read as zero.
    #[inline]
    pub fn fields(&self) -> &Fields {
        match &self.kind {
            CellKind::Leaf(fields) => fields,
            CellKind::Internal(_) => &Fields::ZERO,
        }
    }
}

/// A region quadtree over an `N × N` index space, stored as an arena.
///
/// The arena also hosts detached cells (the border ring) which are never part of the
/// tree hierarchy and never released.
#[derive(Debug, Clone)]
pub struct QuadTree {
    cells: Vec<Cell>,
    free: Vec<CellId>,
    root: CellId,
    resolution: i32,
}

impl QuadTree {
    /// Creates a tree consisting of a single zeroed leaf covering `[0, resolution)²`.
    pub fn new(resolution: u32) -> Self {
        let resolution = resolution as i32;
        let root = Cell::leaf(Region::square(resolution), None, None, Fields::ZERO);

        Self {
            cells: vec![root],
            free: Vec::new(),
            root: CellId(0),
            resolution,
        }
    }

    #[inline]
    pub fn root(&self) -> CellId {
        self.root
    }

    #[inline]
    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    /// Size of the arena, including released slots and detached cells.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    #[inline]
    pub fn fields(&self, id: CellId) -> &Fields {
        self.cell(id).fields()
    }

    #[inline]
    pub fn get(&self, id: CellId, field: Field) -> f32 {
        self.fields(id)[field]
    }

    /// Writes a field of a leaf. Writes to internal cells are dropped.
    #[inline]
    pub fn set(&mut self, id: CellId, field: Field, value: f32) {
        if let CellKind::Leaf(fields) = &mut self.cells[id.index()].kind {
            fields[field] = value;
        }
    }

    /// Adds a cell outside the hierarchy.
    pub fn insert_detached(&mut self, region: Region) -> CellId {
        self.alloc(Cell::leaf(region, None, None, Fields::ZERO))
    }

    fn alloc(&mut self, cell: Cell) -> CellId {
        match self.free.pop() {
            Some(id) => {
                self.cells[id.index()] = cell;
                id
            }
            None => {
                self.cells.push(cell);
                CellId(self.cells.len() as u32 - 1)
            }
        }
    }

    /// Splits a leaf into four children, each starting with a copy of the leaf's fields.
    ///
    /// Returns `false` and leaves the cell untouched if it is internal or cannot be bisected.
    pub fn refine(&mut self, id: CellId) -> bool {
        let cell = self.cell(id);
        let region = cell.region;
        let fields = match cell.kind {
            CellKind::Leaf(fields) if region.can_split() => fields,
            _ => return false,
        };

        let children = Quadrant::ALL.map(|q| self.alloc(Cell::leaf(region.quadrant(q), Some(id), Some(q), fields)));
        self.cells[id.index()].kind = CellKind::Internal(children);

        true
    }

    /// Merges the four leaf children of `id` into it, averaging their fields.
    ///
    /// Returns `false` and leaves the tree untouched if `id` is a leaf or any child is internal.
    pub fn coarsen(&mut self, id: CellId) -> bool {
        let children = match self.cell(id).children() {
            Some(children) if children.iter().all(|&c| self.cell(c).is_leaf()) => children,
            _ => return false,
        };

        let fields = Fields::mean4(children.map(|c| self.fields(c)));
        self.free.extend(children);
        self.cells[id.index()].kind = CellKind::Leaf(fields);

        true
    }

    /// Coarsens `id` if the density spread across its children is at most `threshold`.
    pub fn check_and_coarsen(&mut self, id: CellId, threshold: f32) -> bool {
        let Some(children) = self.cell(id).children() else {
            return false;
        };

        let (min, max) = children.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &c| {
            let d = self.get(c, Field::Density);
            (min.min(d), max.max(d))
        });

        max - min <= threshold && self.coarsen(id)
    }

    /// Post-order coarsening of the whole tree. Returns the number of merged cells.
    ///
    /// A cell is only tested when all of its children were leaves before the walk reached it,
    /// so the tree shrinks by at most one level per pass.
    pub fn coarsen_pass(&mut self, threshold: f32) -> usize {
        self.coarsen_subtree(self.root, threshold)
    }

    fn coarsen_subtree(&mut self, id: CellId, threshold: f32) -> usize {
        let Some(children) = self.cell(id).children() else {
            return 0;
        };

        let mut merged = 0;
        let mut all_leaves = true;
        for child in children {
            if !self.cell(child).is_leaf() {
                merged += self.coarsen_subtree(child, threshold);
                all_leaves = false;
            }
        }

        if all_leaves && self.check_and_coarsen(id, threshold) {
            merged += 1;
        }

        merged
    }

    /// Finds the leaf containing `index`, clamping it into the domain first.
    pub fn point_locate(&self, index: IVec2) -> CellId {
        let index = index.clamp(IVec2::ZERO, IVec2::splat(self.resolution - 1));

        let mut id = self.root;
        while let CellKind::Internal(children) = self.cell(id).kind {
            let mid = self.cell(id).region.midpoint();
            id = children[Quadrant::from_sides(index.x >= mid.x, index.y >= mid.y).index()];
        }

        id
    }

    /// Collects every leaf in depth-first NW, NE, SW, SE order.
    pub fn collect_leaves(&self, leaves: &mut Vec<CellId>) {
        leaves.clear();

        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            match self.cell(id).kind {
                CellKind::Leaf(_) => leaves.push(id),
                CellKind::Internal(children) => stack.extend(children.iter().rev()),
            }
        }
    }

    pub fn leaves(&self) -> Vec<CellId> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    /// Number of levels below the root.
    pub fn depth(&self, mut id: CellId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.cell(id).parent {
            id = parent;
            depth += 1;
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec2;
    use proptest::prelude::*;

    use super::{CellKind, QuadTree};
    use crate::{fields::{Field, Fields}, region::Region};

    fn leaf_fields(tree: &QuadTree, id: super::CellId) -> Fields {
        match tree.cell(id).kind {
            CellKind::Leaf(fields) => fields,
            CellKind::Internal(_) => panic!("expected a leaf"),
        }
    }

    #[test]
    fn new_tree_is_a_single_leaf_over_the_domain() {
        for k in 1..8 {
            let n = 1 << k;
            let tree = QuadTree::new(n);
            let root = tree.cell(tree.root());

            assert!(root.is_leaf());
            assert_eq!(root.region, Region::square(n as i32));
            assert_eq!(tree.leaves(), vec![tree.root()]);
        }
    }

    #[test]
    fn refine_then_coarsen_restores_fields_exactly() {
        let mut tree = QuadTree::new(16);
        let root = tree.root();
        let values = [0.1, 1.0 / 3.0, -7.25, 1e-7, 123456.79, -0.3];
        for (field, value) in Field::ALL.into_iter().zip(values) {
            tree.set(root, field, value);
        }
        let before = leaf_fields(&tree, root);

        assert!(tree.refine(root));
        let children = tree.cell(root).children().unwrap();
        for child in children {
            assert_eq!(leaf_fields(&tree, child), before);
            assert_eq!(tree.cell(child).parent, Some(root));
        }
        assert_eq!(*tree.fields(root), Fields::ZERO);

        tree.coarsen(root);
        assert_eq!(leaf_fields(&tree, root), before);
    }

    #[test]
    fn refine_fails_on_unit_cells() {
        let mut tree = QuadTree::new(2);
        let root = tree.root();
        assert!(tree.refine(root));

        let child = tree.cell(root).children().unwrap()[3];
        assert_eq!(tree.cell(child).region, Region::unit(IVec2::new(1, 1)));
        assert!(!tree.refine(child));
        assert!(tree.cell(child).is_leaf());
    }

    #[test]
    fn coarsen_pass_merges_smooth_subtrees_bottom_up() {
        let mut tree = QuadTree::new(8);
        let root = tree.root();
        tree.refine(root);
        let nw = tree.cell(root).children().unwrap()[0];
        tree.refine(nw);

        // Only the deepest subtree is eligible in the first pass.
        assert_eq!(tree.coarsen_pass(0.4), 1);
        assert!(tree.cell(nw).is_leaf());
        assert!(!tree.cell(root).is_leaf());

        let ne = tree.cell(root).children().unwrap()[1];
        tree.set(ne, Field::Density, 5.0);
        assert_eq!(tree.coarsen_pass(0.4), 0);
        assert!(!tree.cell(root).is_leaf());

        tree.set(ne, Field::Density, 0.3);
        assert_eq!(tree.coarsen_pass(0.4), 1);
        assert_eq!(tree.leaves().len(), 1);
    }

    #[test]
    fn coarsen_skips_cells_with_internal_children() {
        let mut tree = QuadTree::new(8);
        let root = tree.root();
        assert!(!tree.coarsen(root));

        tree.refine(root);
        let nw = tree.cell(root).children().unwrap()[0];
        tree.refine(nw);
        let (capacity, leaves) = (tree.capacity(), tree.leaves());

        assert!(!tree.coarsen(root));
        assert!(!tree.check_and_coarsen(root, f32::INFINITY));
        assert_eq!(tree.leaves(), leaves);

        // Slots were not released, so a refine elsewhere grows the arena.
        let ne = tree.cell(root).children().unwrap()[1];
        tree.refine(ne);
        assert_eq!(tree.capacity(), capacity + 4);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut tree = QuadTree::new(8);
        let root = tree.root();
        tree.refine(root);
        let capacity = tree.capacity();

        tree.coarsen(root);
        tree.refine(root);
        assert_eq!(tree.capacity(), capacity);
    }

    proptest! {
        #[test]
        fn point_locate_returns_the_containing_leaf(
            k in 1u32..6,
            ops in prop::collection::vec((any::<bool>(), 0i32..64, 0i32..64), 0..48),
        ) {
            let n = 1 << k;
            let mut tree = QuadTree::new(n);

            for (refine, i, j) in ops {
                let leaf = tree.point_locate(IVec2::new(i, j));
                if refine {
                    tree.refine(leaf);
                } else if let Some(parent) = tree.cell(leaf).parent {
                    let children = tree.cell(parent).children().unwrap();
                    if children.iter().all(|&c| tree.cell(c).is_leaf()) {
                        tree.coarsen(parent);
                    }
                }
            }

            for index in Region::square(n as i32).iter() {
                let leaf = tree.point_locate(index);
                prop_assert!(tree.cell(leaf).is_leaf());
                prop_assert!(tree.cell(leaf).region.contains(index));
            }
        }
    }
}
