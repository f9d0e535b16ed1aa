//! KD-tree index over navigation graph nodes.
//!
//! The builder and the searches need one query over and over: "which nodes lie
//! within `r` of this point?". Node pruning, open-space sampling, arc
//! construction, search seeding and the bridge filter all go through
//! [`NodeIndex::within_radius`], which answers in O(log n) average time using
//! a KD-tree over ground-plane (x, z) coordinates. Heights are ignored: nodes
//! sit on the terrain surface and distances between them are measured on the
//! map, the same way the stepper measures its hops.
//!
//! The index can be grown one node at a time, which the builder relies on to
//! prune and sample incrementally against the nodes already kept.

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;

use crate::geometry::Position;

/// KD-tree bucket size (kiddo default).
const BUCKET_SIZE: usize = 32;

/// Spatial index mapping positions to dense node indexes.
pub struct NodeIndex {
    tree: KdTree<f32, usize, 2, BUCKET_SIZE, u32>,
    len: usize,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self {
            tree: KdTree::new(),
            len: 0,
        }
    }

    /// Build an index where item `i` is `positions[i]`.
    pub fn build(positions: impl IntoIterator<Item = Position>) -> Self {
        let mut index = Self::new();
        for (item, position) in positions.into_iter().enumerate() {
            index.insert(position, item);
        }
        index
    }

    pub fn insert(&mut self, position: Position, item: usize) {
        self.tree.add(&ground_coords(position), item);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All items within `radius` of `point`, nearest first, with distances.
    pub fn within_radius(&self, point: Position, radius: f32) -> Vec<(usize, f32)> {
        if radius <= 0.0 || self.len == 0 {
            return Vec::new();
        }

        let squared_radius = radius * radius;
        let results = self
            .tree
            .within::<SquaredEuclidean>(&ground_coords(point), squared_radius);

        let mut neighbours: Vec<(usize, f32)> = results
            .into_iter()
            .map(|neighbour| (neighbour.item, neighbour.distance.sqrt()))
            .filter(|(_, distance)| *distance < radius)
            .collect();

        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        neighbours
    }

    /// True when any item lies strictly closer than `radius` to `point`.
    pub fn any_within(&self, point: Position, radius: f32) -> bool {
        !self.within_radius(point, radius).is_empty()
    }

    /// The nearest item to `point`, if any.
    pub fn nearest(&self, point: Position) -> Option<(usize, f32)> {
        if self.len == 0 {
            return None;
        }
        self.tree
            .nearest_n::<SquaredEuclidean>(&ground_coords(point), 1)
            .into_iter()
            .next()
            .map(|neighbour| (neighbour.item, neighbour.distance.sqrt()))
    }
}

impl Default for NodeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIndex").field("len", &self.len).finish()
    }
}

fn ground_coords(position: Position) -> [f32; 2] {
    [position.x, position.z]
}
