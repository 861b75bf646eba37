//! Median-split k-d tree over 3D points.
//!
//! The tree is stored as a flat node arena. A sub-range of the sorted index
//! array owns the arena slots at the same positions, and its node lives at
//! the slot of its median. Disjoint sub-ranges therefore write disjoint
//! arena slices, which lets both halves of a split be built concurrently.

use super::candidates::CandidateSet;
use crate::util::{axis_value, BBox3f, Error, Result, Vec3};

/// Sub-ranges larger than this are split with `rayon::join`.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Sentinel child link meaning "no subtree".
const NONE: u32 = u32::MAX;

/// A point and its opaque user id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPoint {
    pub position: Vec3,
    pub user_id: u32,
}

/// Arena node. `point` indexes the record array.
#[derive(Debug, Clone, Copy)]
struct Node {
    axis: u8,
    split: f32,
    point: u32,
    left: u32,
    right: u32,
}

impl Node {
    const EMPTY: Self = Self {
        axis: 0,
        split: 0.0,
        point: NONE,
        left: NONE,
        right: NONE,
    };
}

/// Balanced k-d tree supporting bounded k-nearest-neighbor queries.
///
/// Lifecycle: `add_point`* → `build` → `query_nearest`* → `clear`.
#[derive(Debug, Clone)]
pub struct NearestNeighborTree {
    records: Vec<NeighborPoint>,
    nodes: Vec<Node>,
    root: u32,
    bounds: BBox3f,
    built: bool,
    parallel_threshold: usize,
}

impl Default for NearestNeighborTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NearestNeighborTree {
    pub fn new() -> Self {
        Self::with_parallel_threshold(DEFAULT_PARALLEL_THRESHOLD)
    }

    /// Create a tree whose build forks only above `threshold` points.
    pub fn with_parallel_threshold(threshold: usize) -> Self {
        Self {
            records: Vec::new(),
            nodes: Vec::new(),
            root: NONE,
            bounds: BBox3f::EMPTY,
            built: false,
            parallel_threshold: threshold.max(1),
        }
    }

    /// Add a point to the snapshot. Only valid before `build`.
    pub fn add_point(&mut self, position: Vec3, user_id: u32) -> Result<()> {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }
        self.records.push(NeighborPoint { position, user_id });
        Ok(())
    }

    /// Add many points at once. Only valid before `build`.
    pub fn extend<I>(&mut self, points: I) -> Result<()>
    where
        I: IntoIterator<Item = NeighborPoint>,
    {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }
        self.records.extend(points);
        Ok(())
    }

    /// Build the tree over the current snapshot.
    #[tracing::instrument(skip_all, fields(points = self.records.len()))]
    pub fn build(&mut self) -> Result<()> {
        if self.built {
            return Err(Error::AlreadyBuilt);
        }
        if self.records.len() >= NONE as usize {
            return Err(Error::other(format!(
                "too many points for a 32 bit index: {}",
                self.records.len()
            )));
        }

        let n = self.records.len();
        let mut indices: Vec<u32> = (0..n as u32).collect();
        let mut nodes = vec![Node::EMPTY; n];

        self.root = split(
            &self.records,
            &mut indices,
            &mut nodes,
            0,
            0,
            self.parallel_threshold,
        );
        self.nodes = nodes;
        self.bounds = self.records.iter().fold(BBox3f::EMPTY, |mut b, r| {
            b.expand_by_point(r.position);
            b
        });
        self.built = true;

        tracing::debug!(nodes = self.nodes.len(), radius = self.bounds.radius(), "k-d tree built");
        Ok(())
    }

    /// Drop all points and the tree; the index can be refilled afterwards.
    pub fn clear(&mut self) {
        self.records.clear();
        self.nodes.clear();
        self.root = NONE;
        self.bounds = BBox3f::EMPTY;
        self.built = false;
    }

    /// Ids of at most `max_count` points within `max_radius`, nearest first.
    pub fn query_nearest(&self, position: Vec3, max_count: usize, max_radius: f32) -> Result<Vec<u32>> {
        Ok(self.query_nearest_with_distances(position, max_count, max_radius)?.result())
    }

    /// Like [`query_nearest`](Self::query_nearest) but keeps squared distances.
    pub fn query_nearest_with_distances(
        &self,
        position: Vec3,
        max_count: usize,
        max_radius: f32,
    ) -> Result<CandidateSet> {
        if !self.built {
            return Err(Error::NotBuilt);
        }
        if max_radius.is_nan() || max_radius < 0.0 {
            return Err(Error::InvalidRadius(max_radius));
        }

        let mut candidates = CandidateSet::new(max_count, max_radius);
        if max_count > 0 {
            self.find_nearest(position, &mut candidates, self.root);
        }
        Ok(candidates)
    }

    /// Invoke `f(user_id, dist_sq, num_found, max_dist_sq)` for each neighbor, nearest first.
    ///
    /// `max_dist_sq` is the squared distance of the farthest neighbor found.
    pub fn for_each_nearest<F>(&self, position: Vec3, max_count: usize, max_radius: f32, mut f: F) -> Result<()>
    where
        F: FnMut(u32, f32, usize, f32),
    {
        let candidates = self.query_nearest_with_distances(position, max_count, max_radius)?;
        let num_found = candidates.len();
        let max_dist_sq = candidates.worst_dist_sq().unwrap_or(0.0);
        for c in candidates {
            f(c.id, c.dist_sq, num_found, max_dist_sq);
        }
        Ok(())
    }

    fn find_nearest(&self, position: Vec3, candidates: &mut CandidateSet, node_idx: u32) {
        if node_idx == NONE {
            return;
        }
        let node = &self.nodes[node_idx as usize];
        let record = &self.records[node.point as usize];

        candidates.try_add(record.position.distance_squared(position), record.user_id);

        let delta = axis_value(position, node.axis as usize) - node.split;
        let plane_dist_sq = delta * delta;

        let (near, far) = if delta < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        self.find_nearest(position, candidates, near);
        if candidates.is_within_range(plane_dist_sq) {
            self.find_nearest(position, candidates, far);
        }
    }

    /// Number of points in the snapshot.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Points in insertion order.
    #[inline]
    pub fn points(&self) -> &[NeighborPoint] {
        &self.records
    }

    /// Bounding box of the indexed points; empty before `build`.
    #[inline]
    pub fn bounds(&self) -> BBox3f {
        self.bounds
    }

    /// Depth of the deepest leaf (0 for an empty tree).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: u32) -> usize {
            if idx == NONE {
                return 0;
            }
            let node = &nodes[idx as usize];
            1 + walk(nodes, node.left).max(walk(nodes, node.right))
        }
        walk(&self.nodes, self.root)
    }
}

/// Build the subtree for `indices` and return its arena slot.
///
/// `indices` and `nodes` cover the same sub-range; `offset` is its start in
/// the full arrays.
fn split(
    records: &[NeighborPoint],
    indices: &mut [u32],
    nodes: &mut [Node],
    offset: usize,
    axis: usize,
    parallel_threshold: usize,
) -> u32 {
    let count = indices.len();
    match count {
        0 => return NONE,
        1 => {
            let point = indices[0];
            nodes[0] = Node {
                axis: axis as u8,
                split: axis_value(records[point as usize].position, axis),
                point,
                left: NONE,
                right: NONE,
            };
            return offset as u32;
        }
        _ => {}
    }

    indices.sort_by(|&a, &b| {
        let va = axis_value(records[a as usize].position, axis);
        let vb = axis_value(records[b as usize].position, axis);
        va.total_cmp(&vb)
    });

    let median = count / 2;
    let point = indices[median];
    let split_value = axis_value(records[point as usize].position, axis);
    let next_axis = (axis + 1) % 3;

    let (left_indices, rest) = indices.split_at_mut(median);
    let right_indices = &mut rest[1..];
    let (left_nodes, rest_nodes) = nodes.split_at_mut(median);
    let (median_node, right_nodes) = rest_nodes.split_at_mut(1);

    let right_offset = offset + median + 1;
    let (left, right) = if count > parallel_threshold {
        rayon::join(
            || split(records, left_indices, left_nodes, offset, next_axis, parallel_threshold),
            || split(records, right_indices, right_nodes, right_offset, next_axis, parallel_threshold),
        )
    } else {
        (
            split(records, left_indices, left_nodes, offset, next_axis, parallel_threshold),
            split(records, right_indices, right_nodes, right_offset, next_axis, parallel_threshold),
        )
    };

    median_node[0] = Node {
        axis: axis as u8,
        split: split_value,
        point,
        left,
        right,
    };
    (offset + median) as u32
}

/// Linear-scan reference: ids of the `k` nearest points within `max_radius`.
///
/// Ties are ordered by insertion, matching [`CandidateSet`].
pub fn brute_force_nearest(points: &[NeighborPoint], position: Vec3, k: usize, max_radius: f32) -> Vec<u32> {
    let mut candidates = CandidateSet::new(k, max_radius);
    for p in points {
        candidates.try_add(p.position.distance_squared(position), p.user_id);
    }
    candidates.result()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_from(points: &[Vec3]) -> NearestNeighborTree {
        let mut tree = NearestNeighborTree::new();
        for (i, p) in points.iter().enumerate() {
            tree.add_point(*p, i as u32).unwrap();
        }
        tree.build().unwrap();
        tree
    }

    #[test]
    fn test_single_point_found() {
        let mut tree = NearestNeighborTree::new();
        tree.add_point(Vec3::new(14.0, 2.3, 1.9), 13).unwrap();
        tree.build().unwrap();

        let result = tree.query_nearest(Vec3::ZERO, 1, f32::MAX).unwrap();
        assert_eq!(result, vec![13]);
    }

    #[test]
    fn test_single_point_outside_radius() {
        let mut tree = NearestNeighborTree::new();
        tree.add_point(Vec3::new(14.0, 2.3, 1.9), 13).unwrap();
        tree.build().unwrap();

        assert!(tree.query_nearest(Vec3::ZERO, 1, 0.1).unwrap().is_empty());
    }

    #[test]
    fn test_two_points() {
        let mut tree = NearestNeighborTree::new();
        tree.add_point(Vec3::new(14.0, 2.3, 1.9), 13).unwrap();
        tree.add_point(Vec3::new(184.0, 2901.0, 231.0), 1).unwrap();
        tree.build().unwrap();

        assert_eq!(tree.query_nearest(Vec3::ZERO, 1, f32::MAX).unwrap(), vec![13]);
        assert_eq!(tree.query_nearest(Vec3::ZERO, 2, f32::MAX).unwrap(), vec![13, 1]);
        assert_eq!(tree.query_nearest(Vec3::ZERO, 2, 20.0).unwrap(), vec![13]);
    }

    #[test]
    fn test_clear_empties_tree() {
        let mut tree = tree_from(&[Vec3::ONE, Vec3::ZERO]);
        assert_eq!(tree.bounds().center(), Vec3::splat(0.5));
        tree.clear();
        assert!(!tree.is_built());
        assert!(tree.bounds().is_empty());
        tree.build().unwrap();
        assert!(tree.query_nearest(Vec3::ZERO, 2, f32::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let mut tree = NearestNeighborTree::new();
        tree.build().unwrap();
        assert_eq!(tree.depth(), 0);
        assert!(tree.query_nearest(Vec3::ONE, 5, f32::INFINITY).unwrap().is_empty());
    }

    #[test]
    fn test_misuse_is_reported() {
        let mut tree = NearestNeighborTree::new();
        assert!(matches!(tree.query_nearest(Vec3::ZERO, 1, 1.0), Err(Error::NotBuilt)));

        tree.add_point(Vec3::ZERO, 0).unwrap();
        tree.build().unwrap();
        assert!(matches!(tree.build(), Err(Error::AlreadyBuilt)));
        assert!(matches!(tree.add_point(Vec3::ONE, 1), Err(Error::AlreadyBuilt)));
        assert!(matches!(
            tree.query_nearest(Vec3::ZERO, 1, -1.0),
            Err(Error::InvalidRadius(_))
        ));
        assert!(matches!(
            tree.query_nearest(Vec3::ZERO, 1, f32::NAN),
            Err(Error::InvalidRadius(_))
        ));
    }

    #[test]
    fn test_zero_count_query() {
        let tree = tree_from(&[Vec3::ZERO]);
        assert!(tree.query_nearest(Vec3::ZERO, 0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_balanced_depth() {
        let points: Vec<Vec3> = (0..1023).map(|i| Vec3::new(i as f32, (i * 7 % 13) as f32, 0.0)).collect();
        let tree = tree_from(&points);
        assert_eq!(tree.depth(), 10);
    }

    #[test]
    fn test_parallel_and_serial_builds_agree() {
        let points: Vec<Vec3> = (0..5000)
            .map(|i| {
                let f = i as f32;
                Vec3::new((f * 0.37).sin() * 50.0, (f * 1.31).cos() * 50.0, (f * 0.071).sin() * 50.0)
            })
            .collect();

        let mut serial = NearestNeighborTree::with_parallel_threshold(usize::MAX);
        let mut parallel = NearestNeighborTree::with_parallel_threshold(16);
        for (i, p) in points.iter().enumerate() {
            serial.add_point(*p, i as u32).unwrap();
            parallel.add_point(*p, i as u32).unwrap();
        }
        serial.build().unwrap();
        parallel.build().unwrap();

        for q in [Vec3::ZERO, Vec3::splat(20.0), Vec3::new(-40.0, 10.0, 3.0)] {
            assert_eq!(
                serial.query_nearest(q, 8, f32::INFINITY).unwrap(),
                parallel.query_nearest(q, 8, f32::INFINITY).unwrap()
            );
        }
    }

    #[test]
    fn test_for_each_nearest_reports_counts() {
        let tree = tree_from(&[Vec3::X, Vec3::X * 2.0, Vec3::X * 3.0]);
        let mut seen = Vec::new();
        tree.for_each_nearest(Vec3::ZERO, 2, 10.0, |id, dist_sq, found, max_dist_sq| {
            assert_eq!(found, 2);
            assert_eq!(max_dist_sq, 4.0);
            seen.push((id, dist_sq));
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 1.0), (1, 4.0)]);
    }

    #[test]
    fn test_duplicate_positions() {
        let points = vec![Vec3::ONE; 40];
        let tree = tree_from(&points);
        let result = tree.query_nearest(Vec3::ONE, 40, 0.0).unwrap();
        assert_eq!(result.len(), 40);
    }
}
