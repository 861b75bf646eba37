//! Bounded, distance-sorted candidate list for k-nearest-neighbor queries.

use smallvec::SmallVec;

/// One retained neighbor: squared distance to the query and user id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub dist_sq: f32,
    pub id: u32,
}

/// At most `max_count` nearest points within `max_radius`, ascending by distance.
///
/// Ties keep insertion order: a new candidate is placed after every retained
/// candidate at the same distance, so once the set is full an equidistant
/// newcomer is dropped rather than evicting the first-seen one.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    entries: SmallVec<[Candidate; 16]>,
    max_count: usize,
    max_dist_sq: f32,
}

impl CandidateSet {
    /// Create an empty set. `max_radius` may be infinite.
    pub fn new(max_count: usize, max_radius: f32) -> Self {
        debug_assert!(max_radius >= 0.0, "radius must be non-negative");
        Self {
            entries: SmallVec::with_capacity(max_count.min(64)),
            max_count,
            max_dist_sq: max_radius * max_radius,
        }
    }

    /// Offer a candidate. Returns `true` if it was retained.
    ///
    /// NaN distances are never retained.
    pub fn try_add(&mut self, dist_sq: f32, id: u32) -> bool {
        if dist_sq.is_nan() || dist_sq > self.max_dist_sq || self.max_count == 0 {
            return false;
        }

        let pos = self.entries.partition_point(|c| c.dist_sq <= dist_sq);
        if pos >= self.max_count {
            return false;
        }

        self.entries.insert(pos, Candidate { dist_sq, id });
        self.entries.truncate(self.max_count);
        true
    }

    /// Could a point at `dist_sq` still enter the set?
    ///
    /// Traversal skips a subtree only when this is false for the distance to
    /// its splitting plane.
    #[inline]
    pub fn is_within_range(&self, dist_sq: f32) -> bool {
        let has_room = match self.entries.last() {
            _ if self.entries.len() < self.max_count => true,
            Some(worst) => dist_sq < worst.dist_sq,
            None => false,
        };
        has_room && dist_sq <= self.max_dist_sq
    }

    /// Retained ids in ascending distance order.
    pub fn result(&self) -> Vec<u32> {
        self.entries.iter().map(|c| c.id).collect()
    }

    /// Retained candidates in ascending distance order.
    #[inline]
    pub fn entries(&self) -> &[Candidate] {
        &self.entries
    }

    /// Squared distance of the farthest retained candidate.
    #[inline]
    pub fn worst_dist_sq(&self) -> Option<f32> {
        self.entries.last().map(|c| c.dist_sq)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_count
    }

    #[inline]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[inline]
    pub fn max_dist_sq(&self) -> f32 {
        self.max_dist_sq
    }
}

impl IntoIterator for CandidateSet {
    type Item = Candidate;
    type IntoIter = smallvec::IntoIter<[Candidate; 16]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
