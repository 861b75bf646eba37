//! Spatial search layer.
//!
//! - [`CandidateSet`] - bounded, sorted accumulator of nearest candidates
//! - [`NearestNeighborTree`] - median-split k-d tree with bounded k-NN queries

mod candidates;
mod kdtree;

pub use candidates::{Candidate, CandidateSet};
pub use kdtree::{brute_force_nearest, NearestNeighborTree, NeighborPoint, DEFAULT_PARALLEL_THRESHOLD};
