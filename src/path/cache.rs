//! Concurrent append-only store of light path vertices.
//!
//! Each path slot owns `max_depth` pre-allocated cells and an atomic
//! counter. Writers claim the next local index with a compare-and-swap that
//! saturates at `max_depth` and then fill exactly that cell, so writers on
//! different slots never contend and no cell is ever written twice. Writes to
//! a full slot are only counted. `prepare()` freezes the cache for reading.

use std::ops::Index;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::OnceLock;

use rayon::prelude::*;

use super::vertex::{PathVertex, VertexRef};
use crate::util::{Error, Result};

/// Summary of one population phase, produced by [`LightPathCache::prepare`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub num_paths: usize,
    /// Vertices stored across all slots.
    pub num_vertices: usize,
    /// Longest stored path.
    pub max_path_len: usize,
    /// Writes dropped because their slot was full.
    pub dropped_vertices: usize,
    /// Slots that dropped at least one write.
    pub overflowed_paths: usize,
}

/// Fixed-capacity table of path vertices addressed by `(path, local index)`.
pub struct LightPathCache {
    cells: Box<[OnceLock<PathVertex>]>,
    counters: Box<[AtomicU32]>,
    /// Writes rejected per slot because it was full.
    dropped: Box<[AtomicUsize]>,
    lengths: Vec<u32>,
    max_depth: usize,
    prepared: bool,
}

impl LightPathCache {
    /// Allocate `num_paths` slots holding up to `max_depth` vertices each.
    pub fn new(num_paths: usize, max_depth: usize) -> Result<Self> {
        if num_paths == 0 {
            return Err(Error::ZeroCapacity("light path cache slots"));
        }
        if max_depth == 0 {
            return Err(Error::ZeroCapacity("light path depth"));
        }
        let capacity = num_paths
            .checked_mul(max_depth)
            .filter(|&c| c < u32::MAX as usize)
            .ok_or_else(|| Error::config(format!("path cache of {num_paths} x {max_depth} vertices is too large")))?;

        Ok(Self {
            cells: (0..capacity).map(|_| OnceLock::new()).collect(),
            counters: (0..num_paths).map(|_| AtomicU32::new(0)).collect(),
            dropped: (0..num_paths).map(|_| AtomicUsize::new(0)).collect(),
            lengths: vec![0; num_paths],
            max_depth,
            prepared: false,
        })
    }

    /// Append a vertex to `path` and return its local index.
    ///
    /// `None` means the slot is full (or does not exist) and the write was
    /// dropped; the walk producing this path should terminate.
    pub fn add_vertex(&self, path: usize, vertex: PathVertex) -> Option<u32> {
        debug_assert!(!self.prepared, "add_vertex after prepare");
        debug_assert!(path < self.counters.len(), "path slot {path} out of range");
        if self.prepared {
            return None;
        }

        let counter = self.counters.get(path)?;
        let max_depth = self.max_depth;
        let claimed = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            ((n as usize) < max_depth).then_some(n + 1)
        });
        let Ok(local) = claimed else {
            self.dropped[path].fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let stored = self.cells[path * self.max_depth + local as usize].set(vertex);
        debug_assert!(stored.is_ok(), "cell ({path}, {local}) written twice");
        Some(local)
    }

    /// Freeze the cache for reading. Must be called once per population phase.
    pub fn prepare(&mut self) -> Result<CacheStats> {
        if self.prepared {
            return Err(Error::CacheAlreadyPrepared);
        }

        let mut stats = CacheStats {
            num_paths: self.counters.len(),
            ..Default::default()
        };
        let slots = self.counters.iter().zip(self.dropped.iter());
        for (len, (counter, dropped)) in self.lengths.iter_mut().zip(slots) {
            let stored = (counter.load(Ordering::Relaxed) as usize).min(self.max_depth);
            *len = stored as u32;
            stats.num_vertices += stored;
            stats.max_path_len = stats.max_path_len.max(stored);
            let dropped = dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                stats.dropped_vertices += dropped;
                stats.overflowed_paths += 1;
            }
        }

        if stats.dropped_vertices > 0 {
            tracing::warn!(
                dropped = stats.dropped_vertices,
                paths = stats.overflowed_paths,
                max_depth = self.max_depth,
                "light path cache overflow, vertices beyond max depth were dropped"
            );
        }
        tracing::debug!(vertices = stats.num_vertices, "light path cache prepared");

        self.prepared = true;
        Ok(stats)
    }

    /// Reset all slots for the next iteration.
    pub fn clear(&mut self) {
        let max_depth = self.max_depth;
        self.cells
            .par_chunks_mut(max_depth)
            .zip(self.counters.par_iter_mut())
            .for_each(|(cells, counter)| {
                let used = (*counter.get_mut() as usize).min(max_depth);
                for cell in &mut cells[..used] {
                    cell.take();
                }
                *counter.get_mut() = 0;
            });
        self.dropped.iter_mut().for_each(|d| *d.get_mut() = 0);
        self.lengths.iter_mut().for_each(|l| *l = 0);
        self.prepared = false;
    }

    /// Vertex `vertex` of path `path`. Only valid after `prepare`.
    pub fn get(&self, path: usize, vertex: usize) -> Result<&PathVertex> {
        let len = self.path_len(path)?;
        if vertex >= len {
            return Err(Error::VertexOutOfBounds {
                path,
                index: vertex,
                len,
            });
        }
        self.cells[path * self.max_depth + vertex]
            .get()
            .ok_or(Error::VertexOutOfBounds {
                path,
                index: vertex,
                len,
            })
    }

    /// Vertex addressed by a [`VertexRef`].
    #[inline]
    pub fn vertex(&self, r: VertexRef) -> Result<&PathVertex> {
        self.get(r.path as usize, r.vertex as usize)
    }

    /// Number of vertices stored for `path`. Only valid after `prepare`.
    pub fn path_len(&self, path: usize) -> Result<usize> {
        if !self.prepared {
            return Err(Error::CacheNotPrepared);
        }
        self.lengths
            .get(path)
            .map(|&l| l as usize)
            .ok_or(Error::PathOutOfBounds {
                index: path,
                count: self.lengths.len(),
            })
    }

    /// Vertices of `path` in depth order.
    pub fn path_vertices(&self, path: usize) -> Result<impl Iterator<Item = &PathVertex> + '_> {
        let len = self.path_len(path)?;
        let start = path * self.max_depth;
        Ok(self.cells[start..start + len].iter().filter_map(OnceLock::get))
    }

    /// Walk from `vertex` back to the emitter along ancestor links.
    ///
    /// Yields `(local index, vertex)` pairs, starting with `vertex` itself.
    pub fn ancestors(&self, path: usize, vertex: usize) -> Result<Ancestors<'_>> {
        self.get(path, vertex)?;
        Ok(Ancestors {
            cache: self,
            path,
            next: Some(vertex as u32),
        })
    }

    /// Total number of stored vertices. Only meaningful after `prepare`.
    pub fn num_vertices(&self) -> usize {
        self.lengths.iter().map(|&l| l as usize).sum()
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.counters.len()
    }

    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[inline]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }
}

impl Index<(usize, usize)> for LightPathCache {
    type Output = PathVertex;

    fn index(&self, (path, vertex): (usize, usize)) -> &PathVertex {
        match self.get(path, vertex) {
            Ok(v) => v,
            Err(e) => panic!("invalid path cache access: {e}"),
        }
    }
}

impl std::fmt::Debug for LightPathCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightPathCache")
            .field("num_paths", &self.num_paths())
            .field("max_depth", &self.max_depth)
            .field("prepared", &self.prepared)
            .finish()
    }
}

/// Iterator over a vertex and its ancestors, see [`LightPathCache::ancestors`].
pub struct Ancestors<'a> {
    cache: &'a LightPathCache,
    path: usize,
    next: Option<u32>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = (u32, &'a PathVertex);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let vertex = self.cache.get(self.path, idx as usize).ok()?;
        // Links always point to a smaller local index; anything else ends the walk.
        self.next = vertex.ancestor.filter(|&a| a < idx);
        Some((idx, vertex))
    }
}
