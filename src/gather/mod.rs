//! Photon gathering (density estimation).
//!
//! - [`PhotonMap`] - spatial index over the stored light path vertices
//! - [`DensityEstimator`] - kernel-weighted radiance estimate at a shading point
//! - [`epanechnikov`] / [`gather_radius`] - kernel and radius heuristics

mod kernel;

pub use kernel::{epanechnikov, gather_radius};

use rayon::prelude::*;

use crate::path::{LightPathCache, SurfacePoint, VertexRef};
use crate::render::Scene;
use crate::spatial::{NearestNeighborTree, NeighborPoint};
use crate::util::{Error, Result, Rgb, Vec3};

/// Spatial index over one iteration's photons.
///
/// The index user id of a photon is its position in the photon list, which
/// maps back to the vertex in the light path cache.
#[derive(Debug)]
pub struct PhotonMap {
    tree: NearestNeighborTree,
    photons: Vec<VertexRef>,
}

impl PhotonMap {
    /// Index every non-emitter vertex with non-zero throughput.
    #[tracing::instrument(skip_all, fields(paths = cache.num_paths()))]
    pub fn build(cache: &LightPathCache, parallel_threshold: usize) -> Result<Self> {
        if !cache.is_prepared() {
            return Err(Error::CacheNotPrepared);
        }

        let found: Vec<(VertexRef, Vec3)> = (0..cache.num_paths())
            .into_par_iter()
            .flat_map_iter(|path| {
                cache
                    .path_vertices(path)
                    .into_iter()
                    .flatten()
                    .enumerate()
                    .filter(|(k, v)| *k >= 1 && v.depth >= 1 && v.weight != Rgb::ZERO)
                    .map(move |(k, v)| (VertexRef::new(path as u32, k as u32), v.point.position))
            })
            .collect();

        let mut tree = NearestNeighborTree::with_parallel_threshold(parallel_threshold);
        tree.extend(found.iter().enumerate().map(|(i, (_, position))| NeighborPoint {
            position: *position,
            user_id: i as u32,
        }))?;
        tree.build()?;

        let photons = found.into_iter().map(|(r, _)| r).collect();
        Ok(Self { tree, photons })
    }

    /// Number of indexed photons.
    #[inline]
    pub fn len(&self) -> usize {
        self.photons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    /// Cache address of the photon with index id `id`.
    #[inline]
    pub fn photon(&self, id: u32) -> Option<VertexRef> {
        self.photons.get(id as usize).copied()
    }

    #[inline]
    pub fn tree(&self) -> &NearestNeighborTree {
        &self.tree
    }
}

/// Point being shaded by a camera ray.
#[derive(Debug, Clone, Copy)]
pub struct ShadingPoint {
    pub point: SurfacePoint,
    /// Normalized direction towards the camera.
    pub out_dir: Vec3,
}

/// Kernel density estimator over a [`PhotonMap`].
#[derive(Debug, Clone, Copy)]
pub struct DensityEstimator {
    num_light_paths: usize,
    /// `None` gathers every photon within the radius.
    max_photons: Option<usize>,
}

impl DensityEstimator {
    /// `num_light_paths` normalizes every photon contribution and must be positive.
    ///
    /// A photon cap biases the estimate low wherever more photons than the cap
    /// fall inside the radius, since the kernel is still normalized over the
    /// whole disk.
    pub fn new(num_light_paths: usize, max_photons: Option<usize>) -> Result<Self> {
        if num_light_paths == 0 {
            return Err(Error::ZeroLightPaths);
        }
        if max_photons == Some(0) {
            return Err(Error::ZeroCapacity("photons per gather"));
        }
        Ok(Self {
            num_light_paths,
            max_photons,
        })
    }

    /// Radiance leaving `shading` estimated from photons within `radius`.
    ///
    /// Emission at the shading point is not included.
    pub fn estimate<S: Scene + ?Sized>(
        &self,
        map: &PhotonMap,
        cache: &LightPathCache,
        scene: &S,
        shading: &ShadingPoint,
        radius: f32,
    ) -> Result<Rgb> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidRadius(radius));
        }
        let radius_sq = radius * radius;
        let inv_paths = 1.0 / self.num_light_paths as f32;

        let max_count = self.max_photons.unwrap_or(usize::MAX);
        let candidates = map
            .tree
            .query_nearest_with_distances(shading.point.position, max_count, radius)?;

        let mut estimate = Rgb::ZERO;
        for c in candidates.entries() {
            let Some(r) = map.photon(c.id) else {
                continue;
            };
            let photon = cache.vertex(r)?;
            let Some(ancestor_idx) = photon.ancestor else {
                continue;
            };
            let ancestor = cache.get(r.path as usize, ancestor_idx as usize)?;

            let dir_to_ancestor = (ancestor.point.position - photon.point.position).normalize_or_zero();
            let bsdf = scene.evaluate_bsdf(&shading.point, shading.out_dir, dir_to_ancestor);

            estimate += photon.weight * bsdf * inv_paths * epanechnikov(c.dist_sq, radius_sq);
        }
        Ok(estimate)
    }

    #[inline]
    pub fn num_light_paths(&self) -> usize {
        self.num_light_paths
    }

    #[inline]
    pub fn max_photons(&self) -> Option<usize> {
        self.max_photons
    }
}
