//! Iteration driver for the photon mapper.

use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::light_tracer::LightTracer;
use super::scene::{Camera, Scene, SplatSink};
use crate::config::RenderSettings;
use crate::gather::{gather_radius, DensityEstimator, PhotonMap, ShadingPoint};
use crate::path::{CacheStats, LightPathCache};
use crate::util::{Error, Ray, Result, Rgb, Rng, Vec2};

/// Phase of the current iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderState {
    #[default]
    Idle,
    TracingLightPaths,
    IndexBuilt,
    TracingCameraPaths,
    IterationComplete,
}

impl RenderState {
    /// The only state reachable from `self`.
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::TracingLightPaths,
            Self::TracingLightPaths => Self::IndexBuilt,
            Self::IndexBuilt => Self::TracingCameraPaths,
            Self::TracingCameraPaths => Self::IterationComplete,
            Self::IterationComplete => Self::Idle,
        }
    }

    #[inline]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == to
    }
}

/// Counters and timings of one iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationStats {
    pub iteration: u32,
    pub cache: CacheStats,
    /// Photons indexed for gathering.
    pub num_photons: usize,
    pub light_time: Duration,
    pub build_time: Duration,
    pub camera_time: Duration,
}

/// Summary returned by [`RenderLoop::render`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub iterations: Vec<IterationStats>,
    pub total_time: Duration,
}

impl RenderStats {
    /// Sum of dropped vertex writes over all iterations.
    pub fn dropped_vertices(&self) -> usize {
        self.iterations.iter().map(|it| it.cache.dropped_vertices).sum()
    }
}

/// Drives light tracing, index building and camera gathering per iteration.
///
/// The phase methods may be called directly; each checks that it follows the
/// previous phase and fails with [`Error::InvalidTransition`] otherwise.
#[derive(Debug)]
pub struct RenderLoop {
    settings: RenderSettings,
    state: RenderState,
    cache: Option<LightPathCache>,
    photon_map: Option<PhotonMap>,
    current: IterationStats,
}

impl RenderLoop {
    pub fn new(settings: RenderSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: RenderState::Idle,
            cache: None,
            photon_map: None,
            current: IterationStats::default(),
        })
    }

    /// Render all configured iterations into `sink`.
    ///
    /// On error the loop is reset to [`RenderState::Idle`].
    #[tracing::instrument(skip_all, fields(iterations = self.settings.num_iterations))]
    pub fn render<S, C, F>(&mut self, scene: &S, camera: &C, sink: &mut F) -> Result<RenderStats>
    where
        S: Scene + ?Sized,
        C: Camera + ?Sized,
        F: SplatSink + ?Sized,
    {
        let start = Instant::now();
        let result = self.render_iterations(scene, camera, sink);
        if result.is_err() {
            self.reset();
        }
        let iterations = result?;

        let stats = RenderStats {
            iterations,
            total_time: start.elapsed(),
        };
        tracing::info!(
            iterations = stats.iterations.len(),
            dropped = stats.dropped_vertices(),
            elapsed_ms = stats.total_time.as_millis() as u64,
            "render finished"
        );
        Ok(stats)
    }

    fn render_iterations<S, C, F>(&mut self, scene: &S, camera: &C, sink: &mut F) -> Result<Vec<IterationStats>>
    where
        S: Scene + ?Sized,
        C: Camera + ?Sized,
        F: SplatSink + ?Sized,
    {
        let num_paths = self.num_light_paths(camera);
        let mut iterations = Vec::with_capacity(self.settings.num_iterations as usize);
        for iteration in 0..self.settings.num_iterations {
            self.trace_light_paths(scene, num_paths, iteration)?;
            self.build_index()?;
            sink.start_iteration();
            self.trace_camera_paths(scene, camera, &*sink, iteration)?;
            sink.end_iteration();
            let stats = self.finish_iteration()?;
            tracing::info!(
                iteration,
                photons = stats.num_photons,
                light_ms = stats.light_time.as_millis() as u64,
                camera_ms = stats.camera_time.as_millis() as u64,
                "iteration complete"
            );
            iterations.push(stats);
        }
        Ok(iterations)
    }

    /// Clear the cache and trace `num_paths` light paths into it.
    pub fn trace_light_paths<S: Scene + ?Sized>(
        &mut self,
        scene: &S,
        num_paths: usize,
        iteration: u32,
    ) -> Result<CacheStats> {
        if num_paths == 0 {
            return Err(Error::ZeroLightPaths);
        }
        check_scene_radius(scene)?;
        self.transition(RenderState::TracingLightPaths)?;
        let start = Instant::now();
        self.photon_map = None;
        self.current = IterationStats {
            iteration,
            ..Default::default()
        };

        let cache = match &mut self.cache {
            Some(cache) if cache.num_paths() == num_paths => {
                cache.clear();
                cache
            }
            slot => slot.insert(LightPathCache::new(num_paths, self.settings.max_depth)?),
        };

        LightTracer::new(self.settings.base_seed_light, self.settings.max_depth).trace_all(scene, cache, iteration);
        let stats = cache.prepare()?;

        self.current.cache = stats;
        self.current.light_time = start.elapsed();
        tracing::debug!(vertices = stats.num_vertices, "light paths traced");
        Ok(stats)
    }

    /// Build the photon map over the prepared cache. Returns the photon count.
    pub fn build_index(&mut self) -> Result<usize> {
        self.transition(RenderState::IndexBuilt)?;
        let start = Instant::now();
        let cache = self.cache.as_ref().ok_or(Error::CacheNotPrepared)?;
        let map = PhotonMap::build(cache, self.settings.build_parallel_threshold)?;
        let num_photons = map.len();
        self.photon_map = Some(map);

        self.current.num_photons = num_photons;
        self.current.build_time = start.elapsed();
        tracing::debug!(photons = num_photons, "photon map built");
        Ok(num_photons)
    }

    /// Gather radiance for every pixel and splat it into `sink`.
    pub fn trace_camera_paths<S, C, F>(&mut self, scene: &S, camera: &C, sink: &F, iteration: u32) -> Result<()>
    where
        S: Scene + ?Sized,
        C: Camera + ?Sized,
        F: SplatSink + ?Sized,
    {
        check_scene_radius(scene)?;
        self.transition(RenderState::TracingCameraPaths)?;
        let start = Instant::now();
        {
            let cache = self.cache.as_ref().ok_or(Error::CacheNotPrepared)?;
            let map = self.photon_map.as_ref().ok_or(Error::NotBuilt)?;
            let estimator = DensityEstimator::new(cache.num_paths(), self.settings.max_photons)?;
            let pass = CameraPass {
                settings: &self.settings,
                estimator,
                map,
                cache,
                scene,
                iteration,
            };

            let resolution = camera.resolution();
            (0..resolution.y).into_par_iter().try_for_each(|y| {
                for x in 0..resolution.x {
                    let pixel = pixel_index(x, y, resolution.x);
                    let mut rng = Rng::from_chain(pass.settings.base_seed_camera, pixel, pass.iteration);
                    let film = Vec2::new(x as f32, y as f32) + rng.next_float_2d();
                    let value = pass.estimate_pixel(&camera.generate_ray(film))?;
                    sink.splat(x, y, value);
                }
                Ok::<(), Error>(())
            })?;
        }
        self.current.camera_time = start.elapsed();
        self.transition(RenderState::IterationComplete)
    }

    /// Close the iteration and return its statistics.
    pub fn finish_iteration(&mut self) -> Result<IterationStats> {
        self.transition(RenderState::Idle)?;
        Ok(std::mem::take(&mut self.current))
    }

    /// Abandon the running iteration.
    pub fn reset(&mut self) {
        self.state = RenderState::Idle;
        self.photon_map = None;
        self.current = IterationStats::default();
    }

    /// Light paths per iteration for `camera`.
    pub fn num_light_paths<C: Camera + ?Sized>(&self, camera: &C) -> usize {
        self.settings.num_light_paths.unwrap_or_else(|| {
            let r = camera.resolution();
            r.x as usize * r.y as usize
        })
    }

    #[inline]
    pub fn state(&self) -> RenderState {
        self.state
    }

    #[inline]
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Light paths of the running iteration.
    pub fn cache(&self) -> Option<&LightPathCache> {
        self.cache.as_ref()
    }

    /// Photon map of the running iteration.
    pub fn photon_map(&self) -> Option<&PhotonMap> {
        self.photon_map.as_ref()
    }

    fn transition(&mut self, to: RenderState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition { from: self.state, to });
        }
        tracing::trace!(from = ?self.state, to = ?to, "render state");
        self.state = to;
        Ok(())
    }
}

/// Gathers derive their radius from the scene radius, so it must be positive.
fn check_scene_radius<S: Scene + ?Sized>(scene: &S) -> Result<()> {
    let radius = scene.radius();
    if !radius.is_finite() || radius <= 0.0 {
        tracing::error!(radius, "scene radius must be positive and finite");
        return Err(Error::InvalidRadius(radius));
    }
    Ok(())
}

/// Row-major pixel index used to seed camera samples.
///
/// Computed in 64 bits and truncated, so images above 2^32 pixels wrap
/// around instead of overflowing.
#[inline]
fn pixel_index(x: u32, y: u32, width: u32) -> u32 {
    (y as u64 * width as u64 + x as u64) as u32
}

/// Read-only state shared by the camera pass workers.
struct CameraPass<'a, S: ?Sized> {
    settings: &'a RenderSettings,
    estimator: DensityEstimator,
    map: &'a PhotonMap,
    cache: &'a LightPathCache,
    scene: &'a S,
    iteration: u32,
}

impl<S: Scene + ?Sized> CameraPass<'_, S> {
    /// Emission plus photon gather at the primary hit; background on a miss.
    fn estimate_pixel(&self, ray: &Ray) -> Result<Rgb> {
        let Some(hit) = self.scene.trace(ray) else {
            return Ok(self.scene.background_radiance(ray));
        };
        let out_dir = -ray.direction;
        let mut value = self.scene.emitted_radiance(&hit.point, out_dir);

        let radius = gather_radius(
            self.scene.radius(),
            self.settings.radius_scale,
            hit.distance,
            self.settings.footprint_angle_deg,
        );
        // Hits at the ray origin have no footprint and get no indirect light
        if hit.distance != 0.0 {
            let shading = ShadingPoint {
                point: hit.point,
                out_dir,
            };
            value += self.estimator.estimate(self.map, self.cache, self.scene, &shading, radius)?;
        }
        Ok(value)
    }
}
