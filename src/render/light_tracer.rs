//! Light path random walk.

use rayon::prelude::*;

use super::scene::Scene;
use crate::path::{LightPathCache, PathVertex};
use crate::util::{solid_angle_to_area, Ray, Rgb, Rng};

/// Bounce count after which Russian roulette starts.
const ROULETTE_START_DEPTH: usize = 4;

/// Traces one light path per cache slot and records every bounce.
#[derive(Debug, Clone, Copy)]
pub struct LightTracer {
    pub base_seed: u32,
    /// Maximum number of vertices per path, emitter included.
    pub max_depth: usize,
}

impl LightTracer {
    pub fn new(base_seed: u32, max_depth: usize) -> Self {
        Self { base_seed, max_depth }
    }

    /// Fill every slot of `cache` with a path for `iteration`.
    ///
    /// The cache must be cleared and not yet prepared.
    #[tracing::instrument(skip_all, fields(paths = cache.num_paths(), iteration = iteration))]
    pub fn trace_all<S: Scene + ?Sized>(&self, scene: &S, cache: &LightPathCache, iteration: u32) {
        (0..cache.num_paths())
            .into_par_iter()
            .for_each(|path| self.trace_path(scene, cache, path, iteration));
    }

    /// Random walk from an emitter; stops on a miss, a zero density, a black
    /// throughput, a full slot or the maximum depth.
    pub fn trace_path<S: Scene + ?Sized>(&self, scene: &S, cache: &LightPathCache, path: usize, iteration: u32) {
        let mut rng = Rng::from_chain(self.base_seed, path as u32, iteration);

        let u_pos = rng.next_float_2d();
        let u_dir = rng.next_float_2d();
        let Some(emitter) = scene.sample_emitter(u_pos, u_dir) else {
            return;
        };
        if emitter.pdf <= 0.0 || emitter.weight == Rgb::ZERO {
            return;
        }
        let Some(mut last) = cache.add_vertex(path, PathVertex::emitter(emitter.point, emitter.weight)) else {
            return;
        };

        let mut ray = Ray::spawn(emitter.point.position, emitter.point.normal, emitter.direction);
        let mut previous = emitter.point;
        let mut pdf_direction = emitter.pdf;
        let mut pdf_reverse = 0.0;
        let mut weight = emitter.weight;
        let mut approx_throughput = Rgb::ONE;
        let mut depth = 1;

        while depth < self.max_depth {
            let Some(hit) = scene.trace(&ray) else {
                break;
            };

            let pdf_from_ancestor =
                pdf_direction * solid_angle_to_area(previous.position, hit.point.position, hit.point.normal);
            if pdf_from_ancestor == 0.0 {
                break;
            }

            let vertex = PathVertex {
                point: hit.point,
                pdf_from_ancestor,
                pdf_reverse_ancestor: pdf_reverse,
                weight,
                ancestor: Some(last),
                depth: depth as u8,
            };
            let Some(id) = cache.add_vertex(path, vertex) else {
                break;
            };
            last = id;

            if depth + 1 >= self.max_depth {
                break;
            }

            let survival = if depth > ROULETTE_START_DEPTH {
                (approx_throughput.element_sum() / 3.0).clamp(0.05, 0.95)
            } else {
                1.0
            };
            if rng.next_float() > survival {
                break;
            }

            let out_dir = -ray.direction;
            let Some(sample) = scene.sample_bsdf(&hit.point, out_dir, rng.next_float_2d()) else {
                break;
            };
            if sample.pdf <= 0.0 || sample.weight == Rgb::ZERO {
                break;
            }

            approx_throughput *= sample.weight / survival;
            weight *= sample.weight / survival;
            pdf_reverse =
                sample.pdf_reverse * solid_angle_to_area(hit.point.position, previous.position, previous.normal);
            pdf_direction = sample.pdf;
            previous = hit.point;
            ray = Ray::spawn(hit.point.position, hit.point.normal, sample.direction);
            depth += 1;
        }
    }
}
