//! Collaborator interfaces consumed by the render loop.
//!
//! Intersection, materials, emitters and cameras live outside this crate.
//! Every method may be called from many rayon workers at once.

use crate::path::SurfacePoint;
use crate::util::{Ray, Rgb, UVec2, Vec2, Vec3};

/// Closest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub point: SurfacePoint,
    /// Distance from the ray origin.
    pub distance: f32,
}

/// Sampled continuation of a path at a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Normalized sampled direction, pointing away from the surface.
    pub direction: Vec3,
    /// Solid angle density of `direction`.
    pub pdf: f32,
    /// Solid angle density of sampling the reverse direction.
    pub pdf_reverse: f32,
    /// BSDF times cosine over pdf.
    pub weight: Rgb,
}

/// Starting point of a light path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterSample {
    pub point: SurfacePoint,
    /// Normalized emission direction.
    pub direction: Vec3,
    /// Joint area and solid angle density of the sample.
    pub pdf: f32,
    /// Emitted radiance times cosine over pdf.
    pub weight: Rgb,
}

/// Geometry, materials and emitters of the rendered scene.
pub trait Scene: Sync {
    /// Closest hit along `ray`, if any.
    fn trace(&self, ray: &Ray) -> Option<Hit>;

    /// BSDF at `point` for light arriving from `in_dir` and leaving towards `out_dir`.
    fn evaluate_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, in_dir: Vec3) -> Rgb;

    /// Sample a direction at `point` for a path arriving from `out_dir`.
    fn sample_bsdf(&self, point: &SurfacePoint, out_dir: Vec3, u: Vec2) -> Option<BsdfSample>;

    /// Sample a position and direction on an emitter.
    fn sample_emitter(&self, u_pos: Vec2, u_dir: Vec2) -> Option<EmitterSample>;

    /// Radiance emitted from `point` towards `out_dir`.
    fn emitted_radiance(&self, _point: &SurfacePoint, _out_dir: Vec3) -> Rgb {
        Rgb::ZERO
    }

    /// Radiance arriving along a ray that leaves the scene.
    fn background_radiance(&self, _ray: &Ray) -> Rgb {
        Rgb::ZERO
    }

    /// Radius of the scene's bounding sphere.
    fn radius(&self) -> f32;
}

/// Primary ray generator.
pub trait Camera: Sync {
    /// Image size in pixels.
    fn resolution(&self) -> UVec2;

    /// Ray through the film position `film`, in pixel coordinates.
    fn generate_ray(&self, film: Vec2) -> Ray;
}

/// Additive pixel accumulator.
///
/// `splat` must tolerate concurrent calls, including calls for the same pixel.
pub trait SplatSink: Sync {
    fn splat(&self, x: u32, y: u32, color: Rgb);

    /// Called before the camera pass of every iteration.
    fn start_iteration(&mut self) {}

    /// Called after the camera pass of every iteration has joined.
    fn end_iteration(&mut self) {}
}
