//! Math type re-exports and renderer-specific math utilities.
//!
//! This module re-exports types from `glam` and provides the small
//! amount of geometry the photon mapper needs on top of it.

// Re-export glam types
pub use glam::{Vec2, Vec3, Vec3A, Mat3, UVec2};

use std::f32::consts::PI;
use std::fmt;

/// Linear RGB color. Components are unbounded radiance / throughput values.
pub type Rgb = Vec3;

/// Offset applied to spawned rays to avoid self-intersection.
pub const RAY_EPSILON: f32 = 1e-4;

/// Ray with normalized direction and a parametric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub min_distance: f32,
}

impl Ray {
    /// Create a ray; the direction is normalized.
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            min_distance: 0.0,
        }
    }

    /// Spawn a ray leaving a surface, offset along the normal towards `direction`.
    #[inline]
    pub fn spawn(position: Vec3, normal: Vec3, direction: Vec3) -> Self {
        let offset = if normal.dot(direction) < 0.0 { -normal } else { normal };
        Self::new(position + offset * RAY_EPSILON, direction)
    }

    /// Point at parameter `t`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// 3D bounding box with single precision.
#[derive(Clone, Copy, PartialEq)]
pub struct BBox3f {
    pub min: Vec3,
    pub max: Vec3,
}

impl BBox3f {
    /// Empty bounding box (inverted, will expand on first point).
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new bounding box from min and max points.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Check if this box is empty (has no volume).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    #[inline]
    pub fn expand_by_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Get the center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the bounding sphere around the center.
    #[inline]
    pub fn radius(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            (self.max - self.min).length() * 0.5
        }
    }
}

impl Default for BBox3f {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for BBox3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BBox3f({:?} - {:?})", self.min, self.max)
    }
}

/// Component of `v` along `axis` (0=x, 1=y, 2=z), wrapping modulo 3.
#[inline]
pub fn axis_value(v: Vec3, axis: usize) -> f32 {
    match axis % 3 {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// Jacobian converting a solid angle density at `from` into a surface area density at `to`.
///
/// `to_normal` is the surface normal at the destination.
#[inline]
pub fn solid_angle_to_area(from: Vec3, to: Vec3, to_normal: Vec3) -> f32 {
    let d = to - from;
    let dist_sq = d.length_squared();
    if dist_sq == 0.0 {
        return 0.0;
    }
    let cos = to_normal.dot(d / dist_sq.sqrt()).abs();
    cos / dist_sq
}

/// Build an orthonormal frame around `n` (Duff et al. 2017).
pub fn orthonormal_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = 1.0f32.copysign(n.z);
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    (
        Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vec3::new(b, sign + n.y * n.y * a, -n.y),
    )
}

/// Map a uniform sample to a cosine-weighted direction around `normal`.
///
/// Returns the direction and its solid angle density.
pub fn sample_cosine_hemisphere(normal: Vec3, u: Vec2) -> (Vec3, f32) {
    let r = u.x.sqrt();
    let phi = 2.0 * PI * u.y;
    let z = (1.0 - u.x).max(0.0).sqrt();
    let (t, b) = orthonormal_basis(normal);
    let dir = (t * (r * phi.cos()) + b * (r * phi.sin()) + normal * z).normalize_or_zero();
    (dir, z / PI)
}
