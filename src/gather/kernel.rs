//! Density estimation kernels and radius selection.

use std::f32::consts::PI;

/// Normalized 2D Epanechnikov kernel `2 (r² - d²) / (π r⁴)`.
///
/// Integrates to one over the disk of radius `r` and vanishes at its border.
/// Returns zero outside the disk.
#[inline]
pub fn epanechnikov(dist_sq: f32, radius_sq: f32) -> f32 {
    if dist_sq >= radius_sq || radius_sq <= 0.0 {
        return 0.0;
    }
    2.0 * (radius_sq - dist_sq) / (PI * radius_sq * radius_sq)
}

/// Gather radius for a camera hit at `hit_distance`.
///
/// A fixed fraction of the scene radius, shrunk to the pixel footprint
/// subtended by `footprint_angle_deg` for nearby hits.
pub fn gather_radius(scene_radius: f32, radius_scale: f32, hit_distance: f32, footprint_angle_deg: f32) -> f32 {
    let radius = scene_radius * radius_scale;
    let footprint = hit_distance * footprint_angle_deg.to_radians().tan();
    radius.min(footprint)
}
