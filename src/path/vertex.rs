//! Path vertex types.

use crate::util::{Rgb, Vec3};

/// Opaque material handle, resolved by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialId(pub u32);

/// A point on a scene surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    /// Geometric normal, normalized.
    pub normal: Vec3,
    pub material: MaterialId,
}

impl SurfacePoint {
    pub fn new(position: Vec3, normal: Vec3, material: MaterialId) -> Self {
        Self {
            position,
            normal,
            material,
        }
    }
}

/// One bounce of a sampled light path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathVertex {
    pub point: SurfacePoint,

    /// Surface area pdf of sampling this vertex from its ancestor.
    pub pdf_from_ancestor: f32,

    /// Surface area pdf of sampling the ancestor's ancestor from the ancestor,
    /// i.e. the reverse density of the previous edge.
    pub pdf_reverse_ancestor: f32,

    /// Path throughput up to and including this vertex.
    pub weight: Rgb,

    /// Local index of the ancestor within the same path; `None` on the emitter.
    pub ancestor: Option<u32>,

    /// Number of edges between this vertex and the emitter.
    pub depth: u8,
}

impl PathVertex {
    /// Root vertex on an emitter.
    pub fn emitter(point: SurfacePoint, weight: Rgb) -> Self {
        Self {
            point,
            pdf_from_ancestor: 0.0,
            pdf_reverse_ancestor: 0.0,
            weight,
            ancestor: None,
            depth: 0,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.ancestor.is_none()
    }
}

/// Address of a vertex in a [`LightPathCache`](super::LightPathCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexRef {
    pub path: u32,
    pub vertex: u32,
}

impl VertexRef {
    pub const fn new(path: u32, vertex: u32) -> Self {
        Self { path, vertex }
    }
}
