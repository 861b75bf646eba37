//! Light path storage.
//!
//! - [`PathVertex`] / [`SurfacePoint`] - one recorded bounce
//! - [`LightPathCache`] - concurrent per-slot append store, frozen by `prepare()`

mod cache;
mod vertex;

pub use cache::{Ancestors, CacheStats, LightPathCache};
pub use vertex::{MaterialId, PathVertex, SurfacePoint, VertexRef};
