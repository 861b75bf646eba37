//! # Photonmap
//!
//! Spatial search and path storage core of a photon mapping renderer.
//!
//! Light paths are traced into a concurrent [`LightPathCache`](path::LightPathCache),
//! their vertices are indexed by a median-split k-d tree and camera hits gather
//! nearby photons with an Epanechnikov kernel. Scene intersection, materials,
//! emitters, cameras and image output are supplied by the caller through the
//! traits in [`render`].
//!
//! ## Modules
//!
//! - [`util`] - Errors, math types, seeded RNG, tracing setup
//! - [`spatial`] - Candidate set and k-d tree
//! - [`path`] - Path vertices and the light path cache
//! - [`gather`] - Photon map and density estimation
//! - [`render`] - Collaborator traits, light tracer, frame buffer, render loop
//! - [`config`] - Render settings
//!
//! ## Example
//!
//! ```ignore
//! use photonmap::prelude::*;
//!
//! let mut film = FrameBuffer::new(640, 480);
//! let mut renderer = RenderLoop::new(RenderSettings::default())?;
//! let stats = renderer.render(&scene, &camera, &mut film)?;
//! ```

pub mod util;
pub mod spatial;
pub mod path;
pub mod gather;
pub mod render;
pub mod config;

// Re-export commonly used types
pub use util::{Error, Result};
pub use config::RenderSettings;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::RenderSettings;
    pub use crate::gather::{DensityEstimator, PhotonMap, ShadingPoint};
    pub use crate::path::{LightPathCache, MaterialId, PathVertex, SurfacePoint};
    pub use crate::render::{Camera, FrameBuffer, RenderLoop, RenderStats, Scene, SplatSink};
    pub use crate::spatial::{CandidateSet, NearestNeighborTree};
    pub use crate::util::{Error, Result, Rgb};
}
