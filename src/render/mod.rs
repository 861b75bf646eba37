//! Photon mapping render loop.
//!
//! - [`Scene`] / [`Camera`] / [`SplatSink`] - collaborator interfaces
//! - [`LightTracer`] - light path random walk into the path cache
//! - [`FrameBuffer`] - row-locked iteration-averaging accumulator
//! - [`RenderLoop`] - per-iteration state machine

mod film;
mod light_tracer;
mod render_loop;
mod scene;

pub use film::FrameBuffer;
pub use light_tracer::LightTracer;
pub use render_loop::{IterationStats, RenderLoop, RenderState, RenderStats};
pub use scene::{BsdfSample, Camera, EmitterSample, Hit, Scene, SplatSink};
