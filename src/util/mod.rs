//! Utility types and functions shared by all layers.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam, [`Ray`], [`BBox3f`]
//! - [`Rng`] - hashed-seed PCG generator
//! - [`init_tracing`] - subscriber setup

mod error;
mod math;
mod rng;
mod trace;

pub use error::*;
pub use math::*;
pub use rng::{hash_seed, Rng};
pub use trace::{init_tracing, TraceGuard, LOG_ENV};
