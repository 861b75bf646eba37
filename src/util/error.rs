//! Error types for the photon mapping core.

use thiserror::Error;

/// Main error type for photon mapping operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Density estimation was configured without any light paths
    #[error("Number of light paths must be positive")]
    ZeroLightPaths,

    /// A container was configured with zero capacity
    #[error("Capacity of {0} must be positive")]
    ZeroCapacity(&'static str),

    /// Search or gather radius is negative, zero where not allowed, or NaN
    #[error("Invalid radius: {0}")]
    InvalidRadius(f32),

    /// Settings failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Spatial index queried before `build()`
    #[error("Spatial index has not been built")]
    NotBuilt,

    /// Spatial index modified or rebuilt after `build()` without `clear()`
    #[error("Spatial index is already built; call clear() first")]
    AlreadyBuilt,

    /// Path cache read before `prepare()`
    #[error("Light path cache has not been prepared")]
    CacheNotPrepared,

    /// `prepare()` called twice in one iteration
    #[error("Light path cache is already prepared")]
    CacheAlreadyPrepared,

    /// Path slot index out of bounds
    #[error("Path index {index} out of bounds (count: {count})")]
    PathOutOfBounds { index: usize, count: usize },

    /// Vertex index out of bounds for a path
    #[error("Vertex index {index} out of bounds for path {path} (length: {len})")]
    VertexOutOfBounds { path: usize, index: usize, len: usize },

    /// Render loop asked for a transition the state machine forbids
    #[error("Invalid render state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: crate::render::RenderState,
        to: crate::render::RenderState,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True for errors caused by bad settings rather than API misuse.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ZeroLightPaths | Self::ZeroCapacity(_) | Self::InvalidRadius(_) | Self::InvalidConfig(_)
        )
    }
}

/// Result type alias for photon mapping operations.
pub type Result<T> = std::result::Result<T, Error>;
