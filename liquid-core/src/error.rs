//! Error types for the liquid core.
//!
//! Nothing in here ever aborts a frame: phase tasks report these errors, the
//! pipeline logs them and drops the affected contribution.

use thiserror::Error;

use crate::types::{FixtureId, ParticleId};

/// Result type alias for liquid operations.
pub type Result<T> = std::result::Result<T, LiquidError>;

/// Main error type for the liquid core.
#[derive(Error, Debug)]
pub enum LiquidError {
    /// A polygon edge starting at `vertex` has zero length, so its normal is undefined.
    #[error("degenerate polygon edge at vertex {vertex}")]
    DegenerateEdge { vertex: usize },

    /// A particle sits exactly on a circle's center; there is no push-out direction.
    #[error("particle coincides with circle center")]
    DegenerateContact,

    /// Polygon has more vertices than the collision scratch can hold.
    #[error("polygon has {count} vertices, at most {max} are supported")]
    TooManyVertices { count: usize, max: usize },

    /// Polygon has fewer than three vertices.
    #[error("polygon needs at least 3 vertices, got {count}")]
    TooFewVertices { count: usize },

    /// A per-particle task produced a NaN or infinite value.
    #[error("non-finite result for particle {particle}")]
    NonFinite { particle: ParticleId },

    /// A collision candidate no longer resolves to a fixture.
    #[error("unknown fixture {fixture}")]
    UnknownFixture { fixture: FixtureId },

    /// Configuration values out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl LiquidError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
