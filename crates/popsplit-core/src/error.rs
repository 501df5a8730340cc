//! Unified error types for the popsplit workspace
//!
//! [`PopsplitError`] covers every failure the pipeline can surface. Search
//! non-convergence is deliberately absent: a search that runs out of
//! iterations still returns a usable result with `converged = false`.
//!
//! # Example
//!
//! ```ignore
//! use popsplit_core::{PopsplitError, PopsplitResult};
//!
//! fn check_lambda(lambda: f64) -> PopsplitResult<()> {
//!     if !(0.0..1.0).contains(&lambda) {
//!         return Err(PopsplitError::Configuration(format!("lambda {lambda} outside [0, 1)")));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all popsplit operations.
#[derive(Error, Debug)]
pub enum PopsplitError {
    /// Invalid parameters or pipeline-wide misconfiguration (never retried).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The max-flow capability returned an internally inconsistent result.
    #[error("Solver error at lambda={lambda}, mu={mu}: {message}")]
    Solver {
        lambda: f64,
        mu: f64,
        message: String,
    },

    /// Dissolve/simplify produced an empty or invalid geometry.
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Malformed input data
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using PopsplitError.
pub type PopsplitResult<T> = Result<T, PopsplitError>;

impl PopsplitError {
    pub fn solver(lambda: f64, mu: f64, message: impl Into<String>) -> Self {
        PopsplitError::Solver {
            lambda,
            mu,
            message: message.into(),
        }
    }

    /// True for errors that invalidate the whole pipeline rather than one λ.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PopsplitError::Configuration(_))
    }
}

impl From<serde_json::Error> for PopsplitError {
    fn from(err: serde_json::Error) -> Self {
        PopsplitError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for PopsplitError {
    fn from(err: toml::de::Error) -> Self {
        PopsplitError::Parse(err.to_string())
    }
}
