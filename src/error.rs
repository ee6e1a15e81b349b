//! Crate-wide error taxonomy (spec §7).

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Every failure mode the registration/assembly pipeline can produce.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("degenerate statistics: {0}")]
    DegenerateStats(String),

    #[error("insufficient evidence to fit a transform: {surviving} points survived, need at least {required}")]
    InsufficientEvidence { surviving: usize, required: usize },

    #[error("duplicate control point at target ({y}, {x})")]
    DuplicatePoint { y: f64, x: f64 },

    #[error("point is out of the transform's domain and extrapolation was disabled")]
    OutOfDomain,

    #[error("composite produced out-of-bounds coordinates, transform is likely broken")]
    CompositeOutOfBounds,

    #[error("transform literal contained a sentinel/NaN/infinite value: {0}")]
    InvalidTransformLiteral(String),

    #[error("failed to parse {kind}: {reason}")]
    Parse { kind: &'static str, reason: String },
}

impl RegistrationError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        RegistrationError::Io { path: path.into(), source }
    }
}
