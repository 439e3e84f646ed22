//! Error types for structlearn.

use thiserror::Error;

/// Structlearn error types.
///
/// Everything except `Io` signals a programming or data-corruption
/// problem. Callers should abort the run rather than retry.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying stream failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or truncated binary weight stream
    #[error("Malformed weight stream: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON parsing error (configs, lexicons)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scores, parts, gold outputs or label lists of different lengths
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A key appears twice in persisted weights or lexicon data
    #[error("Duplicate key in persisted data: {0}")]
    DuplicateKey(String),

    /// Part layout that violates the decoder's expectations
    #[error("Invalid parts: {0}")]
    InvalidParts(String),

    /// Finalize was called a second time
    #[error("Parameters were already finalized")]
    AlreadyFinalized,

    /// Finalize needs at least one update iteration
    #[error("Invalid iteration count for averaging: {0}")]
    InvalidIterationCount(usize),

    /// Cost-augmented decoding produced a loss below zero
    #[error("Negative cost-augmented loss: {loss}")]
    NegativeLoss { loss: f64 },

    /// Marginal decoding produced an entropy below zero
    #[error("Negative entropy: {entropy}")]
    NegativeEntropy { entropy: f64 },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand used by length checks.
    pub(crate) fn check_len(expected: usize, got: usize) -> Result<()> {
        if expected != got {
            return Err(Error::DimensionMismatch { expected, got });
        }
        Ok(())
    }
}

/// Result type alias for structlearn operations.
pub type Result<T> = std::result::Result<T, Error>;
