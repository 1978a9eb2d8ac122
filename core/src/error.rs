use thiserror::Error;

/// Errors surfaced by the ranking core. Missing article attributes (no
/// publish date, no click count) are never errors; they fall back to
/// documented defaults at feature-extraction time.
#[derive(Debug, Error)]
pub enum RankError {
    /// Feature vector length does not match the model's weight vector.
    /// Always fatal to the individual call; never padded or truncated.
    #[error("expected {expected} features, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    /// Training was requested with no labeled examples available.
    #[error("no training data available")]
    NoTrainingData,

    /// Model file could not be read or written. Non-fatal to ranking: the
    /// model falls back to defaults on load, and in-memory updates still
    /// take effect when a save fails.
    #[error("model persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}
