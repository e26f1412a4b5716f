//! Error types for touchline-core

use thiserror::Error;

/// Error type for attribution operations
///
/// Numeric degeneracies (zero conversions, empty coalitions, zero removal
/// mass) never surface here; they resolve to documented fallback values.
/// Only out-of-range configuration and, when requested, malformed journeys
/// are reported to the caller.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// Blend weight outside `[0, 1]` or not a number
    #[error("alpha must be within [0, 1], got {0}")]
    InvalidAlpha(f64),

    /// Engine configuration rejected before any computation started
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Journey rejected by strict validation
    #[error("Invalid journey {journey_id}: {reason}")]
    InvalidJourney { journey_id: String, reason: String },

    /// Ground-truth comparison needs at least two shared channels
    #[error("Need at least 2 channels shared with the ground truth, found {found}")]
    InsufficientOverlap { found: usize },

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AttributionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AttributionError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for attribution operations
pub type Result<T> = std::result::Result<T, AttributionError>;
