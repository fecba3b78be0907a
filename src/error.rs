use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised for caller mistakes only.
///
/// Expected business conditions (insufficient data, clamped recommendations,
/// degenerate arithmetic) are encoded in return values, never as errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid bid range: min {min:.4} must be below max {max:.4}")]
    InvalidBidRange { min: f64, max: f64 },

    #[error("market curve is empty, cannot search for a bid")]
    EmptyCurve,
}
