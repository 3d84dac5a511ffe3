//! Error types for the risk core.
//!
//! Every error is raised at the point of detection and propagates to the
//! caller unchanged. The core never substitutes defaults or returns partial
//! results.

use thiserror::Error;

/// Errors that can occur during covariance estimation, risk decomposition,
/// Monte Carlo sampling, or historical VaR calculation.
#[derive(Error, Debug)]
pub enum RiskError {
    /// Too few observations in the requested window
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Portfolio volatility is zero (or numerically indistinguishable from
    /// zero), so the marginal risk contribution is undefined
    #[error("portfolio volatility {sigma:e} is too close to zero to decompose risk")]
    DegenerateVolatility { sigma: f64 },

    /// Universe smaller than the requested portfolio size
    #[error("universe too small: need at least {required} assets, got {available}")]
    InsufficientUniverse { required: usize, available: usize },

    /// Portfolio weights do not form a valid allocation
    #[error("invalid portfolio weights: {reason}")]
    InvalidWeights { reason: String },

    /// Asset not present in the returns panel or universe
    #[error("unknown asset: {0}")]
    UnknownAsset(String),

    /// Invalid query parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
