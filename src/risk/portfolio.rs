//! Equal-weight portfolio volatility and marginal risk contributions.
//!
//! Given the covariance block Σ_P of a k-asset portfolio and implicit
//! uniform weights w = (1/k, …, 1/k):
//!
//! ```text
//! σ(P)  = sqrt(wᵀ Σ_P w)
//! mrc   = (Σ_P w) / σ(P)
//! ```
//!
//! The Euler identity Σ_i w_i · mrc_i = σ(P) holds exactly, so the mrc
//! vector is a complete decomposition of portfolio volatility. For k = 1 the
//! formulas collapse to σ = sqrt(Σ_11) (the asset's own standard deviation)
//! and mrc_0 = σ.

use super::error::RiskError;

/// Volatility below this threshold is treated as degenerate: dividing the
/// mrc numerator by it would amplify floating-point noise into garbage.
pub const MIN_VOLATILITY: f64 = 1e-12;

/// Result of one equal-weight risk decomposition.
#[derive(Debug, Clone)]
pub struct PortfolioRisk {
    /// Portfolio volatility σ(P)
    pub sigma: f64,
    /// Marginal risk contribution per asset, in Σ_P index order
    pub mrc: Vec<f64>,
}

/// Decompose the risk of an equal-weight portfolio.
///
/// `cov` is the row-major k×k covariance block for exactly the portfolio's
/// assets; weights are uniform by contract and never passed in. Fails with [`RiskError::DegenerateVolatility`] when k = 0 or
/// σ(P) is numerically zero, because the mrc vector is undefined there.
pub fn equal_weight_risk(cov: &[f64], k: usize) -> Result<PortfolioRisk, RiskError> {
    if k == 0 {
        return Err(RiskError::DegenerateVolatility { sigma: 0.0 });
    }
    if cov.len() != k * k {
        return Err(RiskError::InvalidConfig(format!(
            "covariance block has {} entries, expected {} for {} assets",
            cov.len(),
            k * k,
            k
        )));
    }

    let k_f = k as f64;

    // wᵀ Σ w with uniform weights reduces to the grand sum over k².
    let variance = cov.iter().sum::<f64>() / (k_f * k_f);

    // Σ_P is PSD from real data; tiny negative sums are floating-point
    // noise and clamp to zero.
    let sigma = variance.max(0.0).sqrt();
    if sigma < MIN_VOLATILITY {
        return Err(RiskError::DegenerateVolatility { sigma });
    }

    let mrc = (0..k)
        .map(|i| {
            let row_dot_w = cov[i * k..(i + 1) * k].iter().sum::<f64>() / k_f;
            row_dot_w / sigma
        })
        .collect();

    Ok(PortfolioRisk { sigma, mrc })
}
