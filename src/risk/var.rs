//! Historical Value-at-Risk over realized portfolio returns.
//!
//! Takes an arbitrary weighted portfolio (weights need not be equal, the
//! portfolio need not contain any particular asset), builds the realized
//! return series over a date window as the per-date weighted sum of asset
//! returns, and reports the empirical α-quantile of that series.
//!
//! # Conventions (fixed for the whole crate)
//!
//! - `alpha` is the tail probability: `alpha = 0.05` is 95% VaR.
//! - VaR is reported as a **positive loss magnitude**, i.e. the negated
//!   quantile. A VaR of 0.032 reads "with probability 1 − α the one-day loss
//!   does not exceed 3.2%".
//! - The quantile interpolates linearly between order statistics.

use super::error::RiskError;
use crate::panel::{DateWindow, ReturnsPanel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Portfolio weights may deviate from 1.0 by at most this much.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Result of one historical VaR query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarEstimate {
    /// Positive loss magnitude at the α-quantile
    pub value_at_risk: f64,
    /// Tail probability the quantile was taken at
    pub alpha: f64,
    /// Date window the realized series was built over
    pub window: DateWindow,
    /// Number of realized observations in the window
    pub observations: usize,
}

/// Equal weights (1/k each) for a list of symbols.
pub fn equal_weights(symbols: &[String]) -> Vec<(String, f64)> {
    let w = 1.0 / symbols.len() as f64;
    symbols.iter().map(|s| (s.clone(), w)).collect()
}

/// Compute historical VaR for a weighted portfolio over `window`.
///
/// Requires weights that are finite, attached to distinct known symbols, and
/// sum to 1 within [`WEIGHT_SUM_TOLERANCE`]. The window must hold at least
/// `ceil(1/alpha)` observations so the requested tail quantile is backed by
/// data.
pub fn historical_var(
    panel: &ReturnsPanel,
    weights: &[(String, f64)],
    window: &DateWindow,
    alpha: f64,
) -> Result<VarEstimate, RiskError> {
    window.validate().map_err(RiskError::InvalidConfig)?;
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(RiskError::InvalidConfig(format!(
            "alpha must be in (0, 1), got {alpha}"
        )));
    }

    validate_weights(weights)?;

    let range = panel.row_range(window);
    let observations = range.len();
    let required = (1.0 / alpha).ceil() as usize;
    if observations < required {
        return Err(RiskError::InsufficientData {
            required,
            actual: observations,
        });
    }

    // Realized portfolio return per date: weighted sum across columns.
    let mut series = vec![0.0; observations];
    for (symbol, weight) in weights {
        let column = panel
            .column(symbol)
            .ok_or_else(|| RiskError::UnknownAsset(symbol.clone()))?;
        for (t, r) in column[range.clone()].iter().enumerate() {
            series[t] += weight * r;
        }
    }

    let q = quantile(&mut series, alpha);
    let value_at_risk = -q;

    info!(
        positions = weights.len(),
        observations,
        alpha,
        value_at_risk = format!("{:.6}", value_at_risk),
        "Historical VaR computed"
    );

    Ok(VarEstimate {
        value_at_risk,
        alpha,
        window: *window,
        observations,
    })
}

fn validate_weights(weights: &[(String, f64)]) -> Result<(), RiskError> {
    if weights.is_empty() {
        return Err(RiskError::InvalidWeights {
            reason: "portfolio has no positions".to_string(),
        });
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(weights.len());
    let mut sum = 0.0;
    for (symbol, weight) in weights {
        if !weight.is_finite() {
            return Err(RiskError::InvalidWeights {
                reason: format!("weight for {symbol} is not finite"),
            });
        }
        if !seen.insert(symbol.as_str()) {
            return Err(RiskError::InvalidWeights {
                reason: format!("symbol {symbol} appears more than once"),
            });
        }
        sum += weight;
    }

    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RiskError::InvalidWeights {
            reason: format!("weights sum to {sum}, expected 1"),
        });
    }
    Ok(())
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// Sorts in place; `q` must already be validated to (0, 1).
fn quantile(values: &mut [f64], q: f64) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = q * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        values[lo]
    } else {
        let frac = pos - lo as f64;
        values[lo] + frac * (values[hi] - values[lo])
    }
}
