//! Sample covariance estimation over a returns panel.
//!
//! The estimator is a pure function of its inputs: a panel, an ordered list
//! of symbols, and a date window. The **sample** convention (ddof = 1) is
//! used everywhere in this crate; every downstream statistic (portfolio
//! volatility, Monte Carlo standard errors) shares it, so estimates computed
//! from the same window agree exactly.

use super::error::RiskError;
use crate::panel::{DateWindow, ReturnsPanel};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Covariance matrix over an ordered list of symbols.
///
/// Row-major `order × order` storage. Symmetric and positive-semidefinite by
/// construction (it is computed from real return data).
#[derive(Debug, Clone)]
pub struct CovarianceMatrix {
    symbols: Vec<String>,
    data: Vec<f64>,
}

impl CovarianceMatrix {
    /// Number of assets (matrix dimension).
    pub fn order(&self) -> usize {
        self.symbols.len()
    }

    /// Symbols indexing the rows/columns, in matrix order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Matrix position of `symbol`, if present.
    pub fn index_of(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// Covariance entry (i, j).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.symbols.len() + j]
    }

    /// Extract the principal submatrix for the given row/column indices.
    ///
    /// Returns a row-major block ordered exactly like `indices`, suitable as
    /// the Σ_P input of the portfolio risk calculator.
    pub fn principal_submatrix(&self, indices: &[usize]) -> Vec<f64> {
        let k = indices.len();
        let mut block = Vec::with_capacity(k * k);
        for &i in indices {
            for &j in indices {
                block.push(self.get(i, j));
            }
        }
        block
    }
}

/// Compute the sample covariance matrix (ddof = 1) of `symbols` over `window`.
///
/// Fails with [`RiskError::InsufficientData`] when the window holds fewer
/// than 2 observations and with [`RiskError::UnknownAsset`] when a symbol is
/// missing from the panel.
pub fn sample_covariance(
    panel: &ReturnsPanel,
    symbols: &[String],
    window: &DateWindow,
) -> Result<CovarianceMatrix, RiskError> {
    window.validate().map_err(RiskError::InvalidConfig)?;

    let range = panel.row_range(window);
    let n = range.len();
    if n < 2 {
        return Err(RiskError::InsufficientData {
            required: 2,
            actual: n,
        });
    }

    let mut slices: Vec<&[f64]> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let column = panel
            .column(symbol)
            .ok_or_else(|| RiskError::UnknownAsset(symbol.clone()))?;
        slices.push(&column[range.clone()]);
    }

    let means: Vec<f64> = slices
        .iter()
        .map(|s| s.iter().sum::<f64>() / n as f64)
        .collect();

    let k = symbols.len();
    let mut data = vec![0.0; k * k];
    for i in 0..k {
        // Exploit symmetry: compute the upper triangle, mirror the rest.
        for j in i..k {
            let mut acc = 0.0;
            for t in 0..n {
                acc += (slices[i][t] - means[i]) * (slices[j][t] - means[j]);
            }
            let cov = acc / (n - 1) as f64;
            data[i * k + j] = cov;
            data[j * k + i] = cov;
        }
    }

    debug!(assets = k, observations = n, "Sample covariance computed");

    Ok(CovarianceMatrix {
        symbols: symbols.to_vec(),
        data,
    })
}

/// Request-scoped covariance cache.
///
/// Keyed by the sorted symbol list plus the window bounds, so the same asset
/// set requested in any order hits the same entry. Cached matrices are
/// stored in sorted-symbol order; callers resolve positions through
/// [`CovarianceMatrix::index_of`]. The cache is an explicit value owned by
/// the request, never global state, and is dropped with it.
#[derive(Debug, Default)]
pub struct CovarianceCache {
    entries: HashMap<(Vec<String>, NaiveDate, NaiveDate), CovarianceMatrix>,
}

impl CovarianceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached matrices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fetch the covariance of `symbols` over `window`, computing it on the
    /// first request.
    pub fn get_or_compute(
        &mut self,
        panel: &ReturnsPanel,
        symbols: &[String],
        window: &DateWindow,
    ) -> Result<&CovarianceMatrix, RiskError> {
        let mut sorted = symbols.to_vec();
        sorted.sort();

        let key = (sorted, window.start, window.end);
        if !self.entries.contains_key(&key) {
            let matrix = sample_covariance(panel, &key.0, window)?;
            self.entries.insert(key.clone(), matrix);
        }

        Ok(&self.entries[&key])
    }
}
