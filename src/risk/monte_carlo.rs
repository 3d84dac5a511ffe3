//! Monte Carlo estimation of an asset's risk footprint.
//!
//! For a target asset A, a portfolio size k, and n draws, the sampler
//! repeatedly forms random equal-weight portfolios P = {A} ∪ {k − 1 distinct
//! assets drawn uniformly without replacement from the universe}, computes
//! σ(P) and A's marginal risk contribution for each, and aggregates:
//!
//! ```text
//! E[σ|A]   = mean of the n σ(P) values
//! SE[σ|A]  = sample std dev (ddof = 1) of the σ(P) values / sqrt(n)
//! E[mrc_A] = mean of the n mrc_A values
//! ```
//!
//! # Determinism
//!
//! One `StdRng` seeded from the configured seed drives the whole loop as a
//! single globally sequenced stream, so identical inputs produce
//! bit-identical estimates. Draws are sequential; parallelizing them is a
//! pure optimization left on the roadmap and would require per-draw
//! sub-streams to keep this guarantee.
//!
//! # Failure semantics
//!
//! A draw whose portfolio has degenerate volatility is resampled at most
//! `retry_budget` times (default 0, i.e. abort immediately); once the budget
//! is exhausted the error propagates and no partial estimate is returned.
//! Retries pull from the same RNG stream and stay deterministic.

use super::covariance::CovarianceCache;
use super::error::RiskError;
use super::portfolio::equal_weight_risk;
use crate::panel::{DateWindow, ReturnsPanel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Parameters of one footprint estimation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintConfig {
    /// Number of assets per sampled portfolio (k ≥ 1, target included)
    #[serde(default = "default_portfolio_size")]
    pub portfolio_size: usize,

    /// Number of Monte Carlo draws (n ≥ 1, typically hundreds to low thousands)
    #[serde(default = "default_num_draws")]
    pub num_draws: usize,

    /// RNG seed; identical inputs and seed reproduce the estimate exactly
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Resample attempts allowed per draw when a portfolio is degenerate
    #[serde(default)]
    pub retry_budget: u32,
}

// Default value functions for serde
fn default_portfolio_size() -> usize {
    5
}
fn default_num_draws() -> usize {
    1000
}
fn default_seed() -> u64 {
    42
}

impl Default for FootprintConfig {
    fn default() -> Self {
        Self {
            portfolio_size: default_portfolio_size(),
            num_draws: default_num_draws(),
            seed: default_seed(),
            retry_budget: 0,
        }
    }
}

impl FootprintConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.portfolio_size == 0 {
            return Err("portfolio_size must be at least 1".to_string());
        }
        if self.num_draws == 0 {
            return Err("num_draws must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Aggregated footprint estimate for one target asset.
///
/// Produced fresh per invocation; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FootprintEstimate {
    /// Target asset the portfolios were conditioned on
    pub asset: String,
    /// E[σ(P) | asset ∈ P, |P| = portfolio_size]
    pub expected_sigma: f64,
    /// Standard error of the mean of the sampled σ(P) values
    pub sigma_std_error: f64,
    /// E[mrc_asset] over the sampled portfolios
    pub expected_mrc: f64,
    /// Portfolio size k used for every draw
    pub portfolio_size: usize,
    /// Number of Monte Carlo draws n
    pub num_draws: usize,
}

/// Estimate the expected risk contribution of `asset` across random
/// equal-weight portfolios of fixed size.
///
/// The universe covariance is computed once over `window` (through a
/// request-scoped [`CovarianceCache`]) and sliced per draw, which is
/// algebraically identical to re-estimating Σ_P per portfolio from the same
/// window.
pub fn estimate_footprint(
    panel: &ReturnsPanel,
    universe: &[String],
    asset: &str,
    window: &DateWindow,
    config: &FootprintConfig,
) -> Result<FootprintEstimate, RiskError> {
    config.validate().map_err(RiskError::InvalidConfig)?;
    window.validate().map_err(RiskError::InvalidConfig)?;

    let distinct: HashSet<&str> = universe.iter().map(String::as_str).collect();
    if distinct.len() != universe.len() {
        return Err(RiskError::InvalidConfig(
            "universe contains duplicate symbols".to_string(),
        ));
    }
    if !distinct.contains(asset) {
        return Err(RiskError::UnknownAsset(asset.to_string()));
    }

    let k = config.portfolio_size;
    let n = config.num_draws;
    if universe.len() < k {
        return Err(RiskError::InsufficientUniverse {
            required: k,
            available: universe.len(),
        });
    }

    info!(
        asset = %asset,
        universe = universe.len(),
        portfolio_size = k,
        draws = n,
        seed = config.seed,
        start = %window.start,
        end = %window.end,
        "Estimating risk footprint"
    );

    let mut cache = CovarianceCache::new();
    let cov = cache.get_or_compute(panel, universe, window)?;

    // The cache stores matrices in sorted-symbol order; resolve positions
    // against the matrix itself, never against the caller's ordering.
    let target = cov
        .index_of(asset)
        .ok_or_else(|| RiskError::UnknownAsset(asset.to_string()))?;
    let others: Vec<usize> = (0..cov.order()).filter(|&i| i != target).collect();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut sigmas = Vec::with_capacity(n);
    let mut mrcs = Vec::with_capacity(n);

    for draw in 0..n {
        let mut attempts = 0u32;
        let risk = loop {
            // Target first, then k − 1 distinct companions without
            // replacement. Draws are independent of each other.
            let mut members = Vec::with_capacity(k);
            members.push(target);
            members.extend(others.choose_multiple(&mut rng, k - 1).copied());

            match equal_weight_risk(&cov.principal_submatrix(&members), k) {
                Ok(risk) => break risk,
                Err(RiskError::DegenerateVolatility { sigma })
                    if attempts < config.retry_budget =>
                {
                    attempts += 1;
                    debug!(draw, attempts, sigma, "Degenerate portfolio, resampling");
                }
                Err(err) => return Err(err),
            }
        };

        sigmas.push(risk.sigma);
        mrcs.push(risk.mrc[0]);
    }

    let expected_sigma = mean(&sigmas);
    let sigma_std_error = sample_std(&sigmas) / (n as f64).sqrt();
    let expected_mrc = mean(&mrcs);

    info!(
        asset = %asset,
        expected_sigma = format!("{:.6}", expected_sigma),
        std_error = format!("{:.2e}", sigma_std_error),
        expected_mrc = format!("{:.6}", expected_mrc),
        "Footprint estimate complete"
    );

    Ok(FootprintEstimate {
        asset: asset.to_string(),
        expected_sigma,
        sigma_std_error,
        expected_mrc,
        portfolio_size: k,
        num_draws: n,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1); zero for fewer than 2 values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    /// Deterministic synthetic panel: LCG-driven daily returns.
    fn synthetic_panel(symbols: &[&str], days: u32) -> ReturnsPanel {
        let dates: Vec<NaiveDate> = (1..=days).map(date).collect();
        let columns: Vec<Vec<f64>> = symbols
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let mut state = 0x9e37u64.wrapping_add(i as u64 * 0x85eb);
                (0..days)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ((state >> 33) as f64 / u32::MAX as f64 - 0.5) * 0.04
                    })
                    .collect()
            })
            .collect();
        ReturnsPanel::new(
            dates,
            symbols.iter().map(|s| s.to_string()).collect(),
            columns,
        )
        .unwrap()
    }

    fn full_window() -> DateWindow {
        DateWindow::new(date(1), date(31))
    }

    fn universe(symbols: &[&str]) -> Vec<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fixed_seed_is_bit_identical() {
        let panel = synthetic_panel(&["A", "B", "C", "D", "E"], 30);
        let uni = universe(&["A", "B", "C", "D", "E"]);
        let config = FootprintConfig {
            portfolio_size: 3,
            num_draws: 200,
            seed: 7,
            retry_budget: 0,
        };

        let first = estimate_footprint(&panel, &uni, "B", &full_window(), &config).unwrap();
        let second = estimate_footprint(&panel, &uni, "B", &full_window(), &config).unwrap();

        assert_eq!(first.expected_sigma.to_bits(), second.expected_sigma.to_bits());
        assert_eq!(
            first.sigma_std_error.to_bits(),
            second.sigma_std_error.to_bits()
        );
        assert_eq!(first.expected_mrc.to_bits(), second.expected_mrc.to_bits());
    }

    #[test]
    fn test_different_seeds_differ() {
        let panel = synthetic_panel(&["A", "B", "C", "D", "E"], 30);
        let uni = universe(&["A", "B", "C", "D", "E"]);
        let base = FootprintConfig {
            portfolio_size: 3,
            num_draws: 50,
            seed: 1,
            retry_budget: 0,
        };
        let other = FootprintConfig { seed: 2, ..base.clone() };

        let a = estimate_footprint(&panel, &uni, "A", &full_window(), &base).unwrap();
        let b = estimate_footprint(&panel, &uni, "A", &full_window(), &other).unwrap();
        assert_ne!(a.expected_sigma.to_bits(), b.expected_sigma.to_bits());
    }

    #[test]
    fn test_single_asset_portfolio_matches_own_std() {
        let panel = synthetic_panel(&["A", "B", "C"], 40);
        let uni = universe(&["A", "B", "C"]);
        let config = FootprintConfig {
            portfolio_size: 1,
            num_draws: 25,
            seed: 42,
            retry_budget: 0,
        };

        let estimate = estimate_footprint(&panel, &uni, "B", &full_window(), &config).unwrap();

        // Every draw is the singleton {B}, so the estimate must equal B's
        // own sample standard deviation with zero spread.
        let own_std = sample_std(panel.column("B").unwrap());
        assert_relative_eq!(estimate.expected_sigma, own_std, epsilon = 1e-12);
        assert_relative_eq!(estimate.expected_mrc, own_std, epsilon = 1e-12);
        assert_relative_eq!(estimate.sigma_std_error, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_universe_smaller_than_k_fails() {
        let panel = synthetic_panel(&["A", "B"], 20);
        let uni = universe(&["A", "B"]);
        let config = FootprintConfig {
            portfolio_size: 3,
            num_draws: 10,
            seed: 42,
            retry_budget: 0,
        };

        let result = estimate_footprint(&panel, &uni, "A", &full_window(), &config);
        assert!(matches!(
            result,
            Err(RiskError::InsufficientUniverse {
                required: 3,
                available: 2
            })
        ));
    }

    #[test]
    fn test_zero_draws_rejected() {
        let panel = synthetic_panel(&["A", "B", "C"], 20);
        let uni = universe(&["A", "B", "C"]);
        let config = FootprintConfig {
            num_draws: 0,
            ..FootprintConfig::default()
        };
        let result = estimate_footprint(&panel, &uni, "A", &full_window(), &config);
        assert!(matches!(result, Err(RiskError::InvalidConfig(_))));
    }

    #[test]
    fn test_asset_outside_universe_fails() {
        let panel = synthetic_panel(&["A", "B", "C"], 20);
        let uni = universe(&["A", "B"]);
        let config = FootprintConfig::default();
        let result = estimate_footprint(&panel, &uni, "C", &full_window(), &config);
        assert!(matches!(result, Err(RiskError::UnknownAsset(_))));
    }

    #[test]
    fn test_duplicate_universe_rejected() {
        let panel = synthetic_panel(&["A", "B", "C"], 20);
        let uni = universe(&["A", "B", "B"]);
        let config = FootprintConfig::default();
        let result = estimate_footprint(&panel, &uni, "A", &full_window(), &config);
        assert!(matches!(result, Err(RiskError::InvalidConfig(_))));
    }

    #[test]
    fn test_degenerate_portfolio_aborts_even_with_retries() {
        // B mirrors A exactly, so {A, B} always offsets to zero volatility
        // and retrying can never find a healthy sample.
        let dates: Vec<NaiveDate> = (1..=10).map(date).collect();
        let a: Vec<f64> = (0..10).map(|i| ((i % 3) as f64 - 1.0) * 0.01).collect();
        let b: Vec<f64> = a.iter().map(|r| -r).collect();
        let panel = ReturnsPanel::new(
            dates,
            vec!["A".to_string(), "B".to_string()],
            vec![a, b],
        )
        .unwrap();

        let config = FootprintConfig {
            portfolio_size: 2,
            num_draws: 5,
            seed: 42,
            retry_budget: 3,
        };
        let result = estimate_footprint(
            &panel,
            &universe(&["A", "B"]),
            "A",
            &full_window(),
            &config,
        );
        assert!(matches!(
            result,
            Err(RiskError::DegenerateVolatility { .. })
        ));
    }

    #[test]
    fn test_std_error_shrinks_with_more_draws() {
        let panel = synthetic_panel(&["A", "B", "C", "D", "E", "F"], 40);
        let uni = universe(&["A", "B", "C", "D", "E", "F"]);

        // SE ∝ 1/sqrt(n); averaging over several seeds smooths out the
        // sampling noise in the std-dev estimate itself.
        let mean_se = |draws: usize| -> f64 {
            (1u64..=5)
                .map(|seed| {
                    let config = FootprintConfig {
                        portfolio_size: 3,
                        num_draws: draws,
                        seed,
                        retry_budget: 0,
                    };
                    estimate_footprint(&panel, &uni, "A", &full_window(), &config)
                        .unwrap()
                        .sigma_std_error
                })
                .sum::<f64>()
                / 5.0
        };

        let se_small = mean_se(64);
        let se_large = mean_se(1024);
        assert!(
            se_large < se_small,
            "SE should shrink with more draws: {} vs {}",
            se_large,
            se_small
        );
    }

    #[test]
    fn test_estimate_serializes() {
        let panel = synthetic_panel(&["A", "B", "C"], 20);
        let uni = universe(&["A", "B", "C"]);
        let config = FootprintConfig {
            portfolio_size: 2,
            num_draws: 20,
            seed: 42,
            retry_budget: 0,
        };
        let estimate =
            estimate_footprint(&panel, &uni, "A", &full_window(), &config).unwrap();

        let json = serde_json::to_string(&estimate).unwrap();
        assert!(json.contains("\"expected_sigma\""));
        assert!(json.contains("\"num_draws\":20"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(FootprintConfig::default().validate().is_ok());
    }
}
