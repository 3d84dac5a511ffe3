//! Risk estimation core.
//!
//! Three computation paths over a shared read-only returns panel:
//!
//! - covariance estimation ([`sample_covariance`], cached per request by
//!   [`CovarianceCache`]),
//! - equal-weight portfolio risk decomposition ([`equal_weight_risk`]),
//! - and the two public operations built on them:
//!   [`estimate_footprint`] (Monte Carlo expectation of an asset's risk
//!   contribution across random portfolios) and [`historical_var`]
//!   (empirical quantile of realized portfolio returns, covariance-free).

mod covariance;
mod error;
mod monte_carlo;
mod portfolio;
mod var;

pub use covariance::{sample_covariance, CovarianceCache, CovarianceMatrix};
pub use error::RiskError;
pub use monte_carlo::{estimate_footprint, FootprintConfig, FootprintEstimate};
pub use portfolio::{equal_weight_risk, PortfolioRisk, MIN_VOLATILITY};
pub use var::{equal_weights, historical_var, VarEstimate, WEIGHT_SUM_TOLERANCE};
