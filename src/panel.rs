//! Date-aligned return panels shared between ingestion and the risk core.
//!
//! A [`ReturnsPanel`] is the immutable input contract of every risk
//! computation: ordered unique trading dates, unique symbol columns, and a
//! complete (gap-free) daily fractional return for every cell. Completeness
//! is enforced at construction so downstream code never has to reason about
//! missing observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use thiserror::Error;

/// Errors raised while constructing a [`ReturnsPanel`].
#[derive(Error, Debug)]
pub enum PanelError {
    /// Dates must be strictly ascending (sorted, no duplicates)
    #[error("dates must be strictly ascending (violation at row {row})")]
    UnsortedDates { row: usize },

    /// Each symbol may appear only once
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    /// Every column must cover every date
    #[error("column {symbol} has {actual} rows, expected {expected}")]
    LengthMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    /// Returns must be finite numbers
    #[error("non-finite return for {symbol} at row {row}")]
    NonFiniteReturn { symbol: String, row: usize },

    /// A panel without dates or symbols is useless
    #[error("panel must contain at least one date and one symbol")]
    Empty,
}

/// Inclusive date window over a panel's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First date included in the window
    pub start: NaiveDate,
    /// Last date included in the window
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a new inclusive window.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Validate window ordering.
    pub fn validate(&self) -> Result<(), String> {
        if self.start > self.end {
            return Err(format!(
                "window start {} is after window end {}",
                self.start, self.end
            ));
        }
        Ok(())
    }
}

/// Immutable date-indexed, symbol-keyed table of daily fractional returns.
///
/// Storage is column-major: one contiguous `Vec<f64>` per symbol, aligned to
/// the shared date index. The panel is read-only after construction and can
/// be shared freely across concurrent computations.
#[derive(Debug, Clone)]
pub struct ReturnsPanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
}

impl ReturnsPanel {
    /// Build a panel from a shared date index and per-symbol return columns.
    ///
    /// Validates the completeness invariant: strictly ascending dates, unique
    /// symbols, every column exactly as long as the date index, and every
    /// return finite.
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<f64>>,
    ) -> Result<Self, PanelError> {
        if dates.is_empty() || symbols.is_empty() {
            return Err(PanelError::Empty);
        }

        for row in 1..dates.len() {
            if dates[row] <= dates[row - 1] {
                return Err(PanelError::UnsortedDates { row });
            }
        }

        let mut index = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            if index.insert(symbol.clone(), i).is_some() {
                return Err(PanelError::DuplicateSymbol(symbol.clone()));
            }
        }

        for (symbol, column) in symbols.iter().zip(columns.iter()) {
            if column.len() != dates.len() {
                return Err(PanelError::LengthMismatch {
                    symbol: symbol.clone(),
                    expected: dates.len(),
                    actual: column.len(),
                });
            }
            for (row, value) in column.iter().enumerate() {
                if !value.is_finite() {
                    return Err(PanelError::NonFiniteReturn {
                        symbol: symbol.clone(),
                        row,
                    });
                }
            }
        }

        if columns.len() != symbols.len() {
            // Symbol without a column (or vice versa) cannot be attributed
            // to a single name, so report against the panel as a whole.
            return Err(PanelError::Empty);
        }

        Ok(Self {
            dates,
            symbols,
            index,
            columns,
        })
    }

    /// Ordered date index.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbol columns, in construction order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of observations (rows).
    pub fn num_observations(&self) -> usize {
        self.dates.len()
    }

    /// Whether the panel carries a column for `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    /// Full return column for `symbol`, aligned to [`Self::dates`].
    pub fn column(&self, symbol: &str) -> Option<&[f64]> {
        self.index
            .get(symbol)
            .map(|&i| self.columns[i].as_slice())
    }

    /// Resolve an inclusive date window to a contiguous row range.
    ///
    /// Dates are strictly ascending, so both bounds are found by binary
    /// search. The range is empty when the window misses the index entirely.
    pub fn row_range(&self, window: &DateWindow) -> Range<usize> {
        let start = self.dates.partition_point(|d| *d < window.start);
        let end = self.dates.partition_point(|d| *d <= window.end);
        start..end.max(start)
    }
}
