//! Error types for data ingestion.

use crate::panel::PanelError;
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while loading and preparing market data.
#[derive(Error, Debug)]
pub enum IngestionError {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    /// Date column failed to parse as YYYY-MM-DD
    #[error("date parse error: {0}")]
    DateParse(String),

    /// The same (symbol, date) cell appeared twice
    #[error("duplicate observation for {symbol} on {date}")]
    DuplicateObservation { symbol: String, date: NaiveDate },

    /// Prices must be finite and strictly positive
    #[error("invalid price for {symbol} on {date}: {value}")]
    InvalidPrice {
        symbol: String,
        date: NaiveDate,
        value: f64,
    },

    /// Too few price rows to compute returns
    #[error("insufficient data: need at least {required} price dates, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Every symbol has at least one gap over the panel's dates
    #[error("no symbol has complete history over the panel")]
    NoCompleteHistory,

    /// The prepared returns violated a panel invariant
    #[error(transparent)]
    Panel(#[from] PanelError),
}
