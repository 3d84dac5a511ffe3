//! Data preparation: CSV ingestion, price pivoting, and return computation.
//!
//! This module is the boundary between raw market data and the risk core.
//! It consumes long-format CSV rows (`symbol,date,close`), pivots them into
//! a date-indexed price panel, filters the universe down to symbols with
//! complete history, and converts prices into the gap-free
//! [`ReturnsPanel`](crate::panel::ReturnsPanel) the core operates on. The
//! core itself never touches files.

mod error;
mod loader;

pub use error::IngestionError;
pub use loader::{
    full_history_universe, load_prices, load_prices_from_reader, returns_from_prices,
    PricePanel,
};
