//! CSV price loading, panel pivoting, and return computation.

use super::error::IngestionError;
use crate::panel::ReturnsPanel;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// One long-format row of the input CSV.
#[derive(Debug, Deserialize)]
struct PriceRow {
    symbol: String,
    date: String,
    close: f64,
}

/// Pivoted close-price panel: ordered unique dates × symbols, with optional
/// cells (a symbol may be missing a quote on some dates).
#[derive(Debug, Clone)]
pub struct PricePanel {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    // Column-major, aligned to `dates`; None marks a missing quote.
    cells: Vec<Vec<Option<f64>>>,
}

impl PricePanel {
    /// Ordered date index.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbols, sorted ascending.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Price column for `symbol`, aligned to [`Self::dates`].
    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.cells[i].as_slice())
    }
}

/// Load a `symbol,date,close` CSV file into a pivoted price panel.
pub fn load_prices<P: AsRef<Path>>(path: P) -> Result<PricePanel, IngestionError> {
    info!(path = %path.as_ref().display(), "Loading price CSV");
    let file = File::open(path)?;
    load_prices_from_reader(file)
}

/// Load a `symbol,date,close` CSV from any reader into a pivoted price panel.
///
/// Dates parse as `YYYY-MM-DD`. The date index is sorted ascending and
/// deduplicated; a repeated (symbol, date) cell is an error rather than a
/// silent overwrite.
pub fn load_prices_from_reader<R: Read>(reader: R) -> Result<PricePanel, IngestionError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    // BTreeMaps keep both axes sorted, which makes the pivot deterministic.
    let mut by_symbol: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    let mut date_index: BTreeMap<NaiveDate, ()> = BTreeMap::new();
    let mut rows = 0usize;

    for record in csv_reader.deserialize() {
        let row: PriceRow = record?;
        rows += 1;

        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            IngestionError::DateParse(format!("'{}' for {}: {}", row.date, row.symbol, e))
        })?;

        if !row.close.is_finite() || row.close <= 0.0 {
            return Err(IngestionError::InvalidPrice {
                symbol: row.symbol,
                date,
                value: row.close,
            });
        }

        date_index.insert(date, ());
        let column = by_symbol.entry(row.symbol.clone()).or_default();
        if column.insert(date, row.close).is_some() {
            return Err(IngestionError::DuplicateObservation {
                symbol: row.symbol,
                date,
            });
        }
    }

    let dates: Vec<NaiveDate> = date_index.into_keys().collect();
    let symbols: Vec<String> = by_symbol.keys().cloned().collect();
    let cells: Vec<Vec<Option<f64>>> = by_symbol
        .values()
        .map(|column| dates.iter().map(|d| column.get(d).copied()).collect())
        .collect();

    info!(
        rows,
        dates = dates.len(),
        symbols = symbols.len(),
        "Price panel pivoted"
    );

    Ok(PricePanel {
        dates,
        symbols,
        cells,
    })
}

/// Symbols with a price on every date of the panel (complete history).
///
/// Sorted ascending; the ordering is deterministic across runs.
pub fn full_history_universe(prices: &PricePanel) -> Vec<String> {
    let universe: Vec<String> = prices
        .symbols
        .iter()
        .zip(prices.cells.iter())
        .filter(|(_, column)| column.iter().all(Option::is_some))
        .map(|(symbol, _)| symbol.clone())
        .collect();

    for symbol in &prices.symbols {
        if !universe.contains(symbol) {
            debug!(symbol = %symbol, "Excluded from universe: incomplete history");
        }
    }

    info!(
        universe = universe.len(),
        excluded = prices.symbols.len() - universe.len(),
        "Full-history universe selected"
    );
    universe
}

/// Simple daily pct-change returns over the full-history universe.
///
/// The first price row carries no return and is dropped, mirroring a
/// pct-change-then-drop-first pipeline. Symbols with gaps are excluded (see
/// [`full_history_universe`]); if none survive the panel cannot feed the
/// risk core and `NoCompleteHistory` is returned.
pub fn returns_from_prices(prices: &PricePanel) -> Result<ReturnsPanel, IngestionError> {
    if prices.dates.len() < 2 {
        return Err(IngestionError::InsufficientData {
            required: 2,
            actual: prices.dates.len(),
        });
    }

    let universe = full_history_universe(prices);
    if universe.is_empty() {
        warn!("Every symbol has gaps; returns panel cannot be built");
        return Err(IngestionError::NoCompleteHistory);
    }

    let dates = prices.dates[1..].to_vec();
    let mut columns = Vec::with_capacity(universe.len());
    for symbol in &universe {
        // Column is gap-free by construction of the universe.
        let closes: Vec<f64> = prices
            .column(symbol)
            .expect("universe symbol must be present")
            .iter()
            .map(|c| c.expect("universe column must be complete"))
            .collect();

        let returns: Vec<f64> = closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        columns.push(returns);
    }

    Ok(ReturnsPanel::new(dates, universe, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    const SAMPLE_CSV: &str = "\
symbol,date,close
AAA,2024-01-02,100.0
AAA,2024-01-03,110.0
AAA,2024-01-04,99.0
BBB,2024-01-02,50.0
BBB,2024-01-03,55.0
BBB,2024-01-04,52.8
CCC,2024-01-03,10.0
CCC,2024-01-04,10.5
";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_pivot_from_reader() {
        let prices = load_prices_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(prices.dates(), &[date(2), date(3), date(4)]);
        assert_eq!(prices.symbols(), &["AAA", "BBB", "CCC"]);
        assert_eq!(
            prices.column("CCC").unwrap(),
            &[None, Some(10.0), Some(10.5)]
        );
    }

    #[test]
    fn test_load_prices_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CSV.as_bytes()).unwrap();

        let prices = load_prices(file.path()).unwrap();
        assert_eq!(prices.symbols().len(), 3);
    }

    #[test]
    fn test_full_history_filter_drops_gappy_symbol() {
        let prices = load_prices_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let universe = full_history_universe(&prices);
        // CCC has no quote on 2024-01-02.
        assert_eq!(universe, vec!["AAA".to_string(), "BBB".to_string()]);
    }

    #[test]
    fn test_pct_change_returns() {
        let prices = load_prices_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        let returns = returns_from_prices(&prices).unwrap();

        // First price row drops.
        assert_eq!(returns.dates(), &[date(3), date(4)]);
        let aaa = returns.column("AAA").unwrap();
        assert_relative_eq!(aaa[0], 0.10, epsilon = 1e-12);
        assert_relative_eq!(aaa[1], 99.0 / 110.0 - 1.0, epsilon = 1e-12);

        let bbb = returns.column("BBB").unwrap();
        assert_relative_eq!(bbb[0], 0.10, epsilon = 1e-12);
        assert!(!returns.contains("CCC"));
    }

    #[test]
    fn test_duplicate_cell_rejected() {
        let csv = "symbol,date,close\nAAA,2024-01-02,100.0\nAAA,2024-01-02,101.0\n";
        let result = load_prices_from_reader(csv.as_bytes());
        assert!(matches!(
            result,
            Err(IngestionError::DuplicateObservation { .. })
        ));
    }

    #[test]
    fn test_bad_date_rejected() {
        let csv = "symbol,date,close\nAAA,01/02/2024,100.0\n";
        let result = load_prices_from_reader(csv.as_bytes());
        assert!(matches!(result, Err(IngestionError::DateParse(_))));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let csv = "symbol,date,close\nAAA,2024-01-02,0.0\n";
        let result = load_prices_from_reader(csv.as_bytes());
        assert!(matches!(result, Err(IngestionError::InvalidPrice { .. })));
    }

    #[test]
    fn test_single_date_cannot_produce_returns() {
        let csv = "symbol,date,close\nAAA,2024-01-02,100.0\n";
        let prices = load_prices_from_reader(csv.as_bytes()).unwrap();
        let result = returns_from_prices(&prices);
        assert!(matches!(
            result,
            Err(IngestionError::InsufficientData {
                required: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_all_gappy_panel_rejected() {
        let csv = "symbol,date,close\nAAA,2024-01-02,100.0\nBBB,2024-01-03,50.0\n";
        let prices = load_prices_from_reader(csv.as_bytes()).unwrap();
        let result = returns_from_prices(&prices);
        assert!(matches!(result, Err(IngestionError::NoCompleteHistory)));
    }
}
