//! Local CSV data provider.
//!
//! Layout of the data directory:
//! - `{SYMBOL}.csv` with a `date,open,high,low,close,volume` header
//!   (column order free, names case-insensitive, extra columns ignored).
//! - optional `fundamentals.csv` with a `symbol` column and one column per
//!   metric; an empty or non-numeric cell means the metric is absent. An
//!   optional `sector` column is read as text.

use crate::domain::error::RuletraderError;
use crate::domain::fundamentals::FundamentalSnapshot;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub const FUNDAMENTALS_FILE: &str = "fundamentals.csv";
const SECTOR_COLUMN: &str = "sector";
const PRICE_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol.to_uppercase()))
    }
}

fn column_indices(
    symbol: &str,
    headers: &csv::StringRecord,
) -> Result<[usize; 6], RuletraderError> {
    let mut indices = [0usize; 6];
    for (slot, name) in indices.iter_mut().zip(PRICE_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                RuletraderError::data_unavailable(symbol, format!("missing {name} column"))
            })?;
    }
    Ok(indices)
}

fn parse_number(
    symbol: &str,
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    line: u64,
) -> Result<f64, RuletraderError> {
    record
        .get(index)
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| {
            RuletraderError::data_unavailable(symbol, format!("invalid {name} value on line {line}"))
        })
}

impl DataPort for CsvAdapter {
    fn get_price_series(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, RuletraderError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            RuletraderError::data_unavailable(
                symbol,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| RuletraderError::data_unavailable(symbol, format!("CSV parse error: {e}")))?
            .clone();
        let [date_i, open_i, high_i, low_i, close_i, volume_i] = column_indices(symbol, &headers)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| {
                RuletraderError::data_unavailable(symbol, format!("CSV parse error: {e}"))
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let date_str = record.get(date_i).map(str::trim).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                RuletraderError::data_unavailable(
                    symbol,
                    format!("invalid date '{date_str}' on line {line}: {e}"),
                )
            })?;

            if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
                continue;
            }

            bars.push(PriceBar {
                date,
                open: parse_number(symbol, &record, open_i, "open", line)?,
                high: parse_number(symbol, &record, high_i, "high", line)?,
                low: parse_number(symbol, &record, low_i, "low", line)?,
                close: parse_number(symbol, &record, close_i, "close", line)?,
                volume: parse_number(symbol, &record, volume_i, "volume", line)?,
            });
        }

        if bars.is_empty() {
            return Err(RuletraderError::data_unavailable(
                symbol,
                "no bars in the requested range",
            ));
        }
        debug!(symbol, bars = bars.len(), "loaded price series");
        Ok(bars)
    }

    fn get_fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, RuletraderError> {
        let path = self.base_path.join(FUNDAMENTALS_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            RuletraderError::data_unavailable(
                symbol,
                format!("failed to read {}: {}", path.display(), e),
            )
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| RuletraderError::data_unavailable(symbol, format!("CSV parse error: {e}")))?
            .clone();
        let symbol_i = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case("symbol"))
            .ok_or_else(|| RuletraderError::data_unavailable(symbol, "missing symbol column"))?;

        for result in rdr.records() {
            let record = result.map_err(|e| {
                RuletraderError::data_unavailable(symbol, format!("CSV parse error: {e}"))
            })?;
            let matches = record
                .get(symbol_i)
                .is_some_and(|s| s.trim().eq_ignore_ascii_case(symbol));
            if !matches {
                continue;
            }

            let mut snapshot = FundamentalSnapshot::new();
            for (i, name) in headers.iter().enumerate() {
                let name = name.trim();
                if i == symbol_i || name.is_empty() {
                    continue;
                }
                if name.eq_ignore_ascii_case(SECTOR_COLUMN) {
                    snapshot.set_sector(record.get(i).unwrap_or_default());
                    continue;
                }
                let value = record.get(i).and_then(|s| s.trim().parse::<f64>().ok());
                snapshot.set(name, value);
            }
            return Ok(snapshot);
        }

        Err(RuletraderError::data_unavailable(
            symbol,
            "no fundamentals row",
        ))
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if name_str.eq_ignore_ascii_case(FUNDAMENTALS_FILE) {
                continue;
            }
            if let Some(stem) = name_str.strip_suffix(".csv") {
                symbols.push(stem.to_uppercase());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(
            path.join("CBA.csv"),
            "Date,Close,Open,High,Low,Adj Close,Volume\n2024-01-15,10,9,11,8,10,700\n",
        )
        .unwrap();
        fs::write(path.join("EMPTY.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join(FUNDAMENTALS_FILE),
            "symbol,pe_ratio,roe,debt_to_equity\nBHP,12.5,18.0,\nCBA,N/A,11.0,0.4\n",
        )
        .unwrap();

        (dir, path)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn price_series_returns_correct_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.get_price_series("BHP", None, None).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, day(15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
    }

    #[test]
    fn price_series_reads_columns_by_header() {
        let (_dir, path) = setup_test_data();
        let bars = CsvAdapter::new(path)
            .get_price_series("cba", None, None)
            .unwrap();
        assert_eq!(bars[0].close, 10.0);
        assert_eq!(bars[0].open, 9.0);
        assert_eq!(bars[0].volume, 700.0);
    }

    #[test]
    fn price_series_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .get_price_series("BHP", Some(day(16)), Some(day(16)))
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, day(16));
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let err = CsvAdapter::new(path)
            .get_price_series("XYZ", None, None)
            .unwrap_err();
        assert!(matches!(err, RuletraderError::DataUnavailable { .. }));
    }

    #[test]
    fn empty_range_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.get_price_series("EMPTY", None, None).is_err());
        assert!(
            adapter
                .get_price_series("BHP", Some(day(20)), None)
                .is_err()
        );
    }

    #[test]
    fn fundamentals_blank_and_non_numeric_cells_are_absent() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bhp = adapter.get_fundamentals("BHP").unwrap();
        assert_eq!(bhp.get("pe_ratio"), Some(12.5));
        assert_eq!(bhp.get("debt_to_equity"), None);
        assert!(bhp.has_field("debt_to_equity"));

        let cba = adapter.get_fundamentals("CBA").unwrap();
        assert_eq!(cba.get("pe_ratio"), None);
        assert_eq!(cba.get("debt_to_equity"), Some(0.4));
    }

    #[test]
    fn sector_column_is_text_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(FUNDAMENTALS_FILE),
            "symbol,Sector,market_cap
HDFC,Banking,1.2e12
TCS,,1.4e13
",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());

        let hdfc = adapter.get_fundamentals("HDFC").unwrap();
        assert_eq!(hdfc.sector(), Some("Banking"));
        assert!(!hdfc.has_field("sector"));
        assert_eq!(hdfc.get("market_cap"), Some(1.2e12));

        let tcs = adapter.get_fundamentals("TCS").unwrap();
        assert_eq!(tcs.sector(), None);
    }

    #[test]
    fn fundamentals_missing_row_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let err = CsvAdapter::new(path).get_fundamentals("XYZ").unwrap_err();
        assert!(matches!(err, RuletraderError::DataUnavailable { .. }));
    }

    #[test]
    fn list_symbols_skips_fundamentals_file() {
        let (_dir, path) = setup_test_data();
        let symbols = CsvAdapter::new(path).list_symbols().unwrap();
        assert_eq!(symbols, vec!["BHP", "CBA", "EMPTY"]);
    }
}
