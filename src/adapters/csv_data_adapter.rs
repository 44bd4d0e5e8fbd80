//! CSV-backed market data adapter.
//!
//! Reads one file per symbol from a base directory, named `{SYMBOL}.csv`,
//! with a `date,close` header row. Dates are `YYYY-MM-DD`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::SwingtraderError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::market_data_port::MarketDataPort;

pub struct CsvDataAdapter {
    base_dir: PathBuf,
}

impl CsvDataAdapter {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, symbol: &str) -> PathBuf {
        self.base_dir.join(format!("{symbol}.csv"))
    }

    fn parse_row(
        symbol: &str,
        record: &csv::StringRecord,
        line: u64,
    ) -> Result<PricePoint, SwingtraderError> {
        let bad_row = |reason: String| SwingtraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let date_field = record
            .get(0)
            .ok_or_else(|| bad_row(format!("line {line}: missing date column")))?;
        let close_field = record
            .get(1)
            .ok_or_else(|| bad_row(format!("line {line}: missing close column")))?;

        let date = NaiveDate::parse_from_str(date_field.trim(), "%Y-%m-%d")
            .map_err(|_| bad_row(format!("line {line}: invalid date '{date_field}'")))?;
        let close: f64 = close_field
            .trim()
            .parse()
            .map_err(|_| bad_row(format!("line {line}: invalid close '{close_field}'")))?;
        if !close.is_finite() || close <= 0.0 {
            return Err(bad_row(format!("line {line}: non-positive close {close}")));
        }

        Ok(PricePoint { date, close })
    }
}

impl MarketDataPort for CsvDataAdapter {
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, SwingtraderError> {
        let path = self.file_for(symbol);
        if !path.exists() {
            return Err(SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no data file at {}", path.display()),
            });
        }

        let mut reader =
            csv::Reader::from_path(&path).map_err(|e| SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;

        let mut points = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })?;
            // Header is line 1; the first record is line 2.
            let point = Self::parse_row(symbol, &record, index as u64 + 2)?;
            if point.date >= start && point.date <= end {
                points.push(point);
            }
        }

        if points.is_empty() {
            return Err(SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bars between {start} and {end}"),
            });
        }

        Ok(PriceSeries::new(symbol, points))
    }
}
