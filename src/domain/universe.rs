//! Instrument universe parsing and validation.

use tracing::warn;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::SwingtraderError;
use crate::ports::market_data_port::MarketDataPort;

/// Parse a comma-separated symbol list: trims whitespace, drops empties,
/// deduplicates while preserving first-seen order.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_uppercase())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { have: usize, need: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientBars { have, need } => {
                write!(f, "insufficient bars: have {have}, need {need}")
            }
        }
    }
}

/// Split the universe into symbols with enough history to ever produce a
/// signal during the run and symbols to skip. A partially invalid universe
/// is not fatal; the caller decides whether an empty one is.
pub fn validate_universe(
    symbols: &[String],
    config: &BacktestConfig,
    min_bars: usize,
    data: &dyn MarketDataPort,
) -> Result<(Vec<String>, Vec<(String, SkipReason)>), SwingtraderError> {
    let mut valid = Vec::new();
    let mut skipped = Vec::new();

    for symbol in symbols {
        match data.fetch_prices(symbol, config.start_date, config.end_date) {
            Ok(series) if series.len() >= min_bars => valid.push(symbol.clone()),
            Ok(series) => {
                warn!(symbol, have = series.len(), need = min_bars, "skipping symbol");
                skipped.push((
                    symbol.clone(),
                    SkipReason::InsufficientBars {
                        have: series.len(),
                        need: min_bars,
                    },
                ));
            }
            Err(SwingtraderError::DataUnavailable { .. }) => {
                warn!(symbol, "skipping symbol: no data");
                skipped.push((symbol.clone(), SkipReason::NoData));
            }
            Err(err) => return Err(err),
        }
    }

    Ok((valid, skipped))
}
