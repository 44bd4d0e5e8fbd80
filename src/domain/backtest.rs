//! Bar-by-bar backtest loop.
//!
//! Drives the same [`Engine`](crate::domain::cycle::Engine) the live poller
//! uses, one historical bar at a time in strict chronological order. The
//! venue is advanced to each bar before the cycle runs, so orders submitted
//! on bar `t` fill no earlier than bar `t + 1` and no cycle ever sees data
//! past its own evaluation point.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::cycle::Engine;
use crate::domain::error::SwingtraderError;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::venue_port::BarVenuePort;

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
}

#[derive(Debug)]
pub struct BacktestResult {
    pub bars_processed: usize,
    pub sell_orders: usize,
    pub stop_orders: usize,
    pub buy_orders: usize,
    /// Positions closed by a filled signal close or a triggered stop.
    pub closed_trades: usize,
    pub instrument_failures: usize,
    pub final_cash: f64,
    pub final_equity: f64,
    /// Instruments still holding an open position at the end.
    pub open_symbols: Vec<String>,
}

/// Build the unified trading calendar: every date on which at least one
/// universe symbol has a bar, within the configured range.
pub fn build_calendar(
    universe: &[String],
    config: &BacktestConfig,
    data: &dyn MarketDataPort,
) -> Result<Vec<NaiveDate>, SwingtraderError> {
    let mut dates = BTreeSet::new();
    for symbol in universe {
        match data.fetch_prices(symbol, config.start_date, config.end_date) {
            Ok(series) => dates.extend(series.points.iter().map(|p| p.date)),
            Err(SwingtraderError::DataUnavailable { symbol, reason }) => {
                warn!(symbol, reason, "excluded from calendar");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(dates.into_iter().collect())
}

pub fn run_backtest(
    engine: &mut Engine,
    universe: &[String],
    config: &BacktestConfig,
    data: &dyn MarketDataPort,
    venue: &mut dyn BarVenuePort,
) -> Result<BacktestResult, SwingtraderError> {
    let calendar = build_calendar(universe, config, data)?;

    let mut sell_orders = 0;
    let mut stop_orders = 0;
    let mut buy_orders = 0;
    let mut closed_trades = 0;
    let mut instrument_failures = 0;
    let mut last_prices: HashMap<String, f64> = HashMap::new();

    for &date in &calendar {
        let mut prices = HashMap::new();
        for symbol in universe {
            if let Ok(series) = data.fetch_prices(symbol, date, date) {
                if let Some(close) = series.latest_close() {
                    prices.insert(symbol.clone(), close);
                }
            }
        }
        last_prices.extend(prices.iter().map(|(s, &p)| (s.clone(), p)));

        venue.on_bar(date, &prices);

        let report = engine.run_cycle(date, universe, data, venue)?;
        sell_orders += report.sells.submitted.len();
        stop_orders += report.stops.submitted.len();
        buy_orders += report.buys.submitted.len();
        closed_trades += report.closes_filled;
        instrument_failures += report.sells.failures.len()
            + report.stops.failures.len()
            + report.buys.failures.len();
    }

    let final_cash = venue.available_cash()?;
    let positions = venue.open_positions()?;
    let position_value: f64 = positions
        .iter()
        .filter_map(|p| last_prices.get(&p.symbol).map(|&price| p.market_value(price)))
        .sum();
    let mut open_symbols: Vec<String> = positions
        .iter()
        .filter(|p| p.is_open())
        .map(|p| p.symbol.clone())
        .collect();
    open_symbols.sort();

    Ok(BacktestResult {
        bars_processed: calendar.len(),
        sell_orders,
        stop_orders,
        buy_orders,
        closed_trades,
        instrument_failures,
        final_cash,
        final_equity: final_cash + position_value,
        open_symbols,
    })
}
