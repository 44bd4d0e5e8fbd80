//! Market-data port trait.

use chrono::NaiveDate;

use crate::domain::error::SwingtraderError;
use crate::domain::price_series::PriceSeries;

pub trait MarketDataPort {
    /// Daily closes for `symbol` in `[start, end]` inclusive, chronological.
    ///
    /// The `end` bound is the evaluation point: the backtest loop passes the
    /// current bar date so no cycle can see past it. Fails with
    /// `DataUnavailable` when the symbol is unknown or the range is empty.
    fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, SwingtraderError>;
}
