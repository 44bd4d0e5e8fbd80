//! Shared fixtures for integration tests.

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use swingtrader::domain::allocation::CandidateOrdering;
use swingtrader::domain::cycle::EngineConfig;
use swingtrader::domain::signal::Thresholds;

pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

/// Write a `{symbol}.csv` bar file with one close per consecutive day.
pub fn write_series(dir: &Path, symbol: &str, start: NaiveDate, closes: &[f64]) {
    let mut body = String::from("date,close\n");
    for (i, close) in closes.iter().enumerate() {
        let day = start + chrono::Duration::days(i as i64);
        body.push_str(&format!("{day},{close}\n"));
    }
    fs::write(dir.join(format!("{symbol}.csv")), body).unwrap();
}

pub fn engine_config(upper: f64, lower: f64) -> EngineConfig {
    EngineConfig {
        oscillator_period: 3,
        thresholds: Thresholds { upper, lower },
        trail_percent: 5.0,
        cash_reserve_fraction: 0.10,
        decimal_places: 2,
        ordering: CandidateOrdering::DescendingPrice,
        lookback_days: 30,
    }
}
