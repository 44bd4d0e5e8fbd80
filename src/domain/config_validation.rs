//! Configuration validation.
//!
//! Every key is checked up front so a bad config fails before any data is
//! fetched or any order submitted.

use chrono::NaiveDate;

use crate::domain::allocation::CandidateOrdering;
use crate::domain::error::SwingtraderError;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    validate_oscillator_period(config)?;
    validate_thresholds(config)?;
    validate_trail_percent(config)?;
    validate_lookback_days(config)?;
    validate_reserve_fraction(config)?;
    validate_decimal_places(config)?;
    validate_ordering(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_symbols(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> SwingtraderError {
    SwingtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> SwingtraderError {
    SwingtraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn validate_oscillator_period(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    let value = config.get_int("engine", "oscillator_period", 0);
    if value < 1 {
        return Err(invalid(
            "engine",
            "oscillator_period",
            "oscillator_period must be at least 1",
        ));
    }
    Ok(())
}

fn validate_thresholds(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    if config.get_string("engine", "upper_threshold").is_none() {
        return Err(missing("engine", "upper_threshold"));
    }
    if config.get_string("engine", "lower_threshold").is_none() {
        return Err(missing("engine", "lower_threshold"));
    }

    let upper = config.get_double("engine", "upper_threshold", f64::NAN);
    let lower = config.get_double("engine", "lower_threshold", f64::NAN);

    if !(0.0..=100.0).contains(&upper) {
        return Err(invalid(
            "engine",
            "upper_threshold",
            "upper_threshold must be within 0-100",
        ));
    }
    if !(0.0..=100.0).contains(&lower) {
        return Err(invalid(
            "engine",
            "lower_threshold",
            "lower_threshold must be within 0-100",
        ));
    }
    if lower >= upper {
        return Err(invalid(
            "engine",
            "lower_threshold",
            "lower_threshold must be below upper_threshold",
        ));
    }
    Ok(())
}

fn validate_trail_percent(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    let value = config.get_double("engine", "trail_percent", 0.0);
    if value <= 0.0 || value >= 100.0 {
        return Err(invalid(
            "engine",
            "trail_percent",
            "trail_percent must be between 0 and 100 exclusive",
        ));
    }
    Ok(())
}

fn validate_lookback_days(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    let value = config.get_int("engine", "lookback_days", 100);
    if value < 0 {
        return Err(invalid(
            "engine",
            "lookback_days",
            "lookback_days must be non-negative",
        ));
    }
    Ok(())
}

fn validate_reserve_fraction(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    if config
        .get_string("allocation", "cash_reserve_fraction")
        .is_none()
    {
        return Err(missing("allocation", "cash_reserve_fraction"));
    }
    let value = config.get_double("allocation", "cash_reserve_fraction", f64::NAN);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "allocation",
            "cash_reserve_fraction",
            "cash_reserve_fraction must be in [0, 1)",
        ));
    }
    Ok(())
}

fn validate_decimal_places(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    if config
        .get_string("allocation", "fractional_decimal_places")
        .is_none()
    {
        return Err(missing("allocation", "fractional_decimal_places"));
    }
    let value = config.get_int("allocation", "fractional_decimal_places", -1);
    if !(0..=9).contains(&value) {
        return Err(invalid(
            "allocation",
            "fractional_decimal_places",
            "fractional_decimal_places must be within 0-9",
        ));
    }
    Ok(())
}

fn validate_ordering(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    match config.get_string("allocation", "ordering") {
        None => Err(missing("allocation", "ordering")),
        Some(raw) => match CandidateOrdering::parse(&raw) {
            Some(_) => Ok(()),
            None => Err(invalid(
                "allocation",
                "ordering",
                "ordering must be one of descending-price, ascending-price, randomized",
            )),
        },
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    let start = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start >= end {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn parse_date(value: Option<&str>, key: &str) -> Result<NaiveDate, SwingtraderError> {
    match value {
        None => Err(missing("backtest", key)),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                key,
                &format!("invalid {key} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    match config.get_string("backtest", "symbols") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(missing("backtest", "symbols")),
    }
}
