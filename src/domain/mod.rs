//! Core domain types and logic.

pub mod price_series;
pub mod oscillator;
pub mod signal;
pub mod allocation;
pub mod order;
pub mod position;
pub mod tracker;
pub mod cycle;
pub mod backtest;
pub mod universe;
pub mod config_validation;
pub mod error;
