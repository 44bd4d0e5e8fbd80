//! Signal classification from oscillator thresholds.
//!
//! Pure and stateless. Equality at a threshold does not cross it: both bounds
//! use strict inequality so a value sitting exactly on a bound never flaps.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sell,
    Buy,
    Hold,
}

/// Oscillator bounds. `lower < upper` is enforced by config validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub upper: f64,
    pub lower: f64,
}

/// Classify one instrument for one evaluation point.
///
/// Sell requires an open position; Buy requires no open buy order for the
/// instrument (a pending entry already represents this cycle's intent).
pub fn classify(
    value: f64,
    thresholds: &Thresholds,
    position_open: bool,
    buy_order_open: bool,
) -> Signal {
    if value > thresholds.upper && position_open {
        return Signal::Sell;
    }
    if value < thresholds.lower && !buy_order_open {
        return Signal::Buy;
    }
    Signal::Hold
}
