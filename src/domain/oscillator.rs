//! RSI-style momentum oscillator.
//!
//! Relative strength over the trailing `period` price changes: simple average
//! of gains vs. simple average of losses, rescaled to 0-100.
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)).
//! If avg_loss == 0: RSI = 100. If avg_gain == 0: RSI = 0.
//!
//! Needs `period + 1` closes (`period` changes); fewer is InsufficientData.

use std::collections::VecDeque;

use crate::domain::error::SwingtraderError;

/// Compute the oscillator value from the trailing `period` changes of a
/// chronological close series. Deterministic, window-only: closes before the
/// trailing window never influence the result.
pub fn oscillator_value(
    symbol: &str,
    closes: &[f64],
    period: usize,
) -> Result<f64, SwingtraderError> {
    if closes.len() < period + 1 {
        return Err(SwingtraderError::InsufficientData {
            symbol: symbol.to_string(),
            have: closes.len(),
            need: period + 1,
        });
    }

    let window = &closes[closes.len() - (period + 1)..];

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum += -change;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        return Ok(100.0);
    }
    if avg_gain == 0.0 {
        return Ok(0.0);
    }
    Ok(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
}

/// Incremental form: retains exactly the `period + 1` most recent closes and
/// recomputes per bar. Delegates to [`oscillator_value`] over the retained
/// window, so batch and incremental results are identical by construction.
#[derive(Debug, Clone)]
pub struct OscillatorWindow {
    symbol: String,
    period: usize,
    closes: VecDeque<f64>,
}

impl OscillatorWindow {
    pub fn new(symbol: impl Into<String>, period: usize) -> Self {
        OscillatorWindow {
            symbol: symbol.into(),
            period,
            closes: VecDeque::with_capacity(period + 1),
        }
    }

    pub fn push(&mut self, close: f64) {
        if self.closes.len() == self.period + 1 {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
    }

    pub fn value(&self) -> Result<f64, SwingtraderError> {
        let closes: Vec<f64> = self.closes.iter().copied().collect();
        oscillator_value(&self.symbol, &closes, self.period)
    }
}
