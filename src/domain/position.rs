//! Open position state.

/// One open position per instrument. A position whose quantity reaches zero
/// is closed and removed from tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Position {
            symbol: symbol.into(),
            quantity,
        }
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Extend with an additional fill.
    pub fn add(&mut self, quantity: f64) {
        self.quantity += quantity;
    }

    /// Reduce by a sell fill; quantity never goes below zero.
    pub fn reduce(&mut self, quantity: f64) {
        self.quantity = (self.quantity - quantity).max(0.0);
    }
}
