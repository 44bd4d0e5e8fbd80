//! Execution-venue port traits.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::domain::error::SwingtraderError;
use crate::domain::order::{Order, OrderRequest, OrderSide};
use crate::domain::position::Position;

/// Filter for open-order queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub symbol: Option<String>,
    pub side: Option<OrderSide>,
}

impl OrderFilter {
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        OrderFilter {
            symbol: Some(symbol.into()),
            side: None,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        if let Some(symbol) = &self.symbol {
            if order.symbol != *symbol {
                return false;
            }
        }
        if let Some(side) = self.side {
            if order.side != side {
                return false;
            }
        }
        true
    }
}

/// Brokerage operations the engine consumes. All calls are bounded and
/// fail-fast; the venue never retries internally.
pub trait VenuePort {
    fn open_positions(&self) -> Result<Vec<Position>, SwingtraderError>;

    fn open_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, SwingtraderError>;

    fn available_cash(&self) -> Result<f64, SwingtraderError>;

    /// Submit an order. Acknowledgment means accepted, not filled; fills
    /// arrive later through [`VenuePort::order_updates`].
    fn submit_order(&mut self, request: OrderRequest) -> Result<Order, SwingtraderError>;

    /// Fails with `OrderNotCancelable` if the order is already terminal.
    fn cancel_order(&mut self, order_id: &str) -> Result<(), SwingtraderError>;

    /// Drain asynchronous status events accumulated since the last call.
    fn order_updates(&mut self) -> Result<Vec<Order>, SwingtraderError>;
}

/// A venue the backtest loop can drive one bar at a time.
pub trait BarVenuePort: VenuePort {
    /// Advance the simulation to `date`: mark the given closes, fill
    /// eligible market orders, ratchet and trigger trailing stops, and queue
    /// the resulting status events for [`VenuePort::order_updates`].
    fn on_bar(&mut self, date: NaiveDate, prices: &HashMap<String, f64>);
}
