//! Position and order lifecycle tracking.
//!
//! The tracker is the sole owner of per-instrument state: open positions,
//! the pending entry/close order per instrument, and the set of trailing
//! stops protecting each position. Every mutating operation submits at most
//! one order to the venue; a failed submission is surfaced to the caller and
//! leaves the corresponding tracker record unchanged.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::domain::error::SwingtraderError;
use crate::domain::order::{Order, OrderRequest, OrderSide, OrderStatus};
use crate::domain::position::Position;
use crate::ports::venue_port::VenuePort;

#[derive(Debug, Default)]
pub struct LifecycleTracker {
    positions: HashMap<String, Position>,
    entry_orders: HashMap<String, Order>,
    trail_orders: HashMap<String, Vec<Order>>,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        LifecycleTracker::default()
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_open_position(&self, symbol: &str) -> bool {
        self.positions.get(symbol).is_some_and(|p| p.is_open())
    }

    /// Symbols with an open position, sorted for deterministic iteration.
    pub fn open_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .positions
            .iter()
            .filter(|(_, p)| p.is_open())
            .map(|(s, _)| s.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn has_open_buy_order(&self, symbol: &str) -> bool {
        self.entry_orders
            .get(symbol)
            .is_some_and(|o| o.is_open() && o.side == OrderSide::Buy)
    }

    pub fn has_pending_close(&self, symbol: &str) -> bool {
        self.entry_orders
            .get(symbol)
            .is_some_and(|o| o.is_open() && o.side == OrderSide::Sell)
    }

    pub fn active_trail_orders(&self, symbol: &str) -> &[Order] {
        self.trail_orders
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace tracked positions with the venue's view. Zero-quantity
    /// positions are dropped; links to dropped positions are purged at the
    /// next `on_cycle_start`.
    pub fn sync_positions(&mut self, positions: Vec<Position>) {
        self.positions = positions
            .into_iter()
            .filter(|p| p.is_open())
            .map(|p| (p.symbol.clone(), p))
            .collect();
    }

    /// Record a submitted entry or close order for an instrument.
    pub fn record_entry_order(&mut self, order: Order) {
        self.entry_orders.insert(order.symbol.clone(), order);
    }

    /// Purge terminal orders from the active sets and trailing-stop links
    /// whose position is closed.
    pub fn on_cycle_start(&mut self) {
        self.entry_orders.retain(|_, o| !o.status.is_terminal());

        let positions = &self.positions;
        self.trail_orders.retain(|symbol, orders| {
            if !positions.get(symbol).is_some_and(|p| p.is_open()) {
                return false;
            }
            orders.retain(|o| !o.status.is_terminal());
            !orders.is_empty()
        });
    }

    /// Ingest an asynchronous status event from the venue.
    ///
    /// Updates the stored copy of the order; sell fills (close orders and
    /// triggered trailing stops) reduce the position. Buy fills are absorbed
    /// by [`LifecycleTracker::record_buy_fill`], which the evaluation cycle
    /// invokes with venue access so the protective stop can be attached.
    pub fn apply_order_update(&mut self, update: &Order) {
        if let Some(order) = self.entry_orders.get_mut(&update.symbol) {
            if order.id == update.id {
                *order = update.clone();
            }
        }
        if let Some(orders) = self.trail_orders.get_mut(&update.symbol) {
            for order in orders.iter_mut() {
                if order.id == update.id {
                    *order = update.clone();
                }
            }
        }

        if update.status == OrderStatus::Filled && update.side == OrderSide::Sell {
            if let Some(position) = self.positions.get_mut(&update.symbol) {
                position.reduce(update.filled_quantity);
                if !position.is_open() {
                    debug!(symbol = %update.symbol, "position closed by sell fill");
                    self.positions.remove(&update.symbol);
                }
            }
        }
    }

    /// Act on a Sell signal: cancel the instrument's trailing stops, clear
    /// the link set, and submit one market close for the full open quantity.
    ///
    /// `OrderNotCancelable` on a stale stop is logged and skipped; any other
    /// cancel failure aborts before the close is submitted.
    pub fn record_sell_signal(
        &mut self,
        symbol: &str,
        venue: &mut dyn VenuePort,
    ) -> Result<Option<Order>, SwingtraderError> {
        let quantity = match self.positions.get(symbol) {
            Some(p) if p.is_open() => p.quantity,
            _ => return Ok(None),
        };

        if let Some(stops) = self.trail_orders.get(symbol) {
            for stop in stops {
                match venue.cancel_order(&stop.id) {
                    Ok(()) => debug!(symbol, id = %stop.id, "canceled trailing stop"),
                    Err(SwingtraderError::OrderNotCancelable { id }) => {
                        warn!(symbol, id, "trailing stop already terminal, skipping cancel");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        self.trail_orders.remove(symbol);

        let request = OrderRequest::market_sell(
            symbol,
            quantity,
            crate::domain::order::OrderReason::Signal,
        );
        let order = venue.submit_order(request)?;
        debug!(symbol, quantity, "submitted close order");
        self.entry_orders.insert(symbol.to_string(), order.clone());
        Ok(Some(order))
    }

    /// Absorb a buy fill: open or extend the position, then submit one
    /// trailing stop sized to the filled quantity and register the link.
    ///
    /// The position change reflects a fill the venue already executed, so it
    /// stands even if the stop submission fails; the uncovered quantity is
    /// picked up by the next `reconcile_protective_coverage`.
    pub fn record_buy_fill(
        &mut self,
        symbol: &str,
        filled_quantity: f64,
        fill_price: f64,
        trail_percent: f64,
        venue: &mut dyn VenuePort,
    ) -> Result<Order, SwingtraderError> {
        self.positions
            .entry(symbol.to_string())
            .and_modify(|p| p.add(filled_quantity))
            .or_insert_with(|| Position::new(symbol, filled_quantity));
        debug!(symbol, filled_quantity, fill_price, "buy fill recorded");

        let request = OrderRequest::trailing_stop(symbol, filled_quantity, trail_percent);
        let order = venue.submit_order(request)?;
        self.trail_orders
            .entry(symbol.to_string())
            .or_default()
            .push(order.clone());
        Ok(order)
    }

    /// Ensure an open position is fully covered by trailing stops. Submits
    /// exactly one stop for the uncovered remainder, or nothing when the sum
    /// of open stop quantities already matches the position.
    pub fn reconcile_protective_coverage(
        &mut self,
        symbol: &str,
        trail_percent: f64,
        venue: &mut dyn VenuePort,
    ) -> Result<Option<Order>, SwingtraderError> {
        let quantity = match self.positions.get(symbol) {
            Some(p) if p.is_open() => p.quantity,
            _ => return Ok(None),
        };

        let covered: f64 = self
            .active_trail_orders(symbol)
            .iter()
            .filter(|o| o.is_open())
            .map(|o| o.quantity())
            .sum();

        let uncovered = quantity - covered;
        // Tolerance absorbs float residue from fractional fills.
        if uncovered <= 1e-9 {
            return Ok(None);
        }

        let request = OrderRequest::trailing_stop(symbol, uncovered, trail_percent);
        let order = venue.submit_order(request)?;
        debug!(symbol, uncovered, "submitted coverage trailing stop");
        self.trail_orders
            .entry(symbol.to_string())
            .or_default()
            .push(order.clone());
        Ok(Some(order))
    }
}
