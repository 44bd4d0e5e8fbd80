//! Simulated execution venue for backtests.
//!
//! Orders accepted on one bar fill on the next bar the symbol trades,
//! because the backtest loop advances the venue before the engine runs.
//! Trailing stops ratchet a per-order high-water mark on every bar and
//! trigger once the close drops to or below the trailed level.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::error::SwingtraderError;
use crate::domain::order::{Order, OrderKind, OrderRequest, OrderSide, OrderSizing, OrderStatus};
use crate::domain::position::Position;
use crate::ports::venue_port::{BarVenuePort, OrderFilter, VenuePort};

pub struct SimVenueAdapter {
    cash: f64,
    next_id: u64,
    orders: BTreeMap<u64, Order>,
    positions: HashMap<String, Position>,
    /// Highest close seen per trailing-stop order since submission.
    high_water: HashMap<u64, f64>,
    last_prices: HashMap<String, f64>,
    pending_updates: Vec<Order>,
}

impl SimVenueAdapter {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            next_id: 1,
            orders: BTreeMap::new(),
            positions: HashMap::new(),
            high_water: HashMap::new(),
            last_prices: HashMap::new(),
            pending_updates: Vec::new(),
        }
    }

    /// Cash committed to buy orders that are accepted but not yet filled.
    fn reserved_cash(&self) -> f64 {
        self.orders
            .values()
            .filter(|o| o.is_open() && o.side == OrderSide::Buy)
            .map(|o| match o.sizing {
                OrderSizing::Notional(notional) => notional,
                OrderSizing::Quantity(_) => 0.0,
            })
            .sum()
    }

    fn open_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map(|p| p.quantity).unwrap_or(0.0)
    }

    /// Quantity already claimed by open sell orders for `symbol`.
    fn committed_sell_quantity(&self, symbol: &str) -> f64 {
        self.orders
            .values()
            .filter(|o| o.is_open() && o.side == OrderSide::Sell && o.symbol == symbol)
            .map(Order::quantity)
            .sum()
    }

    fn validate(&self, request: &OrderRequest) -> Result<(), SwingtraderError> {
        match (request.side, request.kind) {
            (OrderSide::Buy, OrderKind::NotionalMarket) => {
                let notional = match request.sizing {
                    OrderSizing::Notional(n) if n > 0.0 => n,
                    _ => {
                        return Err(SwingtraderError::OrderRejected {
                            symbol: request.symbol.clone(),
                            reason: "notional buy requires a positive notional".into(),
                        });
                    }
                };
                let available = self.cash - self.reserved_cash();
                if notional > available {
                    return Err(SwingtraderError::InsufficientFunds {
                        required: notional,
                        available,
                    });
                }
                Ok(())
            }
            (OrderSide::Buy, _) => Err(SwingtraderError::OrderRejected {
                symbol: request.symbol.clone(),
                reason: "only notional market buys are supported".into(),
            }),
            (OrderSide::Sell, kind) => {
                let quantity = match request.sizing {
                    OrderSizing::Quantity(q) if q > 0.0 => q,
                    _ => {
                        return Err(SwingtraderError::OrderRejected {
                            symbol: request.symbol.clone(),
                            reason: "sell requires a positive quantity".into(),
                        });
                    }
                };
                if kind == OrderKind::TrailingStop
                    && !request.trail_percent.is_some_and(|t| t > 0.0 && t < 100.0)
                {
                    return Err(SwingtraderError::OrderRejected {
                        symbol: request.symbol.clone(),
                        reason: "trailing stop requires a trail percent in (0, 100)".into(),
                    });
                }
                let sellable =
                    self.open_quantity(&request.symbol) - self.committed_sell_quantity(&request.symbol);
                if quantity > sellable + 1e-9 {
                    return Err(SwingtraderError::OrderRejected {
                        symbol: request.symbol.clone(),
                        reason: format!("sell of {quantity} exceeds sellable quantity {sellable}"),
                    });
                }
                Ok(())
            }
        }
    }

    fn fill(&mut self, id: u64, price: f64) {
        let order = match self.orders.get_mut(&id) {
            Some(o) => o,
            None => return,
        };
        let quantity = match order.sizing {
            OrderSizing::Quantity(q) => q,
            OrderSizing::Notional(n) => n / price,
        };
        order.status = OrderStatus::Filled;
        order.filled_quantity = quantity;
        order.fill_price = Some(price);
        let filled = order.clone();

        match filled.side {
            OrderSide::Buy => {
                let cost = match filled.sizing {
                    OrderSizing::Notional(n) => n,
                    OrderSizing::Quantity(q) => q * price,
                };
                self.cash -= cost;
                self.positions
                    .entry(filled.symbol.clone())
                    .or_insert_with(|| Position::new(&filled.symbol, 0.0))
                    .add(quantity);
            }
            OrderSide::Sell => {
                self.cash += quantity * price;
                if let Some(position) = self.positions.get_mut(&filled.symbol) {
                    position.reduce(quantity);
                    if !position.is_open() {
                        self.positions.remove(&filled.symbol);
                    }
                }
            }
        }

        self.high_water.remove(&id);
        debug!(
            id,
            symbol = %filled.symbol,
            quantity,
            price,
            "simulated fill"
        );
        self.pending_updates.push(filled);
    }

    fn parse_id(order_id: &str) -> Option<u64> {
        order_id.parse().ok()
    }
}

impl VenuePort for SimVenueAdapter {
    fn open_positions(&self) -> Result<Vec<Position>, SwingtraderError> {
        let mut positions: Vec<Position> = self.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    fn open_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, SwingtraderError> {
        Ok(self
            .orders
            .values()
            .filter(|o| o.is_open() && filter.matches(o))
            .cloned()
            .collect())
    }

    fn available_cash(&self) -> Result<f64, SwingtraderError> {
        Ok(self.cash - self.reserved_cash())
    }

    fn submit_order(&mut self, request: OrderRequest) -> Result<Order, SwingtraderError> {
        self.validate(&request)?;

        let id = self.next_id;
        self.next_id += 1;
        let order = Order {
            id: id.to_string(),
            symbol: request.symbol,
            side: request.side,
            kind: request.kind,
            sizing: request.sizing,
            trail_percent: request.trail_percent,
            status: OrderStatus::Pending,
            reason: request.reason,
            filled_quantity: 0.0,
            fill_price: None,
        };
        if order.kind == OrderKind::TrailingStop {
            if let Some(&price) = self.last_prices.get(&order.symbol) {
                self.high_water.insert(id, price);
            }
        }
        self.orders.insert(id, order.clone());
        Ok(order)
    }

    fn cancel_order(&mut self, order_id: &str) -> Result<(), SwingtraderError> {
        let id = Self::parse_id(order_id).ok_or_else(|| SwingtraderError::OrderNotCancelable {
            id: order_id.to_string(),
        })?;
        match self.orders.get_mut(&id) {
            Some(order) if order.is_open() => {
                order.status = OrderStatus::Canceled;
                self.high_water.remove(&id);
                self.pending_updates.push(order.clone());
                Ok(())
            }
            _ => Err(SwingtraderError::OrderNotCancelable {
                id: order_id.to_string(),
            }),
        }
    }

    fn order_updates(&mut self) -> Result<Vec<Order>, SwingtraderError> {
        Ok(std::mem::take(&mut self.pending_updates))
    }
}

impl BarVenuePort for SimVenueAdapter {
    fn on_bar(&mut self, _date: NaiveDate, prices: &HashMap<String, f64>) {
        self.last_prices
            .extend(prices.iter().map(|(s, &p)| (s.clone(), p)));

        // Market orders first, at this bar's close.
        let market_ids: Vec<u64> = self
            .orders
            .iter()
            .filter(|(_, o)| {
                o.is_open() && o.kind != OrderKind::TrailingStop && prices.contains_key(&o.symbol)
            })
            .map(|(&id, _)| id)
            .collect();
        for id in market_ids {
            let symbol = self.orders[&id].symbol.clone();
            self.fill(id, prices[&symbol]);
        }

        // Then trailing stops: ratchet the mark, trigger on a drop through it.
        let stop_ids: Vec<u64> = self
            .orders
            .iter()
            .filter(|(_, o)| {
                o.is_open() && o.kind == OrderKind::TrailingStop && prices.contains_key(&o.symbol)
            })
            .map(|(&id, _)| id)
            .collect();
        for id in stop_ids {
            let symbol = self.orders[&id].symbol.clone();
            let price = prices[&symbol];
            let trail = self.orders[&id].trail_percent.unwrap_or(0.0);

            let mark = self.high_water.entry(id).or_insert(price);
            if price > *mark {
                *mark = price;
            }
            let trigger_at = *mark * (1.0 - trail / 100.0);
            if price <= trigger_at {
                self.fill(id, price);
            }
        }
    }
}
