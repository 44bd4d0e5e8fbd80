//! Order representation and submission requests.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    NotionalMarket,
    TrailingStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Canceled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// Why an order was placed. Observability and cleanup only; never consulted
/// for control decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderReason {
    Signal,
    ProtectiveStop,
}

impl std::fmt::Display for OrderReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderReason::Signal => write!(f, "oscillator signal"),
            OrderReason::ProtectiveStop => write!(f, "protective stop"),
        }
    }
}

/// Share-count or currency-amount sizing. Which one a venue fills natively
/// is the venue's concern; both are valid plan outputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSizing {
    Quantity(f64),
    Notional(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub sizing: OrderSizing,
    pub trail_percent: Option<f64>,
    pub reason: OrderReason,
}

impl OrderRequest {
    pub fn market_sell(symbol: impl Into<String>, quantity: f64, reason: OrderReason) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            kind: OrderKind::Market,
            sizing: OrderSizing::Quantity(quantity),
            trail_percent: None,
            reason,
        }
    }

    pub fn notional_buy(symbol: impl Into<String>, notional: f64, reason: OrderReason) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            kind: OrderKind::NotionalMarket,
            sizing: OrderSizing::Notional(notional),
            trail_percent: None,
            reason,
        }
    }

    pub fn trailing_stop(symbol: impl Into<String>, quantity: f64, trail_percent: f64) -> Self {
        OrderRequest {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            kind: OrderKind::TrailingStop,
            sizing: OrderSizing::Quantity(quantity),
            trail_percent: Some(trail_percent),
            reason: OrderReason::ProtectiveStop,
        }
    }
}

/// An order as acknowledged by the execution venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub sizing: OrderSizing,
    pub trail_percent: Option<f64>,
    pub status: OrderStatus,
    pub reason: OrderReason,
    pub filled_quantity: f64,
    pub fill_price: Option<f64>,
}

impl Order {
    /// Quantity this order would protect or close if it is a quantity-sized
    /// order. Notional orders size at fill time and report zero here.
    pub fn quantity(&self) -> f64 {
        match self.sizing {
            OrderSizing::Quantity(qty) => qty,
            OrderSizing::Notional(_) => 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}
