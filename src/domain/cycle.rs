//! Mode-agnostic evaluation cycle.
//!
//! One engine drives both execution modes: the backtest loop feeds it one
//! bar at a time and the live loop one polling tick at a time. Each
//! evaluation point runs the same sequence: absorb venue order updates,
//! purge terminal state, sell overbought positions, reconcile protective
//! coverage, then allocate capital and buy oversold candidates.
//!
//! Business failures are scoped to the instrument that caused them and
//! collected into the report; only venue outage aborts a cycle.

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::allocation::{allocate, AllocationPlan, BuyCandidate, CandidateOrdering};
use crate::domain::error::SwingtraderError;
use crate::domain::order::{Order, OrderRequest, OrderSide, OrderStatus};
use crate::domain::oscillator::oscillator_value;
use crate::domain::signal::{classify, Signal, Thresholds};
use crate::domain::tracker::LifecycleTracker;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::venue_port::VenuePort;

/// Immutable engine configuration, supplied at construction and never
/// mutated mid-cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub oscillator_period: usize,
    pub thresholds: Thresholds,
    pub trail_percent: f64,
    pub cash_reserve_fraction: f64,
    pub decimal_places: u32,
    pub ordering: CandidateOrdering,
    /// Extra calendar days of history fetched beyond the oscillator period,
    /// to ride out weekends and holidays in daily data.
    pub lookback_days: i64,
}

impl EngineConfig {
    pub fn lookback_start(&self, as_of: NaiveDate) -> NaiveDate {
        as_of - Duration::days(self.oscillator_period as i64 + self.lookback_days)
    }
}

#[derive(Debug)]
pub struct InstrumentFailure {
    pub symbol: String,
    pub error: SwingtraderError,
}

/// Outcome of one phase: what was submitted, which instruments failed, and
/// whether the phase was abandoned outright (buy phase on budget shortfall).
#[derive(Debug, Default)]
pub struct PhaseReport {
    pub submitted: Vec<Order>,
    pub failures: Vec<InstrumentFailure>,
    pub aborted: Option<SwingtraderError>,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub updates_absorbed: usize,
    /// Sell-side fills absorbed this cycle: signal closes and triggered
    /// trailing stops.
    pub closes_filled: usize,
    pub sells: PhaseReport,
    pub stops: PhaseReport,
    pub buys: PhaseReport,
}

impl CycleReport {
    pub fn orders_submitted(&self) -> usize {
        self.sells.submitted.len() + self.stops.submitted.len() + self.buys.submitted.len()
    }
}

pub struct Engine {
    config: EngineConfig,
    tracker: LifecycleTracker,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            tracker: LifecycleTracker::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracker(&self) -> &LifecycleTracker {
        &self.tracker
    }

    /// Run one full evaluation point. Idempotent against an unchanged world:
    /// with no new fills and no new bars, a second run submits nothing.
    pub fn run_cycle(
        &mut self,
        as_of: NaiveDate,
        universe: &[String],
        data: &dyn MarketDataPort,
        venue: &mut dyn VenuePort,
    ) -> Result<CycleReport, SwingtraderError> {
        let (updates_absorbed, closes_filled, update_failures) =
            self.absorb_order_updates(venue)?;

        self.tracker.sync_positions(venue.open_positions()?);
        self.tracker.on_cycle_start();

        let mut sells = self.run_sell_phase(as_of, data, venue)?;
        sells.failures.extend(update_failures);
        let stops = self.run_protective_phase(venue)?;
        let buys = self.run_buy_phase(as_of, universe, data, venue)?;

        let report = CycleReport {
            updates_absorbed,
            closes_filled,
            sells,
            stops,
            buys,
        };
        debug!(
            %as_of,
            orders = report.orders_submitted(),
            updates = report.updates_absorbed,
            "cycle complete"
        );
        Ok(report)
    }

    /// Drain the venue's asynchronous status events. Filled buys open or
    /// extend the position and get a protective stop attached; everything
    /// else is plain bookkeeping.
    pub fn absorb_order_updates(
        &mut self,
        venue: &mut dyn VenuePort,
    ) -> Result<(usize, usize, Vec<InstrumentFailure>), SwingtraderError> {
        let updates = venue.order_updates()?;
        let count = updates.len();
        let mut closes_filled = 0;
        let mut failures = Vec::new();

        for update in updates {
            self.tracker.apply_order_update(&update);

            if update.status == OrderStatus::Filled && update.side == OrderSide::Sell {
                closes_filled += 1;
            }
            if update.status == OrderStatus::Filled && update.side == OrderSide::Buy {
                let fill_price = update.fill_price.unwrap_or_default();
                match self.tracker.record_buy_fill(
                    &update.symbol,
                    update.filled_quantity,
                    fill_price,
                    self.config.trail_percent,
                    venue,
                ) {
                    Ok(stop) => {
                        info!(symbol = %update.symbol, stop_id = %stop.id, "protective stop attached")
                    }
                    Err(err) if err.is_per_instrument() => {
                        warn!(symbol = %update.symbol, %err, "protective stop submission failed");
                        failures.push(InstrumentFailure {
                            symbol: update.symbol.clone(),
                            error: err,
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok((count, closes_filled, failures))
    }

    /// Close every open position whose oscillator crossed above the upper
    /// threshold. Positions already pending a close are left alone.
    pub fn run_sell_phase(
        &mut self,
        as_of: NaiveDate,
        data: &dyn MarketDataPort,
        venue: &mut dyn VenuePort,
    ) -> Result<PhaseReport, SwingtraderError> {
        let mut report = PhaseReport::default();

        for symbol in self.tracker.open_symbols() {
            if self.tracker.has_pending_close(&symbol) {
                continue;
            }

            let value = match self.evaluate_oscillator(&symbol, as_of, data) {
                Ok(Some((value, _))) => value,
                Ok(None) => continue,
                Err(err) => {
                    report.failures.push(InstrumentFailure { symbol, error: err });
                    continue;
                }
            };

            let signal = classify(
                value,
                &self.config.thresholds,
                true,
                self.tracker.has_open_buy_order(&symbol),
            );
            if signal != Signal::Sell {
                continue;
            }

            info!(symbol, value, "sell signal");
            match self.tracker.record_sell_signal(&symbol, venue) {
                Ok(Some(order)) => report.submitted.push(order),
                Ok(None) => {}
                Err(err) if err.is_per_instrument() => {
                    warn!(symbol, %err, "close order failed");
                    report.failures.push(InstrumentFailure { symbol, error: err });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Top up trailing-stop coverage for every open position that is not
    /// being closed this cycle.
    pub fn run_protective_phase(
        &mut self,
        venue: &mut dyn VenuePort,
    ) -> Result<PhaseReport, SwingtraderError> {
        let mut report = PhaseReport::default();

        for symbol in self.tracker.open_symbols() {
            if self.tracker.has_pending_close(&symbol) {
                continue;
            }

            match self
                .tracker
                .reconcile_protective_coverage(&symbol, self.config.trail_percent, venue)
            {
                Ok(Some(order)) => report.submitted.push(order),
                Ok(None) => {}
                Err(err) if err.is_per_instrument() => {
                    warn!(symbol, %err, "coverage stop failed");
                    report.failures.push(InstrumentFailure { symbol, error: err });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    /// Classify the candidate universe, allocate spendable cash across the
    /// oversold ones, and submit a notional buy per surviving candidate.
    ///
    /// `InsufficientBudget` abandons the phase with no partial orders; any
    /// single order bouncing does not stop the rest.
    pub fn run_buy_phase(
        &mut self,
        as_of: NaiveDate,
        universe: &[String],
        data: &dyn MarketDataPort,
        venue: &mut dyn VenuePort,
    ) -> Result<PhaseReport, SwingtraderError> {
        let mut report = PhaseReport::default();
        let mut candidates = Vec::new();

        for symbol in universe {
            // Entries only from flat: held instruments and instruments being
            // closed this cycle are not buy candidates.
            if self.tracker.has_open_position(symbol) || self.tracker.has_pending_close(symbol) {
                continue;
            }

            let (value, price) = match self.evaluate_oscillator(symbol, as_of, data) {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(err) => {
                    report.failures.push(InstrumentFailure {
                        symbol: symbol.clone(),
                        error: err,
                    });
                    continue;
                }
            };

            let signal = classify(
                value,
                &self.config.thresholds,
                false,
                self.tracker.has_open_buy_order(symbol),
            );
            if signal != Signal::Buy {
                continue;
            }

            debug!(symbol, value, price, "buy candidate");
            candidates.push(BuyCandidate {
                symbol: symbol.clone(),
                price,
            });
        }

        if candidates.is_empty() {
            return Ok(report);
        }

        let cash = venue.available_cash()?;
        let plan = match allocate(
            candidates,
            cash,
            self.config.cash_reserve_fraction,
            self.config.decimal_places,
            self.config.ordering,
            &mut rand::thread_rng(),
        ) {
            Ok(plan) => plan,
            Err(err @ SwingtraderError::InsufficientBudget { .. }) => {
                warn!(%err, "buy phase abandoned");
                report.aborted = Some(err);
                return Ok(report);
            }
            Err(err) => return Err(err),
        };

        self.submit_plan(plan, venue, &mut report)?;
        Ok(report)
    }

    fn submit_plan(
        &mut self,
        plan: AllocationPlan,
        venue: &mut dyn VenuePort,
        report: &mut PhaseReport,
    ) -> Result<(), SwingtraderError> {
        for allocation in plan.allocations {
            let request = OrderRequest::notional_buy(
                &allocation.symbol,
                allocation.budget,
                crate::domain::order::OrderReason::Signal,
            );
            match venue.submit_order(request) {
                Ok(order) => {
                    info!(symbol = %allocation.symbol, budget = allocation.budget, "buy order submitted");
                    self.tracker.record_entry_order(order.clone());
                    report.submitted.push(order);
                }
                Err(err) if err.is_per_instrument() => {
                    warn!(symbol = %allocation.symbol, %err, "buy order failed");
                    report.failures.push(InstrumentFailure {
                        symbol: allocation.symbol,
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Fetch history through the evaluation point and compute the oscillator,
    /// returning the value together with the latest close (the current price
    /// from the cycle's point of view). `InsufficientData` is a Hold
    /// (Ok(None)), not a failure.
    fn evaluate_oscillator(
        &self,
        symbol: &str,
        as_of: NaiveDate,
        data: &dyn MarketDataPort,
    ) -> Result<Option<(f64, f64)>, SwingtraderError> {
        let series = data.fetch_prices(symbol, self.config.lookback_start(as_of), as_of)?;
        let closes = series.closes();
        match oscillator_value(symbol, &closes, self.config.oscillator_period) {
            Ok(value) => {
                // A non-error oscillator implies at least period + 1 closes.
                let price = closes[closes.len() - 1];
                Ok(Some((value, price)))
            }
            Err(SwingtraderError::InsufficientData { have, need, .. }) => {
                debug!(symbol, have, need, "not enough history, holding");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderKind, OrderReason, OrderSizing};
    use crate::domain::price_series::{PricePoint, PriceSeries};
    use crate::ports::venue_port::OrderFilter;
    use crate::domain::position::Position;
    use std::collections::HashMap;

    fn config() -> EngineConfig {
        EngineConfig {
            oscillator_period: 3,
            thresholds: Thresholds {
                upper: 70.0,
                lower: 30.0,
            },
            trail_percent: 5.0,
            cash_reserve_fraction: 0.10,
            decimal_places: 2,
            ordering: CandidateOrdering::DescendingPrice,
            lookback_days: 10,
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    struct MapDataPort {
        closes: HashMap<String, Vec<f64>>,
    }

    impl MapDataPort {
        fn new() -> Self {
            MapDataPort {
                closes: HashMap::new(),
            }
        }

        fn with_closes(mut self, symbol: &str, closes: Vec<f64>) -> Self {
            self.closes.insert(symbol.to_string(), closes);
            self
        }
    }

    impl MarketDataPort for MapDataPort {
        fn fetch_prices(
            &self,
            symbol: &str,
            _start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceSeries, SwingtraderError> {
            let closes = self.closes.get(symbol).ok_or_else(|| {
                SwingtraderError::DataUnavailable {
                    symbol: symbol.to_string(),
                    reason: "unknown symbol".into(),
                }
            })?;
            let points = closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint {
                    date: end - Duration::days((closes.len() - 1 - i) as i64),
                    close,
                })
                .collect();
            Ok(PriceSeries::new(symbol, points))
        }
    }

    /// Venue that acknowledges submissions as Pending and serves scripted
    /// positions, cash, and update events.
    struct StubVenue {
        next_id: u64,
        cash: f64,
        positions: Vec<Position>,
        updates: Vec<Order>,
        submitted: Vec<Order>,
        canceled: Vec<String>,
    }

    impl StubVenue {
        fn new(cash: f64) -> Self {
            StubVenue {
                next_id: 1,
                cash,
                positions: Vec::new(),
                updates: Vec::new(),
                submitted: Vec::new(),
                canceled: Vec::new(),
            }
        }
    }

    impl VenuePort for StubVenue {
        fn open_positions(&self) -> Result<Vec<Position>, SwingtraderError> {
            Ok(self.positions.clone())
        }

        fn open_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, SwingtraderError> {
            Ok(self
                .submitted
                .iter()
                .filter(|o| o.is_open() && filter.matches(o))
                .cloned()
                .collect())
        }

        fn available_cash(&self) -> Result<f64, SwingtraderError> {
            Ok(self.cash)
        }

        fn submit_order(&mut self, request: OrderRequest) -> Result<Order, SwingtraderError> {
            let order = Order {
                id: self.next_id.to_string(),
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
            self.next_id += 1;
            self.submitted.push(order.clone());
            Ok(order)
        }

        fn cancel_order(&mut self, order_id: &str) -> Result<(), SwingtraderError> {
            self.canceled.push(order_id.to_string());
            Ok(())
        }

        fn order_updates(&mut self) -> Result<Vec<Order>, SwingtraderError> {
            Ok(std::mem::take(&mut self.updates))
        }
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 - i as f64).collect()
    }

    #[test]
    fn sell_phase_closes_overbought_position() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new().with_closes("AAPL", rising(10));
        let mut venue = StubVenue::new(10_000.0);
        venue.positions.push(Position::new("AAPL", 10.0));

        let report = engine
            .run_cycle(as_of(), &[], &data, &mut venue)
            .unwrap();

        assert_eq!(report.sells.submitted.len(), 1);
        let close = &report.sells.submitted[0];
        assert_eq!(close.symbol, "AAPL");
        assert_eq!(close.side, OrderSide::Sell);
        assert_eq!(close.kind, OrderKind::Market);
        assert_eq!(close.sizing, OrderSizing::Quantity(10.0));
    }

    #[test]
    fn buy_phase_allocates_and_submits_notional_orders() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new()
            .with_closes("AAPL", falling(10))
            .with_closes("MSFT", falling(10));
        let mut venue = StubVenue::new(10_000.0);

        let universe = vec!["AAPL".to_string(), "MSFT".to_string()];
        let report = engine
            .run_cycle(as_of(), &universe, &data, &mut venue)
            .unwrap();

        assert_eq!(report.buys.submitted.len(), 2);
        for order in &report.buys.submitted {
            assert_eq!(order.kind, OrderKind::NotionalMarket);
            assert_eq!(order.reason, OrderReason::Signal);
            // 9000 spendable split two ways.
            assert_eq!(order.sizing, OrderSizing::Notional(4500.0));
        }
    }

    #[test]
    fn mid_band_produces_no_orders() {
        let mut engine = Engine::new(config());
        // One gain, one loss of equal size inside the window.
        let data = MapDataPort::new().with_closes("AAPL", vec![100.0, 101.0, 100.0, 101.0]);
        let mut venue = StubVenue::new(10_000.0);
        venue.positions.push(Position::new("AAPL", 5.0));

        let report = engine
            .run_cycle(as_of(), &["AAPL".to_string()], &data, &mut venue)
            .unwrap();

        assert_eq!(report.sells.submitted.len(), 0);
        assert_eq!(report.buys.submitted.len(), 0);
        // The open position still gets protective coverage.
        assert_eq!(report.stops.submitted.len(), 1);
    }

    #[test]
    fn insufficient_history_is_hold_not_failure() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new().with_closes("AAPL", vec![100.0, 99.0]);
        let mut venue = StubVenue::new(10_000.0);

        let report = engine
            .run_cycle(as_of(), &["AAPL".to_string()], &data, &mut venue)
            .unwrap();

        assert_eq!(report.orders_submitted(), 0);
        assert!(report.buys.failures.is_empty());
        assert!(report.buys.aborted.is_none());
    }

    #[test]
    fn unknown_symbol_is_recorded_and_others_proceed() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new().with_closes("MSFT", falling(10));
        let mut venue = StubVenue::new(10_000.0);

        let universe = vec!["GHOST".to_string(), "MSFT".to_string()];
        let report = engine
            .run_cycle(as_of(), &universe, &data, &mut venue)
            .unwrap();

        assert_eq!(report.buys.failures.len(), 1);
        assert_eq!(report.buys.failures[0].symbol, "GHOST");
        assert!(matches!(
            report.buys.failures[0].error,
            SwingtraderError::DataUnavailable { .. }
        ));
        assert_eq!(report.buys.submitted.len(), 1);
        assert_eq!(report.buys.submitted[0].symbol, "MSFT");
    }

    #[test]
    fn unaffordable_universe_abandons_buy_phase() {
        let mut engine = Engine::new(config());
        let mut closes = falling(10);
        for close in &mut closes {
            *close += 100_000.0; // every candidate dearer than the pool
        }
        let data = MapDataPort::new().with_closes("AAPL", closes);
        let mut venue = StubVenue::new(10_000.0);

        let report = engine
            .run_cycle(as_of(), &["AAPL".to_string()], &data, &mut venue)
            .unwrap();

        assert!(report.buys.submitted.is_empty());
        assert!(matches!(
            report.buys.aborted,
            Some(SwingtraderError::InsufficientBudget { .. })
        ));
    }

    #[test]
    fn second_cycle_against_unchanged_world_submits_nothing() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new()
            .with_closes("AAPL", rising(10))
            .with_closes("MSFT", falling(10));
        let mut venue = StubVenue::new(10_000.0);
        venue.positions.push(Position::new("AAPL", 10.0));

        let universe = vec!["MSFT".to_string()];
        let first = engine
            .run_cycle(as_of(), &universe, &data, &mut venue)
            .unwrap();
        assert!(first.orders_submitted() > 0);

        // No fills, no new bars, no cash change.
        let second = engine
            .run_cycle(as_of(), &universe, &data, &mut venue)
            .unwrap();
        assert_eq!(second.orders_submitted(), 0);
    }

    #[test]
    fn filled_buy_update_attaches_protective_stop() {
        let mut engine = Engine::new(config());
        let data = MapDataPort::new().with_closes("AAPL", vec![100.0, 101.0, 100.0, 101.0]);
        let mut venue = StubVenue::new(10_000.0);
        venue.positions.push(Position::new("AAPL", 10.0));
        venue.updates.push(Order {
            id: "99".into(),
            symbol: "AAPL".into(),
            side: OrderSide::Buy,
            kind: OrderKind::NotionalMarket,
            sizing: OrderSizing::Notional(1000.0),
            trail_percent: None,
            status: OrderStatus::Filled,
            reason: OrderReason::Signal,
            filled_quantity: 10.0,
            fill_price: Some(100.0),
        });

        let report = engine
            .run_cycle(as_of(), &[], &data, &mut venue)
            .unwrap();

        assert_eq!(report.updates_absorbed, 1);
        let stops: Vec<&Order> = venue
            .submitted
            .iter()
            .filter(|o| o.kind == OrderKind::TrailingStop)
            .collect();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].sizing, OrderSizing::Quantity(10.0));
        assert_eq!(stops[0].trail_percent, Some(5.0));
    }

    #[test]
    fn lookback_start_spans_period_plus_configured_days() {
        let config = config();
        let start = config.lookback_start(as_of());
        assert_eq!(start, as_of() - Duration::days(13));
    }
}
