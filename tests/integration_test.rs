//! End-to-end backtests through the full adapter stack: CSV bars in, the
//! evaluation engine in the middle, a simulated venue filling orders.

mod common;

use common::{date, engine_config, write_series};
use tempfile::TempDir;

use swingtrader::adapters::csv_data_adapter::CsvDataAdapter;
use swingtrader::adapters::sim_venue_adapter::SimVenueAdapter;
use swingtrader::domain::backtest::{run_backtest, BacktestConfig};
use swingtrader::domain::cycle::Engine;
use swingtrader::domain::order::{OrderKind, OrderSizing};
use swingtrader::ports::venue_port::{OrderFilter, VenuePort};

fn bt_config(start_day: u32, end_day: u32) -> BacktestConfig {
    BacktestConfig {
        start_date: date(start_day),
        end_date: date(end_day),
        initial_capital: 10_000.0,
    }
}

#[test]
fn oversold_symbol_is_bought_and_protected() {
    let dir = TempDir::new().unwrap();
    // Steady decline keeps the oscillator pinned at 0, well below the band.
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[100.0, 99.0, 98.0, 97.0, 96.0, 95.0],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(70.0, 30.0));

    let result = run_backtest(
        &mut engine,
        &["AAA".to_string()],
        &bt_config(5, 6),
        &data,
        &mut venue,
    )
    .unwrap();

    // Bought on the first bar, filled on the second, stop attached same cycle.
    assert_eq!(result.bars_processed, 2);
    assert_eq!(result.buy_orders, 1);
    assert_eq!(result.stop_orders, 1);
    assert_eq!(result.sell_orders, 0);
    assert_eq!(result.open_symbols, vec!["AAA"]);

    // 9000 spent at the day-6 close of 95; equity is cash plus the position
    // marked at that same close.
    assert!((result.final_cash - 1_000.0).abs() < 1e-6);
    assert!((result.final_equity - 10_000.0).abs() < 1e-6);

    let stops = venue
        .open_orders(&OrderFilter::for_symbol("AAA"))
        .unwrap()
        .into_iter()
        .filter(|o| o.kind == OrderKind::TrailingStop)
        .collect::<Vec<_>>();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].trail_percent, Some(5.0));
}

#[test]
fn full_round_trip_buy_then_overbought_sell() {
    let dir = TempDir::new().unwrap();
    // Decline into the buy, then a rally that pushes the oscillator above 70.
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[
            100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 97.0, 99.0, 101.0, 103.0, 105.0, 107.0, 109.0,
            111.0,
        ],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(70.0, 30.0));

    let result = run_backtest(
        &mut engine,
        &["AAA".to_string()],
        &bt_config(5, 14),
        &data,
        &mut venue,
    )
    .unwrap();

    assert_eq!(result.buy_orders, 1);
    assert_eq!(result.stop_orders, 1);
    assert_eq!(result.sell_orders, 1);
    assert_eq!(result.closed_trades, 1);
    assert!(result.open_symbols.is_empty());

    // Entry filled at 95, exit at 101 on the bar after the sell signal.
    let expected = 1_000.0 + (9_000.0 / 95.0) * 101.0;
    assert!((result.final_cash - expected).abs() < 1e-6);
    assert!((result.final_equity - result.final_cash).abs() < 1e-9);
    assert!(result.final_equity > 10_000.0);

    // The protective stop was canceled ahead of the close; nothing remains.
    assert!(venue.open_orders(&OrderFilter::default()).unwrap().is_empty());
    assert!(venue.open_positions().unwrap().is_empty());
}

#[test]
fn trailing_stop_exits_on_drawdown_without_a_sell_signal() {
    let dir = TempDir::new().unwrap();
    // Decline, entry, spike to 110, then a drop through the trailed level.
    // The upper band is set high enough that the spike never reads as a sell.
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[100.0, 99.0, 98.0, 97.0, 96.0, 95.0, 110.0, 100.0],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(95.0, 30.0));

    let result = run_backtest(
        &mut engine,
        &["AAA".to_string()],
        &bt_config(5, 8),
        &data,
        &mut venue,
    )
    .unwrap();

    assert_eq!(result.buy_orders, 1);
    assert_eq!(result.stop_orders, 1);
    assert_eq!(result.sell_orders, 0);
    assert_eq!(result.closed_trades, 1);
    assert!(result.open_symbols.is_empty());

    // Stop ratcheted to the 110 high, triggered at 100 (below 104.5).
    let expected = 1_000.0 + (9_000.0 / 95.0) * 100.0;
    assert!((result.final_cash - expected).abs() < 1e-6);
    assert!(venue.open_positions().unwrap().is_empty());
}

#[test]
fn capital_splits_evenly_after_dropping_unaffordable_candidate() {
    let dir = TempDir::new().unwrap();
    // All three oversold; A at 5000 cannot fit an even share of 9000/3.
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[5004.0, 5003.0, 5002.0, 5001.0, 5000.0],
    );
    write_series(
        dir.path(),
        "BBB",
        date(1),
        &[2004.0, 2003.0, 2002.0, 2001.0, 2000.0],
    );
    write_series(
        dir.path(),
        "CCC",
        date(1),
        &[1004.0, 1003.0, 1002.0, 1001.0, 1000.0],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(70.0, 30.0));

    let universe = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
    let result = run_backtest(&mut engine, &universe, &bt_config(5, 5), &data, &mut venue).unwrap();

    assert_eq!(result.buy_orders, 2);

    let mut orders = venue.open_orders(&OrderFilter::default()).unwrap();
    orders.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].symbol, "BBB");
    assert_eq!(orders[1].symbol, "CCC");
    for order in &orders {
        assert_eq!(order.sizing, OrderSizing::Notional(4_500.0));
    }
}

#[test]
fn repeated_cycle_at_same_bar_submits_nothing_new() {
    let dir = TempDir::new().unwrap();
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[100.0, 99.0, 98.0, 97.0, 96.0],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(70.0, 30.0));

    let universe = vec!["AAA".to_string()];
    let first = engine
        .run_cycle(date(5), &universe, &data, &mut venue)
        .unwrap();
    assert_eq!(first.buys.submitted.len(), 1);

    // Same bar, no fills in between: the pending entry blocks a second buy.
    let second = engine
        .run_cycle(date(5), &universe, &data, &mut venue)
        .unwrap();
    assert_eq!(second.orders_submitted(), 0);
    assert_eq!(venue.open_orders(&OrderFilter::default()).unwrap().len(), 1);
}

#[test]
fn symbol_without_data_fails_alone_and_the_rest_trade() {
    let dir = TempDir::new().unwrap();
    write_series(
        dir.path(),
        "AAA",
        date(1),
        &[100.0, 99.0, 98.0, 97.0, 96.0, 95.0],
    );
    let data = CsvDataAdapter::new(dir.path());
    let mut venue = SimVenueAdapter::new(10_000.0);
    let mut engine = Engine::new(engine_config(70.0, 30.0));

    let universe = vec!["AAA".to_string(), "GHOST".to_string()];
    let result = run_backtest(&mut engine, &universe, &bt_config(5, 6), &data, &mut venue).unwrap();

    // GHOST fails once per bar; AAA trades normally.
    assert_eq!(result.instrument_failures, 2);
    assert_eq!(result.buy_orders, 1);
    assert_eq!(result.open_symbols, vec!["AAA"]);
}
