//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_data_adapter::CsvDataAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sim_venue_adapter::SimVenueAdapter;
use crate::domain::allocation::CandidateOrdering;
use crate::domain::backtest::{run_backtest, BacktestConfig};
use crate::domain::config_validation::{validate_backtest_config, validate_engine_config};
use crate::domain::cycle::{Engine, EngineConfig};
use crate::domain::error::SwingtraderError;
use crate::domain::oscillator::oscillator_value;
use crate::domain::signal::Thresholds;
use crate::domain::universe::{parse_symbols, validate_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "swingtrader", about = "Oscillator-driven swing trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest over historical bars
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Override the data directory from the config file
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Override the symbol universe, comma-separated
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print oscillator values and signal bands for the universe
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluation date, defaults to the configured end_date
        #[arg(long)]
        date: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbols,
        } => run_backtest_command(&config, data_dir.as_ref(), symbols.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Signals { config, date } => run_signals(&config, date.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SwingtraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

pub fn build_engine_config(adapter: &dyn ConfigPort) -> Result<EngineConfig, SwingtraderError> {
    let ordering_str = adapter.get_string("allocation", "ordering").ok_or_else(|| {
        SwingtraderError::ConfigMissing {
            section: "allocation".into(),
            key: "ordering".into(),
        }
    })?;
    let ordering = CandidateOrdering::parse(&ordering_str).ok_or_else(|| {
        SwingtraderError::ConfigInvalid {
            section: "allocation".into(),
            key: "ordering".into(),
            reason: format!("unknown ordering '{ordering_str}'"),
        }
    })?;

    Ok(EngineConfig {
        oscillator_period: adapter.get_int("engine", "oscillator_period", 14) as usize,
        thresholds: Thresholds {
            upper: adapter.get_double("engine", "upper_threshold", 70.0),
            lower: adapter.get_double("engine", "lower_threshold", 30.0),
        },
        trail_percent: adapter.get_double("engine", "trail_percent", 5.0),
        cash_reserve_fraction: adapter.get_double("allocation", "cash_reserve_fraction", 0.10),
        decimal_places: adapter.get_int("allocation", "fractional_decimal_places", 2) as u32,
        ordering,
        lookback_days: adapter.get_int("engine", "lookback_days", 100),
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, SwingtraderError> {
    let start_str = adapter.get_string("backtest", "start_date").ok_or_else(|| {
        SwingtraderError::ConfigMissing {
            section: "backtest".into(),
            key: "start_date".into(),
        }
    })?;
    let end_str = adapter.get_string("backtest", "end_date").ok_or_else(|| {
        SwingtraderError::ConfigMissing {
            section: "backtest".into(),
            key: "end_date".into(),
        }
    })?;

    let start_date = chrono::NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
        SwingtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "start_date".into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })?;
    let end_date = chrono::NaiveDate::parse_from_str(&end_str, "%Y-%m-%d").map_err(|_| {
        SwingtraderError::ConfigInvalid {
            section: "backtest".into(),
            key: "end_date".into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })?;

    Ok(BacktestConfig {
        start_date,
        end_date,
        initial_capital: adapter.get_double("backtest", "initial_capital", 100_000.0),
    })
}

fn resolve_symbols(symbols_override: Option<&str>, config: &dyn ConfigPort) -> Vec<String> {
    match symbols_override {
        Some(raw) => parse_symbols(raw),
        None => config
            .get_string("backtest", "symbols")
            .map(|raw| parse_symbols(&raw))
            .unwrap_or_default(),
    }
}

fn resolve_data_dir(
    data_dir_override: Option<&PathBuf>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, SwingtraderError> {
    if let Some(dir) = data_dir_override {
        return Ok(dir.clone());
    }
    config
        .get_string("backtest", "data_dir")
        .map(PathBuf::from)
        .ok_or_else(|| SwingtraderError::ConfigMissing {
            section: "backtest".into(),
            key: "data_dir".into(),
        })
}

fn run_backtest_command(
    config_path: &PathBuf,
    data_dir_override: Option<&PathBuf>,
    symbols_override: Option<&str>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_engine_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    // Stage 2: Build configs
    let engine_config = match build_engine_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Resolve universe and data directory
    let symbols = resolve_symbols(symbols_override, &adapter);
    if symbols.is_empty() {
        eprintln!("error: no symbols configured");
        return ExitCode::from(2);
    }
    let data_dir = match resolve_data_dir(data_dir_override, &adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data = CsvDataAdapter::new(&data_dir);

    // Stage 4: Validate universe
    eprintln!("Validating {} symbols...", symbols.len());
    let min_bars = engine_config.oscillator_period + 1;
    let (universe, skipped) = match validate_universe(&symbols, &bt_config, min_bars, &data) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    for (symbol, reason) in &skipped {
        eprintln!("warning: skipping {symbol} ({reason})");
    }
    if universe.is_empty() {
        eprintln!("error: no valid symbols with data to backtest");
        return ExitCode::from(5);
    }

    // Stage 5: Run
    eprintln!(
        "Running backtest: {} symbols, {} to {}",
        universe.len(),
        bt_config.start_date,
        bt_config.end_date,
    );
    let mut venue = SimVenueAdapter::new(bt_config.initial_capital);
    let mut engine = Engine::new(engine_config);
    let result = match run_backtest(&mut engine, &universe, &bt_config, &data, &mut venue) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 6: Print summary
    let total_return =
        (result.final_equity - bt_config.initial_capital) / bt_config.initial_capital;
    eprintln!("\n=== Results ===");
    eprintln!("Bars Processed:   {}", result.bars_processed);
    eprintln!("Sell Orders:      {}", result.sell_orders);
    eprintln!("Stop Orders:      {}", result.stop_orders);
    eprintln!("Buy Orders:       {}", result.buy_orders);
    eprintln!("Trades Closed:    {}", result.closed_trades);
    eprintln!("Failures:         {}", result.instrument_failures);
    eprintln!("Final Cash:       ${:.2}", result.final_cash);
    eprintln!("Final Equity:     ${:.2}", result.final_equity);
    eprintln!("Total Return:     {:.2}%", total_return * 100.0);
    if !result.open_symbols.is_empty() {
        eprintln!("Open Positions:   {}", result.open_symbols.join(", "));
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_engine_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("Configuration is valid");
    ExitCode::SUCCESS
}

fn run_signals(config_path: &PathBuf, date_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_engine_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    if let Err(e) = validate_backtest_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    let engine_config = match build_engine_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let as_of = match date_override {
        Some(s) => match chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                eprintln!("error: invalid date '{s}' (expected YYYY-MM-DD)");
                return ExitCode::from(2);
            }
        },
        None => bt_config.end_date,
    };

    let symbols = resolve_symbols(None, &adapter);
    if symbols.is_empty() {
        eprintln!("error: no symbols configured");
        return ExitCode::from(2);
    }
    let data_dir = match resolve_data_dir(None, &adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let data = CsvDataAdapter::new(&data_dir);

    eprintln!("Signals as of {as_of}:");
    for symbol in &symbols {
        let series = match data.fetch_prices(symbol, engine_config.lookback_start(as_of), as_of) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("  {symbol}: {e}");
                continue;
            }
        };
        match oscillator_value(symbol, &series.closes(), engine_config.oscillator_period) {
            Ok(value) => {
                let band = if value > engine_config.thresholds.upper {
                    "overbought"
                } else if value < engine_config.thresholds.lower {
                    "oversold"
                } else {
                    "neutral"
                };
                println!("{symbol}: {value:.2} ({band})");
            }
            Err(e) => eprintln!("  {symbol}: {e}"),
        }
    }
    ExitCode::SUCCESS
}
