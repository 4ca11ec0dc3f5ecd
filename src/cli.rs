//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{self, DEFAULT_SCORE_COLUMN};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::config_validation::{
    parse_date, parse_weekday, validate_data_config, validate_replay_config,
    validate_strategy_config,
};
use crate::domain::constraints::Constraints;
use crate::domain::error::RebalanceError;
use crate::domain::execution::{Order, Shortfall};
use crate::domain::exposure::{ranked_country_exposure, ExposureSummary};
use crate::domain::portfolio::{AccountState, Weights};
use crate::domain::rebalance::{RebalanceOutcome, RebalanceReport, Rebalancer, ReplayConfig};
use crate::domain::score::ScoreTable;
use crate::domain::universe::{parse_symbols, Universe};
use crate::ports::brokerage_port::BrokeragePort;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(
    name = "sentiment-rebalancer",
    about = "Sentiment-driven country ETF rebalancer"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one rebalance against a holdings file
    Rebalance {
        #[arg(short, long)]
        config: PathBuf,
        /// CSV with symbol,market_value[,quantity][,liquidity]
        #[arg(long)]
        holdings: Option<PathBuf>,
        #[arg(long, default_value_t = 0.0)]
        cash: f64,
        /// Rebalance date (YYYY-MM-DD), defaults to the last score date
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated symbols to restrict the universe to
        #[arg(long)]
        symbols: Option<String>,
        /// Write the order batch as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Replay weekly rebalances over the configured date range
    Replay {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Locations of the score and instrument tables.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub scores_path: PathBuf,
    pub instruments_path: PathBuf,
    pub score_column: String,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Rebalance {
            config,
            holdings,
            cash,
            date,
            symbols,
            output,
            dry_run,
        } => run_rebalance(
            &config,
            holdings.as_deref(),
            cash,
            date.as_deref(),
            symbols.as_deref(),
            output.as_deref(),
            dry_run,
        ),
        Command::Replay { config, symbols } => run_replay(&config, symbols.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &RebalanceError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_constraints(config: &dyn ConfigPort) -> Result<Constraints, RebalanceError> {
    let constraints = Constraints::from_config(config);
    constraints.validate()?;
    Ok(constraints)
}

pub fn lookback_days(config: &dyn ConfigPort) -> u32 {
    u32::try_from(config.get_int("strategy", "lookback_days", 7)).unwrap_or(7)
}

pub fn build_data_config(config: &dyn ConfigPort) -> Result<DataConfig, RebalanceError> {
    let required = |key: &str| {
        config
            .get_string("data", key)
            .filter(|s| !s.trim().is_empty())
            .map(|s| PathBuf::from(s.trim()))
            .ok_or_else(|| RebalanceError::ConfigMissing {
                section: "data".into(),
                key: key.into(),
            })
    };

    Ok(DataConfig {
        scores_path: required("scores_path")?,
        instruments_path: required("instruments_path")?,
        score_column: config
            .get_string("data", "score_column")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SCORE_COLUMN.to_string()),
    })
}

pub fn build_replay_config(config: &dyn ConfigPort) -> Result<ReplayConfig, RebalanceError> {
    Ok(ReplayConfig {
        start_date: parse_date(config.get_string("replay", "start_date").as_deref(), "start_date")?,
        end_date: parse_date(config.get_string("replay", "end_date").as_deref(), "end_date")?,
        initial_capital: config.get_double("replay", "initial_capital", 100_000.0),
        weekday: parse_weekday(config.get_string("replay", "weekday").as_deref())?,
    })
}

/// Load the instrument mapping and score table, optionally restricted to
/// a comma-separated symbol list.
pub fn load_market_data(
    data: &DataConfig,
    symbols: Option<&str>,
) -> Result<(Universe, ScoreTable), RebalanceError> {
    let mut universe = csv_adapter::load_instruments(&data.instruments_path)?;
    if let Some(list) = symbols {
        let wanted = parse_symbols(list).map_err(|e| RebalanceError::data(e.to_string()))?;
        universe = universe.restrict(&wanted)?;
    }
    let table = csv_adapter::load_scores(&data.scores_path, &data.score_column, &universe)?;
    Ok((universe, table))
}

/// Seed a paper account from a holdings file plus cash.
pub fn paper_account(
    holdings_path: Option<&Path>,
    cash: f64,
    universe: &Universe,
) -> Result<PaperBroker, RebalanceError> {
    let mut broker = PaperBroker::new(cash).with_universe(universe.clone());
    if let Some(path) = holdings_path {
        let holdings = csv_adapter::load_holdings(path)?;
        for position in holdings.positions {
            broker = broker.with_position(position);
        }
        for (symbol, liquidity) in &holdings.liquidity {
            broker = broker.with_liquidity(symbol, *liquidity);
        }
    }
    Ok(broker)
}

fn load_validated(config_path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_strategy_config(&adapter).map_err(|e| fail(&e))?;
    validate_data_config(&adapter).map_err(|e| fail(&e))?;
    Ok(adapter)
}

fn run_rebalance(
    config_path: &Path,
    holdings_path: Option<&Path>,
    cash: f64,
    date: Option<&str>,
    symbols: Option<&str>,
    output_path: Option<&Path>,
    dry_run: bool,
) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = rebalance_once(
        &adapter,
        holdings_path,
        cash,
        date,
        symbols,
        output_path,
        dry_run,
    );
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn rebalance_once(
    config: &dyn ConfigPort,
    holdings_path: Option<&Path>,
    cash: f64,
    date: Option<&str>,
    symbols: Option<&str>,
    output_path: Option<&Path>,
    dry_run: bool,
) -> Result<(), RebalanceError> {
    let data = build_data_config(config)?;
    let constraints = build_constraints(config)?;
    let (universe, table) = load_market_data(&data, symbols)?;

    let as_of = match date {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            RebalanceError::data(format!("invalid --date {s:?}, expected YYYY-MM-DD"))
        })?,
        None => table
            .date_range()
            .map(|(_, last)| last)
            .ok_or_else(|| RebalanceError::InsufficientData {
                reason: "score table is empty".into(),
            })?,
    };

    let mut broker = paper_account(holdings_path, cash, &universe)?;
    let rebalancer = Rebalancer::new(constraints, universe, lookback_days(config));

    eprintln!(
        "Rebalancing {} instruments as of {} (portfolio value {:.2})",
        rebalancer.engine().universe().count(),
        as_of,
        broker.portfolio_value()?
    );

    let report = if dry_run {
        rebalancer.plan(as_of, &table, &broker)?
    } else {
        rebalancer.rebalance(as_of, &table, &mut broker)?
    };
    let batch = match report.outcome {
        RebalanceOutcome::Executed { targets, batch, .. }
        | RebalanceOutcome::Planned { targets, batch, .. } => {
            print_targets(targets.as_map(), rebalancer.engine().universe());
            batch
        }
        RebalanceOutcome::Skipped { reason } | RebalanceOutcome::Aborted { reason } => {
            eprintln!("\nNo orders: {reason}");
            return Ok(());
        }
    };

    print_orders(&batch.orders, &batch.shortfalls);
    for rejected in &batch.rejected {
        eprintln!("  rejected {}: {}", rejected.order.symbol, rejected.reason);
    }

    if let Some(path) = output_path {
        let status = if dry_run { "planned" } else { "submitted" };
        csv_adapter::save_orders(path, &batch, status)?;
        eprintln!("\nOrders written to: {}", path.display());
    }
    Ok(())
}

fn run_replay(config_path: &Path, symbols: Option<&str>) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_replay_config(&adapter) {
        return fail(&e);
    }

    match replay(&adapter, symbols) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn replay(config: &dyn ConfigPort, symbols: Option<&str>) -> Result<(), RebalanceError> {
    let data = build_data_config(config)?;
    let replay_config = build_replay_config(config)?;
    let constraints = build_constraints(config)?;
    let (universe, table) = load_market_data(&data, symbols)?;

    let dates = replay_config.dates();
    eprintln!(
        "Replaying {} rebalances from {} to {}",
        dates.len(),
        replay_config.start_date,
        replay_config.end_date
    );

    let mut broker =
        PaperBroker::new(replay_config.initial_capital).with_universe(universe.clone());
    let rebalancer = Rebalancer::new(constraints, universe, lookback_days(config));
    let reports = rebalancer.replay(&dates, &table, &mut broker)?;

    eprintln!("\n=== Rebalances ===");
    for report in &reports {
        print_report_line(report);
    }

    let final_state = AccountState::snapshot(&broker, rebalancer.engine().universe())?;
    let exposure = ExposureSummary::from_weights(&final_state.weights);
    let total_traded: f64 = reports
        .iter()
        .filter_map(|r| match &r.outcome {
            RebalanceOutcome::Executed { batch, .. } => Some(batch.total_traded()),
            _ => None,
        })
        .sum();

    eprintln!("\n=== Summary ===");
    eprintln!("Final Value:      {:.2}", final_state.portfolio_value);
    eprintln!("Total Traded:     {:.2}", total_traded);
    eprintln!("Gross Exposure:   {:.2}%", exposure.gross * 100.0);
    eprintln!("Net Exposure:     {:.2}%", exposure.net * 100.0);

    print_country_exposure(&final_state.weights, rebalancer.engine().universe());
    Ok(())
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_validated(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let constraints = Constraints::from_config(&adapter);
    eprintln!("\nConstraints:");
    eprintln!("  turnover_cap:        {}", constraints.turnover_cap);
    eprintln!("  max_weight:          {}", constraints.max_weight);
    eprintln!("  long_short:          {}", constraints.long_short);
    eprintln!("  gross_exposure:      {}", constraints.gross_exposure);
    eprintln!("  liquidity_tolerance: {}", constraints.liquidity_tolerance);
    eprintln!("  lookback_days:       {}", lookback_days(&adapter));

    if adapter.get_string("replay", "start_date").is_some() {
        if let Err(e) = validate_replay_config(&adapter) {
            return fail(&e);
        }
        eprintln!("\nReplay section is valid.");
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn print_targets(weights: &Weights, universe: &Universe) {
    let exposure = ExposureSummary::from_weights(weights);
    eprintln!(
        "\nTarget exposure: gross {:.2}%, net {:.2}%",
        exposure.gross * 100.0,
        exposure.net * 100.0
    );
    print_country_exposure(weights, universe);
}

fn print_country_exposure(weights: &Weights, universe: &Universe) {
    let ranked = ranked_country_exposure(weights, universe);
    if ranked.is_empty() {
        return;
    }
    eprintln!("\n=== Country Exposure ===");
    for (country, weight) in ranked {
        eprintln!("  {:<20} {:>8.3}%", country, weight * 100.0);
    }
}

fn print_orders(orders: &[Order], shortfalls: &[Shortfall]) {
    eprintln!("\n=== Orders ===");
    if orders.is_empty() {
        eprintln!("  none");
    }
    for order in orders {
        let note = if order.is_truncated() { " (capped)" } else { "" };
        eprintln!(
            "  {:<4} {:<8} {:>14.2}{}",
            order.side(),
            order.symbol,
            order.notional.abs(),
            note
        );
    }
    if !shortfalls.is_empty() {
        eprintln!("\n=== Shortfalls ===");
        for shortfall in shortfalls {
            eprintln!("  {:<8} {:>14.2}", shortfall.symbol, shortfall.notional);
        }
    }
}

fn print_report_line(report: &RebalanceReport) {
    match &report.outcome {
        RebalanceOutcome::Executed { batch, exposure, .. }
        | RebalanceOutcome::Planned { batch, exposure, .. } => eprintln!(
            "  {}  value {:>14.2}  {} orders, traded {:.2}, shortfall {:.2}, gross {:.1}%",
            report.as_of,
            report.portfolio_value,
            batch.orders.len(),
            batch.total_traded(),
            batch.total_shortfall(),
            exposure.gross * 100.0
        ),
        RebalanceOutcome::Skipped { reason } => {
            eprintln!("  {}  skipped: {}", report.as_of, reason)
        }
        RebalanceOutcome::Aborted { reason } => {
            eprintln!("  {}  aborted: {}", report.as_of, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn data_config_defaults_score_column() {
        let cfg = config("[data]\nscores_path = s.csv\ninstruments_path = e.csv\n");
        let data = build_data_config(&cfg).unwrap();
        assert_eq!(data.scores_path, PathBuf::from("s.csv"));
        assert_eq!(data.score_column, "s_valence");
    }

    #[test]
    fn data_config_requires_paths() {
        let err = build_data_config(&config("[data]\n")).unwrap_err();
        assert!(matches!(err, RebalanceError::ConfigMissing { key, .. } if key == "scores_path"));
    }

    #[test]
    fn lookback_falls_back_on_negative() {
        assert_eq!(lookback_days(&config("[strategy]\nlookback_days = -3\n")), 7);
        assert_eq!(lookback_days(&config("[strategy]\nlookback_days = 14\n")), 14);
    }

    #[test]
    fn cli_parses_rebalance() {
        let cli = Cli::try_parse_from([
            "sentiment-rebalancer",
            "rebalance",
            "-c",
            "cfg.ini",
            "--cash",
            "5000",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Command::Rebalance { cash, dry_run, .. } => {
                assert_eq!(cash, 5000.0);
                assert!(dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
