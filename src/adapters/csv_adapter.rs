//! CSV loaders for the score table, the instrument mapping and holdings.
//!
//! Scores are published per country; they are joined to instruments through
//! the instrument → country mapping before they enter the signal store.

use crate::domain::error::RebalanceError;
use crate::domain::execution::{Order, OrderBatch};
use crate::domain::position::Position;
use crate::domain::score::{ScoreObservation, ScoreTable};
use crate::domain::universe::{Instrument, Universe};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

pub const DEFAULT_SCORE_COLUMN: &str = "s_valence";

#[derive(Debug, Deserialize)]
struct InstrumentRow {
    country: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct HoldingRow {
    symbol: String,
    market_value: f64,
    #[serde(default)]
    quantity: Option<f64>,
    #[serde(default)]
    liquidity: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OrderRow<'a> {
    symbol: &'a str,
    side: String,
    notional: f64,
    requested_notional: f64,
    liquidity_cap: f64,
    status: &'a str,
}

impl<'a> OrderRow<'a> {
    fn new(order: &'a Order, status: &'a str) -> Self {
        OrderRow {
            symbol: &order.symbol,
            side: order.side().to_string(),
            notional: order.notional,
            requested_notional: order.requested_notional,
            liquidity_cap: order.liquidity_cap,
            status,
        }
    }
}

/// Positions plus any per-symbol reference liquidity read from a holdings file.
#[derive(Debug, Clone, Default)]
pub struct Holdings {
    pub positions: Vec<Position>,
    pub liquidity: BTreeMap<String, f64>,
}

fn read(path: &Path) -> Result<String, RebalanceError> {
    fs::read_to_string(path)
        .map_err(|e| RebalanceError::data(format!("failed to read {}: {}", path.display(), e)))
}

pub fn parse_instruments(content: &str) -> Result<Universe, RebalanceError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut instruments = Vec::new();

    for result in rdr.deserialize() {
        let row: InstrumentRow =
            result.map_err(|e| RebalanceError::data(format!("instrument CSV error: {}", e)))?;
        instruments.push(Instrument::new(&row.symbol, &row.country));
    }

    Universe::from_instruments(instruments).map_err(|e| RebalanceError::data(e.to_string()))
}

pub fn load_instruments(path: &Path) -> Result<Universe, RebalanceError> {
    let universe = parse_instruments(&read(path)?)?;
    info!(instruments = universe.count(), path = %path.display(), "loaded instrument mapping");
    Ok(universe)
}

/// Parse a `date,country,<score_column>` table and join it to `universe`.
/// Rows for countries without an instrument are dropped.
pub fn parse_scores(
    content: &str,
    score_column: &str,
    universe: &Universe,
) -> Result<ScoreTable, RebalanceError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| RebalanceError::data(format!("score CSV header error: {}", e)))?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| RebalanceError::data(format!("missing {} column", name)))
    };
    let date_idx = column("date")?;
    let country_idx = column("country")?;
    let score_idx = column(score_column)?;

    let mut observations = Vec::new();
    let mut dropped = 0usize;

    for result in rdr.records() {
        let record =
            result.map_err(|e| RebalanceError::data(format!("score CSV parse error: {}", e)))?;

        let date_str = record.get(date_idx).unwrap_or_default().trim();
        let date = parse_score_date(date_str)?;
        let country = record.get(country_idx).unwrap_or_default().trim();
        let score: f64 = record
            .get(score_idx)
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|e| {
                RebalanceError::data(format!("invalid {} value for {}: {}", score_column, country, e))
            })?;

        let instruments = universe.instruments_in(country);
        if instruments.is_empty() {
            dropped += 1;
            continue;
        }
        for inst in instruments {
            observations.push(ScoreObservation {
                date,
                symbol: inst.symbol.clone(),
                alpha_score: score,
            });
        }
    }

    if dropped > 0 {
        debug!(dropped, "score rows without a matching instrument");
    }
    ScoreTable::from_observations(observations)
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_score_date(value: &str) -> Result<NaiveDate, RebalanceError> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| RebalanceError::data(format!("invalid date {:?}: {}", value, e)))
}

pub fn load_scores(
    path: &Path,
    score_column: &str,
    universe: &Universe,
) -> Result<ScoreTable, RebalanceError> {
    let table = parse_scores(&read(path)?, score_column, universe)?;
    info!(observations = table.len(), path = %path.display(), "loaded score table");
    Ok(table)
}

pub fn parse_holdings(content: &str) -> Result<Holdings, RebalanceError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut holdings = Holdings::default();
    let mut seen = BTreeSet::new();

    for result in rdr.deserialize() {
        let row: HoldingRow =
            result.map_err(|e| RebalanceError::data(format!("holdings CSV error: {}", e)))?;
        let symbol = row.symbol.trim().to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(RebalanceError::data(format!("duplicate holding for {symbol}")));
        }
        if let Some(liq) = row.liquidity {
            holdings.liquidity.insert(symbol.clone(), liq);
        }
        holdings.positions.push(Position::new(
            &symbol,
            row.quantity.unwrap_or(row.market_value),
            row.market_value,
        ));
    }

    Ok(holdings)
}

pub fn load_holdings(path: &Path) -> Result<Holdings, RebalanceError> {
    parse_holdings(&read(path)?)
}

/// Write a batch as CSV. Accepted orders carry `status`; rejected ones are
/// written as `rejected`.
pub fn write_orders<W: io::Write>(
    writer: W,
    batch: &OrderBatch,
    status: &str,
) -> Result<(), RebalanceError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for order in &batch.orders {
        wtr.serialize(OrderRow::new(order, status))
            .map_err(io::Error::from)?;
    }
    for rejected in &batch.rejected {
        wtr.serialize(OrderRow::new(&rejected.order, "rejected"))
            .map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_orders(path: &Path, batch: &OrderBatch, status: &str) -> Result<(), RebalanceError> {
    let file = fs::File::create(path)?;
    write_orders(file, batch, status)?;
    info!(orders = batch.orders.len(), path = %path.display(), "wrote order file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ETF_CSV: &str = "country,symbol\n\
        Brazil,EWZ\n\
        Japan,EWJ\n\
        Japan,DXJ\n";

    const SCORES_CSV: &str = "date,country,s_valence,s_arousal\n\
        2020-01-01,Brazil,0.25,0.1\n\
        2020-01-01,Japan,-0.5,0.2\n\
        2020-01-08,Brazil,0.75,0.3\n\
        2020-01-08,Narnia,9.0,0.0\n";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn instruments_parsed_into_universe() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        assert_eq!(universe.count(), 3);
        assert_eq!(universe.country_of("DXJ"), Some("Japan"));
    }

    #[test]
    fn scores_joined_by_country() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        let table = parse_scores(SCORES_CSV, DEFAULT_SCORE_COLUMN, &universe).unwrap();

        // Narnia has no instrument
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(d(2020, 1, 1), "EWJ"), Some(-0.5));
        assert_eq!(table.get(d(2020, 1, 1), "DXJ"), Some(-0.5));
        assert_eq!(table.get(d(2020, 1, 8), "EWZ"), Some(0.75));
    }

    #[test]
    fn alternative_score_column() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        let table = parse_scores(SCORES_CSV, "s_arousal", &universe).unwrap();
        assert_eq!(table.get(d(2020, 1, 8), "EWZ"), Some(0.3));
    }

    #[test]
    fn missing_score_column_is_data_error() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        let result = parse_scores(SCORES_CSV, "sentiment", &universe);
        assert!(matches!(result, Err(RebalanceError::Data { reason }) if reason.contains("sentiment")));
    }

    #[test]
    fn invalid_date_is_data_error() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        let result = parse_scores("date,country,s_valence\n01/02/2020,Brazil,0.1\n", "s_valence", &universe);
        assert!(result.is_err());
    }

    #[test]
    fn timestamp_dates_accepted() {
        let universe = parse_instruments(ETF_CSV).unwrap();
        let table = parse_scores(
            "date,country,s_valence\n2020-01-01 00:00:00,Brazil,0.1\n",
            "s_valence",
            &universe,
        )
        .unwrap();
        assert_eq!(table.get(d(2020, 1, 1), "EWZ"), Some(0.1));
    }

    #[test]
    fn holdings_with_optional_columns() {
        let holdings = parse_holdings(
            "symbol,market_value,quantity,liquidity\n\
             ewz,5000,150,\n\
             EWJ,-2000,-40,90000\n",
        )
        .unwrap();
        assert_eq!(holdings.positions.len(), 2);
        assert_eq!(holdings.positions[0].symbol, "EWZ");
        assert_eq!(holdings.positions[0].quantity, 150.0);
        assert_eq!(holdings.liquidity.get("EWJ"), Some(&90_000.0));
        assert!(!holdings.liquidity.contains_key("EWZ"));
    }

    #[test]
    fn duplicate_holding_is_data_error() {
        let result = parse_holdings("symbol,market_value
EWZ,1000
ewz,500
");
        assert!(matches!(result, Err(RebalanceError::Data { reason }) if reason.contains("EWZ")));
    }

    #[test]
    fn holdings_without_quantity_column() {
        let holdings = parse_holdings("symbol,market_value\nEWZ,1000\n").unwrap();
        assert_eq!(holdings.positions[0].quantity, 1000.0);
    }

    #[test]
    fn load_from_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("etf.csv"), ETF_CSV).unwrap();
        fs::write(dir.path().join("scores.csv"), SCORES_CSV).unwrap();

        let universe = load_instruments(&dir.path().join("etf.csv")).unwrap();
        let table = load_scores(&dir.path().join("scores.csv"), "s_valence", &universe).unwrap();
        assert_eq!(table.date_range(), Some((d(2020, 1, 1), d(2020, 1, 8))));
    }

    #[test]
    fn orders_written_with_status() {
        let order = |symbol: &str, notional: f64| Order {
            symbol: symbol.to_string(),
            notional,
            requested_notional: notional,
            liquidity_cap: 1_000.0,
        };
        let batch = OrderBatch {
            orders: vec![order("EWZ", -500.0)],
            shortfalls: vec![],
            rejected: vec![crate::domain::execution::RejectedOrder {
                order: order("EWJ", 250.0),
                reason: "halted".to_string(),
            }],
        };

        let mut out = Vec::new();
        write_orders(&mut out, &batch, "submitted").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "symbol,side,notional,requested_notional,liquidity_cap,status"
        );
        assert_eq!(lines[1], "EWZ,SELL,-500.0,-500.0,1000.0,submitted");
        assert_eq!(lines[2], "EWJ,BUY,250.0,250.0,1000.0,rejected");
    }

    #[test]
    fn missing_file_is_data_error() {
        let result = load_instruments(Path::new("/nonexistent/etf.csv"));
        assert!(matches!(result, Err(RebalanceError::Data { .. })));
    }
}
