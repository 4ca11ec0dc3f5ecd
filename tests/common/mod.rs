#![allow(dead_code)]

use chrono::NaiveDate;
use sentiment_rebalancer::domain::constraints::Constraints;
use sentiment_rebalancer::domain::error::RebalanceError;
use sentiment_rebalancer::domain::execution::Order;
use sentiment_rebalancer::domain::portfolio::Weights;
use sentiment_rebalancer::domain::position::Position;
use sentiment_rebalancer::domain::score::{ScoreObservation, ScoreTable, Scores};
use sentiment_rebalancer::domain::universe::{Instrument, Universe};
use sentiment_rebalancer::ports::brokerage_port::BrokeragePort;
use std::collections::{BTreeMap, HashSet};

/// Brokerage fake that books fills at notional and records every order it
/// was asked to submit, including the ones it rejected.
pub struct RecordingBroker {
    pub cash: f64,
    pub positions: BTreeMap<String, f64>,
    pub liquidity: BTreeMap<String, f64>,
    pub reject: HashSet<String>,
    pub submitted: Vec<Order>,
}

impl RecordingBroker {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            positions: BTreeMap::new(),
            liquidity: BTreeMap::new(),
            reject: HashSet::new(),
            submitted: Vec::new(),
        }
    }

    pub fn with_holding(mut self, symbol: &str, market_value: f64) -> Self {
        self.positions.insert(symbol.to_string(), market_value);
        self.cash -= market_value;
        self
    }

    pub fn with_liquidity(mut self, symbol: &str, liquidity: f64) -> Self {
        self.liquidity.insert(symbol.to_string(), liquidity);
        self
    }

    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.reject.insert(symbol.to_string());
        self
    }

    pub fn holding(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).copied().unwrap_or(0.0)
    }
}

impl BrokeragePort for RecordingBroker {
    fn current_positions(&self) -> Result<Vec<Position>, RebalanceError> {
        Ok(self
            .positions
            .iter()
            .map(|(s, mv)| Position::new(s, *mv, *mv))
            .collect())
    }

    fn portfolio_value(&self) -> Result<f64, RebalanceError> {
        Ok(self.cash + self.positions.values().sum::<f64>())
    }

    fn submit_order(&mut self, order: &Order) -> Result<(), RebalanceError> {
        self.submitted.push(order.clone());
        if self.reject.contains(&order.symbol) {
            return Err(RebalanceError::OrderRejected {
                symbol: order.symbol.clone(),
                reason: "trading halted".to_string(),
            });
        }
        *self.positions.entry(order.symbol.clone()).or_insert(0.0) += order.notional;
        self.cash -= order.notional;
        Ok(())
    }

    fn reference_liquidity(&self, symbol: &str) -> Option<f64> {
        self.liquidity.get(symbol).copied()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One instrument per symbol, country named after the symbol.
pub fn universe(symbols: &[&str]) -> Universe {
    Universe::from_instruments(
        symbols
            .iter()
            .map(|s| Instrument::new(s, &format!("Country {s}")))
            .collect(),
    )
    .unwrap()
}

pub fn constraints(
    turnover_cap: f64,
    max_weight: f64,
    long_short: bool,
    liquidity_tolerance: f64,
) -> Constraints {
    Constraints {
        turnover_cap,
        max_weight,
        long_short,
        liquidity_tolerance,
        gross_exposure: 1.0,
    }
}

pub fn scores(pairs: &[(&str, f64)]) -> Scores {
    pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
}

pub fn weights(pairs: &[(&str, f64)]) -> Weights {
    pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
}

/// The same scores published on every date in `dates`.
pub fn score_table(dates: &[NaiveDate], pairs: &[(&str, f64)]) -> ScoreTable {
    let observations = dates.iter().flat_map(|d| {
        pairs.iter().map(move |(s, v)| ScoreObservation {
            date: *d,
            symbol: s.to_string(),
            alpha_score: *v,
        })
    });
    ScoreTable::from_observations(observations).unwrap()
}

pub const ETF_CSV: &str = "country,symbol\n\
    Brazil,EWZ\n\
    Japan,EWJ\n\
    Germany,EWG\n\
    India,INDA\n";

/// Weekly scores for January 2017 plus one row for a country with no ETF.
pub const SCORES_CSV: &str = "date,country,s_valence\n\
    2017-01-02,Brazil,0.8\n\
    2017-01-02,Japan,0.1\n\
    2017-01-02,Germany,-0.4\n\
    2017-01-02,India,0.3\n\
    2017-01-09,Brazil,0.6\n\
    2017-01-09,Japan,0.2\n\
    2017-01-09,Germany,-0.5\n\
    2017-01-09,India,0.4\n\
    2017-01-16,Brazil,0.2\n\
    2017-01-16,Japan,0.7\n\
    2017-01-16,Germany,-0.1\n\
    2017-01-16,India,0.5\n\
    2017-01-23,Brazil,-0.3\n\
    2017-01-23,Japan,0.9\n\
    2017-01-23,Germany,0.2\n\
    2017-01-23,India,0.1\n\
    2017-01-23,Atlantis,5.0\n";
