//! Account snapshots and weight vectors.
//!
//! `AccountState` is the explicit "current state" handed to both the
//! optimiser and the execution engine; nothing is read from ambient state.

use std::collections::BTreeMap;

use super::error::RebalanceError;
use super::position::Position;
use super::universe::Universe;
use crate::ports::brokerage_port::BrokeragePort;

/// Instrument → signed weight, in symbol order.
pub type Weights = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub portfolio_value: f64,
    pub weights: Weights,
    /// Reference liquidity per symbol; symbols without an entry are measured
    /// against `portfolio_value`.
    pub liquidity: BTreeMap<String, f64>,
}

impl AccountState {
    pub fn new(portfolio_value: f64, weights: Weights) -> Self {
        AccountState {
            portfolio_value,
            weights,
            liquidity: BTreeMap::new(),
        }
    }

    pub fn with_liquidity(mut self, symbol: &str, liquidity: f64) -> Self {
        self.liquidity.insert(symbol.to_string(), liquidity);
        self
    }

    pub fn from_positions(positions: &[Position], portfolio_value: f64) -> Self {
        let mut weights = Weights::new();
        for pos in positions {
            *weights.entry(pos.symbol.clone()).or_insert(0.0) += pos.weight(portfolio_value);
        }
        AccountState::new(portfolio_value, weights)
    }

    /// Read positions, value and reference liquidity for every held or
    /// tradable symbol from a brokerage.
    pub fn snapshot(broker: &dyn BrokeragePort, universe: &Universe) -> Result<Self, RebalanceError> {
        let portfolio_value = broker.portfolio_value()?;
        let positions = broker.current_positions()?;
        let mut state = AccountState::from_positions(&positions, portfolio_value);

        let symbols = universe
            .symbols()
            .map(str::to_string)
            .chain(positions.iter().map(|p| p.symbol.clone()));
        for symbol in symbols {
            if let Some(liq) = broker.reference_liquidity(&symbol) {
                state.liquidity.insert(symbol, liq);
            }
        }
        Ok(state)
    }

    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn reference_liquidity(&self, symbol: &str) -> f64 {
        self.liquidity
            .get(symbol)
            .copied()
            .unwrap_or(self.portfolio_value)
    }

    pub fn validate(&self) -> Result<(), RebalanceError> {
        if !self.portfolio_value.is_finite() || self.portfolio_value <= 0.0 {
            return Err(RebalanceError::InvalidState {
                reason: format!("portfolio value must be positive, got {}", self.portfolio_value),
            });
        }
        if let Some((symbol, _)) = self.weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(RebalanceError::InvalidState {
                reason: format!("non-finite weight for {symbol}"),
            });
        }
        if let Some((symbol, _)) = self
            .liquidity
            .iter()
            .find(|(_, l)| !l.is_finite() || **l < 0.0)
        {
            return Err(RebalanceError::InvalidState {
                reason: format!("invalid reference liquidity for {symbol}"),
            });
        }
        Ok(())
    }
}

/// Output of the optimiser: one signed weight per instrument considered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetWeights {
    weights: Weights,
}

impl TargetWeights {
    pub fn new(weights: Weights) -> Self {
        TargetWeights { weights }
    }

    pub fn get(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(s, w)| (s.as_str(), *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_map(&self) -> &Weights {
        &self.weights
    }

    pub fn gross(&self) -> f64 {
        self.weights.values().map(|w| w.abs()).sum()
    }

    /// Σ|target − current| over the union of both vectors.
    pub fn turnover_from(&self, current: &Weights) -> f64 {
        let mut total: f64 = self
            .weights
            .iter()
            .map(|(s, w)| (w - current.get(s).copied().unwrap_or(0.0)).abs())
            .sum();
        total += current
            .iter()
            .filter(|(s, _)| !self.weights.contains_key(*s))
            .map(|(_, w)| w.abs())
            .sum::<f64>();
        total
    }
}
