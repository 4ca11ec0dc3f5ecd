//! In-memory brokerage account.
//!
//! Fills every accepted order immediately at its notional. Prices are only
//! used to translate notional into share quantity; symbols without a price
//! are booked at a unit price, so quantity equals market value.

use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::error::RebalanceError;
use crate::domain::execution::Order;
use crate::domain::position::Position;
use crate::domain::universe::Universe;
use crate::ports::brokerage_port::BrokeragePort;

/// Market values below this are treated as a closed position.
const DUST: f64 = 1e-6;

#[derive(Debug, Clone, Default)]
pub struct PaperBroker {
    cash: f64,
    positions: BTreeMap<String, Position>,
    prices: BTreeMap<String, f64>,
    liquidity: BTreeMap<String, f64>,
    universe: Option<Universe>,
    fills: Vec<Order>,
}

impl PaperBroker {
    pub fn new(cash: f64) -> Self {
        PaperBroker {
            cash,
            ..Default::default()
        }
    }

    /// Reject orders for symbols outside `universe`.
    pub fn with_universe(mut self, universe: Universe) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.insert(position.symbol.clone(), position);
        self
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn with_liquidity(mut self, symbol: &str, liquidity: f64) -> Self {
        self.liquidity.insert(symbol.to_string(), liquidity);
        self
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Every order filled so far, oldest first.
    pub fn fills(&self) -> &[Order] {
        &self.fills
    }

    fn total_value(&self) -> f64 {
        self.cash + self.positions.values().map(|p| p.market_value).sum::<f64>()
    }
}

impl BrokeragePort for PaperBroker {
    fn current_positions(&self) -> Result<Vec<Position>, RebalanceError> {
        Ok(self.positions.values().cloned().collect())
    }

    fn portfolio_value(&self) -> Result<f64, RebalanceError> {
        Ok(self.total_value())
    }

    fn submit_order(&mut self, order: &Order) -> Result<(), RebalanceError> {
        if let Some(universe) = &self.universe {
            if !universe.contains(&order.symbol) {
                return Err(RebalanceError::OrderRejected {
                    symbol: order.symbol.clone(),
                    reason: "symbol not tradable".to_string(),
                });
            }
        }
        if !order.notional.is_finite() {
            return Err(RebalanceError::OrderRejected {
                symbol: order.symbol.clone(),
                reason: "non-finite notional".to_string(),
            });
        }

        let price = self.prices.get(&order.symbol).copied().unwrap_or(1.0);
        let position = self
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| Position::new(&order.symbol, 0.0, 0.0));
        position.market_value += order.notional;
        position.quantity += order.notional / price;
        self.cash -= order.notional;

        if position.market_value.abs() < DUST {
            self.positions.remove(&order.symbol);
        }

        debug!(symbol = %order.symbol, notional = order.notional, cash = self.cash, "paper fill");
        self.fills.push(order.clone());
        Ok(())
    }

    fn reference_liquidity(&self, symbol: &str) -> Option<f64> {
        self.liquidity.get(symbol).copied()
    }
}
