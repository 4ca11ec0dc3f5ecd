//! Brokerage/account port trait.

use crate::domain::error::RebalanceError;
use crate::domain::execution::Order;
use crate::domain::position::Position;

pub trait BrokeragePort {
    fn current_positions(&self) -> Result<Vec<Position>, RebalanceError>;

    /// Total account value: cash plus the market value of every position.
    fn portfolio_value(&self) -> Result<f64, RebalanceError>;

    fn submit_order(&mut self, order: &Order) -> Result<(), RebalanceError>;

    /// Liquidity metric an order in `symbol` is measured against, such as
    /// recent traded dollar volume. `None` falls back to portfolio value.
    fn reference_liquidity(&self, _symbol: &str) -> Option<f64> {
        None
    }
}
