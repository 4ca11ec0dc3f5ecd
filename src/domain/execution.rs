//! Order generation and submission.
//!
//! Turns a target weight vector into notional orders against the current
//! account state. Each order is capped at `liquidity_tolerance` times the
//! instrument's reference liquidity; anything above the cap is recorded as a
//! shortfall and left for the next rebalance, which will still see the gap
//! between current and target weights.

use std::cmp::Ordering;
use tracing::{debug, info, warn};

use super::constraints::Constraints;
use super::error::RebalanceError;
use super::portfolio::{AccountState, TargetWeights};
use super::universe::Universe;
use crate::ports::brokerage_port::BrokeragePort;

/// Weight deltas at or below this produce no order.
pub const MIN_TRADE_WEIGHT: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => f.pad("BUY"),
            Side::Sell => f.pad("SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    /// Signed notional: positive buys, negative sells.
    pub notional: f64,
    /// Notional needed to reach the target weight in one go.
    pub requested_notional: f64,
    /// Max |notional| allowed by the liquidity tolerance.
    pub liquidity_cap: f64,
}

impl Order {
    pub fn side(&self) -> Side {
        if self.notional >= 0.0 {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.notional != self.requested_notional
    }
}

/// Portion of a requested trade the liquidity cap held back.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub symbol: String,
    /// Signed notional left unexecuted.
    pub notional: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedOrder {
    pub order: Order,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBatch {
    /// Orders accepted by the brokerage, in submission order.
    pub orders: Vec<Order>,
    pub shortfalls: Vec<Shortfall>,
    pub rejected: Vec<RejectedOrder>,
}

impl OrderBatch {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.rejected.is_empty()
    }

    pub fn total_traded(&self) -> f64 {
        self.orders.iter().map(|o| o.notional.abs()).sum()
    }

    pub fn total_shortfall(&self) -> f64 {
        self.shortfalls.iter().map(|s| s.notional.abs()).sum()
    }

    pub fn order_for(&self, symbol: &str) -> Option<&Order> {
        self.orders.iter().find(|o| o.symbol == symbol)
    }

    pub fn shortfall_for(&self, symbol: &str) -> Option<&Shortfall> {
        self.shortfalls.iter().find(|s| s.symbol == symbol)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    constraints: Constraints,
    universe: Universe,
}

impl ExecutionEngine {
    pub fn new(constraints: Constraints, universe: Universe) -> Self {
        ExecutionEngine {
            constraints,
            universe,
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Compute the orders for a rebalance without submitting them.
    ///
    /// Orders are sorted by |weight delta| descending, ties by symbol.
    pub fn plan_orders(
        &self,
        state: &AccountState,
        targets: &TargetWeights,
    ) -> Result<(Vec<Order>, Vec<Shortfall>), RebalanceError> {
        state.validate()?;
        self.check_known(state.weights.keys().map(String::as_str))?;
        self.check_known(targets.iter().map(|(s, _)| s))?;

        let mut deltas: Vec<(&str, f64)> = targets
            .iter()
            .map(|(symbol, target)| (symbol, target - state.weight(symbol)))
            .collect();
        deltas.extend(
            state
                .weights
                .iter()
                .filter(|(s, _)| targets.as_map().get(*s).is_none())
                .map(|(s, w)| (s.as_str(), -w)),
        );
        deltas.retain(|(_, d)| d.abs() > MIN_TRADE_WEIGHT);
        deltas.sort_by(|a, b| match b.1.abs().total_cmp(&a.1.abs()) {
            Ordering::Equal => a.0.cmp(b.0),
            other => other,
        });

        let mut orders = Vec::with_capacity(deltas.len());
        let mut shortfalls = Vec::new();

        for (symbol, delta) in deltas {
            let requested = delta * state.portfolio_value;
            let cap = self.constraints.liquidity_tolerance * state.reference_liquidity(symbol);
            let notional = if requested.abs() > cap {
                cap.copysign(requested)
            } else {
                requested
            };

            if notional != requested {
                debug!(
                    symbol,
                    requested, cap, "order truncated to liquidity cap"
                );
                shortfalls.push(Shortfall {
                    symbol: symbol.to_string(),
                    notional: requested - notional,
                });
            }
            if notional == 0.0 {
                continue;
            }

            orders.push(Order {
                symbol: symbol.to_string(),
                notional,
                requested_notional: requested,
                liquidity_cap: cap,
            });
        }

        Ok((orders, shortfalls))
    }

    /// Plan and submit orders for a rebalance.
    ///
    /// Invalid state is fatal before anything is submitted. A brokerage
    /// rejection only affects its own order.
    pub fn execute_portfolio(
        &self,
        state: &AccountState,
        targets: &TargetWeights,
        broker: &mut dyn BrokeragePort,
    ) -> Result<OrderBatch, RebalanceError> {
        let (planned, shortfalls) = self.plan_orders(state, targets)?;
        let mut batch = OrderBatch {
            shortfalls,
            ..Default::default()
        };

        for order in planned {
            match broker.submit_order(&order) {
                Ok(()) => batch.orders.push(order),
                Err(e) => {
                    warn!(symbol = %order.symbol, error = %e, "order rejected");
                    batch.rejected.push(RejectedOrder {
                        order,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            orders = batch.orders.len(),
            rejected = batch.rejected.len(),
            shortfalls = batch.shortfalls.len(),
            traded = batch.total_traded(),
            "execution complete"
        );
        Ok(batch)
    }

    fn check_known<'a>(&self, mut symbols: impl Iterator<Item = &'a str>) -> Result<(), RebalanceError> {
        match symbols.find(|s| !self.universe.contains(s)) {
            Some(symbol) => Err(RebalanceError::UnknownInstrument {
                symbol: symbol.to_string(),
            }),
            None => Ok(()),
        }
    }
}
