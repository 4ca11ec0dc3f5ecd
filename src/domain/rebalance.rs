//! One rebalance cycle (optimise then execute) and the weekly replay loop.
//!
//! Optimiser errors stop the cycle before any order is built, so a bad signal
//! never produces a partial rebalance.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{info, warn};

use super::constraints::Constraints;
use super::error::RebalanceError;
use super::execution::{ExecutionEngine, OrderBatch};
use super::exposure::ExposureSummary;
use super::optimiser::Optimiser;
use super::portfolio::{AccountState, TargetWeights};
use super::score::Scores;
use super::universe::Universe;
use crate::ports::brokerage_port::BrokeragePort;
use crate::ports::signal_port::SignalPort;

/// Parameters of a weekly replay against a paper account.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub weekday: Weekday,
}

impl ReplayConfig {
    pub fn dates(&self) -> Vec<NaiveDate> {
        rebalance_dates(self.start_date, self.end_date, self.weekday)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebalanceOutcome {
    /// No usable scores in the lookback window.
    Skipped { reason: String },
    /// Constraints could not be met; holdings were left untouched.
    Aborted { reason: String },
    Executed {
        targets: TargetWeights,
        batch: OrderBatch,
        exposure: ExposureSummary,
    },
    /// Orders built but not submitted.
    Planned {
        targets: TargetWeights,
        batch: OrderBatch,
        exposure: ExposureSummary,
    },
}

enum Prepared {
    Skip(RebalanceReport),
    Ready(AccountState, TargetWeights),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceReport {
    pub as_of: NaiveDate,
    pub portfolio_value: f64,
    pub outcome: RebalanceOutcome,
}

#[derive(Debug, Clone)]
pub struct Rebalancer {
    optimiser: Optimiser,
    engine: ExecutionEngine,
    lookback_days: u32,
}

impl Rebalancer {
    pub fn new(constraints: Constraints, universe: Universe, lookback_days: u32) -> Self {
        Rebalancer {
            optimiser: Optimiser::new(constraints.clone()),
            engine: ExecutionEngine::new(constraints, universe),
            lookback_days,
        }
    }

    pub fn optimiser(&self) -> &Optimiser {
        &self.optimiser
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Scores for `as_of`, restricted to the tradable universe.
    pub fn scores(&self, signal: &dyn SignalPort, as_of: NaiveDate) -> Result<Scores, RebalanceError> {
        let mut scores = signal.scores_for_window(as_of, self.lookback_days)?;
        let universe = self.engine.universe();
        scores.retain(|symbol, _| {
            let known = universe.contains(symbol);
            if !known {
                warn!(%symbol, "ignoring score for instrument outside the universe");
            }
            known
        });
        Ok(scores)
    }

    fn prepare(
        &self,
        as_of: NaiveDate,
        signal: &dyn SignalPort,
        broker: &dyn BrokeragePort,
    ) -> Result<Prepared, RebalanceError> {
        let state = AccountState::snapshot(broker, self.engine.universe())?;
        let scores = self.scores(signal, as_of)?;

        match self.optimiser.generate_optimal_portfolio(&state, &scores) {
            Ok(targets) => Ok(Prepared::Ready(state, targets)),
            Err(RebalanceError::InsufficientData { reason }) => {
                info!(%as_of, %reason, "skipping rebalance");
                Ok(Prepared::Skip(RebalanceReport {
                    as_of,
                    portfolio_value: state.portfolio_value,
                    outcome: RebalanceOutcome::Skipped { reason },
                }))
            }
            Err(e) => Err(e),
        }
    }

    /// Run one cycle. Missing scores skip the cycle; infeasible constraints
    /// and invalid account state are returned as errors with nothing submitted.
    pub fn rebalance(
        &self,
        as_of: NaiveDate,
        signal: &dyn SignalPort,
        broker: &mut dyn BrokeragePort,
    ) -> Result<RebalanceReport, RebalanceError> {
        let (state, targets) = match self.prepare(as_of, signal, &*broker)? {
            Prepared::Skip(report) => return Ok(report),
            Prepared::Ready(state, targets) => (state, targets),
        };

        let batch = self.engine.execute_portfolio(&state, &targets, broker)?;
        let exposure = ExposureSummary::from_weights(targets.as_map());

        Ok(RebalanceReport {
            as_of,
            portfolio_value: state.portfolio_value,
            outcome: RebalanceOutcome::Executed {
                targets,
                batch,
                exposure,
            },
        })
    }

    /// The cycle `rebalance` would run, with orders planned but never submitted.
    pub fn plan(
        &self,
        as_of: NaiveDate,
        signal: &dyn SignalPort,
        broker: &dyn BrokeragePort,
    ) -> Result<RebalanceReport, RebalanceError> {
        let (state, targets) = match self.prepare(as_of, signal, broker)? {
            Prepared::Skip(report) => return Ok(report),
            Prepared::Ready(state, targets) => (state, targets),
        };

        let (orders, shortfalls) = self.engine.plan_orders(&state, &targets)?;
        let exposure = ExposureSummary::from_weights(targets.as_map());

        Ok(RebalanceReport {
            as_of,
            portfolio_value: state.portfolio_value,
            outcome: RebalanceOutcome::Planned {
                targets,
                batch: OrderBatch {
                    orders,
                    shortfalls,
                    rejected: Vec::new(),
                },
                exposure,
            },
        })
    }

    /// Run a cycle on each date in order. Infeasible cycles are recorded as
    /// aborted and the replay moves on; any other error stops it.
    pub fn replay(
        &self,
        dates: &[NaiveDate],
        signal: &dyn SignalPort,
        broker: &mut dyn BrokeragePort,
    ) -> Result<Vec<RebalanceReport>, RebalanceError> {
        let mut reports = Vec::with_capacity(dates.len());
        for &as_of in dates {
            match self.rebalance(as_of, signal, broker) {
                Ok(report) => reports.push(report),
                Err(RebalanceError::InfeasibleConstraint { reason }) => {
                    warn!(%as_of, %reason, "rebalance aborted");
                    reports.push(RebalanceReport {
                        as_of,
                        portfolio_value: broker.portfolio_value()?,
                        outcome: RebalanceOutcome::Aborted { reason },
                    });
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }
}

/// Every `weekday` in `[start, end]`.
pub fn rebalance_dates(start: NaiveDate, end: NaiveDate, weekday: Weekday) -> Vec<NaiveDate> {
    let offset = (7 + weekday.num_days_from_monday() - start.weekday().num_days_from_monday()) % 7;
    let mut date = start + Duration::days(i64::from(offset));
    let mut dates = Vec::new();
    while date <= end {
        dates.push(date);
        date += Duration::days(7);
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn wednesdays_in_range() {
        // 2017-01-01 is a Sunday
        let dates = rebalance_dates(d(2017, 1, 1), d(2017, 1, 31), Weekday::Wed);
        assert_eq!(
            dates,
            vec![d(2017, 1, 4), d(2017, 1, 11), d(2017, 1, 18), d(2017, 1, 25)]
        );
    }

    #[test]
    fn start_on_weekday_is_included() {
        let dates = rebalance_dates(d(2017, 1, 4), d(2017, 1, 4), Weekday::Wed);
        assert_eq!(dates, vec![d(2017, 1, 4)]);
    }

    #[test]
    fn empty_when_end_before_first_weekday() {
        assert!(rebalance_dates(d(2017, 1, 1), d(2017, 1, 3), Weekday::Wed).is_empty());
    }
}
