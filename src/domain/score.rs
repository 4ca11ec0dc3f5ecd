//! Time-indexed alpha score table (the signal store).
//!
//! Scores are keyed by an explicit `(date, symbol)` pair and validated on
//! insertion, so the optimiser only ever sees finite, de-duplicated values.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

use super::error::RebalanceError;
use crate::ports::signal_port::SignalPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreObservation {
    pub date: NaiveDate,
    pub symbol: String,
    pub alpha_score: f64,
}

/// Current score per symbol for one rebalance, in symbol order.
pub type Scores = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    observations: BTreeMap<(NaiveDate, String), f64>,
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_observations(
        observations: impl IntoIterator<Item = ScoreObservation>,
    ) -> Result<Self, RebalanceError> {
        let mut table = ScoreTable::new();
        for obs in observations {
            table.insert(obs)?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, obs: ScoreObservation) -> Result<(), RebalanceError> {
        if !obs.alpha_score.is_finite() {
            return Err(RebalanceError::data(format!(
                "non-finite score for {} on {}",
                obs.symbol, obs.date
            )));
        }
        let key = (obs.date, obs.symbol);
        if self.observations.contains_key(&key) {
            return Err(RebalanceError::data(format!(
                "duplicate score for {} on {}",
                key.1, key.0
            )));
        }
        self.observations.insert(key, obs.alpha_score);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn get(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        self.observations.get(&(date, symbol.to_string())).copied()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.observations.keys().next()?.0;
        let last = self.observations.keys().next_back()?.0;
        Some((first, last))
    }

    /// Most recent score per symbol with a date in `[end - lookback_days, end]`.
    /// A lookback reaching before the earliest representable date starts there.
    pub fn latest_in_window(&self, end: NaiveDate, lookback_days: u32) -> Scores {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        let mut scores = Scores::new();

        // Keys are ordered by date first, so later observations overwrite earlier ones.
        for ((_, symbol), score) in self
            .observations
            .range((start, String::new())..)
            .take_while(|((date, _), _)| *date <= end)
        {
            scores.insert(symbol.clone(), *score);
        }

        scores
    }
}

impl SignalPort for ScoreTable {
    fn scores_for_window(
        &self,
        end_date: NaiveDate,
        lookback_days: u32,
    ) -> Result<Scores, RebalanceError> {
        Ok(self.latest_in_window(end_date, lookback_days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn obs(date: NaiveDate, symbol: &str, score: f64) -> ScoreObservation {
        ScoreObservation {
            date,
            symbol: symbol.to_string(),
            alpha_score: score,
        }
    }

    #[test]
    fn window_uses_most_recent_observation() {
        let table = ScoreTable::from_observations(vec![
            obs(d(2020, 1, 1), "EWZ", 0.1),
            obs(d(2020, 1, 5), "EWZ", 0.5),
            obs(d(2020, 1, 3), "EWJ", -0.2),
        ])
        .unwrap();

        let scores = table.latest_in_window(d(2020, 1, 6), 7);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["EWZ"], 0.5);
        assert_eq!(scores["EWJ"], -0.2);
    }

    #[test]
    fn window_excludes_dates_outside_range() {
        let table = ScoreTable::from_observations(vec![
            obs(d(2020, 1, 1), "EWZ", 0.1),
            obs(d(2020, 1, 20), "EWJ", 0.3),
        ])
        .unwrap();

        let scores = table.latest_in_window(d(2020, 1, 15), 7);
        assert!(scores.is_empty());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let table = ScoreTable::from_observations(vec![
            obs(d(2020, 1, 8), "EWZ", 1.0),
            obs(d(2020, 1, 15), "EWJ", 2.0),
        ])
        .unwrap();

        let scores = table.latest_in_window(d(2020, 1, 15), 7);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn rejects_duplicate_pair() {
        let result = ScoreTable::from_observations(vec![
            obs(d(2020, 1, 1), "EWZ", 0.1),
            obs(d(2020, 1, 1), "EWZ", 0.2),
        ]);
        assert!(matches!(result, Err(RebalanceError::Data { .. })));
    }

    #[test]
    fn rejects_non_finite_score() {
        let mut table = ScoreTable::new();
        assert!(table.insert(obs(d(2020, 1, 1), "EWZ", f64::NAN)).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn date_range_spans_table() {
        let table = ScoreTable::from_observations(vec![
            obs(d(2020, 3, 1), "EWZ", 0.1),
            obs(d(2019, 12, 1), "EWJ", 0.2),
        ])
        .unwrap();
        assert_eq!(table.date_range(), Some((d(2019, 12, 1), d(2020, 3, 1))));
        assert_eq!(table.get(d(2019, 12, 1), "EWJ"), Some(0.2));
    }

    #[test]
    fn huge_lookback_reaches_back_to_first_observation() {
        let table = ScoreTable::from_observations(vec![
            obs(d(1990, 1, 1), "EWZ", 0.1),
            obs(d(2020, 1, 1), "EWJ", 0.2),
        ])
        .unwrap();
        let scores = table.scores_for_window(d(2020, 1, 1), u32::MAX).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["EWZ"], 0.1);
    }
}
