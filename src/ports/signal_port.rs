//! Signal store port trait.

use crate::domain::error::RebalanceError;
use crate::domain::score::Scores;
use chrono::NaiveDate;

pub trait SignalPort {
    /// Current score per symbol: the latest observation dated within
    /// `[end_date - lookback_days, end_date]`.
    fn scores_for_window(
        &self,
        end_date: NaiveDate,
        lookback_days: u32,
    ) -> Result<Scores, RebalanceError>;
}
