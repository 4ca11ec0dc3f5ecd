//! Rebalance constraints, immutable for the duration of a run.

use super::error::RebalanceError;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    /// Max Σ|target − current| per rebalance, as a fraction of portfolio value.
    pub turnover_cap: f64,
    /// Max |weight| per instrument.
    pub max_weight: f64,
    /// Whether negative weights are permitted.
    pub long_short: bool,
    /// Max fraction of an instrument's reference liquidity one order may use.
    pub liquidity_tolerance: f64,
    /// Σ|weight| the unconstrained allocation is scaled to.
    pub gross_exposure: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            turnover_cap: 0.01,
            max_weight: 0.05,
            long_short: true,
            liquidity_tolerance: 0.005,
            gross_exposure: 1.0,
        }
    }
}

impl Constraints {
    /// Read `[strategy]` and `[execution]` keys, falling back to defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let d = Constraints::default();
        Constraints {
            turnover_cap: config.get_double("strategy", "turnover_cap", d.turnover_cap),
            max_weight: config.get_double("strategy", "max_weight", d.max_weight),
            long_short: config.get_bool("strategy", "long_short", d.long_short),
            liquidity_tolerance: config.get_double(
                "execution",
                "liquidity_tolerance",
                d.liquidity_tolerance,
            ),
            gross_exposure: config.get_double("strategy", "gross_exposure", d.gross_exposure),
        }
    }

    pub fn validate(&self) -> Result<(), RebalanceError> {
        check_range("strategy", "turnover_cap", self.turnover_cap, 0.0, 2.0)?;
        if self.max_weight <= 0.0 || self.max_weight > 1.0 || self.max_weight.is_nan() {
            return Err(RebalanceError::invalid_config(
                "strategy",
                "max_weight",
                "max_weight must be in (0, 1]",
            ));
        }
        if self.gross_exposure <= 0.0 || !self.gross_exposure.is_finite() {
            return Err(RebalanceError::invalid_config(
                "strategy",
                "gross_exposure",
                "gross_exposure must be positive",
            ));
        }
        check_range(
            "execution",
            "liquidity_tolerance",
            self.liquidity_tolerance,
            0.0,
            1.0,
        )?;
        Ok(())
    }
}

fn check_range(
    section: &str,
    key: &str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), RebalanceError> {
    if !(min..=max).contains(&value) {
        return Err(RebalanceError::invalid_config(
            section,
            key,
            format!("{key} must be between {min} and {max}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = Constraints::default();
        assert!(c.validate().is_ok());
        assert!(c.long_short);
        assert!((c.turnover_cap - 0.01).abs() < f64::EPSILON);
        assert!((c.max_weight - 0.05).abs() < f64::EPSILON);
        assert!((c.liquidity_tolerance - 0.005).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_turnover_is_allowed() {
        let c = Constraints {
            turnover_cap: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_negative_turnover() {
        let c = Constraints {
            turnover_cap: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(RebalanceError::ConfigInvalid { key, .. }) if key == "turnover_cap"
        ));
    }

    #[test]
    fn rejects_zero_max_weight() {
        let c = Constraints {
            max_weight: 0.0,
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_nan_tolerance() {
        let c = Constraints {
            liquidity_tolerance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            c.validate(),
            Err(RebalanceError::ConfigInvalid { key, .. }) if key == "liquidity_tolerance"
        ));
    }
}
