//! Domain error types.

/// Top-level error type for the rebalancer.
#[derive(Debug, thiserror::Error)]
pub enum RebalanceError {
    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("infeasible constraints: {reason}")]
    InfeasibleConstraint { reason: String },

    #[error("unknown instrument: {symbol}")]
    UnknownInstrument { symbol: String },

    #[error("invalid account state: {reason}")]
    InvalidState { reason: String },

    #[error("order for {symbol} rejected: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RebalanceError {
    pub(crate) fn data(reason: impl Into<String>) -> Self {
        RebalanceError::Data {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RebalanceError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RebalanceError> for std::process::ExitCode {
    fn from(err: &RebalanceError) -> Self {
        let code: u8 = match err {
            RebalanceError::Io(_) => 1,
            RebalanceError::ConfigParse { .. }
            | RebalanceError::ConfigMissing { .. }
            | RebalanceError::ConfigInvalid { .. } => 2,
            RebalanceError::Data { .. } => 3,
            RebalanceError::InfeasibleConstraint { .. } => 4,
            RebalanceError::InsufficientData { .. } => 5,
            RebalanceError::UnknownInstrument { .. }
            | RebalanceError::InvalidState { .. }
            | RebalanceError::OrderRejected { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = RebalanceError::UnknownInstrument {
            symbol: "EWZ".into(),
        };
        assert_eq!(err.to_string(), "unknown instrument: EWZ");

        let err = RebalanceError::invalid_config("strategy", "max_weight", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [strategy] max_weight: must be positive"
        );
    }

    #[test]
    fn exit_codes_distinguish_categories() {
        use std::process::ExitCode;

        let code = |err: &RebalanceError| format!("{:?}", ExitCode::from(err));
        let expected = |n: u8| format!("{:?}", ExitCode::from(n));

        let config = RebalanceError::ConfigMissing {
            section: "data".into(),
            key: "scores_path".into(),
        };
        let infeasible = RebalanceError::InfeasibleConstraint {
            reason: "x".into(),
        };
        assert_eq!(code(&config), expected(2));
        assert_eq!(code(&infeasible), expected(4));
        assert_eq!(code(&RebalanceError::data("bad row")), expected(3));
    }
}
