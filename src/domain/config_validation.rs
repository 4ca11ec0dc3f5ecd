//! Configuration validation.
//!
//! Validates all config fields before any data is loaded.

use crate::domain::constraints::Constraints;
use crate::domain::error::RebalanceError;
use crate::ports::config_port::ConfigPort;
use chrono::{NaiveDate, Weekday};

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    validate_numbers(config)?;
    validate_long_short(config)?;
    Constraints::from_config(config).validate()?;
    validate_lookback(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    require_non_empty(config, "data", "scores_path")?;
    require_non_empty(config, "data", "instruments_path")?;
    if let Some(column) = config.get_string("data", "score_column") {
        if column.trim().is_empty() {
            return Err(RebalanceError::invalid_config(
                "data",
                "score_column",
                "score_column must not be empty",
            ));
        }
    }
    Ok(())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_weekday(config)?;
    Ok(())
}

/// Keys read with `get_double` silently fall back to their default when
/// unparseable, so reject non-numeric text here.
fn validate_numbers(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let keys = [
        ("strategy", "turnover_cap"),
        ("strategy", "max_weight"),
        ("strategy", "gross_exposure"),
        ("execution", "liquidity_tolerance"),
    ];
    for (section, key) in keys {
        if let Some(raw) = config.get_string(section, key) {
            if raw.trim().parse::<f64>().is_err() {
                return Err(RebalanceError::invalid_config(
                    section,
                    key,
                    format!("{key} must be a number, got {raw:?}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_long_short(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let Some(raw) = config.get_string("strategy", "long_short") else {
        return Ok(());
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "false" | "no" | "0" => Ok(()),
        _ => Err(RebalanceError::invalid_config(
            "strategy",
            "long_short",
            "long_short must be true or false",
        )),
    }
}

/// `get_int` falls back to the default on text like `7.5`, so parse the raw value.
fn validate_lookback(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let value = match config.get_string("strategy", "lookback_days") {
        None => return Ok(()),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            RebalanceError::invalid_config(
                "strategy",
                "lookback_days",
                format!("lookback_days must be a whole number of days, got {raw:?}"),
            )
        })?,
    };
    if !(1..=366).contains(&value) {
        return Err(RebalanceError::invalid_config(
            "strategy",
            "lookback_days",
            "lookback_days must be between 1 and 366",
        ));
    }
    Ok(())
}

fn require_non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), RebalanceError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(RebalanceError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let value = config.get_double("replay", "initial_capital", 100_000.0);
    if value <= 0.0 {
        return Err(RebalanceError::invalid_config(
            "replay",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    let start_str = config.get_string("replay", "start_date");
    let end_str = config.get_string("replay", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date > end_date {
        return Err(RebalanceError::invalid_config(
            "replay",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, RebalanceError> {
    match value {
        None => Err(RebalanceError::ConfigMissing {
            section: "replay".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            RebalanceError::invalid_config(
                "replay",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

pub fn parse_weekday(value: Option<&str>) -> Result<Weekday, RebalanceError> {
    match value {
        None => Ok(Weekday::Wed),
        Some(s) => s.trim().parse::<Weekday>().map_err(|_| {
            RebalanceError::invalid_config("replay", "weekday", format!("unknown weekday {s:?}"))
        }),
    }
}

fn validate_weekday(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    parse_weekday(config.get_string("replay", "weekday").as_deref()).map(|_| ())
}
