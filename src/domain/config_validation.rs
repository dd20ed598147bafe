//! Configuration validation.
//!
//! Every section is checked before any data is loaded so that a bad file
//! fails fast with the offending `[section] key`.

use crate::domain::backtest::EntryTiming;
use crate::domain::condition_parser::parse_conditions;
use crate::domain::error::RuletraderError;
use crate::domain::fundamentals::MarketCapCategory;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    validate_initial_capital(config)?;
    validate_non_negative(config, "backtest", "commission_per_trade")?;
    validate_non_negative(config, "backtest", "commission_pct")?;
    validate_non_negative(config, "backtest", "slippage_pct")?;
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    validate_entry_timing(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    validate_position_size(config)?;
    validate_stop_loss(config)?;
    if let Some(value) = optional_double(config, "strategy", "take_profit")?
        && !(value > 0.0 && value.is_finite())
    {
        return Err(invalid("strategy", "take_profit", "take_profit must be positive"));
    }
    if let Some(value) = optional_int(config, "strategy", "max_holding_period")?
        && value < 1
    {
        return Err(invalid(
            "strategy",
            "max_holding_period",
            "max_holding_period must be at least 1 bar",
        ));
    }
    validate_rule(config, "strategy", "buy_rule", true)?;
    validate_rule(config, "strategy", "sell_rule", false)?;
    Ok(())
}

pub fn validate_screener_config(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let has_template = non_empty(config, "screener", "template").is_some();
    validate_rule(config, "screener", "rule", !has_template)?;

    if let Some(value) = optional_int(config, "screener", "min_bars")?
        && value < 1
    {
        return Err(invalid("screener", "min_bars", "min_bars must be at least 1"));
    }
    if let Some(value) = optional_int(config, "screener", "max_symbols")?
        && value < 1
    {
        return Err(invalid(
            "screener",
            "max_symbols",
            "max_symbols must be at least 1",
        ));
    }
    parse_market_cap(config, "screener", "market_cap")?;
    Ok(())
}

/// Parse an optional market-cap category such as `large` or `Mid Cap`.
pub fn parse_market_cap(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<MarketCapCategory>, RuletraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<MarketCapCategory>()
            .map(Some)
            .map_err(|reason| invalid(section, key, &reason)),
    }
}

/// Comma-separated list with blanks dropped; absent means empty.
pub fn parse_list(config: &dyn ConfigPort, section: &str, key: &str) -> Vec<String> {
    config
        .get_string(section, key)
        .map(|raw| split_list(&raw))
        .unwrap_or_default()
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an optional `YYYY-MM-DD` value.
pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, RuletraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("invalid {key} format, expected YYYY-MM-DD"))),
    }
}

pub fn optional_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, RuletraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(section, key, &format!("{key} must be a number"))),
    }
}

pub fn optional_int(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, RuletraderError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("{key} must be an integer"))),
    }
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn invalid(section: &str, key: &str, reason: &str) -> RuletraderError {
    RuletraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    if let Some(value) = optional_double(config, "backtest", "initial_capital")?
        && value <= 0.0
    {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), RuletraderError> {
    if let Some(value) = optional_double(config, section, key)?
        && value < 0.0
    {
        return Err(invalid(section, key, &format!("{key} must be non-negative")));
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    if let Some(value) = optional_double(config, "backtest", "risk_free_rate")?
        && !(0.0..1.0).contains(&value)
    {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    let start = parse_date(config, "backtest", "start_date")?;
    let end = parse_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end)
        && start >= end
    {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

fn validate_entry_timing(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    if let Some(value) = non_empty(config, "backtest", "entry_timing") {
        value
            .parse::<EntryTiming>()
            .map_err(|reason| invalid("backtest", "entry_timing", &reason))?;
    }
    Ok(())
}

fn validate_position_size(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    if let Some(value) = optional_double(config, "strategy", "position_size")?
        && (value <= 0.0 || value > 1.0)
    {
        return Err(invalid(
            "strategy",
            "position_size",
            "position_size must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_stop_loss(config: &dyn ConfigPort) -> Result<(), RuletraderError> {
    if let Some(value) = optional_double(config, "strategy", "stop_loss")?
        && !(value > 0.0 && value < 1.0)
    {
        return Err(invalid(
            "strategy",
            "stop_loss",
            "stop_loss must be a fraction between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_rule(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    required: bool,
) -> Result<(), RuletraderError> {
    match non_empty(config, section, key) {
        None if required => Err(RuletraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
        None => Ok(()),
        Some(rule) => parse_conditions(&rule)
            .map(|_| ())
            .map_err(|e| invalid(section, key, &e.display_with_context(&rule))),
    }
}
