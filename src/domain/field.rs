//! Field-name grammar.
//!
//! A condition field resolves against three namespaces, tried in order:
//! 1. price fields: `price`, `close`, `open`, `high`, `low`, `volume`
//! 2. technical fields: `name(period[, arg...])`, a bare `name`, or `name_period`
//!    (`return_5d` also accepts the day suffix)
//! 3. anything else that looks like an identifier is a fundamental metric

use std::fmt;

use crate::domain::indicator::{
    IndicatorField, IndicatorRef, IndicatorType, bollinger, macd, volatility,
};

const DEFAULT_RSI_PERIOD: usize = 14;
const DEFAULT_ATR_PERIOD: usize = 14;
const DEFAULT_VOLUME_SMA_PERIOD: usize = 20;
const DEFAULT_VOLATILITY_PERIOD: usize = 20;
const DEFAULT_RETURN_PERIOD: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Price(PriceField),
    Indicator(IndicatorRef),
    Fundamental(String),
}

impl FieldRef {
    pub fn is_fundamental(&self) -> bool {
        matches!(self, FieldRef::Fundamental(_))
    }
}

/// Why a field could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnresolvedReason {
    Unknown,
    Malformed(String),
    MissingFundamental,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Unknown => write!(f, "unknown field"),
            UnresolvedReason::Malformed(detail) => write!(f, "malformed field: {detail}"),
            UnresolvedReason::MissingFundamental => write!(f, "fundamental value not available"),
        }
    }
}

/// Parse a field name into its namespace. Names are case-insensitive.
pub fn parse_field(raw: &str) -> Result<FieldRef, UnresolvedReason> {
    let name = raw.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(UnresolvedReason::Malformed("empty field".into()));
    }

    if let Some(price) = price_field(&name) {
        return Ok(FieldRef::Price(price));
    }

    if let Some(open) = name.find('(') {
        let Some(inner) = name[open + 1..].strip_suffix(')') else {
            return Err(UnresolvedReason::Malformed(format!(
                "unbalanced parentheses in '{raw}'"
            )));
        };
        let base = name[..open].trim();
        if !is_technical_name(base) {
            return Err(UnresolvedReason::Unknown);
        }
        let args = parse_args(inner)?;
        return technical_field(base, &args).map(FieldRef::Indicator);
    }

    if !is_identifier(&name) {
        return Err(UnresolvedReason::Malformed(format!("invalid field name '{raw}'")));
    }

    if is_technical_name(&name) {
        return technical_field(&name, &[]).map(FieldRef::Indicator);
    }

    // `sma_50`, `rsi_14`, `volume_sma_20`, `return_5d`
    if let Some((base, period)) = name.rsplit_once('_')
        && is_technical_name(base)
        && let Ok(period) = period_suffix(base, period).parse::<f64>()
    {
        return technical_field(base, &[period]).map(FieldRef::Indicator);
    }

    Ok(FieldRef::Fundamental(name))
}

fn price_field(name: &str) -> Option<PriceField> {
    match name {
        "price" | "close" => Some(PriceField::Close),
        "open" => Some(PriceField::Open),
        "high" => Some(PriceField::High),
        "low" => Some(PriceField::Low),
        "volume" => Some(PriceField::Volume),
        _ => None,
    }
}

fn period_suffix<'a>(base: &str, period: &'a str) -> &'a str {
    match base {
        "return" => period.strip_suffix('d').unwrap_or(period),
        _ => period,
    }
}

fn is_technical_name(name: &str) -> bool {
    matches!(
        name,
        "sma"
            | "ema"
            | "rsi"
            | "atr"
            | "volume_sma"
            | "volatility"
            | "return"
            | "drawdown"
            | "macd"
            | "macd_signal"
            | "macd_hist"
            | "macd_diff"
            | "bb_upper"
            | "bb_middle"
            | "bb_lower"
    )
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_args(inner: &str) -> Result<Vec<f64>, UnresolvedReason> {
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|arg| {
            let arg = arg.trim();
            arg.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| UnresolvedReason::Malformed(format!("invalid argument '{arg}'")))
        })
        .collect()
}

fn period_arg(name: &str, value: f64) -> Result<usize, UnresolvedReason> {
    if value.fract() != 0.0 || value < 1.0 {
        return Err(UnresolvedReason::Malformed(format!(
            "{name} period must be a positive integer, got {value}"
        )));
    }
    Ok(value as usize)
}

fn single_period(
    name: &str,
    args: &[f64],
    default: Option<usize>,
) -> Result<usize, UnresolvedReason> {
    match args {
        [] => default
            .ok_or_else(|| UnresolvedReason::Malformed(format!("{name} requires a period"))),
        [p] => period_arg(name, *p),
        _ => Err(UnresolvedReason::Malformed(format!(
            "{name} takes one argument, got {}",
            args.len()
        ))),
    }
}

fn technical_field(name: &str, args: &[f64]) -> Result<IndicatorRef, UnresolvedReason> {
    let simple = |indicator_type: IndicatorType| -> Result<IndicatorRef, UnresolvedReason> {
        Ok(IndicatorRef::value(indicator_type))
    };
    match name {
        "sma" => simple(IndicatorType::Sma(single_period(name, args, None)?)),
        "ema" => simple(IndicatorType::Ema(single_period(name, args, None)?)),
        "rsi" => simple(IndicatorType::Rsi(single_period(
            name,
            args,
            Some(DEFAULT_RSI_PERIOD),
        )?)),
        "atr" => simple(IndicatorType::Atr(single_period(
            name,
            args,
            Some(DEFAULT_ATR_PERIOD),
        )?)),
        "volume_sma" => simple(IndicatorType::VolumeSma(single_period(
            name,
            args,
            Some(DEFAULT_VOLUME_SMA_PERIOD),
        )?)),
        "volatility" => {
            let period = single_period(name, args, Some(DEFAULT_VOLATILITY_PERIOD))?;
            if period < volatility::MIN_PERIOD {
                return Err(UnresolvedReason::Malformed(format!(
                    "{name} period must be at least {}, got {period}",
                    volatility::MIN_PERIOD
                )));
            }
            simple(IndicatorType::Volatility(period))
        }
        "return" => simple(IndicatorType::Return(single_period(
            name,
            args,
            Some(DEFAULT_RETURN_PERIOD),
        )?)),
        "drawdown" => {
            if !args.is_empty() {
                return Err(UnresolvedReason::Malformed(format!(
                    "{name} takes no arguments"
                )));
            }
            simple(IndicatorType::Drawdown)
        }
        "macd" | "macd_signal" | "macd_hist" | "macd_diff" => {
            let (fast, slow, signal) = match args {
                [] => (macd::DEFAULT_FAST, macd::DEFAULT_SLOW, macd::DEFAULT_SIGNAL),
                [f, s, g] => (
                    period_arg(name, *f)?,
                    period_arg(name, *s)?,
                    period_arg(name, *g)?,
                ),
                _ => {
                    return Err(UnresolvedReason::Malformed(format!(
                        "{name} takes (fast, slow, signal)"
                    )));
                }
            };
            if fast >= slow {
                return Err(UnresolvedReason::Malformed(format!(
                    "{name} fast period must be below slow period"
                )));
            }
            let field = match name {
                "macd" => IndicatorField::MacdLine,
                "macd_signal" => IndicatorField::MacdSignal,
                _ => IndicatorField::MacdHistogram,
            };
            Ok(IndicatorRef {
                indicator_type: IndicatorType::Macd { fast, slow, signal },
                field,
            })
        }
        "bb_upper" | "bb_middle" | "bb_lower" => {
            let (period, mult) = match args {
                [] => (
                    bollinger::DEFAULT_PERIOD,
                    bollinger::DEFAULT_STDDEV_MULT_X100,
                ),
                [p] => (period_arg(name, *p)?, bollinger::DEFAULT_STDDEV_MULT_X100),
                [p, k] => (period_arg(name, *p)?, (k * 100.0).round() as u32),
                _ => {
                    return Err(UnresolvedReason::Malformed(format!(
                        "{name} takes (period[, k])"
                    )));
                }
            };
            let field = match name {
                "bb_upper" => IndicatorField::BollingerUpper,
                "bb_middle" => IndicatorField::BollingerMiddle,
                _ => IndicatorField::BollingerLower,
            };
            Ok(IndicatorRef {
                indicator_type: IndicatorType::Bollinger {
                    period,
                    stddev_mult_x100: mult,
                },
                field,
            })
        }
        _ => Err(UnresolvedReason::Unknown),
    }
}
