//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned with the bars
//! - `IndicatorSet`: All series needed by one evaluation pass, computed once
//!
//! Warm-up bars carry `None` rather than a sentinel number, so an undefined
//! indicator can never compare true against a threshold.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod returns;
pub mod rsi;
pub mod sma;
pub mod volatility;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt;

use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub value: Option<IndicatorValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        /// Undefined until the signal EMA has warmed up on the MACD line.
        signal: Option<f64>,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    VolumeSma(usize),
    Volatility(usize),
    /// Percentage change of the close over `n` bars, as a fraction.
    Return(usize),
    /// Close relative to its running maximum; zero or negative.
    Drawdown,
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

/// Which output of a (possibly multi-valued) indicator a field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

impl IndicatorRef {
    pub fn value(indicator_type: IndicatorType) -> Self {
        IndicatorRef {
            indicator_type,
            field: IndicatorField::Value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorType {
    /// Flat column key such as `sma_50` or `macd_12_26_9`.
    pub fn key(&self) -> String {
        match self {
            IndicatorType::Sma(p) => format!("sma_{p}"),
            IndicatorType::Ema(p) => format!("ema_{p}"),
            IndicatorType::Rsi(p) => format!("rsi_{p}"),
            IndicatorType::Atr(p) => format!("atr_{p}"),
            IndicatorType::VolumeSma(p) => format!("volume_sma_{p}"),
            IndicatorType::Volatility(p) => format!("volatility_{p}"),
            IndicatorType::Return(n) => format!("return_{n}d"),
            IndicatorType::Drawdown => "drawdown".to_string(),
            IndicatorType::Macd { fast, slow, signal } => format!("macd_{fast}_{slow}_{signal}"),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => format!("bb_{period}_{stddev_mult_x100}"),
        }
    }

    /// Number of leading bars that can never be defined for this indicator.
    pub fn lookback(&self) -> usize {
        match self {
            IndicatorType::Sma(p)
            | IndicatorType::Ema(p)
            | IndicatorType::Atr(p)
            | IndicatorType::VolumeSma(p) => p.saturating_sub(1),
            IndicatorType::Rsi(p) | IndicatorType::Volatility(p) | IndicatorType::Return(p) => *p,
            IndicatorType::Drawdown => 0,
            IndicatorType::Macd { slow, .. } => slow.saturating_sub(1),
            IndicatorType::Bollinger { period, .. } => period.saturating_sub(1),
        }
    }

    pub fn calculate(&self, bars: &[PriceBar]) -> IndicatorSeries {
        match *self {
            IndicatorType::Sma(period) => sma::calculate_sma(bars, period),
            IndicatorType::Ema(period) => ema::calculate_ema(bars, period),
            IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, period),
            IndicatorType::Atr(period) => atr::calculate_atr(bars, period),
            IndicatorType::VolumeSma(period) => sma::calculate_volume_sma(bars, period),
            IndicatorType::Volatility(period) => volatility::calculate_volatility(bars, period),
            IndicatorType::Return(period) => returns::calculate_return(bars, period),
            IndicatorType::Drawdown => returns::calculate_drawdown(bars),
            IndicatorType::Macd { fast, slow, signal } => {
                macd::calculate_macd(bars, fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => bollinger::calculate_bollinger(bars, period, stddev_mult_x100),
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::VolumeSma(period) => write!(f, "VOLUME_SMA({})", period),
            IndicatorType::Volatility(period) => write!(f, "VOLATILITY({})", period),
            IndicatorType::Return(period) => write!(f, "RETURN({})", period),
            IndicatorType::Drawdown => write!(f, "DRAWDOWN"),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

impl IndicatorSeries {
    /// Build a series from per-bar optional scalars.
    pub fn from_simple(
        indicator_type: IndicatorType,
        bars: &[PriceBar],
        raw: Vec<Option<f64>>,
    ) -> Self {
        let values = bars
            .iter()
            .zip(raw)
            .map(|(bar, v)| IndicatorPoint {
                date: bar.date,
                value: v.map(IndicatorValue::Simple),
            })
            .collect();
        IndicatorSeries {
            indicator_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Scalar for `field` at `index`, or `None` during warm-up / past the end.
    pub fn scalar(&self, index: usize, field: IndicatorField) -> Option<f64> {
        let value = self.values.get(index)?.value?;
        extract_field(&value, field)
    }
}

fn extract_field(value: &IndicatorValue, field: IndicatorField) -> Option<f64> {
    match (value, field) {
        (IndicatorValue::Simple(v), IndicatorField::Value) => Some(*v),
        (IndicatorValue::Macd { line, .. }, IndicatorField::MacdLine | IndicatorField::Value) => {
            Some(*line)
        }
        (IndicatorValue::Macd { signal, .. }, IndicatorField::MacdSignal) => *signal,
        (IndicatorValue::Macd { line, signal }, IndicatorField::MacdHistogram) => {
            signal.map(|s| line - s)
        }
        (IndicatorValue::Bollinger { upper, .. }, IndicatorField::BollingerUpper) => Some(*upper),
        (
            IndicatorValue::Bollinger { middle, .. },
            IndicatorField::BollingerMiddle | IndicatorField::Value,
        ) => Some(*middle),
        (IndicatorValue::Bollinger { lower, .. }, IndicatorField::BollingerLower) => Some(*lower),
        _ => None,
    }
}

/// Indicator series for one price series, computed once per (type, params)
/// and shared by every condition that references them.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute every requested indicator over `bars`. Duplicates are computed once.
    pub fn compute<I>(bars: &[PriceBar], types: I) -> Self
    where
        I: IntoIterator<Item = IndicatorType>,
    {
        let mut set = IndicatorSet::new();
        for indicator_type in types {
            set.ensure(bars, indicator_type);
        }
        set
    }

    pub fn ensure(&mut self, bars: &[PriceBar], indicator_type: IndicatorType) {
        self.series
            .entry(indicator_type)
            .or_insert_with(|| indicator_type.calculate(bars));
    }

    pub fn insert(&mut self, series: IndicatorSeries) {
        self.series.insert(series.indicator_type, series);
    }

    pub fn get(&self, indicator_type: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator_type)
    }

    pub fn contains(&self, indicator_type: &IndicatorType) -> bool {
        self.series.contains_key(indicator_type)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Value of an indicator reference at a bar, `None` if not computed or undefined.
    pub fn value(&self, reference: &IndicatorRef, index: usize) -> Option<f64> {
        self.series
            .get(&reference.indicator_type)?
            .scalar(index, reference.field)
    }
}

/// Trailing arithmetic mean over `period` inputs; the first `period - 1` are `None`.
pub(crate) fn rolling_mean(inputs: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; inputs.len()];
    }
    (0..inputs.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                let window = &inputs[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}
