//! MACD (Moving Average Convergence Divergence).
//!
//! MACD line = EMA(fast) - EMA(slow), defined from bar slow-1.
//! Signal = EMA(signal) of the MACD line, seeded with the SMA of the first
//! `signal` MACD values; defined from bar slow-1 + signal-1.
//! Histogram = line - signal.

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::PriceBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[PriceBar],
    fast: usize,
    slow: usize,
    signal: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd { fast, slow, signal };
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let fast_ema = ema_values(&closes, fast);
    let slow_ema = ema_values(&closes, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let mut signal_values = vec![None; bars.len()];
    if let Some(start) = line.iter().position(Option::is_some) {
        let defined: Vec<f64> = line[start..].iter().flatten().copied().collect();
        for (offset, v) in ema_values(&defined, signal).into_iter().enumerate() {
            signal_values[start + offset] = v;
        }
    }

    let values = bars
        .iter()
        .zip(line.into_iter().zip(signal_values))
        .map(|(bar, (line, signal))| IndicatorPoint {
            date: bar.date,
            value: line.map(|line| IndicatorValue::Macd { line, signal }),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorField;
    use crate::domain::indicator::test_support::bars_from_closes;

    #[test]
    fn macd_line_warmup() {
        let bars = bars_from_closes(&(1..=10).map(f64::from).collect::<Vec<_>>());
        let series = calculate_macd(&bars, 2, 4, 3);
        assert!(series.values[2].value.is_none());
        assert!(series.values[3].value.is_some());
    }

    #[test]
    fn macd_signal_warmup() {
        let bars = bars_from_closes(&(1..=10).map(f64::from).collect::<Vec<_>>());
        let series = calculate_macd(&bars, 2, 4, 3);
        // line from index 3, signal from index 3 + 3 - 1 = 5
        assert_eq!(series.scalar(4, IndicatorField::MacdSignal), None);
        assert!(series.scalar(5, IndicatorField::MacdSignal).is_some());
        assert!(series.scalar(5, IndicatorField::MacdHistogram).is_some());
    }

    #[test]
    fn macd_constant_prices_is_zero() {
        let bars = bars_from_closes(&[100.0; 40]);
        let series = calculate_macd(&bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        let line = series.scalar(39, IndicatorField::MacdLine).unwrap();
        let signal = series.scalar(39, IndicatorField::MacdSignal).unwrap();
        assert!(line.abs() < 1e-10);
        assert!(signal.abs() < 1e-10);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0).collect();
        let bars = bars_from_closes(&closes);
        let series = calculate_macd(&bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        for i in 33..50 {
            let line = series.scalar(i, IndicatorField::MacdLine).unwrap();
            let signal = series.scalar(i, IndicatorField::MacdSignal).unwrap();
            let hist = series.scalar(i, IndicatorField::MacdHistogram).unwrap();
            assert!((hist - (line - signal)).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_rising_prices_positive_line() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let bars = bars_from_closes(&closes);
        let series = calculate_macd(&bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!(series.scalar(39, IndicatorField::MacdLine).unwrap() > 0.0);
    }
}
