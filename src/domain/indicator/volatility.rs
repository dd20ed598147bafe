//! Annualised historical volatility.
//!
//! Sample standard deviation of the last n close-to-close returns,
//! scaled by sqrt(252). Warmup: first n bars are `None`.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::metrics::TRADING_DAYS_PER_YEAR;
use crate::domain::ohlcv::PriceBar;

/// Fewest returns a sample standard deviation is defined over.
pub const MIN_PERIOD: usize = 2;

pub fn calculate_volatility(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut raw = vec![None; bars.len()];
    if period < MIN_PERIOD || bars.len() <= period {
        return IndicatorSeries::from_simple(IndicatorType::Volatility(period), bars, raw);
    }

    let returns: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            if w[0].close == 0.0 {
                0.0
            } else {
                w[1].close / w[0].close - 1.0
            }
        })
        .collect();

    for i in period..bars.len() {
        // returns[j] is the return into bar j + 1
        let window = &returns[i - period..i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        raw[i] = Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt());
    }

    IndicatorSeries::from_simple(IndicatorType::Volatility(period), bars, raw)
}
