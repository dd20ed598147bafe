//! Simple Moving Average over closes and over volume.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are `None`.
//! Each window is summed directly so that SMA(1) reproduces the input exactly.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, rolling_mean};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    IndicatorSeries::from_simple(
        IndicatorType::Sma(period),
        bars,
        rolling_mean(&closes, period),
    )
}

pub fn calculate_volume_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    IndicatorSeries::from_simple(
        IndicatorType::VolumeSma(period),
        bars,
        rolling_mean(&volumes, period),
    )
}
