//! Trailing return and drawdown from peak.
//!
//! Return[i] = C[i] / C[i-n] - 1. Warmup: first n bars are `None`.
//! Drawdown[i] = C[i] / max(C[0..=i]) - 1, defined from the first bar.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_return(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let raw = (0..bars.len())
        .map(|i| {
            if period == 0 || i < period {
                return None;
            }
            let base = bars[i - period].close;
            (base != 0.0).then(|| bars[i].close / base - 1.0)
        })
        .collect();
    IndicatorSeries::from_simple(IndicatorType::Return(period), bars, raw)
}

pub fn calculate_drawdown(bars: &[PriceBar]) -> IndicatorSeries {
    let mut peak = f64::NEG_INFINITY;
    let raw = bars
        .iter()
        .map(|bar| {
            peak = peak.max(bar.close);
            (peak > 0.0).then(|| bar.close / peak - 1.0)
        })
        .collect();
    IndicatorSeries::from_simple(IndicatorType::Drawdown, bars, raw)
}
