//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! Seed ATR = mean(TR[0..n]), then ATR[i] = (ATR[i-1]*(n-1) + TR[i]) / n.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_atr(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut raw = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return IndicatorSeries::from_simple(IndicatorType::Atr(period), bars, raw);
    }

    let tr_values: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let n = period as f64;
    let mut atr = tr_values[..period].iter().sum::<f64>() / n;
    raw[period - 1] = Some(atr);
    for i in period..bars.len() {
        atr = (atr * (n - 1.0) + tr_values[i]) / n;
        raw[i] = Some(atr);
    }

    IndicatorSeries::from_simple(IndicatorType::Atr(period), bars, raw)
}
