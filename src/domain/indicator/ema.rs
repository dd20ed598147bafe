//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are `None`.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    IndicatorSeries::from_simple(IndicatorType::Ema(period), bars, ema_values(&closes, period))
}

/// EMA over an arbitrary input slice, SMA-seeded at index `period - 1`.
pub(crate) fn ema_values(inputs: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; inputs.len()];
    if period == 0 || inputs.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = inputs[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);
    for i in period..inputs.len() {
        ema = inputs[i] * k + ema * (1.0 - k);
        out[i] = Some(ema);
    }
    out
}
