//! Price bar representation.

use chrono::NaiveDate;

use crate::domain::error::RuletraderError;

/// One OHLCV record for a single trading session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Reject series whose dates are not strictly increasing.
pub fn validate_series(symbol: &str, bars: &[PriceBar]) -> Result<(), RuletraderError> {
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(RuletraderError::NonMonotonicSeries {
                symbol: symbol.to_string(),
                index: i + 1,
            });
        }
    }
    Ok(())
}
