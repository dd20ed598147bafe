//! Data Provider port.
//!
//! The domain never retries or rate-limits; that belongs to the implementor.

use crate::domain::error::RuletraderError;
use crate::domain::fundamentals::FundamentalSnapshot;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `symbol` within the inclusive date bounds.
    ///
    /// Fails with `DataUnavailable` when nothing can be retrieved.
    fn get_price_series(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, RuletraderError>;

    fn get_fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, RuletraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError>;
}
