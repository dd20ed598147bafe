//! Open position and closed trade records.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    /// Fill price including slippage.
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_index: usize,
    pub entry_commission: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    /// Date of the bar `max_holding_period` bars after entry, if the series reaches it.
    pub max_exit_date: Option<NaiveDate>,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.shares as f64 * (price - self.entry_price)
    }

    pub fn should_stop_loss(&self, low: f64) -> bool {
        self.stop_loss_price.is_some_and(|stop| low <= stop)
    }

    pub fn should_take_profit(&self, high: f64) -> bool {
        self.take_profit_price.is_some_and(|target| high >= target)
    }

    pub fn holding_expired(&self, date: NaiveDate) -> bool {
        self.max_exit_date.is_some_and(|limit| date >= limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExitReason {
    SellRule,
    StopLoss,
    TakeProfit,
    MaxHolding,
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::SellRule => "sell_rule",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::MaxHolding => "max_holding",
            ExitReason::EndOfData => "end_of_data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClosedTrade {
    pub symbol: String,
    pub shares: u64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Net of entry and exit commissions.
    pub pnl: f64,
    /// `pnl` as a fraction of the entry cost basis.
    pub pnl_pct: f64,
    pub holding_bars: usize,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}
