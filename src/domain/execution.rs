//! Trade execution and fill simulation.
//!
//! Implements entry/exit fills with slippage, whole-share sizing and
//! commissions, and the per-bar exit priority for an open position.

use chrono::NaiveDate;

use super::ohlcv::PriceBar;
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, ExitReason, Position};

/// Cost model applied to every fill.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    /// Percent of notional, e.g. `0.1` for 0.1%.
    pub commission_pct: f64,
    /// Percent of price, e.g. `0.05` for 0.05%.
    pub slippage_pct: f64,
}

/// Sizing and risk parameters for a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionParams {
    /// Fraction of available cash to allocate, in (0, 1].
    pub position_size: f64,
    /// Fraction below entry, e.g. `0.05` for a 5% stop.
    pub stop_loss_pct: Option<f64>,
    /// Fraction above entry.
    pub take_profit_pct: Option<f64>,
    /// Bars after entry at which the position is closed.
    pub max_holding_period: Option<usize>,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        ExecutionParams {
            position_size: 1.0,
            stop_loss_pct: None,
            take_profit_pct: None,
            max_holding_period: None,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buy fill: execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_entry(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Sell fill: execution_price = market_price * (1 - slippage_pct / 100)
pub fn apply_slippage_exit(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        shares: u64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
    AlreadyInPosition,
}

/// Where an entry happens.
#[derive(Debug, Clone, Copy)]
pub struct EntryFill<'a> {
    pub symbol: &'a str,
    pub market_price: f64,
    pub date: NaiveDate,
    pub index: usize,
    pub max_exit_date: Option<NaiveDate>,
}

/// Open a long position.
///
/// 1. Refuse if a position is already open
/// 2. Apply slippage to the execution price
/// 3. Size: floor(cash * position_size / price) whole shares
/// 4. Refuse if no shares fit or cost + commission exceeds cash
/// 5. Deduct cost + commission, set stop/target levels from the fill price
pub fn enter_long(
    portfolio: &mut Portfolio,
    fill: EntryFill<'_>,
    params: &ExecutionParams,
    config: &ExecutionConfig,
) -> EntryResult {
    if portfolio.position.is_some() {
        return EntryResult::AlreadyInPosition;
    }

    let execution_price = apply_slippage_entry(fill.market_price, config.slippage_pct);
    if !execution_price.is_finite() || execution_price <= 0.0 {
        return EntryResult::InsufficientCapital;
    }

    let available_capital = portfolio.cash * params.position_size;
    let shares = (available_capital / execution_price).floor();
    if shares < 1.0 {
        return EntryResult::InsufficientCapital;
    }
    let shares = shares as u64;

    let cost = shares as f64 * execution_price;
    let commission = calculate_commission(cost, config);
    let total_cost = cost + commission;

    if total_cost > portfolio.cash {
        return EntryResult::InsufficientCapital;
    }

    portfolio.cash -= total_cost;

    portfolio.position = Some(Position {
        symbol: fill.symbol.to_string(),
        shares,
        entry_price: execution_price,
        entry_date: fill.date,
        entry_index: fill.index,
        entry_commission: commission,
        stop_loss_price: params
            .stop_loss_pct
            .map(|pct| execution_price * (1.0 - pct)),
        take_profit_price: params
            .take_profit_pct
            .map(|pct| execution_price * (1.0 + pct)),
        max_exit_date: fill.max_exit_date,
    });

    EntryResult::Entered {
        shares,
        execution_price,
        cost,
        commission,
    }
}

/// Close the open position at `market_price` and append the trade.
///
/// PnL = shares * (exit - entry) - entry commission - exit commission.
pub fn exit_position(
    portfolio: &mut Portfolio,
    market_price: f64,
    exit_date: NaiveDate,
    exit_index: usize,
    exit_reason: ExitReason,
    config: &ExecutionConfig,
) -> Option<ClosedTrade> {
    let position = portfolio.take_position()?;

    let exit_price = apply_slippage_exit(market_price, config.slippage_pct);
    let exit_value = position.market_value(exit_price);
    let exit_commission = calculate_commission(exit_value, config);

    let pnl = position.unrealized_pnl(exit_price) - position.entry_commission - exit_commission;
    let cost_basis = position.cost_basis();
    let pnl_pct = if cost_basis > 0.0 {
        pnl / cost_basis
    } else {
        0.0
    };

    portfolio.cash += exit_value - exit_commission;

    let trade = ClosedTrade {
        symbol: position.symbol,
        shares: position.shares,
        entry_date: position.entry_date,
        entry_price: position.entry_price,
        exit_date,
        exit_price,
        exit_reason,
        pnl,
        pnl_pct,
        holding_bars: exit_index.saturating_sub(position.entry_index),
    };
    portfolio.record_trade(trade.clone());
    Some(trade)
}

/// Decide whether the open position exits on `bar`, and at what market price.
///
/// Priority when several triggers fire on the same bar:
/// 1. stop-loss (low <= stop) at the stop price
/// 2. take-profit (high >= target) at the target price
/// 3. sell rule at the close
/// 4. max holding period reached at the close
pub fn check_exit(
    position: &Position,
    bar: &PriceBar,
    sell_signal: bool,
) -> Option<(ExitReason, f64)> {
    if let Some(stop) = position.stop_loss_price
        && position.should_stop_loss(bar.low)
    {
        return Some((ExitReason::StopLoss, stop));
    }
    if let Some(target) = position.take_profit_price
        && position.should_take_profit(bar.high)
    {
        return Some((ExitReason::TakeProfit, target));
    }
    if sell_signal {
        return Some((ExitReason::SellRule, bar.close));
    }
    if position.holding_expired(bar.date) {
        return Some((ExitReason::MaxHolding, bar.close));
    }
    None
}
