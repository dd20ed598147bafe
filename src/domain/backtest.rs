//! Backtest engine and event loop.
//!
//! Walks one symbol's bars in order with two states, FLAT and IN_POSITION.
//! Per bar:
//! 1. a pending next-open entry fills at this bar's open
//! 2. an open position is checked for exits (stop, target, sell rule, max holding)
//! 3. on the last bar an open position is closed at the close (end of data)
//! 4. if nothing else happened and the buy rule fires, enter (or schedule) a position
//! 5. equity is marked at the close
//!
//! Entries are never taken on the final bar: there is nothing left to hold through.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::condition::Algorithm;
use crate::domain::error::RuletraderError;
use crate::domain::execution::{
    self, EntryFill, EntryResult, ExecutionConfig, ExecutionParams,
};
use crate::domain::fundamentals::FundamentalSnapshot;
use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::{PriceBar, validate_series};
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ClosedTrade, ExitReason};
use crate::domain::rule_eval::{CompiledAlgorithm, EvalContext, UnresolvedField};

/// When a buy signal on bar `i` is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryTiming {
    /// At the close of the signal bar.
    #[default]
    SameBarClose,
    /// At the open of bar `i + 1`.
    NextBarOpen,
}

impl FromStr for EntryTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" | "same_bar_close" => Ok(EntryTiming::SameBarClose),
            "next_open" | "next_bar_open" => Ok(EntryTiming::NextBarOpen),
            other => Err(format!("unknown entry timing '{other}' (expected close or next_open)")),
        }
    }
}

impl fmt::Display for EntryTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryTiming::SameBarClose => write!(f, "close"),
            EntryTiming::NextBarOpen => write!(f, "next_open"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    /// Annual rate, as a fraction.
    pub risk_free_rate: f64,
    pub entry_timing: EntryTiming,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_date: None,
            end_date: None,
            initial_capital: 100_000.0,
            commission_per_trade: 0.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
            risk_free_rate: 0.0,
            entry_timing: EntryTiming::SameBarClose,
        }
    }
}

impl BacktestConfig {
    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            commission_per_trade: self.commission_per_trade,
            commission_pct: self.commission_pct,
            slippage_pct: self.slippage_pct,
        }
    }
}

/// A buy rule, a sell rule and the risk controls around them.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub buy_rule: Algorithm,
    /// May be empty, in which case only risk controls close positions.
    pub sell_rule: Algorithm,
    pub position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub max_holding_period: Option<usize>,
}

impl Strategy {
    pub fn new(name: &str, buy_rule: Algorithm, sell_rule: Algorithm) -> Self {
        Strategy {
            name: name.to_string(),
            description: String::new(),
            buy_rule,
            sell_rule,
            position_size: 1.0,
            stop_loss_pct: None,
            take_profit_pct: None,
            max_holding_period: None,
        }
    }

    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            position_size: self.position_size,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            max_holding_period: self.max_holding_period,
        }
    }

    fn validate(&self) -> Result<(), RuletraderError> {
        self.buy_rule.validate()?;
        self.sell_rule.validate_conditions()?;
        if !(self.position_size > 0.0 && self.position_size <= 1.0) {
            return Err(RuletraderError::invalid_algorithm(format!(
                "position size must be in (0, 1], got {}",
                self.position_size
            )));
        }
        if let Some(stop) = self.stop_loss_pct
            && !(stop > 0.0 && stop < 1.0)
        {
            return Err(RuletraderError::invalid_algorithm(format!(
                "stop loss must be in (0, 1), got {stop}"
            )));
        }
        if let Some(target) = self.take_profit_pct
            && !(target > 0.0 && target.is_finite())
        {
            return Err(RuletraderError::invalid_algorithm(format!(
                "take profit must be a positive fraction, got {target}"
            )));
        }
        if self.max_holding_period == Some(0) {
            return Err(RuletraderError::invalid_algorithm(
                "max holding period must be at least one bar",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Fields referenced by either rule that could never be resolved.
    pub unresolved: Vec<UnresolvedField>,
    /// Buy signals that could not be filled for lack of cash.
    pub rejected_entries: usize,
}

/// Run one strategy over one symbol's bars.
///
/// Fails only on structural problems: an unusable strategy, an empty series,
/// or dates that are not strictly increasing.
pub fn run_backtest(
    symbol: &str,
    bars: &[PriceBar],
    fundamentals: Option<&FundamentalSnapshot>,
    strategy: &Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, RuletraderError> {
    strategy.validate()?;
    if bars.is_empty() {
        return Err(RuletraderError::data_unavailable(symbol, "empty price series"));
    }
    validate_series(symbol, bars)?;

    let buy = CompiledAlgorithm::compile(&strategy.buy_rule);
    let sell = CompiledAlgorithm::compile(&strategy.sell_rule);
    let indicators = IndicatorSet::compute(
        bars,
        buy.indicator_types()
            .into_iter()
            .chain(sell.indicator_types()),
    );

    let params = strategy.execution_params();
    let exec_config = config.execution_config();
    let mut portfolio = Portfolio::new(config.initial_capital);
    let mut unresolved = BTreeSet::new();
    let mut pending_entry = false;
    let mut rejected_entries = 0;
    let last = bars.len() - 1;

    let base_ctx = EvalContext::new(bars, &indicators, 0);
    let base_ctx = match fundamentals {
        Some(snapshot) => base_ctx.with_fundamentals(snapshot),
        None => base_ctx,
    };

    for (i, bar) in bars.iter().enumerate() {
        let ctx = base_ctx.at(i);
        let mut acted = false;

        if pending_entry {
            pending_entry = false;
            let fill = EntryFill {
                symbol,
                market_price: bar.open,
                date: bar.date,
                index: i,
                max_exit_date: max_exit_date(bars, i, params.max_holding_period),
            };
            acted = record_entry(
                execution::enter_long(&mut portfolio, fill, &params, &exec_config),
                symbol,
                bar.date,
                &mut rejected_entries,
            );
        }

        if let Some(position) = portfolio.position.as_ref() {
            let sell_signal = if sell.is_empty() {
                false
            } else {
                let evaluation = sell.evaluate(&ctx);
                unresolved.extend(evaluation.unresolved);
                evaluation.matched
            };

            let exit = execution::check_exit(position, bar, sell_signal).or_else(|| {
                (i == last).then_some((ExitReason::EndOfData, bar.close))
            });

            if let Some((reason, price)) = exit
                && let Some(trade) = execution::exit_position(
                    &mut portfolio,
                    price,
                    bar.date,
                    i,
                    reason,
                    &exec_config,
                )
            {
                debug!(
                    symbol,
                    date = %trade.exit_date,
                    reason = %trade.exit_reason,
                    price = trade.exit_price,
                    pnl = trade.pnl,
                    "exit"
                );
                acted = true;
            }
        }

        if !acted && portfolio.is_flat() && i < last {
            let evaluation = buy.evaluate(&ctx);
            unresolved.extend(evaluation.unresolved);
            if evaluation.matched {
                match config.entry_timing {
                    EntryTiming::NextBarOpen => pending_entry = true,
                    EntryTiming::SameBarClose => {
                        let fill = EntryFill {
                            symbol,
                            market_price: bar.close,
                            date: bar.date,
                            index: i,
                            max_exit_date: max_exit_date(bars, i, params.max_holding_period),
                        };
                        record_entry(
                            execution::enter_long(&mut portfolio, fill, &params, &exec_config),
                            symbol,
                            bar.date,
                            &mut rejected_entries,
                        );
                    }
                }
            }
        }

        portfolio.record_equity(bar.date, bar.close);
    }

    let final_equity = portfolio
        .equity_curve
        .last()
        .map_or(portfolio.cash, |p| p.equity);

    info!(
        symbol,
        strategy = %strategy.name,
        bars = bars.len(),
        trades = portfolio.closed_trades.len(),
        final_equity,
        "backtest complete"
    );

    Ok(BacktestResult {
        symbol: symbol.to_string(),
        initial_capital: config.initial_capital,
        final_equity,
        trades: portfolio.closed_trades,
        equity_curve: portfolio.equity_curve,
        unresolved: unresolved.into_iter().collect(),
        rejected_entries,
    })
}

fn max_exit_date(
    bars: &[PriceBar],
    entry_index: usize,
    max_holding_period: Option<usize>,
) -> Option<NaiveDate> {
    max_holding_period.and_then(|n| bars.get(entry_index + n).map(|b| b.date))
}

fn record_entry(
    result: EntryResult,
    symbol: &str,
    date: NaiveDate,
    rejected_entries: &mut usize,
) -> bool {
    match result {
        EntryResult::Entered {
            shares,
            execution_price,
            ..
        } => {
            debug!(symbol, %date, shares, price = execution_price, "entry");
            true
        }
        EntryResult::InsufficientCapital => {
            debug!(symbol, %date, "entry skipped: insufficient capital");
            *rejected_entries += 1;
            false
        }
        EntryResult::AlreadyInPosition => false,
    }
}
