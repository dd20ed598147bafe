//! Performance metrics and statistics.
//!
//! Every metric that can be mathematically undefined is an `Option` (or
//! [`ProfitFactor`]), so "not applicable" is explicit and never leaks as NaN.

use std::fmt;

use super::backtest::BacktestResult;
use super::portfolio::EquityPoint;
use super::position::ClosedTrade;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;
const MIN_STDDEV: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProfitFactor {
    Finite(f64),
    /// Winning trades but no losing ones.
    Infinite,
    /// No trades, or only breakeven trades.
    NotApplicable,
}

impl ProfitFactor {
    pub fn value(&self) -> Option<f64> {
        match self {
            ProfitFactor::Finite(v) => Some(*v),
            ProfitFactor::Infinite => Some(f64::INFINITY),
            ProfitFactor::NotApplicable => None,
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Finite(v) => write!(f, "{v:.2}"),
            ProfitFactor::Infinite => write!(f, "∞"),
            ProfitFactor::NotApplicable => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    /// Largest peak-to-trough decline as a positive fraction of the peak.
    pub max_drawdown: f64,
    /// Longest run of bars spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: Option<f64>,
    pub profit_factor: ProfitFactor,
    pub avg_win: Option<f64>,
    pub avg_loss: Option<f64>,
    pub largest_win: Option<f64>,
    pub largest_loss: Option<f64>,
    pub avg_holding_bars: Option<f64>,
}

impl Metrics {
    pub fn from_result(result: &BacktestResult, risk_free_rate: f64) -> Self {
        Self::compute(
            result.initial_capital,
            &result.trades,
            &result.equity_curve,
            risk_free_rate,
        )
    }

    pub fn compute(
        initial_capital: f64,
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let cagr = compute_cagr(initial_capital, equity_curve);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let calmar_ratio = match cagr {
            Some(c) if max_drawdown > 0.0 => Some(c / max_drawdown),
            _ => None,
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win: Option<f64> = None;
        let mut largest_loss: Option<f64> = None;
        let mut total_holding = 0usize;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = Some(largest_win.map_or(pnl, |w| w.max(pnl)));
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = Some(largest_loss.map_or(pnl.abs(), |l| l.max(pnl.abs())));
            } else {
                trades_breakeven += 1;
            }
            total_holding += trade.holding_bars;
        }

        let total_trades = trades.len();
        let win_rate = (total_trades > 0).then(|| trades_won as f64 / total_trades as f64);

        let profit_factor = if total_losses > 0.0 {
            ProfitFactor::Finite(total_wins / total_losses)
        } else if total_wins > 0.0 {
            ProfitFactor::Infinite
        } else {
            ProfitFactor::NotApplicable
        };

        Metrics {
            initial_capital,
            final_equity,
            total_return,
            cagr,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win: (trades_won > 0).then(|| total_wins / trades_won as f64),
            avg_loss: (trades_lost > 0).then(|| total_losses / trades_lost as f64),
            largest_win,
            largest_loss,
            avg_holding_bars: (total_trades > 0)
                .then(|| total_holding as f64 / total_trades as f64),
        }
    }
}

/// (final/initial)^(365.25/days) - 1 over the calendar span of the curve.
fn compute_cagr(initial_capital: f64, equity_curve: &[EquityPoint]) -> Option<f64> {
    let first = equity_curve.first()?;
    let last = equity_curve.last()?;
    let days = (last.date - first.date).num_days();
    if days < 1 || initial_capital <= 0.0 || last.equity <= 0.0 {
        return None;
    }
    Some((last.equity / initial_capital).powf(DAYS_PER_YEAR / days as f64) - 1.0)
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak;
            max_dd = max_dd.max(dd);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}

pub(crate) fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                w[1].equity / prev - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub(crate) fn sample_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (Option<f64>, Option<f64>) {
    let returns = daily_returns(equity_curve);
    let Some(stddev) = sample_stddev(&returns) else {
        return (None, None);
    };

    let excess_return = mean(&returns) - daily_rf;
    let annualise = TRADING_DAYS_PER_YEAR.sqrt();

    let sharpe = (stddev > MIN_STDDEV).then(|| excess_return / stddev * annualise);

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / returns.len() as f64).sqrt();
    let sortino = (downside_stddev > MIN_STDDEV).then(|| excess_return / downside_stddev * annualise);

    (sharpe, sortino)
}
