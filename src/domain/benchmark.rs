//! Comparison of a strategy equity curve against a benchmark price series.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::error::RuletraderError;
use super::metrics::{TRADING_DAYS_PER_YEAR, mean, sample_stddev};
use super::ohlcv::PriceBar;
use super::portfolio::EquityPoint;

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkComparison {
    pub benchmark: String,
    pub common_dates: usize,
    pub strategy_return: f64,
    pub benchmark_return: f64,
    /// Strategy total return minus benchmark total return.
    pub alpha: f64,
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
    pub information_ratio: Option<f64>,
}

/// Align both series on the dates they share and compare their returns.
///
/// Fails with `DataUnavailable` when fewer than two dates overlap.
pub fn compare_with_benchmark(
    equity_curve: &[EquityPoint],
    benchmark: &str,
    benchmark_bars: &[PriceBar],
) -> Result<BenchmarkComparison, RuletraderError> {
    let closes: HashMap<NaiveDate, f64> =
        benchmark_bars.iter().map(|b| (b.date, b.close)).collect();

    let (strategy, reference): (Vec<f64>, Vec<f64>) = equity_curve
        .iter()
        .filter_map(|p| closes.get(&p.date).map(|&c| (p.equity, c)))
        .unzip();

    if strategy.len() < 2 {
        return Err(RuletraderError::data_unavailable(
            benchmark,
            "fewer than two dates in common with the equity curve",
        ));
    }

    let strategy_return = total_return(&strategy);
    let benchmark_return = total_return(&reference);
    let strategy_returns = period_returns(&strategy);
    let benchmark_returns = period_returns(&reference);

    let beta = covariance(&strategy_returns, &benchmark_returns).and_then(|cov| {
        let var = sample_stddev(&benchmark_returns)?.powi(2);
        (var > 0.0).then(|| cov / var)
    });

    let correlation = covariance(&strategy_returns, &benchmark_returns).and_then(|cov| {
        let sd_s = sample_stddev(&strategy_returns)?;
        let sd_b = sample_stddev(&benchmark_returns)?;
        (sd_s > 0.0 && sd_b > 0.0).then(|| cov / (sd_s * sd_b))
    });

    let active: Vec<f64> = strategy_returns
        .iter()
        .zip(&benchmark_returns)
        .map(|(s, b)| s - b)
        .collect();
    let information_ratio = sample_stddev(&active)
        .filter(|&sd| sd > 0.0)
        .map(|sd| mean(&active) / sd * TRADING_DAYS_PER_YEAR.sqrt());

    Ok(BenchmarkComparison {
        benchmark: benchmark.to_string(),
        common_dates: strategy.len(),
        strategy_return,
        benchmark_return,
        alpha: strategy_return - benchmark_return,
        beta,
        correlation,
        information_ratio,
    })
}

fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let (ma, mb) = (mean(a), mean(b));
    let sum: f64 = a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum();
    Some(sum / (a.len() - 1) as f64)
}
