//! Batch screener.
//!
//! Applies one or more algorithms to the latest bar of many symbols. A symbol
//! whose prices cannot be fetched or validated is recorded as a skip and never
//! aborts the batch. Missing fundamentals do not skip a symbol; conditions on
//! them evaluate false and are reported as unresolved.
//!
//! Sector and market-cap filters narrow the universe before `max_symbols` is
//! applied.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::condition::Algorithm;
use crate::domain::error::RuletraderError;
use crate::domain::fundamentals::{FundamentalSnapshot, MarketCapCategory};
use crate::domain::indicator::IndicatorSet;
use crate::domain::ohlcv::{PriceBar, validate_series};
use crate::domain::rule_eval::{CompiledAlgorithm, EvalContext, UnresolvedField};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Symbols with fewer bars are skipped.
    pub min_bars: usize,
    pub max_symbols: Option<usize>,
    /// Keep only these sectors (case-insensitive). Empty keeps all.
    pub sectors: Vec<String>,
    pub market_cap_category: Option<MarketCapCategory>,
    pub parallel: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        ScreenOptions {
            start_date: None,
            end_date: None,
            min_bars: 1,
            max_symbols: None,
            sectors: Vec::new(),
            market_cap_category: None,
            parallel: false,
        }
    }
}

impl ScreenOptions {
    pub fn filters_universe(&self) -> bool {
        !self.sectors.is_empty() || self.market_cap_category.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenMatch {
    pub symbol: String,
    pub date: Option<NaiveDate>,
    /// Every field the algorithm references, valued at the evaluated bar.
    pub values: Vec<(String, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    DataUnavailable(String),
    InsufficientBars { bars: usize, minimum: usize },
    InvalidSeries(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DataUnavailable(reason) => write!(f, "{reason}"),
            SkipReason::InsufficientBars { bars, minimum } => {
                write!(f, "only {bars} bars, minimum {minimum} required")
            }
            SkipReason::InvalidSeries(reason) => write!(f, "{reason}"),
        }
    }
}

/// Why a symbol was removed from the universe before evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterReason {
    Sector(Option<String>),
    MarketCap(Option<MarketCapCategory>),
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::Sector(Some(sector)) => write!(f, "sector {sector} not selected"),
            FilterReason::Sector(None) => write!(f, "sector unknown"),
            FilterReason::MarketCap(Some(category)) => {
                write!(f, "{category} not selected")
            }
            FilterReason::MarketCap(None) => write!(f, "market cap unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenFiltered {
    pub symbol: String,
    pub reason: FilterReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSkip {
    pub symbol: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolUnresolved {
    pub symbol: String,
    pub fields: Vec<UnresolvedField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenReport {
    pub algorithm: String,
    /// Symbols that reached evaluation.
    pub evaluated: usize,
    pub matches: Vec<ScreenMatch>,
    pub skipped: Vec<ScreenSkip>,
    /// Symbols removed by the sector and market-cap filters.
    pub filtered: Vec<ScreenFiltered>,
    pub unresolved: Vec<SymbolUnresolved>,
}

impl ScreenReport {
    pub fn match_symbols(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.symbol.as_str()).collect()
    }
}

enum SymbolOutcome {
    Evaluated {
        matched: Option<ScreenMatch>,
        unresolved: Option<SymbolUnresolved>,
    },
    Skipped(ScreenSkip),
}

/// A symbol that survived the universe filters, with any snapshot fetched for them.
struct Candidate {
    symbol: String,
    fundamentals: Option<FundamentalSnapshot>,
}

/// Screen `symbols` with `algorithm`.
///
/// An empty symbol list screens everything the provider lists. Fails only
/// when the algorithm itself is unusable or the symbol list cannot be read.
pub fn screen<D>(
    data_port: &D,
    algorithm: &Algorithm,
    symbols: &[String],
    options: &ScreenOptions,
) -> Result<ScreenReport, RuletraderError>
where
    D: DataPort + Sync + ?Sized,
{
    screen_with_progress(data_port, algorithm, symbols, options, |_, _| {})
}

/// As [`screen`], reporting `(completed, total)` after each symbol.
pub fn screen_with_progress<D, F>(
    data_port: &D,
    algorithm: &Algorithm,
    symbols: &[String],
    options: &ScreenOptions,
    progress: F,
) -> Result<ScreenReport, RuletraderError>
where
    D: DataPort + Sync + ?Sized,
    F: Fn(usize, usize) + Send + Sync,
{
    algorithm.validate()?;
    let listed = resolve_universe(data_port, symbols)?;
    let (mut universe, filtered) = filter_universe(data_port, listed, options);
    if let Some(limit) = options.max_symbols {
        universe.truncate(limit);
    }
    let compiled = CompiledAlgorithm::compile(algorithm);
    let total = universe.len();
    let completed = AtomicUsize::new(0);

    debug!(algorithm = %algorithm.name, symbols = total, parallel = options.parallel, "screen start");

    let run = |candidate: &Candidate| {
        let outcome = screen_symbol(data_port, &compiled, candidate, options);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        progress(done, total);
        outcome
    };

    let outcomes: Vec<SymbolOutcome> = if options.parallel {
        universe.par_iter().map(run).collect()
    } else {
        universe.iter().map(run).collect()
    };

    let mut report = ScreenReport {
        algorithm: algorithm.name.clone(),
        evaluated: 0,
        matches: Vec::new(),
        skipped: Vec::new(),
        filtered,
        unresolved: Vec::new(),
    };

    for outcome in outcomes {
        match outcome {
            SymbolOutcome::Evaluated {
                matched,
                unresolved,
            } => {
                report.evaluated += 1;
                report.matches.extend(matched);
                report.unresolved.extend(unresolved);
            }
            SymbolOutcome::Skipped(skip) => {
                warn!(symbol = %skip.symbol, reason = %skip.reason, "skipping symbol");
                report.skipped.push(skip);
            }
        }
    }

    info!(
        algorithm = %report.algorithm,
        evaluated = report.evaluated,
        matched = report.matches.len(),
        skipped = report.skipped.len(),
        filtered = report.filtered.len(),
        "screen complete"
    );
    Ok(report)
}

/// Screen the same universe with several algorithms, one report each.
pub fn screen_many<D>(
    data_port: &D,
    algorithms: &[Algorithm],
    symbols: &[String],
    options: &ScreenOptions,
) -> Result<Vec<ScreenReport>, RuletraderError>
where
    D: DataPort + Sync + ?Sized,
{
    algorithms
        .iter()
        .map(|algorithm| screen(data_port, algorithm, symbols, options))
        .collect()
}

fn resolve_universe<D>(
    data_port: &D,
    symbols: &[String],
) -> Result<Vec<String>, RuletraderError>
where
    D: DataPort + ?Sized,
{
    let listed = if symbols.is_empty() {
        data_port.list_symbols()?
    } else {
        symbols.to_vec()
    };

    let mut seen = HashSet::new();
    Ok(listed
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect())
}

/// Apply the sector and market-cap filters. Snapshots fetched here are kept
/// on the candidate so evaluation does not fetch them again.
fn filter_universe<D>(
    data_port: &D,
    listed: Vec<String>,
    options: &ScreenOptions,
) -> (Vec<Candidate>, Vec<ScreenFiltered>)
where
    D: DataPort + ?Sized,
{
    if !options.filters_universe() {
        let candidates = listed
            .into_iter()
            .map(|symbol| Candidate {
                symbol,
                fundamentals: None,
            })
            .collect();
        return (candidates, Vec::new());
    }

    let mut candidates = Vec::new();
    let mut filtered = Vec::new();
    for symbol in listed {
        let fundamentals = match data_port.get_fundamentals(&symbol) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(symbol = %symbol, "no fundamentals for filtering: {e}");
                None
            }
        };
        match filter_reason(fundamentals.as_ref(), options) {
            Some(reason) => {
                debug!(symbol = %symbol, %reason, "filtered out");
                filtered.push(ScreenFiltered { symbol, reason });
            }
            None => candidates.push(Candidate {
                symbol,
                fundamentals,
            }),
        }
    }
    (candidates, filtered)
}

fn filter_reason(
    fundamentals: Option<&FundamentalSnapshot>,
    options: &ScreenOptions,
) -> Option<FilterReason> {
    if !options.sectors.is_empty() {
        let sector = fundamentals.and_then(FundamentalSnapshot::sector);
        let selected = sector.is_some_and(|s| {
            options
                .sectors
                .iter()
                .any(|wanted| wanted.trim().eq_ignore_ascii_case(s))
        });
        if !selected {
            return Some(FilterReason::Sector(sector.map(str::to_string)));
        }
    }
    if let Some(wanted) = options.market_cap_category {
        let category = fundamentals.and_then(FundamentalSnapshot::market_cap_category);
        if category != Some(wanted) {
            return Some(FilterReason::MarketCap(category));
        }
    }
    None
}

fn screen_symbol<D>(
    data_port: &D,
    compiled: &CompiledAlgorithm,
    candidate: &Candidate,
    options: &ScreenOptions,
) -> SymbolOutcome
where
    D: DataPort + ?Sized,
{
    let symbol = candidate.symbol.as_str();
    let skip = |reason| SymbolOutcome::Skipped(ScreenSkip {
        symbol: symbol.to_string(),
        reason,
    });

    let bars: Vec<PriceBar> = if compiled.needs_price_data() {
        match data_port.get_price_series(symbol, options.start_date, options.end_date) {
            Ok(bars) => bars,
            Err(e) => return skip(SkipReason::DataUnavailable(e.to_string())),
        }
    } else {
        Vec::new()
    };

    if compiled.needs_price_data() {
        let minimum = options.min_bars.max(1);
        if bars.len() < minimum {
            return skip(SkipReason::InsufficientBars {
                bars: bars.len(),
                minimum,
            });
        }
        if let Err(e) = validate_series(symbol, &bars) {
            return skip(SkipReason::InvalidSeries(e.to_string()));
        }
    }

    let fetched;
    let fundamentals = if !compiled.needs_fundamentals() {
        None
    } else if let Some(snapshot) = candidate.fundamentals.as_ref() {
        Some(snapshot)
    } else {
        match data_port.get_fundamentals(symbol) {
            Ok(snapshot) => {
                fetched = snapshot;
                Some(&fetched)
            }
            Err(e) => {
                warn!(symbol, "evaluating without fundamentals: {e}");
                None
            }
        }
    };

    let indicators = IndicatorSet::compute(&bars, compiled.indicator_types());
    let index = bars.len().saturating_sub(1);
    let ctx = EvalContext::new(&bars, &indicators, index);
    let ctx = match fundamentals {
        Some(snapshot) => ctx.with_fundamentals(snapshot),
        None => ctx,
    };

    let evaluation = compiled.evaluate(&ctx);
    debug!(symbol, matched = evaluation.matched, "screened");

    let matched = evaluation.matched.then(|| ScreenMatch {
        symbol: symbol.to_string(),
        date: bars.last().map(|b| b.date),
        values: compiled.resolved_values(&ctx),
    });
    let unresolved = (!evaluation.unresolved.is_empty()).then(|| SymbolUnresolved {
        symbol: symbol.to_string(),
        fields: evaluation.unresolved,
    });

    SymbolOutcome::Evaluated {
        matched,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{AlgorithmType, CompareOp, Condition, LogicalOp};
    use crate::domain::fundamentals::FundamentalSnapshot;
    use crate::domain::indicator::test_support::bars_from_closes;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeProvider {
        bars: HashMap<String, Vec<PriceBar>>,
        fundamentals: HashMap<String, FundamentalSnapshot>,
    }

    impl FakeProvider {
        fn with_closes(mut self, symbol: &str, closes: &[f64]) -> Self {
            self.bars.insert(symbol.to_string(), bars_from_closes(closes));
            self
        }

        fn with_fundamentals(mut self, symbol: &str, snapshot: FundamentalSnapshot) -> Self {
            self.fundamentals.insert(symbol.to_string(), snapshot);
            self
        }
    }

    impl DataPort for FakeProvider {
        fn get_price_series(
            &self,
            symbol: &str,
            _start: Option<NaiveDate>,
            _end: Option<NaiveDate>,
        ) -> Result<Vec<PriceBar>, RuletraderError> {
            self.bars
                .get(symbol)
                .cloned()
                .ok_or_else(|| RuletraderError::data_unavailable(symbol, "no price file"))
        }

        fn get_fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, RuletraderError> {
            self.fundamentals
                .get(symbol)
                .cloned()
                .ok_or_else(|| RuletraderError::data_unavailable(symbol, "no fundamentals"))
        }

        fn list_symbols(&self) -> Result<Vec<String>, RuletraderError> {
            let mut symbols: Vec<String> = self.bars.keys().cloned().collect();
            symbols.sort();
            Ok(symbols)
        }
    }

    fn algorithm(conditions: Vec<Condition>) -> Algorithm {
        let created = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Algorithm::new("test", AlgorithmType::Screener, conditions, created)
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_on_latest_bar() {
        let provider = FakeProvider::default()
            .with_closes("UP", &[10.0, 11.0, 12.0])
            .with_closes("DOWN", &[12.0, 11.0, 10.0]);
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 11.5)]);

        let report = screen(&provider, &algo, &[], &ScreenOptions::default()).unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.match_symbols(), vec!["UP"]);
        assert_eq!(report.matches[0].values, vec![("close".to_string(), Some(12.0))]);
    }

    #[test]
    fn missing_symbol_is_skipped_not_fatal() {
        let provider = FakeProvider::default().with_closes("UP", &[10.0, 11.0, 12.0]);
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);

        let report =
            screen(&provider, &algo, &symbols(&["UP", "GONE"]), &ScreenOptions::default()).unwrap();
        assert_eq!(report.match_symbols(), vec!["UP"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].symbol, "GONE");
        assert!(matches!(report.skipped[0].reason, SkipReason::DataUnavailable(_)));
    }

    #[test]
    fn short_series_is_skipped() {
        let provider = FakeProvider::default().with_closes("NEW", &[10.0, 11.0]);
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let options = ScreenOptions {
            min_bars: 5,
            ..ScreenOptions::default()
        };

        let report = screen(&provider, &algo, &[], &options).unwrap();
        assert_eq!(report.evaluated, 0);
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::InsufficientBars { bars: 2, minimum: 5 }
        );
    }

    #[test]
    fn missing_fundamental_fails_condition_and_is_reported() {
        let provider = FakeProvider::default()
            .with_closes("A", &[10.0])
            .with_closes("B", &[10.0])
            .with_fundamentals("A", FundamentalSnapshot::new().with("pe_ratio", 12.0))
            .with_fundamentals("B", FundamentalSnapshot::new().with_missing("pe_ratio"));
        let algo = algorithm(vec![Condition::new("pe_ratio", CompareOp::Lt, 15.0)]);

        let report = screen(&provider, &algo, &[], &ScreenOptions::default()).unwrap();
        assert_eq!(report.match_symbols(), vec!["A"]);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].symbol, "B");
    }

    #[test]
    fn symbol_without_fundamentals_is_still_evaluated() {
        let provider = FakeProvider::default().with_closes("NOFUND", &[150.0, 160.0]);
        let algo = algorithm(vec![
            Condition::new("close", CompareOp::Gt, 100.0),
            Condition::new("pe_ratio", CompareOp::Lt, 10.0).joined_by(LogicalOp::Or),
        ]);

        let report = screen(&provider, &algo, &[], &ScreenOptions::default()).unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.match_symbols(), vec!["NOFUND"]);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].fields[0].field, "pe_ratio");
    }

    #[test]
    fn fundamentals_only_rule_without_fundamentals_does_not_match() {
        let provider = FakeProvider::default().with_closes("NOFUND", &[150.0]);
        let algo = algorithm(vec![Condition::new("pe_ratio", CompareOp::Lt, 10.0)]);

        let report = screen(&provider, &algo, &[], &ScreenOptions::default()).unwrap();
        assert!(report.skipped.is_empty());
        assert!(report.matches.is_empty());
        assert_eq!(report.unresolved[0].symbol, "NOFUND");
    }

    fn sized_provider() -> FakeProvider {
        FakeProvider::default()
            .with_closes("BIG", &[10.0])
            .with_closes("MID", &[10.0])
            .with_closes("SMALL", &[10.0])
            .with_closes("UNKNOWN", &[10.0])
            .with_fundamentals(
                "BIG",
                FundamentalSnapshot::new()
                    .with("market_cap", 25_000.0 * 1e7)
                    .with_sector("Banking"),
            )
            .with_fundamentals(
                "MID",
                FundamentalSnapshot::new()
                    .with("market_cap", 8_000.0 * 1e7)
                    .with_sector("IT"),
            )
            .with_fundamentals(
                "SMALL",
                FundamentalSnapshot::new()
                    .with("market_cap", 900.0 * 1e7)
                    .with_sector("banking"),
            )
    }

    #[test]
    fn sector_filter_is_case_insensitive_and_records_exclusions() {
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let options = ScreenOptions {
            sectors: vec!["BANKING".to_string()],
            ..ScreenOptions::default()
        };

        let report = screen(&sized_provider(), &algo, &[], &options).unwrap();
        assert_eq!(report.match_symbols(), vec!["BIG", "SMALL"]);
        assert_eq!(report.evaluated, 2);
        assert_eq!(
            report.filtered,
            vec![
                ScreenFiltered {
                    symbol: "MID".to_string(),
                    reason: FilterReason::Sector(Some("IT".to_string())),
                },
                ScreenFiltered {
                    symbol: "UNKNOWN".to_string(),
                    reason: FilterReason::Sector(None),
                },
            ]
        );
    }

    #[test]
    fn market_cap_filter_uses_category() {
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let options = ScreenOptions {
            market_cap_category: Some(MarketCapCategory::Mid),
            ..ScreenOptions::default()
        };

        let report = screen(&sized_provider(), &algo, &[], &options).unwrap();
        assert_eq!(report.match_symbols(), vec!["MID"]);
        assert_eq!(report.filtered.len(), 3);
        assert!(report.filtered.contains(&ScreenFiltered {
            symbol: "BIG".to_string(),
            reason: FilterReason::MarketCap(Some(MarketCapCategory::Large)),
        }));
        assert!(report.filtered.contains(&ScreenFiltered {
            symbol: "UNKNOWN".to_string(),
            reason: FilterReason::MarketCap(None),
        }));
    }

    #[test]
    fn filters_apply_before_max_symbols() {
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let options = ScreenOptions {
            sectors: vec!["banking".to_string()],
            max_symbols: Some(2),
            ..ScreenOptions::default()
        };

        // BIG and SMALL are the only banks; truncating first would drop SMALL.
        let report = screen(&sized_provider(), &algo, &[], &options).unwrap();
        assert_eq!(report.match_symbols(), vec!["BIG", "SMALL"]);
    }

    #[test]
    fn prefetched_fundamentals_feed_evaluation() {
        let algo = algorithm(vec![Condition::new("market_cap", CompareOp::Gt, 1e10)]);
        let options = ScreenOptions {
            market_cap_category: Some(MarketCapCategory::Large),
            ..ScreenOptions::default()
        };

        let report = screen(&sized_provider(), &algo, &[], &options).unwrap();
        assert_eq!(report.match_symbols(), vec!["BIG"]);
        assert!(report.unresolved.is_empty());
    }

    #[test]
    fn fundamentals_only_rule_does_not_fetch_prices() {
        let provider = FakeProvider::default()
            .with_fundamentals("NOPRICE", FundamentalSnapshot::new().with("roe", 20.0));
        let algo = algorithm(vec![Condition::new("roe", CompareOp::Gt, 15.0)]);

        let report = screen(
            &provider,
            &algo,
            &symbols(&["NOPRICE"]),
            &ScreenOptions::default(),
        )
        .unwrap();
        assert_eq!(report.match_symbols(), vec!["NOPRICE"]);
        assert_eq!(report.matches[0].date, None);
    }

    #[test]
    fn max_symbols_limits_universe() {
        let provider = FakeProvider::default()
            .with_closes("A", &[1.0])
            .with_closes("B", &[1.0])
            .with_closes("C", &[1.0]);
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let options = ScreenOptions {
            max_symbols: Some(2),
            ..ScreenOptions::default()
        };

        let report = screen(&provider, &algo, &[], &options).unwrap();
        assert_eq!(report.match_symbols(), vec!["A", "B"]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut provider = FakeProvider::default();
        for i in 0..20 {
            let closes: Vec<f64> = (0..30).map(|j| 100.0 + ((i * j) % 7) as f64).collect();
            provider = provider.with_closes(&format!("S{i:02}"), &closes);
        }
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, "sma(5)")]);

        let sequential = screen(&provider, &algo, &[], &ScreenOptions::default()).unwrap();
        let parallel = screen(
            &provider,
            &algo,
            &[],
            &ScreenOptions {
                parallel: true,
                ..ScreenOptions::default()
            },
        )
        .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn progress_reaches_total() {
        let provider = FakeProvider::default()
            .with_closes("A", &[1.0])
            .with_closes("B", &[1.0]);
        let algo = algorithm(vec![Condition::new("close", CompareOp::Gt, 0.0)]);
        let last = AtomicUsize::new(0);

        screen_with_progress(&provider, &algo, &[], &ScreenOptions::default(), |done, total| {
            assert_eq!(total, 2);
            last.fetch_max(done, Ordering::Relaxed);
        })
        .unwrap();
        assert_eq!(last.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn empty_algorithm_is_rejected() {
        let provider = FakeProvider::default().with_closes("A", &[1.0]);
        let err = screen(&provider, &algorithm(vec![]), &[], &ScreenOptions::default()).unwrap_err();
        assert!(matches!(err, RuletraderError::InvalidAlgorithm { .. }));
    }

    #[test]
    fn screen_many_returns_report_per_algorithm() {
        let provider = FakeProvider::default().with_closes("A", &[5.0]);
        let algos = vec![
            algorithm(vec![Condition::new("close", CompareOp::Gt, 1.0)]),
            algorithm(vec![Condition::new("close", CompareOp::Gt, 10.0)]),
        ];
        let reports = screen_many(&provider, &algos, &[], &ScreenOptions::default()).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].matches.len(), 1);
        assert!(reports[1].matches.is_empty());
    }
}
