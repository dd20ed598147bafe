//! CLI definition and dispatch.

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult, Strategy};
use crate::domain::benchmark::{BenchmarkComparison, compare_with_benchmark};
use crate::domain::condition::{Algorithm, AlgorithmType, find_template, predefined_algorithms};
use crate::domain::condition_parser::parse_algorithm;
use crate::domain::config_validation::{
    optional_double, optional_int, parse_date, parse_list, parse_market_cap, split_list,
    validate_backtest_config, validate_screener_config, validate_strategy_config,
};
use crate::domain::error::RuletraderError;
use crate::domain::fundamentals::MarketCapCategory;
use crate::domain::metrics::Metrics;
use crate::domain::rule_eval::CompiledAlgorithm;
use crate::domain::screener::{self, ScreenOptions, ScreenReport};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "ruletrader",
    about = "Rule-based stock screener and strategy backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy backtest over one or more symbols
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Read [strategy] from a separate file
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        /// Comma-separated symbols, overriding [backtest] symbols
        #[arg(long)]
        symbols: Option<String>,
        /// Data directory, overriding [data] path
        #[arg(long)]
        data: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Screen symbols against a rule or predefined template
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        /// Condition expression, overriding [screener] rule
        #[arg(long)]
        rule: Option<String>,
        /// Predefined template name, overriding [screener] template
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long)]
        data: Option<PathBuf>,
        /// Comma-separated sectors, overriding [screener] sectors
        #[arg(long)]
        sectors: Option<String>,
        /// large, mid or small, overriding [screener] market_cap
        #[arg(long)]
        market_cap: Option<MarketCapCategory>,
        #[arg(long)]
        parallel: bool,
    },
    /// Validate every section of a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the predefined algorithm templates
    Templates,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            strategy,
            symbols,
            data,
            dry_run,
        } => run_backtest(
            &config,
            strategy.as_deref(),
            symbols.as_deref(),
            data.as_deref(),
            dry_run,
        ),
        Command::Screen {
            config,
            rule,
            template,
            symbols,
            data,
            sectors,
            market_cap,
            parallel,
        } => run_screen(
            &config,
            rule.as_deref(),
            template.as_deref(),
            symbols.as_deref(),
            data.as_deref(),
            ScreenOverrides {
                sectors,
                market_cap,
                parallel,
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Templates => {
            run_templates();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, RuletraderError> {
    info!("loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn run_backtest(
    config_path: &Path,
    strategy_path: Option<&Path>,
    symbols_override: Option<&str>,
    data_override: Option<&Path>,
    dry_run: bool,
) -> Result<(), RuletraderError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;

    let strategy_adapter = strategy_path.map(load_config).transpose()?;
    let strategy_config: &dyn ConfigPort = match strategy_adapter.as_ref() {
        Some(a) => a,
        None => &adapter,
    };
    validate_strategy_config(strategy_config)?;

    let strategy = build_strategy(strategy_config, now())?;
    let bt_config = build_backtest_config(&adapter)?;
    let symbols = resolve_symbols(symbols_override, &adapter, "backtest");
    if symbols.is_empty() {
        return Err(RuletraderError::ConfigMissing {
            section: "backtest".into(),
            key: "symbols".into(),
        });
    }

    if dry_run {
        print_dry_run(&strategy, &bt_config, &symbols);
        return Ok(());
    }

    let data_port = CsvAdapter::new(resolve_data_path(data_override, &adapter)?);
    let benchmark = adapter
        .get_string("backtest", "benchmark")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());

    let runs = run_backtest_pipeline(&data_port, &strategy, &bt_config, &symbols, benchmark.as_deref())?;
    for run in &runs {
        print_backtest(run, &bt_config);
    }
    Ok(())
}

/// One completed backtest plus everything derived from it.
#[derive(Debug)]
pub struct BacktestRun {
    pub result: BacktestResult,
    pub metrics: Metrics,
    pub benchmark: Option<BenchmarkComparison>,
}

/// Backtest `strategy` over each symbol independently.
///
/// Symbols without data are skipped with a warning; fails with
/// `DataUnavailable` when none could be run, and on structural errors.
pub fn run_backtest_pipeline<D>(
    data_port: &D,
    strategy: &Strategy,
    bt_config: &BacktestConfig,
    symbols: &[String],
    benchmark: Option<&str>,
) -> Result<Vec<BacktestRun>, RuletraderError>
where
    D: DataPort + ?Sized,
{
    let buy = CompiledAlgorithm::compile(&strategy.buy_rule);
    let sell = CompiledAlgorithm::compile(&strategy.sell_rule);
    let needs_fundamentals = buy.needs_fundamentals() || sell.needs_fundamentals();

    let benchmark_bars = match benchmark {
        Some(symbol) => match data_port.get_price_series(symbol, bt_config.start_date, bt_config.end_date) {
            Ok(bars) => Some((symbol, bars)),
            Err(e) => {
                warn!("benchmark unavailable: {e}");
                None
            }
        },
        None => None,
    };

    let mut runs = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = match data_port.get_price_series(symbol, bt_config.start_date, bt_config.end_date) {
            Ok(bars) => bars,
            Err(e @ RuletraderError::DataUnavailable { .. }) => {
                warn!("skipping {symbol}: {e}");
                continue;
            }
            Err(e) => return Err(e),
        };

        let fundamentals = if needs_fundamentals {
            data_port
                .get_fundamentals(symbol)
                .map_err(|e| warn!("no fundamentals for {symbol}: {e}"))
                .ok()
        } else {
            None
        };

        let result = backtest_engine::run_backtest(
            symbol,
            &bars,
            fundamentals.as_ref(),
            strategy,
            bt_config,
        )?;
        let metrics = Metrics::from_result(&result, bt_config.risk_free_rate);
        let benchmark = benchmark_bars.as_ref().and_then(|(name, bench)| {
            compare_with_benchmark(&result.equity_curve, name, bench)
                .map_err(|e| warn!("benchmark comparison for {symbol} skipped: {e}"))
                .ok()
        });

        runs.push(BacktestRun {
            result,
            metrics,
            benchmark,
        });
    }

    if runs.is_empty() {
        return Err(RuletraderError::data_unavailable(
            &symbols.join(","),
            "no symbol had usable price data",
        ));
    }
    Ok(runs)
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, RuletraderError> {
    let defaults = BacktestConfig::default();
    let entry_timing = match adapter.get_string("backtest", "entry_timing") {
        Some(s) if !s.trim().is_empty() => {
            s.parse()
                .map_err(|reason| RuletraderError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "entry_timing".into(),
                    reason,
                })?
        }
        _ => defaults.entry_timing,
    };

    Ok(BacktestConfig {
        start_date: parse_date(adapter, "backtest", "start_date")?,
        end_date: parse_date(adapter, "backtest", "end_date")?,
        initial_capital: optional_double(adapter, "backtest", "initial_capital")?
            .unwrap_or(defaults.initial_capital),
        commission_per_trade: optional_double(adapter, "backtest", "commission_per_trade")?
            .unwrap_or(defaults.commission_per_trade),
        commission_pct: optional_double(adapter, "backtest", "commission_pct")?
            .unwrap_or(defaults.commission_pct),
        slippage_pct: optional_double(adapter, "backtest", "slippage_pct")?
            .unwrap_or(defaults.slippage_pct),
        risk_free_rate: optional_double(adapter, "backtest", "risk_free_rate")?
            .unwrap_or(defaults.risk_free_rate),
        entry_timing,
    })
}

pub fn build_strategy(
    adapter: &dyn ConfigPort,
    created_at: NaiveDateTime,
) -> Result<Strategy, RuletraderError> {
    let name = adapter
        .get_string("strategy", "name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();

    let buy_str = adapter
        .get_string("strategy", "buy_rule")
        .unwrap_or_default();
    let sell_str = adapter
        .get_string("strategy", "sell_rule")
        .unwrap_or_default();

    let buy_rule = parse_algorithm(
        &format!("{name} buy"),
        AlgorithmType::Strategy,
        &buy_str,
        created_at,
    )?;
    let sell_rule = if sell_str.trim().is_empty() {
        Algorithm::new(
            &format!("{name} sell"),
            AlgorithmType::Strategy,
            Vec::new(),
            created_at,
        )
    } else {
        parse_algorithm(
            &format!("{name} sell"),
            AlgorithmType::Strategy,
            &sell_str,
            created_at,
        )?
    };

    let max_holding_period = optional_int(adapter, "strategy", "max_holding_period")?
        .map(|v| usize::try_from(v).unwrap_or(0));

    Ok(Strategy {
        name,
        description,
        buy_rule,
        sell_rule,
        position_size: optional_double(adapter, "strategy", "position_size")?.unwrap_or(1.0),
        stop_loss_pct: optional_double(adapter, "strategy", "stop_loss")?,
        take_profit_pct: optional_double(adapter, "strategy", "take_profit")?,
        max_holding_period,
    })
}

/// The `--symbols` override, else the section's `symbols` list (or single `symbol`).
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
    section: &str,
) -> Vec<String> {
    let raw = symbols_override
        .map(str::to_string)
        .or_else(|| config.get_string(section, "symbols"))
        .or_else(|| config.get_string(section, "symbol"))
        .unwrap_or_default();

    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

pub fn resolve_data_path(
    data_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, RuletraderError> {
    if let Some(path) = data_override {
        return Ok(path.to_path_buf());
    }
    config
        .get_string("data", "path")
        .filter(|s| !s.trim().is_empty())
        .map(|s| PathBuf::from(s.trim()))
        .ok_or_else(|| RuletraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })
}

/// The screening algorithm: template override, rule override, then config.
pub fn build_screen_algorithm(
    config: &dyn ConfigPort,
    rule_override: Option<&str>,
    template_override: Option<&str>,
    created_at: NaiveDateTime,
) -> Result<Algorithm, RuletraderError> {
    let template = template_override.map(str::to_string).or_else(|| {
        if rule_override.is_some() {
            None
        } else {
            config
                .get_string("screener", "template")
                .filter(|s| !s.trim().is_empty())
        }
    });

    if let Some(name) = template {
        return find_template(name.trim(), created_at).ok_or_else(|| {
            RuletraderError::invalid_algorithm(format!("unknown template '{}'", name.trim()))
        });
    }

    let rule = rule_override
        .map(str::to_string)
        .or_else(|| config.get_string("screener", "rule"))
        .unwrap_or_default();
    let name = config
        .get_string("screener", "name")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Custom Screen".to_string());
    Ok(parse_algorithm(&name, AlgorithmType::Screener, &rule, created_at)?)
}

pub fn build_screen_options(config: &dyn ConfigPort) -> Result<ScreenOptions, RuletraderError> {
    let defaults = ScreenOptions::default();
    Ok(ScreenOptions {
        start_date: parse_date(config, "screener", "start_date")?,
        end_date: parse_date(config, "screener", "end_date")?,
        min_bars: optional_int(config, "screener", "min_bars")?
            .map(|v| usize::try_from(v).unwrap_or(defaults.min_bars))
            .unwrap_or(defaults.min_bars),
        max_symbols: optional_int(config, "screener", "max_symbols")?
            .and_then(|v| usize::try_from(v).ok()),
        sectors: parse_list(config, "screener", "sectors"),
        market_cap_category: parse_market_cap(config, "screener", "market_cap")?,
        parallel: config.get_bool("screener", "parallel", defaults.parallel),
    })
}

/// Command-line flags that take precedence over [screener] keys.
#[derive(Debug)]
struct ScreenOverrides {
    sectors: Option<String>,
    market_cap: Option<MarketCapCategory>,
    parallel: bool,
}

impl ScreenOverrides {
    fn apply(self, options: &mut ScreenOptions) {
        if let Some(raw) = self.sectors {
            options.sectors = split_list(&raw);
        }
        if self.market_cap.is_some() {
            options.market_cap_category = self.market_cap;
        }
        options.parallel |= self.parallel;
    }
}

fn run_screen(
    config_path: &Path,
    rule_override: Option<&str>,
    template_override: Option<&str>,
    symbols_override: Option<&str>,
    data_override: Option<&Path>,
    overrides: ScreenOverrides,
) -> Result<(), RuletraderError> {
    let adapter = load_config(config_path)?;
    if rule_override.is_none() && template_override.is_none() {
        validate_screener_config(&adapter)?;
    }

    let algorithm = build_screen_algorithm(&adapter, rule_override, template_override, now())?;
    let mut options = build_screen_options(&adapter)?;
    overrides.apply(&mut options);
    let symbols = resolve_symbols(symbols_override, &adapter, "screener");
    let data_port = CsvAdapter::new(resolve_data_path(data_override, &adapter)?);

    info!("screening with {}: {}", algorithm.name, algorithm.to_expression());
    let report = screener::screen(&data_port, &algorithm, &symbols, &options)?;
    print_screen_report(&report);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), RuletraderError> {
    let adapter = load_config(config_path)?;
    let has = |section: &str, keys: &[&str]| {
        keys.iter()
            .any(|k| adapter.get_string(section, k).is_some())
    };

    validate_backtest_config(&adapter)?;
    println!("[backtest] ok");

    if has("strategy", &["buy_rule", "sell_rule"]) {
        validate_strategy_config(&adapter)?;
        let strategy = build_strategy(&adapter, now())?;
        println!("[strategy] ok: {}", strategy.name);
        println!("  buy:  {}", strategy.buy_rule.to_expression());
        if !strategy.sell_rule.is_empty() {
            println!("  sell: {}", strategy.sell_rule.to_expression());
        }
    }

    if has("screener", &["rule", "template"]) {
        validate_screener_config(&adapter)?;
        let algorithm = build_screen_algorithm(&adapter, None, None, now())?;
        println!("[screener] ok: {}", algorithm.name);
        println!("  rule: {}", algorithm.to_expression());
    }

    println!("Configuration is valid.");
    Ok(())
}

fn run_templates() {
    for algorithm in predefined_algorithms(now()) {
        println!("{} ({})", algorithm.name, algorithm.algorithm_type);
        if !algorithm.description.is_empty() {
            println!("  {}", algorithm.description);
        }
        println!("  {}", algorithm.to_expression());
    }
}

fn print_dry_run(strategy: &Strategy, bt_config: &BacktestConfig, symbols: &[String]) {
    let buy = CompiledAlgorithm::compile(&strategy.buy_rule);
    let sell = CompiledAlgorithm::compile(&strategy.sell_rule);
    let mut indicators: Vec<String> = buy
        .indicator_types()
        .into_iter()
        .chain(sell.indicator_types())
        .map(|t| t.to_string())
        .collect();
    indicators.sort();
    indicators.dedup();

    println!("Strategy: {}", strategy.name);
    println!("  buy:  {}", strategy.buy_rule.to_expression());
    println!("  sell: {}", strategy.sell_rule.to_expression());
    println!("  entry timing: {}", bt_config.entry_timing);
    println!("Indicators: {}", indicators.join(", "));
    println!("Symbols: {}", symbols.join(", "));
    println!("Dry run complete: configuration is valid");
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn fmt_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2}"))
}

fn print_backtest(run: &BacktestRun, bt_config: &BacktestConfig) {
    let m = &run.metrics;
    println!("\n=== {} ===", run.result.symbol);
    println!("Initial Capital:  {:.2}", m.initial_capital);
    println!("Final Equity:     {:.2}", m.final_equity);
    println!("Total Return:     {:.2}%", m.total_return * 100.0);
    println!("CAGR:             {}", fmt_pct(m.cagr));
    println!("Sharpe Ratio:     {}", fmt_ratio(m.sharpe_ratio));
    println!("Sortino Ratio:    {}", fmt_ratio(m.sortino_ratio));
    println!("Calmar Ratio:     {}", fmt_ratio(m.calmar_ratio));
    println!(
        "Max Drawdown:     -{:.1}% ({} bars)",
        m.max_drawdown * 100.0,
        m.max_drawdown_duration
    );
    println!(
        "Total Trades:     {} ({} won, {} lost, {} even)",
        m.total_trades, m.trades_won, m.trades_lost, m.trades_breakeven
    );
    println!("Win Rate:         {}", fmt_pct(m.win_rate));
    println!("Profit Factor:    {}", m.profit_factor);
    println!("Avg Win / Loss:   {} / {}", fmt_ratio(m.avg_win), fmt_ratio(m.avg_loss));
    println!("Avg Holding:      {} bars", fmt_ratio(m.avg_holding_bars));
    println!("Entry Timing:     {}", bt_config.entry_timing);

    if let Some(b) = &run.benchmark {
        println!("Benchmark {}:    {:.2}%", b.benchmark, b.benchmark_return * 100.0);
        println!("  Alpha:          {:.2}%", b.alpha * 100.0);
        println!("  Beta:           {}", fmt_ratio(b.beta));
        println!("  Correlation:    {}", fmt_ratio(b.correlation));
        println!("  Info Ratio:     {}", fmt_ratio(b.information_ratio));
    }

    if !run.result.trades.is_empty() {
        println!("\nTrades:");
        for t in &run.result.trades {
            println!(
                "  {} -> {}  {} sh  {:.2} -> {:.2}  pnl {:+.2} ({:+.2}%)  {}",
                t.entry_date,
                t.exit_date,
                t.shares,
                t.entry_price,
                t.exit_price,
                t.pnl,
                t.pnl_pct * 100.0,
                t.exit_reason
            );
        }
    }

    if run.result.rejected_entries > 0 {
        eprintln!(
            "warning: {} buy signals could not be filled for lack of cash",
            run.result.rejected_entries
        );
    }
    for u in &run.result.unresolved {
        eprintln!("warning: field '{}' unresolved: {}", u.field, u.reason);
    }
}

fn print_screen_report(report: &ScreenReport) {
    println!(
        "{}: {} of {} symbols matched",
        report.algorithm,
        report.matches.len(),
        report.evaluated
    );
    for m in &report.matches {
        let values: Vec<String> = m
            .values
            .iter()
            .map(|(name, value)| format!("{name}={}", fmt_ratio(*value)))
            .collect();
        match m.date {
            Some(date) => println!("  {}  {}  {}", m.symbol, date, values.join("  ")),
            None => println!("  {}  {}", m.symbol, values.join("  ")),
        }
    }
    if !report.skipped.is_empty() {
        println!("Skipped:");
        for s in &report.skipped {
            println!("  {}: {}", s.symbol, s.reason);
        }
    }
    if !report.filtered.is_empty() {
        println!("Filtered out: {}", report.filtered.len());
        for f in &report.filtered {
            println!("  {}: {}", f.symbol, f.reason);
        }
    }
    for u in &report.unresolved {
        let fields: Vec<String> = u
            .fields
            .iter()
            .map(|f| format!("{} ({})", f.field, f.reason))
            .collect();
        eprintln!("warning: {} unresolved: {}", u.symbol, fields.join(", "));
    }
}
