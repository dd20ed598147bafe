#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ruletrader::domain::backtest::{BacktestConfig, Strategy};
use ruletrader::domain::condition::{Algorithm, AlgorithmType};
use ruletrader::domain::condition_parser::parse_algorithm;
use ruletrader::domain::error::RuletraderError;
use ruletrader::domain::fundamentals::FundamentalSnapshot;
pub use ruletrader::domain::ohlcv::PriceBar;
use ruletrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub fundamentals: HashMap<String, FundamentalSnapshot>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            fundamentals: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_fundamentals(mut self, symbol: &str, snapshot: FundamentalSnapshot) -> Self {
        self.fundamentals.insert(symbol.to_string(), snapshot);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn get_price_series(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceBar>, RuletraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RuletraderError::data_unavailable(symbol, reason.clone()));
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start.is_none_or(|s| b.date >= s) && end.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(RuletraderError::data_unavailable(symbol, "no bars"));
        }
        Ok(bars)
    }

    fn get_fundamentals(&self, symbol: &str) -> Result<FundamentalSnapshot, RuletraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RuletraderError::data_unavailable(symbol, reason.clone()));
        }
        self.fundamentals
            .get(symbol)
            .cloned()
            .ok_or_else(|| RuletraderError::data_unavailable(symbol, "no fundamentals"))
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError> {
        let mut symbols: Vec<String> = self
            .data
            .keys()
            .chain(self.errors.keys())
            .cloned()
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn created_at() -> NaiveDateTime {
    date(2024, 1, 1).and_hms_opt(0, 0, 0).unwrap()
}

pub fn make_bar(date: &str, close: f64) -> PriceBar {
    PriceBar {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

/// One bar per calendar day from 2023-01-01; open = close, range of ±1.
pub fn generate_bars(closes: &[f64]) -> Vec<PriceBar> {
    let start = date(2023, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            date: start + Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000.0,
        })
        .collect()
}

pub fn algorithm(expression: &str) -> Algorithm {
    parse_algorithm("test", AlgorithmType::Strategy, expression, created_at()).unwrap()
}

pub fn make_strategy(buy: &str, sell: &str) -> Strategy {
    let sell_rule = if sell.is_empty() {
        Algorithm::new("sell", AlgorithmType::Strategy, Vec::new(), created_at())
    } else {
        algorithm(sell)
    };
    Strategy::new("Test", algorithm(buy), sell_rule)
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig::default()
}
