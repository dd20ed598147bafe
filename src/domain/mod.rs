//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod fundamentals;
pub mod field;
pub mod condition;
pub mod condition_parser;
pub mod rule_eval;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod benchmark;
pub mod screener;
pub mod config_validation;
pub mod error;
