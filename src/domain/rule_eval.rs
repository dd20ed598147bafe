//! Rule evaluation engine.
//!
//! Resolves condition fields against a bar of price data, pre-computed
//! indicator values and an optional fundamental snapshot, then reduces an
//! algorithm to a single boolean.
//!
//! # Evaluation Semantics
//!
//! - Conditions fold strictly left to right:
//!   `result = c0; result = result AND/OR c_i` with no operator precedence.
//! - Every condition is tested (no short-circuit) so that unresolvable fields
//!   are always reported.
//! - A field that is undefined at this bar (indicator warm-up, missing bar)
//!   makes its condition false.
//! - A field that cannot be resolved at all (unknown name, malformed period,
//!   absent fundamental) also makes its condition false and is recorded.
//! - An empty condition list evaluates to false.

use std::collections::BTreeSet;

use crate::domain::condition::{Algorithm, CompareOp, ConditionValue, LogicalOp};
use crate::domain::field::{FieldRef, PriceField, UnresolvedReason, parse_field};
use crate::domain::fundamentals::{FundamentalSnapshot, is_known_fundamental};
use crate::domain::indicator::{IndicatorSet, IndicatorType};
use crate::domain::ohlcv::PriceBar;

/// Everything a condition may look at for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub bars: &'a [PriceBar],
    pub indicators: &'a IndicatorSet,
    pub fundamentals: Option<&'a FundamentalSnapshot>,
    pub index: usize,
}

impl<'a> EvalContext<'a> {
    pub fn new(bars: &'a [PriceBar], indicators: &'a IndicatorSet, index: usize) -> Self {
        EvalContext {
            bars,
            indicators,
            fundamentals: None,
            index,
        }
    }

    pub fn with_fundamentals(mut self, fundamentals: &'a FundamentalSnapshot) -> Self {
        self.fundamentals = Some(fundamentals);
        self
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnresolvedField {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub matched: bool,
    pub unresolved: Vec<UnresolvedField>,
}

#[derive(Debug, Clone)]
struct CompiledField {
    name: String,
    parsed: Result<FieldRef, UnresolvedReason>,
}

impl CompiledField {
    fn new(name: &str) -> Self {
        CompiledField {
            name: name.trim().to_string(),
            parsed: parse_field(name),
        }
    }
}

#[derive(Debug, Clone)]
enum CompiledValue {
    Number(f64),
    Field(CompiledField),
}

#[derive(Debug, Clone)]
struct CompiledCondition {
    field: CompiledField,
    operator: CompareOp,
    value: CompiledValue,
    logical_operator: LogicalOp,
}

/// An algorithm whose field names have been parsed once up front.
#[derive(Debug, Clone)]
pub struct CompiledAlgorithm {
    conditions: Vec<CompiledCondition>,
}

impl CompiledAlgorithm {
    pub fn compile(algorithm: &Algorithm) -> Self {
        let conditions = algorithm
            .conditions
            .iter()
            .map(|c| CompiledCondition {
                field: CompiledField::new(&c.field),
                operator: c.operator,
                value: match &c.value {
                    ConditionValue::Number(n) => CompiledValue::Number(*n),
                    ConditionValue::Field(name) => CompiledValue::Field(CompiledField::new(name)),
                },
                logical_operator: c.logical_operator,
            })
            .collect();
        CompiledAlgorithm { conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn fields(&self) -> impl Iterator<Item = &CompiledField> {
        self.conditions.iter().flat_map(|c| {
            let rhs = match &c.value {
                CompiledValue::Field(f) => Some(f),
                CompiledValue::Number(_) => None,
            };
            std::iter::once(&c.field).chain(rhs)
        })
    }

    /// Indicator kinds this algorithm reads; compute these once per series.
    pub fn indicator_types(&self) -> BTreeSet<IndicatorType> {
        self.fields()
            .filter_map(|f| match &f.parsed {
                Ok(FieldRef::Indicator(r)) => Some(r.indicator_type),
                _ => None,
            })
            .collect()
    }

    /// True when any field needs a price series (price or technical fields).
    pub fn needs_price_data(&self) -> bool {
        self.fields().any(|f| {
            matches!(
                f.parsed,
                Ok(FieldRef::Price(_)) | Ok(FieldRef::Indicator(_))
            )
        })
    }

    pub fn needs_fundamentals(&self) -> bool {
        self.fields()
            .any(|f| matches!(f.parsed, Ok(FieldRef::Fundamental(_))))
    }

    /// Largest warm-up among referenced indicators.
    pub fn max_lookback(&self) -> usize {
        self.indicator_types()
            .iter()
            .map(IndicatorType::lookback)
            .max()
            .unwrap_or(0)
    }

    /// Fold the conditions left to right at `ctx.index`.
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Evaluation {
        let mut unresolved = BTreeSet::new();
        let mut result: Option<bool> = None;

        for condition in &self.conditions {
            let outcome = test_condition(condition, ctx, &mut unresolved);
            result = Some(match result {
                None => outcome,
                Some(acc) => match condition.logical_operator {
                    LogicalOp::And => acc && outcome,
                    LogicalOp::Or => acc || outcome,
                },
            });
        }

        Evaluation {
            matched: result.unwrap_or(false),
            unresolved: unresolved.into_iter().collect(),
        }
    }

    /// Value of every referenced field at `ctx.index`, in first-use order.
    pub fn resolved_values(&self, ctx: &EvalContext<'_>) -> Vec<(String, Option<f64>)> {
        let mut seen = BTreeSet::new();
        self.fields()
            .filter(|f| seen.insert(f.name.clone()))
            .map(|f| (f.name.clone(), resolve_compiled(f, ctx).ok().flatten()))
            .collect()
    }
}

fn test_condition(
    condition: &CompiledCondition,
    ctx: &EvalContext<'_>,
    unresolved: &mut BTreeSet<UnresolvedField>,
) -> bool {
    let lhs = resolve_recording(&condition.field, ctx, unresolved);
    let rhs = match &condition.value {
        CompiledValue::Number(n) => Some(*n),
        CompiledValue::Field(f) => resolve_recording(f, ctx, unresolved),
    };
    match (lhs, rhs) {
        (Some(l), Some(r)) => condition.operator.apply(l, r),
        _ => false,
    }
}

fn resolve_recording(
    field: &CompiledField,
    ctx: &EvalContext<'_>,
    unresolved: &mut BTreeSet<UnresolvedField>,
) -> Option<f64> {
    match resolve_compiled(field, ctx) {
        Ok(value) => value,
        Err(reason) => {
            unresolved.insert(UnresolvedField {
                field: field.name.clone(),
                reason: reason.to_string(),
            });
            None
        }
    }
}

fn resolve_compiled(
    field: &CompiledField,
    ctx: &EvalContext<'_>,
) -> Result<Option<f64>, UnresolvedReason> {
    match &field.parsed {
        Ok(field_ref) => resolve(field_ref, ctx),
        Err(reason) => Err(reason.clone()),
    }
}

/// Resolve a parsed field.
///
/// `Ok(None)` means the field is valid but has no value at this bar.
pub fn resolve(field: &FieldRef, ctx: &EvalContext<'_>) -> Result<Option<f64>, UnresolvedReason> {
    match field {
        FieldRef::Price(price) => Ok(ctx.bars.get(ctx.index).map(|bar| match price {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::Volume => bar.volume,
        })),
        FieldRef::Indicator(reference) => Ok(ctx.indicators.value(reference, ctx.index)),
        FieldRef::Fundamental(name) => {
            if let Some(value) = ctx.fundamentals.and_then(|s| s.get(name)) {
                return Ok(Some(value));
            }
            let listed = ctx.fundamentals.is_some_and(|s| s.has_field(name));
            if listed || is_known_fundamental(name) {
                Err(UnresolvedReason::MissingFundamental)
            } else {
                Err(UnresolvedReason::Unknown)
            }
        }
    }
}

/// Resolve a field by name.
pub fn resolve_field(name: &str, ctx: &EvalContext<'_>) -> Result<Option<f64>, UnresolvedReason> {
    resolve(&parse_field(name)?, ctx)
}

/// Evaluate `algorithm` with unresolved-field reporting.
pub fn evaluate_detailed(algorithm: &Algorithm, ctx: &EvalContext<'_>) -> Evaluation {
    CompiledAlgorithm::compile(algorithm).evaluate(ctx)
}

pub fn evaluate(algorithm: &Algorithm, ctx: &EvalContext<'_>) -> bool {
    evaluate_detailed(algorithm, ctx).matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::condition::{AlgorithmType, Condition};
    use crate::domain::indicator::test_support::bars_from_closes;
    use chrono::{NaiveDate, NaiveDateTime};

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn algo(conditions: Vec<Condition>) -> Algorithm {
        Algorithm::new("test", AlgorithmType::Screener, conditions, created())
    }

    fn snapshot() -> FundamentalSnapshot {
        FundamentalSnapshot::new()
            .with("pe_ratio", 15.0)
            .with("roe", 22.0)
            .with_missing("debt_to_equity")
    }

    #[test]
    fn empty_algorithm_is_false() {
        let set = IndicatorSet::new();
        let bars = bars_from_closes(&[1.0]);
        let ctx = EvalContext::new(&bars, &set, 0);
        assert!(!evaluate(&algo(vec![]), &ctx));
    }

    #[test]
    fn price_field_comparison() {
        let bars = bars_from_closes(&[100.0, 105.0]);
        let set = IndicatorSet::new();
        let a = algo(vec![Condition::new("price", CompareOp::Gt, 101.0)]);
        assert!(!evaluate(&a, &EvalContext::new(&bars, &set, 0)));
        assert!(evaluate(&a, &EvalContext::new(&bars, &set, 1)));
    }

    #[test]
    fn fold_is_strictly_left_to_right() {
        // A=false, B=true, C=true: (A and B) or C = true; A and (B or C) would be false
        let bars = bars_from_closes(&[10.0]);
        let set = IndicatorSet::new();
        let a = algo(vec![
            Condition::new("close", CompareOp::Gt, 50.0),
            Condition::new("close", CompareOp::Lt, 50.0),
            Condition::new("close", CompareOp::Eq, 10.0).joined_by(LogicalOp::Or),
        ]);
        assert!(evaluate(&a, &EvalContext::new(&bars, &set, 0)));
    }

    #[test]
    fn or_then_and_fold() {
        // (true or false) and false = false
        let bars = bars_from_closes(&[10.0]);
        let set = IndicatorSet::new();
        let a = algo(vec![
            Condition::new("close", CompareOp::Eq, 10.0),
            Condition::new("close", CompareOp::Gt, 50.0).joined_by(LogicalOp::Or),
            Condition::new("close", CompareOp::Gt, 50.0),
        ]);
        assert!(!evaluate(&a, &EvalContext::new(&bars, &set, 0)));
    }

    #[test]
    fn first_logical_operator_is_ignored() {
        let bars = bars_from_closes(&[10.0]);
        let set = IndicatorSet::new();
        let a = algo(vec![
            Condition::new("close", CompareOp::Eq, 10.0).joined_by(LogicalOp::Or),
        ]);
        assert!(evaluate(&a, &EvalContext::new(&bars, &set, 0)));
    }

    #[test]
    fn warmup_indicator_is_false_not_unresolved() {
        let bars = bars_from_closes(&[10.0, 11.0, 12.0]);
        let a = algo(vec![Condition::new("sma(3)", CompareOp::Lt, 1000.0)]);
        let compiled = CompiledAlgorithm::compile(&a);
        let set = IndicatorSet::compute(&bars, compiled.indicator_types());
        let early = compiled.evaluate(&EvalContext::new(&bars, &set, 1));
        assert!(!early.matched);
        assert!(early.unresolved.is_empty());
        assert!(compiled.evaluate(&EvalContext::new(&bars, &set, 2)).matched);
    }

    #[test]
    fn return_and_drawdown_fields_resolve() {
        let closes: Vec<f64> = (100..=110).map(f64::from).collect();
        let bars = bars_from_closes(&closes);
        let a = algo(vec![
            Condition::new("return_5d", CompareOp::Gt, 0.04),
            Condition::new("drawdown", CompareOp::Gt, -0.5),
        ]);
        let compiled = CompiledAlgorithm::compile(&a);
        let set = IndicatorSet::compute(&bars, compiled.indicator_types());
        let evaluation = compiled.evaluate(&EvalContext::new(&bars, &set, 10));
        assert!(evaluation.matched);
        assert!(evaluation.unresolved.is_empty());
        assert!(!compiled.evaluate(&EvalContext::new(&bars, &set, 4)).matched);
    }

    #[test]
    fn undefined_rsi_never_matches_below_threshold() {
        let bars = bars_from_closes(&[10.0, 9.0, 8.0]);
        let a = algo(vec![Condition::new("rsi(14)", CompareOp::Lt, 30.0)]);
        let compiled = CompiledAlgorithm::compile(&a);
        let set = IndicatorSet::compute(&bars, compiled.indicator_types());
        for i in 0..bars.len() {
            assert!(!compiled.evaluate(&EvalContext::new(&bars, &set, i)).matched);
        }
    }

    #[test]
    fn field_to_field_comparison() {
        let bars = bars_from_closes(&[10.0, 20.0, 30.0]);
        let a = algo(vec![Condition::new("price", CompareOp::Gt, "sma(2)")]);
        let compiled = CompiledAlgorithm::compile(&a);
        let set = IndicatorSet::compute(&bars, compiled.indicator_types());
        assert!(!compiled.evaluate(&EvalContext::new(&bars, &set, 0)).matched);
        assert!(compiled.evaluate(&EvalContext::new(&bars, &set, 2)).matched);
    }

    #[test]
    fn fundamental_lookup() {
        let bars: Vec<PriceBar> = Vec::new();
        let set = IndicatorSet::new();
        let snap = snapshot();
        let ctx = EvalContext::new(&bars, &set, 0).with_fundamentals(&snap);
        let a = algo(vec![
            Condition::new("pe_ratio", CompareOp::Lt, 20.0),
            Condition::new("roe", CompareOp::Gt, 15.0),
        ]);
        assert!(evaluate(&a, &ctx));
    }

    #[test]
    fn missing_fundamental_is_false_and_reported() {
        let bars: Vec<PriceBar> = Vec::new();
        let set = IndicatorSet::new();
        let snap = snapshot();
        let ctx = EvalContext::new(&bars, &set, 0).with_fundamentals(&snap);
        let a = algo(vec![
            Condition::new("pe_ratio", CompareOp::Lt, 20.0),
            Condition::new("debt_to_equity", CompareOp::Lt, 1.0),
        ]);
        let eval = evaluate_detailed(&a, &ctx);
        assert!(!eval.matched);
        assert_eq!(eval.unresolved.len(), 1);
        assert_eq!(eval.unresolved[0].field, "debt_to_equity");
        assert_eq!(eval.unresolved[0].reason, "fundamental value not available");
    }

    #[test]
    fn unknown_and_malformed_are_reported_without_short_circuit() {
        let bars = bars_from_closes(&[10.0]);
        let set = IndicatorSet::new();
        let ctx = EvalContext::new(&bars, &set, 0);
        let a = algo(vec![
            Condition::new("close", CompareOp::Gt, 50.0),
            Condition::new("foo(3)", CompareOp::Gt, 1.0),
            Condition::new("sma(0)", CompareOp::Gt, 1.0).joined_by(LogicalOp::Or),
            Condition::new("mystery_metric", CompareOp::Gt, 1.0).joined_by(LogicalOp::Or),
        ]);
        let eval = evaluate_detailed(&a, &ctx);
        assert!(!eval.matched);
        let fields: Vec<&str> = eval.unresolved.iter().map(|u| u.field.as_str()).collect();
        assert_eq!(fields, vec!["foo(3)", "mystery_metric", "sma(0)"]);
        assert!(eval.unresolved[0].reason.contains("unknown"));
    }

    #[test]
    fn round_trip_all_and_conditions() {
        let bars = bars_from_closes(&[50.0]);
        let set = IndicatorSet::new();
        let snap = snapshot();
        let ctx = EvalContext::new(&bars, &set, 0).with_fundamentals(&snap);
        let conditions = vec![
            Condition::new("close", CompareOp::Ge, 50.0),
            Condition::new("pe_ratio", CompareOp::Le, 15.0),
            Condition::new("roe", CompareOp::Eq, 22.0),
        ];
        assert!(evaluate(&algo(conditions.clone()), &ctx));
        for i in 0..conditions.len() {
            let mut violated = conditions.clone();
            violated[i].operator = violated[i].operator.negate();
            assert!(!evaluate(&algo(violated), &ctx), "condition {i}");
        }
    }

    #[test]
    fn resolve_field_namespaces() {
        let bars = bars_from_closes(&[10.0, 20.0]);
        let set = IndicatorSet::compute(&bars, [IndicatorType::Sma(2)]);
        let snap = snapshot();
        let ctx = EvalContext::new(&bars, &set, 1).with_fundamentals(&snap);
        assert_eq!(resolve_field("close", &ctx), Ok(Some(20.0)));
        assert_eq!(resolve_field("sma_2", &ctx), Ok(Some(15.0)));
        assert_eq!(resolve_field("pe_ratio", &ctx), Ok(Some(15.0)));
        assert_eq!(
            resolve_field("roa", &ctx),
            Err(UnresolvedReason::MissingFundamental)
        );
        assert_eq!(resolve_field("bogus", &ctx), Err(UnresolvedReason::Unknown));
    }

    #[test]
    fn compiled_requirements() {
        let a = algo(vec![
            Condition::new("rsi(14)", CompareOp::Lt, 30.0),
            Condition::new("price", CompareOp::Gt, "sma(200)"),
            Condition::new("roe", CompareOp::Gt, 10.0),
        ]);
        let compiled = CompiledAlgorithm::compile(&a);
        let types: Vec<IndicatorType> = compiled.indicator_types().into_iter().collect();
        assert_eq!(types, vec![IndicatorType::Sma(200), IndicatorType::Rsi(14)]);
        assert!(compiled.needs_price_data());
        assert!(compiled.needs_fundamentals());
        assert_eq!(compiled.max_lookback(), 199);

        let fundamentals_only = CompiledAlgorithm::compile(&algo(vec![Condition::new(
            "pe_ratio",
            CompareOp::Lt,
            20.0,
        )]));
        assert!(!fundamentals_only.needs_price_data());
    }

    #[test]
    fn resolved_values_in_first_use_order() {
        let bars = bars_from_closes(&[10.0, 20.0]);
        let a = algo(vec![
            Condition::new("close", CompareOp::Gt, "sma(2)"),
            Condition::new("close", CompareOp::Gt, 1.0),
        ]);
        let compiled = CompiledAlgorithm::compile(&a);
        let set = IndicatorSet::compute(&bars, compiled.indicator_types());
        let values = compiled.resolved_values(&EvalContext::new(&bars, &set, 1));
        assert_eq!(
            values,
            vec![
                ("close".to_string(), Some(20.0)),
                ("sma(2)".to_string(), Some(15.0))
            ]
        );
    }
}
