//! Condition model: typed screening conditions and algorithms.

use chrono::NaiveDateTime;
use std::fmt;

use crate::domain::error::RuletraderError;

/// Tolerance used by `==` and `!=` on floating-point values.
pub const EQ_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Eq => (lhs - rhs).abs() < EQ_EPSILON,
            CompareOp::Ne => (lhs - rhs).abs() >= EQ_EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "<" => Some(CompareOp::Lt),
            "<=" => Some(CompareOp::Le),
            ">" => Some(CompareOp::Gt),
            ">=" => Some(CompareOp::Ge),
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::Ne),
            _ => None,
        }
    }

    /// The operator whose result is the complement of this one.
    pub fn negate(&self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How a condition combines with the result accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => write!(f, "and"),
            LogicalOp::Or => write!(f, "or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionValue {
    Number(f64),
    Field(String),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Number(n) => write!(f, "{n}"),
            ConditionValue::Field(name) => f.write_str(name),
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        ConditionValue::Number(n)
    }
}

impl From<&str> for ConditionValue {
    fn from(name: &str) -> Self {
        ConditionValue::Field(name.to_string())
    }
}

/// `field OP value`, joined to its predecessor by `logical_operator`.
///
/// The first condition of an algorithm has no predecessor, so its
/// `logical_operator` is ignored.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    pub field: String,
    pub operator: CompareOp,
    pub value: ConditionValue,
    pub logical_operator: LogicalOp,
}

impl Condition {
    pub fn new(field: &str, operator: CompareOp, value: impl Into<ConditionValue>) -> Self {
        Condition {
            field: field.to_string(),
            operator,
            value: value.into(),
            logical_operator: LogicalOp::And,
        }
    }

    pub fn joined_by(mut self, logical_operator: LogicalOp) -> Self {
        self.logical_operator = logical_operator;
        self
    }

    fn validate(&self, index: usize) -> Result<(), RuletraderError> {
        if self.field.trim().is_empty() {
            return Err(RuletraderError::invalid_algorithm(format!(
                "condition {} has an empty field",
                index + 1
            )));
        }
        match &self.value {
            ConditionValue::Number(n) if !n.is_finite() => Err(RuletraderError::invalid_algorithm(
                format!("condition {} has a non-finite value", index + 1),
            )),
            ConditionValue::Field(name) if name.trim().is_empty() => {
                Err(RuletraderError::invalid_algorithm(format!(
                    "condition {} has an empty value",
                    index + 1
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AlgorithmType {
    Screener,
    Strategy,
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmType::Screener => write!(f, "screener"),
            AlgorithmType::Strategy => write!(f, "strategy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Algorithm {
    pub name: String,
    pub description: String,
    pub algorithm_type: AlgorithmType,
    pub conditions: Vec<Condition>,
    pub created_at: NaiveDateTime,
}

impl Algorithm {
    pub fn new(
        name: &str,
        algorithm_type: AlgorithmType,
        conditions: Vec<Condition>,
        created_at: NaiveDateTime,
    ) -> Self {
        Algorithm {
            name: name.to_string(),
            description: String::new(),
            algorithm_type,
            conditions,
            created_at,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Fail fast on a structurally unusable algorithm.
    pub fn validate(&self) -> Result<(), RuletraderError> {
        if self.conditions.is_empty() {
            return Err(RuletraderError::invalid_algorithm(format!(
                "'{}' has no conditions",
                self.name
            )));
        }
        self.validate_conditions()
    }

    /// Like [`Algorithm::validate`] but accepts an empty condition list.
    pub fn validate_conditions(&self) -> Result<(), RuletraderError> {
        self.conditions
            .iter()
            .enumerate()
            .try_for_each(|(i, c)| c.validate(i))
    }

    /// Render as a flat expression: `rsi(14) < 30 and price > sma(200)`.
    pub fn to_expression(&self) -> String {
        let mut out = String::new();
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                out.push_str(&format!(" {} ", condition.logical_operator));
            }
            out.push_str(&condition.to_string());
        }
        out
    }
}

/// The built-in starting points offered to users.
pub fn predefined_algorithms(created_at: NaiveDateTime) -> Vec<Algorithm> {
    use CompareOp::{Gt, Lt};

    vec![
        Algorithm::new(
            "Value Stocks",
            AlgorithmType::Screener,
            vec![
                Condition::new("pe_ratio", Lt, 20.0),
                Condition::new("roe", Gt, 15.0),
                Condition::new("debt_to_equity", Lt, 1.0),
            ],
            created_at,
        )
        .with_description("Stocks with low P/E, high ROE, low debt"),
        Algorithm::new(
            "Growth Stocks",
            AlgorithmType::Screener,
            vec![
                Condition::new("revenue_growth", Gt, 20.0),
                Condition::new("earnings_growth", Gt, 15.0),
                Condition::new("roe", Gt, 20.0),
            ],
            created_at,
        )
        .with_description("Stocks with high revenue and earnings growth"),
        Algorithm::new(
            "Oversold Momentum",
            AlgorithmType::Screener,
            vec![
                Condition::new("rsi(14)", Lt, 30.0),
                Condition::new("price", Gt, "sma(200)"),
                Condition::new("volume", Gt, 1_000_000.0),
            ],
            created_at,
        )
        .with_description("Oversold stocks with positive momentum"),
        Algorithm::new(
            "Breakout Strategy",
            AlgorithmType::Strategy,
            vec![
                Condition::new("close", Gt, "sma(50)"),
                Condition::new("volume", Gt, "volume_sma(20)"),
                Condition::new("rsi(14)", Lt, 70.0),
            ],
            created_at,
        )
        .with_description("Price breaking above resistance with volume"),
    ]
}

/// Case-insensitive template lookup by name.
pub fn find_template(name: &str, created_at: NaiveDateTime) -> Option<Algorithm> {
    predefined_algorithms(created_at)
        .into_iter()
        .find(|a| a.name.eq_ignore_ascii_case(name.trim()))
}
