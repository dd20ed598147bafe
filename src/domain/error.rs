//! Domain error types.

/// A parse error with position information for condition expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for ruletrader.
#[derive(Debug, thiserror::Error)]
pub enum RuletraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error("invalid algorithm: {reason}")]
    InvalidAlgorithm { reason: String },

    #[error("no data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("price series for {symbol} is not strictly increasing at bar {index}")]
    NonMonotonicSeries { symbol: String, index: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuletraderError {
    pub fn data_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        RuletraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_algorithm(reason: impl Into<String>) -> Self {
        RuletraderError::InvalidAlgorithm {
            reason: reason.into(),
        }
    }
}

impl From<&RuletraderError> for std::process::ExitCode {
    fn from(err: &RuletraderError) -> Self {
        let code: u8 = match err {
            RuletraderError::Io(_) => 1,
            RuletraderError::ConfigParse { .. }
            | RuletraderError::ConfigMissing { .. }
            | RuletraderError::ConfigInvalid { .. } => 2,
            RuletraderError::ConditionParse(_) | RuletraderError::InvalidAlgorithm { .. } => 4,
            RuletraderError::DataUnavailable { .. } => 5,
            RuletraderError::NonMonotonicSeries { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
