//! Condition expression parser.
//!
//! Hand-written scanner that turns a flat expression such as
//! `rsi(14) < 30 and price > sma(200)` into a typed condition list.
//! Expressions are never executed; the grammar is closed:
//!
//! ```text
//! expr      := condition (connector condition)*
//! condition := field op operand
//! operand   := number | field
//! field     := ident [ '(' args ')' ]
//! connector := and | or | && | ||        (case-insensitive keywords)
//! op        := < | <= | > | >= | == | !=
//! ```
//!
//! Errors carry the byte offset of the offending token.

use chrono::NaiveDateTime;

use crate::domain::condition::{
    Algorithm, AlgorithmType, CompareOp, Condition, ConditionValue, LogicalOp,
};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.pos,
        }
    }

    fn peek_word(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    /// Case-insensitive keyword match followed by a word boundary.
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        let remaining = self.remaining();
        let Some(head) = remaining.get(..keyword.len()) else {
            return false;
        };
        let boundary = remaining[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        if head.eq_ignore_ascii_case(keyword) && boundary {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_connector(&mut self) -> Option<LogicalOp> {
        self.skip_whitespace();
        if self.consume_keyword("and") || self.consume_exact("&&") {
            Some(LogicalOp::And)
        } else if self.consume_keyword("or") || self.consume_exact("||") {
            Some(LogicalOp::Or)
        } else {
            None
        }
    }

    fn parse_operator(&mut self) -> Result<CompareOp, ParseError> {
        self.skip_whitespace();
        // two-character operators first so `<=` is not read as `<`
        for symbol in ["<=", ">=", "==", "!=", "<", ">"] {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return CompareOp::from_symbol(symbol)
                    .ok_or_else(|| self.error(format!("unknown operator '{symbol}'")));
            }
        }
        Err(self.error(format!(
            "expected comparison operator (<, <=, >, >=, ==, !=), found '{}'",
            self.peek_word()
        )))
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if matches!(self.peek(), Some('-') | Some('+')) {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        // exponent, only when digits follow: `1e3`, `2.5E-4`
        if matches!(self.peek(), Some('e') | Some('E')) {
            let after_e = &self.remaining()[1..];
            let unsigned = after_e.strip_prefix(['+', '-']).unwrap_or(after_e);
            if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
                self.pos += 1 + (after_e.len() - unsigned.len());
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    /// Identifier with an optional parenthesised argument list, returned verbatim.
    fn parse_field(&mut self) -> Result<String, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => {
                return Err(self.error(format!(
                    "expected field name, found '{}'",
                    self.peek_word()
                )));
            }
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let name_end = self.pos;
        self.skip_whitespace();
        if self.peek() != Some('(') {
            self.pos = name_end;
            return Ok(self.input[start..name_end].to_string());
        }

        self.advance();
        loop {
            match self.peek() {
                Some(')') => {
                    self.advance();
                    break;
                }
                Some(c) if c.is_ascii_digit() || c == '.' || c == ',' || c.is_whitespace() => {
                    self.advance();
                }
                Some(c) => {
                    return Err(self.error(format!(
                        "unexpected '{c}' in field arguments"
                    )));
                }
                None => return Err(self.error("expected ')', found end of input")),
            }
        }

        let raw = &self.input[start..self.pos];
        Ok(raw.split_whitespace().collect::<Vec<_>>().join(""))
    }

    fn parse_operand(&mut self) -> Result<ConditionValue, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                self.parse_number().map(ConditionValue::Number)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.parse_field().map(ConditionValue::Field)
            }
            _ => Err(self.error(format!(
                "expected number or field, found '{}'",
                self.peek_word()
            ))),
        }
    }

    fn parse_condition(&mut self, logical_operator: LogicalOp) -> Result<Condition, ParseError> {
        let field = self.parse_field()?;
        let operator = self.parse_operator()?;
        let value = self.parse_operand()?;
        Ok(Condition {
            field,
            operator,
            value,
            logical_operator,
        })
    }

    fn parse(&mut self) -> Result<Vec<Condition>, ParseError> {
        self.skip_whitespace();
        if self.pos >= self.input.len() {
            return Err(self.error("empty expression"));
        }

        let mut conditions = vec![self.parse_condition(LogicalOp::And)?];
        while let Some(connector) = self.parse_connector() {
            conditions.push(self.parse_condition(connector)?);
        }

        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after condition: '{}'",
                self.remaining()
            )));
        }
        Ok(conditions)
    }
}

/// Parse a flat expression into conditions.
pub fn parse_conditions(input: &str) -> Result<Vec<Condition>, ParseError> {
    Parser::new(input).parse()
}

/// Parse an expression into a named algorithm.
pub fn parse_algorithm(
    name: &str,
    algorithm_type: AlgorithmType,
    input: &str,
    created_at: NaiveDateTime,
) -> Result<Algorithm, ParseError> {
    let conditions = parse_conditions(input)?;
    Ok(Algorithm::new(name, algorithm_type, conditions, created_at))
}
