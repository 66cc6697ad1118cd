//! Restricted arithmetic evaluator
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident '(' expr ')' | '(' expr ')'
//! ```
//!
//! `^` is right-associative and binds tighter than unary minus, so `-2^2` is `-4`.
//! Evaluation is done in `f64`; non-finite results are rejected.

use crate::config::constants::tools;
use crate::context::RequestContext;
use crate::tools::registry::error::{ToolErrorType, ToolExecutionError};
use crate::tools::schema::{PropertySchema, ToolSchema};
use crate::tools::traits::{Tool, ToolCategory};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

const MAX_EXPRESSION_LEN: usize = 1024;
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("parse_error at {position}: {message}")]
    Parse { message: String, position: usize },
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0}")]
    Domain(String),
    #[error("result is not a finite number")]
    NonFinite,
}

impl CalcError {
    fn parse(message: impl Into<String>, position: usize) -> Self {
        CalcError::Parse {
            message: message.into(),
            position,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CalcError::Parse { .. } => "parse_error",
            CalcError::DivisionByZero => "division_by_zero",
            CalcError::Domain(_) => "domain_error",
            CalcError::NonFinite => "overflow",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '*' => tokens.push((Token::Star, start)),
            '/' => tokens.push((Token::Slash, start)),
            '^' => tokens.push((Token::Caret, start)),
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            '0'..='9' | '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::parse(format!("invalid number '{literal}'"), start))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            c if c.is_ascii_alphabetic() => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(ident.to_ascii_lowercase()), start));
                continue;
            }
            other => {
                return Err(CalcError::parse(
                    format!("unexpected character '{other}'"),
                    start,
                ));
            }
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        self.pos += 1;
        token
    }

    fn descend(&mut self) -> Result<(), CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::parse("expression nested too deeply", self.position()));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        self.descend()?;
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        self.depth -= 1;
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.descend()?;
                let value = -self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            Some(Token::Plus) => {
                self.advance();
                self.descend()?;
                let value = self.unary()?;
                self.depth -= 1;
                Ok(value)
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            self.descend()?;
            let exponent = self.unary()?;
            self.depth -= 1;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect_rparen()?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if !matches!(self.advance(), Some(Token::LParen)) {
                    return Err(CalcError::parse(
                        format!("expected '(' after '{name}'"),
                        self.position(),
                    ));
                }
                let argument = self.expr()?;
                self.expect_rparen()?;
                apply_function(&name, argument, position)
            }
            Some(token) => Err(CalcError::parse(
                format!("unexpected token {}", describe(&token)),
                position,
            )),
            None => Err(CalcError::parse("unexpected end of expression", position)),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), CalcError> {
        let position = self.position();
        match self.advance() {
            Some(Token::RParen) => Ok(()),
            _ => Err(CalcError::parse("expected ')'", position)),
        }
    }
}

fn apply_function(name: &str, argument: f64, position: usize) -> Result<f64, CalcError> {
    match name {
        "sqrt" if argument < 0.0 => Err(CalcError::Domain(
            "sqrt of a negative number".to_string(),
        )),
        "sqrt" => Ok(argument.sqrt()),
        "abs" => Ok(argument.abs()),
        other => Err(CalcError::parse(format!("unknown function '{other}'"), position)),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Ident(name) => format!("'{name}'"),
        Token::Plus => "'+'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Star => "'*'".to_string(),
        Token::Slash => "'/'".to_string(),
        Token::Caret => "'^'".to_string(),
        Token::LParen => "'('".to_string(),
        Token::RParen => "')'".to_string(),
    }
}

/// Evaluate `expression` under the restricted grammar
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(CalcError::parse("expression too long", MAX_EXPRESSION_LEN));
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::parse("empty expression", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: expression.chars().count(),
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        let position = parser.position();
        let token = parser.peek().map(describe).unwrap_or_default();
        return Err(CalcError::parse(format!("unexpected token {token}"), position));
    }
    if !value.is_finite() {
        return Err(CalcError::NonFinite);
    }
    Ok(value)
}

/// Render without a trailing `.0` for integral values
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &'static str {
        tools::CALCULATOR
    }

    fn description(&self) -> &'static str {
        "Evaluate an arithmetic expression. Supports numbers, + - * / ^, unary minus, \
         parentheses and the functions sqrt(x) and abs(x)."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::new().required(
            "expression",
            PropertySchema::string("Arithmetic expression, e.g. (2 + 3) * 4").non_empty(),
        )
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Utility
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn execute(
        &self,
        _ctx: &RequestContext,
        input: Value,
    ) -> Result<Value, ToolExecutionError> {
        let expression = input
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match evaluate(expression) {
            Ok(result) => Ok(json!({
                "expression": expression,
                "result": result,
                "formatted": format_number(result),
            })),
            Err(err) => {
                let error_type = match err {
                    CalcError::Parse { .. } => ToolErrorType::InvalidParameters,
                    _ => ToolErrorType::ExecutionError,
                };
                let mut details = json!({ "reason": err.kind() });
                if let CalcError::Parse { position, .. } = &err {
                    details["position"] = json!(position);
                }
                Err(
                    ToolExecutionError::new(self.name(), error_type, err.to_string())
                        .with_details(details),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(evaluate("2+2").unwrap(), 4.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("2^3^2").unwrap(), 512.0);
        assert_eq!(evaluate("-2^2").unwrap(), -4.0);
        assert_eq!(evaluate("2^-1").unwrap(), 0.5);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("--3").unwrap(), 3.0);
    }

    #[test]
    fn functions() {
        assert_eq!(evaluate("sqrt(16) + abs(-3)").unwrap(), 7.0);
        assert_eq!(evaluate("SQRT(9)").unwrap(), 3.0);
        assert!(matches!(evaluate("sqrt(-1)"), Err(CalcError::Domain(_))));
    }

    #[test]
    fn rejects_unknown_tokens() {
        for bad in ["2 $ 3", "pow(2)", "2 +", "(1", "1)", "", "x", "1 2"] {
            let err = evaluate(bad).unwrap_err();
            assert_eq!(err.kind(), "parse_error", "input {bad:?}");
        }
    }

    #[test]
    fn overflow_and_division() {
        assert_eq!(evaluate("1/0"), Err(CalcError::DivisionByZero));
        assert_eq!(evaluate("10^400"), Err(CalcError::NonFinite));
        assert_eq!(evaluate("9007199254740993 * 1").unwrap(), 9007199254740992.0);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(1e20), "100000000000000000000");
    }

    #[tokio::test]
    async fn tool_returns_structured_result() {
        let ctx = RequestContext::new(Duration::from_secs(1));
        let output = CalculatorTool
            .execute(&ctx, json!({"expression": "2+2"}))
            .await
            .unwrap();
        assert_eq!(output["formatted"], "4");
        assert_eq!(output["result"], 4.0);

        let err = CalculatorTool
            .execute(&ctx, json!({"expression": "2 ** 3"}))
            .await
            .unwrap_err();
        assert_eq!(err.error_type, ToolErrorType::InvalidParameters);
        assert_eq!(err.details.unwrap()["reason"], "parse_error");
    }
}
