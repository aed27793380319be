//! The expression-evaluator collaborator interface, and a small default
//! implementation sufficient to run `!if`/`!elseif` end to end.
//!
//! The grammar of `!if` expressions is deliberately out of scope for this
//! crate (spec's "external collaborators" list); [`ExpressionBridge`] models
//! only the interface the post-processor needs. [`DefaultExpressionBridge`]
//! is a minimal recursive-descent evaluator provided so the crate is usable
//! without a project supplying its own bridge.

use crate::macros::MacroEnvironment;
use crate::model::ScopeTriple;

/// A resolved expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    /// A boolean result.
    Bool(bool),
    /// An integer result.
    Int(i64),
    /// A string result.
    Str(String),
}

impl ExprValue {
    /// C-style truthiness: nonzero integers and `true` are truthy; the
    /// empty string is falsy, any other string is truthy.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Str(s) => !s.is_empty(),
        }
    }
}

/// The tagged result of evaluating an expression, modeling the original's
/// distinguished exception kinds as a plain return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprOutcome {
    /// Evaluation succeeded.
    Value(ExprValue),
    /// An identifier referenced in the expression has no bound value.
    /// The post-processor downgrades this to `false` for `!if`/`!elseif`.
    SymbolMissing(String),
    /// Evaluation succeeded but produced a warning; the carried value is
    /// still usable.
    Warning(ExprValue, String),
    /// Evaluation failed outright and cannot be downgraded.
    Hard(String),
}

/// External collaborator: evaluates `!if`/`!elseif` expressions and
/// FEATURE_FLAG/FIXED_AT_BUILD PCD value expressions.
pub trait ExpressionBridge {
    /// Evaluate `expr` against the macros visible in `section_type`/`active`.
    fn eval(
        &self,
        expr: &str,
        macros: &MacroEnvironment,
        section_type: &str,
        active: &[ScopeTriple],
    ) -> ExprOutcome;
}

/// A small recursive-descent evaluator: `==`, `!=`, `<`, `<=`, `>`, `>=`,
/// `&&`, `||`, `!`, parenthesized groups, decimal/hex integers, quoted
/// strings, and bare identifiers resolved against the macro environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExpressionBridge;

impl ExpressionBridge for DefaultExpressionBridge {
    fn eval(
        &self,
        expr: &str,
        macros: &MacroEnvironment,
        section_type: &str,
        active: &[ScopeTriple],
    ) -> ExprOutcome {
        let mut parser = ExprParser {
            chars: expr.chars().collect(),
            pos: 0,
            macros,
            section_type,
            active,
            missing: None,
        };
        match parser.parse_or() {
            Ok(v) => {
                if let Some(name) = parser.missing.take() {
                    return ExprOutcome::SymbolMissing(name);
                }
                parser.skip_ws();
                if parser.pos != parser.chars.len() {
                    return ExprOutcome::Hard(format!(
                        "unexpected trailing input in expression: {expr}"
                    ));
                }
                ExprOutcome::Value(v)
            }
            Err(e) => ExprOutcome::Hard(e),
        }
    }
}

struct ExprParser<'a> {
    chars: Vec<char>,
    pos: usize,
    macros: &'a MacroEnvironment,
    section_type: &'a str,
    active: &'a [ScopeTriple],
    missing: Option<String>,
}

type ExprParseResult = Result<ExprValue, String>;

impl<'a> ExprParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        let target: Vec<char> = s.chars().collect();
        self.chars[self.pos..].starts_with(target.as_slice())
    }

    fn consume(&mut self, s: &str) {
        self.pos += s.chars().count();
    }

    fn parse_or(&mut self) -> ExprParseResult {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.starts_with("||") {
                self.consume("||");
                let right = self.parse_and()?;
                left = ExprValue::Bool(left.truthy() || right.truthy());
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ExprParseResult {
        let mut left = self.parse_cmp()?;
        loop {
            self.skip_ws();
            if self.starts_with("&&") {
                self.consume("&&");
                let right = self.parse_cmp()?;
                left = ExprValue::Bool(left.truthy() && right.truthy());
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_cmp(&mut self) -> ExprParseResult {
        let left = self.parse_unary()?;
        self.skip_ws();
        let op = if self.starts_with("==") {
            Some("==")
        } else if self.starts_with("!=") {
            Some("!=")
        } else if self.starts_with("<=") {
            Some("<=")
        } else if self.starts_with(">=") {
            Some(">=")
        } else if self.starts_with("<") {
            Some("<")
        } else if self.starts_with(">") {
            Some(">")
        } else {
            None
        };
        let Some(op) = op else {
            return Ok(left);
        };
        self.consume(op);
        let right = self.parse_unary()?;
        Ok(ExprValue::Bool(compare(&left, op, &right)))
    }

    fn parse_unary(&mut self) -> ExprParseResult {
        self.skip_ws();
        if self.peek() == Some('!') && !self.starts_with("!=") {
            self.consume("!");
            let v = self.parse_unary()?;
            return Ok(ExprValue::Bool(!v.truthy()));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ExprParseResult {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.consume("(");
                let v = self.parse_or()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err("expected ')'".to_string());
                }
                self.consume(")");
                Ok(v)
            }
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' => self.parse_identifier(),
            other => Err(format!("unexpected character in expression: {other:?}")),
        }
    }

    fn parse_string(&mut self) -> ExprParseResult {
        self.consume("\"");
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c == '"' {
                self.consume("\"");
                return Ok(ExprValue::Str(s));
            }
            s.push(c);
            self.pos += 1;
        }
        Err("unterminated string literal in expression".to_string())
    }

    fn parse_number(&mut self) -> ExprParseResult {
        let start = self.pos;
        if self.starts_with("0x") || self.starts_with("0X") {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let text: String = self.chars[start + 2..self.pos].iter().collect();
            let value = i64::from_str_radix(&text, 16)
                .map_err(|e| format!("invalid hex literal: {e}"))?;
            return Ok(ExprValue::Int(value));
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value: i64 = text.parse().map_err(|e| format!("invalid integer literal: {e}"))?;
        Ok(ExprValue::Int(value))
    }

    fn parse_identifier(&mut self) -> ExprParseResult {
        let start = self.pos;
        if self.peek() == Some('$') {
            self.pos += 1;
            if self.peek() == Some('(') {
                self.pos += 1;
                let name_start = self.pos;
                while self.peek().is_some_and(|c| c != ')') {
                    self.pos += 1;
                }
                let name: String = self.chars[name_start..self.pos].iter().collect();
                if self.peek() == Some(')') {
                    self.pos += 1;
                }
                return self.resolve_name(&name);
            }
        }
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "TRUE" | "true" => Ok(ExprValue::Bool(true)),
            "FALSE" | "false" => Ok(ExprValue::Bool(false)),
            _ => self.resolve_name(&name),
        }
    }

    fn resolve_name(&mut self, name: &str) -> ExprParseResult {
        match self.macros.resolve(name, self.section_type, self.active) {
            Some(v) => Ok(coerce(&v)),
            None => {
                self.missing = Some(name.to_string());
                Ok(ExprValue::Bool(false))
            }
        }
    }
}

fn coerce(text: &str) -> ExprValue {
    if let Ok(i) = text.parse::<i64>() {
        return ExprValue::Int(i);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if let Ok(i) = i64::from_str_radix(hex, 16) {
            return ExprValue::Int(i);
        }
    }
    ExprValue::Str(text.to_string())
}

fn compare(left: &ExprValue, op: &str, right: &ExprValue) -> bool {
    use std::cmp::Ordering;
    let ord = match (left, right) {
        (ExprValue::Int(a), ExprValue::Int(b)) => a.cmp(b),
        (ExprValue::Bool(a), ExprValue::Bool(b)) => a.cmp(b),
        _ => left.to_string_repr().cmp(&right.to_string_repr()),
    };
    match op {
        "==" => ord == Ordering::Equal,
        "!=" => ord != Ordering::Equal,
        "<" => ord == Ordering::Less,
        "<=" => ord != Ordering::Greater,
        ">" => ord == Ordering::Greater,
        ">=" => ord != Ordering::Less,
        _ => false,
    }
}

impl ExprValue {
    fn to_string_repr(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}
