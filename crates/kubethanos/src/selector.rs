//! Namespace scope expressions.
//!
//! The scope is written in Kubernetes label-selector syntax where every key is a
//! namespace name, e.g. `prod`, `!kube-system` or `prod,staging`. The parser accepts
//! the whole grammar so that a bad operator is reported by the scope filter as
//! unsupported rather than as a syntax error.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScopeError;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").unwrap());

static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

/// Selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Exists,
    DoesNotExist,
    Equals,
    DoubleEquals,
    NotEquals,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Exists => "exists",
            Self::DoesNotExist => "!",
            Self::Equals => "=",
            Self::DoubleEquals => "==",
            Self::NotEquals => "!=",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
        };
        f.write_str(s)
    }
}

/// A single `key <op> values` term of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    operator: Operator,
    values: BTreeSet<String>,
}

impl Requirement {
    /// Build a requirement, checking the value count and format against the operator.
    pub fn new<I, S>(key: impl Into<String>, operator: Operator, values: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        validate_key(&key)?;
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();

        match operator {
            Operator::Exists | Operator::DoesNotExist => {
                if !values.is_empty() {
                    return Err(format!("values set must be empty for '{operator}'"));
                }
            }
            Operator::Equals | Operator::DoubleEquals | Operator::NotEquals => {
                if values.len() != 1 {
                    return Err(format!("exactly one value is required for '{operator}'"));
                }
            }
            Operator::In | Operator::NotIn => {
                if values.is_empty() {
                    return Err(format!("values set can't be empty for '{operator}'"));
                }
            }
            Operator::GreaterThan | Operator::LessThan => {
                if values.len() != 1 {
                    return Err(format!("exactly one value is required for '{operator}'"));
                }
                for value in &values {
                    if value.parse::<i64>().is_err() {
                        return Err(format!("value {value:?} for '{operator}' must be an integer"));
                    }
                }
            }
        }

        for value in &values {
            validate_value(value)?;
        }

        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Evaluate the requirement against a label set.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::Equals | Operator::DoubleEquals | Operator::In => {
                value.is_some_and(|v| self.values.contains(v))
            }
            Operator::NotEquals | Operator::NotIn => !value.is_some_and(|v| self.values.contains(v)),
            Operator::GreaterThan | Operator::LessThan => {
                let Some(actual) = value.and_then(|v| v.parse::<i64>().ok()) else {
                    return false;
                };
                let Some(bound) = self.values.iter().next().and_then(|v| v.parse::<i64>().ok())
                else {
                    return false;
                };
                if self.operator == Operator::GreaterThan {
                    actual > bound
                } else {
                    actual < bound
                }
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::DoubleEquals => write!(f, "{}=={}", self.key, joined()),
            Operator::NotEquals => write!(f, "{}!={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::GreaterThan => write!(f, "{}>{}", self.key, joined()),
            Operator::LessThan => write!(f, "{}<{}", self.key, joined()),
        }
    }
}

/// Parsed namespace scope. An empty selector matches every namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSelector {
    requirements: Vec<Requirement>,
}

impl ScopeSelector {
    /// Selector that matches everything.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn from_requirements(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn parse(input: &str) -> Result<Self, ScopeError> {
        let parse_err = |reason: String| ScopeError::Parse {
            selector: input.to_string(),
            reason,
        };

        let tokens = tokenize(input);
        let requirements = Parser::new(&tokens).parse().map_err(parse_err)?;
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// The namespace to list in when the scope is exactly one `Exists` requirement.
    pub fn single_namespace(&self) -> Option<&str> {
        match self.requirements.as_slice() {
            [req] if req.operator == Operator::Exists => Some(req.key()),
            _ => None,
        }
    }
}

impl FromStr for ScopeSelector {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, req) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{req}")?;
        }
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || !PREFIX_PATTERN.is_match(prefix) {
            return Err(format!("invalid key prefix {prefix:?}"));
        }
    }
    if name.is_empty() || name.len() > MAX_NAME_LEN || !NAME_PATTERN.is_match(name) {
        return Err(format!("invalid key {key:?}"));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN || !NAME_PATTERN.is_match(value) {
        return Err(format!("invalid value {value:?}"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Bang,
    Eq,
    DoubleEq,
    NotEq,
    Gt,
    Lt,
    In,
    NotIn,
    Open,
    Close,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(s) => write!(f, "{s:?}"),
            Self::Bang => f.write_str("'!'"),
            Self::Eq => f.write_str("'='"),
            Self::DoubleEq => f.write_str("'=='"),
            Self::NotEq => f.write_str("'!='"),
            Self::Gt => f.write_str("'>'"),
            Self::Lt => f.write_str("'<'"),
            Self::In => f.write_str("'in'"),
            Self::NotIn => f.write_str("'notin'"),
            Self::Open => f.write_str("'('"),
            Self::Close => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '!' | '=' | '<' | '>' | '(' | ')' | ',')
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        chars.next();
        let token = match c {
            '(' => Token::Open,
            ')' => Token::Close,
            ',' => Token::Comma,
            '>' => Token::Gt,
            '<' => Token::Lt,
            '!' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::NotEq
            }
            '!' => Token::Bang,
            '=' if chars.peek() == Some(&'=') => {
                chars.next();
                Token::DoubleEq
            }
            '=' => Token::Eq,
            _ => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || is_special(next) {
                        break;
                    }
                    ident.push(next);
                    chars.next();
                }
                match ident.as_str() {
                    "in" => Token::In,
                    "notin" => Token::NotIn,
                    _ => Token::Ident(ident),
                }
            }
        };
        tokens.push(token);
    }

    tokens
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn parse(mut self) -> Result<Vec<Requirement>, String> {
        let mut requirements = Vec::new();
        if self.tokens.is_empty() {
            return Ok(requirements);
        }

        loop {
            requirements.push(self.requirement()?);
            match self.advance() {
                None => return Ok(requirements),
                Some(Token::Comma) => {}
                Some(other) => return Err(format!("found {other}, expected ','")),
            }
        }
    }

    fn requirement(&mut self) -> Result<Requirement, String> {
        let negated = self.peek() == Some(&Token::Bang);
        if negated {
            self.pos += 1;
        }

        let key = match self.advance() {
            Some(Token::Ident(key)) => key.clone(),
            Some(other) => return Err(format!("found {other}, expected identifier")),
            None => return Err("found end of input, expected identifier".to_string()),
        };

        if negated {
            return Requirement::new(key, Operator::DoesNotExist, Vec::<String>::new());
        }

        let operator = match self.peek() {
            None | Some(Token::Comma) => {
                return Requirement::new(key, Operator::Exists, Vec::<String>::new());
            }
            Some(Token::Eq) => Operator::Equals,
            Some(Token::DoubleEq) => Operator::DoubleEquals,
            Some(Token::NotEq) => Operator::NotEquals,
            Some(Token::In) => Operator::In,
            Some(Token::NotIn) => Operator::NotIn,
            Some(Token::Gt) => Operator::GreaterThan,
            Some(Token::Lt) => Operator::LessThan,
            Some(other) => return Err(format!("found {other} after key {key:?}, expected operator")),
        };
        self.pos += 1;

        let values = match operator {
            Operator::In | Operator::NotIn => self.value_set()?,
            _ => vec![self.single_value()?],
        };
        Requirement::new(key, operator, values)
    }

    fn single_value(&mut self) -> Result<String, String> {
        match self.peek() {
            Some(Token::Ident(value)) => {
                let value = value.clone();
                self.pos += 1;
                Ok(value)
            }
            None | Some(Token::Comma) => Ok(String::new()),
            Some(other) => Err(format!("found {other}, expected value")),
        }
    }

    fn value_set(&mut self) -> Result<Vec<String>, String> {
        match self.advance() {
            Some(Token::Open) => {}
            Some(other) => return Err(format!("found {other}, expected '('")),
            None => return Err("found end of input, expected '('".to_string()),
        }

        let mut values = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.pos += 1;
            return Ok(values);
        }

        loop {
            let value = match self.peek() {
                Some(Token::Ident(value)) => {
                    let value = value.clone();
                    self.pos += 1;
                    value
                }
                Some(Token::Comma | Token::Close) => String::new(),
                Some(other) => return Err(format!("found {other}, expected value")),
                None => return Err("found end of input, expected ')'".to_string()),
            };
            values.push(value);

            match self.advance() {
                Some(Token::Comma) => {}
                Some(Token::Close) => return Ok(values),
                Some(other) => return Err(format!("found {other}, expected ',' or ')'")),
                None => return Err("found end of input, expected ')'".to_string()),
            }
        }
    }
}
