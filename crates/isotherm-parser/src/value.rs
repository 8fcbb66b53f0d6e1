//! Typed scalar values recovered from free-text instrument fields.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::CastError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<Value>),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("none"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::List(values) => {
                f.write_str("[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Cast a raw string into the narrowest matching [`Value`].
///
/// Heuristics run in a fixed order and the first one that accepts wins:
/// null, boolean, unsigned digits, signed integer, float, bracketed list,
/// and finally the untouched string. Integers are therefore never widened
/// to floats and bracketed lists never stay strings.
///
/// Only a bracketed list with an element that is not a scalar literal
/// fails; callers recover by keeping the raw text.
pub fn cast(raw: &str) -> Result<Value, CastError> {
    if let Some(value) = cast_scalar(raw) {
        return Ok(value);
    }
    if is_list(raw) {
        return cast_list(raw);
    }
    Ok(Value::Str(raw.to_string()))
}

fn cast_scalar(raw: &str) -> Option<Value> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Some(Value::Null);
    }
    if raw.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }

    let trimmed = raw.trim();
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(value) = trimmed.parse::<i64>() {
            return Some(Value::Int(value));
        }
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(Value::Int(value));
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Some(Value::Float(value));
    }
    None
}

fn is_list(raw: &str) -> bool {
    raw.starts_with('[') && raw.ends_with(']') && raw.len() >= 2
}

fn cast_list(raw: &str) -> Result<Value, CastError> {
    let inner = &raw[1..raw.len() - 1];
    let mut values = Vec::new();
    for token in inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
    {
        if let Some(text) = unquote(token) {
            values.push(Value::Str(text.to_string()));
            continue;
        }
        match cast_scalar(token) {
            Some(value) => values.push(value),
            None => {
                return Err(CastError::new(
                    raw,
                    format!("list element '{token}' is not a literal"),
                ))
            }
        }
    }
    Ok(Value::List(values))
}

fn unquote(token: &str) -> Option<&str> {
    let quoted = token.len() >= 2
        && ((token.starts_with('\'') && token.ends_with('\''))
            || (token.starts_with('"') && token.ends_with('"')));
    quoted.then(|| &token[1..token.len() - 1])
}

/// Interpret a field declared numeric: integer when possible, float otherwise.
pub fn cast_numeric(raw: &str) -> Result<Value, CastError> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(Value::Int(value));
    }
    trimmed
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|err| CastError::new(raw, err.to_string()))
}

static LEADING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)\s*(.*?)\s*$")
        .expect("leading number pattern is valid")
});

/// Split text such as `"77.35 K"` or `"0,1023 g"` into its number and unit token.
///
/// With `decimal_comma` commas are read as decimal marks, otherwise they
/// are treated as digit grouping and removed.
pub fn split_number_unit(text: &str, decimal_comma: bool) -> Result<(f64, String), CastError> {
    let normalized = if decimal_comma {
        text.replace(',', ".")
    } else {
        text.replace(',', "")
    };
    let captures = LEADING_NUMBER
        .captures(&normalized)
        .ok_or_else(|| CastError::new(text, "no leading number"))?;
    let number = captures[1]
        .parse::<f64>()
        .map_err(|err| CastError::new(text, err.to_string()))?;
    let unit = captures
        .get(2)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    Ok((number, unit))
}
