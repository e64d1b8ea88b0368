use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::types::ScalarKind;

/// Raw value held by a node field.
///
/// Hosts keep everything as text except boolean fields, which are two-state
/// toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Toggle(bool),
    Text(String),
}

impl FieldValue {
    /// The text of a [`FieldValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Toggle(_) => None,
        }
    }
}

/// A value that does not fit the field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub expected: &'static str,
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl Mismatch {
    fn new(expected: &'static str, actual: impl fmt::Display) -> Self {
        Self {
            expected,
            actual: actual.to_string(),
        }
    }
}

impl ScalarKind {
    /// Whether a configuration value belongs to this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarKind::String | ScalarKind::Enum => value.is_string(),
            ScalarKind::Number => value.is_number(),
            ScalarKind::Integer => value.is_i64() || value.is_u64(),
            ScalarKind::Boolean => value.is_boolean(),
        }
    }

    /// Host representation of a configuration value.
    ///
    /// `null` maps to `None`. Conversion is coarse: any scalar can become
    /// text, only booleans (or their text spelling) become toggles.
    pub fn to_field(&self, value: &Value) -> Result<Option<FieldValue>, Mismatch> {
        match (self, value) {
            (_, Value::Null) => Ok(None),
            (_, Value::Array(_) | Value::Object(_)) => {
                Err(Mismatch::new(self.expected(), value))
            }
            (ScalarKind::Boolean, Value::Bool(b)) => Ok(Some(FieldValue::Toggle(*b))),
            (ScalarKind::Boolean, Value::String(s)) => match s.as_str() {
                "true" => Ok(Some(FieldValue::Toggle(true))),
                "false" => Ok(Some(FieldValue::Toggle(false))),
                _ => Err(Mismatch::new("boolean", value)),
            },
            (ScalarKind::Boolean, _) => Err(Mismatch::new("boolean", value)),
            (ScalarKind::Number | ScalarKind::Integer, Value::Bool(_)) => {
                Err(Mismatch::new(self.expected(), value))
            }
            (_, Value::String(s)) => Ok(Some(FieldValue::Text(s.clone()))),
            (_, other) => Ok(Some(FieldValue::Text(other.to_string()))),
        }
    }

    /// Configuration value of a raw field.
    ///
    /// Empty text means absent. Numeric text that does not parse is an
    /// error the caller treats as absent.
    pub fn from_field(&self, raw: Option<&FieldValue>) -> Result<Option<Value>, Mismatch> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        match (self, raw) {
            (ScalarKind::Boolean, FieldValue::Toggle(b)) => Ok(Some(Value::Bool(*b))),
            (ScalarKind::String | ScalarKind::Enum, FieldValue::Toggle(b)) => {
                Ok(Some(Value::String(b.to_string())))
            }
            (_, FieldValue::Toggle(b)) => Err(Mismatch::new(self.expected(), b)),
            (_, FieldValue::Text(s)) if s.is_empty() => Ok(None),
            (ScalarKind::String | ScalarKind::Enum, FieldValue::Text(s)) => {
                Ok(Some(Value::String(s.clone())))
            }
            (ScalarKind::Boolean, FieldValue::Text(s)) => match s.trim() {
                "true" => Ok(Some(Value::Bool(true))),
                "false" => Ok(Some(Value::Bool(false))),
                "" => Ok(None),
                _ => Err(Mismatch::new("boolean", s)),
            },
            (ScalarKind::Number, FieldValue::Text(s)) => parse_number(s.trim())
                .map(Some)
                .ok_or_else(|| Mismatch::new("number", s)),
            (ScalarKind::Integer, FieldValue::Text(s)) => parse_integer(s.trim())
                .map(Some)
                .ok_or_else(|| Mismatch::new("integer", s)),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Enum => "enum option",
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(i.into()));
    }
    if let Ok(u) = s.parse::<u64>() {
        return Some(Value::Number(u.into()));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_integer(s: &str) -> Option<Value> {
    if let Some(v) = s.parse::<i64>().ok().map(Value::from) {
        return Some(v);
    }
    if let Some(v) = s.parse::<u64>().ok().map(Value::from) {
        return Some(v);
    }
    // "3.0" still names an integer
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then(|| Value::from(f as i64))
}
