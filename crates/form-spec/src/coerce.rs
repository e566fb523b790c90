use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value};

use crate::spec::field::ValueAs;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of coercing raw input into the field's kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// Usable value (possibly `null` for empty input).
    Value(Value),
    /// Non-empty input that could not be interpreted; the raw value is kept.
    Invalid(Value),
}

impl Coerced {
    pub fn into_value(self) -> Value {
        match self {
            Coerced::Value(value) | Coerced::Invalid(value) => value,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Coerced::Invalid(_))
    }
}

pub fn coerce(kind: ValueAs, raw: &Value) -> Coerced {
    match kind {
        ValueAs::Text => Coerced::Value(raw.clone()),
        ValueAs::Number => coerce_number(raw),
        ValueAs::Date => coerce_date(raw),
    }
}

fn coerce_number(raw: &Value) -> Coerced {
    match raw {
        Value::Null | Value::Number(_) => Coerced::Value(raw.clone()),
        Value::String(text) if text.trim().is_empty() => Coerced::Value(Value::Null),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(number_value)
            .map(Coerced::Value)
            .unwrap_or_else(|| Coerced::Invalid(raw.clone())),
        _ => Coerced::Invalid(raw.clone()),
    }
}

fn number_value(parsed: f64) -> Option<Value> {
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        return Some(Value::Number(Number::from(parsed as i64)));
    }
    Number::from_f64(parsed).map(Value::Number)
}

fn coerce_date(raw: &Value) -> Coerced {
    match raw {
        Value::Null => Coerced::Value(Value::Null),
        Value::String(text) if text.trim().is_empty() => Coerced::Value(Value::Null),
        Value::String(text) => parse_date(text.trim())
            .map(|date| Coerced::Value(Value::String(date.format(DATE_FORMAT).to_string())))
            .unwrap_or_else(|| Coerced::Invalid(raw.clone())),
        _ => Coerced::Invalid(raw.clone()),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|stamp| stamp.date_naive())
        })
}
