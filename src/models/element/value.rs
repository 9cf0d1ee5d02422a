use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

/// Native comparison type of an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Text,
    TextList,
    Date,
    Time,
    DateTime,
    Bool,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::TextList => "list of text",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::DateTime => "datetime",
            ValueType::Bool => "boolean",
        }
    }
}

/// An answer value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Text(String),
    Values(Vec<String>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Bool(bool),
}

impl AnswerValue {
    pub fn to_json(&self) -> Value {
        match self {
            AnswerValue::Text(s) => Value::String(s.clone()),
            AnswerValue::Values(vs) => Value::Array(vs.iter().cloned().map(Value::String).collect()),
            AnswerValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            AnswerValue::Time(t) => Value::String(t.format("%H:%M:%S%.f").to_string()),
            AnswerValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            AnswerValue::Bool(b) => Value::Bool(*b),
        }
    }

    /// Bind as a query parameter of the matching Postgres type.
    pub fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            AnswerValue::Text(s) => qb.push_bind(s.clone()),
            AnswerValue::Values(vs) => qb.push_bind(vs.clone()),
            AnswerValue::Date(d) => qb.push_bind(*d),
            AnswerValue::Time(t) => qb.push_bind(*t),
            AnswerValue::DateTime(dt) => qb.push_bind(*dt),
            AnswerValue::Bool(b) => qb.push_bind(*b),
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeError {
    pub expected: ValueType,
    pub reason: String,
}

impl NormalizeError {
    fn new(expected: ValueType, reason: impl Into<String>) -> Self {
        NormalizeError { expected, reason: reason.into() }
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}: {}", self.expected.name(), self.reason)
    }
}

impl std::error::Error for NormalizeError {}

pub fn normalize(ty: ValueType, raw: &Value) -> Result<AnswerValue, NormalizeError> {
    match ty {
        ValueType::Text => text(ty, raw).map(AnswerValue::Text),
        ValueType::TextList => text_list(raw).map(AnswerValue::Values),
        ValueType::Date => {
            let s = string(ty, raw)?;
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(AnswerValue::Date)
                .map_err(|_| NormalizeError::new(ty, format!("{s:?} is not YYYY-MM-DD")))
        }
        ValueType::Time => {
            let s = string(ty, raw)?;
            parse_time(s.trim())
                .map(AnswerValue::Time)
                .ok_or_else(|| NormalizeError::new(ty, format!("{s:?} is not HH:MM[:SS[.ffffff]]")))
        }
        ValueType::DateTime => {
            let s = string(ty, raw)?;
            parse_datetime(s.trim())
                .map(AnswerValue::DateTime)
                .ok_or_else(|| NormalizeError::new(ty, format!("{s:?} is not an RFC 3339 datetime")))
        }
        ValueType::Bool => boolean(raw).map(AnswerValue::Bool),
    }
}

fn string(ty: ValueType, raw: &Value) -> Result<&str, NormalizeError> {
    raw.as_str()
        .ok_or_else(|| NormalizeError::new(ty, format!("got {}", json_kind(raw))))
}

/// Strings pass through; numbers and booleans are stringified.
fn text(ty: ValueType, raw: &Value) -> Result<String, NormalizeError> {
    match raw {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(NormalizeError::new(ty, format!("got {}", json_kind(other)))),
    }
}

fn text_list(raw: &Value) -> Result<Vec<String>, NormalizeError> {
    let ty = ValueType::TextList;
    let items = raw
        .as_array()
        .ok_or_else(|| NormalizeError::new(ty, format!("got {}", json_kind(raw))))?;
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => match obj.get("value") {
                Some(v) => text(ty, v),
                None => Err(NormalizeError::new(ty, "list item is missing \"value\"")),
            },
            other => text(ty, other),
        })
        .collect()
}

fn boolean(raw: &Value) -> Result<bool, NormalizeError> {
    let ty = ValueType::Bool;
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(NormalizeError::new(ty, format!("{n} is not 0 or 1"))),
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(NormalizeError::new(ty, format!("{s:?} is not a boolean"))),
        },
        other => Err(NormalizeError::new(ty, format!("got {}", json_kind(other)))),
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// RFC 3339 first; naive timestamps are taken as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
