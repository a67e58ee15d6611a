//! Row materialization
//!
//! Applies a `FlattenedSchema` to one record at a time. Missing or null
//! values anywhere along a column's path produce an empty cell, so producing
//! a row never fails.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::TabularConfig;
use crate::error::ConfigError;
use crate::types::{Cell, FlattenedSchema, PathSegment, ScalarType};

/// Output format for date leaves: whole seconds, no zone suffix
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Produces one row of cells per record
#[derive(Debug, Clone)]
pub struct RowMaterializer {
    risky_chars: Vec<char>,
    injection_prefix: char,
}

impl RowMaterializer {
    /// Fails for configurations whose injection prefix is itself risky
    pub fn new(config: &TabularConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(RowMaterializer {
            risky_chars: config.risky_chars.clone(),
            injection_prefix: config.injection_prefix,
        })
    }

    /// One cell per column, in column order
    pub fn materialize(&self, flattened: &FlattenedSchema, record: &Value) -> Vec<Cell> {
        flattened
            .iter()
            .map(|column| match resolve_path(record, &column.path) {
                Some(leaf) => self.normalize(leaf, column.scalar_type),
                None => Cell::Empty,
            })
            .collect()
    }

    fn normalize(&self, leaf: &Value, scalar_type: ScalarType) -> Cell {
        if scalar_type == ScalarType::Date {
            if let Some(formatted) = format_date(leaf) {
                return Cell::Text(formatted);
            }
        }

        match leaf {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => Cell::Number(n.clone()),
            Value::String(s) => Cell::Text(self.protect(s)),
            // Containers reaching a leaf position are rendered as JSON
            other => Cell::Text(self.protect(&other.to_string())),
        }
    }

    /// Prefix strings that a spreadsheet would evaluate as a formula.
    ///
    /// The prefix is never risky, so one insertion always leaves a safe string.
    pub fn protect(&self, text: &str) -> String {
        match text.chars().next() {
            Some(c) if self.risky_chars.contains(&c) => {
                let mut protected = String::with_capacity(text.len() + self.injection_prefix.len_utf8());
                protected.push(self.injection_prefix);
                protected.push_str(text);
                protected
            }
            _ => text.to_string(),
        }
    }
}

/// Walk `record` along `path`, stopping at the first null or missing step
pub fn resolve_path<'v>(record: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    let mut current = record;
    for segment in path {
        current = match (segment, current) {
            (_, Value::Null) => return None,
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
            _ => return None,
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Parse ISO-8601 strings or epoch milliseconds into the fixed output format.
/// A date without a time reads as midnight UTC.
fn format_date(value: &Value) -> Option<String> {
    let timestamp: DateTime<Utc> = match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(_) => match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                Ok(naive) => naive.and_utc(),
                Err(_) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)?
                    .and_utc(),
            },
        },
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?)?,
        _ => return None,
    };

    // Outside four-digit years chrono emits a sign, which is no longer ISO-8601
    if !(0..=9999).contains(&timestamp.year()) {
        return None;
    }
    Some(timestamp.format(DATE_FORMAT).to_string())
}

/// Shape of a response body, decided before any row is produced
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    /// Records to flatten; a lone mapping becomes a one-record sequence
    Records(Vec<Value>),
    /// Bare scalar, passed through with quotes escaped
    Scalar(String),
}

impl Dataset {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(records) => Dataset::Records(records),
            Value::Object(_) => Dataset::Records(vec![value]),
            Value::Null => Dataset::Scalar(String::new()),
            Value::String(s) => Dataset::Scalar(s.replace('"', "\"\"")),
            other => Dataset::Scalar(other.to_string().replace('"', "\"\"")),
        }
    }
}
