//! Lenient field lookup over loosely structured JSON records
//!
//! Every typed field of a scenario record is resolved from an ordered list of
//! candidate keys. The first key that is present and non-null wins; empty
//! strings count as absent. Values are coerced where the intent is obvious
//! (`"12.5"` is a number, `"yes"` is a flag) and rejected otherwise.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// A present value that cannot be coerced to the requested type
#[derive(Debug, Clone, PartialEq, Error)]
#[error("field '{key}': expected {expected}, found {found}")]
pub struct FieldError {
    pub key: String,
    pub expected: &'static str,
    pub found: String,
}

impl FieldError {
    fn new(key: &str, expected: &'static str, value: &Value) -> Self {
        let mut found = value.to_string();
        if found.len() > 60 {
            let cut = (0..=60).rev().find(|i| found.is_char_boundary(*i)).unwrap_or(0);
            found.truncate(cut);
            found.push_str("...");
        }
        Self {
            key: key.to_string(),
            expected,
            found,
        }
    }
}

pub type FieldResult<T> = Result<Option<T>, FieldError>;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Read-only view over one JSON object
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// First present, non-null, non-empty value among `keys`
    fn first(&self, keys: &[&'static str]) -> Option<(&'static str, &'a Value)> {
        keys.iter().find_map(|key| match self.map.get(*key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some((*key, value)),
        })
    }

    pub fn has(&self, keys: &[&'static str]) -> bool {
        self.first(keys).is_some()
    }

    pub fn text(&self, keys: &[&'static str]) -> FieldResult<String> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(None);
        };
        match value {
            Value::String(s) => Ok(Some(s.trim().to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(FieldError::new(key, "text", other)),
        }
    }

    pub fn number(&self, keys: &[&'static str]) -> FieldResult<f64> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(FieldError::new(key, "number", value)),
        }
    }

    pub fn flag(&self, keys: &[&'static str]) -> FieldResult<bool> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Some(true),
                "false" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| FieldError::new(key, "boolean", value))
    }

    /// Calendar date; a full timestamp is truncated to its date
    pub fn date(&self, keys: &[&'static str]) -> FieldResult<NaiveDate> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(None);
        };
        let Value::String(s) = value else {
            return Err(FieldError::new(key, "date", value));
        };
        parse_date(s.trim())
            .or_else(|| parse_timestamp(s.trim()).map(|ts| ts.date_naive()))
            .map(Some)
            .ok_or_else(|| FieldError::new(key, "date", value))
    }

    /// Point in time; naive timestamps are taken as UTC, bare dates as midnight
    pub fn timestamp(&self, keys: &[&'static str]) -> FieldResult<DateTime<Utc>> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(None);
        };
        let Value::String(s) = value else {
            return Err(FieldError::new(key, "timestamp", value));
        };
        parse_timestamp(s.trim())
            .or_else(|| {
                parse_date(s.trim())
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| naive.and_utc())
            })
            .map(Some)
            .ok_or_else(|| FieldError::new(key, "timestamp", value))
    }

    pub fn object(&self, keys: &[&'static str]) -> Option<&'a Map<String, Value>> {
        self.first(keys).and_then(|(_, v)| v.as_object())
    }

    /// First array among `keys`; absent or non-array values read as empty
    pub fn array(&self, keys: &[&'static str]) -> &'a [Value] {
        self.first(keys)
            .and_then(|(_, v)| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// List of informal ids, accepting either an array or a single value
    pub fn text_list(&self, keys: &[&'static str]) -> Result<Vec<String>, FieldError> {
        let Some((key, value)) = self.first(keys) else {
            return Ok(Vec::new());
        };
        let items: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            single => vec![single],
        };
        items
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => Ok(s.trim().to_string()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(FieldError::new(key, "id list", other)),
            })
            .collect()
    }

    pub fn raw(&self) -> &'a Map<String, Value> {
        self.map
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
