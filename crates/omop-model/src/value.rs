//! Cell values and natural-key normalization.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::FieldType;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// One cell of an entity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn opt_text(value: Option<impl Into<String>>) -> Self {
        value.map_or(Self::Null, |v| Self::Text(v.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Converts the value to the declared column type.
    ///
    /// Stores hand values back in their own representation (dates as text,
    /// whole floats as integers); coercion makes rows from the store and
    /// rows from the assembler comparable.
    pub fn coerce(self, ty: FieldType) -> Result<Self, ValueError> {
        let coerced = match (ty, self) {
            (_, Self::Null) => Self::Null,
            (FieldType::Integer, Self::Integer(v)) => Self::Integer(v),
            (FieldType::Integer, Self::Float(v)) if v.is_finite() && v.fract() == 0.0 => {
                Self::Integer(v as i64)
            }
            (FieldType::Integer, Self::Text(s)) => match s.trim().parse::<i64>() {
                Ok(v) => Self::Integer(v),
                Err(_) if s.trim().is_empty() => Self::Null,
                Err(_) => return Err(ValueError::new(ty, s)),
            },
            (FieldType::Float, Self::Float(v)) => Self::Float(v),
            (FieldType::Float, Self::Integer(v)) => Self::Float(v as f64),
            (FieldType::Float, Self::Text(s)) => match s.trim().parse::<f64>() {
                Ok(v) => Self::Float(v),
                Err(_) if s.trim().is_empty() => Self::Null,
                Err(_) => return Err(ValueError::new(ty, s)),
            },
            (FieldType::Text, Self::Text(s)) => Self::Text(s),
            (FieldType::Text, other) => Self::Text(other.to_string()),
            (FieldType::Date, Self::Date(d)) => Self::Date(d),
            (FieldType::Date, Self::DateTime(dt)) => Self::Date(dt.date()),
            (FieldType::Date, Self::Text(s)) => match parse_date(&s) {
                Some(d) => Self::Date(d),
                None if s.trim().is_empty() => Self::Null,
                None => return Err(ValueError::new(ty, s)),
            },
            (FieldType::DateTime, Self::DateTime(dt)) => Self::DateTime(dt),
            (FieldType::DateTime, Self::Date(d)) => {
                Self::DateTime(d.and_time(chrono::NaiveTime::MIN))
            }
            (FieldType::DateTime, Self::Text(s)) => match parse_datetime(&s) {
                Some(dt) => Self::DateTime(dt),
                None if s.trim().is_empty() => Self::Null,
                None => return Err(ValueError::new(ty, s)),
            },
            (ty, other) => return Err(ValueError::new(ty, other.to_string())),
        };
        Ok(coerced)
    }

    /// Normalized comparison form. Missing values collapse to one sentinel.
    pub fn key_cell(&self) -> KeyCell {
        match self {
            Self::Null => KeyCell::Missing,
            Self::Integer(v) => KeyCell::Integer(*v),
            Self::Float(v) if v.is_nan() => KeyCell::Missing,
            // -0.0 and 0.0 are the same measurement.
            Self::Float(v) => KeyCell::Float((v + 0.0).to_bits()),
            Self::Text(s) if s.trim().is_empty() => KeyCell::Missing,
            Self::Text(s) => KeyCell::Text(s.trim().to_string()),
            Self::Date(d) => KeyCell::Date(*d),
            Self::DateTime(dt) => KeyCell::DateTime(*dt),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Option<i64>> for Value {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Hashable, normalized form of a [`Value`] used for duplicate detection.
///
/// `Missing` is distinct from every real value, including the empty string
/// and zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyCell {
    Missing,
    Integer(i64),
    Float(u64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// The natural-key projection of one row.
pub type NaturalKey = Vec<KeyCell>;

/// A value that cannot be represented in its declared column type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("value '{value}' is not a valid {expected:?}")]
pub struct ValueError {
    pub expected: FieldType,
    pub value: String,
}

impl ValueError {
    fn new(expected: FieldType, value: impl Into<String>) -> Self {
        Self {
            expected,
            value: value.into(),
        }
    }
}

/// Parses an ISO date, also accepting a full timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(trimmed).map(|dt| dt.date()))
}

/// Parses a timestamp as written, without time-zone conversion.
///
/// Offsets (`+02:00`, `Z`) are accepted and dropped: the wall-clock time the
/// recording device wrote is what the pipeline keys on.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(with_offset) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.naive_local());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}
