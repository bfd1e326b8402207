//! Polars `AnyValue` conversions.
//!
//! Flat tables arrive as string columns, while derived frames carry typed
//! columns. These helpers collapse either form into plain Rust values.

use polars::prelude::AnyValue;

/// Converts a Polars `AnyValue` to its textual form.
///
/// `Null` becomes the empty string and whole floats print without a
/// fractional part, so `12.0` read from one file and `12` from another
/// compare equal.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => if b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

/// Converts `AnyValue` to a trimmed `String`, returning `None` when blank.
pub fn any_to_string_non_empty(value: AnyValue<'_>) -> Option<String> {
    let s = any_to_string(value);
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Formats a float without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    v.to_string()
}

/// Converts an `AnyValue` to `f64`.
///
/// NaN is passed through unchanged; callers that treat NaN as missing must
/// filter it themselves.
pub fn any_to_f64(value: AnyValue<'_>) -> Option<f64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(f64::from(v)),
        AnyValue::Int16(v) => Some(f64::from(v)),
        AnyValue::Int32(v) => Some(f64::from(v)),
        AnyValue::Int64(v) => Some(v as f64),
        AnyValue::UInt8(v) => Some(f64::from(v)),
        AnyValue::UInt16(v) => Some(f64::from(v)),
        AnyValue::UInt32(v) => Some(f64::from(v)),
        AnyValue::UInt64(v) => Some(v as f64),
        AnyValue::Float32(v) => Some(f64::from(v)),
        AnyValue::Float64(v) => Some(v),
        AnyValue::String(s) => parse_f64(s),
        AnyValue::StringOwned(s) => parse_f64(&s),
        _ => None,
    }
}

/// Converts an `AnyValue` to `i64`.
///
/// Floats are accepted only when they carry no fractional part; `3.5` is not
/// a valid identifier and yields `None`.
pub fn any_to_i64(value: AnyValue<'_>) -> Option<i64> {
    match value {
        AnyValue::Null => None,
        AnyValue::Int8(v) => Some(i64::from(v)),
        AnyValue::Int16(v) => Some(i64::from(v)),
        AnyValue::Int32(v) => Some(i64::from(v)),
        AnyValue::Int64(v) => Some(v),
        AnyValue::UInt8(v) => Some(i64::from(v)),
        AnyValue::UInt16(v) => Some(i64::from(v)),
        AnyValue::UInt32(v) => Some(i64::from(v)),
        AnyValue::UInt64(v) => i64::try_from(v).ok(),
        AnyValue::Float32(v) => whole_f64(f64::from(v)),
        AnyValue::Float64(v) => whole_f64(v),
        AnyValue::String(s) => parse_i64(s),
        AnyValue::StringOwned(s) => parse_i64(&s),
        _ => None,
    }
}

fn whole_f64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Parses a string as `i64`, accepting whole-number decimals such as `"7.0"`.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_blank() {
        assert_eq!(any_to_string(AnyValue::Null), "");
        assert_eq!(any_to_string_non_empty(AnyValue::String("  ")), None);
    }

    #[test]
    fn whole_floats_print_as_integers() {
        assert_eq!(any_to_string(AnyValue::Float64(12.0)), "12");
        assert_eq!(any_to_string(AnyValue::Float64(0.25)), "0.25");
    }

    #[test]
    fn fractional_floats_are_not_identifiers() {
        assert_eq!(any_to_i64(AnyValue::Float64(4.0)), Some(4));
        assert_eq!(any_to_i64(AnyValue::Float64(4.5)), None);
        assert_eq!(parse_i64("7.0"), Some(7));
        assert_eq!(parse_i64("seven"), None);
    }

    #[test]
    fn nan_survives_float_conversion() {
        let value = any_to_f64(AnyValue::Float64(f64::NAN)).unwrap();
        assert!(value.is_nan());
        assert_eq!(any_to_f64(AnyValue::String("")), None);
    }
}
