//! Column-level accessors over polars DataFrames.

use polars::prelude::{AnyValue, DataFrame, NamedFrom, PolarsResult, Series};

use crate::polars::{any_to_f64, any_to_i64, any_to_string_non_empty};

/// Returns true when `df` carries a column named `name`.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|column| column.as_str() == name)
}

/// Reads a column as optional trimmed strings, one entry per row.
pub fn column_string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    Ok((0..df.height())
        .map(|idx| any_to_string_non_empty(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect())
}

/// Reads a column as optional integers, one entry per row.
pub fn column_i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let column = df.column(name)?;
    Ok((0..df.height())
        .map(|idx| any_to_i64(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect())
}

/// Reads a column as optional floats, one entry per row.
pub fn column_f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    Ok((0..df.height())
        .map(|idx| any_to_f64(column.get(idx).unwrap_or(AnyValue::Null)))
        .collect())
}

/// Adds or replaces an integer column.
pub fn set_i64_column(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<i64>>,
) -> PolarsResult<()> {
    let series = Series::new(name.into(), values);
    df.with_column(series)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn reads_and_replaces_columns() {
        let mut df = DataFrame::new(vec![
            Column::new("record_id".into(), [1_i64, 2, 3]),
            Column::new("sex".into(), ["M", " ", "F"]),
        ])
        .unwrap();

        assert!(has_column(&df, "sex"));
        assert!(!has_column(&df, "person_id"));
        assert_eq!(
            column_string_values(&df, "sex").unwrap(),
            vec![Some("M".to_string()), None, Some("F".to_string())]
        );

        set_i64_column(&mut df, "person_id", vec![Some(1), Some(1), None]).unwrap();
        assert_eq!(
            column_i64_values(&df, "person_id").unwrap(),
            vec![Some(1), Some(1), None]
        );
        set_i64_column(&mut df, "person_id", vec![Some(2), Some(2), Some(2)]).unwrap();
        assert_eq!(df.width(), 3);
    }
}
