//! Typed reads of the shared records table.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use omop_common::{column_f64_values, column_i64_values, column_string_values, has_column};
use omop_model::flat::{DATASET_NAME, RECORD_ID};
use omop_model::value::parse_datetime;
use polars::prelude::DataFrame;

use crate::error::{AssemblyError, Result};

pub const RECORD_NAME: &str = "record_name";
pub const PATIENT_ID: &str = "patient_id";
pub const AGE: &str = "age";
pub const SEX: &str = "sex";
pub const RECORDING_START: &str = "recording_start";
pub const RECORDING_END: &str = "recording_end";
pub const SAMPLING_FREQUENCY: &str = "sampling_frequency";
pub const LEAD_NAMES: &str = "lead_names";
pub const DIAGNOSIS: &str = "diagnosis";

fn require(df: &DataFrame, stage: &'static str, column: &'static str) -> Result<()> {
    if has_column(df, column) {
        Ok(())
    } else {
        Err(AssemblyError::MissingColumn { stage, column })
    }
}

/// Optional text values of a column.
pub fn text(
    df: &DataFrame,
    stage: &'static str,
    column: &'static str,
) -> Result<Vec<Option<String>>> {
    require(df, stage, column)?;
    Ok(column_string_values(df, column)?)
}

/// Optional float values of a column.
pub fn floats(
    df: &DataFrame,
    stage: &'static str,
    column: &'static str,
) -> Result<Vec<Option<f64>>> {
    require(df, stage, column)?;
    Ok(column_f64_values(df, column)?)
}

/// Integer values of a column in which every row must be set.
pub fn ids(df: &DataFrame, stage: &'static str, column: &'static str) -> Result<Vec<i64>> {
    require(df, stage, column)?;
    column_i64_values(df, column)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| AssemblyError::InvalidValue {
                stage,
                column,
                row: row + 1,
                message: "value is missing".to_string(),
            })
        })
        .collect()
}

/// Text values of a column in which every row must be set.
pub fn required_text(
    df: &DataFrame,
    stage: &'static str,
    column: &'static str,
) -> Result<Vec<String>> {
    text(df, stage, column)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| AssemblyError::InvalidValue {
                stage,
                column,
                row: row + 1,
                message: "value is missing".to_string(),
            })
        })
        .collect()
}

/// Parsed timestamps of a column in which every row must be set.
pub fn timestamps(
    df: &DataFrame,
    stage: &'static str,
    column: &'static str,
) -> Result<Vec<NaiveDateTime>> {
    text(df, stage, column)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let raw = value.ok_or_else(|| AssemblyError::InvalidValue {
                stage,
                column,
                row: row + 1,
                message: "timestamp is missing".to_string(),
            })?;
            parse_datetime(&raw).ok_or_else(|| AssemblyError::InvalidValue {
                stage,
                column,
                row: row + 1,
                message: format!("'{raw}' is not a timestamp"),
            })
        })
        .collect()
}

/// Recording start and end per record. End must not precede start.
pub fn recording_span(
    df: &DataFrame,
    stage: &'static str,
) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>> {
    let starts = timestamps(df, stage, RECORDING_START)?;
    let ends = timestamps(df, stage, RECORDING_END)?;
    starts
        .into_iter()
        .zip(ends)
        .enumerate()
        .map(|(row, (start, end))| {
            if end < start {
                Err(AssemblyError::InvalidValue {
                    stage,
                    column: RECORDING_END,
                    row: row + 1,
                    message: format!("recording ends before it starts ({start} > {end})"),
                })
            } else {
                Ok((start, end))
            }
        })
        .collect()
}

/// `dataset/record_name` per record; the stable identity of an exam.
pub fn source_values(df: &DataFrame, stage: &'static str) -> Result<Vec<String>> {
    let datasets = required_text(df, stage, DATASET_NAME)?;
    let names = required_text(df, stage, RECORD_NAME)?;
    Ok(datasets
        .into_iter()
        .zip(names)
        .map(|(dataset, name)| format!("{dataset}/{name}"))
        .collect())
}

/// Row index per record id, for joining dependent flat tables.
pub fn record_index(df: &DataFrame, stage: &'static str) -> Result<HashMap<i64, usize>> {
    Ok(ids(df, stage, RECORD_ID)?
        .into_iter()
        .enumerate()
        .map(|(row, id)| (id, row))
        .collect())
}
