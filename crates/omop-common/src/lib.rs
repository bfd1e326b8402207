//! Shared utilities for the ECG to OMOP crates.
//!
//! Flat exam tables travel through the pipeline as polars DataFrames; this
//! crate holds the small value-conversion and column-access helpers that the
//! ingest and transform crates both need.

pub mod frame;
pub mod polars;

pub use frame::{
    column_f64_values, column_i64_values, column_string_values, has_column, set_i64_column,
};
pub use polars::{
    any_to_f64, any_to_i64, any_to_string, any_to_string_non_empty, format_numeric, parse_f64,
    parse_i64,
};
