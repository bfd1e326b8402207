//! Error types for flat table ingestion.

use std::path::PathBuf;

use omop_model::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Directory not found or not readable.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Failed to read directory entries.
    #[error("failed to read directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === CSV Parsing Errors ===
    /// Failed to parse CSV with Polars.
    #[error("failed to parse CSV {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    // === Template Errors ===
    /// A template column is absent from a source file.
    #[error("{table}: column '{column}' not found in {path}")]
    MissingColumn {
        table: String,
        column: &'static str,
        path: PathBuf,
    },

    /// A value cannot be read as the template's column type.
    #[error("{table}: value '{value}' in column '{column}' (row {row}) of {path} is not {expected}")]
    InvalidValue {
        table: String,
        column: &'static str,
        row: usize,
        value: String,
        expected: &'static str,
        path: PathBuf,
    },

    // === Consistency Errors ===
    /// No file matched a table that must be present.
    #[error("no '{prefix}' files found under {root}")]
    NoFiles { prefix: String, root: PathBuf },

    /// A dependent table was imported without its parent's id map.
    #[error("{table}: foreign key '{column}' requires the parent id map")]
    MissingIdMap { table: String, column: &'static str },

    /// A foreign key has no entry in the parent id map.
    #[error("{table}: {column} {id} of dataset '{dataset}' has no parent row")]
    UnmappedForeignKey {
        table: String,
        column: &'static str,
        dataset: String,
        id: String,
    },

    /// Two rows of one dataset share a primary key.
    #[error("{table}: duplicate {column} {id} in dataset '{dataset}'")]
    DuplicateKey {
        table: String,
        column: &'static str,
        dataset: String,
        id: i64,
    },

    // === DataFrame Errors ===
    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DirectoryNotFound { .. } | Self::DirectoryRead { .. } => ErrorKind::Io,
            Self::CsvParse { .. }
            | Self::MissingColumn { .. }
            | Self::InvalidValue { .. }
            | Self::DataFrame { .. } => ErrorKind::Schema,
            Self::NoFiles { .. }
            | Self::MissingIdMap { .. }
            | Self::UnmappedForeignKey { .. }
            | Self::DuplicateKey { .. } => ErrorKind::Consistency,
        }
    }
}

impl From<polars::prelude::PolarsError> for IngestError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
