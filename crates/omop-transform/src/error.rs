//! Error types for entity assembly.

use omop_model::ErrorKind;
use omop_vocab::VocabularyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Concept resolution failed.
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    /// A stage ran before the stage that writes a column it reads.
    #[error("{stage}: column '{column}' is missing; the stage producing it has not run")]
    MissingColumn {
        stage: &'static str,
        column: &'static str,
    },

    /// A flat value the stage needs is absent or malformed.
    #[error("{stage}: invalid {column} in record row {row}: {message}")]
    InvalidValue {
        stage: &'static str,
        column: &'static str,
        row: usize,
        message: String,
    },

    /// A dependent flat table points at a record that was not imported.
    #[error("{stage}: {table} row references record {record_id}, which is not in the records table")]
    UnknownRecord {
        stage: &'static str,
        table: &'static str,
        record_id: i64,
    },

    /// Failed DataFrame operation.
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl AssemblyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Vocabulary(err) => err.kind(),
            Self::MissingColumn { .. } | Self::UnknownRecord { .. } => ErrorKind::Consistency,
            Self::InvalidValue { .. } | Self::DataFrame { .. } => ErrorKind::Schema,
        }
    }
}

impl From<polars::prelude::PolarsError> for AssemblyError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssemblyError>;
