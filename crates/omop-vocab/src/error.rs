//! Error types for vocabulary loading and resolution.

use std::fmt;
use std::path::PathBuf;

use omop_model::ErrorKind;
use thiserror::Error;

/// One (table, field, term) triplet mapped to more than one concept id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousTriplet {
    pub table_name: String,
    pub field_name: String,
    pub source_term: String,
    pub concept_ids: Vec<i64>,
}

impl fmt::Display for AmbiguousTriplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.concept_ids.iter().map(i64::to_string).collect();
        write!(
            f,
            "({}, {}, {}) -> [{}]",
            self.table_name,
            self.field_name,
            self.source_term,
            ids.join(", ")
        )
    }
}

#[derive(Debug, Error)]
pub enum VocabularyError {
    /// Vocabulary directory not found.
    #[error("vocabulary directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// The directory holds no vocabulary documents.
    #[error("no vocabulary documents (*.csv) in {path}")]
    NoDocuments { path: PathBuf },

    /// Failed to list the directory or stat a document.
    #[error("failed to read vocabulary source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a vocabulary document.
    #[error("failed to parse vocabulary document {path}: {source}")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// At least one triplet maps to several concept ids.
    #[error("ambiguous vocabulary mapping for {} triplet(s): {}", .triplets.len(), join(.triplets))]
    AmbiguousMapping { triplets: Vec<AmbiguousTriplet> },

    /// Strict resolution found terms without a mapping.
    #[error("no concept for {table}.{field} term(s): {}", .terms.join(", "))]
    Unmatched {
        table: String,
        field: String,
        terms: Vec<String>,
    },
}

impl VocabularyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unmatched { .. } => ErrorKind::Resolution,
            Self::DirectoryNotFound { .. }
            | Self::NoDocuments { .. }
            | Self::Io { .. }
            | Self::CsvRead { .. }
            | Self::AmbiguousMapping { .. } => ErrorKind::Configuration,
        }
    }
}

fn join(triplets: &[AmbiguousTriplet]) -> String {
    triplets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, VocabularyError>;
