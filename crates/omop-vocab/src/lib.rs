//! Controlled-vocabulary resolution.
//!
//! Vocabulary documents are four-column CSV files
//! (`TableName,FieldName,SourceTerm,ConceptID`) kept together in one
//! directory. A [`VocabularyStore`] unions them into a validated index and
//! resolves source terms of a given table and field to concept ids.
//!
//! ```rust,ignore
//! let mut vocab = VocabularyStore::open("vocabulary")?;
//! let ids = vocab.resolve("person", "gender_concept_id", &[Some("M"), None], false)?;
//! ```

pub mod document;
pub mod error;
pub mod fingerprint;
pub mod store;

pub use document::{VocabularyEntry, read_document};
pub use error::{AmbiguousTriplet, Result, VocabularyError};
pub use fingerprint::{fingerprint, list_documents, sha256_hex};
pub use store::{MISSING_TERM, VocabularyIndex, VocabularyStore};
