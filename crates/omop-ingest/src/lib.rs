//! Flat exam table ingestion.
//!
//! Upstream extraction writes one directory per dataset, each holding CSV
//! exports of the flat per-exam tables. This crate discovers those files,
//! reads them with polars and merges each table across datasets, giving
//! every row a fresh key and translating foreign keys through the parent
//! table's [`IdMap`].

pub mod discovery;
pub mod error;
pub mod id_map;
pub mod importer;
pub mod inputs;
pub mod reader;

pub use discovery::{SourceFile, discover, list_csv_files, list_datasets};
pub use error::{IngestError, Result};
pub use id_map::{IdMap, IdMapping};
pub use importer::{TableImporter, TableTemplate};
pub use inputs::FlatInputs;
pub use reader::read_csv;
