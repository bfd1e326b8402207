//! Incremental loading of entity tables into a persistent store.
//!
//! [`IncrementalLoader`] reconciles each assembled table against the rows
//! already persisted, in the fixed dependency order of
//! [`LOAD_ORDER`](omop_model::LOAD_ORDER):
//!
//! 1. references are translated from run-local ids to persisted ids through
//!    the id maps of the parent tables loaded earlier in the run
//! 2. each row is projected onto its natural key, the columns that are
//!    neither surrogate keys nor volatile, with event references replaced by
//!    the referenced procedure's source value
//! 3. rows whose key is already persisted are duplicates and adopt the
//!    persisted id; the rest receive a contiguous id block above the
//!    table's current maximum and are written
//!
//! Stores implement [`Store`]; [`MemoryStore`] and [`SqliteStore`] ship
//! with the crate.

pub mod error;
pub mod loader;
pub mod report;
pub mod store;

pub use error::{LoadError, Result, StoreError};
pub use loader::{IncrementalLoader, LoadOptions};
pub use report::{LoadReport, TableLoadReport};
pub use store::{MAX_PROBE_PARAMETERS, MemoryStore, Probe, SqliteStore, Store};
