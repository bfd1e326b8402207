//! Persistent store abstraction.
//!
//! The loader needs three operations per table: read the rows already
//! persisted (optionally narrowed by a probe), find the highest surrogate
//! id in use, and append rows. Rows travel in schema column order.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, MAX_PROBE_PARAMETERS};

use omop_model::{EntityKind, Value};

use crate::error::StoreError;

/// Restricts an existing-row read to rows whose `column` holds one of
/// `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub column: &'static str,
    pub values: Vec<Value>,
}

pub trait Store {
    /// Rows of `kind` already persisted, each coerced to the schema types.
    fn read_existing(
        &mut self,
        kind: EntityKind,
        probe: Option<&Probe>,
    ) -> Result<Vec<Vec<Value>>, StoreError>;

    /// Highest value of an integer column, 0 for an empty table.
    fn max_id(&mut self, kind: EntityKind, column: &'static str) -> Result<i64, StoreError>;

    /// Appends rows; returns the number written.
    fn insert(&mut self, kind: EntityKind, rows: &[Vec<Value>]) -> Result<usize, StoreError>;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn read_existing(
        &mut self,
        kind: EntityKind,
        probe: Option<&Probe>,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        (**self).read_existing(kind, probe)
    }

    fn max_id(&mut self, kind: EntityKind, column: &'static str) -> Result<i64, StoreError> {
        (**self).max_id(kind, column)
    }

    fn insert(&mut self, kind: EntityKind, rows: &[Vec<Value>]) -> Result<usize, StoreError> {
        (**self).insert(kind, rows)
    }
}
