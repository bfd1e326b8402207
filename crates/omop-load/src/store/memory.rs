//! In-process store.

use std::collections::{BTreeMap, HashSet};

use omop_model::{EntityKind, KeyCell, TableShapeError, Value};

use super::{Probe, Store};
use crate::error::StoreError;

/// Tables held in memory, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<EntityKind, Vec<Vec<Value>>>,
    reads: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, kind: EntityKind) -> &[Vec<Value>] {
        self.tables.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.rows(kind).len()
    }

    /// Number of rows returned by `read_existing` so far.
    pub fn rows_read(&self) -> usize {
        self.reads
    }

    fn column_index(kind: EntityKind, column: &'static str) -> Result<usize, StoreError> {
        kind.schema()
            .column_index(column)
            .ok_or(StoreError::UnknownColumn {
                table: kind.table_name(),
                column,
            })
    }
}

impl Store for MemoryStore {
    fn read_existing(
        &mut self,
        kind: EntityKind,
        probe: Option<&Probe>,
    ) -> Result<Vec<Vec<Value>>, StoreError> {
        let rows = self.rows(kind);
        let selected: Vec<Vec<Value>> = match probe {
            None => rows.to_vec(),
            Some(probe) => {
                let idx = Self::column_index(kind, probe.column)?;
                let wanted: HashSet<KeyCell> = probe.values.iter().map(Value::key_cell).collect();
                rows.iter()
                    .filter(|row| wanted.contains(&row[idx].key_cell()))
                    .cloned()
                    .collect()
            }
        };
        self.reads += selected.len();
        Ok(selected)
    }

    fn max_id(&mut self, kind: EntityKind, column: &'static str) -> Result<i64, StoreError> {
        let idx = Self::column_index(kind, column)?;
        Ok(self
            .rows(kind)
            .iter()
            .filter_map(|row| row[idx].as_i64())
            .max()
            .unwrap_or(0))
    }

    fn insert(&mut self, kind: EntityKind, rows: &[Vec<Value>]) -> Result<usize, StoreError> {
        let width = kind.schema().width();
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != width)
            .map(|(idx, row)| (idx, row.len()))
        {
            return Err(TableShapeError {
                table: kind.table_name(),
                row,
                expected: width,
                found,
            }
            .into());
        }
        self.tables.entry(kind).or_default().extend_from_slice(rows);
        Ok(rows.len())
    }
}
