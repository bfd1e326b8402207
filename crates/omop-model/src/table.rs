//! Generic row container for one entity table.

use thiserror::Error;

use crate::entity::EntityKind;
use crate::records::Entity;
use crate::schema::TableSchema;
use crate::value::Value;

/// Rows of one entity table, each laid out in schema column order.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityTable {
    pub kind: EntityKind,
    pub rows: Vec<Vec<Value>>,
}

impl EntityTable {
    pub fn empty(kind: EntityKind) -> Self {
        Self {
            kind,
            rows: Vec::new(),
        }
    }

    /// Builds a table, rejecting rows whose width differs from the schema.
    pub fn with_rows(kind: EntityKind, rows: Vec<Vec<Value>>) -> Result<Self, TableShapeError> {
        let expected = kind.schema().width();
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != expected)
            .map(|(idx, row)| (idx, row.len()))
        {
            return Err(TableShapeError {
                table: kind.table_name(),
                row,
                expected,
                found,
            });
        }
        Ok(Self { kind, rows })
    }

    pub fn from_records<T: Entity>(records: &[T]) -> Self {
        Self {
            kind: T::KIND,
            rows: records.iter().map(Entity::to_row).collect(),
        }
    }

    pub fn schema(&self) -> &'static TableSchema {
        self.kind.schema()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema().column_index(name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    pub fn push(&mut self, row: Vec<Value>) -> Result<(), TableShapeError> {
        let expected = self.schema().width();
        if row.len() != expected {
            return Err(TableShapeError {
                table: self.kind.table_name(),
                row: self.rows.len(),
                expected,
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{table}: row {row} has {found} cells, expected {expected}")]
pub struct TableShapeError {
    pub table: &'static str,
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}
