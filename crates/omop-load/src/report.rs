//! Per-table load outcomes.

use omop_model::{EntityKind, EntityTable};

/// What the loader did with one table.
///
/// Both subsets keep the rows as they were reconciled: references
/// translated to persisted ids, and surrogate keys set to the id each row
/// has in the store (newly allocated for inserted rows, matched for
/// duplicates).
#[derive(Debug, Clone, PartialEq)]
pub struct TableLoadReport {
    pub kind: EntityKind,
    pub assembled: usize,
    pub inserted: EntityTable,
    pub duplicates: EntityTable,
    /// Whether `inserted` was actually written.
    pub written: bool,
}

impl TableLoadReport {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

/// Outcome of loading a whole batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub dry_run: bool,
    pub tables: Vec<TableLoadReport>,
}

impl LoadReport {
    pub fn table(&self, kind: EntityKind) -> Option<&TableLoadReport> {
        self.tables.iter().find(|table| table.kind == kind)
    }

    pub fn inserted(&self, kind: EntityKind) -> usize {
        self.table(kind).map_or(0, TableLoadReport::inserted_count)
    }

    pub fn duplicates(&self, kind: EntityKind) -> usize {
        self.table(kind).map_or(0, TableLoadReport::duplicate_count)
    }

    pub fn total_inserted(&self) -> usize {
        self.tables.iter().map(TableLoadReport::inserted_count).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.tables.iter().map(TableLoadReport::duplicate_count).sum()
    }
}
