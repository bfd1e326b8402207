use std::path::PathBuf;

use omop_load::{LoadReport, TableLoadReport};
use omop_model::EntityKind;
use serde::Serialize;

/// Row counts of one table after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub table: EntityKind,
    pub assembled: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

impl From<&TableLoadReport> for TableCounts {
    fn from(report: &TableLoadReport) -> Self {
        Self {
            table: report.kind,
            assembled: report.assembled,
            inserted: report.inserted_count(),
            duplicates: report.duplicate_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input_dir: PathBuf,
    pub database: PathBuf,
    pub dry_run: bool,
    pub strict: bool,
    pub tables: Vec<TableCounts>,
}

impl RunSummary {
    pub fn new(input_dir: PathBuf, database: PathBuf, strict: bool, report: &LoadReport) -> Self {
        Self {
            input_dir,
            database,
            dry_run: report.dry_run,
            strict,
            tables: report.tables.iter().map(TableCounts::from).collect(),
        }
    }

    pub fn table(&self, kind: EntityKind) -> Option<&TableCounts> {
        self.tables.iter().find(|counts| counts.table == kind)
    }

    pub fn total_inserted(&self) -> usize {
        self.tables.iter().map(|counts| counts.inserted).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.tables.iter().map(|counts| counts.duplicates).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputFile {
    pub table: String,
    pub rows: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembleSummary {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub files: Vec<OutputFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VocabSummary {
    pub dir: PathBuf,
    pub documents: usize,
    pub entries: usize,
    pub fingerprint: String,
    /// Entries per `(table, field)`.
    pub fields: Vec<(String, String, usize)>,
}

/// One row of the load order listing.
#[derive(Debug, Clone, Serialize)]
pub struct TableKeys {
    pub position: usize,
    pub table: EntityKind,
    pub primary_key: Option<&'static str>,
    /// Parent tables, in column order.
    pub references: Vec<EntityKind>,
    pub natural_key: Vec<&'static str>,
    pub probe_column: Option<&'static str>,
}
